use arch::error::CompileError;
use arch::op::{Op, LABEL_FILL, SYMBOL_FILL};
use arch::reg::{Reg, Width};
use arch::symbol::TextSymbolReference;
use arch::target::Target;
use color_print::cprintln;
use indexmap::IndexMap;
use std::marker::PhantomData;
use strum::EnumString;

use crate::operand::Operand;
use crate::section::Line;

/// Source mnemonics of the text section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(ascii_case_insensitive)]
enum Mnemonic {
    END,
    INT,
    SYSCALL,
    MOV,
    PUSH,
    POP,
    ADD,
    AND,
    XOR,
    JZ,
    JMP,
}

/// Encoded text segment: bytecode, label offsets, and the unresolved
/// references the linker patches.
#[derive(Debug, Default)]
pub struct TextOutput {
    pub bytes: Vec<u8>,
    pub labels: IndexMap<String, usize>,
    pub refs: Vec<TextSymbolReference>,
}

pub fn encode<T: Target>(lines: &[Line], errors: &mut Vec<CompileError>) -> TextOutput {
    let mut encoder = Encoder::<T> {
        out: TextOutput::default(),
        _target: PhantomData,
    };
    for line in lines {
        if let Err(err) = encoder.line(line) {
            errors.push(err);
        }
    }
    encoder.out
}

struct Encoder<T: Target> {
    out: TextOutput,
    _target: PhantomData<T>,
}

impl<T: Target> Encoder<T> {
    fn line(&mut self, line: &Line) -> Result<(), CompileError> {
        let mut tokens: Vec<String> = line.tokens.clone();

        // leading `label:`
        if let Some(name) = tokens[0].strip_suffix(':') {
            let name = name.to_string();
            if self
                .out
                .labels
                .insert(name.clone(), self.out.bytes.len())
                .is_some()
            {
                cprintln!(
                    "<yellow,bold>warning</>: Re-defined label `{}`, the later offset wins",
                    name
                );
            }
            tokens.remove(0);
            if tokens.is_empty() {
                return Ok(());
            }
        }

        let hint = strip_hint(&mut tokens);
        let fail = |msg: String| {
            CompileError::at(
                format!("{} in `{}`", msg, line.raw.trim()),
                &line.file,
                line.number,
            )
        };

        let mnemonic: Mnemonic = tokens[0]
            .parse()
            .map_err(|_| fail(format!("Unknown mnemonic `{}`", tokens[0])))?;
        let operands: Vec<Operand> = tokens[1..].iter().map(|t| Operand::classify(t)).collect();
        let start = self.out.bytes.len();

        use Mnemonic::*;
        use Operand::*;
        match (mnemonic, operands.as_slice()) {
            (END, []) => self.op(Op::END),
            (INT, [Constant(v)]) => {
                self.op(Op::INT);
                self.imm(*v, 1).map_err(&fail)?;
            }
            (SYSCALL, []) => {
                if !T::HAS_SYSCALL {
                    return Err(fail(format!("`syscall` is not available on {}", T::NAME)));
                }
                self.op(Op::SYSCALL);
            }
            (MOV, [Register(d), Register(s)]) => {
                self.op(Op::MOV_REG_REG);
                self.reg(*d);
                self.reg(*s);
            }
            (MOV, [Register(d), RegisterAddress(s)]) => {
                self.op(Op::MOV_REG_MEM);
                self.reg(*d);
                self.reg(*s);
            }
            (MOV, [Register(d), Variable(name)]) => {
                let width = hint.unwrap_or(d.width());
                self.op(Op::MOV_REG_MEM);
                self.reg(*d);
                self.placeholder(name, start, width.bytes(), SYMBOL_FILL);
            }
            (MOV, [Register(d), Constant(v)]) => {
                self.op(Op::MOV_REG_CON);
                self.reg(*d);
                self.imm(*v, d.width().bytes()).map_err(&fail)?;
            }
            (MOV, [VariableAddress(name), Constant(v)]) => {
                let width =
                    hint.ok_or_else(|| fail("`mov [mem], con` needs a size hint".to_string()))?;
                self.op(Op::MOV_MEM_CON);
                self.out.bytes.push(width.bytes() as u8);
                self.placeholder(name, start, width.bytes(), SYMBOL_FILL);
                self.imm(*v, width.bytes()).map_err(&fail)?;
            }
            (PUSH, [Register(r)]) => {
                self.op(Op::PUSH_REG);
                self.reg(*r);
            }
            (PUSH, [RegisterAddress(r)]) => {
                self.op(Op::PUSH_MEM);
                self.reg(*r);
            }
            // push constants are a 32-bit operation regardless of hint
            (PUSH, [Constant(v)]) => {
                self.op(Op::PUSH_CON);
                self.imm(*v, 4).map_err(&fail)?;
            }
            (POP, [Register(r)]) => {
                self.op(Op::POP_REG);
                self.reg(*r);
            }
            (POP, [RegisterAddress(r)]) => {
                self.op(Op::POP_MEM);
                self.reg(*r);
            }
            (ADD, [Register(d), Constant(v)]) => {
                let width = register_width(hint, *d).map_err(&fail)?;
                self.op(Op::ADD_REG_CON);
                self.reg(*d);
                self.imm(*v, width).map_err(&fail)?;
            }
            (ADD, [RegisterAddress(d), Constant(v)]) => {
                let width = register_width(hint, *d).map_err(&fail)?;
                self.op(Op::ADD_MEM_CON);
                self.reg(*d);
                self.imm(*v, width).map_err(&fail)?;
            }
            (AND, [Register(d), Constant(v)]) => {
                let width = register_width(hint, *d).map_err(&fail)?;
                self.op(Op::AND_REG_CON);
                self.reg(*d);
                self.imm(*v, width).map_err(&fail)?;
            }
            (XOR, [Register(d), Register(s)]) => {
                self.op(Op::XOR_REG_REG);
                self.reg(*d);
                self.reg(*s);
            }
            (JZ, [Variable(name)]) => {
                self.op(Op::JZ);
                self.placeholder(name, start, 4, LABEL_FILL);
            }
            (JMP, [Variable(name)]) => {
                self.op(Op::JMP);
                self.placeholder(name, start, 4, LABEL_FILL);
            }
            _ => return Err(fail("Cannot encode".to_string())),
        }
        Ok(())
    }

    fn op(&mut self, op: Op) {
        self.out.bytes.push(op.into());
    }

    fn reg(&mut self, reg: Reg) {
        self.out.bytes.push(reg.into());
    }

    fn imm(&mut self, v: u64, bytes: usize) -> Result<(), String> {
        if Width::minimal(v).bytes() > bytes {
            return Err(format!("Constant {} does not fit in {} bytes", v, bytes));
        }
        self.out.bytes.extend_from_slice(&v.to_le_bytes()[..bytes]);
        Ok(())
    }

    fn placeholder(&mut self, name: &str, instruction_offset: usize, length: usize, fill: u8) {
        self.out.refs.push(TextSymbolReference {
            name: name.to_string(),
            instruction_offset,
            reference_offset: self.out.bytes.len(),
            reference_length: length,
        });
        self.out.bytes.extend(std::iter::repeat(fill).take(length));
    }
}

/// Immediate width for opcodes without a width channel: the VM always fetches
/// by the destination register's width, so a disagreeing hint is an error
/// rather than a desynced instruction stream.
fn register_width(hint: Option<Width>, d: Reg) -> Result<usize, String> {
    match hint {
        Some(w) if w != d.width() => Err(format!(
            "Size hint {} disagrees with the {}-sized destination {}",
            w,
            d.width(),
            d
        )),
        _ => Ok(d.width().bytes()),
    }
}

/// Remove the first size-hint keyword (and a following `PTR`) from the token
/// stream, returning the hinted width.
fn strip_hint(tokens: &mut Vec<String>) -> Option<Width> {
    let idx = tokens.iter().position(|t| t.parse::<Width>().is_ok())?;
    let width = tokens.remove(idx).parse::<Width>().ok();
    if tokens.get(idx).is_some_and(|t| t.eq_ignore_ascii_case("ptr")) {
        tokens.remove(idx);
    }
    width
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer;
    use arch::target::{X32, X64};

    fn run<T: Target>(sources: &[&str]) -> (TextOutput, Vec<CompileError>) {
        let lines: Vec<Line> = sources
            .iter()
            .map(|s| Line {
                file: "t.mx".to_string(),
                number: 1,
                raw: s.to_string(),
                tokens: lexer::tokenize(s),
            })
            .collect();
        let mut errors = vec![];
        let out = encode::<T>(&lines, &mut errors);
        (out, errors)
    }

    #[test]
    fn encodes_bare_and_register_forms() {
        let (out, errors) = run::<X32>(&["mov eax, 4", "push eax", "pop [ebx]", "end"]);
        assert!(errors.is_empty());
        assert_eq!(
            out.bytes,
            [
                7, Reg::EAX as u8, 4, 0, 0, 0, // mov_reg_con eax, 4
                10, Reg::EAX as u8, // push_reg eax
                16, Reg::EBX as u8, // pop_mem [ebx]
                1, // end
            ]
        );
    }

    #[test]
    fn labels_record_running_offsets() {
        let (out, errors) = run::<X32>(&["start:", "mov eax, 1", "next: end"]);
        assert!(errors.is_empty());
        assert_eq!(out.labels["start"], 0);
        assert_eq!(out.labels["next"], 6);
    }

    #[test]
    fn jump_emits_label_placeholder() {
        let (out, errors) = run::<X32>(&["jmp done", "done: end"]);
        assert!(errors.is_empty());
        assert_eq!(out.bytes[..5], [32, 0xEE, 0xEE, 0xEE, 0xEE]);
        assert_eq!(
            out.refs[0],
            TextSymbolReference {
                name: "done".to_string(),
                instruction_offset: 0,
                reference_offset: 1,
                reference_length: 4,
            }
        );
    }

    #[test]
    fn variable_read_is_sized_by_destination() {
        let (out, errors) = run::<X32>(&["mov ax, counter"]);
        assert!(errors.is_empty());
        assert_eq!(out.bytes, [6, Reg::AX as u8, 0xFF, 0xFF]);
        assert_eq!(out.refs[0].reference_length, 2);
    }

    #[test]
    fn hint_overrides_reference_width() {
        let (out, errors) = run::<X32>(&["mov eax, BYTE counter"]);
        assert!(errors.is_empty());
        assert_eq!(out.refs[0].reference_length, 1);
        assert_eq!(out.bytes, [6, Reg::EAX as u8, 0xFF]);
    }

    #[test]
    fn mem_con_store_needs_a_hint() {
        let (_, errors) = run::<X32>(&["mov [counter], 5"]);
        assert_eq!(errors.len(), 1);
        let (out, errors) = run::<X32>(&["mov WORD[counter], 5"]);
        assert!(errors.is_empty());
        assert_eq!(out.bytes, [8, 2, 0xFF, 0xFF, 5, 0]);
        assert_eq!(out.refs[0].reference_offset, 2);
    }

    #[test]
    fn hint_must_match_the_destination_on_hintless_opcodes() {
        // the VM fetches these immediates by the destination width; a
        // narrower hint would leave it consuming the next opcode as data
        let (_, errors) = run::<X32>(&["add word eax, 5"]);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("Size hint"));
        let (_, errors) = run::<X32>(&["and byte ax, 1"]);
        assert_eq!(errors.len(), 1);
        let (_, errors) = run::<X32>(&["add word [ebx], 5"]);
        assert_eq!(errors.len(), 1);
        // an agreeing hint is redundant but legal
        let (out, errors) = run::<X32>(&["add dword eax, 5", "and byte al, 1"]);
        assert!(errors.is_empty());
        assert_eq!(
            out.bytes,
            [22, Reg::EAX as u8, 5, 0, 0, 0, 23, Reg::AL as u8, 1]
        );
    }

    #[test]
    fn push_constant_is_always_four_bytes() {
        let (out, errors) = run::<X64>(&["push 6"]);
        assert!(errors.is_empty());
        assert_eq!(out.bytes, [12, 6, 0, 0, 0]);
    }

    #[test]
    fn syscall_is_64_bit_only() {
        let (_, errors) = run::<X32>(&["syscall"]);
        assert_eq!(errors.len(), 1);
        let (out, errors) = run::<X64>(&["syscall"]);
        assert!(errors.is_empty());
        assert_eq!(out.bytes, [3]);
    }

    #[test]
    fn unhandled_combinations_name_the_line() {
        let (_, errors) = run::<X32>(&["xor eax, 5"]);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("xor eax, 5"));
        let (_, errors) = run::<X32>(&["int eax"]);
        assert_eq!(errors.len(), 1);
        let (_, errors) = run::<X32>(&["frob eax"]);
        assert!(errors[0].message.contains("Unknown mnemonic"));
    }
}
