use arch::error::CompileError;
use arch::op::{Op, LABEL_FILL, SYMBOL_FILL};
use arch::symbol::CompilationResult;

/// Labels patch to absolute text offsets in this width.
const LABEL_ADDR_BYTES: usize = 4;

/// Rebase the data segment past the text segment and patch every forward
/// reference. Resolution failures are user-facing compile errors; a
/// placeholder that does not hold its expected fill pattern is an assembler
/// bug and panics before anything is overwritten.
pub fn link(res: &mut CompilationResult) {
    // Every reference must resolve against exactly one symbol space, and its
    // kind must agree with the instruction that emitted it.
    let mut undefined: Vec<String> = vec![];
    for reference in &res.text_symbol_refs {
        let name = &reference.name;
        let opcode = res.text_segment[reference.instruction_offset];
        let is_jump = opcode == u8::from(Op::JZ) || opcode == u8::from(Op::JMP);
        if res.text_labels.contains_key(name) {
            if !is_jump {
                res.errors.push(CompileError::new(format!(
                    "Label `{}` used as a data operand",
                    name
                )));
            }
        } else if let Some(sym) = res.data_symbols.get(name) {
            if is_jump {
                res.errors.push(CompileError::new(format!(
                    "Data symbol `{}` used as a jump target",
                    name
                )));
            } else if sym.is_constant && opcode != u8::from(Op::MOV_REG_MEM) {
                res.errors.push(CompileError::new(format!(
                    "Constant `{}` cannot be a store destination",
                    name
                )));
            }
        } else if res.bss_symbols.iter().any(|s| &s.name == name) {
            if is_jump {
                res.errors.push(CompileError::new(format!(
                    "BSS symbol `{}` used as a jump target",
                    name
                )));
            }
        } else if !undefined.contains(name) {
            undefined.push(name.clone());
        }
    }
    for name in &undefined {
        res.errors
            .push(CompileError::new(format!("Undefined symbol: `{}`", name)));
    }

    // Unused data symbols are reported too; any recorded error still makes
    // the whole result untrusted.
    for name in res.data_symbols.keys() {
        if !res.text_symbol_refs.iter().any(|r| &r.name == name) {
            res.errors.push(CompileError::new(format!(
                "Data symbol `{}` is declared but never used",
                name
            )));
        }
    }

    if !res.errors.is_empty() {
        return;
    }

    let data_base = res.text_size;
    for sym in res.data_symbols.values_mut() {
        sym.offset += data_base;
    }

    // split borrows: the patch loop reads the symbol tables and reference
    // records while rewriting the text segment
    let CompilationResult {
        text_segment,
        data_segment,
        bss_symbols,
        text_labels,
        text_symbol_refs,
        data_symbols,
        text_size,
        data_size,
        ..
    } = res;
    for reference in text_symbol_refs.iter() {
        let name = reference.name.as_str();
        if let Some(&label_offset) = text_labels.get(name) {
            if reference.reference_length != LABEL_ADDR_BYTES {
                panic!(
                    "Label reference `{}` has width {}, labels patch as {} bytes",
                    name, reference.reference_length, LABEL_ADDR_BYTES
                );
            }
            check_fill(text_segment, reference, LABEL_FILL);
            write_le(
                text_segment,
                reference.reference_offset,
                reference.reference_length,
                label_offset as u64,
            );
        } else if let Some(sym) = data_symbols.get(name) {
            check_fill(text_segment, reference, SYMBOL_FILL);
            if sym.is_constant {
                // The consuming instruction flips from memory read to
                // constant load and the value is inlined in place.
                let opcode = text_segment[reference.instruction_offset];
                if opcode != u8::from(Op::MOV_REG_MEM) {
                    panic!(
                        "Constant `{}` inlined into opcode 0x{:02X}, expected MOV_REG_MEM",
                        name, opcode
                    );
                }
                text_segment[reference.instruction_offset] = Op::MOV_REG_CON.into();
                let src = sym.offset - data_base;
                let value = &data_segment[src..src + sym.length];
                let dst = reference.reference_offset;
                if sym.length == reference.reference_length {
                    text_segment[dst..dst + sym.length].copy_from_slice(value);
                } else if sym.length == 2 && reference.reference_length == 4 {
                    text_segment[dst..dst + 2].copy_from_slice(value);
                    text_segment[dst + 2] = 0;
                    text_segment[dst + 3] = 0;
                } else {
                    panic!(
                        "Cannot inline constant `{}`: value is {} bytes, reference is {}",
                        name, sym.length, reference.reference_length
                    );
                }
            } else {
                write_le(
                    text_segment,
                    reference.reference_offset,
                    reference.reference_length,
                    sym.offset as u64,
                );
            }
        } else {
            // resolution check above guarantees a BSS symbol
            let mut offset = *text_size + *data_size;
            for sym in bss_symbols.iter() {
                if sym.name == name {
                    break;
                }
                offset += sym.size();
            }
            check_fill(text_segment, reference, SYMBOL_FILL);
            write_le(
                text_segment,
                reference.reference_offset,
                reference.reference_length,
                offset as u64,
            );
        }
    }
}

fn check_fill(
    text: &[u8],
    reference: &arch::symbol::TextSymbolReference,
    fill: u8,
) {
    let start = reference.reference_offset;
    let bytes = &text[start..start + reference.reference_length];
    if bytes.iter().any(|&b| b != fill) {
        panic!(
            "Corrupted placeholder for `{}` at offset {}: {:02X?}, expected 0x{:02X} fill",
            reference.name, start, bytes, fill
        );
    }
}

fn write_le(text: &mut [u8], offset: usize, length: usize, value: u64) {
    text[offset..offset + length].copy_from_slice(&value.to_le_bytes()[..length]);
}
