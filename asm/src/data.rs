use arch::error::CompileError;
use arch::reg::Width;
use arch::symbol::DataSymbol;
use indexmap::IndexMap;

use crate::expr::{self, Value};
use crate::operand;
use crate::section::Line;

/// The encoded data segment plus its symbol table, offsets still
/// segment-local (the linker rebases them past the text segment).
#[derive(Debug, Default)]
pub struct DataOutput {
    pub bytes: Vec<u8>,
    pub symbols: IndexMap<String, DataSymbol>,
}

impl DataOutput {
    fn symbol_value(&self, name: &str) -> Option<Value> {
        let sym = self.symbols.get(name)?;
        if sym.is_constant {
            let width = Width::try_from(sym.length as u8).ok()?;
            Some(Value::new(
                read_le(&self.bytes, sym.offset, sym.length),
                width,
            ))
        } else {
            Some(Value::new(sym.offset as u64, Width::Word))
        }
    }
}

fn read_le(bytes: &[u8], offset: usize, length: usize) -> u64 {
    let mut v = 0u64;
    for (i, b) in bytes[offset..offset + length].iter().enumerate() {
        v |= (*b as u64) << (i * 8);
    }
    v
}

fn write_le(out: &mut Vec<u8>, v: u64, width: Width) {
    out.extend_from_slice(&v.to_le_bytes()[..width.bytes()]);
}

/// A token that can serve as the symbol name of a `db`/`dq` line.
fn label_candidate(token: &str) -> bool {
    operand::is_ident(token) && operand::parse_number(token).is_none()
}

pub fn encode(lines: &[Line], errors: &mut Vec<CompileError>) -> DataOutput {
    let mut out = DataOutput::default();
    for line in lines {
        if let Err(err) = encode_line(line, &mut out) {
            errors.push(err);
        }
    }
    out
}

fn encode_line(line: &Line, out: &mut DataOutput) -> Result<(), CompileError> {
    let fail = |msg: String| CompileError::at(msg, &line.file, line.number);
    let directive = line.tokens[0].to_ascii_lowercase();
    match directive.as_str() {
        "db" => encode_db(line, out),
        "dq" => encode_dq(line, out),
        "equ" => encode_equ(line, out),
        other => Err(fail(format!("Unknown data directive: `{}`", other))),
    }
}

/// `db name? operand-list`: quoted strings as ASCII bytes, `$` as a zero
/// byte, numbers in their minimal width. The symbol (when named) covers the
/// whole directive.
fn encode_db(line: &Line, out: &mut DataOutput) -> Result<(), CompileError> {
    let fail = |msg: String| CompileError::at(msg, &line.file, line.number);
    let (label, operands) = split_label(&line.tokens[1..]);
    if operands.is_empty() {
        return Err(fail("`db` without operands".to_string()));
    }
    let start = out.bytes.len();
    for op in operands {
        if let Some(text) = op.strip_prefix('"').and_then(|t| t.strip_suffix('"')) {
            out.bytes.extend_from_slice(text.as_bytes());
        } else if op == "$" {
            out.bytes.push(0);
        } else if let Some(v) = operand::parse_number(op) {
            write_le(&mut out.bytes, v, Width::minimal(v));
        } else {
            return Err(fail(format!("Cannot encode `{}` in `db`", op)));
        }
    }
    if let Some(name) = label {
        let length = out.bytes.len() - start;
        insert_symbol(out, name, line, start, length, false)?;
    }
    Ok(())
}

/// `dq name? operand-list`: every operand coerced to a double and written as
/// 8 bytes. Only the first value's offset is attributed to the symbol.
fn encode_dq(line: &Line, out: &mut DataOutput) -> Result<(), CompileError> {
    let fail = |msg: String| CompileError::at(msg, &line.file, line.number);
    let (label, operands) = split_label(&line.tokens[1..]);
    if operands.is_empty() {
        return Err(fail("`dq` without operands".to_string()));
    }
    let start = out.bytes.len();
    for op in operands {
        let v: f64 = op
            .parse()
            .map_err(|_| fail(format!("Cannot encode `{}` in `dq`", op)))?;
        out.bytes.extend_from_slice(&v.to_le_bytes());
    }
    if let Some(name) = label {
        insert_symbol(out, name, line, start, 8, false)?;
    }
    Ok(())
}

/// `equ name expr`: evaluate the constant expression against the current
/// offset and the symbols defined so far, store the result inline, mark the
/// symbol constant.
fn encode_equ(line: &Line, out: &mut DataOutput) -> Result<(), CompileError> {
    let fail = |msg: String| CompileError::at(msg, &line.file, line.number);
    let name = match line.tokens.get(1) {
        Some(t) if label_candidate(t) => t.clone(),
        _ => return Err(fail("`equ` without a name".to_string())),
    };
    if line.tokens.len() < 3 {
        return Err(fail(format!("`equ {}` without an expression", name)));
    }
    let offset = out.bytes.len();
    let postfix = expr::to_postfix(&line.tokens[2..], offset as u64)
        .map_err(|e| fail(e.message))?;
    let value = expr::eval(&postfix, |sym| out.symbol_value(sym)).map_err(|e| fail(e.message))?;
    write_le(&mut out.bytes, value.v, value.width);
    insert_symbol(out, name, line, offset, value.width.bytes(), true)
}

fn split_label<'a>(tokens: &'a [String]) -> (Option<String>, &'a [String]) {
    match tokens.first() {
        Some(t) if label_candidate(t) => (Some(t.clone()), &tokens[1..]),
        _ => (None, tokens),
    }
}

fn insert_symbol(
    out: &mut DataOutput,
    name: String,
    line: &Line,
    offset: usize,
    length: usize,
    is_constant: bool,
) -> Result<(), CompileError> {
    if out.symbols.contains_key(&name) {
        return Err(CompileError::at(
            format!("Re-defined data symbol: `{}`", name),
            &line.file,
            line.number,
        ));
    }
    out.symbols.insert(
        name,
        DataSymbol {
            offset,
            length,
            is_constant,
        },
    );
    Ok(())
}
