use arch::error::CompileError;
use arch::reg::Width;
use arch::symbol::BssSymbol;

use crate::operand;
use crate::section::Line;

/// `resb/resw/resd/resq name count` reservations. No bytes are emitted; the
/// linker computes each symbol's offset past text+data on demand.
pub fn encode(lines: &[Line], errors: &mut Vec<CompileError>) -> Vec<BssSymbol> {
    let mut symbols: Vec<BssSymbol> = vec![];
    for line in lines {
        match encode_line(line, &symbols) {
            Ok(sym) => symbols.push(sym),
            Err(err) => errors.push(err),
        }
    }
    symbols
}

fn encode_line(line: &Line, symbols: &[BssSymbol]) -> Result<BssSymbol, CompileError> {
    let fail = |msg: String| CompileError::at(msg, &line.file, line.number);
    let element_type = match line.tokens[0].to_ascii_lowercase().as_str() {
        "resb" => Width::Byte,
        "resw" => Width::Word,
        "resd" => Width::Dword,
        "resq" => Width::Qword,
        other => return Err(fail(format!("Unknown bss directive: `{}`", other))),
    };
    let name = match line.tokens.get(1) {
        Some(t) if operand::is_ident(t) => t.clone(),
        _ => return Err(fail("Reservation without a name".to_string())),
    };
    let count = match line.tokens.get(2).map(String::as_str) {
        Some(t) => operand::parse_number(t)
            .ok_or_else(|| fail(format!("Cannot parse count `{}`", t)))? as usize,
        None => 1,
    };
    if symbols.iter().any(|s| s.name == name) {
        return Err(fail(format!("Re-defined bss symbol: `{}`", name)));
    }
    Ok(BssSymbol {
        name,
        element_type,
        count,
    })
}
