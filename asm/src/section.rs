use arch::error::CompileError;
use indexmap::IndexMap;

use crate::lexer;

/// One surviving source line with its origin, for diagnostics.
#[derive(Debug, Clone)]
pub struct Line {
    pub file: String,
    pub number: usize,
    pub raw: String,
    pub tokens: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SectionKind {
    Text,
    Data,
    Bss,
}

/// Recognized but not expanded; macro substitution is outside the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Macro {
    pub arg_count: usize,
    pub body: Vec<String>,
}

/// Raw lines bucketed per section, plus the entry symbol and captured macros.
#[derive(Debug, Default)]
pub struct Sections {
    pub text: Vec<Line>,
    pub data: Vec<Line>,
    pub bss: Vec<Line>,
    pub entry_symbol: Option<String>,
    pub macros: IndexMap<String, Macro>,
}

impl Sections {
    /// Walk the raw lines of one file into the buckets. Unknown section
    /// headers are fatal; everything else lands in the active bucket minus
    /// its trailing comment.
    pub fn partition(&mut self, file: &str, source: &str, errors: &mut Vec<CompileError>) {
        let mut active: Option<SectionKind> = None;
        let mut open_macro: Option<(String, Macro)> = None;

        for (idx, raw) in source.lines().enumerate() {
            let number = idx + 1;
            let Some(code) = lexer::clean(raw) else {
                continue;
            };
            let tokens = lexer::tokenize(code);
            if tokens.is_empty() {
                continue;
            }

            if let Some((name, mac)) = open_macro.as_mut() {
                if tokens[0].eq_ignore_ascii_case("%endmacro") {
                    let (name, mac) = (name.clone(), mac.clone());
                    self.macros.insert(name, mac);
                    open_macro = None;
                } else {
                    mac.body.push(code.to_string());
                }
                continue;
            }

            if tokens[0].eq_ignore_ascii_case("section") {
                let header = code.to_ascii_lowercase();
                active = if header.contains(".text") {
                    Some(SectionKind::Text)
                } else if header.contains(".data") {
                    Some(SectionKind::Data)
                } else if header.contains(".bss") {
                    Some(SectionKind::Bss)
                } else {
                    errors.push(CompileError::at(
                        format!("Unknown section: `{}`", code),
                        file,
                        number,
                    ));
                    None
                };
                continue;
            }

            if tokens[0].eq_ignore_ascii_case("%macro") {
                let name = tokens.get(1).cloned().unwrap_or_default();
                let arg_count = tokens
                    .get(2)
                    .and_then(|t| t.parse::<usize>().ok())
                    .unwrap_or(0);
                if name.is_empty() {
                    errors.push(CompileError::at("Macro without a name", file, number));
                } else {
                    open_macro = Some((name, Macro { arg_count, body: vec![] }));
                }
                continue;
            }

            if active == Some(SectionKind::Text) && tokens[0].eq_ignore_ascii_case("global") {
                match tokens.get(1) {
                    Some(symbol) => self.entry_symbol = Some(symbol.clone()),
                    None => {
                        errors.push(CompileError::at("`global` without a symbol", file, number))
                    }
                }
                continue;
            }

            let line = Line {
                file: file.to_string(),
                number,
                raw: raw.to_string(),
                tokens,
            };
            match active {
                Some(SectionKind::Text) => self.text.push(line),
                Some(SectionKind::Data) => self.data.push(line),
                Some(SectionKind::Bss) => self.bss.push(line),
                None => errors.push(CompileError::at(
                    format!("Statement outside any section: `{}`", code),
                    file,
                    number,
                )),
            }
        }

        if let Some((name, _)) = open_macro {
            errors.push(CompileError::new(format!(
                "%macro `{}` is never closed",
                name
            )));
        }
    }
}
