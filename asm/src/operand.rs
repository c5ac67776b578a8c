use arch::reg::Reg;

/// Grammatical kind of one operand token, decided purely by lexical shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// `eax`
    Register(Reg),
    /// `[eax]`
    RegisterAddress(Reg),
    /// `[counter]`
    VariableAddress(String),
    /// `counter`
    Variable(String),
    /// `42`, `0x2A`, `2Ah`
    Constant(u64),
    /// Anything else; fatal once a code path needs a kind.
    Unknown(String),
}

impl Operand {
    /// Classification priority: bracketed register, bracketed variable,
    /// register name, number, identifier, unknown.
    pub fn classify(token: &str) -> Operand {
        if let Some(inner) = token.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
            return match Reg::parse(inner) {
                Ok(reg) => Operand::RegisterAddress(reg),
                Err(_) => Operand::VariableAddress(inner.to_string()),
            };
        }
        if let Ok(reg) = Reg::parse(token) {
            return Operand::Register(reg);
        }
        if let Some(value) = parse_number(token) {
            return Operand::Constant(value);
        }
        if is_ident(token) {
            return Operand::Variable(token.to_string());
        }
        Operand::Unknown(token.to_string())
    }
}

/// Unsigned integer literal: decimal, `0x` hex or trailing-`h` hex.
pub fn parse_number(token: &str) -> Option<u64> {
    if let Some(hex) = token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16).ok();
    }
    if let Some(hex) = token.strip_suffix('h').or_else(|| token.strip_suffix('H')) {
        if !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return u64::from_str_radix(hex, 16).ok();
        }
    }
    token.parse::<u64>().ok()
}

/// Identifier shape `\w[\w\d]+`: word-char head, at least two chars.
pub fn is_ident(token: &str) -> bool {
    let mut chars = token.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    let mut rest = 0;
    for c in chars {
        if !(c.is_ascii_alphanumeric() || c == '_') {
            return false;
        }
        rest += 1;
    }
    rest >= 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_priority() {
        assert_eq!(Operand::classify("eax"), Operand::Register(Reg::EAX));
        assert_eq!(
            Operand::classify("[EBX]"),
            Operand::RegisterAddress(Reg::EBX)
        );
        assert_eq!(
            Operand::classify("[counter]"),
            Operand::VariableAddress("counter".to_string())
        );
        assert_eq!(Operand::classify("42"), Operand::Constant(42));
        assert_eq!(
            Operand::classify("counter"),
            Operand::Variable("counter".to_string())
        );
        assert_eq!(
            Operand::classify("1abc"),
            Operand::Unknown("1abc".to_string())
        );
    }

    #[test]
    fn number_radixes() {
        assert_eq!(parse_number("255"), Some(255));
        assert_eq!(parse_number("0xFF"), Some(255));
        assert_eq!(parse_number("FFh"), Some(255));
        assert_eq!(parse_number("0Ah"), Some(10));
        assert_eq!(parse_number("h"), None);
        assert_eq!(parse_number("main"), None);
    }

    #[test]
    fn single_letter_is_not_ident() {
        assert!(!is_ident("x"));
        assert!(is_ident("x1"));
        assert!(is_ident("_tmp"));
        assert!(!is_ident("a-b"));
    }
}
