//! Constant-expression support for `equ`: infix to postfix conversion by the
//! shunting-yard algorithm, then left-to-right evaluation on an explicit
//! stack.

use arch::error::CompileError;
use arch::reg::Width;

use crate::operand;

/// A width-tagged unsigned value. `equ` arithmetic keeps the operand widths
/// and refuses to mix them, except the word/dword pairings the data encoder
/// relies on for offset arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Value {
    pub v: u64,
    pub width: Width,
}

impl Value {
    pub fn new(v: u64, width: Width) -> Self {
        Value { v, width }
    }

    pub fn minimal(v: u64) -> Self {
        Value {
            v,
            width: Width::minimal(v),
        }
    }
}

/// One postfix output item.
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Num(Value),
    Sym(String),
    Op(char),
}

const OPERATORS: [char; 6] = ['^', '/', '*', '+', '-', '('];

fn precedence(op: char) -> u8 {
    match op {
        '^' => 6,
        '/' | '*' => 5,
        '+' | '-' => 4,
        '(' => 0,
        _ => unreachable!("not an operator: {op}"),
    }
}

/// Operand tokens may arrive glued to operators (`$-msg2`); re-split them so
/// every operator and parenthesis is its own token.
pub fn resplit(tokens: &[String]) -> Vec<String> {
    let mut out = vec![];
    for token in tokens {
        let mut current = String::new();
        for c in token.chars() {
            if OPERATORS.contains(&c) || c == ')' {
                if !current.is_empty() {
                    out.push(std::mem::take(&mut current));
                }
                out.push(c.to_string());
            } else {
                current.push(c);
            }
        }
        if !current.is_empty() {
            out.push(current);
        }
    }
    out
}

/// Shunting-yard conversion. `$` resolves to `offset` immediately; bare
/// symbol names pass through as strings for the evaluator to resolve.
pub fn to_postfix(tokens: &[String], offset: u64) -> Result<Vec<Item>, CompileError> {
    let mut output: Vec<Item> = vec![];
    let mut stack: Vec<char> = vec![];

    for token in resplit(tokens) {
        match token.as_str() {
            "$" => output.push(Item::Num(Value::new(offset, Width::Word))),
            "(" => stack.push('('),
            ")" => loop {
                match stack.pop() {
                    Some('(') => break,
                    Some(op) => output.push(Item::Op(op)),
                    None => {
                        return Err(CompileError::new("Unbalanced `)` in expression"));
                    }
                }
            },
            t if t.len() == 1 && OPERATORS.contains(&t.chars().next().unwrap()) => {
                let op = t.chars().next().unwrap();
                while let Some(&top) = stack.last() {
                    if top != '(' && precedence(top) >= precedence(op) {
                        output.push(Item::Op(stack.pop().unwrap()));
                    } else {
                        break;
                    }
                }
                stack.push(op);
            }
            t => {
                if let Some(v) = operand::parse_number(t) {
                    output.push(Item::Num(Value::minimal(v)));
                } else if operand::is_ident(t) || t.chars().all(|c| c.is_ascii_alphabetic()) {
                    output.push(Item::Sym(t.to_string()));
                } else {
                    return Err(CompileError::new(format!(
                        "Cannot parse `{}` in expression",
                        t
                    )));
                }
            }
        }
    }
    while let Some(op) = stack.pop() {
        if op == '(' {
            return Err(CompileError::new("Unbalanced `(` in expression"));
        }
        output.push(Item::Op(op));
    }
    Ok(output)
}

fn mask(v: u64, width: Width) -> u64 {
    match width {
        Width::Qword => v,
        w => v & ((1u64 << w.bits()) - 1),
    }
}

fn apply(op: char, a: Value, b: Value) -> Result<Value, CompileError> {
    // Same-width arithmetic only, plus the word/dword pairings widening to
    // dword.
    let width = if a.width == b.width {
        a.width
    } else if matches!(
        (a.width, b.width),
        (Width::Word, Width::Dword) | (Width::Dword, Width::Word)
    ) {
        Width::Dword
    } else {
        return Err(CompileError::new(format!(
            "Cannot `{}` a {} and a {} value",
            op, a.width, b.width
        )));
    };
    let v = match op {
        '+' => a.v.wrapping_add(b.v),
        '-' => a.v.wrapping_sub(b.v),
        _ => {
            return Err(CompileError::new(format!(
                "Unsupported operator `{}` in expression",
                op
            )));
        }
    };
    Ok(Value::new(mask(v, width), width))
}

/// Left-to-right postfix evaluation. `resolve` maps a symbol name to its
/// value (an `equ` constant's value, or a `db` symbol's offset).
pub fn eval(
    items: &[Item],
    resolve: impl Fn(&str) -> Option<Value>,
) -> Result<Value, CompileError> {
    let mut stack: Vec<Value> = vec![];
    for item in items {
        match item {
            Item::Num(v) => stack.push(*v),
            Item::Sym(name) => match resolve(name) {
                Some(v) => stack.push(v),
                None => {
                    return Err(CompileError::new(format!("Undefined symbol: `{}`", name)));
                }
            },
            Item::Op(op) => {
                let b = stack.pop();
                let a = stack.pop();
                match (a, b) {
                    (Some(a), Some(b)) => stack.push(apply(*op, a, b)?),
                    _ => return Err(CompileError::new("Malformed expression")),
                }
            }
        }
    }
    match (stack.pop(), stack.is_empty()) {
        (Some(v), true) => Ok(v),
        _ => Err(CompileError::new("Malformed expression")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(s: &str) -> Vec<String> {
        s.split_whitespace().map(str::to_string).collect()
    }

    fn num(v: u64) -> Item {
        Item::Num(Value::minimal(v))
    }

    fn sym(s: &str) -> Item {
        Item::Sym(s.to_string())
    }

    #[test]
    fn postfix_of_offset_minus_symbol() {
        let postfix = to_postfix(&toks("$-msg2"), 0).unwrap();
        assert_eq!(
            postfix,
            vec![
                Item::Num(Value::new(0, Width::Word)),
                sym("msg2"),
                Item::Op('-')
            ]
        );
    }

    #[test]
    fn postfix_of_simple_subtraction() {
        let postfix = to_postfix(&toks("3-1"), 0).unwrap();
        assert_eq!(postfix, vec![num(3), num(1), Item::Op('-')]);
    }

    #[test]
    fn postfix_respects_precedence() {
        // A^2+3*A*B+B^4 => A 2 ^ 3 A * B * + B 4 ^ +
        let postfix = to_postfix(&toks("A^2+3*A*B+B^4"), 0).unwrap();
        assert_eq!(
            postfix,
            vec![
                sym("A"),
                num(2),
                Item::Op('^'),
                num(3),
                sym("A"),
                Item::Op('*'),
                sym("B"),
                Item::Op('*'),
                Item::Op('+'),
                sym("B"),
                num(4),
                Item::Op('^'),
                Item::Op('+'),
            ]
        );
    }

    #[test]
    fn parens_flush_to_the_matching_open() {
        let postfix = to_postfix(&toks("(3-1)-1"), 0).unwrap();
        assert_eq!(
            postfix,
            vec![num(3), num(1), Item::Op('-'), num(1), Item::Op('-')]
        );
        assert_eq!(eval(&postfix, |_| None).unwrap().v, 1);
    }

    #[test]
    fn eval_resolves_symbols() {
        let postfix = to_postfix(&toks("$-msg2"), 13).unwrap();
        let v = eval(&postfix, |name| {
            (name == "msg2").then(|| Value::new(6, Width::Word))
        })
        .unwrap();
        assert_eq!(v, Value::new(7, Width::Word));
    }

    #[test]
    fn eval_rejects_mixed_widths() {
        let postfix = to_postfix(&toks("1-65536"), 0).unwrap();
        assert!(eval(&postfix, |_| None).is_err());
        // the documented ushort/uint pairing is allowed
        let postfix = to_postfix(&toks("65536+1000"), 0).unwrap();
        let err_or = eval(&postfix, |_| None);
        assert_eq!(err_or.unwrap(), Value::new(66536, Width::Dword));
    }

    #[test]
    fn eval_rejects_undefined_symbols() {
        let postfix = to_postfix(&toks("$-nope"), 0).unwrap();
        assert!(eval(&postfix, |_| None).is_err());
    }
}
