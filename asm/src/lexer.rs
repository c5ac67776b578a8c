//! Line-level lexing: comment stripping, size-hint normalization and
//! tokenization into space/tab/comma-delimited words.

const HINT_KEYWORDS: [&str; 4] = ["BYTE", "WORD", "DWORD", "QWORD"];

/// Strip the trailing `;` comment and surrounding whitespace. `None` when
/// nothing is left.
pub fn clean(raw: &str) -> Option<&str> {
    let code = match raw.find(';') {
        Some(idx) => &raw[..idx],
        None => raw,
    };
    let code = code.trim();
    if code.is_empty() {
        None
    } else {
        Some(code)
    }
}

/// Insert a space before any `[` glued to a size keyword (`BYTE[`,
/// `WORD PTR[`, ...) so brackets always tokenize as separate words.
fn unglue_brackets(line: &str) -> String {
    let mut out = String::with_capacity(line.len() + 2);
    let chars: Vec<char> = line.chars().collect();
    for (i, &c) in chars.iter().enumerate() {
        if c == '[' && i > 0 {
            let head: String = chars[..i].iter().collect();
            let word = head
                .rsplit(|c: char| c.is_whitespace() || c == ',')
                .next()
                .unwrap_or("");
            let word = word.to_ascii_uppercase();
            if HINT_KEYWORDS.contains(&word.as_str()) || word == "PTR" {
                out.push(' ');
            }
        }
        out.push(c);
    }
    out
}

/// Tokenize one cleaned line. Splits on space, tab and comma, collapsing
/// empties; a `"`-quoted string stays one token, delimiters included.
/// A lone `:` following the first token is merged back into it, repairing
/// the common `label : rest` malformation.
pub fn tokenize(line: &str) -> Vec<String> {
    let line = unglue_brackets(line);
    let mut tokens: Vec<String> = vec![];
    let mut current = String::new();
    let mut in_string = false;
    for c in line.chars() {
        if in_string {
            current.push(c);
            if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => {
                current.push(c);
                in_string = true;
            }
            ' ' | '\t' | ',' => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }

    // "label : rest" -> "label: rest"
    if tokens.len() >= 2 && tokens[1] == ":" && !tokens[0].ends_with(':') {
        let merged = format!("{}:", tokens[0]);
        tokens.splice(0..2, [merged]);
    }
    tokens
}
