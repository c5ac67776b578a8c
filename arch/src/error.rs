use color_print::cprintln;
use thiserror::Error;

/// One user-facing compile diagnostic. The assembler accumulates these into
/// `CompilationResult::errors` instead of stopping at the first failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct CompileError {
    pub message: String,
    pub file: Option<String>,
    pub line: Option<usize>,
    pub column: Option<usize>,
}

impl CompileError {
    pub fn new(message: impl Into<String>) -> Self {
        CompileError {
            message: message.into(),
            file: None,
            line: None,
            column: None,
        }
    }

    pub fn at(message: impl Into<String>, file: &str, line: usize) -> Self {
        CompileError {
            message: message.into(),
            file: Some(file.to_string()),
            line: Some(line),
            column: None,
        }
    }

    /// Print error with diagnostic information showing file location and line content
    pub fn print_diag(&self, source: Option<&str>) {
        cprintln!("<red,bold>error</>: {}", self.message);
        if let (Some(file), Some(line)) = (&self.file, self.line) {
            cprintln!("     <blue>--></> <underline>{}:{}</>", file, line);
            if let Some(content) = source {
                cprintln!("      <blue>|</>");
                cprintln!(" <blue>{:>4} |</> {}", line, content);
                cprintln!("      <blue>|</>");
            }
        }
    }
}

#[test]
fn test() {
    let err = CompileError::at("Undefined symbol: `msg`", "main.mx", 7);
    assert_eq!(err.to_string(), "Undefined symbol: `msg`");
    assert_eq!(err.line, Some(7));
}
