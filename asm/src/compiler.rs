use arch::error::CompileError;
use arch::symbol::CompilationResult;
use arch::target::Target;

use crate::{bss, data, linker, section::Sections, text};

/// Run the whole pipeline over one or more source files: partition into
/// sections, encode each independently, then relocate. A missing text
/// section or entry point is a hard stop; everything else keeps collecting
/// errors so one compile reports as much as possible.
pub fn compile<T: Target>(files: &[(&str, &str)]) -> CompilationResult {
    let mut errors: Vec<CompileError> = vec![];
    let mut sections = Sections::default();
    for (file, source) in files {
        sections.partition(file, source, &mut errors);
    }

    let text = text::encode::<T>(&sections.text, &mut errors);
    let data = data::encode(&sections.data, &mut errors);
    let bss_symbols = bss::encode(&sections.bss, &mut errors);

    let mut res = CompilationResult {
        text_size: text.bytes.len(),
        data_size: data.bytes.len(),
        bss_size: bss_symbols.iter().map(|s| s.size()).sum(),
        text_segment: text.bytes,
        data_segment: data.bytes,
        bss_symbols,
        text_labels: text.labels,
        text_symbol_refs: text.refs,
        data_symbols: data.symbols,
        entry_point: 0,
        errors: vec![],
    };

    if res.text_segment.is_empty() {
        errors.push(CompileError::new("No text section to assemble"));
    }
    match &sections.entry_symbol {
        None => errors.push(CompileError::new("No entry point: missing `global`")),
        Some(symbol) => match res.text_labels.get(symbol) {
            Some(&offset) => res.entry_point = offset,
            None => errors.push(CompileError::new(format!(
                "Entry point `{}` is not a text label",
                symbol
            ))),
        },
    }

    res.errors = errors;
    if res.is_ok() {
        linker::link(&mut res);
    }
    res
}

/// Single-source convenience wrapper.
pub fn compile_source<T: Target>(file: &str, source: &str) -> CompilationResult {
    compile::<T>(&[(file, source)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use arch::target::X32;

    #[test]
    fn compiles_a_minimal_program() {
        let res = compile_source::<X32>(
            "t.mx",
            "section .text\nglobal main\nmain:\nmov eax, 4\nend\n",
        );
        assert!(res.is_ok(), "{:?}", res.errors);
        assert_eq!(res.entry_point, 0);
        assert_eq!(res.text_segment, [7, arch::reg::Reg::EAX as u8, 4, 0, 0, 0, 1]);
        assert_eq!(res.text_size, 7);
    }

    #[test]
    fn links_jumps_across_labels() {
        let res = compile_source::<X32>(
            "t.mx",
            "section .text\nglobal main\nmain:\njmp done\nmov eax, 1\ndone: end\n",
        );
        assert!(res.is_ok(), "{:?}", res.errors);
        // jmp lands past the 5-byte jump and the 6-byte mov
        assert_eq!(res.text_segment[1..5], [11, 0, 0, 0]);
    }

    #[test]
    fn undefined_symbol_poisons_the_result() {
        let res = compile_source::<X32>(
            "t.mx",
            "section .text\nglobal main\nmain:\nmov eax, missing\nend\n",
        );
        assert!(!res.is_ok());
        assert!(res
            .errors
            .iter()
            .any(|e| e.message.contains("Undefined symbol: `missing`")));
    }

    #[test]
    fn missing_entry_point_is_a_hard_stop() {
        let res = compile_source::<X32>("t.mx", "section .text\nmov eax, 4\nend\n");
        assert!(!res.is_ok());
        assert!(res.errors.iter().any(|e| e.message.contains("entry point")));
    }

    #[test]
    fn data_rebases_past_text() {
        let res = compile_source::<X32>(
            "t.mx",
            "section .data\ndb msg \"hi\"\n\
             section .text\nglobal main\nmain:\nmov eax, msg\nend\n",
        );
        assert!(res.is_ok(), "{:?}", res.errors);
        // text is mov(2+4)+end(1)=7 bytes; msg lands at 7
        assert_eq!(res.data_symbols["msg"].offset, 7);
        assert_eq!(res.text_segment[2..6], [7, 0, 0, 0]);
        assert_eq!(res.image()[7..9], *b"hi");
    }
}
