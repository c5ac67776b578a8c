use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::CompileError;
use crate::reg::Width;

/// A placeholder in the text segment waiting for the linker. Created by the
/// text encoder for every operand it cannot resolve, consumed exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSymbolReference {
    pub name: String,
    /// Start byte of the owning instruction. The linker needs it to flip the
    /// opcode when an `equ` constant gets inlined.
    pub instruction_offset: usize,
    /// Start byte of the placeholder bytes themselves.
    pub reference_offset: usize,
    /// Placeholder width in bytes: 1, 2, 4 or 8.
    pub reference_length: usize,
}

/// One `db`/`dq`/`equ` symbol. `offset` is segment-local until the linker
/// rebases it past the text segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSymbol {
    pub offset: usize,
    pub length: usize,
    /// True for `equ`-defined scalars, false for `db` buffers.
    pub is_constant: bool,
}

/// One `resb`/`resw`/`resd`/`resq` reservation. Never materialized as bytes;
/// only its layout offset past text+data is ever computed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BssSymbol {
    pub name: String,
    pub element_type: Width,
    pub count: usize,
}

impl BssSymbol {
    pub fn size(&self) -> usize {
        self.count * self.element_type.bytes()
    }
}

/// Everything one compile call produces. Immutable after the single
/// relocation pass; must not be trusted downstream while `errors` is
/// non-empty.
#[derive(Debug, Default)]
pub struct CompilationResult {
    pub text_segment: Vec<u8>,
    pub data_segment: Vec<u8>,
    pub bss_symbols: Vec<BssSymbol>,
    pub text_labels: IndexMap<String, usize>,
    pub text_symbol_refs: Vec<TextSymbolReference>,
    pub data_symbols: IndexMap<String, DataSymbol>,
    pub entry_point: usize,
    pub text_size: usize,
    pub data_size: usize,
    pub bss_size: usize,
    pub errors: Vec<CompileError>,
}

impl CompilationResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// The runnable image: text followed by the rebased data segment.
    pub fn image(&self) -> Vec<u8> {
        let mut image = self.text_segment.clone();
        image.extend_from_slice(&self.data_segment);
        image
    }
}

#[test]
fn test() {
    let sym = BssSymbol {
        name: "buf".to_string(),
        element_type: Width::Dword,
        count: 3,
    };
    assert_eq!(sym.size(), 12);
}
