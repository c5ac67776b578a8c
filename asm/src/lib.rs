pub mod bss;
pub mod compiler;
pub mod data;
pub mod expr;
pub mod lexer;
pub mod linker;
pub mod operand;
pub mod section;
pub mod text;
