pub mod error;
pub mod image;
pub mod op;
pub mod reg;
pub mod symbol;
pub mod target;
