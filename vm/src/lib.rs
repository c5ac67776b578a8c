pub mod agent;
pub mod kernel;
pub mod memory;
pub mod regfile;
