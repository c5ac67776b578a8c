/// Address-width target of the toolchain. The encoder and the VM are generic
/// over this instead of inspecting types at runtime; `X32` and `X64` are the
/// two instantiations.
pub trait Target {
    const NAME: &'static str;
    /// Native address width in bytes.
    const ADDR_BYTES: usize;
    /// Native stack push width in bytes. Constants still encode as 4 bytes.
    const PUSH_BYTES: usize = Self::ADDR_BYTES;
    /// `SYSCALL` is a 64-bit-dialect mnemonic.
    const HAS_SYSCALL: bool;
}

pub enum X32 {}

impl Target for X32 {
    const NAME: &'static str = "x32";
    const ADDR_BYTES: usize = 4;
    const HAS_SYSCALL: bool = false;
}

pub enum X64 {}

impl Target for X64 {
    const NAME: &'static str = "x64";
    const ADDR_BYTES: usize = 8;
    const HAS_SYSCALL: bool = true;
}
