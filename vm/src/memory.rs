/// Flat byte-addressable arena shared by code, data and the stack. Accesses
/// past the end are assembler/VM bugs and panic; the guest is not sandboxed.
#[derive(Debug, Clone)]
pub struct Memory {
    bytes: Vec<u8>,
}

/// Arena size used when the constructor is not given one.
pub const DEFAULT_SIZE: usize = 65_535;

impl Memory {
    pub fn new(size: usize) -> Self {
        Memory {
            bytes: vec![0; size],
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn load(&mut self, offset: usize, image: &[u8]) {
        self.bytes[offset..offset + image.len()].copy_from_slice(image);
    }

    pub fn byte(&self, addr: usize) -> u8 {
        self.bytes[addr]
    }

    pub fn slice(&self, addr: usize, len: usize) -> &[u8] {
        &self.bytes[addr..addr + len]
    }

    /// Little-endian read of `width` bytes.
    pub fn read(&self, addr: usize, width: usize) -> u64 {
        let mut v = 0u64;
        for (i, b) in self.bytes[addr..addr + width].iter().enumerate() {
            v |= (*b as u64) << (i * 8);
        }
        v
    }

    /// Little-endian write of `width` bytes.
    pub fn write(&mut self, addr: usize, width: usize, value: u64) {
        self.bytes[addr..addr + width].copy_from_slice(&value.to_le_bytes()[..width]);
    }
}

impl Default for Memory {
    fn default() -> Self {
        Memory::new(DEFAULT_SIZE)
    }
}
