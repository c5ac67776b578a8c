use arch::reg::{Reg, Slot, Width, SLOT_COUNT};

/// Sixteen 8-byte slots. Named registers are bit-range views into these
/// slots; see `Reg::view`.
///
/// Width rules on write:
/// - a 64-bit view overwrites the whole slot;
/// - a 32-bit view overwrites the low half and clears the high half;
/// - 16- and 8-bit views touch only their own bit range.
#[derive(Debug, Clone, Default)]
pub struct RegisterFile {
    slots: [u64; SLOT_COUNT],
}

impl RegisterFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&self, reg: Reg) -> u64 {
        let (slot, offset, width) = reg.view();
        let v = self.slots[slot as usize] >> offset;
        match width {
            Width::Qword => v,
            w => v & ((1u64 << w.bits()) - 1),
        }
    }

    pub fn write(&mut self, reg: Reg, value: u64) {
        let (slot, offset, width) = reg.view();
        let slot = &mut self.slots[slot as usize];
        match width {
            Width::Qword => *slot = value,
            Width::Dword => *slot = value & 0xFFFF_FFFF,
            w => {
                let mask = (1u64 << w.bits()) - 1;
                *slot = (*slot & !(mask << offset)) | ((value & mask) << offset);
            }
        }
    }

    pub fn slot_read(&self, slot: Slot) -> u64 {
        self.slots[slot as usize]
    }

    pub fn slot_write(&mut self, slot: Slot, value: u64) {
        self.slots[slot as usize] = value;
    }
}
