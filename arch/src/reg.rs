use bimap::BiMap;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// One of the sixteen 8-byte storage slots of the register file. Named
/// registers are views into these slots, never separate cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum Slot {
    A,
    B,
    C,
    D,
    SI,
    DI,
    BP,
    SP,
    CS,
    DS,
    SS,
    ES,
    FS,
    GS,
    IP,
    FLAGS,
}

pub const SLOT_COUNT: usize = 16;

/// Operand width in bytes. Doubles as the BSS element type and the size-hint
/// keyword (`BYTE`, `WORD`, `DWORD`, `QWORD`).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    TryFromPrimitive,
    IntoPrimitive,
    EnumString,
    Display,
)]
#[strum(ascii_case_insensitive)]
#[repr(u8)]
pub enum Width {
    #[strum(serialize = "BYTE")]
    Byte = 1,
    #[strum(serialize = "WORD")]
    Word = 2,
    #[strum(serialize = "DWORD")]
    Dword = 4,
    #[strum(serialize = "QWORD")]
    Qword = 8,
}

impl Width {
    pub fn bytes(self) -> usize {
        self as usize
    }

    pub fn bits(self) -> u32 {
        self as u32 * 8
    }

    /// Smallest width whose unsigned range holds `v`.
    pub fn minimal(v: u64) -> Width {
        if v <= u8::MAX as u64 {
            Width::Byte
        } else if v <= u16::MAX as u64 {
            Width::Word
        } else if v <= u32::MAX as u64 {
            Width::Dword
        } else {
            Width::Qword
        }
    }
}

/// Named register views. The id byte is the bytecode register operand.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    TryFromPrimitive,
    IntoPrimitive,
    EnumIter,
    IntoStaticStr,
    Display,
)]
#[repr(u8)]
pub enum Reg {
    AL,
    AH,
    AX,
    EAX,
    RAX,
    BL,
    BH,
    BX,
    EBX,
    RBX,
    CL,
    CH,
    CX,
    ECX,
    RCX,
    DL,
    DH,
    DX,
    EDX,
    RDX,
    SI,
    ESI,
    RSI,
    DI,
    EDI,
    RDI,
    BP,
    EBP,
    RBP,
    SP,
    ESP,
    RSP,
    CS,
    DS,
    SS,
    ES,
    FS,
    GS,
}

static REG_MAP: Lazy<BiMap<&'static str, Reg>> =
    Lazy::new(|| Reg::iter().map(|r| (r.into(), r)).collect());

impl Reg {
    pub fn parse(s: &str) -> Result<Reg, String> {
        match REG_MAP.get_by_left(s.to_ascii_uppercase().as_str()) {
            Some(reg) => Ok(*reg),
            None => Err(format!("Unknown reg name: {}", s)),
        }
    }

    pub fn decode(byte: u8) -> Result<Self, String> {
        match Self::try_from(byte) {
            Ok(reg) => Ok(reg),
            Err(_) => Err(format!("Unknown register id: 0x{:02X}", byte)),
        }
    }

    /// The view: (slot, bit offset, width). `AH`-style high-byte views are
    /// the only ones not anchored at bit 0.
    pub fn view(self) -> (Slot, u32, Width) {
        use Reg::*;
        match self {
            AL => (Slot::A, 0, Width::Byte),
            AH => (Slot::A, 8, Width::Byte),
            AX => (Slot::A, 0, Width::Word),
            EAX => (Slot::A, 0, Width::Dword),
            RAX => (Slot::A, 0, Width::Qword),
            BL => (Slot::B, 0, Width::Byte),
            BH => (Slot::B, 8, Width::Byte),
            BX => (Slot::B, 0, Width::Word),
            EBX => (Slot::B, 0, Width::Dword),
            RBX => (Slot::B, 0, Width::Qword),
            CL => (Slot::C, 0, Width::Byte),
            CH => (Slot::C, 8, Width::Byte),
            CX => (Slot::C, 0, Width::Word),
            ECX => (Slot::C, 0, Width::Dword),
            RCX => (Slot::C, 0, Width::Qword),
            DL => (Slot::D, 0, Width::Byte),
            DH => (Slot::D, 8, Width::Byte),
            DX => (Slot::D, 0, Width::Word),
            EDX => (Slot::D, 0, Width::Dword),
            RDX => (Slot::D, 0, Width::Qword),
            SI => (Slot::SI, 0, Width::Word),
            ESI => (Slot::SI, 0, Width::Dword),
            RSI => (Slot::SI, 0, Width::Qword),
            DI => (Slot::DI, 0, Width::Word),
            EDI => (Slot::DI, 0, Width::Dword),
            RDI => (Slot::DI, 0, Width::Qword),
            BP => (Slot::BP, 0, Width::Word),
            EBP => (Slot::BP, 0, Width::Dword),
            RBP => (Slot::BP, 0, Width::Qword),
            SP => (Slot::SP, 0, Width::Word),
            ESP => (Slot::SP, 0, Width::Dword),
            RSP => (Slot::SP, 0, Width::Qword),
            CS => (Slot::CS, 0, Width::Word),
            DS => (Slot::DS, 0, Width::Word),
            SS => (Slot::SS, 0, Width::Word),
            ES => (Slot::ES, 0, Width::Word),
            FS => (Slot::FS, 0, Width::Word),
            GS => (Slot::GS, 0, Width::Word),
        }
    }

    pub fn slot(self) -> Slot {
        self.view().0
    }

    pub fn width(self) -> Width {
        self.view().2
    }
}
