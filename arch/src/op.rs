use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};
use strum::Display;

/// Bytecode opcode table. Byte values are a closed contract between the text
/// encoder and the VM dispatch loop; never renumber.
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
    Display,
)]
#[allow(non_camel_case_types)]
#[repr(u8)]
pub enum Op {
    END = 1,
    INT = 2,
    SYSCALL = 3,
    MOV_REG_REG = 5,
    MOV_REG_MEM = 6,
    MOV_REG_CON = 7,
    MOV_MEM_CON = 8,
    PUSH_REG = 10,
    PUSH_MEM = 11,
    PUSH_CON = 12,
    POP_REG = 15,
    POP_MEM = 16,
    ADD_MEM_CON = 21,
    ADD_REG_CON = 22,
    AND_REG_CON = 23,
    JZ = 31,
    JMP = 32,
    XOR_REG_REG = 40,
}

/// Placeholder byte written for an unresolved label reference.
pub const LABEL_FILL: u8 = 0xEE;
/// Placeholder byte written for an unresolved data or BSS reference.
pub const SYMBOL_FILL: u8 = 0xFF;

impl Op {
    pub fn decode(byte: u8) -> Result<Self, String> {
        match Self::try_from(byte) {
            Ok(op) => Ok(op),
            Err(_) => Err(format!("Unknown opcode: 0x{:02X}", byte)),
        }
    }
}

#[test]
fn test() {
    assert_eq!(Op::decode(1), Ok(Op::END));
    assert_eq!(Op::decode(7), Ok(Op::MOV_REG_CON));
    assert_eq!(u8::from(Op::XOR_REG_REG), 40);
    assert!(Op::decode(0).is_err());
    assert!(Op::decode(LABEL_FILL).is_err());
}
