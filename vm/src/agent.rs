use arch::op::Op;
use arch::reg::{Reg, Slot, Width};
use arch::target::Target;
use color_print::cprintln;
use std::marker::PhantomData;

use crate::kernel::Kernel;
use crate::memory::Memory;
use crate::regfile::RegisterFile;

/// Completion code for an unknown opcode byte.
pub const FAULT_UNKNOWN_OPCODE: i32 = -1;
/// Completion code for an undecodable operand (register id, width byte).
pub const FAULT_BAD_OPERAND: i32 = -2;
/// Completion code for a register width combination no rule covers.
pub const FAULT_BAD_COMBINATION: i32 = -3;

/// Zero flag bit in the FLAGS slot.
const ZF: u64 = 1 << 6;

#[derive(Debug)]
enum Fault {
    UnknownOpcode(u8),
    BadOperand(String),
    BadCombination(Reg, Reg),
}

impl Fault {
    fn code(&self) -> i32 {
        match self {
            Fault::UnknownOpcode(_) => FAULT_UNKNOWN_OPCODE,
            Fault::BadOperand(_) => FAULT_BAD_OPERAND,
            Fault::BadCombination(..) => FAULT_BAD_COMBINATION,
        }
    }
}

/// The virtual machine: one flat arena, one register file, one instruction
/// pointer. `tick` executes exactly one instruction; callers loop until it
/// returns a completion code. There is no recovery after a fault.
pub struct Agent<T: Target, K: Kernel> {
    regs: RegisterFile,
    mem: Memory,
    ip: usize,
    kernel: K,
    _target: PhantomData<T>,
}

impl<T: Target, K: Kernel> Agent<T, K> {
    /// Agent starting at offset 0 (the 32-bit dialect's entry convention).
    pub fn new(image: &[u8], kernel: K) -> Self {
        Self::with_entry(image, 0, kernel)
    }

    /// Agent starting at an explicit entry offset.
    pub fn with_entry(image: &[u8], entry: usize, kernel: K) -> Self {
        Self::with_memory(image, entry, kernel, Memory::default())
    }

    pub fn with_memory(image: &[u8], entry: usize, kernel: K, mut mem: Memory) -> Self {
        mem.load(0, image);
        let mut regs = RegisterFile::new();
        // stack grows down from the topmost addressable push slot
        regs.slot_write(Slot::SP, (mem.len() - T::PUSH_BYTES) as u64);
        Agent {
            regs,
            mem,
            ip: entry,
            kernel,
            _target: PhantomData,
        }
    }

    pub fn regs(&self) -> &RegisterFile {
        &self.regs
    }

    pub fn mem(&self) -> &Memory {
        &self.mem
    }

    pub fn sp(&self) -> usize {
        self.regs.slot_read(Slot::SP) as usize
    }

    pub fn ip(&self) -> usize {
        self.ip
    }

    /// One fetch-decode-execute step. `None` while running, `Some(0)` once
    /// halted, `Some(negative)` on a fault.
    pub fn tick(&mut self) -> Option<i32> {
        match self.step() {
            Ok(done) => done,
            Err(fault) => {
                match &fault {
                    Fault::UnknownOpcode(b) => {
                        cprintln!("<r,s>fault</>: unknown opcode 0x{:02X}", b)
                    }
                    Fault::BadOperand(msg) => cprintln!("<r,s>fault</>: {}", msg),
                    Fault::BadCombination(d, s) => {
                        cprintln!("<r,s>fault</>: cannot handle register combination {} {}", d, s)
                    }
                }
                Some(fault.code())
            }
        }
    }

    /// Run until completion, with an optional tick bound.
    pub fn run(&mut self, tmax: Option<u64>) -> Option<i32> {
        for _ in 0..tmax.unwrap_or(u64::MAX) {
            if let Some(code) = self.tick() {
                return Some(code);
            }
        }
        None
    }

    fn step(&mut self) -> Result<Option<i32>, Fault> {
        let byte = self.fetch(1) as u8;
        let op = Op::decode(byte).map_err(|_| Fault::UnknownOpcode(byte))?;
        match op {
            Op::END => return Ok(Some(0)),
            Op::INT => {
                let _vector = self.fetch(1) as u8;
                return Ok(self.trap());
            }
            Op::SYSCALL => return Ok(self.trap()),
            Op::MOV_REG_REG => {
                let (d, s) = (self.fetch_reg()?, self.fetch_reg()?);
                let v = self.widened(d, s)?;
                self.regs.write(d, v);
            }
            Op::MOV_REG_MEM => {
                let (d, s) = (self.fetch_reg()?, self.fetch_reg()?);
                let addr = self.regs.read(s) as usize;
                let v = self.mem.read(addr, d.width().bytes());
                self.regs.write(d, v);
            }
            Op::MOV_REG_CON => {
                let d = self.fetch_reg()?;
                let v = self.fetch(d.width().bytes());
                self.regs.write(d, v);
            }
            Op::MOV_MEM_CON => {
                let w = self.fetch_width()?;
                let addr = self.fetch(w) as usize;
                let v = self.fetch(w);
                self.mem.write(addr, w, v);
            }
            Op::PUSH_REG => {
                let r = self.fetch_reg()?;
                let v = self.regs.read(r);
                self.push(v);
            }
            Op::PUSH_MEM => {
                let r = self.fetch_reg()?;
                let addr = self.regs.read(r) as usize;
                let v = self.mem.read(addr, T::PUSH_BYTES);
                self.push(v);
            }
            // constants are pushed as a 32-bit operand in both dialects
            Op::PUSH_CON => {
                let v = self.fetch(4);
                self.push(v);
            }
            Op::POP_REG => {
                let r = self.fetch_reg()?;
                let v = self.pop();
                self.regs.write(r, v);
            }
            Op::POP_MEM => {
                let r = self.fetch_reg()?;
                let addr = self.regs.read(r) as usize;
                let v = self.pop();
                self.mem.write(addr, T::PUSH_BYTES, v);
            }
            Op::ADD_REG_CON => {
                let d = self.fetch_reg()?;
                let v = self.fetch(d.width().bytes());
                self.regs.write(d, self.regs.read(d).wrapping_add(v));
            }
            Op::ADD_MEM_CON => {
                let r = self.fetch_reg()?;
                let w = r.width().bytes();
                let v = self.fetch(w);
                let addr = self.regs.read(r) as usize;
                let sum = self.mem.read(addr, w).wrapping_add(v);
                self.mem.write(addr, w, sum);
            }
            Op::AND_REG_CON => {
                let d = self.fetch_reg()?;
                let v = self.fetch(d.width().bytes());
                let masked = self.regs.read(d) & v;
                self.regs.write(d, masked);
                self.set_zero_flag(masked == 0);
            }
            Op::XOR_REG_REG => {
                let (d, s) = (self.fetch_reg()?, self.fetch_reg()?);
                let v = self.widened(d, s)?;
                self.regs.write(d, self.regs.read(d) ^ v);
            }
            Op::JZ => {
                let target = self.fetch(4) as usize;
                if self.regs.slot_read(Slot::FLAGS) & ZF != 0 {
                    self.ip = target;
                }
            }
            Op::JMP => {
                let target = self.fetch(4) as usize;
                self.ip = target;
            }
        }
        Ok(None)
    }

    fn trap(&mut self) -> Option<i32> {
        if self.kernel.handle_interrupt(&mut self.regs, &mut self.mem) {
            Some(0)
        } else {
            None
        }
    }

    fn fetch(&mut self, width: usize) -> u64 {
        let v = self.mem.read(self.ip, width);
        self.ip += width;
        v
    }

    fn fetch_reg(&mut self) -> Result<Reg, Fault> {
        let byte = self.fetch(1) as u8;
        Reg::decode(byte).map_err(Fault::BadOperand)
    }

    fn fetch_width(&mut self) -> Result<usize, Fault> {
        let byte = self.fetch(1) as u8;
        match Width::try_from(byte) {
            Ok(w) => Ok(w.bytes()),
            Err(_) => Err(Fault::BadOperand(format!("Unknown width: {}", byte))),
        }
    }

    /// Source value for a two-register op: equal widths pass through, a
    /// narrower source zero-extends, narrowing is unsupported.
    fn widened(&self, d: Reg, s: Reg) -> Result<u64, Fault> {
        if s.width().bytes() > d.width().bytes() {
            return Err(Fault::BadCombination(d, s));
        }
        Ok(self.regs.read(s))
    }

    fn set_zero_flag(&mut self, zero: bool) {
        let flags = self.regs.slot_read(Slot::FLAGS);
        self.regs
            .slot_write(Slot::FLAGS, if zero { flags | ZF } else { flags & !ZF });
    }

    fn push(&mut self, v: u64) {
        let w = T::PUSH_BYTES;
        let sp = self.sp() - w;
        self.mem.write(sp, w, v);
        self.regs.slot_write(Slot::SP, sp as u64);
    }

    fn pop(&mut self) -> u64 {
        let sp = self.sp();
        let v = self.mem.read(sp, T::PUSH_BYTES);
        self.regs.slot_write(Slot::SP, (sp + T::PUSH_BYTES) as u64);
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::HaltKernel;
    use arch::target::{X32, X64};

    fn agent32(image: &[u8]) -> Agent<X32, HaltKernel> {
        Agent::new(image, HaltKernel)
    }

    #[test]
    fn end_halts_with_code_zero() {
        let mut agent = agent32(&[1]);
        assert_eq!(agent.tick(), Some(0));
    }

    #[test]
    fn unknown_opcode_faults_with_a_sentinel() {
        let mut agent = agent32(&[0x63]);
        assert_eq!(agent.tick(), Some(FAULT_UNKNOWN_OPCODE));
    }

    #[test]
    fn stack_round_trip_restores_sp() {
        // push 0xDEAD5EED; pop eax; end
        let image = [
            12, 0xED, 0x5E, 0xAD, 0xDE, // push_con
            15, Reg::EAX as u8, // pop_reg
            1,
        ];
        let mut agent = agent32(&image);
        let sp0 = agent.sp();
        assert_eq!(agent.tick(), None);
        assert_eq!(agent.sp(), sp0 - 4);
        assert_eq!(agent.tick(), None);
        assert_eq!(agent.sp(), sp0);
        assert_eq!(agent.regs().read(Reg::EAX), 0xDEAD_5EED);
        assert_eq!(agent.tick(), Some(0));
    }

    #[test]
    fn push_width_is_native_in_the_64_bit_dialect() {
        let image = [10, Reg::RAX as u8, 1];
        let mut agent: Agent<X64, HaltKernel> = Agent::new(&image, HaltKernel);
        let sp0 = agent.sp();
        agent.tick();
        assert_eq!(agent.sp(), sp0 - 8);
    }

    #[test]
    fn and_zero_result_takes_the_jz_branch() {
        // mov eax, 6; and eax, 1; jz 18; end(wrong); end at 18
        let image = [
            7, Reg::EAX as u8, 6, 0, 0, 0, // ip 0
            23, Reg::EAX as u8, 1, 0, 0, 0, // ip 6
            31, 18, 0, 0, 0, // ip 12
            1,  // ip 17: skipped
            1,  // ip 18
        ];
        let mut agent = agent32(&image);
        while agent.tick().is_none() {}
        assert_eq!(agent.ip(), 19);
        assert_eq!(agent.regs().read(Reg::EAX), 0);
    }

    #[test]
    fn jz_falls_through_on_nonzero() {
        // mov eax, 3; and eax, 1; jz 18; end at 17
        let image = [
            7, Reg::EAX as u8, 3, 0, 0, 0,
            23, Reg::EAX as u8, 1, 0, 0, 0,
            31, 18, 0, 0, 0,
            1,
        ];
        let mut agent = agent32(&image);
        while agent.tick().is_none() {}
        assert_eq!(agent.ip(), 18);
        assert_eq!(agent.regs().read(Reg::EAX), 1);
    }

    #[test]
    fn narrowing_mov_is_a_bad_combination() {
        let image = [5, Reg::AL as u8, Reg::EAX as u8, 1];
        let mut agent = agent32(&image);
        assert_eq!(agent.tick(), Some(FAULT_BAD_COMBINATION));
    }

    #[test]
    fn mov_through_register_address() {
        // mov ebx, 32; mov [mem at 32] via mov_mem_con; mov eax, [ebx]; end
        let image = [
            7, Reg::EBX as u8, 32, 0, 0, 0, // mov ebx, 32
            8, 4, 32, 0, 0, 0, 0x2A, 0, 0, 0, // mov dword[32], 42
            6, Reg::EAX as u8, Reg::EBX as u8, // mov eax, [ebx]
            1,
        ];
        let mut agent = agent32(&image);
        while agent.tick().is_none() {}
        assert_eq!(agent.regs().read(Reg::EAX), 42);
    }

    #[test]
    fn run_respects_the_tick_bound() {
        // jmp 0 loops forever
        let image = [32, 0, 0, 0, 0];
        let mut agent = agent32(&image);
        assert_eq!(agent.run(Some(10)), None);
    }
}
