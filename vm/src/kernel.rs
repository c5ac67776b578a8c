use arch::reg::Reg;
use color_print::cprintln;
use std::io::Write;

use crate::memory::Memory;
use crate::regfile::RegisterFile;

/// The injected collaborator servicing `INT`/`SYSCALL` traps. It receives
/// the live register file and memory for the duration of one call; returning
/// true terminates the agent with completion code 0.
pub trait Kernel {
    fn handle_interrupt(&mut self, regs: &mut RegisterFile, mem: &mut Memory) -> bool;
}

/// Terminates on the first trap. Handy default for tests and plain programs
/// that only trap to exit.
#[derive(Debug, Default)]
pub struct HaltKernel;

impl Kernel for HaltKernel {
    fn handle_interrupt(&mut self, _regs: &mut RegisterFile, _mem: &mut Memory) -> bool {
        true
    }
}

/// Syscall convention the demo kernel speaks; the full Linux table is a
/// separate collaborator and stays out of the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Abi {
    /// `int 0x80`: eax=1 exit, eax=4 write(ebx, ecx, edx).
    Int80,
    /// `syscall`: rax=60 exit, rax=1 write(rdi, rsi, rdx).
    Syscall,
}

/// Minimal write/exit kernel over the A-register contract.
#[derive(Debug)]
pub struct DemoKernel {
    abi: Abi,
}

impl DemoKernel {
    pub fn new(abi: Abi) -> Self {
        DemoKernel { abi }
    }

    fn write_out(mem: &Memory, addr: usize, len: usize) {
        let bytes = mem.slice(addr, len);
        let mut stdout = std::io::stdout();
        if stdout.write_all(bytes).and_then(|_| stdout.flush()).is_err() {
            cprintln!("<r,s>kernel</>: write to stdout failed");
        }
    }
}

impl Kernel for DemoKernel {
    fn handle_interrupt(&mut self, regs: &mut RegisterFile, mem: &mut Memory) -> bool {
        match self.abi {
            Abi::Int80 => match regs.read(Reg::EAX) {
                1 => true,
                4 => {
                    let addr = regs.read(Reg::ECX) as usize;
                    let len = regs.read(Reg::EDX) as usize;
                    Self::write_out(mem, addr, len);
                    false
                }
                n => {
                    cprintln!("<r,s>kernel</>: unhandled int 0x80 syscall {}", n);
                    false
                }
            },
            Abi::Syscall => match regs.read(Reg::RAX) {
                60 => true,
                1 => {
                    let addr = regs.read(Reg::RSI) as usize;
                    let len = regs.read(Reg::RDX) as usize;
                    Self::write_out(mem, addr, len);
                    false
                }
                n => {
                    cprintln!("<r,s>kernel</>: unhandled syscall {}", n);
                    false
                }
            },
        }
    }
}
