//! Whole-toolchain tests: assemble a source program, link it, run the image
//! to completion on the VM.

use arch::reg::Reg;
use arch::target::{X32, X64};
use mxasm::compiler;
use mxvm::agent::Agent;
use mxvm::kernel::HaltKernel;

fn assemble32(source: &str) -> Vec<u8> {
    let res = compiler::compile_source::<X32>("test.mx", source);
    assert!(res.is_ok(), "compile errors: {:?}", res.errors);
    res.image()
}

fn run32(source: &str) -> Agent<X32, HaltKernel> {
    let image = assemble32(source);
    let mut agent = Agent::new(&image, HaltKernel);
    assert_eq!(agent.run(Some(10_000)), Some(0));
    agent
}

#[test]
fn stack_scenario_terminates_on_end_only() {
    let source = "\
section .text
global main
main:
mov eax, 4
push eax
push 6
pop ebx
pop ebx
pop [ebx]
add [ebx], 10
push [ebx]
end
";
    let image = assemble32(source);
    let mut agent: Agent<X32, HaltKernel> = Agent::new(&image, HaltKernel);
    for _ in 0..8 {
        assert_eq!(agent.tick(), None);
    }
    assert_eq!(agent.tick(), Some(0));
    // pop ebx twice leaves ebx = 4; the popped filler was zero, plus 10
    assert_eq!(agent.regs().read(Reg::EBX), 4);
    assert_eq!(agent.mem().read(4, 4), 10);
}

#[test]
fn register_aliasing_through_the_whole_toolchain() {
    let agent = run32(
        "section .text\nglobal main\nmain:\n\
         mov eax, 0xFFFFFFFF\nmov ax, 0\nmov ah, 170\nmov al, 85\nend\n",
    );
    assert_eq!(agent.regs().read(Reg::EAX), 0xFFFF_AA55);
}

#[test]
fn dword_write_clears_the_high_half_in_x64() {
    let source = "\
section .text
global main
main:
mov rax, 0x1111222233334444
mov eax, 0x55556666
end
";
    let res = compiler::compile_source::<X64>("test.mx", source);
    assert!(res.is_ok(), "compile errors: {:?}", res.errors);
    let mut agent: Agent<X64, HaltKernel> =
        Agent::with_entry(&res.image(), res.entry_point, HaltKernel);
    assert_eq!(agent.run(Some(100)), Some(0));
    assert_eq!(agent.regs().read(Reg::RAX), 0x5555_6666);
}

#[test]
fn word_write_keeps_the_high_bits_in_x64() {
    let source = "\
section .text
global main
main:
mov rax, 0x1111222233334444
mov ax, 0x7777
end
";
    let res = compiler::compile_source::<X64>("test.mx", source);
    assert!(res.is_ok(), "compile errors: {:?}", res.errors);
    let mut agent: Agent<X64, HaltKernel> =
        Agent::with_entry(&res.image(), res.entry_point, HaltKernel);
    assert_eq!(agent.run(Some(100)), Some(0));
    assert_eq!(agent.regs().read(Reg::RAX), 0x1111_2222_3333_7777);
}

#[test]
fn equ_constant_is_inlined_and_loaded() {
    // the dead `mov ecx, msg` past `end` keeps msg referenced; the linker
    // patches it with the rebased address but it never executes
    let source = "\
section .data
db msg \"hello!\"
equ msglen $-msg

section .text
global main
main:
mov eax, msglen
end
mov ecx, msg
";
    let res = compiler::compile_source::<X32>("test.mx", source);
    assert!(res.is_ok(), "compile errors: {:?}", res.errors);
    let image = res.image();
    let msg = &res.data_symbols["msg"];
    assert_eq!(&image[msg.offset..msg.offset + msg.length], b"hello!");

    let mut agent: Agent<X32, HaltKernel> = Agent::new(&image, HaltKernel);
    assert_eq!(agent.run(Some(100)), Some(0));
    assert_eq!(agent.regs().read(Reg::EAX), 6);
    assert_eq!(agent.mem().slice(msg.offset, 6), b"hello!");
}

#[test]
fn loops_and_conditions_execute() {
    // count eax down 3,2,1,0 via and-driven zero test
    let source = "\
section .text
global main
main:
mov eax, 3
loop1:
and eax, 0xFFFFFFFF
jz done
add eax, 0xFFFFFFFF
jmp loop1
done:
end
";
    let agent = run32(source);
    assert_eq!(agent.regs().read(Reg::EAX), 0);
}

#[test]
fn undefined_symbol_yields_no_runnable_result() {
    let res = compiler::compile_source::<X32>(
        "test.mx",
        "section .text\nglobal main\nmain:\nmov eax, missing\nend\n",
    );
    assert!(!res.is_ok());
    assert!(res
        .errors
        .iter()
        .any(|e| e.message.contains("Undefined symbol: `missing`")));
}

#[test]
fn bss_reference_points_past_text_and_data() {
    let source = "\
section .bss
resd counter 1

section .data
db pad 1 2 3

section .text
global main
main:
mov esi, pad
mov ebx, counter
end
";
    let res = compiler::compile_source::<X32>("test.mx", source);
    assert!(res.is_ok(), "compile errors: {:?}", res.errors);
    // text: [6, esi, addr*4, 6, ebx, addr*4, 1]
    let text = &res.text_segment;
    let pad = u32::from_le_bytes(text[2..6].try_into().unwrap()) as usize;
    let counter = u32::from_le_bytes(text[8..12].try_into().unwrap()) as usize;
    assert_eq!(pad, res.text_size);
    assert_eq!(counter, res.text_size + res.data_size);
}
