use arch::image::Image;
use arch::reg::Reg;
use arch::target::{X32, X64};
use color_print::{cformat, cprintln};
use mxvm::agent::Agent;
use mxvm::kernel::{Abi, DemoKernel, Kernel};

#[derive(clap::Parser, Debug)]
#[clap(
    name = "MX VM",
    version,
    about = "Bytecode virtual machine for the MX toolchain"
)]
struct Args {
    /// Stop after this many ticks
    #[arg(short = 't', long)]
    tmax: Option<u64>,

    /// Dump the general registers after every tick
    #[arg(short, long)]
    dump_regs: bool,

    #[arg(default_value = "main.mx.bin")]
    input_file: String,
}

fn main() {
    use clap::Parser;

    let args = Args::parse();
    println!("MX VM");
    println!("+-----------------------------------------------+");
    println!("| {:<45} |", args.input_file);
    println!("+-----------------------------------------------+");

    let bytes = std::fs::read(&args.input_file)
        .expect(&cformat!("<r,s>Failed to open file</>: {}", args.input_file));
    let image = Image::from_bytes(&bytes)
        .expect(&cformat!("<r,s>Bad image</>: {}", args.input_file));

    let code = match image.addr_bits {
        64 => run::<X64, _>(
            Agent::with_entry(&image.payload, image.entry_point, DemoKernel::new(Abi::Syscall)),
            &args,
        ),
        _ => run::<X32, _>(Agent::new(&image.payload, DemoKernel::new(Abi::Int80)), &args),
    };

    println!("=================================================");
    match code {
        Some(0) => {}
        Some(code) => {
            cprintln!("<r,s>faulted</> with code {}", code);
            std::process::exit(1);
        }
        None => {
            cprintln!("<y,s>tick bound reached</>, no completion code");
            std::process::exit(2);
        }
    }
}

fn run<T: arch::target::Target, K: Kernel>(mut agent: Agent<T, K>, args: &Args) -> Option<i32> {
    if !args.dump_regs {
        return agent.run(args.tmax);
    }
    for _ in 0..args.tmax.unwrap_or(u64::MAX) {
        let done = agent.tick();
        dump_regs(&agent);
        if done.is_some() {
            return done;
        }
    }
    None
}

fn dump_regs<T: arch::target::Target, K: Kernel>(agent: &Agent<T, K>) {
    let regs = agent.regs();
    cprintln!(
        " [<y>0x{:04X}</>] a:{:016X} b:{:016X} c:{:016X} d:{:016X} sp:{:04X}",
        agent.ip(),
        regs.read(Reg::RAX),
        regs.read(Reg::RBX),
        regs.read(Reg::RCX),
        regs.read(Reg::RDX),
        agent.sp(),
    );
}
