use arch::image::Image;
use arch::symbol::CompilationResult;
use arch::target::{X32, X64};
use color_print::{cformat, cprintln};
use mxasm::compiler;

const HELP_TEMPLATE: &str = "\
{before-help}{bin} {version}
  {about}

{usage-heading}
{tab}{usage}

{all-args}{after-help}";

#[derive(Debug, clap::Parser)]
#[clap(version, about = "Assembler and linker for the MX bytecode toolchain", help_template = HELP_TEMPLATE)]
struct Args {
    /// Input files
    #[clap(default_value = "main.mx")]
    input: Vec<String>,

    /// Output image
    #[clap(short, long, default_value = "main.mx.bin")]
    output: String,

    /// Assemble for the 64-bit dialect
    #[clap(long)]
    m64: bool,

    /// Dump segments and symbol tables
    #[clap(short, long)]
    dump: bool,
}

fn main() {
    use clap::Parser;
    use std::io::Write;

    let args: Args = Args::parse();
    println!("MX Assembler");

    println!("1. Read and Compile");
    let mut files: Vec<(String, String)> = vec![];
    for path in &args.input {
        println!("  < {}", path);
        let source = std::fs::read_to_string(path)
            .expect(&cformat!("<r,s>Failed to open file</>: {}", path));
        files.push((path.clone(), source));
    }
    let borrowed: Vec<(&str, &str)> = files
        .iter()
        .map(|(p, s)| (p.as_str(), s.as_str()))
        .collect();
    let res = if args.m64 {
        compiler::compile::<X64>(&borrowed)
    } else {
        compiler::compile::<X32>(&borrowed)
    };

    if !res.is_ok() {
        for err in &res.errors {
            let source = err
                .file
                .as_deref()
                .and_then(|f| files.iter().find(|(p, _)| p == f))
                .zip(err.line)
                .and_then(|((_, src), line)| src.lines().nth(line - 1));
            err.print_diag(source);
        }
        cprintln!("<r,s>{} error(s)</>, no output written", res.errors.len());
        std::process::exit(1);
    }

    if args.dump {
        dump(&res);
    }

    println!("2. Write Image");
    println!("  > {}", args.output);
    let image = Image {
        addr_bits: if args.m64 { 64 } else { 32 },
        entry_point: res.entry_point,
        payload: res.image(),
    };
    let mut file = std::fs::File::create(&args.output)
        .expect(&cformat!("<r,s>Failed to create file</>: {}", &args.output));
    file.write_all(&image.to_bytes())
        .expect(&cformat!("<r,s>Failed to write file</>: {}", &args.output));
}

fn dump(res: &CompilationResult) {
    println!("-------------------+---------------------------------");
    cprintln!(
        " segments          | text {} + data {} + bss {} bytes",
        res.text_size,
        res.data_size,
        res.bss_size
    );
    cprintln!(" entry             | <y>0x{:04X}</>", res.entry_point);
    for (name, offset) in &res.text_labels {
        cprintln!(" label             | <g>{}</> @ 0x{:04X}", name, offset);
    }
    for (name, sym) in &res.data_symbols {
        let kind = if sym.is_constant { "const" } else { "bytes" };
        cprintln!(
            " data {:<5}       | <c>{}</> @ 0x{:04X} ({} bytes)",
            kind,
            name,
            sym.offset,
            sym.length
        );
    }
    for sym in &res.bss_symbols {
        cprintln!(" bss               | <c>{}</> ({} bytes)", sym.name, sym.size());
    }
    for (idx, chunk) in res.text_segment.chunks(16).enumerate() {
        let bytes: Vec<String> = chunk.iter().map(|b| format!("{:02X}", b)).collect();
        println!(" {:04X}              | {}", idx * 16, bytes.join(" "));
    }
    println!("-------------------+---------------------------------");
}
