use std::fs;

use anyhow::{Context, Result};
use clap::{value_parser, Arg, Command};
use env_logger::Env;
use log::info;

use simtgpu::config::GpuConfig;
use simtgpu::isa::{assemble, disassemble};
use simtgpu::system::Gpu;

/// Whitespace separated byte values, decimal or `0x` hex.
fn parse_image(text: &str) -> Result<Vec<u8>> {
    text.split_whitespace()
        .map(|tok| {
            let v = match tok.strip_prefix("0x") {
                Some(hex) => u8::from_str_radix(hex, 16),
                None => tok.parse::<u8>(),
            };
            v.with_context(|| format!("bad data word: {}", tok))
        })
        .collect()
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = Command::new("run")
        .about("Assemble a kernel, launch it and dump data memory")
        .args(GpuConfig::args())
        .arg(Arg::new("program").required(true))
        .arg(Arg::new("data").long("data"))
        .arg(
            Arg::new("threads")
                .short('n')
                .long("threads")
                .default_value("1")
                .value_parser(value_parser!(u8)),
        )
        .arg(
            Arg::new("dump-base")
                .long("dump-base")
                .default_value("0")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("dump-len")
                .long("dump-len")
                .default_value("16")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("max-cycles")
                .long("max-cycles")
                .default_value("100000")
                .value_parser(value_parser!(u64)),
        )
        .arg(Arg::new("trace").long("trace"))
        .get_matches();
    let config = GpuConfig::from_matches(&args)?;

    let mut gpu = Gpu::new(config)?;
    if let Some(path) = args.get_one::<String>("program") {
        let src = fs::read_to_string(path).with_context(|| format!("reading {}", path))?;
        let words = assemble(&src).with_context(|| format!("assembling {}", path))?;
        for (pc, word) in words.iter().enumerate() {
            info!("{:3}: {:#06x}  {}", pc, word, disassemble(*word));
        }
        gpu.load_program(&words)?;
    }
    if let Some(path) = args.get_one::<String>("data") {
        let text = fs::read_to_string(path).with_context(|| format!("reading {}", path))?;
        gpu.load_data(0, &parse_image(&text)?)?;
    }
    if args.contains_id("trace") {
        gpu.enable_trace();
    }

    let threads = args.get_one::<u8>("threads").copied().unwrap_or(1);
    let max_cycles = args.get_one::<u64>("max-cycles").copied().unwrap_or(100_000);
    gpu.launch(threads);
    let cycles = gpu.run(max_cycles)?;
    info!("Kernel finished after {} cycles", cycles);
    gpu.stats.log();

    let base = args.get_one::<usize>("dump-base").copied().unwrap_or(0);
    let len = args.get_one::<usize>("dump-len").copied().unwrap_or(16);
    for (row, chunk) in gpu.data_memory.dump(base, len).chunks(8).enumerate() {
        let words = chunk.iter().map(|w| format!("{:3}", w)).collect::<Vec<_>>();
        println!("{:#04x}: {}", base + row * 8, words.join(" "));
    }

    if let (Some(path), Some(trace)) = (args.get_one::<String>("trace"), gpu.trace.as_ref()) {
        trace.write_text(path)?;
    }
    Ok(())
}
