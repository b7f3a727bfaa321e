use anyhow::{ensure, Result};
use clap::{value_parser, Arg, Command};
use env_logger::Env;
use log::info;
use rand::Rng;

use simtgpu::config::GpuConfig;
use simtgpu::kernel::{MatMul, MatMulConfig};
use simtgpu::system::Gpu;

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = Command::new("matmul")
        .about("Square matrix multiply on the simulated GPU")
        .args(GpuConfig::args())
        .arg(
            Arg::new("dim")
                .short('n')
                .long("dim")
                .default_value("2")
                .value_parser(value_parser!(usize)),
        )
        .arg(Arg::new("trace").long("trace"))
        .get_matches();
    let config = GpuConfig::from_matches(&args)?;
    let n = args.get_one::<usize>("dim").copied().unwrap_or(2);

    // small operands keep the products readable; arithmetic wraps regardless
    ensure!(
        (n * n) % config.threads_per_block == 0,
        "{} threads is not a multiple of {} threads per block",
        n * n,
        config.threads_per_block
    );

    let mut rng = rand::thread_rng();
    let kernel = MatMul::new(MatMulConfig {
        n,
        a: (0..n * n).map(|_| rng.gen_range(0..8)).collect(),
        b: (0..n * n).map(|_| rng.gen_range(0..8)).collect(),
    })?;

    info!("Starting simulator: {:?}", config);
    let mut gpu = Gpu::new(config)?;
    let trace_path = args.get_one::<String>("trace");
    if trace_path.is_some() {
        gpu.enable_trace();
    }
    let cycles = gpu.run_once(&kernel, 1_000_000)?;
    info!("Simulator finished after {} cycles, result verified", cycles);
    info!("C = {:?}", kernel.expected());

    if let (Some(path), Some(trace)) = (trace_path, gpu.trace.as_ref()) {
        trace.write_text(path)?;
        info!("Trace of {} cycles written to {}", trace.len(), path);
    }
    Ok(())
}
