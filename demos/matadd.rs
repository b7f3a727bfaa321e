use anyhow::{ensure, Result};
use clap::{value_parser, Arg, Command};
use env_logger::Env;
use log::info;
use rand::Rng;

use simtgpu::config::GpuConfig;
use simtgpu::kernel::{MatAdd, MatAddConfig};
use simtgpu::system::Gpu;

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = Command::new("matadd")
        .about("Element-wise vector add on the simulated GPU")
        .args(GpuConfig::args())
        .arg(
            Arg::new("size")
                .short('n')
                .long("size")
                .default_value("8")
                .value_parser(value_parser!(usize)),
        )
        .arg(Arg::new("trace").long("trace"))
        .get_matches();
    let config = GpuConfig::from_matches(&args)?;
    let size = args.get_one::<usize>("size").copied().unwrap_or(8);

    // %blockDim is the thread count of the running block, so a partial final
    // block would compute the wrong global index
    ensure!(
        size % config.threads_per_block == 0,
        "{} threads is not a multiple of {} threads per block",
        size,
        config.threads_per_block
    );

    let mut rng = rand::thread_rng();
    let kernel = MatAdd::new(MatAddConfig {
        a: (0..size).map(|_| rng.gen()).collect(),
        b: (0..size).map(|_| rng.gen()).collect(),
    })?;

    info!("Starting simulator: {:?}", config);
    let mut gpu = Gpu::new(config)?;
    let trace_path = args.get_one::<String>("trace");
    if trace_path.is_some() {
        gpu.enable_trace();
    }
    let cycles = gpu.run_once(&kernel, 100_000)?;
    info!("Simulator finished after {} cycles, result verified", cycles);

    if let (Some(path), Some(trace)) = (trace_path, gpu.trace.as_ref()) {
        trace.write_text(path)?;
        info!("Trace of {} cycles written to {}", trace.len(), path);
    }
    Ok(())
}
