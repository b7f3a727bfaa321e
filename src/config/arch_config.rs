use anyhow::{ensure, Result};
use clap::{value_parser, Arg, ArgMatches};

use crate::util::MEM_WORDS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuConfig {
    pub num_cores: usize,
    pub threads_per_block: usize, // lanes per core
    pub data_channels: usize,
    pub program_channels: usize,
    pub data_read_latency: u32,
    pub data_write_latency: u32,
    pub program_read_latency: u32,
}

impl Default for GpuConfig {
    fn default() -> Self {
        GpuConfig {
            num_cores: 2,
            threads_per_block: 4,
            data_channels: 4,
            program_channels: 1,
            data_read_latency: 2,
            data_write_latency: 2,
            program_read_latency: 2,
        }
    }
}

impl GpuConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(self.num_cores > 0, "num_cores must be positive");
        // a launch carries an 8-bit thread count, so no block can hold more
        ensure!(
            self.threads_per_block > 0 && self.threads_per_block <= u8::MAX as usize,
            "threads_per_block must be in 1..={}, got {}",
            u8::MAX,
            self.threads_per_block
        );
        ensure!(
            self.data_channels > 0 && self.program_channels > 0,
            "every memory needs at least one channel"
        );
        ensure!(
            self.data_read_latency > 0
                && self.data_write_latency > 0
                && self.program_read_latency > 0,
            "memory latencies must be at least one cycle"
        );
        ensure!(
            self.num_data_consumers() <= MEM_WORDS,
            "{} cores x {} lanes exceeds the {} addressable threads",
            self.num_cores,
            self.threads_per_block,
            MEM_WORDS
        );
        Ok(())
    }

    /// One LSU per lane per core.
    pub fn num_data_consumers(&self) -> usize {
        self.num_cores * self.threads_per_block
    }

    /// One fetcher per core.
    pub fn num_program_consumers(&self) -> usize {
        self.num_cores
    }

    /// Command line overrides shared by the front-ends. Anything left out
    /// keeps its `GpuConfig::default()` value.
    pub fn args() -> Vec<Arg> {
        let count = |name: &'static str, short: char| {
            Arg::new(name)
                .short(short)
                .long(name)
                .value_parser(value_parser!(usize))
        };
        let latency = |name: &'static str| Arg::new(name).long(name).value_parser(value_parser!(u32));
        vec![
            count("cores", 'c'),
            count("threads-per-block", 't'),
            count("data-channels", 'd'),
            count("program-channels", 'p'),
            latency("data-read-latency"),
            latency("data-write-latency"),
            latency("program-read-latency"),
        ]
    }

    pub fn from_matches(args: &ArgMatches) -> Result<GpuConfig> {
        let d = GpuConfig::default();
        let count = |name: &str, default: usize| args.get_one::<usize>(name).copied().unwrap_or(default);
        let latency = |name: &str, default: u32| args.get_one::<u32>(name).copied().unwrap_or(default);
        let config = GpuConfig {
            num_cores: count("cores", d.num_cores),
            threads_per_block: count("threads-per-block", d.threads_per_block),
            data_channels: count("data-channels", d.data_channels),
            program_channels: count("program-channels", d.program_channels),
            data_read_latency: latency("data-read-latency", d.data_read_latency),
            data_write_latency: latency("data-write-latency", d.data_write_latency),
            program_read_latency: latency("program-read-latency", d.program_read_latency),
        };
        config.validate()?;
        Ok(config)
    }
}
