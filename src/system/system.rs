use anyhow::{bail, Result};
use log::{info, trace};

use crate::compute::{Core, CoreInputs};
use crate::config::{DeviceControlRegister, GpuConfig};
use crate::dispatch::Dispatcher;
use crate::kernel::kernel::Kernel;
use crate::memory::{Memory, MemoryController};
use crate::system::stats::SimStats;
use crate::trace::ExecutionTrace;

/// The whole device: host control register, dispatcher, cores and the two
/// arbitrated memories. Every tick evaluates all components against the
/// current state and commits the results together.
pub struct Gpu {
    pub config: GpuConfig,
    pub dcr: DeviceControlRegister,
    pub dispatcher: Dispatcher,
    pub cores: Vec<Core>,
    pub program_memory: Memory<u16>,
    pub data_memory: Memory<u8>,
    pub program_controller: MemoryController<u16>,
    pub data_controller: MemoryController<u8>,
    pub start: bool,
    pub cycle: u64,
    pub stats: SimStats,
    pub trace: Option<ExecutionTrace>,
}

impl Gpu {
    pub fn new(config: GpuConfig) -> Result<Gpu> {
        config.validate()?;
        let num_lanes = config.threads_per_block;
        Ok(Gpu {
            dcr: DeviceControlRegister::new(),
            dispatcher: Dispatcher::new(config.num_cores, config.threads_per_block),
            cores: (0..config.num_cores).map(|id| Core::new(id, num_lanes)).collect(),
            program_memory: Memory::new("program", config.program_read_latency, config.program_read_latency),
            data_memory: Memory::new("data", config.data_read_latency, config.data_write_latency),
            program_controller: MemoryController::new(
                "program",
                config.num_program_consumers(),
                config.program_channels,
                false,
            ),
            data_controller: MemoryController::new(
                "data",
                config.num_data_consumers(),
                config.data_channels,
                true,
            ),
            start: false,
            cycle: 0,
            stats: SimStats::default(),
            trace: None,
            config,
        })
    }

    pub fn enable_trace(&mut self) {
        self.trace = Some(ExecutionTrace::new());
    }

    /// Return every piece of device state to idle. Memory contents belong to
    /// the external devices and are kept.
    pub fn reset(&mut self) {
        self.dcr.reset();
        self.dispatcher.reset();
        self.cores.iter_mut().for_each(|c| c.reset());
        self.program_controller.reset();
        self.data_controller.reset();
        self.start = false;
        self.cycle = 0;
        self.stats.reset();
        if let Some(trace) = self.trace.as_mut() {
            trace.clear();
        }
    }

    pub fn load_program(&mut self, words: &[u16]) -> Result<()> {
        self.program_memory.load(0, words)
    }

    pub fn load_data(&mut self, base: usize, bytes: &[u8]) -> Result<()> {
        self.data_memory.load(base, bytes)
    }

    /// Latch the thread count and raise `start`. If `start` is still held
    /// from a previous kernel it is dropped for one tick first so the
    /// dispatcher sees a fresh edge. A launch while the previous kernel is
    /// still running is ignored by the dispatcher.
    pub fn launch(&mut self, thread_count: u8) {
        if self.start {
            self.start = false;
            self.tick();
        }
        self.dcr.write(true, thread_count);
        self.start = true;
    }

    pub fn done(&self) -> bool {
        self.dispatcher.done
    }

    pub fn tick(&mut self) {
        // evaluate
        let core_done = self.cores.iter().map(|c| c.done).collect::<Vec<_>>();
        let dispatch = self
            .dispatcher
            .evaluate(self.start, self.dcr.thread_count(), &core_done);

        let program_requests = self.cores.iter().map(|c| c.fetch_request()).collect::<Vec<_>>();
        let data_requests = self
            .cores
            .iter()
            .flat_map(|c| c.lsu_requests())
            .collect::<Vec<_>>();
        let program_step = self
            .program_controller
            .evaluate(&program_requests, &self.program_memory);
        let data_step = self.data_controller.evaluate(&data_requests, &self.data_memory);

        let lanes = self.config.threads_per_block;
        let next_cores = self
            .cores
            .iter()
            .enumerate()
            .map(|(i, core)| {
                let consumers = i * lanes..(i + 1) * lanes;
                let lsu_responses = consumers
                    .clone()
                    .map(|c| self.data_controller.response(c))
                    .collect::<Vec<_>>();
                core.step(CoreInputs {
                    start: dispatch.assignments[i],
                    fetch_granted: program_step.granted[i],
                    fetch_response: self.program_controller.response(i),
                    lsu_granted: &data_step.granted[consumers],
                    lsu_responses: &lsu_responses,
                })
            })
            .collect::<Vec<_>>();

        for core in self.cores.iter() {
            if let Some(signals) = core.retiring() {
                let class = signals.opcode.map(|op| op.name()).unwrap_or("NOP");
                self.stats.record_retire(class);
                if signals.ret {
                    self.stats.blocks_completed += 1;
                }
            }
        }
        self.stats.program_reads += program_step.granted.iter().filter(|g| **g).count();
        for (granted, req) in data_step.granted.iter().zip(data_requests.iter()) {
            match (*granted, req) {
                (true, Some(r)) if r.is_write() => self.stats.data_writes += 1,
                (true, Some(_)) => self.stats.data_reads += 1,
                _ => {}
            }
        }

        // commit
        for (addr, data) in data_step.writes {
            self.data_memory.write(addr, data);
        }
        self.program_controller = program_step.next;
        self.data_controller = data_step.next;
        self.dispatcher = dispatch.next;
        self.cores = next_cores;
        self.cycle += 1;
        self.stats.cycles += 1;

        trace!(
            "cycle {}: {}",
            self.cycle,
            self.cores
                .iter()
                .map(|c| format!("core {} {} pc {:#04x}", c.id, c.state, c.pc))
                .collect::<Vec<_>>()
                .join(", ")
        );
        if let Some(trace) = self.trace.as_mut() {
            trace.push(self.cycle, &self.cores);
        }
    }

    /// Tick until the dispatcher reports completion. `max_cycles` is a host
    /// side budget; running past it is reported as an error.
    pub fn run(&mut self, max_cycles: u64) -> Result<u64> {
        let begin = self.cycle;
        while !self.done() {
            if self.cycle - begin >= max_cycles {
                bail!(
                    "kernel did not finish within {} cycles ({} of {} blocks dispatched)",
                    max_cycles,
                    self.dispatcher.next_block_id,
                    self.dispatcher.total_blocks
                );
            }
            self.tick();
        }
        Ok(self.cycle - begin)
    }

    pub fn run_once<K: Kernel>(&mut self, kernel: &K, max_cycles: u64) -> Result<u64> {
        kernel.log();
        self.load_program(&kernel.program()?)?;
        for (base, bytes) in kernel.data()? {
            self.load_data(base as usize, &bytes)?;
        }
        self.launch(kernel.thread_count());
        let cycles = self.run(max_cycles)?;
        info!("{} finished in {} cycles", kernel.get_kernel_type(), cycles);
        self.stats.log();
        kernel.check(&self.data_memory)?;
        Ok(cycles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::{CoreState, FetcherState, LsuState};
    use crate::isa::assemble;
    use crate::kernel::{MatAdd, MatAddConfig, MatMul, MatMulConfig};

    fn gpu_with(config: GpuConfig, src: &str) -> Result<Gpu> {
        let mut gpu = Gpu::new(config)?;
        gpu.load_program(&assemble(src)?)?;
        Ok(gpu)
    }

    fn vector_add() -> Result<MatAdd> {
        MatAdd::new(MatAddConfig {
            a: vec![0, 1, 2, 3, 4, 5, 6, 7],
            b: vec![7, 6, 5, 4, 3, 2, 1, 0],
        })
    }

    #[test]
    fn test_vector_add() -> Result<()> {
        let mut gpu = Gpu::new(GpuConfig::default())?;
        let cycles = gpu.run_once(&vector_add()?, 5000)?;
        assert_eq!(gpu.data_memory.dump(16, 8), &[7; 8]);
        assert!(gpu.done());
        assert_eq!(gpu.stats.blocks_completed, 2);
        assert_eq!(gpu.stats.retired["LDR"], 4);
        assert_eq!(gpu.stats.data_reads, 16);
        assert_eq!(gpu.stats.data_writes, 8);
        assert_eq!(gpu.stats.cycles, cycles);
        Ok(())
    }

    #[test]
    fn test_matmul() -> Result<()> {
        let kernel = MatMul::new(MatMulConfig {
            n: 2,
            a: vec![1, 2, 3, 4],
            b: vec![1, 2, 3, 4],
        })?;
        let mut gpu = Gpu::new(GpuConfig::default())?;
        gpu.run_once(&kernel, 10000)?;
        assert_eq!(gpu.data_memory.dump(8, 4), &[7, 10, 15, 22]);
        // single block: the second core never starts
        assert_eq!(gpu.stats.blocks_completed, 1);
        assert_eq!(gpu.stats.retired["BR"], 2);
        Ok(())
    }

    #[test]
    fn test_vector_add_under_contention() -> Result<()> {
        let mut fast = Gpu::new(GpuConfig::default())?;
        let fast_cycles = fast.run_once(&vector_add()?, 5000)?;
        for (data_channels, num_cores) in [(1, 2), (2, 1), (3, 4)] {
            let config = GpuConfig {
                data_channels,
                num_cores,
                data_read_latency: 3,
                ..Default::default()
            };
            let mut gpu = Gpu::new(config)?;
            let cycles = gpu.run_once(&vector_add()?, 10000)?;
            assert!(cycles > fast_cycles, "{} <= {}", cycles, fast_cycles);
            assert_eq!(gpu.data_memory.dump(16, 8), &[7; 8]);
        }
        Ok(())
    }

    #[test]
    fn test_load_waits_for_latency() -> Result<()> {
        for latency in [1u32, 2, 5] {
            let config = GpuConfig {
                data_read_latency: latency,
                program_read_latency: latency,
                ..Default::default()
            };
            let mut gpu = gpu_with(
                config,
                "
                CONST R0, #5
                LDR R1, R0
                RET",
            )?;
            gpu.enable_trace();
            gpu.launch(1);
            gpu.run(1000)?;
            let history = gpu.trace.as_ref().map(|t| t.lsu_history(0, 0)).unwrap_or_default();
            let accepted = history
                .iter()
                .position(|s| *s == LsuState::Waiting)
                .ok_or_else(|| anyhow::anyhow!("load never issued"))?;
            let waiting = history[accepted..]
                .iter()
                .take_while(|s| **s == LsuState::Waiting)
                .count();
            // WAITING from the acceptance tick until the pulse arrives
            assert_eq!(waiting as u32, latency);
            assert_eq!(history[accepted + waiting], LsuState::Done);

            // instruction fetches go through the same channel timing
            let trace = gpu.trace.clone().unwrap_or_default();
            let fetches = trace.records.iter().map(|r| r.cores[0].fetcher).collect::<Vec<_>>();
            let accepted = fetches
                .iter()
                .position(|s| *s == FetcherState::Waiting)
                .ok_or_else(|| anyhow::anyhow!("fetch never issued"))?;
            let waiting = fetches[accepted..]
                .iter()
                .take_while(|s| **s == FetcherState::Waiting)
                .count();
            assert_eq!(waiting as u32, latency);
            assert_eq!(fetches[accepted + waiting], FetcherState::Done);
        }
        Ok(())
    }

    #[test]
    fn test_lsu_lifecycle_once_per_memory_instruction() -> Result<()> {
        let mut gpu = Gpu::new(GpuConfig::default())?;
        gpu.enable_trace();
        gpu.run_once(&vector_add()?, 5000)?;
        let trace = gpu.trace.clone().unwrap_or_default();
        let cycle = [
            LsuState::Idle,
            LsuState::Requesting,
            LsuState::Waiting,
            LsuState::Done,
        ];
        let mut expected = cycle.repeat(3);
        expected.push(LsuState::Idle);
        for core in 0..2 {
            for lane in 0..4 {
                let seq = ExecutionTrace::dedup(&trace.lsu_history(core, lane));
                assert_eq!(seq, expected, "core {} lane {}", core, lane);
            }
        }
        Ok(())
    }

    #[test]
    fn test_straight_line_pc_convergence() -> Result<()> {
        let mut gpu = Gpu::new(GpuConfig::default())?;
        gpu.enable_trace();
        gpu.run_once(&vector_add()?, 5000)?;
        let trace = gpu.trace.clone().unwrap_or_default();
        assert!(!trace.is_empty());
        for record in trace.records.iter() {
            for core in record.cores.iter() {
                let pcs = core
                    .lanes
                    .iter()
                    .filter(|l| l.active)
                    .map(|l| l.next_pc)
                    .collect::<Vec<_>>();
                assert!(pcs.windows(2).all(|w| w[0] == w[1]), "cycle {}: {:?}", record.cycle, pcs);
            }
        }
        Ok(())
    }

    #[test]
    fn test_partial_final_block() -> Result<()> {
        let mut gpu = gpu_with(
            GpuConfig::default(),
            "
            CONST R1, #4
            MUL R0, %blockIdx, R1
            ADD R0, R0, %threadIdx         ; global index with a fixed stride
            CONST R2, #10
            ADD R3, R0, R2
            STR R0, R3                     ; data[i] = i + 10
            CONST R4, #32
            ADD R5, R4, R0
            STR R5, %blockDim              ; data[32 + i] = threads in this block
            CONST R4, #64
            ADD R5, R4, R0
            STR R5, %blockIdx              ; data[64 + i] = block index
            RET",
        )?;
        gpu.launch(6);
        gpu.run(5000)?;
        assert_eq!(gpu.data_memory.dump(0, 8), &[10, 11, 12, 13, 14, 15, 0, 0]);
        assert_eq!(gpu.data_memory.dump(32, 8), &[4, 4, 4, 4, 2, 2, 0, 0]);
        assert_eq!(gpu.data_memory.dump(64, 8), &[0, 0, 0, 0, 1, 1, 0, 0]);
        Ok(())
    }

    #[test]
    fn test_more_blocks_than_cores() -> Result<()> {
        let config = GpuConfig {
            num_cores: 2,
            threads_per_block: 2,
            ..Default::default()
        };
        let mut gpu = gpu_with(
            config,
            "
            MUL R0, %blockIdx, %blockDim
            ADD R0, R0, %threadIdx
            STR R0, R0
            RET",
        )?;
        gpu.load_data(0, &[0xEE; 16])?;
        gpu.launch(12);
        gpu.run(10000)?;
        assert_eq!(gpu.data_memory.dump(0, 13), &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 0xEE]);
        assert_eq!(gpu.stats.blocks_completed, 6);
        Ok(())
    }

    #[test]
    fn test_div_by_zero_and_unknown_opcodes() -> Result<()> {
        let mut gpu = gpu_with(
            GpuConfig::default(),
            "
            CONST R1, #9
            NOP
            DIV R2, R1, R0                 ; R0 is zero
            CONST R3, #100
            STR R3, R2
            RET",
        )?;
        // raw reserved opcode in place of the NOP
        gpu.program_memory.write(1, 0xC123);
        gpu.launch(1);
        gpu.run(1000)?;
        assert_eq!(gpu.data_memory.read(100), 0xFF);
        assert_eq!(gpu.stats.retired["NOP"], 1);
        Ok(())
    }

    #[test]
    fn test_done_and_relaunch() -> Result<()> {
        let mut gpu = gpu_with(
            GpuConfig::default(),
            "
            CONST R0, #1
            ADD R1, %threadIdx, R0
            STR %threadIdx, R1
            RET",
        )?;
        assert!(!gpu.done());
        gpu.launch(3);
        gpu.tick();
        assert!(!gpu.done());
        gpu.run(1000)?;
        assert!(gpu.done());
        assert_eq!(gpu.data_memory.dump(0, 4), &[1, 2, 3, 0]);
        // done holds while nothing new is launched
        for _ in 0..5 {
            gpu.tick();
            assert!(gpu.done());
        }

        gpu.load_program(&assemble("CONST R0, #42\nSTR %threadIdx, R0\nRET")?)?;
        gpu.launch(2);
        gpu.tick();
        assert!(!gpu.done());
        gpu.run(1000)?;
        assert_eq!(gpu.data_memory.dump(0, 4), &[42, 42, 3, 0]);
        Ok(())
    }

    #[test]
    fn test_launch_mid_kernel_does_not_drop_blocks() -> Result<()> {
        let config = GpuConfig {
            num_cores: 2,
            threads_per_block: 2,
            ..Default::default()
        };
        let mut gpu = gpu_with(
            config,
            "
            MUL R0, %blockIdx, %blockDim
            ADD R0, R0, %threadIdx
            CONST R1, #1
            ADD R2, R0, R1
            STR R0, R2                     ; data[i] = i + 1
            RET",
        )?;
        gpu.launch(8);
        for _ in 0..5 {
            gpu.tick();
        }
        assert!(!gpu.done());
        gpu.launch(2);
        gpu.run(5000)?;
        assert_eq!(gpu.data_memory.dump(0, 9), &[1, 2, 3, 4, 5, 6, 7, 8, 0]);
        assert_eq!(gpu.stats.blocks_completed, 4);
        assert_eq!(gpu.dispatcher.total_blocks, 4);
        Ok(())
    }

    #[test]
    fn test_reset_returns_to_idle() -> Result<()> {
        let mut gpu = Gpu::new(GpuConfig::default())?;
        gpu.run_once(&vector_add()?, 5000)?;
        gpu.launch(8);
        for _ in 0..10 {
            gpu.tick();
        }
        gpu.reset();
        assert_eq!(gpu.cycle, 0);
        assert!(!gpu.done());
        assert!(!gpu.start);
        assert_eq!(gpu.dcr.thread_count(), 0);
        assert!(gpu.cores.iter().all(|c| c.state == CoreState::Idle && !c.done));
        assert_eq!(gpu.data_controller.busy_channels(), 0);
        assert_eq!(gpu.program_controller.busy_channels(), 0);
        assert_eq!(gpu.stats, SimStats::default());
        // memory is external and survives
        assert_eq!(gpu.data_memory.dump(16, 8), &[7; 8]);
        Ok(())
    }

    #[test]
    fn test_run_budget_exceeded() -> Result<()> {
        let mut gpu = gpu_with(GpuConfig::default(), "LOOP: BR LOOP")?;
        gpu.launch(1);
        let err = gpu.run(200).unwrap_err();
        assert!(err.to_string().contains("did not finish"));
        Ok(())
    }

    #[test]
    fn test_rejects_invalid_config() {
        assert!(Gpu::new(GpuConfig { num_cores: 0, ..Default::default() }).is_err());
    }
}
