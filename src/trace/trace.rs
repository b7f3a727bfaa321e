use std::fs::File;
use std::io::prelude::*;
use std::io::BufWriter;
use std::ops::Index;
use std::path::Path;

use anyhow::{Context, Result};

use crate::compute::{Core, CoreState, FetcherState, LsuState};
use crate::isa::Instruction;
use crate::util::NUM_GP_REGISTERS;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaneSnapshot {
    pub active: bool,
    pub lsu: LsuState,
    pub next_pc: u8,
    pub nzp: u8,
    pub registers: [u8; NUM_GP_REGISTERS],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreSnapshot {
    pub state: CoreState,
    pub fetcher: FetcherState,
    pub pc: u8,
    pub instruction: Instruction,
    pub block: Option<u8>,
    pub lanes: Vec<LaneSnapshot>,
}

impl CoreSnapshot {
    pub fn capture(core: &Core) -> Self {
        CoreSnapshot {
            state: core.state,
            fetcher: core.fetcher.state,
            pc: core.pc,
            instruction: core.fetcher.instruction,
            block: core.block.map(|b| b.id),
            lanes: core
                .lanes
                .iter()
                .map(|l| LaneSnapshot {
                    active: l.active,
                    lsu: l.lsu.state,
                    next_pc: l.pc.next_pc,
                    nzp: l.pc.nzp,
                    registers: *l.registers.general_purpose(),
                })
                .collect(),
        }
    }
}

/// Committed state of every core after one tick.
#[derive(Debug, Clone)]
pub struct CycleRecord {
    pub cycle: u64,
    pub cores: Vec<CoreSnapshot>,
}

/// Per-tick history of the machine, kept only when tracing is enabled.
#[derive(Debug, Clone, Default)]
pub struct ExecutionTrace {
    pub records: Vec<CycleRecord>,
}

impl ExecutionTrace {
    pub fn new() -> ExecutionTrace {
        ExecutionTrace { records: Vec::new() }
    }

    pub fn push(&mut self, cycle: u64, cores: &[Core]) {
        self.records.push(CycleRecord {
            cycle,
            cores: cores.iter().map(CoreSnapshot::capture).collect(),
        });
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// LSU state of one lane at every recorded cycle.
    pub fn lsu_history(&self, core: usize, lane: usize) -> Vec<LsuState> {
        self.records
            .iter()
            .map(|r| r.cores[core].lanes[lane].lsu)
            .collect()
    }

    /// Collapse consecutive repeats, e.g. to read off a state sequence.
    pub fn dedup<T: PartialEq + Clone>(history: &[T]) -> Vec<T> {
        let mut out: Vec<T> = Vec::new();
        for h in history {
            if out.last() != Some(h) {
                out.push(h.clone());
            }
        }
        out
    }

    pub fn write_text<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
        let mut w = BufWriter::new(file);
        for record in self.records.iter() {
            writeln!(w, "cycle: {}", record.cycle)?;
            for (id, core) in record.cores.iter().enumerate() {
                write!(w, "  core {}: {} pc {:#04x} fetch {:?}", id, core.state, core.pc, core.fetcher)?;
                if let Some(block) = core.block {
                    write!(w, " block {}", block)?;
                }
                writeln!(w, " inst {}", core.instruction)?;
                for (idx, lane) in core.lanes.iter().enumerate().filter(|(_, l)| l.active) {
                    write!(w, "    lane {}: lsu {:?} nzp {:03b} regs", idx, lane.lsu, lane.nzp)?;
                    for r in lane.registers.iter() {
                        write!(w, " {}", r)?;
                    }
                    writeln!(w)?;
                }
            }
        }
        w.flush()?;
        Ok(())
    }
}

impl Index<usize> for ExecutionTrace {
    type Output = CycleRecord;

    fn index(&self, index: usize) -> &Self::Output {
        &self.records[index]
    }
}
