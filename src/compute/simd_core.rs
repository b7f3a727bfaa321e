use log::{debug, trace};

use crate::compute::fetcher::Fetcher;
use crate::compute::lane::{Lane, LaneInputs};
use crate::compute::scheduler::{next_state, CoreState, SchedulerInputs};
use crate::dispatch::Block;
use crate::isa::{decode, ControlSignals};
use crate::memory::{ConsumerRequest, Response};
use crate::util::ENTRY_PC;

/// Inputs sampled by a core during one tick. Grants are computed by the
/// controllers from the same snapshot; responses are last tick's pulses.
#[derive(Debug, Clone, Copy)]
pub struct CoreInputs<'a> {
    pub start: Option<Block>,
    pub fetch_granted: bool,
    pub fetch_response: Option<Response<u16>>,
    pub lsu_granted: &'a [bool],
    pub lsu_responses: &'a [Option<Response<u8>>],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Core {
    pub id: usize,
    pub state: CoreState,
    pub fetcher: Fetcher,
    pub pc: u8,
    pub decoded: ControlSignals,
    pub block: Option<Block>,
    pub done: bool,
    pub lanes: Vec<Lane>,
}

impl Core {
    pub fn new(id: usize, num_lanes: usize) -> Self {
        Core {
            id,
            state: CoreState::Idle,
            fetcher: Fetcher::default(),
            pc: 0,
            decoded: ControlSignals::default(),
            block: None,
            done: false,
            lanes: (0..num_lanes).map(Lane::new).collect(),
        }
    }

    pub fn reset(&mut self) {
        *self = Core::new(self.id, self.lanes.len());
    }

    pub fn active_lanes(&self) -> impl Iterator<Item = &Lane> {
        self.lanes.iter().filter(|l| l.active)
    }

    pub fn fetch_request(&self) -> Option<ConsumerRequest<u16>> {
        self.fetcher.request(self.pc)
    }

    pub fn lsu_requests(&self) -> Vec<Option<ConsumerRequest<u8>>> {
        self.lanes
            .iter()
            .map(|l| l.memory_request(&self.decoded))
            .collect()
    }

    /// Instruction retiring this tick, if any.
    pub fn retiring(&self) -> Option<ControlSignals> {
        match self.state {
            CoreState::Update => Some(self.decoded),
            _ => None,
        }
    }

    fn start_block(&mut self, block: Block) {
        debug!(
            "core {}: start block {} with {} threads",
            self.id, block.id, block.thread_count
        );
        self.pc = ENTRY_PC;
        self.block = Some(block);
        self.done = false;
        self.decoded = ControlSignals::default();
        self.fetcher = Fetcher::default();
        for lane in self.lanes.iter_mut() {
            lane.activate(block.id, block.thread_count as u8);
        }
    }

    /// Evaluate one tick from this snapshot and return the next state.
    pub fn step(&self, inputs: CoreInputs) -> Core {
        let mut next = self.clone();
        let lsus_done = self.active_lanes().all(|l| l.lsu_done());
        next.state = next_state(
            self.state,
            SchedulerInputs {
                start: inputs.start.is_some(),
                fetcher: self.fetcher.state,
                signals: &self.decoded,
                lsus_done,
            },
        );
        next.fetcher = self
            .fetcher
            .step(self.state, inputs.fetch_granted, inputs.fetch_response);

        for (i, lane) in self.lanes.iter().enumerate() {
            next.lanes[i] = lane.step(LaneInputs {
                core_state: self.state,
                signals: &self.decoded,
                current_pc: self.pc,
                granted: inputs.lsu_granted[i],
                response: inputs.lsu_responses[i],
            });
        }

        match self.state {
            CoreState::Idle => {
                if let Some(block) = inputs.start {
                    next.start_block(block);
                }
            }
            CoreState::Decode => {
                next.decoded = decode(self.fetcher.instruction);
                trace!(
                    "core {}: pc {:#04x} decode {}",
                    self.id,
                    self.pc,
                    self.fetcher.instruction
                );
            }
            CoreState::Update => {
                if self.decoded.ret {
                    next.done = true;
                    next.lanes.iter_mut().for_each(|l| l.deactivate());
                    if let Some(block) = self.block {
                        debug!("core {}: block {} done", self.id, block.id);
                    }
                } else {
                    // lanes never diverge; lane 0 speaks for the block
                    next.pc = self.lanes[0].pc.next_pc;
                }
            }
            _ => {}
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::lane::lsu::LsuState;
    use crate::isa::{assemble, Instruction};

    /// Drive a single core against an ideal one-cycle memory, serving every
    /// request immediately.
    fn run_core(core: &mut Core, program: &[u16], data: &mut [u8; 256], max_ticks: usize) -> usize {
        let n = core.lanes.len();
        let mut fetch_response = None;
        let mut lsu_responses = vec![None; n];
        let mut start = Some(core.block.unwrap_or(Block { id: 0, thread_count: n }));
        for tick in 0..max_ticks {
            let fetch_req = core.fetch_request();
            let lsu_reqs = core.lsu_requests();
            let inputs = CoreInputs {
                start: start.take(),
                fetch_granted: fetch_req.is_some(),
                fetch_response,
                lsu_granted: &lsu_reqs.iter().map(|r| r.is_some()).collect::<Vec<_>>(),
                lsu_responses: &lsu_responses,
            };
            let next = core.step(inputs);
            fetch_response = fetch_req.map(|r| Response::Read(program[r.address as usize]));
            lsu_responses = lsu_reqs
                .iter()
                .map(|r| {
                    r.map(|r| match r.write_data {
                        Some(d) => {
                            data[r.address as usize] = d;
                            Response::Write
                        }
                        None => Response::Read(data[r.address as usize]),
                    })
                })
                .collect();
            *core = next;
            if core.done {
                return tick;
            }
        }
        panic!("core did not finish in {} ticks", max_ticks);
    }

    #[test]
    fn test_straight_line_program() -> anyhow::Result<()> {
        let program = assemble(
            "
            CONST R0, #3
            ADD R1, R0, %threadIdx
            STR %threadIdx, R1
            RET",
        )?;
        let mut data = [0u8; 256];
        let mut core = Core::new(0, 4);
        core.block = Some(Block { id: 0, thread_count: 3 });
        run_core(&mut core, &program, &mut data, 200);
        assert_eq!(&data[0..4], &[3, 4, 5, 0]);
        assert_eq!(core.state, CoreState::Idle);
        assert!(core.lanes.iter().all(|l| !l.active));
        Ok(())
    }

    #[test]
    fn test_lane_zero_pc_drives_fetch() -> anyhow::Result<()> {
        // loop three times: R0 counts, R1 limit
        let program = assemble(
            "
            CONST R1, #3
            CONST R2, #1
        LOOP:
            ADD R0, R0, R2
            CMP R0, R1
            BRn LOOP
            STR %threadIdx, R0
            RET",
        )?;
        let mut data = [0u8; 256];
        let mut core = Core::new(0, 2);
        run_core(&mut core, &program, &mut data, 500);
        assert_eq!(&data[0..2], &[3, 3]);
        Ok(())
    }

    #[test]
    fn test_wait_ignores_inactive_lanes() {
        let mut core = Core::new(0, 4);
        core.start_block(Block { id: 0, thread_count: 1 });
        core.state = CoreState::Wait;
        core.decoded = crate::isa::decode(Instruction(0x7000));
        core.lanes[0].lsu.state = LsuState::Done;
        let next = core.step(CoreInputs {
            start: None,
            fetch_granted: false,
            fetch_response: None,
            lsu_granted: &[false; 4],
            lsu_responses: &[None; 4],
        });
        assert_eq!(next.state, CoreState::Execute);
    }
}
