use std::fmt;

use crate::compute::fetcher::FetcherState;
use crate::isa::ControlSignals;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CoreState {
    #[default]
    Idle,
    Fetch,
    Decode,
    Request,
    Wait,
    Execute,
    Update,
}

impl fmt::Display for CoreState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CoreState::Idle => "IDLE",
            CoreState::Fetch => "FETCH",
            CoreState::Decode => "DECODE",
            CoreState::Request => "REQUEST",
            CoreState::Wait => "WAIT",
            CoreState::Execute => "EXECUTE",
            CoreState::Update => "UPDATE",
        };
        write!(f, "{}", s)
    }
}

/// Everything the scheduler looks at to pick its next state.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerInputs<'a> {
    pub start: bool,
    pub fetcher: FetcherState,
    pub signals: &'a ControlSignals,
    /// True when every active lane's LSU has reached DONE.
    pub lsus_done: bool,
}

/// IDLE -> FETCH -> DECODE -> REQUEST -> (WAIT) -> EXECUTE -> UPDATE -> FETCH | IDLE
pub fn next_state(state: CoreState, inputs: SchedulerInputs) -> CoreState {
    match state {
        CoreState::Idle => {
            if inputs.start {
                CoreState::Fetch
            } else {
                CoreState::Idle
            }
        }
        CoreState::Fetch => {
            if inputs.fetcher == FetcherState::Done {
                CoreState::Decode
            } else {
                CoreState::Fetch
            }
        }
        CoreState::Decode => CoreState::Request,
        CoreState::Request => {
            if inputs.signals.is_memory_op() {
                CoreState::Wait
            } else {
                CoreState::Execute
            }
        }
        CoreState::Wait => {
            if inputs.lsus_done {
                CoreState::Execute
            } else {
                CoreState::Wait
            }
        }
        CoreState::Execute => CoreState::Update,
        CoreState::Update => {
            if inputs.signals.ret {
                CoreState::Idle
            } else {
                CoreState::Fetch
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::{decode, Instruction, Opcode};

    fn inputs(signals: &ControlSignals) -> SchedulerInputs {
        SchedulerInputs {
            start: false,
            fetcher: FetcherState::Idle,
            signals,
            lsus_done: false,
        }
    }

    #[test]
    fn test_alu_instruction_bypasses_wait() {
        let add = decode(Instruction::rrr(Opcode::Add, 0, 0, 0));
        let i = inputs(&add);
        assert_eq!(next_state(CoreState::Idle, i), CoreState::Idle);
        assert_eq!(next_state(CoreState::Idle, SchedulerInputs { start: true, ..i }), CoreState::Fetch);
        assert_eq!(next_state(CoreState::Fetch, i), CoreState::Fetch);
        assert_eq!(
            next_state(CoreState::Fetch, SchedulerInputs { fetcher: FetcherState::Done, ..i }),
            CoreState::Decode
        );
        assert_eq!(next_state(CoreState::Decode, i), CoreState::Request);
        assert_eq!(next_state(CoreState::Request, i), CoreState::Execute);
        assert_eq!(next_state(CoreState::Execute, i), CoreState::Update);
        assert_eq!(next_state(CoreState::Update, i), CoreState::Fetch);
    }

    #[test]
    fn test_memory_instruction_waits_for_lsus() {
        let ldr = decode(Instruction::rrr(Opcode::Ldr, 0, 1, 0));
        let i = inputs(&ldr);
        assert_eq!(next_state(CoreState::Request, i), CoreState::Wait);
        assert_eq!(next_state(CoreState::Wait, i), CoreState::Wait);
        assert_eq!(
            next_state(CoreState::Wait, SchedulerInputs { lsus_done: true, ..i }),
            CoreState::Execute
        );
    }

    #[test]
    fn test_ret_returns_to_idle() {
        let ret = decode(Instruction::ret());
        assert_eq!(next_state(CoreState::Update, inputs(&ret)), CoreState::Idle);
    }
}
