use crate::compute::scheduler::CoreState;
use crate::isa::Instruction;
use crate::memory::{ConsumerRequest, Response};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FetcherState {
    #[default]
    Idle,
    Requesting,
    Waiting,
    Done,
}

/// Per-core instruction fetch unit, slaved to the scheduler's FETCH state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Fetcher {
    pub state: FetcherState,
    pub instruction: Instruction,
}

impl Fetcher {
    pub fn request(&self, pc: u8) -> Option<ConsumerRequest<u16>> {
        match self.state {
            FetcherState::Requesting => Some(ConsumerRequest::read(pc)),
            _ => None,
        }
    }

    pub fn step(&self, core_state: CoreState, granted: bool, response: Option<Response<u16>>) -> Fetcher {
        let mut next = *self;
        match self.state {
            FetcherState::Idle => {
                if core_state == CoreState::Fetch {
                    next.state = FetcherState::Requesting;
                }
            }
            FetcherState::Requesting => {
                if granted {
                    next.state = FetcherState::Waiting;
                }
            }
            FetcherState::Waiting => {
                if let Some(Response::Read(word)) = response {
                    next.instruction = Instruction(word);
                    next.state = FetcherState::Done;
                }
            }
            FetcherState::Done => {
                if core_state != CoreState::Fetch {
                    next.state = FetcherState::Idle;
                }
            }
        }
        next
    }
}
