use crate::compute::scheduler::CoreState;
use crate::isa::ControlSignals;
use crate::memory::{ConsumerRequest, Response};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LsuState {
    #[default]
    Idle,
    Requesting,
    Waiting,
    Done,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Lsu {
    pub state: LsuState,
    pub out: u8,
}

impl Lsu {
    /// Request presented to the data controller while REQUESTING.
    /// Address comes from `rs`, store data from `rt`.
    pub fn request(&self, signals: &ControlSignals, rs: u8, rt: u8) -> Option<ConsumerRequest<u8>> {
        if self.state != LsuState::Requesting {
            return None;
        }
        if signals.mem_write {
            Some(ConsumerRequest::write(rs, rt))
        } else if signals.mem_read {
            Some(ConsumerRequest::read(rs))
        } else {
            None
        }
    }

    pub fn step(
        &self,
        core_state: CoreState,
        signals: &ControlSignals,
        granted: bool,
        response: Option<Response<u8>>,
    ) -> Lsu {
        let mut next = *self;
        match self.state {
            LsuState::Idle => {
                if core_state == CoreState::Request && signals.is_memory_op() {
                    next.state = LsuState::Requesting;
                }
            }
            LsuState::Requesting => {
                if granted {
                    next.state = LsuState::Waiting;
                }
            }
            LsuState::Waiting => match response {
                Some(Response::Read(data)) => {
                    next.out = data;
                    next.state = LsuState::Done;
                }
                Some(Response::Write) => next.state = LsuState::Done,
                None => {}
            },
            LsuState::Done => {
                if core_state == CoreState::Update {
                    next.state = LsuState::Idle;
                }
            }
        }
        next
    }
}
