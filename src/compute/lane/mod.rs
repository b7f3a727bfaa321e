pub mod alu;
pub mod lsu;
pub mod pc;
pub mod registers;

use crate::compute::scheduler::CoreState;
use crate::isa::{ControlSignals, RegInput};
use crate::memory::{ConsumerRequest, Response};
use lsu::{Lsu, LsuState};
use pc::ProgramCounter;
use registers::RegisterFile;

/// Per-tick inputs a lane sees; everything is read from the core snapshot.
#[derive(Debug, Clone, Copy)]
pub struct LaneInputs<'a> {
    pub core_state: CoreState,
    pub signals: &'a ControlSignals,
    pub current_pc: u8,
    pub granted: bool,
    pub response: Option<Response<u8>>,
}

/// One SIMD lane: register file, NZP/next-PC unit, ALU output latch and LSU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lane {
    pub index: usize,
    pub active: bool,
    pub registers: RegisterFile,
    pub pc: ProgramCounter,
    pub alu_out: u8,
    pub lsu: Lsu,
}

impl Lane {
    pub fn new(index: usize) -> Self {
        Lane {
            index,
            active: false,
            registers: RegisterFile::new(index as u8),
            pc: ProgramCounter::default(),
            alu_out: 0,
            lsu: Lsu::default(),
        }
    }

    /// Bring the lane up for a freshly dispatched block.
    pub fn activate(&mut self, block_idx: u8, block_dim: u8) {
        *self = Lane::new(self.index);
        self.active = self.index < block_dim as usize;
        self.registers.bind_block(block_idx, block_dim);
    }

    pub fn deactivate(&mut self) {
        self.active = false;
    }

    pub fn memory_request(&self, signals: &ControlSignals) -> Option<ConsumerRequest<u8>> {
        if !self.active {
            return None;
        }
        self.lsu.request(
            signals,
            self.registers.read(signals.rs),
            self.registers.read(signals.rt),
        )
    }

    pub fn lsu_done(&self) -> bool {
        self.lsu.state == LsuState::Done
    }

    pub fn step(&self, inputs: LaneInputs) -> Lane {
        if !self.active {
            return *self;
        }
        let signals = inputs.signals;
        let mut next = *self;
        next.lsu = self
            .lsu
            .step(inputs.core_state, signals, inputs.granted, inputs.response);

        match inputs.core_state {
            CoreState::Execute => {
                let rs = self.registers.read(signals.rs);
                let rt = self.registers.read(signals.rt);
                next.alu_out = alu::execute(signals, rs, rt);
                next.pc.next_pc = self.pc.compute_next(inputs.current_pc, signals);
            }
            CoreState::Update => {
                if signals.reg_write {
                    let value = match signals.reg_input {
                        RegInput::Alu => self.alu_out,
                        RegInput::Memory => self.lsu.out,
                        RegInput::Immediate => signals.immediate,
                    };
                    next.registers.write(signals.rd, value);
                }
                next.pc.update_nzp(signals, self.alu_out);
            }
            _ => {}
        }
        next
    }
}
