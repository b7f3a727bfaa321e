use crate::isa::ControlSignals;

/// Per-lane NZP flags and the candidate next PC computed in EXECUTE.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgramCounter {
    pub nzp: u8,
    pub next_pc: u8,
}

impl ProgramCounter {
    pub fn compute_next(&self, current_pc: u8, signals: &ControlSignals) -> u8 {
        if signals.branch && self.nzp & signals.branch_condition != 0 {
            signals.immediate
        } else {
            current_pc.wrapping_add(1)
        }
    }

    pub fn update_nzp(&mut self, signals: &ControlSignals, alu_out: u8) {
        if signals.nzp_write {
            self.nzp = alu_out & 0b111;
        }
    }
}
