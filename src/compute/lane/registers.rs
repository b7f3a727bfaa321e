use crate::util::{NUM_GP_REGISTERS, REG_BLOCK_DIM, REG_BLOCK_IDX, REG_THREAD_IDX};

/// Sixteen 8-bit registers. R0-R12 are stored; R13-R15 are derived from the
/// resident block and the lane position and ignore writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterFile {
    gp: [u8; NUM_GP_REGISTERS],
    block_idx: u8,
    block_dim: u8,
    thread_idx: u8,
}

impl RegisterFile {
    pub fn new(thread_idx: u8) -> Self {
        RegisterFile {
            gp: [0; NUM_GP_REGISTERS],
            block_idx: 0,
            block_dim: 0,
            thread_idx,
        }
    }

    /// Clear general purpose state and bind the special registers to a block.
    pub fn bind_block(&mut self, block_idx: u8, block_dim: u8) {
        self.gp = [0; NUM_GP_REGISTERS];
        self.block_idx = block_idx;
        self.block_dim = block_dim;
    }

    pub fn read(&self, r: usize) -> u8 {
        match r {
            REG_BLOCK_IDX => self.block_idx,
            REG_BLOCK_DIM => self.block_dim,
            REG_THREAD_IDX => self.thread_idx,
            _ => self.gp[r],
        }
    }

    pub fn write(&mut self, r: usize, value: u8) {
        if r < NUM_GP_REGISTERS {
            self.gp[r] = value;
        }
    }

    pub fn general_purpose(&self) -> &[u8; NUM_GP_REGISTERS] {
        &self.gp
    }
}
