pub const MEM_WORDS: usize = 1 << 8;

pub const NUM_REGISTERS: usize = 16;
pub const NUM_GP_REGISTERS: usize = 13;

pub const REG_BLOCK_IDX: usize = 13;
pub const REG_BLOCK_DIM: usize = 14;
pub const REG_THREAD_IDX: usize = 15;

pub const NZP_N: u8 = 0b100;
pub const NZP_Z: u8 = 0b010;
pub const NZP_P: u8 = 0b001;

pub const ENTRY_PC: u8 = 0;

pub fn ceil_div_usize(a: usize, b: usize) -> usize {
    (a + b - 1) / b
}

/// Extract `width` bits of `word` starting at bit `lo`.
pub fn bits(word: u16, lo: u32, width: u32) -> u16 {
    (word >> lo) & ((1 << width) - 1)
}
