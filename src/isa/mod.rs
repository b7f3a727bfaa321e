pub mod assembler;
pub mod decoder;
pub mod instruction;
pub use assembler::{assemble, disassemble};
pub use decoder::{decode, AluOp, ControlSignals, RegInput};
pub use instruction::{Instruction, Opcode};
