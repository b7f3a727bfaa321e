use std::fmt;

use crate::util::bits;

/// Instruction classes keyed by the 4-bit opcode field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Add,
    Sub,
    Mul,
    Div,
    Ldr,
    Str,
    Const,
    Cmp,
    Br,
    Ret,
    Unknown(u8),
}

impl Opcode {
    pub const TABLE: [(u8, Opcode); 10] = [
        (0b0011, Opcode::Add),
        (0b0100, Opcode::Sub),
        (0b0101, Opcode::Mul),
        (0b0110, Opcode::Div),
        (0b0111, Opcode::Ldr),
        (0b1000, Opcode::Str),
        (0b1001, Opcode::Const),
        (0b1010, Opcode::Cmp),
        (0b1011, Opcode::Br),
        (0b1111, Opcode::Ret),
    ];

    pub fn from_bits(value: u8) -> Opcode {
        Self::TABLE
            .iter()
            .find(|(code, _)| *code == value & 0xF)
            .map(|(_, op)| *op)
            .unwrap_or(Opcode::Unknown(value & 0xF))
    }

    pub fn bits(&self) -> u8 {
        match self {
            Opcode::Unknown(value) => *value,
            op => Self::TABLE
                .iter()
                .find(|(_, known)| known == op)
                .map(|(code, _)| *code)
                .unwrap_or(0),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::Mul => "MUL",
            Opcode::Div => "DIV",
            Opcode::Ldr => "LDR",
            Opcode::Str => "STR",
            Opcode::Const => "CONST",
            Opcode::Cmp => "CMP",
            Opcode::Br => "BR",
            Opcode::Ret => "RET",
            Opcode::Unknown(_) => "NOP",
        }
    }
}

/// A fetched 16-bit instruction word. Field accessors are positional and do
/// not depend on the opcode; the decoder decides which fields are meaningful.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Instruction(pub u16);

impl Instruction {
    pub fn opcode(&self) -> Opcode {
        Opcode::from_bits(bits(self.0, 12, 4) as u8)
    }

    pub fn rd(&self) -> usize {
        bits(self.0, 8, 4) as usize
    }

    pub fn rs(&self) -> usize {
        bits(self.0, 4, 4) as usize
    }

    pub fn rt(&self) -> usize {
        bits(self.0, 0, 4) as usize
    }

    pub fn immediate(&self) -> u8 {
        bits(self.0, 0, 8) as u8
    }

    pub fn branch_condition(&self) -> u8 {
        bits(self.0, 8, 3) as u8
    }

    pub fn rrr(op: Opcode, rd: usize, rs: usize, rt: usize) -> Instruction {
        Instruction(
            ((op.bits() as u16) << 12)
                | (((rd & 0xF) as u16) << 8)
                | (((rs & 0xF) as u16) << 4)
                | ((rt & 0xF) as u16),
        )
    }

    pub fn constant(rd: usize, immediate: u8) -> Instruction {
        Instruction(
            ((Opcode::Const.bits() as u16) << 12) | (((rd & 0xF) as u16) << 8) | immediate as u16,
        )
    }

    pub fn branch(condition: u8, target: u8) -> Instruction {
        Instruction(
            ((Opcode::Br.bits() as u16) << 12) | (((condition & 0b111) as u16) << 8) | target as u16,
        )
    }

    pub fn ret() -> Instruction {
        Instruction((Opcode::Ret.bits() as u16) << 12)
    }
}

fn reg_name(r: usize) -> String {
    match r {
        13 => "%blockIdx".to_string(),
        14 => "%blockDim".to_string(),
        15 => "%threadIdx".to_string(),
        _ => format!("R{}", r),
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = self.opcode();
        match op {
            Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div => write!(
                f,
                "{} {}, {}, {}",
                op.name(),
                reg_name(self.rd()),
                reg_name(self.rs()),
                reg_name(self.rt())
            ),
            Opcode::Ldr => write!(f, "LDR {}, {}", reg_name(self.rd()), reg_name(self.rs())),
            Opcode::Str => write!(f, "STR {}, {}", reg_name(self.rs()), reg_name(self.rt())),
            Opcode::Const => write!(f, "CONST {}, #{}", reg_name(self.rd()), self.immediate()),
            Opcode::Cmp => write!(f, "CMP {}, {}", reg_name(self.rs()), reg_name(self.rt())),
            Opcode::Br => {
                let cond = self.branch_condition();
                let mut suffix = String::new();
                for (bit, c) in [(0b100, 'n'), (0b010, 'z'), (0b001, 'p')] {
                    if cond & bit != 0 {
                        suffix.push(c);
                    }
                }
                write!(f, "BR{} #{}", suffix, self.immediate())
            }
            Opcode::Ret => write!(f, "RET"),
            Opcode::Unknown(_) => write!(f, "NOP ({:#06x})", self.0),
        }
    }
}
