use crate::isa::instruction::{Instruction, Opcode};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AluOp {
    #[default]
    Add,
    Sub,
    Mul,
    Div,
}

/// Source of the value written back to `rd` during UPDATE.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RegInput {
    #[default]
    Alu,
    Memory,
    Immediate,
}

/// Control signals for one instruction. `Default` is the inert bundle:
/// nothing is written, nothing touches memory, nothing branches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlSignals {
    pub opcode: Option<Opcode>,
    pub rd: usize,
    pub rs: usize,
    pub rt: usize,
    pub immediate: u8,
    pub alu_op: AluOp,
    pub compare: bool,
    pub reg_write: bool,
    pub reg_input: RegInput,
    pub mem_read: bool,
    pub mem_write: bool,
    pub nzp_write: bool,
    pub branch: bool,
    pub branch_condition: u8,
    pub ret: bool,
}

impl ControlSignals {
    pub fn is_memory_op(&self) -> bool {
        self.mem_read || self.mem_write
    }
}

pub fn decode(instruction: Instruction) -> ControlSignals {
    let opcode = instruction.opcode();
    let base = ControlSignals {
        opcode: Some(opcode),
        rd: instruction.rd(),
        rs: instruction.rs(),
        rt: instruction.rt(),
        immediate: instruction.immediate(),
        branch_condition: instruction.branch_condition(),
        ..Default::default()
    };
    let arith = |alu_op| ControlSignals {
        alu_op,
        reg_write: true,
        reg_input: RegInput::Alu,
        ..base
    };

    match opcode {
        Opcode::Add => arith(AluOp::Add),
        Opcode::Sub => arith(AluOp::Sub),
        Opcode::Mul => arith(AluOp::Mul),
        Opcode::Div => arith(AluOp::Div),
        Opcode::Ldr => ControlSignals {
            reg_write: true,
            reg_input: RegInput::Memory,
            mem_read: true,
            ..base
        },
        Opcode::Str => ControlSignals {
            mem_write: true,
            ..base
        },
        Opcode::Const => ControlSignals {
            reg_write: true,
            reg_input: RegInput::Immediate,
            ..base
        },
        Opcode::Cmp => ControlSignals {
            compare: true,
            nzp_write: true,
            ..base
        },
        Opcode::Br => ControlSignals {
            branch: true,
            ..base
        },
        Opcode::Ret => ControlSignals { ret: true, ..base },
        Opcode::Unknown(_) => base,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active_signals(c: &ControlSignals) -> Vec<&'static str> {
        let mut v = vec![];
        for (on, name) in [
            (c.compare, "compare"),
            (c.reg_write, "reg_write"),
            (c.mem_read, "mem_read"),
            (c.mem_write, "mem_write"),
            (c.nzp_write, "nzp_write"),
            (c.branch, "branch"),
            (c.ret, "ret"),
        ] {
            if on {
                v.push(name);
            }
        }
        v
    }

    #[test]
    fn test_arithmetic() {
        let c = decode(Instruction::rrr(Opcode::Div, 4, 5, 6));
        assert_eq!(active_signals(&c), vec!["reg_write"]);
        assert_eq!(c.alu_op, AluOp::Div);
        assert_eq!(c.reg_input, RegInput::Alu);
        assert_eq!((c.rd, c.rs, c.rt), (4, 5, 6));
    }

    #[test]
    fn test_memory_ops() {
        let ldr = decode(Instruction::rrr(Opcode::Ldr, 1, 2, 0));
        assert_eq!(active_signals(&ldr), vec!["reg_write", "mem_read"]);
        assert_eq!(ldr.reg_input, RegInput::Memory);
        assert!(ldr.is_memory_op());

        let str_ = decode(Instruction::rrr(Opcode::Str, 0, 2, 3));
        assert_eq!(active_signals(&str_), vec!["mem_write"]);
        assert!(str_.is_memory_op());
    }

    #[test]
    fn test_const_cmp_br_ret() {
        let c = decode(Instruction::constant(7, 42));
        assert_eq!(active_signals(&c), vec!["reg_write"]);
        assert_eq!(c.reg_input, RegInput::Immediate);
        assert_eq!(c.immediate, 42);

        let c = decode(Instruction::rrr(Opcode::Cmp, 0, 1, 2));
        assert_eq!(active_signals(&c), vec!["compare", "nzp_write"]);

        let c = decode(Instruction::branch(0b011, 9));
        assert_eq!(active_signals(&c), vec!["branch"]);
        assert_eq!(c.branch_condition, 0b011);
        assert_eq!(c.immediate, 9);

        let c = decode(Instruction::ret());
        assert_eq!(active_signals(&c), vec!["ret"]);
    }

    #[test]
    fn test_unknown_is_inert() {
        for word in [0x0000u16, 0x1234, 0x2FFF, 0xC123, 0xD000, 0xEFFF] {
            let c = decode(Instruction(word));
            assert!(active_signals(&c).is_empty(), "{:#06x} not inert", word);
            assert!(!c.is_memory_op());
        }
    }
}
