use log::warn;

use crate::isa::{AluOp, ControlSignals};
use crate::util::{NZP_N, NZP_P, NZP_Z};

/// Quotient produced for a zero divisor: all ones, as an unsigned hardware
/// divider without a guard would return.
pub const DIV_BY_ZERO: u8 = u8::MAX;

/// Evaluate one lane's ALU. Arithmetic wraps at 8 bits; comparison is
/// unsigned and yields NZP bits in the low three bits.
pub fn execute(signals: &ControlSignals, rs: u8, rt: u8) -> u8 {
    if signals.compare {
        let mut nzp = 0;
        if rs < rt {
            nzp |= NZP_N;
        }
        if rs == rt {
            nzp |= NZP_Z;
        }
        if rs > rt {
            nzp |= NZP_P;
        }
        return nzp;
    }
    match signals.alu_op {
        AluOp::Add => rs.wrapping_add(rt),
        AluOp::Sub => rs.wrapping_sub(rt),
        AluOp::Mul => rs.wrapping_mul(rt),
        AluOp::Div => rs.checked_div(rt).unwrap_or_else(|| {
            warn!("division by zero ({} / 0), result saturated to {:#04x}", rs, DIV_BY_ZERO);
            DIV_BY_ZERO
        }),
    }
}
