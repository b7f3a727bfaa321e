use std::collections::HashMap;

use anyhow::{anyhow, bail, ensure, Context, Result};

use crate::isa::instruction::{Instruction, Opcode};
use crate::util::{
    MEM_WORDS, NUM_REGISTERS, NZP_N, NZP_P, NZP_Z, REG_BLOCK_DIM, REG_BLOCK_IDX, REG_THREAD_IDX,
};

#[derive(Debug, Clone)]
enum Target {
    Label(String),
    Abs(u8),
}

#[derive(Debug, Clone)]
enum Item {
    Ready(Instruction),
    Branch { condition: u8, target: Target },
}

fn parse_reg(s: &str) -> Result<usize> {
    let t = s.trim();
    match t {
        "%blockIdx" => return Ok(REG_BLOCK_IDX),
        "%blockDim" => return Ok(REG_BLOCK_DIM),
        "%threadIdx" => return Ok(REG_THREAD_IDX),
        _ => {}
    }
    let num = t
        .strip_prefix('R')
        .or_else(|| t.strip_prefix('r'))
        .ok_or_else(|| anyhow!("bad register: {}", t))?;
    let r = num
        .parse::<usize>()
        .map_err(|_| anyhow!("bad register: {}", t))?;
    ensure!(r < NUM_REGISTERS, "register out of range: {}", t);
    Ok(r)
}

fn parse_imm(s: &str) -> Result<u8> {
    let t = s.trim().trim_start_matches('#');
    let v = if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16)
    } else {
        t.parse::<u32>()
    }
    .map_err(|_| anyhow!("bad immediate: {}", s.trim()))?;
    ensure!(v <= u8::MAX as u32, "immediate does not fit in 8 bits: {}", v);
    Ok(v as u8)
}

fn parse_condition(suffix: &str) -> Result<u8> {
    if suffix.is_empty() {
        return Ok(NZP_N | NZP_Z | NZP_P);
    }
    let mut cond = 0;
    for c in suffix.chars() {
        let bit = match c.to_ascii_lowercase() {
            'n' => NZP_N,
            'z' => NZP_Z,
            'p' => NZP_P,
            _ => bail!("bad branch condition: {}", suffix),
        };
        ensure!(cond & bit == 0, "repeated branch condition: {}", suffix);
        cond |= bit;
    }
    Ok(cond)
}

fn parse_line(line: &str, labels: &mut HashMap<String, u8>, pc: usize) -> Result<Option<Item>> {
    let mut s = line;
    if let Some(p) = s.find(';') {
        s = &s[..p];
    }
    let mut s = s.trim();
    if let Some(p) = s.find(':') {
        let name = s[..p].trim();
        ensure!(!name.is_empty(), "empty label");
        ensure!(pc < MEM_WORDS, "label {} past end of program memory", name);
        if labels.insert(name.to_string(), pc as u8).is_some() {
            bail!("duplicate label: {}", name);
        }
        s = s[p + 1..].trim();
    }
    if s.is_empty() {
        return Ok(None);
    }

    let (mn, rest) = match s.find(char::is_whitespace) {
        Some(p) => (&s[..p], s[p..].trim()),
        None => (s, ""),
    };
    let ops = if rest.is_empty() {
        vec![]
    } else {
        rest.split(',').map(str::trim).collect::<Vec<_>>()
    };
    let arity = |n: usize| -> Result<()> {
        ensure!(ops.len() == n, "{} takes {} operands, got {}", mn, n, ops.len());
        Ok(())
    };

    let upper = mn.to_uppercase();
    let rrr = |op: Opcode| -> Result<Item> {
        arity(3)?;
        Ok(Item::Ready(Instruction::rrr(
            op,
            parse_reg(ops[0])?,
            parse_reg(ops[1])?,
            parse_reg(ops[2])?,
        )))
    };
    let item = match upper.as_str() {
        "ADD" => rrr(Opcode::Add)?,
        "SUB" => rrr(Opcode::Sub)?,
        "MUL" => rrr(Opcode::Mul)?,
        "DIV" => rrr(Opcode::Div)?,
        "LDR" => {
            // LDR Rd, Rs
            arity(2)?;
            Item::Ready(Instruction::rrr(Opcode::Ldr, parse_reg(ops[0])?, parse_reg(ops[1])?, 0))
        }
        "STR" => {
            // STR Rs, Rt  (address, value)
            arity(2)?;
            Item::Ready(Instruction::rrr(Opcode::Str, 0, parse_reg(ops[0])?, parse_reg(ops[1])?))
        }
        "CMP" => {
            arity(2)?;
            Item::Ready(Instruction::rrr(Opcode::Cmp, 0, parse_reg(ops[0])?, parse_reg(ops[1])?))
        }
        "CONST" => {
            arity(2)?;
            Item::Ready(Instruction::constant(parse_reg(ops[0])?, parse_imm(ops[1])?))
        }
        "RET" => {
            arity(0)?;
            Item::Ready(Instruction::ret())
        }
        "NOP" => {
            arity(0)?;
            Item::Ready(Instruction(0))
        }
        _ if upper.starts_with("BR") => {
            arity(1)?;
            let condition = parse_condition(&mn[2..])?;
            let target = if ops[0].starts_with('#') || ops[0].starts_with(|c: char| c.is_ascii_digit())
            {
                Target::Abs(parse_imm(ops[0])?)
            } else {
                Target::Label(ops[0].to_string())
            };
            Item::Branch { condition, target }
        }
        _ => bail!("unknown mnemonic: {}", mn),
    };
    Ok(Some(item))
}

/// Assemble source text into program memory words, one instruction per line.
pub fn assemble(src: &str) -> Result<Vec<u16>> {
    let mut labels = HashMap::new();
    let mut items = Vec::new();
    for (lineno, line) in src.lines().enumerate() {
        let item = parse_line(line, &mut labels, items.len())
            .with_context(|| format!("line {}: {}", lineno + 1, line.trim()))?;
        if let Some(item) = item {
            items.push((lineno + 1, item));
        }
    }
    ensure!(
        items.len() <= MEM_WORDS,
        "program has {} instructions, program memory holds {}",
        items.len(),
        MEM_WORDS
    );

    items
        .into_iter()
        .map(|(lineno, item)| match item {
            Item::Ready(inst) => Ok(inst.0),
            Item::Branch { condition, target } => {
                let target = match target {
                    Target::Abs(addr) => addr,
                    Target::Label(name) => *labels
                        .get(&name)
                        .ok_or_else(|| anyhow!("line {}: undefined label: {}", lineno, name))?,
                };
                Ok(Instruction::branch(condition, target).0)
            }
        })
        .collect()
}

pub fn disassemble(word: u16) -> String {
    Instruction(word).to_string()
}
