//! 8080 指令表与译码器
//!
//! 每组指令是一个 `&[Instruction]` 常量表，表项按 `opcode & mask == identifier`
//! 匹配。译码器在启动时为 256 个操作码各选出掩码位数最多的表项，
//! 没有表项匹配的操作码按非法指令处理。

mod arith;
mod branch;
mod control;
mod logic;
mod transfer;

use std::sync::OnceLock;

use anyhow::Result;

use crate::emulator::state::State;
use crate::emulator::{Emulator, Exception};

/// 指令编码中携带的寄存器字段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operands {
    None,
    /// 位 5-3 的寄存器
    Dst,
    /// 位 2-0 的寄存器
    Src,
    DstSrc,
    /// 位 5-4 的寄存器对
    Pair,
    /// 同上，但 3 表示 PSW
    PairPsw,
    /// 位 5-3 的条件码，拼接在助记符之后
    Cond,
    /// RST 向量号
    Vector,
}

/// 操作码之后附带的字节
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddrMode {
    Implied,
    Imm8,
    Imm16,
    /// 端口号
    Direct8,
    /// 地址
    Direct16,
}

impl AddrMode {
    /// 指令总长度 (字节)
    pub fn len(self) -> u16 {
        match self {
            AddrMode::Implied => 1,
            AddrMode::Imm8 | AddrMode::Direct8 => 2,
            AddrMode::Imm16 | AddrMode::Direct16 => 3,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Instruction {
    pub mask: u8,
    pub identifier: u8,
    pub name: &'static str,
    pub operands: Operands,
    pub mode: AddrMode,
    pub cycles: u8,
    /// pc 为操作码所在地址，执行时 state.pc 已经指向下一个字节
    pub execute: fn(emu: &mut Emulator, opcode: u8, pc: u16) -> Result<()>,
}

impl Instruction {
    #[inline(always)]
    pub fn matches(&self, opcode: u8) -> bool {
        opcode & self.mask == self.identifier
    }

    fn specificity(&self) -> u32 {
        self.mask.count_ones()
    }
}

pub const ILLEGAL: Instruction = Instruction {
    mask: 0x00,
    identifier: 0x00,
    name: "???",
    operands: Operands::None,
    mode: AddrMode::Implied,
    cycles: 0,
    execute: |emu: &mut Emulator, opcode: u8, pc: u16| {
        emu.exception = Some(Exception::IllegalInstruction { opcode, addr: pc });
        Ok(())
    },
};

pub const REG_NAMES: [&str; 8] = ["B", "C", "D", "E", "H", "L", "M", "A"];
pub const PAIR_NAMES: [&str; 4] = ["BC", "DE", "HL", "SP"];
pub const COND_NAMES: [&str; 8] = ["NZ", "Z", "NC", "C", "PO", "PE", "P", "M"];

/// 条件转移成立时额外消耗的周期
pub const TAKEN_EXTRA_CYCLES: u64 = 6;

#[inline(always)]
pub fn dst(opcode: u8) -> u8 {
    (opcode >> 3) & 7
}

#[inline(always)]
pub fn src(opcode: u8) -> u8 {
    opcode & 7
}

#[inline(always)]
pub fn pair(opcode: u8) -> u8 {
    (opcode >> 4) & 3
}

#[inline(always)]
pub fn cond(opcode: u8) -> u8 {
    (opcode >> 3) & 7
}

fn add_with_carry(state: &mut State, value: u8, carry: bool) -> u8 {
    let a = state.a;
    let sum = a as u16 + value as u16 + carry as u16;
    state.flags.ac = (a & 0x0F) + (value & 0x0F) + carry as u8 > 0x0F;
    state.flags.cy = sum > 0xFF;
    let result = sum as u8;
    state.flags.set_szp(result);
    result
}

/// 8080 以加补码的方式做减法，CY 取反后表示借位
fn sub_with_borrow(state: &mut State, value: u8, borrow: bool) -> u8 {
    let result = add_with_carry(state, !value, !borrow);
    state.flags.cy = !state.flags.cy;
    result
}

/// 累加器运算，`kind` 为操作码位 5-3 (ADD ADC SUB SBB ANA XRA ORA CMP)
pub(crate) fn alu(state: &mut State, kind: u8, value: u8) {
    match kind & 7 {
        0 => state.a = add_with_carry(state, value, false),
        1 => {
            let carry = state.flags.cy;
            state.a = add_with_carry(state, value, carry);
        }
        2 => state.a = sub_with_borrow(state, value, false),
        3 => {
            let borrow = state.flags.cy;
            state.a = sub_with_borrow(state, value, borrow);
        }
        4 => {
            // 8080 的 AC 为两个操作数位 3 的或
            state.flags.ac = (state.a | value) & 0x08 != 0;
            state.a &= value;
            state.flags.cy = false;
            state.flags.set_szp(state.a);
        }
        5 => {
            state.a ^= value;
            state.flags.ac = false;
            state.flags.cy = false;
            state.flags.set_szp(state.a);
        }
        6 => {
            state.a |= value;
            state.flags.ac = false;
            state.flags.cy = false;
            state.flags.set_szp(state.a);
        }
        _ => {
            sub_with_borrow(state, value, false);
        }
    }
}

/// 寄存器或 M 作为源操作数的累加器运算
pub(crate) fn alu_reg(emu: &mut Emulator, opcode: u8, _pc: u16) -> Result<()> {
    let value = emu.state.get_reg(src(opcode))?;
    alu(&mut emu.state, dst(opcode), value);
    Ok(())
}

/// 立即数作为源操作数的累加器运算
pub(crate) fn alu_imm(emu: &mut Emulator, opcode: u8, _pc: u16) -> Result<()> {
    let value = emu.state.fetch_byte();
    alu(&mut emu.state, dst(opcode), value);
    Ok(())
}

pub struct InstDecoder {
    table: Vec<Instruction>,
}

impl Default for InstDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl InstDecoder {
    pub fn new() -> Self {
        let groups: [&[Instruction]; 5] = [
            transfer::I8080_TRANSFER,
            arith::I8080_ARITH,
            logic::I8080_LOGIC,
            branch::I8080_BRANCH,
            control::I8080_CONTROL,
        ];
        let table = (0..=u8::MAX)
            .map(|opcode| {
                groups
                    .iter()
                    .flat_map(|group| group.iter())
                    .filter(|inst| inst.matches(opcode))
                    .max_by_key(|inst| inst.specificity())
                    .copied()
                    .unwrap_or(ILLEGAL)
            })
            .collect();
        InstDecoder { table }
    }

    /// 进程内共享的译码表
    pub fn shared() -> &'static InstDecoder {
        static DECODER: OnceLock<InstDecoder> = OnceLock::new();
        DECODER.get_or_init(InstDecoder::new)
    }

    #[inline(always)]
    pub fn decode(&self, opcode: u8) -> &Instruction {
        &self.table[opcode as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_groups() -> Vec<Instruction> {
        [
            transfer::I8080_TRANSFER,
            arith::I8080_ARITH,
            logic::I8080_LOGIC,
            branch::I8080_BRANCH,
            control::I8080_CONTROL,
        ]
        .concat()
    }

    #[test]
    fn test_illegal_opcodes() {
        let decoder = InstDecoder::new();
        let illegal: Vec<u8> = (0..=u8::MAX)
            .filter(|&op| decoder.decode(op).name == "???")
            .collect();
        assert_eq!(
            illegal,
            vec![0x08, 0x10, 0x18, 0x20, 0x28, 0x30, 0x38, 0xCB, 0xD9, 0xDD, 0xFD]
        );
    }

    #[test]
    fn test_no_ambiguous_matches() {
        let insts = all_groups();
        for opcode in 0..=u8::MAX {
            let best = insts
                .iter()
                .filter(|i| i.matches(opcode))
                .map(|i| i.specificity())
                .max();
            if let Some(best) = best {
                let ties = insts
                    .iter()
                    .filter(|i| i.matches(opcode) && i.specificity() == best)
                    .count();
                assert_eq!(ties, 1, "opcode {opcode:#04x} is ambiguous");
            }
        }
    }

    #[test]
    fn test_specific_entries_win() {
        let decoder = InstDecoder::new();
        assert_eq!(decoder.decode(0x76).name, "HLT");
        assert_eq!(decoder.decode(0x7E).cycles, 7);
        assert_eq!(decoder.decode(0x78).cycles, 5);
        assert_eq!(decoder.decode(0x36).cycles, 10);
        assert_eq!(decoder.decode(0xC3).name, "JMP");
        assert_eq!(decoder.decode(0xC2).name, "J");
        assert_eq!(decoder.decode(0xED).name, "DISK");
    }

    #[test]
    fn test_alu_flags() {
        let mut state = State::new();
        state.a = 0x3A;
        alu(&mut state, 0, 0xC6);
        assert_eq!(state.a, 0x00);
        assert!(state.flags.z && state.flags.cy && state.flags.ac);

        state.a = 0x3E;
        alu(&mut state, 2, 0x3E);
        assert_eq!(state.a, 0);
        assert!(state.flags.z && !state.flags.cy);

        state.a = 0x02;
        alu(&mut state, 7, 0x05);
        assert_eq!(state.a, 0x02);
        assert!(state.flags.cy && !state.flags.z && state.flags.s);

        state.a = 0x04;
        state.flags.cy = true;
        alu(&mut state, 3, 0x02);
        assert_eq!(state.a, 0x01);
        assert!(!state.flags.cy);
    }

    #[test]
    fn test_ana_auxiliary_carry() {
        let mut state = State::new();
        state.a = 0x08;
        alu(&mut state, 4, 0x00);
        assert!(state.flags.ac);
        assert_eq!(state.a, 0);

        state.a = 0xF0;
        state.flags.cy = true;
        alu(&mut state, 4, 0x30);
        assert!(!state.flags.ac && !state.flags.cy);
        assert_eq!(state.a, 0x30);
    }
}
