//! CPU状态管理

use super::memory::{GuestMemory, Memory};
use crate::utils::disasm::disasm_instruction;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("寄存器访问错误: 寄存器编号 {0} 超出范围")]
    InvalidRegister(u8),
    #[error("寄存器对访问错误: 寄存器对编号 {0} 超出范围")]
    InvalidRegisterPair(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum ExecState {
    #[default]
    Idle,
    Running,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum Event {
    #[default]
    None,
    Halted,
    /// 客户程序跳转到 CP/M 热启动入口
    WarmBoot(u16),
    /// BDOS 调用，附带功能号
    Bdos(u8),
}

/// 8 位寄存器编号 (指令字段中的 3 位编码)
pub const REG_B: u8 = 0;
pub const REG_C: u8 = 1;
pub const REG_D: u8 = 2;
pub const REG_E: u8 = 3;
pub const REG_H: u8 = 4;
pub const REG_L: u8 = 5;
/// M: 以 HL 为地址的内存操作数
pub const REG_M: u8 = 6;
pub const REG_A: u8 = 7;

/// 寄存器对编号 (指令字段中的 2 位编码)
pub const PAIR_BC: u8 = 0;
pub const PAIR_DE: u8 = 1;
pub const PAIR_HL: u8 = 2;
pub const PAIR_SP: u8 = 3;

/// 8080 标志位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flags {
    pub s: bool,
    pub z: bool,
    pub ac: bool,
    pub p: bool,
    pub cy: bool,
}

impl Flags {
    /// 按结果设置 S、Z、P
    #[inline(always)]
    pub fn set_szp(&mut self, value: u8) {
        self.s = value & 0x80 != 0;
        self.z = value == 0;
        self.p = value.count_ones() % 2 == 0;
    }

    /// PSW 低字节，位 1 恒为 1，位 3、5 恒为 0
    pub fn to_byte(self) -> u8 {
        (self.s as u8) << 7
            | (self.z as u8) << 6
            | (self.ac as u8) << 4
            | (self.p as u8) << 2
            | 1 << 1
            | self.cy as u8
    }

    pub fn from_byte(value: u8) -> Self {
        Self {
            s: value & 0x80 != 0,
            z: value & 0x40 != 0,
            ac: value & 0x10 != 0,
            p: value & 0x04 != 0,
            cy: value & 0x01 != 0,
        }
    }

    /// 条件码求值 (NZ Z NC C PO PE P M)
    pub fn condition(&self, cond: u8) -> bool {
        match cond & 7 {
            0 => !self.z,
            1 => self.z,
            2 => !self.cy,
            3 => self.cy,
            4 => !self.p,
            5 => self.p,
            6 => !self.s,
            _ => self.s,
        }
    }
}

/// CPU状态
#[derive(Debug, Clone)]
pub struct State {
    // 累加器
    pub a: u8,
    // 标志位
    pub flags: Flags,
    // 寄存器对 BC DE HL
    pub bc: u16,
    pub de: u16,
    pub hl: u16,
    // 栈指针
    pub sp: u16,
    // 程序计数器
    pub pc: u16,
    // 中断允许触发器
    pub inte: bool,
    pub halted: bool,
    pub cycles: u64,
    // 内存
    pub memory: Memory,
}

impl State {
    /// 创建新的CPU状态
    pub fn new() -> Self {
        Self {
            a: 0,
            flags: Flags::default(),
            bc: 0,
            de: 0,
            hl: 0,
            sp: 0,
            pc: 0,
            inte: false,
            halted: false,
            cycles: 0,
            memory: Memory::new(),
        }
    }

    /// 复位处理器，保留内存内容
    pub fn reset(&mut self) {
        self.halted = false;
        self.inte = false;
        self.pc = 0;
    }

    /// 读取 8 位寄存器，M 读取 HL 指向的内存
    #[inline(always)]
    pub fn get_reg(&self, reg: u8) -> Result<u8, StateError> {
        Ok(match reg {
            REG_B => (self.bc >> 8) as u8,
            REG_C => self.bc as u8,
            REG_D => (self.de >> 8) as u8,
            REG_E => self.de as u8,
            REG_H => (self.hl >> 8) as u8,
            REG_L => self.hl as u8,
            REG_M => self.memory.read_byte(self.hl),
            REG_A => self.a,
            _ => return Err(StateError::InvalidRegister(reg)),
        })
    }

    /// 设置 8 位寄存器，M 写入 HL 指向的内存
    #[inline(always)]
    pub fn set_reg(&mut self, reg: u8, value: u8) -> Result<(), StateError> {
        match reg {
            REG_B => self.bc = (self.bc & 0x00FF) | (value as u16) << 8,
            REG_C => self.bc = (self.bc & 0xFF00) | value as u16,
            REG_D => self.de = (self.de & 0x00FF) | (value as u16) << 8,
            REG_E => self.de = (self.de & 0xFF00) | value as u16,
            REG_H => self.hl = (self.hl & 0x00FF) | (value as u16) << 8,
            REG_L => self.hl = (self.hl & 0xFF00) | value as u16,
            REG_M => self.memory.write_byte(self.hl, value),
            REG_A => self.a = value,
            _ => return Err(StateError::InvalidRegister(reg)),
        }
        Ok(())
    }

    /// 读取寄存器对 (BC DE HL SP)
    #[inline(always)]
    pub fn get_pair(&self, pair: u8) -> Result<u16, StateError> {
        Ok(match pair {
            PAIR_BC => self.bc,
            PAIR_DE => self.de,
            PAIR_HL => self.hl,
            PAIR_SP => self.sp,
            _ => return Err(StateError::InvalidRegisterPair(pair)),
        })
    }

    /// 设置寄存器对 (BC DE HL SP)
    #[inline(always)]
    pub fn set_pair(&mut self, pair: u8, value: u16) -> Result<(), StateError> {
        match pair {
            PAIR_BC => self.bc = value,
            PAIR_DE => self.de = value,
            PAIR_HL => self.hl = value,
            PAIR_SP => self.sp = value,
            _ => return Err(StateError::InvalidRegisterPair(pair)),
        }
        Ok(())
    }

    pub fn c(&self) -> u8 {
        self.bc as u8
    }

    pub fn e(&self) -> u8 {
        self.de as u8
    }

    /// PSW = A:F
    pub fn psw(&self) -> u16 {
        (self.a as u16) << 8 | self.flags.to_byte() as u16
    }

    pub fn set_psw(&mut self, value: u16) {
        self.a = (value >> 8) as u8;
        self.flags = Flags::from_byte(value as u8);
    }

    /// 取 PC 处的一个字节并推进 PC
    #[inline(always)]
    pub fn fetch_byte(&mut self) -> u8 {
        let byte = self.memory.read_byte(self.pc);
        self.pc = self.pc.wrapping_add(1);
        byte
    }

    /// 取 PC 处的小端字并推进 PC
    #[inline(always)]
    pub fn fetch_word(&mut self) -> u16 {
        let word = self.memory.read_word(self.pc);
        self.pc = self.pc.wrapping_add(2);
        word
    }

    pub fn push(&mut self, value: u16) {
        self.sp = self.sp.wrapping_sub(2);
        self.memory.write_word(self.sp, value);
    }

    pub fn pop(&mut self) -> u16 {
        let value = self.memory.read_word(self.sp);
        self.sp = self.sp.wrapping_add(2);
        value
    }

    /// 寄存器摘要，追踪文件使用
    pub fn register_line(&self) -> String {
        format!(
            "BC={:04x} DE={:04x} HL={:04x} AF={:02x}{:02x}",
            self.bc,
            self.de,
            self.hl,
            self.a,
            self.flags.to_byte()
        )
    }
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== CPU State ===")?;
        writeln!(f, "PC: 0x{:04x}  SP: 0x{:04x}", self.pc, self.sp)?;
        writeln!(
            f,
            "A: 0x{:02x}  BC: 0x{:04x}  DE: 0x{:04x}  HL: 0x{:04x}",
            self.a, self.bc, self.de, self.hl
        )?;
        writeln!(
            f,
            "Flags: S={} Z={} AC={} P={} CY={}  INTE={}",
            self.flags.s as u8,
            self.flags.z as u8,
            self.flags.ac as u8,
            self.flags.p as u8,
            self.flags.cy as u8,
            self.inte as u8
        )?;
        writeln!(f, "Cycles: {}", self.cycles)?;
        writeln!(f)?;

        // 反汇编 PC 开始的若干条指令
        writeln!(f, "Memory at PC:")?;
        let mut addr = self.pc;
        for _ in 0..6 {
            let (text, len) = disasm_instruction(&self.memory, addr);
            let marker = if addr == self.pc { " <-- PC" } else { "" };
            let mut bytes = String::new();
            for i in 0..len {
                bytes += &format!("{:02x} ", self.memory.read_byte(addr.wrapping_add(i)));
            }
            writeln!(f, "  0x{:04x}: {:<9} {}{}", addr, bytes, text, marker)?;
            addr = addr.wrapping_add(len);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_encoding() {
        let mut state = State::new();
        state.set_reg(REG_B, 0x12).unwrap();
        state.set_reg(REG_C, 0x34).unwrap();
        state.set_reg(REG_H, 0x80).unwrap();
        state.set_reg(REG_L, 0x00).unwrap();
        assert_eq!(state.bc, 0x1234);
        assert_eq!(state.get_pair(PAIR_HL).unwrap(), 0x8000);

        state.set_reg(REG_M, 0x55).unwrap();
        assert_eq!(state.memory.read_byte(0x8000), 0x55);
        assert_eq!(state.get_reg(REG_M).unwrap(), 0x55);
        assert!(state.get_reg(8).is_err());
    }

    #[test]
    fn test_psw_round_trip() {
        let mut state = State::new();
        state.set_psw(0xAAFF);
        assert_eq!(state.a, 0xAA);
        // 位 3、5 读回为 0，位 1 读回为 1
        assert_eq!(state.psw(), 0xAAD7);
        state.set_psw(0x0000);
        assert_eq!(state.psw(), 0x0002);
    }

    #[test]
    fn test_parity() {
        let mut flags = Flags::default();
        flags.set_szp(0x03);
        assert!(flags.p);
        flags.set_szp(0x07);
        assert!(!flags.p);
        flags.set_szp(0x00);
        assert!(flags.z && flags.p && !flags.s);
        flags.set_szp(0x80);
        assert!(flags.s && !flags.p);
    }

    #[test]
    fn test_stack() {
        let mut state = State::new();
        state.sp = 0x0000;
        state.push(0xBEEF);
        assert_eq!(state.sp, 0xFFFE);
        assert_eq!(state.memory.read_byte(0xFFFF), 0xBE);
        assert_eq!(state.pop(), 0xBEEF);
        assert_eq!(state.sp, 0x0000);
    }
}
