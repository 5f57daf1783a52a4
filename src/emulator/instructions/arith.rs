//! 算术指令

use crate::emulator::Emulator;

use super::*;

fn inr(emu: &mut Emulator, opcode: u8, _pc: u16) -> Result<()> {
    let reg = dst(opcode);
    let value = emu.state.get_reg(reg)?;
    let result = value.wrapping_add(1);
    emu.state.flags.ac = value & 0x0F == 0x0F;
    emu.state.flags.set_szp(result);
    emu.state.set_reg(reg, result)?;
    Ok(())
}

fn dcr(emu: &mut Emulator, opcode: u8, _pc: u16) -> Result<()> {
    let reg = dst(opcode);
    let value = emu.state.get_reg(reg)?;
    let result = value.wrapping_sub(1);
    // 与加 0xFF 相同: 低 4 位非零时产生半进位
    emu.state.flags.ac = value & 0x0F != 0;
    emu.state.flags.set_szp(result);
    emu.state.set_reg(reg, result)?;
    Ok(())
}

/// 十进制调整
pub(crate) fn daa(state: &mut State) {
    let a = state.a;
    let lo = a & 0x0F;
    let hi = a >> 4;
    let mut adjust = 0u8;
    if lo > 9 || state.flags.ac {
        adjust = 0x06;
    }
    if hi > 9 || state.flags.cy || (hi == 9 && lo > 9) {
        adjust |= 0x60;
    }
    state.flags.ac = lo >= 0x0A;
    if (hi >= 9 && lo >= 0x0A) || hi >= 0x0A {
        state.flags.cy = true;
    }
    state.a = a.wrapping_add(adjust);
    state.flags.set_szp(state.a);
}

pub const I8080_ARITH: &[Instruction] = &[
    Instruction {
        mask: 0xF8,
        identifier: 0x80,
        name: "ADD",
        operands: Operands::Src,
        mode: AddrMode::Implied,
        cycles: 4,
        execute: alu_reg,
    },
    Instruction {
        mask: 0xFF,
        identifier: 0x86,
        name: "ADD",
        operands: Operands::Src,
        mode: AddrMode::Implied,
        cycles: 7,
        execute: alu_reg,
    },
    Instruction {
        mask: 0xFF,
        identifier: 0xC6,
        name: "ADI",
        operands: Operands::None,
        mode: AddrMode::Imm8,
        cycles: 7,
        execute: alu_imm,
    },
    Instruction {
        mask: 0xF8,
        identifier: 0x88,
        name: "ADC",
        operands: Operands::Src,
        mode: AddrMode::Implied,
        cycles: 4,
        execute: alu_reg,
    },
    Instruction {
        mask: 0xFF,
        identifier: 0x8E,
        name: "ADC",
        operands: Operands::Src,
        mode: AddrMode::Implied,
        cycles: 7,
        execute: alu_reg,
    },
    Instruction {
        mask: 0xFF,
        identifier: 0xCE,
        name: "ACI",
        operands: Operands::None,
        mode: AddrMode::Imm8,
        cycles: 7,
        execute: alu_imm,
    },
    Instruction {
        mask: 0xF8,
        identifier: 0x90,
        name: "SUB",
        operands: Operands::Src,
        mode: AddrMode::Implied,
        cycles: 4,
        execute: alu_reg,
    },
    Instruction {
        mask: 0xFF,
        identifier: 0x96,
        name: "SUB",
        operands: Operands::Src,
        mode: AddrMode::Implied,
        cycles: 7,
        execute: alu_reg,
    },
    Instruction {
        mask: 0xFF,
        identifier: 0xD6,
        name: "SUI",
        operands: Operands::None,
        mode: AddrMode::Imm8,
        cycles: 7,
        execute: alu_imm,
    },
    Instruction {
        mask: 0xF8,
        identifier: 0x98,
        name: "SBB",
        operands: Operands::Src,
        mode: AddrMode::Implied,
        cycles: 4,
        execute: alu_reg,
    },
    Instruction {
        mask: 0xFF,
        identifier: 0x9E,
        name: "SBB",
        operands: Operands::Src,
        mode: AddrMode::Implied,
        cycles: 7,
        execute: alu_reg,
    },
    Instruction {
        mask: 0xFF,
        identifier: 0xDE,
        name: "SBI",
        operands: Operands::None,
        mode: AddrMode::Imm8,
        cycles: 7,
        execute: alu_imm,
    },
    Instruction {
        mask: 0xC7,
        identifier: 0x04,
        name: "INR",
        operands: Operands::Dst,
        mode: AddrMode::Implied,
        cycles: 5,
        execute: inr,
    },
    Instruction {
        mask: 0xFF,
        identifier: 0x34,
        name: "INR",
        operands: Operands::Dst,
        mode: AddrMode::Implied,
        cycles: 10,
        execute: inr,
    },
    Instruction {
        mask: 0xC7,
        identifier: 0x05,
        name: "DCR",
        operands: Operands::Dst,
        mode: AddrMode::Implied,
        cycles: 5,
        execute: dcr,
    },
    Instruction {
        mask: 0xFF,
        identifier: 0x35,
        name: "DCR",
        operands: Operands::Dst,
        mode: AddrMode::Implied,
        cycles: 10,
        execute: dcr,
    },
    Instruction {
        mask: 0xCF,
        identifier: 0x03,
        name: "INX",
        operands: Operands::Pair,
        mode: AddrMode::Implied,
        cycles: 5,
        execute: |emu: &mut Emulator, opcode: u8, _pc: u16| {
            let rp = pair(opcode);
            let value = emu.state.get_pair(rp)?;
            emu.state.set_pair(rp, value.wrapping_add(1))?;
            Ok(())
        },
    },
    Instruction {
        mask: 0xCF,
        identifier: 0x0B,
        name: "DCX",
        operands: Operands::Pair,
        mode: AddrMode::Implied,
        cycles: 5,
        execute: |emu: &mut Emulator, opcode: u8, _pc: u16| {
            let rp = pair(opcode);
            let value = emu.state.get_pair(rp)?;
            emu.state.set_pair(rp, value.wrapping_sub(1))?;
            Ok(())
        },
    },
    // 只影响 CY
    Instruction {
        mask: 0xCF,
        identifier: 0x09,
        name: "DAD",
        operands: Operands::Pair,
        mode: AddrMode::Implied,
        cycles: 10,
        execute: |emu: &mut Emulator, opcode: u8, _pc: u16| {
            let value = emu.state.get_pair(pair(opcode))?;
            let (sum, carry) = emu.state.hl.overflowing_add(value);
            emu.state.hl = sum;
            emu.state.flags.cy = carry;
            Ok(())
        },
    },
    Instruction {
        mask: 0xFF,
        identifier: 0x27,
        name: "DAA",
        operands: Operands::None,
        mode: AddrMode::Implied,
        cycles: 4,
        execute: |emu: &mut Emulator, _opcode: u8, _pc: u16| {
            daa(&mut emu.state);
            Ok(())
        },
    },
];
