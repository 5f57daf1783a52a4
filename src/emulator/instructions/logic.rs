//! 逻辑指令 (含 CMP / CPI) 与累加器移位

use crate::emulator::Emulator;

use super::*;

pub const I8080_LOGIC: &[Instruction] = &[
    Instruction {
        mask: 0xF8,
        identifier: 0xA0,
        name: "ANA",
        operands: Operands::Src,
        mode: AddrMode::Implied,
        cycles: 4,
        execute: alu_reg,
    },
    Instruction {
        mask: 0xFF,
        identifier: 0xA6,
        name: "ANA",
        operands: Operands::Src,
        mode: AddrMode::Implied,
        cycles: 7,
        execute: alu_reg,
    },
    Instruction {
        mask: 0xFF,
        identifier: 0xE6,
        name: "ANI",
        operands: Operands::None,
        mode: AddrMode::Imm8,
        cycles: 7,
        execute: alu_imm,
    },
    Instruction {
        mask: 0xF8,
        identifier: 0xA8,
        name: "XRA",
        operands: Operands::Src,
        mode: AddrMode::Implied,
        cycles: 4,
        execute: alu_reg,
    },
    Instruction {
        mask: 0xFF,
        identifier: 0xAE,
        name: "XRA",
        operands: Operands::Src,
        mode: AddrMode::Implied,
        cycles: 7,
        execute: alu_reg,
    },
    Instruction {
        mask: 0xFF,
        identifier: 0xEE,
        name: "XRI",
        operands: Operands::None,
        mode: AddrMode::Imm8,
        cycles: 7,
        execute: alu_imm,
    },
    Instruction {
        mask: 0xF8,
        identifier: 0xB0,
        name: "ORA",
        operands: Operands::Src,
        mode: AddrMode::Implied,
        cycles: 4,
        execute: alu_reg,
    },
    Instruction {
        mask: 0xFF,
        identifier: 0xB6,
        name: "ORA",
        operands: Operands::Src,
        mode: AddrMode::Implied,
        cycles: 7,
        execute: alu_reg,
    },
    Instruction {
        mask: 0xFF,
        identifier: 0xF6,
        name: "ORI",
        operands: Operands::None,
        mode: AddrMode::Imm8,
        cycles: 7,
        execute: alu_imm,
    },
    Instruction {
        mask: 0xF8,
        identifier: 0xB8,
        name: "CMP",
        operands: Operands::Src,
        mode: AddrMode::Implied,
        cycles: 4,
        execute: alu_reg,
    },
    Instruction {
        mask: 0xFF,
        identifier: 0xBE,
        name: "CMP",
        operands: Operands::Src,
        mode: AddrMode::Implied,
        cycles: 7,
        execute: alu_reg,
    },
    Instruction {
        mask: 0xFF,
        identifier: 0xFE,
        name: "CPI",
        operands: Operands::None,
        mode: AddrMode::Imm8,
        cycles: 7,
        execute: alu_imm,
    },
    // 以下移位指令只影响 CY
    Instruction {
        mask: 0xFF,
        identifier: 0x07,
        name: "RLC",
        operands: Operands::None,
        mode: AddrMode::Implied,
        cycles: 4,
        execute: |emu: &mut Emulator, _opcode: u8, _pc: u16| {
            let a = emu.state.a.rotate_left(1);
            emu.state.a = a;
            emu.state.flags.cy = a & 0x01 != 0;
            Ok(())
        },
    },
    Instruction {
        mask: 0xFF,
        identifier: 0x0F,
        name: "RRC",
        operands: Operands::None,
        mode: AddrMode::Implied,
        cycles: 4,
        execute: |emu: &mut Emulator, _opcode: u8, _pc: u16| {
            let a = emu.state.a.rotate_right(1);
            emu.state.a = a;
            emu.state.flags.cy = a & 0x80 != 0;
            Ok(())
        },
    },
    Instruction {
        mask: 0xFF,
        identifier: 0x17,
        name: "RAL",
        operands: Operands::None,
        mode: AddrMode::Implied,
        cycles: 4,
        execute: |emu: &mut Emulator, _opcode: u8, _pc: u16| {
            let a = emu.state.a;
            emu.state.a = (a << 1) | emu.state.flags.cy as u8;
            emu.state.flags.cy = a & 0x80 != 0;
            Ok(())
        },
    },
    Instruction {
        mask: 0xFF,
        identifier: 0x1F,
        name: "RAR",
        operands: Operands::None,
        mode: AddrMode::Implied,
        cycles: 4,
        execute: |emu: &mut Emulator, _opcode: u8, _pc: u16| {
            let a = emu.state.a;
            emu.state.a = (a >> 1) | (emu.state.flags.cy as u8) << 7;
            emu.state.flags.cy = a & 0x01 != 0;
            Ok(())
        },
    },
    Instruction {
        mask: 0xFF,
        identifier: 0x2F,
        name: "CMA",
        operands: Operands::None,
        mode: AddrMode::Implied,
        cycles: 4,
        execute: |emu: &mut Emulator, _opcode: u8, _pc: u16| {
            emu.state.a = !emu.state.a;
            Ok(())
        },
    },
    Instruction {
        mask: 0xFF,
        identifier: 0x3F,
        name: "CMC",
        operands: Operands::None,
        mode: AddrMode::Implied,
        cycles: 4,
        execute: |emu: &mut Emulator, _opcode: u8, _pc: u16| {
            emu.state.flags.cy = !emu.state.flags.cy;
            Ok(())
        },
    },
    Instruction {
        mask: 0xFF,
        identifier: 0x37,
        name: "STC",
        operands: Operands::None,
        mode: AddrMode::Implied,
        cycles: 4,
        execute: |emu: &mut Emulator, _opcode: u8, _pc: u16| {
            emu.state.flags.cy = true;
            Ok(())
        },
    },
];
