//! 数据传送指令，不影响标志位

use crate::emulator::{Emulator, GuestMemory};

use super::*;

fn mov(emu: &mut Emulator, opcode: u8, _pc: u16) -> Result<()> {
    let value = emu.state.get_reg(src(opcode))?;
    emu.state.set_reg(dst(opcode), value)?;
    Ok(())
}

fn mvi(emu: &mut Emulator, opcode: u8, _pc: u16) -> Result<()> {
    let value = emu.state.fetch_byte();
    emu.state.set_reg(dst(opcode), value)?;
    Ok(())
}

pub const I8080_TRANSFER: &[Instruction] = &[
    Instruction {
        mask: 0xC0,
        identifier: 0x40,
        name: "MOV",
        operands: Operands::DstSrc,
        mode: AddrMode::Implied,
        cycles: 5,
        execute: mov,
    },
    // MOV r,M
    Instruction {
        mask: 0xC7,
        identifier: 0x46,
        name: "MOV",
        operands: Operands::DstSrc,
        mode: AddrMode::Implied,
        cycles: 7,
        execute: mov,
    },
    // MOV M,r
    Instruction {
        mask: 0xF8,
        identifier: 0x70,
        name: "MOV",
        operands: Operands::DstSrc,
        mode: AddrMode::Implied,
        cycles: 7,
        execute: mov,
    },
    Instruction {
        mask: 0xC7,
        identifier: 0x06,
        name: "MVI",
        operands: Operands::Dst,
        mode: AddrMode::Imm8,
        cycles: 7,
        execute: mvi,
    },
    Instruction {
        mask: 0xFF,
        identifier: 0x36,
        name: "MVI",
        operands: Operands::Dst,
        mode: AddrMode::Imm8,
        cycles: 10,
        execute: mvi,
    },
    Instruction {
        mask: 0xCF,
        identifier: 0x01,
        name: "LXI",
        operands: Operands::Pair,
        mode: AddrMode::Imm16,
        cycles: 10,
        execute: |emu: &mut Emulator, opcode: u8, _pc: u16| {
            let value = emu.state.fetch_word();
            emu.state.set_pair(pair(opcode), value)?;
            Ok(())
        },
    },
    Instruction {
        mask: 0xFF,
        identifier: 0x3A,
        name: "LDA",
        operands: Operands::None,
        mode: AddrMode::Direct16,
        cycles: 13,
        execute: |emu: &mut Emulator, _opcode: u8, _pc: u16| {
            let addr = emu.state.fetch_word();
            emu.state.a = emu.state.memory.read_byte(addr);
            Ok(())
        },
    },
    Instruction {
        mask: 0xFF,
        identifier: 0x32,
        name: "STA",
        operands: Operands::None,
        mode: AddrMode::Direct16,
        cycles: 13,
        execute: |emu: &mut Emulator, _opcode: u8, _pc: u16| {
            let addr = emu.state.fetch_word();
            let a = emu.state.a;
            emu.state.memory.write_byte(addr, a);
            Ok(())
        },
    },
    Instruction {
        mask: 0xFF,
        identifier: 0x2A,
        name: "LHLD",
        operands: Operands::None,
        mode: AddrMode::Direct16,
        cycles: 16,
        execute: |emu: &mut Emulator, _opcode: u8, _pc: u16| {
            let addr = emu.state.fetch_word();
            emu.state.hl = emu.state.memory.read_word(addr);
            Ok(())
        },
    },
    Instruction {
        mask: 0xFF,
        identifier: 0x22,
        name: "SHLD",
        operands: Operands::None,
        mode: AddrMode::Direct16,
        cycles: 16,
        execute: |emu: &mut Emulator, _opcode: u8, _pc: u16| {
            let addr = emu.state.fetch_word();
            let hl = emu.state.hl;
            emu.state.memory.write_word(addr, hl);
            Ok(())
        },
    },
    // 只有 BC、DE 两种编码
    Instruction {
        mask: 0xEF,
        identifier: 0x0A,
        name: "LDAX",
        operands: Operands::Pair,
        mode: AddrMode::Implied,
        cycles: 7,
        execute: |emu: &mut Emulator, opcode: u8, _pc: u16| {
            let addr = emu.state.get_pair(pair(opcode))?;
            emu.state.a = emu.state.memory.read_byte(addr);
            Ok(())
        },
    },
    Instruction {
        mask: 0xEF,
        identifier: 0x02,
        name: "STAX",
        operands: Operands::Pair,
        mode: AddrMode::Implied,
        cycles: 7,
        execute: |emu: &mut Emulator, opcode: u8, _pc: u16| {
            let addr = emu.state.get_pair(pair(opcode))?;
            let a = emu.state.a;
            emu.state.memory.write_byte(addr, a);
            Ok(())
        },
    },
    Instruction {
        mask: 0xFF,
        identifier: 0xEB,
        name: "XCHG",
        operands: Operands::None,
        mode: AddrMode::Implied,
        cycles: 4,
        execute: |emu: &mut Emulator, _opcode: u8, _pc: u16| {
            std::mem::swap(&mut emu.state.de, &mut emu.state.hl);
            Ok(())
        },
    },
];
