//! 栈、I/O 与机器控制指令

use tracing::info;

use crate::emulator::state::{Event, PAIR_SP};
use crate::emulator::{Emulator, Exception, GuestMemory};
use crate::system::DiskOp;

use super::*;

/// PUSH / POP 中寄存器对编码 3 表示 PSW
const PAIR_PSW: u8 = PAIR_SP;

/// 磁盘伪指令的第二个字节
const DISK_MARKER: u8 = 0xED;

pub const I8080_CONTROL: &[Instruction] = &[
    Instruction {
        mask: 0xCF,
        identifier: 0xC5,
        name: "PUSH",
        operands: Operands::PairPsw,
        mode: AddrMode::Implied,
        cycles: 11,
        execute: |emu: &mut Emulator, opcode: u8, _pc: u16| {
            let value = match pair(opcode) {
                PAIR_PSW => emu.state.psw(),
                rp => emu.state.get_pair(rp)?,
            };
            emu.state.push(value);
            Ok(())
        },
    },
    Instruction {
        mask: 0xCF,
        identifier: 0xC1,
        name: "POP",
        operands: Operands::PairPsw,
        mode: AddrMode::Implied,
        cycles: 10,
        execute: |emu: &mut Emulator, opcode: u8, _pc: u16| {
            let value = emu.state.pop();
            match pair(opcode) {
                PAIR_PSW => emu.state.set_psw(value),
                rp => emu.state.set_pair(rp, value)?,
            }
            Ok(())
        },
    },
    Instruction {
        mask: 0xFF,
        identifier: 0xE3,
        name: "XTHL",
        operands: Operands::None,
        mode: AddrMode::Implied,
        cycles: 18,
        execute: |emu: &mut Emulator, _opcode: u8, _pc: u16| {
            let sp = emu.state.sp;
            let top = emu.state.memory.read_word(sp);
            let hl = emu.state.hl;
            emu.state.memory.write_word(sp, hl);
            emu.state.hl = top;
            Ok(())
        },
    },
    Instruction {
        mask: 0xFF,
        identifier: 0xF9,
        name: "SPHL",
        operands: Operands::None,
        mode: AddrMode::Implied,
        cycles: 5,
        execute: |emu: &mut Emulator, _opcode: u8, _pc: u16| {
            emu.state.sp = emu.state.hl;
            Ok(())
        },
    },
    Instruction {
        mask: 0xFF,
        identifier: 0xDB,
        name: "IN",
        operands: Operands::None,
        mode: AddrMode::Direct8,
        cycles: 10,
        execute: |emu: &mut Emulator, _opcode: u8, _pc: u16| {
            let port = emu.state.fetch_byte();
            emu.state.a = emu.port_read(port)?;
            Ok(())
        },
    },
    Instruction {
        mask: 0xFF,
        identifier: 0xD3,
        name: "OUT",
        operands: Operands::None,
        mode: AddrMode::Direct8,
        cycles: 10,
        execute: |emu: &mut Emulator, _opcode: u8, _pc: u16| {
            let port = emu.state.fetch_byte();
            let value = emu.state.a;
            emu.port_write(port, value)
        },
    },
    Instruction {
        mask: 0xFF,
        identifier: 0xFB,
        name: "EI",
        operands: Operands::None,
        mode: AddrMode::Implied,
        cycles: 4,
        execute: |emu: &mut Emulator, _opcode: u8, _pc: u16| {
            emu.state.inte = true;
            Ok(())
        },
    },
    Instruction {
        mask: 0xFF,
        identifier: 0xF3,
        name: "DI",
        operands: Operands::None,
        mode: AddrMode::Implied,
        cycles: 4,
        execute: |emu: &mut Emulator, _opcode: u8, _pc: u16| {
            emu.state.inte = false;
            Ok(())
        },
    },
    Instruction {
        mask: 0xFF,
        identifier: 0x76,
        name: "HLT",
        operands: Operands::None,
        mode: AddrMode::Implied,
        cycles: 7,
        execute: |emu: &mut Emulator, _opcode: u8, pc: u16| {
            info!("PC={pc:#06x} 处停机");
            emu.halt(Event::Halted);
            Ok(())
        },
    },
    Instruction {
        mask: 0xFF,
        identifier: 0x00,
        name: "NOP",
        operands: Operands::None,
        mode: AddrMode::Implied,
        cycles: 4,
        execute: |_emu: &mut Emulator, _opcode: u8, _pc: u16| Ok(()),
    },
    // ED ED 02 读扇区，ED ED 03 写扇区
    Instruction {
        mask: 0xFF,
        identifier: 0xED,
        name: "DISK",
        operands: Operands::None,
        mode: AddrMode::Direct16,
        cycles: 0,
        execute: |emu: &mut Emulator, _opcode: u8, pc: u16| {
            let marker = emu.state.fetch_byte();
            let selector = emu.state.fetch_byte();
            match DiskOp::from_selector(selector) {
                Some(op) if marker == DISK_MARKER => emu.disk_transfer(op),
                _ => {
                    emu.exception = Some(Exception::BadDiskInstruction {
                        byte2: marker,
                        byte3: selector,
                        addr: pc,
                    })
                }
            }
            Ok(())
        },
    },
];
