//! 转移指令，不影响标志位

use tracing::info;

use crate::const_values::{BDOS_ENTRY_ADDR, WARM_BOOT_ADDR};
use crate::emulator::Emulator;
use crate::emulator::state::Event;

use super::*;

pub const I8080_BRANCH: &[Instruction] = &[
    Instruction {
        mask: 0xFF,
        identifier: 0xC3,
        name: "JMP",
        operands: Operands::None,
        mode: AddrMode::Direct16,
        cycles: 10,
        execute: |emu: &mut Emulator, _opcode: u8, pc: u16| {
            let target = emu.state.fetch_word();
            if emu.system.bdos_enabled() && target == WARM_BOOT_ADDR {
                info!("PC={pc:#06x} 跳转到 CP/M 热启动入口");
                emu.halt(Event::WarmBoot(pc));
                return Ok(());
            }
            emu.state.pc = target;
            Ok(())
        },
    },
    Instruction {
        mask: 0xC7,
        identifier: 0xC2,
        name: "J",
        operands: Operands::Cond,
        mode: AddrMode::Direct16,
        cycles: 10,
        execute: |emu: &mut Emulator, opcode: u8, _pc: u16| {
            let target = emu.state.fetch_word();
            if emu.state.flags.condition(cond(opcode)) {
                emu.state.pc = target;
            }
            Ok(())
        },
    },
    Instruction {
        mask: 0xFF,
        identifier: 0xCD,
        name: "CALL",
        operands: Operands::None,
        mode: AddrMode::Direct16,
        cycles: 17,
        execute: |emu: &mut Emulator, _opcode: u8, pc: u16| {
            let target = emu.state.fetch_word();
            // BDOS 调用不压栈，返回后从下一条指令继续
            if emu.system.bdos_enabled() && target == BDOS_ENTRY_ADDR {
                emu.bdos_call(pc);
                return Ok(());
            }
            let ret = emu.state.pc;
            emu.state.push(ret);
            emu.state.pc = target;
            Ok(())
        },
    },
    Instruction {
        mask: 0xC7,
        identifier: 0xC4,
        name: "C",
        operands: Operands::Cond,
        mode: AddrMode::Direct16,
        cycles: 11,
        execute: |emu: &mut Emulator, opcode: u8, _pc: u16| {
            let target = emu.state.fetch_word();
            if emu.state.flags.condition(cond(opcode)) {
                let ret = emu.state.pc;
                emu.state.push(ret);
                emu.state.pc = target;
                emu.state.cycles += TAKEN_EXTRA_CYCLES;
            }
            Ok(())
        },
    },
    Instruction {
        mask: 0xFF,
        identifier: 0xC9,
        name: "RET",
        operands: Operands::None,
        mode: AddrMode::Implied,
        cycles: 10,
        execute: |emu: &mut Emulator, _opcode: u8, _pc: u16| {
            emu.state.pc = emu.state.pop();
            Ok(())
        },
    },
    Instruction {
        mask: 0xC7,
        identifier: 0xC0,
        name: "R",
        operands: Operands::Cond,
        mode: AddrMode::Implied,
        cycles: 5,
        execute: |emu: &mut Emulator, opcode: u8, _pc: u16| {
            if emu.state.flags.condition(cond(opcode)) {
                emu.state.pc = emu.state.pop();
                emu.state.cycles += TAKEN_EXTRA_CYCLES;
            }
            Ok(())
        },
    },
    Instruction {
        mask: 0xC7,
        identifier: 0xC7,
        name: "RST",
        operands: Operands::Vector,
        mode: AddrMode::Implied,
        cycles: 11,
        execute: |emu: &mut Emulator, opcode: u8, _pc: u16| {
            let ret = emu.state.pc;
            emu.state.push(ret);
            emu.state.pc = (opcode & 0x38) as u16;
            Ok(())
        },
    },
    Instruction {
        mask: 0xFF,
        identifier: 0xE9,
        name: "PCHL",
        operands: Operands::None,
        mode: AddrMode::Implied,
        cycles: 5,
        execute: |emu: &mut Emulator, _opcode: u8, _pc: u16| {
            emu.state.pc = emu.state.hl;
            Ok(())
        },
    },
];
