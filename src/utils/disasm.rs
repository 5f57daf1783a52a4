//! 8080 指令反汇编模块
//!
//! 直接使用执行用的指令表，助记符占 6 列，随后是寄存器字段和立即数/地址

use crate::emulator::GuestMemory;
use crate::emulator::instructions::{
    AddrMode, COND_NAMES, InstDecoder, Instruction, Operands, PAIR_NAMES, REG_NAMES, cond, dst,
    pair, src,
};

fn register_field(inst: &Instruction, opcode: u8) -> Option<String> {
    match inst.operands {
        Operands::None | Operands::Cond => None,
        Operands::Dst => Some(REG_NAMES[dst(opcode) as usize].to_string()),
        Operands::Src => Some(REG_NAMES[src(opcode) as usize].to_string()),
        Operands::DstSrc => Some(format!(
            "{},{}",
            REG_NAMES[dst(opcode) as usize],
            REG_NAMES[src(opcode) as usize]
        )),
        Operands::Pair => Some(PAIR_NAMES[pair(opcode) as usize].to_string()),
        Operands::PairPsw => Some(match pair(opcode) {
            3 => "PSW".to_string(),
            rp => PAIR_NAMES[rp as usize].to_string(),
        }),
        Operands::Vector => Some(((opcode >> 3) & 7).to_string()),
    }
}

fn data_field<M: GuestMemory + ?Sized>(mode: AddrMode, mem: &M, addr: u16) -> Option<String> {
    let next = addr.wrapping_add(1);
    match mode {
        AddrMode::Implied => None,
        AddrMode::Imm8 => Some(format!("#{:02x}h", mem.read_byte(next))),
        AddrMode::Imm16 => Some(format!("#{:04x}h", mem.read_word(next))),
        AddrMode::Direct8 => Some(format!("{:02x}h", mem.read_byte(next))),
        AddrMode::Direct16 => Some(format!("{:04x}h", mem.read_word(next))),
    }
}

/// 格式化一条已译码的指令
pub fn format_instruction<M: GuestMemory + ?Sized>(
    inst: &Instruction,
    mem: &M,
    addr: u16,
) -> String {
    let opcode = mem.read_byte(addr);
    let mnemonic = match inst.operands {
        Operands::Cond => format!("{}{}", inst.name, COND_NAMES[cond(opcode) as usize]),
        _ => inst.name.to_string(),
    };
    let fields: Vec<String> = register_field(inst, opcode)
        .into_iter()
        .chain(data_field(inst.mode, mem, addr))
        .collect();
    if fields.is_empty() {
        mnemonic
    } else {
        format!("{:<6}{}", mnemonic, fields.join(","))
    }
}

/// 反汇编 addr 处的一条指令，返回文本与指令长度
pub fn disasm_instruction<M: GuestMemory + ?Sized>(mem: &M, addr: u16) -> (String, u16) {
    let inst = InstDecoder::shared().decode(mem.read_byte(addr));
    (format_instruction(inst, mem, addr), inst.mode.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emulator::Memory;

    fn disasm(bytes: &[u8]) -> (String, u16) {
        let mut mem = Memory::new();
        mem.write_block(0x0100, bytes);
        disasm_instruction(&mem, 0x0100)
    }

    #[test]
    fn test_register_forms() {
        assert_eq!(disasm(&[0x41]), ("MOV   B,C".to_string(), 1));
        assert_eq!(disasm(&[0x7E]), ("MOV   A,M".to_string(), 1));
        assert_eq!(disasm(&[0x04]), ("INR   B".to_string(), 1));
        assert_eq!(disasm(&[0x86]), ("ADD   M".to_string(), 1));
        assert_eq!(disasm(&[0xF5]), ("PUSH  PSW".to_string(), 1));
        assert_eq!(disasm(&[0xC5]), ("PUSH  BC".to_string(), 1));
        assert_eq!(disasm(&[0x1A]), ("LDAX  DE".to_string(), 1));
        assert_eq!(disasm(&[0xD7]), ("RST   2".to_string(), 1));
    }

    #[test]
    fn test_immediate_and_direct_forms() {
        assert_eq!(disasm(&[0x01, 0x34, 0x12]), ("LXI   BC,#1234h".to_string(), 3));
        assert_eq!(disasm(&[0x36, 0x5A]), ("MVI   M,#5ah".to_string(), 2));
        assert_eq!(disasm(&[0xC6, 0x01]), ("ADI   #01h".to_string(), 2));
        assert_eq!(disasm(&[0x32, 0x00, 0x80]), ("STA   8000h".to_string(), 3));
        assert_eq!(disasm(&[0xDB, 0x01]), ("IN    01h".to_string(), 2));
        assert_eq!(disasm(&[0xCD, 0x05, 0x00]), ("CALL  0005h".to_string(), 3));
    }

    #[test]
    fn test_conditional_and_implied_forms() {
        assert_eq!(disasm(&[0xC2, 0x00, 0x01]), ("JNZ   0100h".to_string(), 3));
        assert_eq!(disasm(&[0xFC, 0x10, 0x00]), ("CM    0010h".to_string(), 3));
        assert_eq!(disasm(&[0xC8]), ("RZ".to_string(), 1));
        assert_eq!(disasm(&[0x76]), ("HLT".to_string(), 1));
        assert_eq!(disasm(&[0xEB]), ("XCHG".to_string(), 1));
        assert_eq!(disasm(&[0x08]), ("???".to_string(), 1));
    }
}
