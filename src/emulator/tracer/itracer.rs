use std::io;

use crate::emulator::tracer::TracerTrace;
use crate::emulator::{GuestMemory, State};
use crate::utils::disasm::disasm_instruction;
use crate::utils::ringbuf::RingBuffer;

/// 一条指令的地址和最多 3 个字节
#[derive(Debug, Clone, Copy, Default)]
struct Instruction {
    pc: u16,
    bytes: [u8; 3],
}

impl GuestMemory for Instruction {
    fn read_byte(&self, addr: u16) -> u8 {
        let offset = addr.wrapping_sub(self.pc) as usize;
        self.bytes.get(offset).copied().unwrap_or(0)
    }

    fn write_byte(&mut self, _addr: u16, _value: u8) {}
}

/// 指令追踪器，保留最近执行的若干条指令
pub struct ITracer {
    instructions: RingBuffer<Instruction>,
}

impl ITracer {
    pub fn new(size: usize) -> Self {
        ITracer {
            instructions: RingBuffer::new(size),
        }
    }
}

impl TracerTrace for ITracer {
    fn name(&self) -> &'static str {
        "ITracer"
    }

    fn trace(&mut self, state: &State, pc: u16) -> io::Result<()> {
        let mut bytes = [0u8; 3];
        state.memory.read_block(pc, &mut bytes);
        self.instructions.push_overwrite(Instruction { pc, bytes });
        Ok(())
    }

    /// 打印所有追踪的指令(带反汇编)
    fn get_instructions_log(&mut self) -> String {
        let mut log = String::new();
        for inst in self.instructions.iter() {
            let (text, len) = disasm_instruction(inst, inst.pc);
            let code: String = inst.bytes[..len as usize]
                .iter()
                .map(|b| format!("{b:02x} "))
                .collect();
            log += &format!("{:04x}: {:<9} {}\n", inst.pc, code, text);
        }
        log
    }
}
