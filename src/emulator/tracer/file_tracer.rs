use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::emulator::tracer::TracerTrace;
use crate::emulator::{GuestMemory, State};
use crate::utils::disasm::disasm_instruction;

/// 追踪文件，每条指令两行:
///
/// ```text
/// 0100: 0076  MVI   A,#41h
///         BC=0000 DE=0000 HL=0000 AF=4102
/// ```
///
/// 操作码以八进制显示
pub struct FileTracer {
    out: Box<dyn Write>,
}

impl FileTracer {
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self::new(Box::new(BufWriter::new(file))))
    }

    pub fn new(out: Box<dyn Write>) -> Self {
        Self { out }
    }
}

impl TracerTrace for FileTracer {
    fn name(&self) -> &'static str {
        "FileTracer"
    }

    fn trace(&mut self, state: &State, pc: u16) -> io::Result<()> {
        let (text, _) = disasm_instruction(&state.memory, pc);
        writeln!(self.out, "{:04x}: {:04o}  {}", pc, state.memory.read_byte(pc), text)
    }

    fn retire(&mut self, state: &State) -> io::Result<()> {
        writeln!(self.out, "        {}", state.register_line())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

impl Drop for FileTracer {
    fn drop(&mut self) {
        let _ = self.out.flush();
    }
}
