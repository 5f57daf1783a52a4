//! 工具模块

pub mod disasm;
pub mod loader;
pub mod ringbuf;

pub use disasm::disasm_instruction;
pub use loader::{LoadError, ProgramFormat, ProgramImage};
