#![allow(dead_code)]

use std::io::{self, Write};
use std::path::Path;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use cpm80::const_values::EmuConfig;
use cpm80::emulator::{Emulator, GuestMemory};
use cpm80::utils::ProgramImage;

/// 可在测试里读回内容的控制台
#[derive(Clone, Default)]
pub struct SharedBuf(pub Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// 手工汇编的 8080 代码
#[derive(Default)]
pub struct Asm {
    pub code: Vec<u8>,
}

impl Asm {
    pub fn new() -> Self {
        Self::default()
    }

    /// LXI D,de; MVI C,function; CALL 0005h
    pub fn bdos(mut self, function: u8, de: u16) -> Self {
        let [lo, hi] = de.to_le_bytes();
        self.code.extend_from_slice(&[0x11, lo, hi, 0x0E, function, 0xCD, 0x05, 0x00]);
        self
    }

    /// STA addr
    pub fn sta(mut self, addr: u16) -> Self {
        let [lo, hi] = addr.to_le_bytes();
        self.code.extend_from_slice(&[0x32, lo, hi]);
        self
    }

    /// MVI A,value
    pub fn mvi_a(mut self, value: u8) -> Self {
        self.code.extend_from_slice(&[0x3E, value]);
        self
    }

    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.code.extend_from_slice(bytes);
        self
    }

    pub fn ret(self) -> Self {
        self.raw(&[0xC9])
    }

    pub fn hlt(self) -> Self {
        self.raw(&[0x76])
    }
}

/// 根目录为 root、控制台为 console 的 .COM 运行环境
pub fn com_emulator(root: &Path, console: &SharedBuf, program: Asm) -> Emulator {
    let mut config = EmuConfig::default();
    config.bdos.root_dir = root.to_path_buf();
    let mut emu = Emulator::new(Rc::new(config));
    emu.set_console(Box::new(console.clone()));
    let image = ProgramImage::com(program.code).unwrap();
    emu.load_program(&image).unwrap();
    emu
}

/// 在 addr 处放一个只填了文件名的 FCB
pub fn place_fcb(emu: &mut Emulator, addr: u16, name: &str, ext: &str) {
    let mut fcb = [0u8; 36];
    fcb[1..12].fill(b' ');
    fcb[1..1 + name.len()].copy_from_slice(name.as_bytes());
    fcb[9..9 + ext.len()].copy_from_slice(ext.as_bytes());
    emu.get_state_mut().memory.write_block(addr, &fcb);
}

pub fn read_mem(emu: &Emulator, addr: u16, len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    emu.get_state_ref().memory.read_block(addr, &mut buf);
    buf
}
