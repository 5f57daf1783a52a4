//! CP/M BDOS 文件会话
//!
//! 客户程序通过 `CALL 0005h` 进入这里，C 寄存器为功能号，DE 为参数
//! (字符、字符串地址或 FCB 地址)。返回值写回 A 寄存器。

mod fcb;
mod filename;
mod handle;
mod seqio;

pub use fcb::{FCB_SEQUENTIAL_SIZE, FCB_SIZE, Fcb};
pub use filename::{extract as extract_file_name, host_file_name};
pub use handle::{FileToken, HANDLE_MAGIC, HandleTable};
pub use seqio::{EOF_FILL, RECORD_SIZE, RecordStatus};

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, error, warn};

use crate::const_values::DEFAULT_DMA_ADDR;
use crate::emulator::GuestMemory;

/// 成功
pub const RESULT_OK: u8 = 0x00;
/// 失败 / 文件结束
pub const RESULT_ERROR: u8 = 0xFF;

/// 字符串输出的结束符
const STRING_TERMINATOR: u8 = b'$';

/// BDOS 功能号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BdosFunction {
    ConsoleInput = 1,
    ConsoleOutput = 2,
    ListOutput = 5,
    PrintString = 9,
    ReadConsoleBuffer = 10,
    OpenFile = 15,
    CloseFile = 16,
    DeleteFile = 19,
    ReadSequential = 20,
    WriteSequential = 21,
    MakeFile = 22,
    SetDma = 26,
    ReadRandom = 33,
}

impl TryFrom<u8> for BdosFunction {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            1 => Self::ConsoleInput,
            2 => Self::ConsoleOutput,
            5 => Self::ListOutput,
            9 => Self::PrintString,
            10 => Self::ReadConsoleBuffer,
            15 => Self::OpenFile,
            16 => Self::CloseFile,
            19 => Self::DeleteFile,
            20 => Self::ReadSequential,
            21 => Self::WriteSequential,
            22 => Self::MakeFile,
            26 => Self::SetDma,
            33 => Self::ReadRandom,
            other => return Err(other),
        })
    }
}

impl BdosFunction {
    /// CP/M 手册中的助记名
    pub fn name(self) -> &'static str {
        match self {
            Self::ConsoleInput => "C_READ",
            Self::ConsoleOutput => "C_WRITE",
            Self::ListOutput => "L_WRITE",
            Self::PrintString => "C_WRITESTR",
            Self::ReadConsoleBuffer => "C_READSTR",
            Self::OpenFile => "F_OPEN",
            Self::CloseFile => "F_CLOSE",
            Self::DeleteFile => "F_DELETE",
            Self::ReadSequential => "F_READ",
            Self::WriteSequential => "F_WRITE",
            Self::MakeFile => "F_MAKE",
            Self::SetDma => "F_DMAOFF",
            Self::ReadRandom => "F_READRAND",
        }
    }
}

/// BDOS 调用现场
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BdosCall {
    /// 功能号 (C 寄存器)
    pub function: u8,
    /// 参数 (DE 寄存器)
    pub de: u16,
    /// BC 寄存器，仅用于诊断
    pub bc: u16,
    /// CALL 指令所在地址，仅用于诊断
    pub pc: u16,
}

/// 无法识别的功能号，模拟机必须停机
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("无法识别的 BDOS 功能 C={function:#04x} (PC={pc:#06x} BC={bc:#06x} DE={de:#06x})")]
pub struct BdosFault {
    pub function: u8,
    pub pc: u16,
    pub bc: u16,
    pub de: u16,
}

/// 一次 BDOS 调用的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BdosOutcome {
    /// 调用完成，Some 时写入 A 寄存器
    Completed(Option<u8>),
    Fatal(BdosFault),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpenMode {
    /// 打开已有文件读写
    Existing,
    /// 创建或截断
    Create,
}

/// 一个客户程序的 BDOS 文件会话
///
/// 持有 DMA 地址、打开的宿主机文件和控制台输出。文件名相对 `root` 解析
pub struct BdosSession {
    dma: u16,
    root: PathBuf,
    files: HandleTable,
    console: Box<dyn Write>,
}

impl std::fmt::Debug for BdosSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BdosSession")
            .field("dma", &self.dma)
            .field("root", &self.root)
            .field("files", &self.files)
            .finish_non_exhaustive()
    }
}

impl BdosSession {
    /// 创建新会话，控制台输出到标准输出
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            dma: DEFAULT_DMA_ADDR,
            root: root.into(),
            files: HandleTable::new(),
            console: Box::new(io::stdout()),
        }
    }

    pub fn with_console(mut self, console: Box<dyn Write>) -> Self {
        self.console = console;
        self
    }

    pub fn set_console(&mut self, console: Box<dyn Write>) {
        self.console = console;
    }

    pub fn with_dma(mut self, dma: u16) -> Self {
        self.dma = dma;
        self
    }

    #[inline(always)]
    pub fn dma(&self) -> u16 {
        self.dma
    }

    #[inline(always)]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 当前打开的文件数
    pub fn open_files(&self) -> usize {
        self.files.len()
    }

    /// 执行一次 BDOS 调用
    pub fn dispatch(&mut self, call: &BdosCall, mem: &mut dyn GuestMemory) -> BdosOutcome {
        let Ok(function) = BdosFunction::try_from(call.function) else {
            let fault = BdosFault {
                function: call.function,
                pc: call.pc,
                bc: call.bc,
                de: call.de,
            };
            error!("{fault}");
            return BdosOutcome::Fatal(fault);
        };
        debug!(function = function.name(), de = call.de, "BDOS 调用");

        let fcb_addr = call.de;
        let result = match function {
            BdosFunction::ConsoleOutput => {
                self.console_output(call.de as u8);
                None
            }
            BdosFunction::PrintString => {
                self.print_string(mem, call.de);
                None
            }
            BdosFunction::SetDma => {
                self.dma = call.de;
                None
            }
            BdosFunction::OpenFile => Some(self.open_file(mem, fcb_addr, OpenMode::Existing)),
            BdosFunction::MakeFile => Some(self.open_file(mem, fcb_addr, OpenMode::Create)),
            BdosFunction::CloseFile => Some(self.close_file(mem, fcb_addr)),
            BdosFunction::ReadSequential => Some(self.read_sequential(mem, fcb_addr)),
            BdosFunction::WriteSequential => Some(self.write_sequential(mem, fcb_addr)),
            BdosFunction::ConsoleInput
            | BdosFunction::ListOutput
            | BdosFunction::ReadConsoleBuffer
            | BdosFunction::DeleteFile
            | BdosFunction::ReadRandom => {
                warn!("BDOS 功能 {} ({}) 未实现", call.function, function.name());
                None
            }
        };
        BdosOutcome::Completed(result)
    }

    fn console_output(&mut self, byte: u8) {
        if let Err(e) = self.console.write_all(&[byte]).and_then(|_| self.console.flush()) {
            warn!("控制台输出失败: {e}");
        }
    }

    /// 输出到 '$' 为止的字符串，地址在 0xFFFF 处回绕
    fn print_string(&mut self, mem: &dyn GuestMemory, start: u16) {
        let mut text = Vec::new();
        let mut addr = start;
        loop {
            let byte = mem.read_byte(addr);
            if byte == STRING_TERMINATOR {
                break;
            }
            text.push(byte);
            addr = addr.wrapping_add(1);
            if addr == start {
                warn!("地址 {start:#06x} 处的字符串没有结束符");
                break;
            }
        }
        if let Err(e) = self.console.write_all(&text).and_then(|_| self.console.flush()) {
            warn!("控制台输出失败: {e}");
        }
    }

    fn open_file(&mut self, mem: &mut dyn GuestMemory, addr: u16, mode: OpenMode) -> u8 {
        let mut fcb = Fcb::decode(&*mem, addr);
        let Some(name) = host_file_name(&fcb) else {
            warn!("FCB {addr:#06x} 中的文件名无效: {:?}", extract_file_name(&fcb));
            return RESULT_ERROR;
        };

        // 保留区原有内容一律忽略，FCB 可能是另一个已打开 FCB 的副本
        let path = self.root.join(&name);
        let mut options = OpenOptions::new();
        options.read(true).write(true);
        if mode == OpenMode::Create {
            options.create(true).truncate(true);
        }
        let file = match options.open(&path) {
            Ok(file) => file,
            Err(e) => {
                debug!("无法打开文件 {}: {e}", path.display());
                return RESULT_ERROR;
            }
        };

        let Some(token) = self.files.insert(file, name) else {
            warn!("文件句柄表已满");
            return RESULT_ERROR;
        };
        fcb.reset_position();
        handle::embed(&mut fcb, token);
        fcb.encode(mem, addr, false);
        RESULT_OK
    }

    fn close_file(&mut self, mem: &mut dyn GuestMemory, addr: u16) -> u8 {
        let mut fcb = Fcb::decode(&*mem, addr);
        let Some(token) = handle::resolve(&fcb) else {
            warn!("F_CLOSE: FCB {addr:#06x} 没有打开的文件");
            return RESULT_ERROR;
        };
        let name = self.files.name(token).map(str::to_owned);
        let Some(mut file) = self.files.remove(token) else {
            warn!("F_CLOSE: FCB {addr:#06x} 的句柄已失效");
            return RESULT_ERROR;
        };
        debug!("关闭文件 {}", name.as_deref().unwrap_or("?"));
        if let Err(e) = file.flush() {
            warn!("关闭文件时刷新失败: {e}");
        }
        drop(file);
        handle::clear(&mut fcb);
        fcb.encode(mem, addr, false);
        RESULT_OK
    }

    fn read_sequential(&mut self, mem: &mut dyn GuestMemory, addr: u16) -> u8 {
        let dma = self.dma;
        let fcb = Fcb::decode(&*mem, addr);
        let Some(file) = handle::resolve(&fcb).and_then(|token| self.files.get_mut(token)) else {
            warn!("F_READ: FCB {addr:#06x} 没有打开的文件");
            return RESULT_ERROR;
        };
        let status = seqio::read_record(file, mem, dma);
        if status == RecordStatus::Ok {
            // DMA 区可能与 FCB 重叠，按传输后的内容推进
            let mut fcb = Fcb::decode(&*mem, addr);
            fcb.advance_record();
            fcb.encode(mem, addr, false);
        }
        status.code()
    }

    fn write_sequential(&mut self, mem: &mut dyn GuestMemory, addr: u16) -> u8 {
        let dma = self.dma;
        let fcb = Fcb::decode(&*mem, addr);
        let Some(file) = handle::resolve(&fcb).and_then(|token| self.files.get_mut(token)) else {
            warn!("F_WRITE: FCB {addr:#06x} 没有打开的文件");
            return RESULT_ERROR;
        };
        let status = seqio::write_record(file, mem, dma);
        if status == RecordStatus::Ok {
            // DMA 区可能与 FCB 重叠，按传输后的内容推进
            let mut fcb = Fcb::decode(&*mem, addr);
            fcb.advance_record();
            fcb.encode(mem, addr, false);
        }
        status.code()
    }
}
