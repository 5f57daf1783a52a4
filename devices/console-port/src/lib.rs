//! 控制台端口设备实现
//!
//! 端口分配:
//! - 0x00 读: 输入状态 (1 = 有字符可读), 写: 输出字符
//! - 0x01 读: 读取一个输入字符
//! - 0xF8 读: Sol-20 UART 状态 (发送缓冲区总是空)
//! - 0xF9 写: Sol-20 UART 数据

use port_trait::{DeviceError, PortDevice};
use std::io::{self, Read, Write};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

/// 控制台端口号
pub const CONSOLE_STATUS_PORT: u8 = 0x00;
pub const CONSOLE_DATA_PORT: u8 = 0x01;
pub const SOL20_STATUS_PORT: u8 = 0xF8;
pub const SOL20_DATA_PORT: u8 = 0xF9;

/// Sol-20 UART 状态位: 发送缓冲区空
const SOL20_STATUS_TX_EMPTY: u8 = 0x80;

/// 输入流结束后读取到的字符 (CP/M 的 EOF 约定)
const INPUT_EOF: u8 = 0x1A;

const PORTS: [u8; 4] = [
    CONSOLE_STATUS_PORT,
    CONSOLE_DATA_PORT,
    SOL20_STATUS_PORT,
    SOL20_DATA_PORT,
];

/// 控制台设备
pub struct ConsolePort {
    name: String,
    input: Receiver<u8>,
    pending: Option<u8>,
    output: Box<dyn Write + Send>,
}

impl ConsolePort {
    /// 使用给定的输入通道与输出流创建控制台设备
    pub fn new(name: String, input: Receiver<u8>, output: Box<dyn Write + Send>) -> Self {
        Self {
            name,
            input,
            pending: None,
            output,
        }
    }

    /// 连接到宿主机标准输入输出
    ///
    /// 标准输入由后台线程逐字节读取, 这样状态端口可以不阻塞地查询
    pub fn stdio(name: String) -> Self {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut stdin = io::stdin();
            let mut byte = [0u8; 1];
            while let Ok(1) = stdin.read(&mut byte) {
                if tx.send(byte[0]).is_err() {
                    break;
                }
            }
        });
        Self::new(name, rx, Box::new(io::stdout()))
    }

    fn poll_input(&mut self) -> bool {
        if self.pending.is_none() {
            match self.input.try_recv() {
                Ok(byte) => self.pending = Some(byte),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {}
            }
        }
        self.pending.is_some()
    }

    fn next_input(&mut self) -> u8 {
        match self.pending.take() {
            Some(byte) => byte,
            None => self.input.recv().unwrap_or(INPUT_EOF),
        }
    }

    fn emit(&mut self, value: u8) -> Result<(), DeviceError> {
        self.output
            .write_all(&[value])
            .and_then(|_| self.output.flush())
            .map_err(|e| DeviceError::Internal(format!("控制台输出错误: {}", e)))
    }
}

impl PortDevice for ConsolePort {
    fn read(&mut self, port: u8) -> Result<u8, DeviceError> {
        match port {
            CONSOLE_STATUS_PORT => Ok(self.poll_input() as u8),
            CONSOLE_DATA_PORT => Ok(self.next_input()),
            SOL20_STATUS_PORT => Ok(SOL20_STATUS_TX_EMPTY),
            _ => Err(DeviceError::Unsupported(format!(
                "控制台端口 {:#04x} 不可读",
                port
            ))),
        }
    }

    fn write(&mut self, port: u8, value: u8) -> Result<(), DeviceError> {
        match port {
            CONSOLE_STATUS_PORT | SOL20_DATA_PORT => self.emit(value),
            _ => Err(DeviceError::Unsupported(format!(
                "控制台端口 {:#04x} 不可写",
                port
            ))),
        }
    }

    fn ports(&self) -> &[u8] {
        &PORTS
    }

    fn name(&self) -> &str {
        &self.name
    }
}
