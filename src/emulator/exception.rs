//! 异常处理模块
//!
//! 这里的异常都会让模拟机停机，由调用方决定是否复位

use thiserror::Error;

use crate::system::{BdosFault, DiskError};

#[derive(Debug, Error)]
pub enum Exception {
    #[error("非法指令: {opcode:#04x} at {addr:#06x}")]
    IllegalInstruction { opcode: u8, addr: u16 },

    #[error("错误的磁盘指令: ED {byte2:02x} {byte3:02x} at {addr:#06x}")]
    BadDiskInstruction { byte2: u8, byte3: u8, addr: u16 },

    #[error("磁盘错误: {0}")]
    Disk(#[from] DiskError),

    #[error("{0}")]
    Bdos(#[from] BdosFault),
}
