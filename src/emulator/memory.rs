//! 内存管理模块

use thiserror::Error;

use crate::const_values::MEMORY_SIZE;

/// 内存错误类型
#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("内存访问越界: 地址 {addr:#06x}, 大小 {size}")]
    OutOfBounds { addr: u16, size: usize },
}

/// 客户机内存的按字节访问接口
///
/// 地址空间是完整的 64 KiB，所有多字节访问在 0xFFFF 处回绕
pub trait GuestMemory {
    /// 读取字节
    fn read_byte(&self, addr: u16) -> u8;

    /// 写入字节
    fn write_byte(&mut self, addr: u16, value: u8);

    /// 读取小端 16 位字
    fn read_word(&self, addr: u16) -> u16 {
        u16::from_le_bytes([self.read_byte(addr), self.read_byte(addr.wrapping_add(1))])
    }

    /// 写入小端 16 位字
    fn write_word(&mut self, addr: u16, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        self.write_byte(addr, lo);
        self.write_byte(addr.wrapping_add(1), hi);
    }

    /// 从 addr 开始读满 buf
    fn read_block(&self, addr: u16, buf: &mut [u8]) {
        for (i, byte) in buf.iter_mut().enumerate() {
            *byte = self.read_byte(addr.wrapping_add(i as u16));
        }
    }

    /// 把 data 写到 addr 开始的位置
    fn write_block(&mut self, addr: u16, data: &[u8]) {
        for (i, byte) in data.iter().enumerate() {
            self.write_byte(addr.wrapping_add(i as u16), *byte);
        }
    }
}

/// 内存管理结构
#[derive(Debug, Clone)]
pub struct Memory {
    /// 内存数据
    data: Vec<u8>,
}

impl Memory {
    /// 创建新的内存实例
    pub fn new() -> Self {
        Self {
            data: vec![0; MEMORY_SIZE],
        }
    }

    /// 装载一段映像，不允许越过地址空间顶端
    pub fn load(&mut self, addr: u16, image: &[u8]) -> Result<(), MemoryError> {
        let start = addr as usize;
        let end = start
            .checked_add(image.len())
            .filter(|&end| end <= self.data.len())
            .ok_or(MemoryError::OutOfBounds {
                addr,
                size: image.len(),
            })?;
        self.data[start..end].copy_from_slice(image);
        Ok(())
    }

    /// 清零全部内存
    pub fn clear(&mut self) {
        self.data.fill(0);
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl GuestMemory for Memory {
    #[inline(always)]
    fn read_byte(&self, addr: u16) -> u8 {
        self.data[addr as usize]
    }

    #[inline(always)]
    fn write_byte(&mut self, addr: u16, value: u8) {
        self.data[addr as usize] = value;
    }
}
