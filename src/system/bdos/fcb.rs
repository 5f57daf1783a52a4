//! 文件控制块 (FCB) 编解码
//!
//! FCB 布局 (36 字节):
//!
//! | 偏移 | 长度 | 字段 |
//! |------|------|------|
//! | 0    | 1    | 驱动器 (0 = 默认) |
//! | 1    | 8    | 文件名，空格填充 |
//! | 9    | 3    | 扩展名，空格填充 |
//! | 12   | 1    | 扩展区号 |
//! | 13   | 2    | S1, S2 |
//! | 15   | 1    | 当前扩展区记录数 |
//! | 16   | 16   | 保留区 (存放内嵌句柄) |
//! | 32   | 1    | 当前记录号 |
//! | 33   | 3    | 随机记录号 |

use crate::emulator::GuestMemory;

/// 完整 FCB 大小 (包含随机访问字段)
pub const FCB_SIZE: usize = 36;
/// 顺序访问时回写的字节数
pub const FCB_SEQUENTIAL_SIZE: usize = 33;

/// 每个扩展区包含的记录数
const RECORDS_PER_EXTENT: u8 = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Fcb {
    pub drive: u8,
    pub filename: [u8; 8],
    pub extension: [u8; 3],
    pub extent_num: u8,
    pub s1: u8,
    pub s2: u8,
    pub record_count: u8,
    pub reserved: [u8; 16],
    pub current_record: u8,
    pub random_record: [u8; 3],
}

impl Fcb {
    pub fn from_bytes(bytes: &[u8; FCB_SIZE]) -> Self {
        let mut fcb = Fcb {
            drive: bytes[0],
            extent_num: bytes[12],
            s1: bytes[13],
            s2: bytes[14],
            record_count: bytes[15],
            current_record: bytes[32],
            ..Default::default()
        };
        fcb.filename.copy_from_slice(&bytes[1..9]);
        fcb.extension.copy_from_slice(&bytes[9..12]);
        fcb.reserved.copy_from_slice(&bytes[16..32]);
        fcb.random_record.copy_from_slice(&bytes[33..36]);
        fcb
    }

    pub fn to_bytes(&self) -> [u8; FCB_SIZE] {
        let mut bytes = [0u8; FCB_SIZE];
        bytes[0] = self.drive;
        bytes[1..9].copy_from_slice(&self.filename);
        bytes[9..12].copy_from_slice(&self.extension);
        bytes[12] = self.extent_num;
        bytes[13] = self.s1;
        bytes[14] = self.s2;
        bytes[15] = self.record_count;
        bytes[16..32].copy_from_slice(&self.reserved);
        bytes[32] = self.current_record;
        bytes[33..36].copy_from_slice(&self.random_record);
        bytes
    }

    /// 从客户机内存读取 36 字节，不做任何字段校验
    pub fn decode<M: GuestMemory + ?Sized>(mem: &M, addr: u16) -> Self {
        let mut bytes = [0u8; FCB_SIZE];
        mem.read_block(addr, &mut bytes);
        Self::from_bytes(&bytes)
    }

    /// 写回客户机内存
    ///
    /// `extended` 为 false 时只写前 33 字节，随机记录号保持不变
    pub fn encode<M: GuestMemory + ?Sized>(&self, mem: &mut M, addr: u16, extended: bool) {
        let bytes = self.to_bytes();
        let size = if extended {
            FCB_SIZE
        } else {
            FCB_SEQUENTIAL_SIZE
        };
        mem.write_block(addr, &bytes[..size]);
    }

    /// 打开或创建文件时复位位置信息
    pub fn reset_position(&mut self) {
        self.extent_num = 0;
        self.s1 = 0;
        self.s2 = 0;
        self.record_count = 0;
        self.current_record = 0;
    }

    /// 顺序读写一条记录之后推进当前记录号，满一个扩展区后进入下一个扩展区
    pub fn advance_record(&mut self) {
        self.current_record = self.current_record.wrapping_add(1);
        if self.current_record >= RECORDS_PER_EXTENT {
            self.current_record = 0;
            self.extent_num = self.extent_num.wrapping_add(1);
        }
    }
}
