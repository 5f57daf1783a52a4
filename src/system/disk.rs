//! 磁盘映像访问 (`ED 02` / `ED 03` 伪指令)
//!
//! 参数放在固定的内存地址上，每次传输一个 128 字节扇区

use std::fs::{File, OpenOptions};
use std::io::{self, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::{debug, info};

use crate::emulator::GuestMemory;

/// 缓冲区地址 (16 位)
pub const DISK_BUF_ADDR: u16 = 0xFBFA;
/// 扇区号
pub const DISK_SECTOR_ADDR: u16 = 0xFBFC;
/// 柱面号 (16 位)
pub const DISK_CYLINDER_ADDR: u16 = 0xFBFD;
/// 驱动器号
pub const DISK_DRIVE_ADDR: u16 = 0xFBFF;

pub const SECTOR_SIZE: usize = 128;
pub const SECTORS_PER_CYLINDER: u64 = 128;

#[derive(Debug, Error)]
pub enum DiskError {
    #[error("无效的驱动器号: {0}")]
    BadDrive(u8),

    #[error("无法打开驱动器 {drive} 的映像 {path}: {source}")]
    Open {
        drive: u8,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("驱动器 {drive} 访问失败 (柱面 {cylinder}, 扇区 {sector}): {source}")]
    Io {
        drive: u8,
        cylinder: u16,
        sector: u8,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskOp {
    Read,
    Write,
}

impl DiskOp {
    /// `ED` 之后的第二个字节
    pub fn from_selector(byte: u8) -> Option<Self> {
        match byte {
            0x02 => Some(Self::Read),
            0x03 => Some(Self::Write),
            _ => None,
        }
    }
}

/// 从客户机内存中取出的一次传输请求
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskRequest {
    pub buffer: u16,
    pub sector: u8,
    pub cylinder: u16,
    pub drive: u8,
}

impl DiskRequest {
    pub fn from_memory<M: GuestMemory + ?Sized>(mem: &M) -> Self {
        Self {
            buffer: mem.read_word(DISK_BUF_ADDR),
            sector: mem.read_byte(DISK_SECTOR_ADDR),
            cylinder: mem.read_word(DISK_CYLINDER_ADDR),
            drive: mem.read_byte(DISK_DRIVE_ADDR),
        }
    }

    /// 映像中的字节偏移
    pub fn offset(&self) -> u64 {
        (self.cylinder as u64 * SECTORS_PER_CYLINDER + self.sector as u64) * SECTOR_SIZE as u64
    }
}

/// 磁盘控制器，驱动器映像在第一次访问时打开
#[derive(Debug)]
pub struct DiskController {
    /// 驱动器 n 使用 images[n - 1]
    images: Vec<PathBuf>,
    opened: FxHashMap<u8, File>,
}

impl DiskController {
    pub fn new(images: Vec<PathBuf>) -> Self {
        Self {
            images,
            opened: FxHashMap::default(),
        }
    }

    fn image(&mut self, drive: u8) -> Result<&mut File, DiskError> {
        if !self.opened.contains_key(&drive) {
            let path = drive
                .checked_sub(1)
                .and_then(|index| self.images.get(index as usize))
                .ok_or(DiskError::BadDrive(drive))?
                .clone();
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .open(&path)
                .map_err(|source| DiskError::Open {
                    drive,
                    path: path.clone(),
                    source,
                })?;
            info!("驱动器 {drive} 挂载映像 {}", path.display());
            self.opened.insert(drive, file);
        }
        self.opened.get_mut(&drive).ok_or(DiskError::BadDrive(drive))
    }

    /// 执行一次扇区传输
    pub fn transfer<M: GuestMemory + ?Sized>(
        &mut self,
        mem: &mut M,
        op: DiskOp,
    ) -> Result<DiskRequest, DiskError> {
        let request = DiskRequest::from_memory(mem);
        debug!(
            "磁盘 {:?}: 驱动器 {} 柱面 {} 扇区 {} 缓冲区 {:#06x}",
            op, request.drive, request.cylinder, request.sector, request.buffer
        );
        let io_error = |source| DiskError::Io {
            drive: request.drive,
            cylinder: request.cylinder,
            sector: request.sector,
            source,
        };

        let image = self.image(request.drive)?;
        image
            .seek(SeekFrom::Start(request.offset()))
            .map_err(io_error)?;
        match op {
            DiskOp::Read => {
                let mut sector = [0u8; SECTOR_SIZE];
                let n = read_sector(image, &mut sector).map_err(io_error)?;
                // 映像末尾不足一个扇区时只复制读到的部分
                mem.write_block(request.buffer, &sector[..n]);
            }
            DiskOp::Write => {
                let mut sector = [0u8; SECTOR_SIZE];
                mem.read_block(request.buffer, &mut sector);
                image.write_all(&sector).map_err(io_error)?;
            }
        }
        Ok(request)
    }

    /// 刷新所有已打开的映像
    pub fn flush(&mut self) -> io::Result<()> {
        for image in self.opened.values_mut() {
            image.flush()?;
        }
        Ok(())
    }
}

fn read_sector(image: &mut File, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match image.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
