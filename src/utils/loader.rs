//! 程序映像加载
//!
//! 支持 Intel HEX、从 0 开始的原始二进制和 CP/M .COM 三种格式

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::const_values::{MEMORY_SIZE, TPA_START};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("无法读取程序文件 {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("HEX 文件第 {line} 行格式错误: {reason}")]
    BadRecord { line: usize, reason: String },

    #[error("HEX 文件第 {line} 行校验和错误: 记录和为 {sum:#04x}")]
    Checksum { line: usize, sum: u8 },

    #[error("{format} 映像过大: {size} 字节")]
    TooLarge { format: ProgramFormat, size: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramFormat {
    Hex,
    Binary,
    /// CP/M 可执行文件，装载到 0x0100
    Com,
}

impl ProgramFormat {
    /// 按扩展名猜测格式，未知扩展名按二进制处理
    pub fn detect(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref()
        {
            Some("hex") | Some("ihx") => ProgramFormat::Hex,
            Some("com") => ProgramFormat::Com,
            _ => ProgramFormat::Binary,
        }
    }
}

impl fmt::Display for ProgramFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProgramFormat::Hex => "HEX",
            ProgramFormat::Binary => "二进制",
            ProgramFormat::Com => ".COM",
        };
        f.write_str(name)
    }
}

/// 待装入内存的程序
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramImage {
    pub format: ProgramFormat,
    /// (装载地址, 数据)
    pub segments: Vec<(u16, Vec<u8>)>,
    pub start: u16,
}

impl ProgramImage {
    pub fn from_file(path: &Path, format: ProgramFormat) -> Result<Self, LoadError> {
        let data = fs::read(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        match format {
            ProgramFormat::Hex => Self::parse_hex(&String::from_utf8_lossy(&data)),
            ProgramFormat::Binary => Self::binary(data),
            ProgramFormat::Com => Self::com(data),
        }
    }

    /// 原始二进制从 0 开始装载，从 0 开始执行
    pub fn binary(data: Vec<u8>) -> Result<Self, LoadError> {
        if data.len() > MEMORY_SIZE {
            return Err(LoadError::TooLarge {
                format: ProgramFormat::Binary,
                size: data.len(),
            });
        }
        Ok(Self {
            format: ProgramFormat::Binary,
            segments: vec![(0, data)],
            start: 0,
        })
    }

    pub fn com(data: Vec<u8>) -> Result<Self, LoadError> {
        if data.len() > MEMORY_SIZE - TPA_START as usize {
            return Err(LoadError::TooLarge {
                format: ProgramFormat::Com,
                size: data.len(),
            });
        }
        Ok(Self {
            format: ProgramFormat::Com,
            segments: vec![(TPA_START, data)],
            start: TPA_START,
        })
    }

    /// 解析 Intel HEX 文本
    ///
    /// 只处理数据记录 (00)、结束记录 (01) 和起始地址记录 (03)，
    /// 03 记录取其地址字段作为起始 PC。不以 ':' 开头的行被忽略
    pub fn parse_hex(text: &str) -> Result<Self, LoadError> {
        let mut segments = Vec::new();
        let mut start = 0;

        for (index, raw) in text.lines().enumerate() {
            let line = index + 1;
            let Some(body) = raw.trim().strip_prefix(':') else {
                continue;
            };
            let bytes = hex::decode(body).map_err(|e| LoadError::BadRecord {
                line,
                reason: e.to_string(),
            })?;
            if bytes.len() < 5 {
                return Err(LoadError::BadRecord {
                    line,
                    reason: format!("记录过短: {} 字节", bytes.len()),
                });
            }
            let count = bytes[0] as usize;
            if bytes.len() != count + 5 {
                return Err(LoadError::BadRecord {
                    line,
                    reason: format!("长度字段为 {count}，实际数据 {} 字节", bytes.len() - 5),
                });
            }
            let sum = bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
            if sum != 0 {
                return Err(LoadError::Checksum { line, sum });
            }

            let addr = u16::from_be_bytes([bytes[1], bytes[2]]);
            match bytes[3] {
                0x00 => segments.push((addr, bytes[4..4 + count].to_vec())),
                0x01 => break,
                0x03 => start = addr,
                other => debug!("忽略第 {line} 行的 HEX 记录类型 {other:#04x}"),
            }
        }

        Ok(Self {
            format: ProgramFormat::Hex,
            segments,
            start,
        })
    }

    /// 全部数据字节数
    pub fn size(&self) -> usize {
        self.segments.iter().map(|(_, data)| data.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_format() {
        assert_eq!(ProgramFormat::detect(Path::new("boot.HEX")), ProgramFormat::Hex);
        assert_eq!(ProgramFormat::detect(Path::new("dir/stat.com")), ProgramFormat::Com);
        assert_eq!(ProgramFormat::detect(Path::new("rom.bin")), ProgramFormat::Binary);
        assert_eq!(ProgramFormat::detect(Path::new("noext")), ProgramFormat::Binary);
    }

    #[test]
    fn test_parse_hex() {
        let text = "\
:0301000076C900BD
junk line
:00100003ED
:00000001FF
:01200000AA35
";
        let image = ProgramImage::parse_hex(text).unwrap();
        assert_eq!(image.segments, vec![(0x0100, vec![0x76, 0xC9, 0x00])]);
        assert_eq!(image.start, 0x0010);
        assert_eq!(image.size(), 3);
    }

    #[test]
    fn test_hex_checksum_mismatch() {
        let err = ProgramImage::parse_hex(":0301000076C900BE\n").unwrap_err();
        assert!(matches!(err, LoadError::Checksum { line: 1, .. }));
    }

    #[test]
    fn test_hex_bad_records() {
        assert!(matches!(
            ProgramImage::parse_hex(":03010000"),
            Err(LoadError::BadRecord { line: 1, .. })
        ));
        assert!(matches!(
            ProgramImage::parse_hex(":0201000076C9BE\n:zz"),
            Err(LoadError::BadRecord { .. })
        ));
    }

    #[test]
    fn test_com_and_binary_limits() {
        let com = ProgramImage::com(vec![0; 16]).unwrap();
        assert_eq!(com.start, TPA_START);
        assert_eq!(com.segments[0].0, TPA_START);
        assert!(ProgramImage::com(vec![0; MEMORY_SIZE]).is_err());

        let bin = ProgramImage::binary(vec![0xC3, 0, 0]).unwrap();
        assert_eq!(bin.start, 0);
        assert!(ProgramImage::binary(vec![0; MEMORY_SIZE + 1]).is_err());
    }
}
