//! 128 字节记录的顺序读写

use std::io::{ErrorKind, Read, Write};

use tracing::warn;

use crate::emulator::GuestMemory;

/// CP/M 记录大小
pub const RECORD_SIZE: usize = 128;

/// 文本文件结束符，不满一条记录时用它补齐
pub const EOF_FILL: u8 = 0x1A;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStatus {
    Ok,
    EndOfFile,
    ReadError,
    WriteError,
}

impl RecordStatus {
    /// 返回给客户机的 A 寄存器值
    pub fn code(self) -> u8 {
        match self {
            RecordStatus::Ok => 0x00,
            _ => 0xFF,
        }
    }
}

/// 尽量读满 buf，返回实际读到的字节数
fn fill_record<R: Read + ?Sized>(file: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// 从文件读一条记录到 DMA 缓冲区
///
/// 读到 0 字节时不改动客户机内存，返回 EndOfFile。不满 128 字节时剩余部分填 0x1A
pub fn read_record<R, M>(file: &mut R, mem: &mut M, dma: u16) -> RecordStatus
where
    R: Read + ?Sized,
    M: GuestMemory + ?Sized,
{
    let mut record = [EOF_FILL; RECORD_SIZE];
    match fill_record(file, &mut record) {
        Ok(0) => RecordStatus::EndOfFile,
        Ok(n) => {
            record[n..].fill(EOF_FILL);
            mem.write_block(dma, &record);
            RecordStatus::Ok
        }
        Err(e) => {
            warn!("读取记录失败: {e}");
            RecordStatus::ReadError
        }
    }
}

/// 把 DMA 缓冲区中的一条记录写入文件，只有 128 字节全部写入才算成功
pub fn write_record<W, M>(file: &mut W, mem: &M, dma: u16) -> RecordStatus
where
    W: Write + ?Sized,
    M: GuestMemory + ?Sized,
{
    let mut record = [0u8; RECORD_SIZE];
    mem.read_block(dma, &mut record);
    match file.write_all(&record) {
        Ok(()) => RecordStatus::Ok,
        Err(e) => {
            warn!("写入记录失败: {e}");
            RecordStatus::WriteError
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emulator::Memory;
    use std::io::Cursor;

    /// 每次最多返回 n 字节的读取器
    struct Trickle<'a> {
        data: &'a [u8],
        chunk: usize,
    }

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let n = self.chunk.min(buf.len()).min(self.data.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    /// 只接受有限字节的写入器
    struct Limited {
        room: usize,
    }

    impl Write for Limited {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            let n = self.room.min(buf.len());
            self.room -= n;
            Ok(n)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_full_record() {
        let data: Vec<u8> = (0..200).map(|i| i as u8).collect();
        let mut file = Cursor::new(data);
        let mut mem = Memory::new();

        assert_eq!(read_record(&mut file, &mut mem, 0x80), RecordStatus::Ok);
        assert_eq!(mem.read_byte(0x80), 0);
        assert_eq!(mem.read_byte(0xFF), 127);
        assert_eq!(file.position(), 128);
    }

    #[test]
    fn test_short_record_padded() {
        let mut file = Cursor::new(vec![b'A'; 72]);
        let mut mem = Memory::new();

        assert_eq!(read_record(&mut file, &mut mem, 0x80), RecordStatus::Ok);
        let mut out = [0u8; RECORD_SIZE];
        mem.read_block(0x80, &mut out);
        assert!(out[..72].iter().all(|&b| b == b'A'));
        assert!(out[72..].iter().all(|&b| b == EOF_FILL));
    }

    #[test]
    fn test_end_of_file_leaves_memory() {
        let mut file = Cursor::new(Vec::new());
        let mut mem = Memory::new();
        mem.write_block(0x80, &[0x55; RECORD_SIZE]);

        assert_eq!(read_record(&mut file, &mut mem, 0x80), RecordStatus::EndOfFile);
        assert_eq!(RecordStatus::EndOfFile.code(), 0xFF);
        assert_eq!(mem.read_byte(0x80), 0x55);
    }

    #[test]
    fn test_gathers_partial_reads() {
        let data = [7u8; 128];
        let mut file = Trickle {
            data: &data,
            chunk: 50,
        };
        let mut mem = Memory::new();
        assert_eq!(read_record(&mut file, &mut mem, 0x1000), RecordStatus::Ok);
        assert_eq!(mem.read_byte(0x107F), 7);
    }

    #[test]
    fn test_write_record() {
        let mut mem = Memory::new();
        mem.write_block(0xFFC0, &[0x42; RECORD_SIZE]);
        let mut file = Cursor::new(Vec::new());

        assert_eq!(write_record(&mut file, &mem, 0xFFC0), RecordStatus::Ok);
        assert_eq!(file.get_ref().len(), RECORD_SIZE);
        assert!(file.get_ref().iter().all(|&b| b == 0x42));
    }

    #[test]
    fn test_partial_write_fails() {
        let mem = Memory::new();
        let mut sink = Limited { room: 100 };
        let status = write_record(&mut sink, &mem, 0x80);
        assert_eq!(status, RecordStatus::WriteError);
        assert_eq!(status.code(), 0xFF);
    }
}
