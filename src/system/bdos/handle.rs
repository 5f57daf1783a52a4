//! 宿主机文件句柄与 FCB 保留区之间的关联
//!
//! 打开的宿主机文件放在 [`HandleTable`] 里，客户机只持有一个 [`FileToken`]
//! (槽位号 + 代数)。令牌连同魔数和校验值一起写进 FCB 的保留区，
//! 下一次 BDOS 调用时再读出来查表。客户机可以任意改写保留区，
//! 因此每一步都可能失败：魔数不符、校验不符、槽位已关闭或已被复用。

use std::fs::File;

use nohash_hasher::IntMap;
use tracing::trace;

use super::fcb::Fcb;

/// 保留区前 4 字节的魔数 (小端 "FILE")
pub const HANDLE_MAGIC: u32 = 0x454C_4946;

/// 参与校验值计算的常量
const IDENTITY_SALT: u64 = 0x9E37_79B9_7F4A_7C15;

const MAGIC_OFFSET: usize = 0;
const CHECK_OFFSET: usize = 4;
const SLOT_OFFSET: usize = 8;
const GENERATION_OFFSET: usize = 10;

/// 一个打开文件在句柄表中的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileToken {
    pub slot: u16,
    pub generation: u16,
}

impl FileToken {
    fn identity(self) -> u64 {
        (((self.generation as u64) << 16) | self.slot as u64) ^ IDENTITY_SALT
    }

    /// 令牌身份的高低 32 位异或
    pub fn check(self) -> u32 {
        let identity = self.identity();
        ((identity >> 32) as u32) ^ (identity as u32)
    }
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

/// 把令牌写进 FCB 保留区，覆盖全部 16 字节
pub fn embed(fcb: &mut Fcb, token: FileToken) {
    let reserved = &mut fcb.reserved;
    reserved.fill(0);
    reserved[MAGIC_OFFSET..MAGIC_OFFSET + 4].copy_from_slice(&HANDLE_MAGIC.to_le_bytes());
    reserved[CHECK_OFFSET..CHECK_OFFSET + 4].copy_from_slice(&token.check().to_le_bytes());
    reserved[SLOT_OFFSET..SLOT_OFFSET + 2].copy_from_slice(&token.slot.to_le_bytes());
    reserved[GENERATION_OFFSET..GENERATION_OFFSET + 2]
        .copy_from_slice(&token.generation.to_le_bytes());
}

/// 从 FCB 保留区读出令牌，魔数或校验值不符时返回 None
///
/// 这里只检查保留区本身，令牌是否仍然有效由 [`HandleTable`] 判断
pub fn resolve(fcb: &Fcb) -> Option<FileToken> {
    let reserved = &fcb.reserved;
    if read_u32(reserved, MAGIC_OFFSET) != HANDLE_MAGIC {
        return None;
    }
    let token = FileToken {
        slot: read_u16(reserved, SLOT_OFFSET),
        generation: read_u16(reserved, GENERATION_OFFSET),
    };
    (read_u32(reserved, CHECK_OFFSET) == token.check()).then_some(token)
}

/// 清空保留区
pub fn clear(fcb: &mut Fcb) {
    fcb.reserved.fill(0);
}

#[derive(Debug)]
struct OpenFile {
    generation: u16,
    name: String,
    file: File,
}

/// 宿主机上打开文件的表
///
/// 槽位关闭后代数加一，旧令牌随之失效
#[derive(Debug)]
pub struct HandleTable {
    open: IntMap<u16, OpenFile>,
    /// 每个用过的槽位下一次分配时使用的代数
    generations: IntMap<u16, u16>,
    free: Vec<u16>,
    next_slot: u32,
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new()
    }
}

impl HandleTable {
    pub fn new() -> Self {
        Self {
            open: IntMap::default(),
            generations: IntMap::default(),
            free: Vec::new(),
            next_slot: 0,
        }
    }

    /// 登记一个打开的文件，槽位耗尽时返回 None
    pub fn insert(&mut self, file: File, name: String) -> Option<FileToken> {
        let slot = match self.free.pop() {
            Some(slot) => slot,
            None if self.next_slot <= u16::MAX as u32 => {
                let slot = self.next_slot as u16;
                self.next_slot += 1;
                slot
            }
            None => return None,
        };
        let generation = *self.generations.entry(slot).or_insert(1);
        trace!(slot, generation, name = %name, "登记文件句柄");
        self.open.insert(
            slot,
            OpenFile {
                generation,
                name,
                file,
            },
        );
        Some(FileToken { slot, generation })
    }

    pub fn get_mut(&mut self, token: FileToken) -> Option<&mut File> {
        self.open
            .get_mut(&token.slot)
            .filter(|entry| entry.generation == token.generation)
            .map(|entry| &mut entry.file)
    }

    pub fn name(&self, token: FileToken) -> Option<&str> {
        self.open
            .get(&token.slot)
            .filter(|entry| entry.generation == token.generation)
            .map(|entry| entry.name.as_str())
    }

    /// 释放槽位并交还文件，令牌失效
    pub fn remove(&mut self, token: FileToken) -> Option<File> {
        if self.open.get(&token.slot)?.generation != token.generation {
            return None;
        }
        let entry = self.open.remove(&token.slot)?;
        // 代数 0 保留给从未分配过的令牌
        let next = match entry.generation.wrapping_add(1) {
            0 => 1,
            g => g,
        };
        self.generations.insert(token.slot, next);
        self.free.push(token.slot);
        trace!(slot = token.slot, name = %entry.name, "释放文件句柄");
        Some(entry.file)
    }

    pub fn len(&self) -> usize {
        self.open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_file() -> File {
        tempfile::tempfile().unwrap()
    }

    #[test]
    fn test_embed_layout() {
        let mut fcb = Fcb::default();
        fcb.reserved = [0xEE; 16];
        let token = FileToken {
            slot: 0x0102,
            generation: 0x0304,
        };
        embed(&mut fcb, token);

        assert_eq!(&fcb.reserved[0..4], &[0x46, 0x49, 0x4C, 0x45]);
        assert_eq!(&fcb.reserved[4..8], &token.check().to_le_bytes());
        assert_eq!(&fcb.reserved[8..10], &[0x02, 0x01]);
        assert_eq!(&fcb.reserved[10..12], &[0x04, 0x03]);
        assert_eq!(&fcb.reserved[12..16], &[0; 4]);
        assert_eq!(resolve(&fcb), Some(token));
    }

    #[test]
    fn test_resolve_rejects_zeroed_region() {
        assert_eq!(resolve(&Fcb::default()), None);
    }

    #[test]
    fn test_resolve_rejects_tampering() {
        let token = FileToken {
            slot: 3,
            generation: 1,
        };
        let mut fcb = Fcb::default();
        embed(&mut fcb, token);

        let mut bad_magic = fcb;
        bad_magic.reserved[0] ^= 0x01;
        assert_eq!(resolve(&bad_magic), None);

        let mut bad_check = fcb;
        bad_check.reserved[5] ^= 0x80;
        assert_eq!(resolve(&bad_check), None);

        // 只改槽位号，校验值对不上
        let mut bad_slot = fcb;
        bad_slot.reserved[8] = 4;
        assert_eq!(resolve(&bad_slot), None);
    }

    #[test]
    fn test_clear() {
        let mut fcb = Fcb::default();
        embed(
            &mut fcb,
            FileToken {
                slot: 0,
                generation: 1,
            },
        );
        clear(&mut fcb);
        assert_eq!(fcb.reserved, [0; 16]);
        assert_eq!(resolve(&fcb), None);
    }

    #[test]
    fn test_table_lookup() {
        let mut table = HandleTable::new();
        let a = table.insert(scratch_file(), "A.TXT".into()).unwrap();
        let b = table.insert(scratch_file(), "B.TXT".into()).unwrap();
        assert_ne!(a.slot, b.slot);
        assert_eq!(table.len(), 2);
        assert_eq!(table.name(a), Some("A.TXT"));
        assert!(table.get_mut(b).is_some());
    }

    #[test]
    fn test_stale_token_after_reuse() {
        let mut table = HandleTable::new();
        let old = table.insert(scratch_file(), "OLD".into()).unwrap();
        assert!(table.remove(old).is_some());
        assert!(table.is_empty());

        let new = table.insert(scratch_file(), "NEW".into()).unwrap();
        assert_eq!(new.slot, old.slot);
        assert_ne!(new.generation, old.generation);
        assert!(table.get_mut(old).is_none());
        assert!(table.remove(old).is_none());
        assert_eq!(table.name(new), Some("NEW"));
    }

    #[test]
    fn test_double_remove() {
        let mut table = HandleTable::new();
        let token = table.insert(scratch_file(), "X".into()).unwrap();
        assert!(table.remove(token).is_some());
        assert!(table.remove(token).is_none());
    }
}
