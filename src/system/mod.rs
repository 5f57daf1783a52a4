//! 系统接口模块
//!
//! 客户程序看到的 "操作系统": BDOS 文件会话与磁盘控制器

pub mod bdos;
mod disk;

pub use bdos::{BdosCall, BdosFault, BdosOutcome, BdosSession};
pub use disk::{
    DISK_BUF_ADDR, DISK_CYLINDER_ADDR, DISK_DRIVE_ADDR, DISK_SECTOR_ADDR, DiskController, DiskError,
    DiskOp, DiskRequest, SECTOR_SIZE,
};

use std::io::Write;

use crate::const_values::EmuConfig;
use crate::emulator::GuestMemory;

/// 系统接口结构体
#[derive(Debug)]
pub struct System {
    bdos: BdosSession,
    bdos_enabled: bool,
    disk: DiskController,
}

impl System {
    /// 按配置创建系统接口
    pub fn new(config: &EmuConfig) -> Self {
        Self {
            bdos: BdosSession::new(config.bdos.root_dir.clone()).with_dma(config.bdos.dma_default),
            bdos_enabled: config.bdos.enabled,
            disk: DiskController::new(config.disk.images.clone()),
        }
    }

    /// 替换 BDOS 控制台输出
    pub fn set_console(&mut self, console: Box<dyn Write>) {
        self.bdos.set_console(console);
    }

    #[inline(always)]
    pub fn bdos_enabled(&self) -> bool {
        self.bdos_enabled
    }

    pub fn set_bdos_enabled(&mut self, enabled: bool) {
        self.bdos_enabled = enabled;
    }

    pub fn bdos(&self) -> &BdosSession {
        &self.bdos
    }

    /// 处理 BDOS 调用
    pub fn handle_bdos(&mut self, call: &BdosCall, memory: &mut dyn GuestMemory) -> BdosOutcome {
        self.bdos.dispatch(call, memory)
    }

    /// 刷新已打开的磁盘映像
    pub fn flush(&mut self) -> std::io::Result<()> {
        self.disk.flush()
    }

    /// 处理磁盘伪指令
    pub fn handle_disk(
        &mut self,
        op: DiskOp,
        memory: &mut dyn GuestMemory,
    ) -> Result<DiskRequest, DiskError> {
        self.disk.transfer(memory, op)
    }
}
