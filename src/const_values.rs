use anyhow::{self, Context};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// 8080 地址空间大小
pub const MEMORY_SIZE: usize = 0x1_0000;

/// CP/M 热启动入口
pub const WARM_BOOT_ADDR: u16 = 0x0000;
/// CP/M BDOS 调用入口 (CALL 5)
pub const BDOS_ENTRY_ADDR: u16 = 0x0005;
/// TPA 顶部指针所在地址
pub const TPA_TOP_PTR_ADDR: u16 = 0x0006;
/// .COM 程序加载地址
pub const TPA_START: u16 = 0x0100;
/// 默认 DMA 缓冲区地址
pub const DEFAULT_DMA_ADDR: u16 = 0x0080;

/// 默认配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "profile/config.toml";

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct MemoryConfig {
    /// 覆盖加载后的起始 PC
    pub start_pc: Option<u16>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct BdosConfig {
    pub enabled: bool,
    /// 宿主机文件所在目录，CP/M 文件名相对于此目录解析
    pub root_dir: PathBuf,
    pub dma_default: u16,
    /// .COM 程序可见的 TPA 顶部
    pub tpa_top: u16,
}

impl Default for BdosConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            root_dir: PathBuf::from("."),
            dma_default: DEFAULT_DMA_ADDR,
            tpa_top: 0xFE00,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct DiskConfig {
    /// 磁盘镜像，下标为驱动器号减一
    pub images: Vec<PathBuf>,
}

impl Default for DiskConfig {
    fn default() -> Self {
        Self {
            images: vec![PathBuf::from("b.img"), PathBuf::from("a.img")],
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct DebugConfig {
    pub event_list_size: usize,
    pub instruction_trace_size: usize,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            event_list_size: 32,
            instruction_trace_size: 16,
        }
    }
}

/// 主模拟器配置（来自 profile/config.toml）
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct EmuConfig {
    pub memory: MemoryConfig,
    pub bdos: BdosConfig,
    pub disk: DiskConfig,
    pub debug: DebugConfig,
}

impl EmuConfig {
    pub fn new(path: impl AsRef<Path>) -> anyhow::Result<EmuConfig> {
        let toml_str = std::fs::read_to_string(&path)
            .with_context(|| format!("无法读取主配置文件: {:?}", &path.as_ref().as_os_str()))?;
        let config: EmuConfig = toml::from_str(&toml_str)
            .with_context(|| format!("无法解析主配置文件: {:?}", &path.as_ref().as_os_str()))?;
        anyhow::Ok(config)
    }

    /// 显式给出的路径必须存在；未给出时尝试默认路径，不存在则使用内置默认值
    pub fn load(path: Option<&Path>) -> anyhow::Result<EmuConfig> {
        match path {
            Some(path) => Self::new(path),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_PATH);
                if default_path.exists() {
                    Self::new(default_path)
                } else {
                    tracing::debug!("未找到配置文件，使用默认配置");
                    anyhow::Ok(EmuConfig::default())
                }
            }
        }
    }
}
