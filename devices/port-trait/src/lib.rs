//! 8080 端口 I/O 设备 trait 定义

use thiserror::Error;

/// 设备错误类型
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("设备访问错误: {0}")]
    Access(String),
    #[error("设备不支持的操作: {0}")]
    Unsupported(String),
    #[error("设备内部错误: {0}")]
    Internal(String),
}

/// 端口设备 trait
/// 所有挂在 IN/OUT 指令上的设备都必须实现此 trait
pub trait PortDevice: Send {
    /// 从端口读取一个字节
    ///
    /// # 参数
    /// - port: IN 指令给出的端口号
    fn read(&mut self, port: u8) -> Result<u8, DeviceError>;

    /// 向端口写入一个字节
    ///
    /// # 参数
    /// - port: OUT 指令给出的端口号
    /// - value: 累加器 A 的值
    fn write(&mut self, port: u8, value: u8) -> Result<(), DeviceError>;

    /// 设备占用的端口号列表
    fn ports(&self) -> &[u8];

    /// 获取设备名称（用于调试）
    fn name(&self) -> &str {
        "unknown"
    }
}
