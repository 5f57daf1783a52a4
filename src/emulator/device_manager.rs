//! 设备管理模块
//! 负责把端口设备挂到 IN/OUT 指令的端口空间上

use std::sync::{Arc, Mutex};

use nohash_hasher::IntMap;
use port_trait::{DeviceError, PortDevice};
use tracing::{info, trace};

/// 未挂设备的端口读回的值 (总线悬空)
pub const OPEN_BUS: u8 = 0xFF;

#[derive(Debug, thiserror::Error)]
pub enum PortBusError {
    #[error("端口 {port:#04x} 已被设备 {owner} 占用")]
    Conflict { port: u8, owner: String },
    #[error("设备 {0} 的锁已被破坏")]
    Poisoned(String),
    #[error("端口 {port:#04x} 访问失败: {source}")]
    Device {
        port: u8,
        #[source]
        source: DeviceError,
    },
}

type SharedDevice = Arc<Mutex<dyn PortDevice>>;

/// 端口总线
#[derive(Default)]
pub struct PortBus {
    devices: Vec<(String, SharedDevice)>,
    /// 端口号到设备下标
    map: IntMap<u8, usize>,
}

impl PortBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// 挂载设备，端口与已有设备冲突时失败且不做任何修改
    pub fn attach(&mut self, device: SharedDevice) -> Result<(), PortBusError> {
        let (name, ports) = {
            let guard = device
                .lock()
                .map_err(|_| PortBusError::Poisoned("<attach>".into()))?;
            (guard.name().to_string(), guard.ports().to_vec())
        };
        if let Some(&port) = ports.iter().find(|port| self.map.contains_key(port)) {
            let owner = self.map[&port];
            return Err(PortBusError::Conflict {
                port,
                owner: self.devices[owner].0.clone(),
            });
        }

        info!("挂载端口设备: {} (端口 {:02x?})", name, ports);
        let index = self.devices.len();
        for port in ports {
            self.map.insert(port, index);
        }
        self.devices.push((name, device));
        Ok(())
    }

    fn device(&self, port: u8) -> Option<&(String, SharedDevice)> {
        self.map.get(&port).map(|&index| &self.devices[index])
    }

    pub fn read(&self, port: u8) -> Result<u8, PortBusError> {
        let Some((name, device)) = self.device(port) else {
            trace!("读取未挂载的端口 {port:#04x}");
            return Ok(OPEN_BUS);
        };
        device
            .lock()
            .map_err(|_| PortBusError::Poisoned(name.clone()))?
            .read(port)
            .map_err(|source| PortBusError::Device { port, source })
    }

    pub fn write(&self, port: u8, value: u8) -> Result<(), PortBusError> {
        let Some((name, device)) = self.device(port) else {
            trace!("写入未挂载的端口 {port:#04x}: {value:#04x}");
            return Ok(());
        };
        device
            .lock()
            .map_err(|_| PortBusError::Poisoned(name.clone()))?
            .write(port, value)
            .map_err(|source| PortBusError::Device { port, source })
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }
}
