//! 设备注册表
//!
//! 启动时加载一次，运行期只读。按设备标识 O(1) 查找解码参数与输出命名；
//! 未注册的设备由调用方直接过滤（不是错误）。

use domain::DeviceEntry;
use homepoll_config::read_json_file;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::info;

/// 注册表加载错误（启动期致命）。
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("duplicate device identity: {0}")]
    DuplicateIdentity(String),
    #[error("duplicate output name: {0}")]
    DuplicateOutputName(String),
    #[error("device {0} declares no sensors")]
    NoSensors(String),
    #[error("device {0} has a sensor with empty {1}")]
    EmptyField(String, &'static str),
    #[error("config error: {0}")]
    Config(String),
}

/// 注册表文件格式：`{ "devices": [DeviceEntry, ...] }`。
#[derive(Debug, Deserialize)]
struct RegistryFile {
    devices: Vec<DeviceEntry>,
}

/// 设备注册表。
#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    entries: HashMap<String, DeviceEntry>,
}

impl DeviceRegistry {
    /// 从设备列表构建，校验标识与输出名的唯一性。
    pub fn from_entries(entries: Vec<DeviceEntry>) -> Result<Self, RegistryError> {
        let mut map = HashMap::with_capacity(entries.len());
        let mut output_names = HashSet::new();
        for entry in entries {
            if entry.sensors.is_empty() {
                return Err(RegistryError::NoSensors(entry.identity));
            }
            for sensor in &entry.sensors {
                if sensor.raw_field.is_empty() {
                    return Err(RegistryError::EmptyField(entry.identity.clone(), "raw_field"));
                }
                if sensor.output_name.is_empty() {
                    return Err(RegistryError::EmptyField(
                        entry.identity.clone(),
                        "output_name",
                    ));
                }
                if !output_names.insert(sensor.output_name.clone()) {
                    return Err(RegistryError::DuplicateOutputName(
                        sensor.output_name.clone(),
                    ));
                }
            }
            if map.contains_key(&entry.identity) {
                return Err(RegistryError::DuplicateIdentity(entry.identity));
            }
            map.insert(entry.identity.clone(), entry);
        }
        Ok(Self { entries: map })
    }

    /// 解析 JSON 文本。
    pub fn from_json_str(content: &str) -> Result<Self, RegistryError> {
        let file: RegistryFile =
            serde_json::from_str(content).map_err(|err| RegistryError::Config(err.to_string()))?;
        Self::from_entries(file.devices)
    }

    /// 从配置文件加载。
    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let file: RegistryFile =
            read_json_file(path).map_err(|err| RegistryError::Config(err.to_string()))?;
        let registry = Self::from_entries(file.devices)?;
        info!(
            target: "homepoll.registry",
            path = %path.display(),
            devices = registry.len(),
            "device_registry_loaded"
        );
        Ok(registry)
    }

    pub fn lookup(&self, identity: &str) -> Option<&DeviceEntry> {
        self.entries.get(identity)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn identities(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}
