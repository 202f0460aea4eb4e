pub mod devices;
pub mod security;

pub use devices::{current_user_agent, load_or_create_device_id, DeviceRegistry, MAX_DEVICES};
pub use security::SecurityGate;

use chrono::{DateTime, Utc};
use std::path::Path;

use crate::config::Config;
use crate::error::AuthError;
use crate::models::Device;

/// 设备列表跟随远端目录；远端未配置或不可达时退回本地数据目录
pub fn registry_for(config: &Config, data_dir: &Path) -> DeviceRegistry {
    match &config.remote_dir {
        Some(dir) if dir.is_dir() => DeviceRegistry::new(dir),
        _ => DeviceRegistry::new(data_dir),
    }
}

pub fn gate_for(config: &Config, data_dir: &Path) -> SecurityGate {
    SecurityGate::new(config.security_key.clone(), data_dir)
}

/// Checks run before the task list is shown or changed: the security gate
/// must be open, then this device must fit in the registry.
pub fn ensure_access(
    config: &Config,
    data_dir: &Path,
    now: DateTime<Utc>,
) -> Result<Device, AuthError> {
    gate_for(config, data_dir).ensure_verified()?;

    let device_id = load_or_create_device_id(data_dir)?;
    registry_for(config, data_dir).register(&device_id, &current_user_agent(), now)
}
