use chrono::{DateTime, Utc};
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::AuthError;
use crate::models::Device;

/// 每个账户最多注册的设备数
pub const MAX_DEVICES: usize = 2;

const DEVICES_FILE: &str = "devices.json";
const DEVICE_ID_FILE: &str = "device_id";

/// Devices allowed to use the account, kept next to the task collection so
/// every device sees the same list.
#[derive(Debug, Clone)]
pub struct DeviceRegistry {
    path: PathBuf,
}

impl DeviceRegistry {
    /// Registry stored in `<dir>/devices.json`.
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(DEVICES_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A corrupt file counts as an empty registry; the next registration
    /// rewrites it.
    pub fn list(&self) -> Result<Vec<Device>, AuthError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)?;
        match serde_json::from_str(&content) {
            Ok(devices) => Ok(devices),
            Err(e) => {
                warn!(
                    "event=device_list module=auth status=corrupt path={} error={}",
                    self.path.display(),
                    e
                );
                Ok(Vec::new())
            }
        }
    }

    /// Register the current device, or refresh `last_seen` when it is
    /// already known. Returns the stored entry.
    pub fn register(
        &self,
        device_id: &str,
        user_agent: &str,
        now: DateTime<Utc>,
    ) -> Result<Device, AuthError> {
        let mut devices = self.list()?;

        if let Some(existing) = devices.iter_mut().find(|d| d.device_id == device_id) {
            existing.last_seen = now;
            let device = existing.clone();
            self.save(&devices)?;
            return Ok(device);
        }

        if devices.len() >= MAX_DEVICES {
            warn!(
                "event=device_register module=auth status=rejected registered={}",
                devices.len()
            );
            return Err(AuthError::DeviceLimitReached {
                limit: MAX_DEVICES,
                registered: devices,
            });
        }

        let device = Device {
            device_id: device_id.to_string(),
            user_agent: user_agent.to_string(),
            added_at: now,
            last_seen: now,
        };
        devices.push(device.clone());
        self.save(&devices)?;

        info!(
            "event=device_register module=auth status=ok device={} type={}",
            device.device_id,
            device.device_type()
        );
        Ok(device)
    }

    /// Remove another device. The device doing the removal cannot remove
    /// itself.
    pub fn remove(&self, device_id: &str, current_device_id: &str) -> Result<Device, AuthError> {
        if device_id == current_device_id {
            return Err(AuthError::CannotRemoveCurrentDevice);
        }

        let mut devices = self.list()?;
        let index = devices
            .iter()
            .position(|d| d.device_id == device_id)
            .ok_or_else(|| AuthError::UnknownDevice(device_id.to_string()))?;
        let removed = devices.remove(index);
        self.save(&devices)?;

        info!(
            "event=device_remove module=auth status=ok device={}",
            removed.device_id
        );
        Ok(removed)
    }

    fn save(&self, devices: &[Device]) -> Result<(), AuthError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(devices)?)?;
        Ok(())
    }
}

/// Read this machine's device id from `<data_dir>/device_id`, generating and
/// persisting a new UUID on first use.
pub fn load_or_create_device_id(data_dir: &Path) -> Result<String, AuthError> {
    let path = data_dir.join(DEVICE_ID_FILE);
    if path.exists() {
        let id = fs::read_to_string(&path)?.trim().to_string();
        if !id.is_empty() {
            return Ok(id);
        }
    }

    let id = uuid::Uuid::new_v4().to_string();
    fs::create_dir_all(data_dir)?;
    fs::write(&path, &id)?;
    Ok(id)
}

/// User agent string recorded for this device.
pub fn current_user_agent() -> String {
    format!(
        "{}/{} ({}; {})",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DeviceType;
    use tempfile::TempDir;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_third_device_is_rejected() {
        let dir = TempDir::new().unwrap();
        let registry = DeviceRegistry::new(dir.path());
        let now = at("2026-01-05T00:00:00Z");

        registry.register("laptop", "taskdue/0.1.0 (linux; x86_64)", now).unwrap();
        registry.register("phone", "Mozilla/5.0 (Android 14) Mobile", now).unwrap();

        match registry.register("tablet", "iPad", now) {
            Err(AuthError::DeviceLimitReached { limit, registered }) => {
                assert_eq!(limit, MAX_DEVICES);
                assert_eq!(registered.len(), 2);
            }
            other => panic!("expected limit error, got {:?}", other),
        }
        assert_eq!(registry.list().unwrap().len(), 2);
    }

    #[test]
    fn test_register_existing_device_updates_last_seen() {
        let dir = TempDir::new().unwrap();
        let registry = DeviceRegistry::new(dir.path());

        registry.register("laptop", "ua", at("2026-01-05T00:00:00Z")).unwrap();
        registry.register("phone", "ua", at("2026-01-05T00:00:00Z")).unwrap();
        let device = registry
            .register("laptop", "ua", at("2026-01-06T00:00:00Z"))
            .unwrap();

        assert_eq!(device.added_at, at("2026-01-05T00:00:00Z"));
        assert_eq!(device.last_seen, at("2026-01-06T00:00:00Z"));
        assert_eq!(registry.list().unwrap().len(), 2);
    }

    #[test]
    fn test_remove_rules() {
        let dir = TempDir::new().unwrap();
        let registry = DeviceRegistry::new(dir.path());
        let now = at("2026-01-05T00:00:00Z");
        registry.register("laptop", "ua", now).unwrap();
        registry.register("phone", "Android Mobile", now).unwrap();

        assert!(matches!(
            registry.remove("laptop", "laptop"),
            Err(AuthError::CannotRemoveCurrentDevice)
        ));
        assert!(matches!(
            registry.remove("ghost", "laptop"),
            Err(AuthError::UnknownDevice(_))
        ));

        let removed = registry.remove("phone", "laptop").unwrap();
        assert_eq!(removed.device_type(), DeviceType::Mobile);

        // 腾出名额后可以注册新设备
        registry.register("tablet", "iPad", now).unwrap();
        let ids: Vec<_> = registry
            .list()
            .unwrap()
            .into_iter()
            .map(|d| d.device_id)
            .collect();
        assert_eq!(ids, vec!["laptop", "tablet"]);
    }

    #[test]
    fn test_corrupt_registry_is_recovered() {
        let dir = TempDir::new().unwrap();
        let registry = DeviceRegistry::new(dir.path());
        fs::write(registry.path(), "{ not json").unwrap();

        assert!(registry.list().unwrap().is_empty());
        registry
            .register("laptop", "ua", at("2026-01-05T00:00:00Z"))
            .unwrap();
        assert_eq!(registry.list().unwrap().len(), 1);
    }

    #[test]
    fn test_device_id_is_stable() {
        let dir = TempDir::new().unwrap();
        let first = load_or_create_device_id(dir.path()).unwrap();
        let second = load_or_create_device_id(dir.path()).unwrap();
        assert_eq!(first, second);
        assert!(uuid::Uuid::parse_str(&first).is_ok());
    }

    #[test]
    fn test_current_user_agent_is_desktop() {
        let ua = current_user_agent();
        assert!(ua.starts_with("taskdue/"));
        assert_eq!(DeviceType::from_user_agent(&ua), DeviceType::Desktop);
    }
}
