use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 已注册的设备
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub device_id: String,
    pub user_agent: String,
    pub added_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

impl Device {
    pub fn device_type(&self) -> DeviceType {
        DeviceType::from_user_agent(&self.user_agent)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceType {
    Mobile,
    Tablet,
    Desktop,
}

impl DeviceType {
    /// 按 user agent 关键字粗略分类
    pub fn from_user_agent(user_agent: &str) -> Self {
        let ua = user_agent.to_lowercase();
        if ua.contains("mobile") || ua.contains("android") {
            DeviceType::Mobile
        } else if ua.contains("tablet") || ua.contains("ipad") {
            DeviceType::Tablet
        } else {
            DeviceType::Desktop
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceType::Mobile => "mobile",
            DeviceType::Tablet => "tablet",
            DeviceType::Desktop => "desktop",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_type_from_user_agent() {
        assert_eq!(
            DeviceType::from_user_agent("Mozilla/5.0 (Linux; Android 14) Mobile"),
            DeviceType::Mobile
        );
        assert_eq!(
            DeviceType::from_user_agent("Mozilla/5.0 (iPad; CPU OS 17_0)"),
            DeviceType::Tablet
        );
        assert_eq!(DeviceType::from_user_agent(""), DeviceType::Desktop);
        assert_eq!(
            DeviceType::from_user_agent("taskdue/0.1.0 (linux; x86_64)"),
            DeviceType::Desktop
        );
    }
}
