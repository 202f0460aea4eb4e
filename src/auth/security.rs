use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::AuthError;

const SESSION_FILE: &str = "session.json";

/// 本机的解锁状态
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub verified_at: Option<DateTime<Utc>>,
}

/// Optional shared-secret gate in front of the task list.
///
/// With no key configured the gate is always open. Otherwise the device must
/// be unlocked once; the flag persists in `session.json` until `lock`.
#[derive(Debug, Clone)]
pub struct SecurityGate {
    key: Option<String>,
    session_path: PathBuf,
}

impl SecurityGate {
    pub fn new(key: Option<String>, data_dir: &Path) -> Self {
        Self {
            key: key.filter(|k| !k.trim().is_empty()),
            session_path: data_dir.join(SESSION_FILE),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.key.is_some()
    }

    pub fn is_verified(&self) -> bool {
        if !self.is_enabled() {
            return true;
        }
        self.load_session().map(|s| s.verified).unwrap_or(false)
    }

    /// Compare `input` against the configured key and persist the result.
    pub fn verify(&self, input: &str, now: DateTime<Utc>) -> Result<(), AuthError> {
        let Some(key) = &self.key else {
            return Ok(());
        };

        if input.trim() != key.trim() {
            warn!("event=unlock module=auth status=rejected");
            return Err(AuthError::InvalidSecurityKey);
        }

        self.save_session(&Session {
            verified: true,
            verified_at: Some(now),
        })?;
        info!("event=unlock module=auth status=ok");
        Ok(())
    }

    /// Forget the verification on this device.
    pub fn lock(&self) -> Result<(), AuthError> {
        match fs::remove_file(&self.session_path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        info!("event=lock module=auth status=ok");
        Ok(())
    }

    pub fn ensure_verified(&self) -> Result<(), AuthError> {
        if self.is_verified() {
            Ok(())
        } else {
            Err(AuthError::Locked)
        }
    }

    fn load_session(&self) -> Result<Session, AuthError> {
        if !self.session_path.exists() {
            return Ok(Session::default());
        }
        let content = fs::read_to_string(&self.session_path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn save_session(&self, session: &Session) -> Result<(), AuthError> {
        if let Some(parent) = self.session_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.session_path, serde_json::to_string_pretty(session)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-05T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_no_key_means_open() {
        let dir = TempDir::new().unwrap();
        let gate = SecurityGate::new(None, dir.path());
        assert!(!gate.is_enabled());
        assert!(gate.is_verified());
        assert!(gate.ensure_verified().is_ok());

        let blank = SecurityGate::new(Some("  ".to_string()), dir.path());
        assert!(!blank.is_enabled());
    }

    #[test]
    fn test_verify_and_lock() {
        let dir = TempDir::new().unwrap();
        let gate = SecurityGate::new(Some("open-sesame".to_string()), dir.path());
        assert!(!gate.is_verified());
        assert!(matches!(gate.ensure_verified(), Err(AuthError::Locked)));

        assert!(matches!(
            gate.verify("wrong", now()),
            Err(AuthError::InvalidSecurityKey)
        ));
        assert!(!gate.is_verified());

        gate.verify("  open-sesame \n", now()).unwrap();
        assert!(gate.is_verified());

        // 重新打开仍然保持解锁
        let reopened = SecurityGate::new(Some("open-sesame".to_string()), dir.path());
        assert!(reopened.is_verified());

        reopened.lock().unwrap();
        assert!(!gate.is_verified());
        // 重复上锁不报错
        reopened.lock().unwrap();
    }

    #[test]
    fn test_corrupt_session_counts_as_locked() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(SESSION_FILE), "{").unwrap();
        let gate = SecurityGate::new(Some("k".to_string()), dir.path());
        assert!(!gate.is_verified());
    }
}
