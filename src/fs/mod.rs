pub mod cache;
pub mod remote;

use std::fs;
use std::path::PathBuf;

pub use cache::{CacheState, LocalCache};
pub use remote::{DirRemote, RemoteStore};

use crate::config::Config;
use crate::error::StoreError;
use crate::store::TaskStore;

/// 覆盖数据目录的环境变量（测试和多账户使用）
pub const HOME_ENV: &str = "TASKDUE_HOME";

/// Get the taskdue data directory
/// `$TASKDUE_HOME`, otherwise ~/.taskdue
pub fn get_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(HOME_ENV) {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }

    let home_dir = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home_dir).join(".taskdue")
}

pub fn get_cache_path() -> PathBuf {
    get_data_dir().join("cache.json")
}

pub fn get_log_dir() -> PathBuf {
    get_data_dir().join("logs")
}

/// Initialize the data directory structure
pub fn init_data_dir() -> std::io::Result<()> {
    let data_dir = get_data_dir();
    if !data_dir.exists() {
        fs::create_dir_all(&data_dir)?;
    }
    Ok(())
}

/// 按配置打开任务存储：先读本地缓存，远端可达时再同步
pub fn open_store(config: &Config) -> Result<TaskStore<DirRemote>, StoreError> {
    init_data_dir()?;
    let cache = LocalCache::new(get_cache_path());
    let remote = config.remote_dir.as_ref().map(|dir| DirRemote::new(dir.clone()));
    TaskStore::open(cache, remote, config.include_last_day)
}
