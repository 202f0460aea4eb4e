//! File logging for the TUI and the CLI.
//!
//! Logs go to rolling files under `<data_dir>/logs`, never to the terminal:
//! the TUI owns stdout. Initialisation happens at most once per process and
//! never panics; when it fails the app keeps running without logs.

use anyhow::{anyhow, Result};
use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming, WriteMode};
use log::{error, info};
use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};

const LOG_FILE_BASENAME: &str = "taskdue";
const MAX_LOG_FILE_SIZE_BYTES: u64 = 5 * 1024 * 1024;
const MAX_LOG_FILES: usize = 3;
const MAX_PANIC_PAYLOAD_CHARS: usize = 160;

static LOGGING_STATE: OnceCell<LoggingState> = OnceCell::new();
static PANIC_HOOK_INSTALLED: OnceCell<()> = OnceCell::new();

struct LoggingState {
    level: &'static str,
    log_dir: PathBuf,
    _logger: LoggerHandle,
}

/// Start file logging. Calling again with the same directory is a no-op; a
/// different directory is rejected.
pub fn init_logging(level: &str, log_dir: &Path) -> Result<()> {
    let level = normalize_level(level)?;

    if let Some(state) = LOGGING_STATE.get() {
        if state.log_dir == log_dir {
            if state.level != level {
                info!(
                    "event=logging_reinit module=logging status=ignored active_level={} requested_level={}",
                    state.level, level
                );
            }
            return Ok(());
        }
        return Err(anyhow!(
            "logging already initialized at {}; refusing to switch to {}",
            state.log_dir.display(),
            log_dir.display()
        ));
    }

    LOGGING_STATE.get_or_try_init(|| -> Result<LoggingState> {
        std::fs::create_dir_all(log_dir)?;

        let logger = Logger::try_with_str(level)?
            .log_to_file(
                FileSpec::default()
                    .directory(log_dir)
                    .basename(LOG_FILE_BASENAME),
            )
            .rotate(
                Criterion::Size(MAX_LOG_FILE_SIZE_BYTES),
                Naming::Numbers,
                Cleanup::KeepLogFiles(MAX_LOG_FILES),
            )
            .write_mode(WriteMode::BufferAndFlush)
            .append()
            .format_for_files(flexi_logger::detailed_format)
            .start()?;

        install_panic_hook_once();

        info!(
            "event=app_start module=logging status=ok platform={} version={} level={}",
            std::env::consts::OS,
            env!("CARGO_PKG_VERSION"),
            level
        );

        Ok(LoggingState {
            level,
            log_dir: log_dir.to_path_buf(),
            _logger: logger,
        })
    })?;

    Ok(())
}

fn normalize_level(level: &str) -> Result<&'static str> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok("trace"),
        "debug" => Ok("debug"),
        "info" => Ok("info"),
        "warn" | "warning" => Ok("warn"),
        "error" => Ok("error"),
        "off" => Ok("off"),
        other => Err(anyhow!(
            "unsupported log level {:?}; expected trace|debug|info|warn|error|off",
            other
        )),
    }
}

fn install_panic_hook_once() {
    if PANIC_HOOK_INSTALLED.get().is_some() {
        return;
    }

    let previous_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let location = panic_info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_else(|| "unknown".to_string());
        let payload = panic_payload_summary(panic_info);
        error!(
            "event=panic_captured module=logging status=error location={} payload={}",
            location, payload
        );
        previous_hook(panic_info);
    }));

    let _ = PANIC_HOOK_INSTALLED.set(());
}

fn panic_payload_summary(info: &std::panic::PanicHookInfo<'_>) -> String {
    let payload = if let Some(message) = info.payload().downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = info.payload().downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    };

    single_line(&payload, MAX_PANIC_PAYLOAD_CHARS)
}

/// 去掉换行并截断，避免任务标题等文本撑坏日志行
pub fn single_line(value: &str, max_chars: usize) -> String {
    let normalized = value.replace(['\n', '\r'], " ");
    let mut truncated = normalized.chars().take(max_chars).collect::<String>();
    if normalized.chars().count() > max_chars {
        truncated.push_str("...");
    }
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn logging_status() -> Option<(&'static str, PathBuf)> {
        LOGGING_STATE
            .get()
            .map(|state| (state.level, state.log_dir.clone()))
    }

    #[test]
    fn test_normalize_level() {
        assert_eq!(normalize_level("INFO").unwrap(), "info");
        assert_eq!(normalize_level(" warning ").unwrap(), "warn");
        assert!(normalize_level("loud").is_err());
    }

    #[test]
    fn test_single_line() {
        let line = single_line("line1\nline2\rline3", 8);
        assert!(!line.contains('\n'));
        assert!(!line.contains('\r'));
        assert!(line.ends_with("..."));
        assert_eq!(single_line("short", 10), "short");
    }

    #[test]
    fn test_init_is_idempotent_and_rejects_other_dirs() {
        let dir = TempDir::new().unwrap();
        let other = TempDir::new().unwrap();

        init_logging("info", dir.path()).unwrap();
        init_logging("info", dir.path()).unwrap();
        assert!(init_logging("info", other.path()).is_err());

        let (level, log_dir) = logging_status().unwrap();
        assert_eq!(level, "info");
        assert_eq!(log_dir, dir.path());
    }
}
