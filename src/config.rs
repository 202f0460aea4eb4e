/// 应用配置管理
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::fs::get_data_dir;

/// 界面主题。`System` 在启动时按终端背景解析为亮/暗
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

impl Theme {
    /// Toggle between light and dark, starting from what `System` resolves to.
    pub fn toggled(self) -> Self {
        match self.resolve() {
            Theme::Light => Theme::Dark,
            _ => Theme::Light,
        }
    }

    /// Resolve `System` to a concrete theme. Terminals that export
    /// `COLORFGBG` (e.g. "15;0") tell us their background; anything else is
    /// treated as dark.
    pub fn resolve(self) -> Self {
        match self {
            Theme::System => detect_terminal_theme(std::env::var("COLORFGBG").ok().as_deref()),
            other => other,
        }
    }
}

fn detect_terminal_theme(colorfgbg: Option<&str>) -> Theme {
    let background = colorfgbg
        .and_then(|value| value.rsplit(';').next())
        .and_then(|bg| bg.trim().parse::<u8>().ok());

    match background {
        // 7 (white) and 9..=15 (bright colours) are light backgrounds
        Some(7) | Some(9..=15) => Theme::Light,
        _ => Theme::Dark,
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
            Theme::System => "system",
        };
        f.write_str(name)
    }
}

impl FromStr for Theme {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            "system" => Ok(Theme::System),
            other => Err(anyhow::anyhow!(
                "Unknown theme: {} (expected light, dark or system)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub theme: Theme,
    /// 新任务默认是否启用 "Last Day" 提示
    #[serde(default = "default_true")]
    pub include_last_day: bool,
    /// 远端任务集合所在目录；未设置时为纯本地模式
    #[serde(default)]
    pub remote_dir: Option<PathBuf>,
    /// TUI 自动同步间隔（秒），0 表示关闭
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// 设置后 TUI 和修改类命令需要先 `tdue unlock`
    #[serde(default)]
    pub security_key: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_refresh_interval() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            theme: Theme::default(),
            include_last_day: true,
            remote_dir: None,
            refresh_interval_secs: default_refresh_interval(),
            log_level: default_log_level(),
            security_key: None,
        }
    }
}

/// 获取配置文件路径
/// `$TASKDUE_HOME/config.toml`, otherwise ~/.taskdue/config.toml
pub fn get_config_path() -> PathBuf {
    get_data_dir().join("config.toml")
}

/// 加载配置
pub fn load_config() -> Result<Config> {
    load_config_from(&get_config_path())
}

pub fn load_config_from(path: &Path) -> Result<Config> {
    if !path.exists() {
        // 配置文件不存在，返回默认配置
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    Ok(config)
}

/// 保存配置
pub fn save_config(config: &Config) -> Result<()> {
    save_config_to(config, &get_config_path())
}

pub fn save_config_to(config: &Config, path: &Path) -> Result<()> {
    // 确保目录存在
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;

    Ok(())
}

/// 首次运行检查
/// 返回 (config, is_first_run)
pub fn check_first_run() -> Result<(Config, bool)> {
    let config_path = get_config_path();

    if !config_path.exists() {
        // 首次运行，创建默认配置
        let config = Config::default();
        save_config(&config)?;

        Ok((config, true))
    } else {
        Ok((load_config()?, false))
    }
}

/// 打印欢迎信息
pub fn print_welcome_message(config: &Config) {
    println!("Welcome to taskdue!");
    println!();
    println!("Tasks are kept locally in {}", get_data_dir().display());
    match &config.remote_dir {
        Some(dir) => println!("and synced with {}", dir.display()),
        None => println!("(local-only mode: no remote collection configured)"),
    }
    println!();
    println!("Configuration file: {}", get_config_path().display());
    println!();
    println!("Useful commands:");
    println!("  tdue config remote <dir>          # sync with a shared folder");
    println!("  tdue config theme <light|dark>    # pick a theme");
    println!("  tdue config show                  # show current settings");
    println!();
}

/// 显示当前配置
pub fn show_config() -> Result<()> {
    let config = load_config()?;
    println!("Current configuration:");
    println!("  theme:             {}", config.theme);
    println!("  include last day:  {}", on_off(config.include_last_day));
    println!(
        "  remote dir:        {}",
        config
            .remote_dir
            .as_ref()
            .map(|d| d.display().to_string())
            .unwrap_or_else(|| "(none, local only)".to_string())
    );
    println!("  refresh interval:  {}s", config.refresh_interval_secs);
    println!("  log level:         {}", config.log_level);
    println!(
        "  security key:      {}",
        if config.security_key.is_some() { "set" } else { "not set" }
    );
    println!();
    println!("Config file: {}", get_config_path().display());
    Ok(())
}

pub fn set_theme(theme: Theme) -> Result<()> {
    let mut config = load_config()?;
    config.theme = theme;
    save_config(&config)?;
    println!("✓ Theme set to: {}", config.theme);
    Ok(())
}

/// `None` switches to local-only mode.
pub fn set_remote_dir(dir: Option<PathBuf>) -> Result<()> {
    let mut config = load_config()?;
    config.remote_dir = dir;
    save_config(&config)?;
    match &config.remote_dir {
        Some(dir) => println!("✓ Remote collection set to: {}", dir.display()),
        None => println!("✓ Remote collection cleared (local-only mode)"),
    }
    Ok(())
}

pub fn set_include_last_day(enabled: bool) -> Result<()> {
    let mut config = load_config()?;
    config.include_last_day = enabled;
    save_config(&config)?;
    println!("✓ Last-day hint for new tasks: {}", on_off(enabled));
    Ok(())
}

pub fn set_security_key(key: Option<String>) -> Result<()> {
    let mut config = load_config()?;
    config.security_key = key
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty());
    save_config(&config)?;
    if config.security_key.is_some() {
        println!("✓ Security key set. Run `tdue unlock <key>` on each device.");
    } else {
        println!("✓ Security key removed");
    }
    Ok(())
}

pub fn on_off(value: bool) -> &'static str {
    if value { "on" } else { "off" }
}
