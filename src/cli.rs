use anyhow::Result;
use chrono::{Local, Utc};
use std::env;
use std::path::PathBuf;

use crate::auth;
use crate::config::{self, Config, Theme};
use crate::deadline::{detailed_time_left, format_deadline_display, format_deadline_input, parse_deadline};
use crate::fs::{self, DirRemote};
use crate::models::{DeviceType, Task, TaskDraft, TaskId, TaskPatch};
use crate::store::{MutationOutcome, TaskStore};

/// 处理 CLI 命令
/// 返回 true 表示应该继续进入 TUI，false 表示已处理完毕应该退出
pub fn handle_cli() -> Result<bool> {
    let args: Vec<String> = env::args().collect();

    // 如果没有参数，进入 TUI 模式
    if args.len() < 2 {
        return Ok(true);
    }

    let result = match args[1].as_str() {
        "task" => handle_task_command(&args[1..]),
        "sync" => sync(),
        "device" => handle_device_command(&args[1..]),
        "unlock" => {
            if args.len() < 3 {
                Err("Missing key\nUsage: tdue unlock <key>".to_string())
            } else {
                unlock(&args[2..].join(" "))
            }
        }
        "lock" => lock(),
        "config" => {
            handle_config_command(&args[1..])?;
            Ok(())
        }
        "--help" | "-h" | "help" => {
            print_help();
            Ok(())
        }
        "--version" | "-V" | "-v" => {
            print_version();
            Ok(())
        }
        cmd => Err(format!("Unknown command: {}\nRun 'tdue --help' for usage", cmd)),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    Ok(false)
}

// ============================================================================
// Shared helpers
// ============================================================================

/// 首次运行时写入默认配置并打印欢迎信息
fn load_config() -> Result<Config, String> {
    let (config, is_first_run) = config::check_first_run().map_err(|e| e.to_string())?;
    if is_first_run {
        config::print_welcome_message(&config);
    }
    Ok(config)
}

/// 初始化日志并打开任务存储。`mutating` 为 true 时需要通过安全校验并登记设备
fn open_store(config: &Config, mutating: bool) -> Result<TaskStore<DirRemote>, String> {
    fs::init_data_dir().map_err(|e| e.to_string())?;
    if let Err(e) = crate::logging::init_logging(&config.log_level, &fs::get_log_dir()) {
        eprintln!("Warning: logging disabled: {}", e);
    }

    let data_dir = fs::get_data_dir();
    if mutating {
        auth::ensure_access(config, &data_dir, Utc::now()).map_err(|e| e.to_string())?;
    } else {
        auth::gate_for(config, &data_dir)
            .ensure_verified()
            .map_err(|e| e.to_string())?;
    }

    fs::open_store(config).map_err(|e| e.to_string())
}

fn resolve_id(store: &TaskStore<DirRemote>, input: &str) -> Result<TaskId, String> {
    store
        .resolve(input)
        .ok_or_else(|| format!("No task matches '{}' (use a longer id prefix)", input))
}

fn parse_flag(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|s| s == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|s| s == flag)
}

fn parse_on_off(value: &str) -> Result<bool, String> {
    match value.trim().to_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Ok(true),
        "off" | "false" | "no" | "0" => Ok(false),
        other => Err(format!("Expected on or off, got '{}'", other)),
    }
}

fn parse_deadline_arg(value: &str) -> Result<chrono::DateTime<Utc>, String> {
    parse_deadline(value, &Local).ok_or_else(|| {
        format!(
            "Invalid deadline '{}' (use YYYY-MM-DD, 'YYYY-MM-DD HH:MM' or RFC 3339)",
            value
        )
    })
}

/// 打印变更结果；远端拒绝时返回错误（本地已回滚）
fn report_outcome(action: &str, outcome: MutationOutcome) -> Result<(), String> {
    match outcome {
        MutationOutcome::Confirmed => {
            println!("{}", action);
            Ok(())
        }
        MutationOutcome::Local => {
            println!("{} (saved locally, will sync when the remote is reachable)", action);
            Ok(())
        }
        MutationOutcome::Failed { error, .. } => {
            Err(format!("{} failed and was rolled back: {}", action, error))
        }
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

fn short_id(id: &TaskId) -> String {
    if id.is_provisional() {
        id.to_string()
    } else {
        id.as_str().chars().take(8).collect()
    }
}

// ============================================================================
// Task Commands
// ============================================================================

fn handle_task_command(args: &[String]) -> Result<(), String> {
    if args.len() < 2 {
        print_task_usage();
        return Ok(());
    }

    match args[1].as_str() {
        "list" => {
            let filter = if has_flag(&args[2..], "--all") {
                ListFilter::All
            } else if has_flag(&args[2..], "--completed") {
                ListFilter::Completed
            } else {
                ListFilter::Active
            };
            task_list(filter)
        }
        "show" => {
            if args.len() < 3 {
                return Err("Missing task id\nUsage: tdue task show <id>".to_string());
            }
            task_show(&args[2])
        }
        "add" => {
            let title = parse_flag(&args[2..], "--title")
                .ok_or("Missing --title flag\nUsage: tdue task add --title <title> [--description <text>] [--deadline <when>] [--no-last-day]".to_string())?;
            let description = parse_flag(&args[2..], "--description").unwrap_or_default();
            let deadline = parse_flag(&args[2..], "--deadline")
                .map(|d| parse_deadline_arg(&d))
                .transpose()?;
            let include_last_day = if has_flag(&args[2..], "--no-last-day") {
                Some(false)
            } else {
                None
            };
            task_add(TaskDraft {
                title,
                description,
                deadline,
                include_last_day,
            })
        }
        "update" => {
            if args.len() < 3 {
                return Err("Missing task id\nUsage: tdue task update <id> [--title <title>] [--description <text>] [--deadline <when>|none] [--last-day on|off]".to_string());
            }
            let rest = &args[3..];
            let deadline = match parse_flag(rest, "--deadline") {
                None => None,
                Some(d) if d.eq_ignore_ascii_case("none") => Some(None),
                Some(d) => Some(Some(parse_deadline_arg(&d)?)),
            };
            let include_last_day = parse_flag(rest, "--last-day")
                .map(|v| parse_on_off(&v))
                .transpose()?;
            let patch = TaskPatch {
                title: parse_flag(rest, "--title"),
                description: parse_flag(rest, "--description"),
                deadline,
                include_last_day,
                completed: None,
            };
            task_update(&args[2], patch)
        }
        "toggle" | "done" => {
            if args.len() < 3 {
                return Err("Missing task id\nUsage: tdue task toggle <id>".to_string());
            }
            task_toggle(&args[2])
        }
        "delete" => {
            if args.len() < 3 {
                return Err("Missing task id\nUsage: tdue task delete <id>".to_string());
            }
            task_delete(&args[2])
        }
        "help" | "--help" | "-h" => {
            print_task_usage();
            Ok(())
        }
        cmd => Err(format!("Unknown task command: {}\nRun 'tdue task help' for usage", cmd)),
    }
}

fn print_task_usage() {
    println!("taskdue Task Commands

USAGE:
    tdue task <SUBCOMMAND>

SUBCOMMANDS:
    list [--completed|--all]
        List active tasks (or completed / all)

    show <id>
        Show task details and the full time left

    add --title <title> [--description <text>] [--deadline <when>] [--no-last-day]
        Create a new task

    update <id> [--title <title>] [--description <text>] [--deadline <when>|none] [--last-day on|off]
        Update task fields

    toggle <id>
        Mark a task completed / not completed

    delete <id>
        Delete a task

Ids can be shortened to any unique prefix. Deadlines accept
YYYY-MM-DD (end of that day), 'YYYY-MM-DD HH:MM' or RFC 3339.

EXAMPLES:
    tdue task list
    tdue task add --title \"Write report\" --deadline 2026-01-08
    tdue task update 4f1c --deadline \"2026-01-09 17:00\"
    tdue task toggle 4f1c
    tdue task delete 4f1c");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListFilter {
    Active,
    Completed,
    All,
}

fn task_list(filter: ListFilter) -> Result<(), String> {
    let config = load_config()?;
    let store = open_store(&config, false)?;
    let now = Utc::now();

    let tasks: Vec<&Task> = match filter {
        ListFilter::Active => store.active().collect(),
        ListFilter::Completed => store.completed().collect(),
        ListFilter::All => store.list().iter().collect(),
    };

    if tasks.is_empty() {
        println!("No tasks found.");
        return Ok(());
    }

    println!("ID        DONE  TITLE                                DEADLINE      TIME LEFT");
    println!("--------  ----  -----------------------------------  ------------  ------------------------");

    for task in tasks {
        let deadline = task
            .deadline
            .map(|d| format_deadline_display(d, &Local))
            .unwrap_or_else(|| "-".to_string());
        let label = task.remaining(now).list_label();
        let time_left = if task.completed || label.is_empty() {
            "-".to_string()
        } else {
            label
        };

        println!(
            "{:<8}  {:<4}  {:<35}  {:<12}  {}",
            short_id(&task.id),
            if task.completed { "[x]" } else { "[ ]" },
            truncate(&task.title, 35),
            deadline,
            time_left
        );
    }

    if store.pending_count() > 0 {
        println!("\n{} change(s) waiting to sync", store.pending_count());
    }

    Ok(())
}

fn task_show(input: &str) -> Result<(), String> {
    let config = load_config()?;
    let store = open_store(&config, false)?;
    let id = resolve_id(&store, input)?;
    let task = store
        .get(&id)
        .ok_or_else(|| format!("Task {} not found", id))?;
    let now = Utc::now();

    println!("Task {}", task.id);
    println!("Title: {}", task.title);
    println!("Status: {}", if task.completed { "completed" } else { "active" });
    println!(
        "Created: {}",
        task.created_at.with_timezone(&Local).format("%Y-%m-%d %H:%M")
    );
    match task.deadline {
        Some(deadline) => {
            println!("Deadline: {}", format_deadline_input(deadline, &Local));
            let detail = detailed_time_left(now, task.deadline, &Local);
            match detail.headline() {
                Some(headline) => println!("Time left: {} ({})", headline, task.remaining(now)),
                None if detail.is_overdue() => println!("Time left: Overdue"),
                None => {}
            }
        }
        None => println!("Deadline: -"),
    }
    println!("Last-day hint: {}", config::on_off(task.include_last_day));
    if !task.description.is_empty() {
        println!("\nDescription:");
        println!("{}", task.description);
    }

    Ok(())
}

fn task_add(draft: TaskDraft) -> Result<(), String> {
    let config = load_config()?;
    let mut store = open_store(&config, true)?;

    let (task, outcome) = store.add(draft, Utc::now()).map_err(|e| e.to_string())?;
    report_outcome(&format!("Created task {}", task.id), outcome)
}

fn task_update(input: &str, patch: TaskPatch) -> Result<(), String> {
    if patch.is_empty() {
        return Err("Nothing to update (pass at least one flag)".to_string());
    }

    let config = load_config()?;
    let mut store = open_store(&config, true)?;
    let id = resolve_id(&store, input)?;

    let outcome = store.update(&id, patch).map_err(|e| e.to_string())?;
    report_outcome(&format!("Updated task {}", id), outcome)
}

fn task_toggle(input: &str) -> Result<(), String> {
    let config = load_config()?;
    let mut store = open_store(&config, true)?;
    let id = resolve_id(&store, input)?;

    let outcome = store.toggle_completion(&id).map_err(|e| e.to_string())?;
    let state = match store.get(&id) {
        Some(task) if task.completed => "completed",
        _ => "active",
    };
    report_outcome(&format!("Task {} marked {}", id, state), outcome)
}

fn task_delete(input: &str) -> Result<(), String> {
    let config = load_config()?;
    let mut store = open_store(&config, true)?;
    let id = resolve_id(&store, input)?;

    let outcome = store.remove(&id).map_err(|e| e.to_string())?;
    report_outcome(&format!("Deleted task {}", id), outcome)
}

fn sync() -> Result<(), String> {
    let config = load_config()?;
    let mut store = open_store(&config, true)?;

    if !store.has_remote() {
        println!("No remote collection configured (tdue config remote <dir>).");
        return Ok(());
    }
    if !store.is_online() {
        return Err(format!(
            "Remote collection is not reachable; {} change(s) still queued",
            store.pending_count()
        ));
    }

    let report = store.sync().map_err(|e| e.to_string())?;
    println!(
        "Synced: {} replayed, {} failed, {} dropped. {} task(s), {} still queued.",
        report.replayed,
        report.failed,
        report.dropped,
        store.list().len(),
        store.pending_count()
    );
    Ok(())
}

// ============================================================================
// Device Commands
// ============================================================================

fn handle_device_command(args: &[String]) -> Result<(), String> {
    if args.len() < 2 {
        print_device_usage();
        return Ok(());
    }

    let config = load_config()?;
    let data_dir = fs::get_data_dir();
    let registry = auth::registry_for(&config, &data_dir);
    let current = auth::load_or_create_device_id(&data_dir).map_err(|e| e.to_string())?;

    match args[1].as_str() {
        "list" => {
            let devices = registry.list().map_err(|e| e.to_string())?;
            if devices.is_empty() {
                println!("No devices registered.");
                return Ok(());
            }

            println!("{}/{} devices registered ({})", devices.len(), auth::MAX_DEVICES, registry.path().display());
            println!();
            println!("DEVICE ID                             TYPE     LAST SEEN         ");
            println!("------------------------------------  -------  ------------------");
            for device in devices {
                let marker = if device.device_id == current { " (this device)" } else { "" };
                println!(
                    "{:<36}  {:<7}  {}{}",
                    device.device_id,
                    device.device_type(),
                    device.last_seen.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
                    marker
                );
            }
            Ok(())
        }
        "register" => {
            auth::gate_for(&config, &data_dir)
                .ensure_verified()
                .map_err(|e| e.to_string())?;
            let user_agent = auth::current_user_agent();
            let device = registry
                .register(&current, &user_agent, Utc::now())
                .map_err(|e| e.to_string())?;
            println!(
                "Registered this device: {} ({})",
                device.device_id,
                DeviceType::from_user_agent(&user_agent)
            );
            Ok(())
        }
        "remove" => {
            if args.len() < 3 {
                return Err("Missing device id\nUsage: tdue device remove <id>".to_string());
            }
            auth::gate_for(&config, &data_dir)
                .ensure_verified()
                .map_err(|e| e.to_string())?;
            let removed = registry.remove(&args[2], &current).map_err(|e| e.to_string())?;
            println!("Removed device {}", removed.device_id);
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_device_usage();
            Ok(())
        }
        cmd => Err(format!("Unknown device command: {}\nRun 'tdue device help' for usage", cmd)),
    }
}

fn print_device_usage() {
    println!("taskdue Device Commands

USAGE:
    tdue device <SUBCOMMAND>

SUBCOMMANDS:
    list            List registered devices
    register        Register this device
    remove <id>     Remove another device

At most {} devices can be registered. The current device cannot remove itself.", auth::MAX_DEVICES);
}

// ============================================================================
// Security Commands
// ============================================================================

fn unlock(key: &str) -> Result<(), String> {
    let config = load_config()?;
    let gate = auth::gate_for(&config, &fs::get_data_dir());
    if !gate.is_enabled() {
        println!("No security key configured; nothing to unlock.");
        return Ok(());
    }

    gate.verify(key, Utc::now()).map_err(|e| e.to_string())?;
    println!("✓ Unlocked");
    Ok(())
}

fn lock() -> Result<(), String> {
    let config = load_config()?;
    auth::gate_for(&config, &fs::get_data_dir())
        .lock()
        .map_err(|e| e.to_string())?;
    println!("✓ Locked");
    Ok(())
}

// ============================================================================
// Config Commands
// ============================================================================

fn handle_config_command(args: &[String]) -> Result<()> {
    if args.len() < 2 {
        return config::show_config();
    }

    let value = args.get(2).map(|s| s.as_str());
    match (args[1].as_str(), value) {
        ("show", _) => config::show_config(),
        ("theme", Some(theme)) => config::set_theme(theme.parse::<Theme>()?),
        ("remote", Some(dir)) if dir.eq_ignore_ascii_case("none") => config::set_remote_dir(None),
        ("remote", Some(dir)) => config::set_remote_dir(Some(PathBuf::from(dir))),
        ("last-day", Some(v)) => config::set_include_last_day(parse_on_off(v).map_err(anyhow::Error::msg)?),
        ("security-key", Some(key)) if key.eq_ignore_ascii_case("none") => config::set_security_key(None),
        ("security-key", Some(_)) => config::set_security_key(Some(args[2..].join(" "))),
        ("theme" | "remote" | "last-day" | "security-key", None) => {
            Err(anyhow::anyhow!("Missing value\nUsage: tdue config {} <value>", args[1]))
        }
        (option, _) => Err(anyhow::anyhow!(
            "Unknown config option: {}\nAvailable options: show, theme, remote, last-day, security-key",
            option
        )),
    }
}

/// 打印帮助信息
fn print_help() {
    println!("taskdue (tdue) - deadline-aware task list for the terminal\n");
    println!("USAGE:");
    println!("  tdue                    Launch the TUI");
    println!("  tdue <command> [args]   Run a CLI command");
    println!("  tdue --help             Show this help");
    println!("  tdue --version          Show version\n");

    println!("COMMANDS:");
    println!("  task                    Manage tasks (list, show, add, update, toggle, delete)");
    println!("  sync                    Replay queued changes and pull the remote collection");
    println!("  device                  Manage registered devices (list, register, remove)");
    println!("  unlock <key>            Unlock this device with the security key");
    println!("  lock                    Lock this device again");
    println!("  config [option]         Show or change settings\n");

    println!("CONFIG OPTIONS:");
    println!("  config show                         Show current settings");
    println!("  config theme <light|dark|system>    Color theme");
    println!("  config remote <dir|none>            Shared folder holding the task collection");
    println!("  config last-day <on|off>            Default last-day hint for new tasks");
    println!("  config security-key <key|none>      Require `tdue unlock` before use\n");

    println!("EXAMPLES:");
    println!("  tdue task add --title \"Write report\" --deadline 2026-01-08");
    println!("  tdue task list --all");
    println!("  tdue config remote ~/Dropbox/taskdue\n");

    println!("Data directory: {} (override with ${})", fs::get_data_dir().display(), fs::HOME_ENV);
}

/// 打印版本信息
fn print_version() {
    const VERSION: &str = env!("CARGO_PKG_VERSION");
    const NAME: &str = env!("CARGO_PKG_NAME");
    println!("{} {}", NAME, VERSION);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_flag() {
        let a = args(&["--title", "Write report", "--no-last-day"]);
        assert_eq!(parse_flag(&a, "--title"), Some("Write report".to_string()));
        assert_eq!(parse_flag(&a, "--deadline"), None);
        assert_eq!(parse_flag(&a, "--no-last-day"), None);
        assert!(has_flag(&a, "--no-last-day"));
    }

    #[test]
    fn test_parse_on_off() {
        assert_eq!(parse_on_off("ON"), Ok(true));
        assert_eq!(parse_on_off("off"), Ok(false));
        assert!(parse_on_off("maybe").is_err());
    }

    #[test]
    fn test_truncate_and_short_id() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a very long title", 8), "a ver...");
        assert_eq!(short_id(&TaskId::new("4f1c2d3e-aaaa-bbbb")), "4f1c2d3e");
        assert_eq!(short_id(&TaskId::new("temp-1767571200000")), "temp-1767571200000");
    }

    #[test]
    fn test_report_outcome() {
        assert!(report_outcome("x", MutationOutcome::Confirmed).is_ok());
        assert!(report_outcome("x", MutationOutcome::Local).is_ok());
        let failed = MutationOutcome::Failed {
            previous: None,
            error: crate::error::StoreError::Remote("denied".to_string()),
        };
        let message = report_outcome("Deleted task a", failed).unwrap_err();
        assert!(message.contains("rolled back"));
        assert!(message.contains("denied"));
    }

    #[test]
    fn test_invalid_deadline_arg() {
        assert!(parse_deadline_arg("next tuesday").is_err());
        assert!(parse_deadline_arg("2026-01-08").is_ok());
    }
}
