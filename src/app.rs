use anyhow::Result;
use chrono::{Local, Utc};
use log::{info, warn};
use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};

use crate::config::{self, Config};
use crate::fs::{self, DirRemote};
use crate::models::{Task, TaskId};
use crate::store::{MutationOutcome, TaskStore};
use crate::ui::dialogs::{ConfirmAction, DialogType, FormSubmission, TaskForm};
use crate::ui::theme::Palette;

/// 通知级别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// 通知消息
#[derive(Debug, Clone)]
pub struct Notification {
    pub message: String,
    pub level: NotificationLevel,
    pub created_at: Instant,
}

impl Notification {
    /// 检查通知是否已过期（3秒后自动消失）
    pub fn is_expired(&self) -> bool {
        self.created_at.elapsed().as_secs() >= 3
    }
}

/// 应用模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// 正常模式 - 导航和查看
    Normal,
    /// 对话框模式
    Dialog,
    /// 帮助模式 - 显示快捷键
    Help,
}

/// 列表过滤
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    Active,
    Completed,
    All,
}

impl Filter {
    pub fn next(self) -> Self {
        match self {
            Filter::Active => Filter::Completed,
            Filter::Completed => Filter::All,
            Filter::All => Filter::Active,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Filter::Active => "Active",
            Filter::Completed => "Completed",
            Filter::All => "All",
        }
    }

    pub fn matches(self, task: &Task) -> bool {
        match self {
            Filter::Active => !task.completed,
            Filter::Completed => task.completed,
            Filter::All => true,
        }
    }
}

/// 应用状态
pub struct App {
    pub store: TaskStore<DirRemote>,
    /// 应用配置
    pub config: Config,
    pub palette: Palette,
    /// 当前模式
    pub mode: Mode,
    pub filter: Filter,
    /// 选中的任务在当前过滤结果中的索引
    pub selected: usize,
    /// 当前显示的对话框
    pub dialog: Option<DialogType>,
    /// 通知消息
    pub notification: Option<Notification>,
    /// 最近一次收到的任务列表快照
    pub tasks: Vec<Task>,
    updates: Receiver<Vec<Task>>,
    last_sync: Instant,
}

impl App {
    /// 创建新的应用实例
    pub fn new() -> Result<Self> {
        // 检查首次运行并加载配置
        let (config, is_first_run) = config::check_first_run()?;

        fs::init_data_dir()?;
        if let Err(e) = crate::logging::init_logging(&config.log_level, &fs::get_log_dir()) {
            eprintln!("Warning: logging disabled: {}", e);
        }

        crate::auth::ensure_access(&config, &fs::get_data_dir(), Utc::now())?;
        let store = fs::open_store(&config)?;

        let mut app = Self::with_store(store, config);
        if is_first_run {
            app.show_notification(
                "Welcome to taskdue! Press a to add a task, ? for help".to_string(),
                NotificationLevel::Info,
            );
        }
        info!("event=tui_start module=app status=ok tasks={}", app.tasks.len());
        Ok(app)
    }

    pub fn with_store(mut store: TaskStore<DirRemote>, config: Config) -> Self {
        let updates = store.subscribe();
        let tasks = store.list().to_vec();

        Self {
            store,
            palette: Palette::for_theme(config.theme),
            config,
            mode: Mode::Normal,
            filter: Filter::Active,
            selected: 0,
            dialog: None,
            notification: None,
            tasks,
            updates,
            last_sync: Instant::now(),
        }
    }

    /// 处理键盘输入
    pub fn handle_key(&mut self, key: crossterm::event::KeyEvent) -> bool {
        use crate::input::handle_key_input;
        handle_key_input(self, key)
    }

    /// 事件循环每一轮调用：收取列表更新、清理通知、定时同步
    pub fn tick(&mut self) {
        self.clear_expired_notification();

        let interval = self.config.refresh_interval_secs;
        if interval > 0
            && self.store.has_remote()
            && self.mode == Mode::Normal
            && self.last_sync.elapsed() >= Duration::from_secs(interval)
        {
            self.last_sync = Instant::now();
            if self.store.is_online() {
                if let Err(e) = self.store.sync() {
                    warn!("event=auto_sync module=app status=error error={}", e);
                }
            }
        }

        self.drain_updates();
    }

    /// 只保留最新的快照
    pub fn drain_updates(&mut self) {
        let mut latest = None;
        while let Ok(tasks) = self.updates.try_recv() {
            latest = Some(tasks);
        }
        if let Some(tasks) = latest {
            self.tasks = tasks;
            self.clamp_selection();
        }
    }

    pub fn visible_tasks(&self) -> Vec<&Task> {
        self.tasks.iter().filter(|t| self.filter.matches(t)).collect()
    }

    pub fn selected_task(&self) -> Option<&Task> {
        self.visible_tasks().get(self.selected).copied()
    }

    fn selected_id(&self) -> Option<TaskId> {
        self.selected_task().map(|t| t.id.clone())
    }

    pub fn clamp_selection(&mut self) {
        let len = self.visible_tasks().len();
        if len == 0 {
            self.selected = 0;
        } else if self.selected >= len {
            self.selected = len - 1;
        }
    }

    pub fn select_next(&mut self) {
        let len = self.visible_tasks().len();
        if len > 0 && self.selected + 1 < len {
            self.selected += 1;
        }
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn select_first(&mut self) {
        self.selected = 0;
    }

    pub fn select_last(&mut self) {
        self.selected = self.visible_tasks().len().saturating_sub(1);
    }

    pub fn cycle_filter(&mut self) {
        self.filter = self.filter.next();
        self.selected = 0;
    }

    pub fn open_new_task_form(&mut self) {
        self.dialog = Some(DialogType::TaskForm(TaskForm::create(
            self.config.include_last_day,
        )));
        self.mode = Mode::Dialog;
    }

    pub fn open_edit_form(&mut self) {
        let Some(task) = self.selected_task() else {
            return;
        };
        let form = TaskForm::edit(task, &Local);
        self.dialog = Some(DialogType::TaskForm(form));
        self.mode = Mode::Dialog;
    }

    pub fn close_dialog(&mut self) {
        self.dialog = None;
        self.mode = Mode::Normal;
    }

    /// 提交表单。校验失败时表单保持打开并显示错误
    pub fn submit_form(&mut self) {
        let Some(DialogType::TaskForm(form)) = self.dialog.as_mut() else {
            return;
        };

        let submission = match form.submission(&Local) {
            Ok(submission) => submission,
            Err(e) => {
                form.error = Some(e);
                return;
            }
        };
        self.close_dialog();

        match submission {
            FormSubmission::Create(draft) => match self.store.add(draft, Utc::now()) {
                Ok((task, outcome)) => {
                    let message = format!("Added \"{}\"", task.title);
                    self.report(&message, outcome);
                    self.focus_task(&task.id);
                }
                Err(e) => self.show_notification(e.to_string(), NotificationLevel::Error),
            },
            FormSubmission::Update(id, patch) => match self.store.update(&id, patch) {
                Ok(outcome) => self.report("Task updated", outcome),
                Err(e) => self.show_notification(e.to_string(), NotificationLevel::Error),
            },
        }
        self.drain_updates();
    }

    pub fn toggle_selected(&mut self) {
        let Some(id) = self.selected_id() else {
            return;
        };

        match self.store.toggle_completion(&id) {
            Ok(outcome) => {
                let message = match self.store.get(&id) {
                    Some(task) if task.completed => "Marked as done",
                    _ => "Marked as active",
                };
                self.report(message, outcome);
            }
            Err(e) => self.show_notification(e.to_string(), NotificationLevel::Error),
        }
        self.drain_updates();
    }

    pub fn request_delete(&mut self) {
        let Some((id, title)) = self.selected_task().map(|t| (t.id.clone(), t.title.clone())) else {
            return;
        };

        self.dialog = Some(DialogType::Confirm {
            title: "Delete task".to_string(),
            message: format!("Delete \"{}\"? This cannot be undone.", title),
            yes_selected: false,
            action: ConfirmAction::DeleteTask(id),
        });
        self.mode = Mode::Dialog;
    }

    pub fn confirm(&mut self, action: ConfirmAction) {
        self.close_dialog();
        match action {
            ConfirmAction::DeleteTask(id) => match self.store.remove(&id) {
                Ok(outcome) => self.report("Task deleted", outcome),
                Err(e) => self.show_notification(e.to_string(), NotificationLevel::Error),
            },
        }
        self.drain_updates();
    }

    pub fn sync_now(&mut self) {
        self.last_sync = Instant::now();

        if !self.store.has_remote() {
            self.show_notification(
                "Local-only mode: set a remote with `tdue config remote <dir>`".to_string(),
                NotificationLevel::Info,
            );
            return;
        }
        if !self.store.is_online() {
            self.show_notification(
                format!(
                    "Offline: {} change(s) waiting to sync",
                    self.store.pending_count()
                ),
                NotificationLevel::Warning,
            );
            return;
        }

        match self.store.sync() {
            Ok(report) if report.failed > 0 => self.show_notification(
                format!("Synced, but {} change(s) were rejected and stay queued", report.failed),
                NotificationLevel::Warning,
            ),
            Ok(_) => self.show_notification("Synced".to_string(), NotificationLevel::Success),
            Err(e) => self.show_notification(e.to_string(), NotificationLevel::Error),
        }
        self.drain_updates();
    }

    /// 切换亮/暗主题并写回配置
    pub fn toggle_theme(&mut self) {
        self.config.theme = self.config.theme.toggled();
        self.palette = Palette::for_theme(self.config.theme);

        if let Err(e) = config::save_config(&self.config) {
            warn!("event=theme_save module=app status=error error={}", e);
            self.show_notification(
                format!("Theme changed but not saved: {}", e),
                NotificationLevel::Warning,
            );
        }
    }

    #[cfg(feature = "clipboard")]
    pub fn copy_selected(&mut self) {
        let Some(task) = self.selected_task() else {
            return;
        };
        let label = task.remaining(Utc::now()).list_label();
        let line = if label.is_empty() {
            task.title.clone()
        } else {
            format!("{}: {}", task.title, label)
        };

        let result = arboard::Clipboard::new().and_then(|mut clipboard| clipboard.set_text(line));
        match result {
            Ok(()) => self.show_notification("Copied to clipboard".to_string(), NotificationLevel::Success),
            Err(e) => self.show_notification(format!("Clipboard unavailable: {}", e), NotificationLevel::Error),
        }
    }

    fn focus_task(&mut self, id: &TaskId) {
        self.drain_updates();
        if let Some(index) = self.visible_tasks().iter().position(|t| &t.id == id) {
            self.selected = index;
        }
    }

    /// 把变更结果转成通知；远端拒绝时本地已回滚
    fn report(&mut self, action: &str, outcome: MutationOutcome) {
        if outcome.is_failed() {
            warn!("event=mutation module=app status=rolled_back action={}", action);
        }
        match outcome {
            MutationOutcome::Confirmed => {
                self.show_notification(action.to_string(), NotificationLevel::Success)
            }
            MutationOutcome::Local if self.store.has_remote() => self.show_notification(
                format!("{} (offline, will sync later)", action),
                NotificationLevel::Warning,
            ),
            MutationOutcome::Local => {
                self.show_notification(action.to_string(), NotificationLevel::Success)
            }
            MutationOutcome::Failed { error, .. } => self.show_notification(
                format!("{} failed, change reverted: {}", action, error),
                NotificationLevel::Error,
            ),
        }
    }

    /// 显示通知消息
    pub fn show_notification(&mut self, message: String, level: NotificationLevel) {
        self.notification = Some(Notification {
            message,
            level,
            created_at: Instant::now(),
        });
    }

    /// 清除已过期的通知
    pub fn clear_expired_notification(&mut self) {
        if let Some(ref notification) = self.notification {
            if notification.is_expired() {
                self.notification = None;
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::fs::LocalCache;
    use tempfile::TempDir;

    /// 本地模式的 App，不读写用户目录
    pub(crate) fn test_app(dir: &TempDir) -> App {
        let cache = LocalCache::new(dir.path().join("cache.json"));
        let store = TaskStore::open(cache, None, true).unwrap();
        App::with_store(store, Config::default())
    }

    fn add(app: &mut App, title: &str) {
        app.store
            .add(crate::models::TaskDraft::new(title), Utc::now())
            .unwrap();
        app.drain_updates();
    }

    #[test]
    fn test_filter_cycle() {
        assert_eq!(Filter::Active.next(), Filter::Completed);
        assert_eq!(Filter::Completed.next(), Filter::All);
        assert_eq!(Filter::All.next(), Filter::Active);
    }

    #[test]
    fn test_toggle_moves_task_between_filters() {
        let dir = TempDir::new().unwrap();
        let mut app = test_app(&dir);
        add(&mut app, "first");
        add(&mut app, "second");
        assert_eq!(app.visible_tasks().len(), 2);

        app.toggle_selected();
        assert_eq!(app.visible_tasks().len(), 1);
        assert_eq!(app.selected, 0);

        app.cycle_filter();
        assert_eq!(app.filter, Filter::Completed);
        assert_eq!(app.visible_tasks()[0].title, "second");
    }

    #[test]
    fn test_selection_is_clamped() {
        let dir = TempDir::new().unwrap();
        let mut app = test_app(&dir);
        add(&mut app, "a");
        add(&mut app, "b");

        app.select_last();
        assert_eq!(app.selected, 1);
        app.select_next();
        assert_eq!(app.selected, 1);

        let id = app.selected_task().unwrap().id.clone();
        app.confirm(ConfirmAction::DeleteTask(id));
        assert_eq!(app.selected, 0);
        assert_eq!(app.visible_tasks().len(), 1);
    }

    #[test]
    fn test_sync_without_remote_explains_local_mode() {
        let dir = TempDir::new().unwrap();
        let mut app = test_app(&dir);
        app.sync_now();
        let notification = app.notification.unwrap();
        assert_eq!(notification.level, NotificationLevel::Info);
        assert!(notification.message.contains("Local-only"));
    }

    #[test]
    fn test_request_delete_opens_confirm() {
        let dir = TempDir::new().unwrap();
        let mut app = test_app(&dir);
        app.request_delete();
        assert!(app.dialog.is_none());

        add(&mut app, "a");
        app.request_delete();
        assert_eq!(app.mode, Mode::Dialog);
        assert!(matches!(app.dialog, Some(DialogType::Confirm { .. })));
    }
}
