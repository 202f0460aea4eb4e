use crate::app::{App, Mode};
use crate::input::Command;
use crate::ui::dialogs::{DialogType, FormAction};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// 处理键盘输入
/// 返回 false 表示应该退出应用
pub fn handle_key_input(app: &mut App, key: KeyEvent) -> bool {
    // Ctrl+C 在任何模式下退出
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return false;
    }

    match app.mode {
        Mode::Normal => handle_normal_mode(app, key),
        Mode::Dialog => handle_dialog_mode(app, key),
        Mode::Help => handle_help_mode(app, key),
    }
}

/// 按键到命令的映射
pub fn match_key(key: KeyEvent) -> Option<Command> {
    let cmd = match key.code {
        KeyCode::Char('q') => Command::Quit,
        KeyCode::Char('j') | KeyCode::Down => Command::TaskDown,
        KeyCode::Char('k') | KeyCode::Up => Command::TaskUp,
        KeyCode::Char('g') | KeyCode::Home => Command::FirstTask,
        KeyCode::Char('G') | KeyCode::End => Command::LastTask,
        KeyCode::Tab => Command::CycleFilter,
        KeyCode::Char('a') | KeyCode::Char('n') => Command::NewTask,
        KeyCode::Char('e') | KeyCode::Enter => Command::EditTask,
        KeyCode::Char('x') | KeyCode::Char(' ') => Command::ToggleTask,
        KeyCode::Char('d') | KeyCode::Delete => Command::DeleteTask,
        KeyCode::Char('y') => Command::CopyTask,
        KeyCode::Char('r') => Command::Sync,
        KeyCode::Char('t') => Command::ToggleTheme,
        KeyCode::Char('?') => Command::ShowHelp,
        _ => return None,
    };
    Some(cmd)
}

/// 处理正常模式的按键
fn handle_normal_mode(app: &mut App, key: KeyEvent) -> bool {
    match match_key(key) {
        Some(Command::Quit) => false,
        Some(cmd) => {
            execute_command(app, cmd);
            true
        }
        None => true,
    }
}

/// 执行命令
pub fn execute_command(app: &mut App, cmd: Command) {
    match cmd {
        Command::Quit => {}
        Command::TaskUp => app.select_prev(),
        Command::TaskDown => app.select_next(),
        Command::FirstTask => app.select_first(),
        Command::LastTask => app.select_last(),
        Command::CycleFilter => app.cycle_filter(),
        Command::NewTask => app.open_new_task_form(),
        Command::EditTask => app.open_edit_form(),
        Command::ToggleTask => app.toggle_selected(),
        Command::DeleteTask => app.request_delete(),
        Command::CopyTask => copy_task(app),
        Command::Sync => app.sync_now(),
        Command::ToggleTheme => app.toggle_theme(),
        Command::ShowHelp => app.mode = Mode::Help,
    }
}

#[cfg(feature = "clipboard")]
fn copy_task(app: &mut App) {
    app.copy_selected();
}

#[cfg(not(feature = "clipboard"))]
fn copy_task(app: &mut App) {
    app.show_notification(
        "Built without clipboard support".to_string(),
        crate::app::NotificationLevel::Info,
    );
}

/// 处理对话框模式的按键
fn handle_dialog_mode(app: &mut App, key: KeyEvent) -> bool {
    let Some(dialog) = app.dialog.as_mut() else {
        app.mode = Mode::Normal;
        return true;
    };

    match dialog {
        DialogType::TaskForm(form) => match form.handle_key(key) {
            FormAction::Continue => {}
            FormAction::Submit => app.submit_form(),
            FormAction::Cancel => app.close_dialog(),
        },
        DialogType::Confirm {
            yes_selected,
            action,
            ..
        } => match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => {
                let action = action.clone();
                app.confirm(action);
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => app.close_dialog(),
            KeyCode::Left | KeyCode::Right | KeyCode::Char('h') | KeyCode::Char('l') | KeyCode::Tab => {
                *yes_selected = !*yes_selected;
            }
            KeyCode::Enter => {
                if *yes_selected {
                    let action = action.clone();
                    app.confirm(action);
                } else {
                    app.close_dialog();
                }
            }
            _ => {}
        },
    }

    true
}

/// 处理帮助模式的按键
fn handle_help_mode(app: &mut App, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q') => {
            app.mode = Mode::Normal;
        }
        _ => {}
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tests::test_app;
    use crate::app::Filter;
    use tempfile::TempDir;

    fn press(app: &mut App, code: KeyCode) -> bool {
        handle_key_input(app, KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn type_str(app: &mut App, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    #[test]
    fn test_add_task_through_form() {
        let dir = TempDir::new().unwrap();
        let mut app = test_app(&dir);

        press(&mut app, KeyCode::Char('a'));
        assert_eq!(app.mode, Mode::Dialog);
        type_str(&mut app, "Write report");
        press(&mut app, KeyCode::Enter);

        assert_eq!(app.mode, Mode::Normal);
        assert_eq!(app.visible_tasks().len(), 1);
        assert_eq!(app.visible_tasks()[0].title, "Write report");
        assert!(app.visible_tasks()[0].include_last_day);
    }

    #[test]
    fn test_empty_title_keeps_form_open() {
        let dir = TempDir::new().unwrap();
        let mut app = test_app(&dir);

        press(&mut app, KeyCode::Char('a'));
        press(&mut app, KeyCode::Enter);

        assert_eq!(app.mode, Mode::Dialog);
        match &app.dialog {
            Some(DialogType::TaskForm(form)) => assert!(form.error.is_some()),
            _ => panic!("form should still be open"),
        }

        press(&mut app, KeyCode::Esc);
        assert_eq!(app.mode, Mode::Normal);
        assert!(app.tasks.is_empty());
    }

    #[test]
    fn test_edit_through_form() {
        let dir = TempDir::new().unwrap();
        let mut app = test_app(&dir);
        press(&mut app, KeyCode::Char('a'));
        type_str(&mut app, "draft");
        press(&mut app, KeyCode::Enter);

        press(&mut app, KeyCode::Char('e'));
        type_str(&mut app, " v2");
        press(&mut app, KeyCode::Enter);

        assert_eq!(app.visible_tasks()[0].title, "draft v2");
    }

    #[test]
    fn test_delete_needs_confirmation() {
        let dir = TempDir::new().unwrap();
        let mut app = test_app(&dir);
        press(&mut app, KeyCode::Char('a'));
        type_str(&mut app, "doomed");
        press(&mut app, KeyCode::Enter);

        press(&mut app, KeyCode::Char('d'));
        press(&mut app, KeyCode::Char('n'));
        assert_eq!(app.tasks.len(), 1);

        press(&mut app, KeyCode::Char('d'));
        // 默认选中"否"，Enter 不删除
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.tasks.len(), 1);

        press(&mut app, KeyCode::Char('d'));
        press(&mut app, KeyCode::Char('y'));
        assert!(app.tasks.is_empty());
    }

    #[test]
    fn test_toggle_and_filter_keys() {
        let dir = TempDir::new().unwrap();
        let mut app = test_app(&dir);
        press(&mut app, KeyCode::Char('a'));
        type_str(&mut app, "t");
        press(&mut app, KeyCode::Enter);

        press(&mut app, KeyCode::Char('x'));
        assert!(app.visible_tasks().is_empty());

        press(&mut app, KeyCode::Tab);
        assert_eq!(app.filter, Filter::Completed);
        assert_eq!(app.visible_tasks().len(), 1);
    }

    #[test]
    fn test_help_and_quit() {
        let dir = TempDir::new().unwrap();
        let mut app = test_app(&dir);

        assert!(press(&mut app, KeyCode::Char('?')));
        assert_eq!(app.mode, Mode::Help);
        // 帮助模式下 q 只关闭帮助
        assert!(press(&mut app, KeyCode::Char('q')));
        assert_eq!(app.mode, Mode::Normal);

        assert!(!press(&mut app, KeyCode::Char('q')));
    }
}
