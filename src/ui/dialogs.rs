use chrono::{DateTime, TimeZone, Utc};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};
use std::fmt;

use super::text_input::{FieldInput, InputAction};
use super::theme::Palette;
use crate::deadline::{format_deadline_input, parse_deadline};
use crate::models::{Task, TaskDraft, TaskId, TaskPatch};

/// 确认操作类型
#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmAction {
    DeleteTask(TaskId),
}

/// 对话框类型
pub enum DialogType {
    /// 新建 / 编辑任务表单
    TaskForm(TaskForm),
    /// 确认对话框
    Confirm {
        title: String,
        message: String,
        yes_selected: bool,
        action: ConfirmAction,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Title,
    Description,
    Deadline,
    LastDay,
}

impl FormField {
    fn next(self) -> Self {
        match self {
            FormField::Title => FormField::Description,
            FormField::Description => FormField::Deadline,
            FormField::Deadline => FormField::LastDay,
            FormField::LastDay => FormField::Title,
        }
    }

    fn prev(self) -> Self {
        match self {
            FormField::Title => FormField::LastDay,
            FormField::Description => FormField::Title,
            FormField::Deadline => FormField::Description,
            FormField::LastDay => FormField::Deadline,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormAction {
    Continue,
    Submit,
    Cancel,
}

/// What a submitted form asks the store to do.
#[derive(Debug, Clone, PartialEq)]
pub enum FormSubmission {
    Create(TaskDraft),
    Update(TaskId, TaskPatch),
}

/// 表单校验错误，显示在表单底部
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormError {
    EmptyTitle,
    InvalidDeadline(String),
}

impl fmt::Display for FormError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormError::EmptyTitle => write!(f, "Title cannot be empty"),
            FormError::InvalidDeadline(input) => write!(
                f,
                "Invalid deadline '{}' (YYYY-MM-DD or YYYY-MM-DD HH:MM)",
                input
            ),
        }
    }
}

pub struct TaskForm {
    editing: Option<TaskId>,
    title: FieldInput,
    description: FieldInput,
    deadline: FieldInput,
    include_last_day: bool,
    focus: FormField,
    /// 编辑时的原始截止时间及其显示文本；文本未改动时保留原值（含秒）
    original_deadline: Option<(DateTime<Utc>, String)>,
    pub error: Option<FormError>,
}

impl TaskForm {
    pub fn create(default_include_last_day: bool) -> Self {
        Self {
            editing: None,
            title: FieldInput::new("", false),
            description: FieldInput::new("", true),
            deadline: FieldInput::new("", false),
            include_last_day: default_include_last_day,
            focus: FormField::Title,
            original_deadline: None,
            error: None,
        }
    }

    pub fn edit<Tz>(task: &Task, tz: &Tz) -> Self
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        let deadline_text = task
            .deadline
            .map(|d| format_deadline_input(d, tz))
            .unwrap_or_default();

        Self {
            editing: Some(task.id.clone()),
            title: FieldInput::new(&task.title, false),
            description: FieldInput::new(&task.description, true),
            deadline: FieldInput::new(&deadline_text, false),
            include_last_day: task.include_last_day,
            focus: FormField::Title,
            original_deadline: task.deadline.map(|d| (d, deadline_text)),
            error: None,
        }
    }

    pub fn is_editing(&self) -> bool {
        self.editing.is_some()
    }

    pub fn focus(&self) -> FormField {
        self.focus
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> FormAction {
        if self.focus == FormField::LastDay {
            return match key.code {
                KeyCode::Char(' ') | KeyCode::Char('x') => {
                    self.include_last_day = !self.include_last_day;
                    FormAction::Continue
                }
                KeyCode::Enter => FormAction::Submit,
                KeyCode::Esc => FormAction::Cancel,
                KeyCode::Tab | KeyCode::Down => {
                    self.focus = self.focus.next();
                    FormAction::Continue
                }
                KeyCode::BackTab | KeyCode::Up => {
                    self.focus = self.focus.prev();
                    FormAction::Continue
                }
                KeyCode::Char('s')
                    if key
                        .modifiers
                        .contains(crossterm::event::KeyModifiers::CONTROL) =>
                {
                    FormAction::Submit
                }
                _ => FormAction::Continue,
            };
        }

        let field = match self.focus {
            FormField::Title => &mut self.title,
            FormField::Description => &mut self.description,
            _ => &mut self.deadline,
        };

        match field.handle_key(key) {
            InputAction::Continue => FormAction::Continue,
            InputAction::Submit => FormAction::Submit,
            InputAction::Cancel => FormAction::Cancel,
            InputAction::NextField => {
                self.focus = self.focus.next();
                FormAction::Continue
            }
            InputAction::PrevField => {
                self.focus = self.focus.prev();
                FormAction::Continue
            }
        }
    }

    /// Validate the fields and turn them into a store request. Deadlines are
    /// read as local time in `tz`.
    pub fn submission<Tz: TimeZone>(&self, tz: &Tz) -> Result<FormSubmission, FormError> {
        let title = self.title.content().trim().to_string();
        if title.is_empty() {
            return Err(FormError::EmptyTitle);
        }
        let description = self.description.content().trim().to_string();
        let deadline = self.parsed_deadline(tz)?;

        Ok(match &self.editing {
            None => FormSubmission::Create(TaskDraft {
                title,
                description,
                deadline,
                include_last_day: Some(self.include_last_day),
            }),
            Some(id) => FormSubmission::Update(
                id.clone(),
                TaskPatch {
                    title: Some(title),
                    description: Some(description),
                    deadline: Some(deadline),
                    include_last_day: Some(self.include_last_day),
                    completed: None,
                },
            ),
        })
    }

    fn parsed_deadline<Tz: TimeZone>(&self, tz: &Tz) -> Result<Option<DateTime<Utc>>, FormError> {
        let text = self.deadline.content().trim().to_string();
        if text.is_empty() {
            return Ok(None);
        }
        if let Some((original, shown)) = &self.original_deadline {
            if shown == &text {
                return Ok(Some(*original));
            }
        }
        parse_deadline(&text, tz)
            .map(Some)
            .ok_or(FormError::InvalidDeadline(text))
    }
}

/// 渲染居中的对话框
pub fn render_dialog(f: &mut Frame, dialog: &mut DialogType, palette: &Palette) {
    match dialog {
        DialogType::TaskForm(form) => {
            let area = centered_rect(64, 70, f.area());
            f.render_widget(Clear, area);
            render_task_form(f, area, form, palette);
        }
        DialogType::Confirm {
            title,
            message,
            yes_selected,
            ..
        } => {
            let area = centered_rect(50, 30, f.area());
            f.render_widget(Clear, area);
            render_confirm_dialog(f, area, title, message, *yes_selected, palette);
        }
    }
}

fn render_task_form(f: &mut Frame, area: Rect, form: &mut TaskForm, palette: &Palette) {
    let title = if form.is_editing() { "Edit task" } else { "New task" };
    let block = Block::default()
        .title(format!("  {}  ", title))
        .title_alignment(Alignment::Left)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.border))
        .border_type(ratatui::widgets::BorderType::Rounded)
        .style(Style::default().bg(palette.bg));

    let inner = block.inner(area);
    f.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // 标题
            Constraint::Min(5),    // 描述
            Constraint::Length(3), // 截止时间
            Constraint::Length(1), // Last Day 开关
            Constraint::Length(1), // 错误信息
            Constraint::Length(1), // 帮助
        ])
        .split(inner);

    let focus = form.focus;
    render_field(f, chunks[0], "Title", &mut form.title, focus == FormField::Title, palette);
    render_field(
        f,
        chunks[1],
        "Description",
        &mut form.description,
        focus == FormField::Description,
        palette,
    );
    render_field(
        f,
        chunks[2],
        "Deadline (YYYY-MM-DD [HH:MM], empty = none)",
        &mut form.deadline,
        focus == FormField::Deadline,
        palette,
    );

    let checkbox = if form.include_last_day { "[x]" } else { "[ ]" };
    let toggle_style = if focus == FormField::LastDay {
        Style::default()
            .fg(palette.bg)
            .bg(palette.accent)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(palette.fg)
    };
    let toggle = Line::from(vec![
        Span::raw(" "),
        Span::styled(format!("{} Show \"Last Day\" hint", checkbox), toggle_style),
    ]);
    f.render_widget(Paragraph::new(toggle), chunks[3]);

    if let Some(error) = &form.error {
        let error_line = Paragraph::new(format!(" ✗ {}", error))
            .style(Style::default().fg(palette.danger));
        f.render_widget(error_line, chunks[4]);
    }

    let help = Paragraph::new("Tab next field  Space toggle  Enter / Ctrl+S save  Esc cancel")
        .style(Style::default().fg(palette.muted))
        .alignment(Alignment::Center);
    f.render_widget(help, chunks[5]);
}

fn render_field(
    f: &mut Frame,
    area: Rect,
    label: &str,
    field: &mut FieldInput,
    focused: bool,
    palette: &Palette,
) {
    let border = if focused { palette.accent } else { palette.border };
    let block = Block::default()
        .title(format!(" {} ", label))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border))
        .border_type(ratatui::widgets::BorderType::Rounded);

    let inner = block.inner(area);
    f.render_widget(block, area);
    field.render(f, inner, palette, focused);
}

/// 渲染确认对话框
fn render_confirm_dialog(
    f: &mut Frame,
    area: Rect,
    title: &str,
    message: &str,
    yes_selected: bool,
    palette: &Palette,
) {
    let block = Block::default()
        .title(format!("  {}  ", title))
        .title_alignment(Alignment::Left)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.warning))
        .border_type(ratatui::widgets::BorderType::Rounded)
        .style(Style::default().bg(palette.bg));

    let inner = block.inner(area);
    f.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),    // 消息
            Constraint::Length(3), // 按钮
        ])
        .split(inner);

    let message_text = Paragraph::new(message)
        .wrap(Wrap { trim: true })
        .alignment(Alignment::Center)
        .style(Style::default().fg(palette.fg));
    f.render_widget(message_text, chunks[0]);

    let button_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(25),
            Constraint::Percentage(25),
            Constraint::Percentage(25),
            Constraint::Percentage(25),
        ])
        .split(chunks[1]);

    // 否按钮 (n) 在左，是按钮 (y) 在右
    let no_style = if !yes_selected {
        Style::default()
            .bg(palette.danger)
            .fg(palette.bg)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(palette.danger).add_modifier(Modifier::DIM)
    };
    let no_button = Paragraph::new("[ n ] No")
        .style(no_style)
        .alignment(Alignment::Center);
    f.render_widget(no_button, button_chunks[1]);

    let yes_style = if yes_selected {
        Style::default()
            .bg(palette.success)
            .fg(palette.bg)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(palette.success).add_modifier(Modifier::DIM)
    };
    let yes_button = Paragraph::new("[ y ] Yes")
        .style(yes_style)
        .alignment(Alignment::Center);
    f.render_widget(yes_button, button_chunks[2]);
}

/// 创建一个居中的矩形区域
pub fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_str(form: &mut TaskForm, text: &str) {
        for c in text.chars() {
            form.handle_key(key(KeyCode::Char(c)));
        }
    }

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_create_form_submission() {
        let mut form = TaskForm::create(true);
        type_str(&mut form, "Write report");
        form.handle_key(key(KeyCode::Tab));
        type_str(&mut form, "quarterly");
        form.handle_key(key(KeyCode::Tab));
        assert_eq!(form.focus(), FormField::Deadline);
        type_str(&mut form, "2026-01-08");
        form.handle_key(key(KeyCode::Tab));
        form.handle_key(key(KeyCode::Char(' ')));

        match form.submission(&Utc).unwrap() {
            FormSubmission::Create(draft) => {
                assert_eq!(draft.title, "Write report");
                assert_eq!(draft.description, "quarterly");
                assert_eq!(draft.include_last_day, Some(false));
                // 只有日期时取当天结束
                assert_eq!(
                    draft.deadline,
                    Some(at("2026-01-08T23:59:59.999Z"))
                );
            }
            other => panic!("expected create, got {:?}", other),
        }
    }

    #[test]
    fn test_validation_errors() {
        let form = TaskForm::create(true);
        assert_eq!(form.submission(&Utc), Err(FormError::EmptyTitle));

        let mut form = TaskForm::create(true);
        type_str(&mut form, "t");
        form.handle_key(key(KeyCode::Tab));
        form.handle_key(key(KeyCode::Tab));
        type_str(&mut form, "someday");
        assert_eq!(
            form.submission(&Utc),
            Err(FormError::InvalidDeadline("someday".to_string()))
        );
    }

    #[test]
    fn test_edit_keeps_untouched_deadline_exactly() {
        let task = TaskDraft {
            title: "t".to_string(),
            description: String::new(),
            deadline: Some(at("2026-01-08T23:59:59.999Z")),
            include_last_day: Some(true),
        }
        .into_task(TaskId::new("abc"), at("2026-01-05T00:00:00Z"), true)
        .unwrap();

        let form = TaskForm::edit(&task, &Utc);
        match form.submission(&Utc).unwrap() {
            FormSubmission::Update(id, patch) => {
                assert_eq!(id, TaskId::new("abc"));
                assert_eq!(patch.deadline, Some(task.deadline));
                assert_eq!(patch.completed, None);
            }
            other => panic!("expected update, got {:?}", other),
        }
    }

    #[test]
    fn test_edit_can_clear_deadline() {
        let task = TaskDraft {
            title: "t".to_string(),
            description: String::new(),
            deadline: Some(at("2026-01-08T12:00:00Z")),
            include_last_day: None,
        }
        .into_task(TaskId::new("abc"), at("2026-01-05T00:00:00Z"), true)
        .unwrap();

        let mut form = TaskForm::edit(&task, &Utc);
        form.handle_key(key(KeyCode::Tab));
        form.handle_key(key(KeyCode::Tab));
        form.handle_key(KeyEvent::new(KeyCode::Char('u'), KeyModifiers::CONTROL));

        match form.submission(&Utc).unwrap() {
            FormSubmission::Update(_, patch) => assert_eq!(patch.deadline, Some(None)),
            other => panic!("expected update, got {:?}", other),
        }
    }

    #[test]
    fn test_escape_cancels() {
        let mut form = TaskForm::create(true);
        assert_eq!(form.handle_key(key(KeyCode::Esc)), FormAction::Cancel);
    }
}
