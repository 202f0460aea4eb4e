use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tui_textarea::{CursorMove, TextArea};

use ratatui::{layout::Rect, style::Style, Frame};

use super::theme::Palette;

/// 输入动作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAction {
    /// 继续编辑
    Continue,
    /// 提交整个表单
    Submit,
    /// 取消对话框
    Cancel,
    /// 切换到下一个字段
    NextField,
    /// 切换到上一个字段
    PrevField,
}

/// One field of a form, backed by `tui_textarea::TextArea`.
///
/// Keys are mapped by hand: the textarea's own `input()` expects the
/// crossterm version it was built against.
pub struct FieldInput {
    textarea: TextArea<'static>,
    multiline: bool,
}

impl FieldInput {
    pub fn new(initial_value: &str, multiline: bool) -> Self {
        let textarea = if initial_value.is_empty() {
            TextArea::default()
        } else {
            TextArea::from(initial_value.lines().map(|s| s.to_string()))
        };

        let mut field = Self { textarea, multiline };
        field.textarea.move_cursor(CursorMove::Bottom);
        field.textarea.move_cursor(CursorMove::End);
        field
    }

    pub fn content(&self) -> String {
        self.textarea.lines().join("\n")
    }

    /// 处理按键事件
    pub fn handle_key(&mut self, key: KeyEvent) -> InputAction {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        // Ctrl+S 在任何字段都提交
        if ctrl && key.code == KeyCode::Char('s') {
            return InputAction::Submit;
        }

        match key.code {
            KeyCode::Esc => InputAction::Cancel,
            KeyCode::Tab => InputAction::NextField,
            KeyCode::BackTab => InputAction::PrevField,
            KeyCode::Enter if self.multiline => {
                self.textarea.insert_newline();
                InputAction::Continue
            }
            KeyCode::Enter => InputAction::Submit,
            KeyCode::Char('u') if ctrl => {
                self.textarea.delete_line_by_head();
                InputAction::Continue
            }
            KeyCode::Char('w') if ctrl => {
                self.textarea.delete_word();
                InputAction::Continue
            }
            KeyCode::Char(_) if ctrl => InputAction::Continue,
            KeyCode::Char(c) => {
                self.textarea.insert_char(c);
                InputAction::Continue
            }
            KeyCode::Backspace => {
                self.textarea.delete_char();
                InputAction::Continue
            }
            KeyCode::Delete => {
                self.textarea.delete_next_char();
                InputAction::Continue
            }
            KeyCode::Left => {
                self.textarea.move_cursor(CursorMove::Back);
                InputAction::Continue
            }
            KeyCode::Right => {
                self.textarea.move_cursor(CursorMove::Forward);
                InputAction::Continue
            }
            KeyCode::Up if self.multiline => {
                self.textarea.move_cursor(CursorMove::Up);
                InputAction::Continue
            }
            KeyCode::Down if self.multiline => {
                self.textarea.move_cursor(CursorMove::Down);
                InputAction::Continue
            }
            KeyCode::Up => InputAction::PrevField,
            KeyCode::Down => InputAction::NextField,
            KeyCode::Home => {
                self.textarea.move_cursor(CursorMove::Head);
                InputAction::Continue
            }
            KeyCode::End => {
                self.textarea.move_cursor(CursorMove::End);
                InputAction::Continue
            }
            _ => InputAction::Continue,
        }
    }

    /// 渲染输入框；只有获得焦点的字段显示光标
    pub fn render(&mut self, f: &mut Frame, area: Rect, palette: &Palette, focused: bool) {
        self.textarea
            .set_style(Style::default().fg(palette.fg).bg(palette.surface));
        self.textarea.set_cursor_line_style(Style::default());
        if focused {
            self.textarea
                .set_cursor_style(Style::default().fg(palette.bg).bg(palette.accent));
        } else {
            self.textarea
                .set_cursor_style(Style::default().fg(palette.fg).bg(palette.surface));
        }

        f.render_widget(&self.textarea, area);
    }
}
