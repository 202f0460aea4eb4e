pub mod detail;
pub mod dialogs;
pub mod help;
pub mod list;
mod statusbar;
pub mod text_input;
pub mod theme;

use crate::app::{App, Mode, Notification, NotificationLevel};
use chrono::Utc;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use ratatui::Frame;
use theme::Palette;

/// 主渲染函数
pub fn render(f: &mut Frame, app: &mut App) {
    let now = Utc::now();
    let palette = app.palette;

    f.render_widget(Block::default().style(Style::default().bg(palette.bg)), f.area());

    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // 标题栏
            Constraint::Min(0),    // 主内容区域
            Constraint::Length(1), // 状态栏
        ])
        .split(f.area());

    statusbar::render_header(f, main_chunks[0], app, now);

    // 左侧列表，右侧详情
    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(main_chunks[1]);

    list::render(f, body[0], app, now);
    detail::render(f, body[1], app.selected_task(), &palette, now);

    statusbar::render(f, main_chunks[2], app);

    if let Some(dialog) = app.dialog.as_mut() {
        dialogs::render_dialog(f, dialog, &palette);
    }

    if app.mode == Mode::Help {
        help::render(f, f.area(), &palette);
    }

    if let Some(ref notification) = app.notification {
        render_notification(f, f.area(), notification, &palette);
    }
}

/// 渲染通知栏
fn render_notification(f: &mut Frame, area: Rect, notification: &Notification, palette: &Palette) {
    // 通知栏占据顶部 3 行
    let notification_area = Rect {
        x: area.x,
        y: area.y,
        width: area.width,
        height: area.height.min(3),
    };

    let (color, prefix) = match notification.level {
        NotificationLevel::Info => (palette.accent, "ℹ"),
        NotificationLevel::Success => (palette.success, "✓"),
        NotificationLevel::Warning => (palette.warning, "⚠"),
        NotificationLevel::Error => (palette.danger, "✗"),
    };

    let content = Line::from(vec![
        Span::styled(
            format!(" {} ", prefix),
            Style::default()
                .fg(palette.bg)
                .bg(color)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" "),
        Span::styled(notification.message.as_str(), Style::default().fg(palette.fg)),
    ]);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color))
        .style(Style::default().bg(palette.surface));

    f.render_widget(Clear, notification_area);
    f.render_widget(Paragraph::new(content).block(block), notification_area);
}
