use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use super::dialogs::centered_rect;
use super::theme::Palette;

/// 渲染帮助面板
pub fn render(f: &mut Frame, area: Rect, palette: &Palette) {
    let popup_area = centered_rect(70, 70, area);
    f.render_widget(Clear, popup_area);

    let block = Block::default()
        .title(" Keyboard shortcuts (Esc or ? to close) ")
        .title_alignment(Alignment::Center)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.accent))
        .border_type(ratatui::widgets::BorderType::Rounded)
        .style(Style::default().bg(palette.bg));

    let inner = block.inner(popup_area);
    f.render_widget(block, popup_area);

    // 两列：导航 | 任务操作
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(inner);

    let navigation = section(
        "Navigation",
        &[
            ("j, ↓", "next task"),
            ("k, ↑", "previous task"),
            ("g / G", "first / last task"),
            ("Tab", "Active / Completed / All"),
            ("?", "this help"),
            ("q", "quit"),
        ],
        palette,
    );
    let tasks = section(
        "Tasks",
        &[
            ("a", "add task"),
            ("e, Enter", "edit task"),
            ("x, Space", "toggle done"),
            ("d", "delete task"),
            ("y", "copy title and time left"),
            ("r", "sync now"),
            ("t", "light / dark theme"),
        ],
        palette,
    );

    f.render_widget(Paragraph::new(navigation), columns[0]);
    f.render_widget(Paragraph::new(tasks), columns[1]);
}

fn section(title: &'static str, entries: &[(&'static str, &'static str)], palette: &Palette) -> Vec<Line<'static>> {
    let mut lines = vec![
        Line::from(Span::styled(
            title,
            Style::default()
                .fg(palette.warning)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];

    for (key, description) in entries {
        lines.push(Line::from(vec![
            Span::styled(format!("{:<10}", key), Style::default().fg(palette.accent)),
            Span::styled(*description, Style::default().fg(palette.fg)),
        ]));
    }
    lines
}
