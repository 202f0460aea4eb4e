use chrono::{DateTime, Local, Utc};
use ratatui::{
    layout::{Alignment, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use super::theme::Palette;
use crate::deadline::{detailed_time_left, DetailedTimeLeft};
use crate::models::Task;

/// 渲染任务详情面板
pub fn render(f: &mut Frame, area: Rect, task: Option<&Task>, palette: &Palette, now: DateTime<Utc>) {
    let block = Block::default()
        .title(" Details ")
        .title_alignment(Alignment::Left)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.border))
        .border_type(ratatui::widgets::BorderType::Rounded)
        .style(Style::default().bg(palette.bg));

    let Some(task) = task else {
        let paragraph = Paragraph::new("Select a task to see its details")
            .block(block)
            .alignment(Alignment::Center)
            .style(Style::default().fg(palette.muted));
        f.render_widget(paragraph, area);
        return;
    };

    let paragraph = Paragraph::new(detail_lines(task, palette, now))
        .block(block)
        .wrap(Wrap { trim: false });
    f.render_widget(paragraph, area);
}

fn detail_lines<'a>(task: &'a Task, palette: &Palette, now: DateTime<Utc>) -> Vec<Line<'a>> {
    let label = Style::default().fg(palette.muted);
    let value = Style::default().fg(palette.fg);

    let mut lines = vec![
        Line::from(Span::styled(
            task.title.as_str(),
            Style::default().fg(palette.fg).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];

    if task.completed {
        lines.push(Line::from(Span::styled(
            "✓ Completed",
            Style::default().fg(palette.success),
        )));
    } else {
        lines.extend(time_left_lines(task, palette, now));
    }
    lines.push(Line::from(""));

    if let Some(deadline) = task.deadline {
        lines.push(Line::from(vec![
            Span::styled("Deadline  ", label),
            Span::styled(
                deadline
                    .with_timezone(&Local)
                    .format("%a, %b %-d %Y at %H:%M")
                    .to_string(),
                value,
            ),
        ]));
    }
    lines.push(Line::from(vec![
        Span::styled("Created   ", label),
        Span::styled(
            task.created_at
                .with_timezone(&Local)
                .format("%a, %b %-d %Y at %H:%M")
                .to_string(),
            value,
        ),
    ]));
    if task.id.is_provisional() {
        lines.push(Line::from(Span::styled(
            "Not synced yet",
            Style::default().fg(palette.warning),
        )));
    }

    if !task.description.is_empty() {
        lines.push(Line::from(""));
        for line in task.description.lines() {
            lines.push(Line::from(Span::styled(line, value)));
        }
    }

    lines
}

/// 详情视图：大标题显示 "N days remaining"，下面是精确到分钟的剩余时间
fn time_left_lines(task: &Task, palette: &Palette, now: DateTime<Utc>) -> Vec<Line<'static>> {
    match detailed_time_left(now, task.deadline, &Local) {
        DetailedTimeLeft::NoDeadline => vec![Line::from(Span::styled(
            "No deadline",
            Style::default().fg(palette.muted),
        ))],
        DetailedTimeLeft::Overdue => vec![Line::from(Span::styled(
            "Overdue",
            Style::default()
                .fg(palette.danger)
                .add_modifier(Modifier::BOLD),
        ))],
        detail @ DetailedTimeLeft::Remaining {
            full_days,
            hours,
            minutes,
            ..
        } => {
            let headline_color = if task.remaining(now).is_last_day() || full_days == 0 {
                palette.warning
            } else {
                palette.accent
            };
            vec![
                Line::from(Span::styled(
                    detail.headline().unwrap_or_default(),
                    Style::default()
                        .fg(headline_color)
                        .add_modifier(Modifier::BOLD),
                )),
                Line::from(Span::styled(
                    format!("{}d {}h {}m left", full_days, hours, minutes),
                    Style::default().fg(palette.muted),
                )),
            ]
        }
    }
}
