use chrono::{DateTime, Local, Utc};
use ratatui::{
    layout::{Alignment, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    Frame,
};

use super::theme::Palette;
use crate::app::App;
use crate::deadline::{format_deadline_display, is_created_today, RemainingTime};
use crate::models::Task;

/// 渲染任务列表
pub fn render(f: &mut Frame, area: Rect, app: &App, now: DateTime<Utc>) {
    let palette = &app.palette;
    let tasks = app.visible_tasks();

    let title = format!(" {} ({}) ", app.filter.label(), tasks.len());
    let block = Block::default()
        .title(title)
        .title_alignment(Alignment::Left)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.border))
        .border_type(ratatui::widgets::BorderType::Rounded)
        .style(Style::default().bg(palette.bg));

    if tasks.is_empty() {
        let message = match app.filter {
            crate::app::Filter::Completed => "No completed tasks yet",
            _ => "No tasks. Press a to add one",
        };
        let paragraph = Paragraph::new(message)
            .block(block)
            .alignment(Alignment::Center)
            .style(Style::default().fg(palette.muted));
        f.render_widget(paragraph, area);
        return;
    }

    let items: Vec<ListItem> = tasks
        .iter()
        .enumerate()
        .map(|(i, task)| task_item(task, i == app.selected, now, palette))
        .collect();

    let mut state = ListState::default();
    state.select(Some(app.selected));

    let list = List::new(items).block(block);
    f.render_stateful_widget(list, area, &mut state);
}

fn task_item<'a>(task: &'a Task, is_selected: bool, now: DateTime<Utc>, palette: &Palette) -> ListItem<'a> {
    let remaining = task.remaining(now);

    let selection_indicator = if is_selected {
        Span::styled("▶ ", Style::default().fg(palette.accent))
    } else {
        Span::raw("  ")
    };

    let checkbox = if task.completed {
        Span::styled("[x] ", Style::default().fg(palette.success))
    } else {
        Span::styled("[ ] ", Style::default().fg(palette.muted))
    };

    let title_style = if task.completed {
        Style::default()
            .fg(palette.muted)
            .add_modifier(Modifier::CROSSED_OUT)
    } else {
        Style::default().fg(palette.fg)
    };

    let mut first_line = vec![
        Span::raw(" "),
        selection_indicator,
        checkbox,
        Span::styled(task.title.as_str(), title_style),
    ];
    if is_created_today(task.created_at, now, &Local) {
        first_line.push(Span::styled("  new", Style::default().fg(palette.accent)));
    }

    let mut second_line = vec![Span::raw("       ")];
    if let Some(deadline) = task.deadline {
        second_line.push(Span::styled(
            format!("{}  ", format_deadline_display(deadline, &Local)),
            Style::default().fg(palette.muted),
        ));
    }
    if !task.completed {
        second_line.push(Span::styled(remaining.list_label(), remaining_style(&remaining, palette)));
    }

    let style = if is_selected {
        Style::default()
            .bg(palette.selected_bg)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };

    ListItem::new(vec![Line::from(first_line), Line::from(second_line)]).style(style)
}

/// 剩余时间的颜色：过期红色，最后一天黄色
pub fn remaining_style(remaining: &RemainingTime, palette: &Palette) -> Style {
    match remaining {
        RemainingTime::Overdue => Style::default()
            .fg(palette.danger)
            .add_modifier(Modifier::BOLD),
        RemainingTime::Remaining { days: 0, .. } => Style::default().fg(palette.warning),
        r if r.is_last_day() => Style::default().fg(palette.warning),
        _ => Style::default().fg(palette.success),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remaining_style() {
        let palette = Palette::dark();
        assert_eq!(
            remaining_style(&RemainingTime::Overdue, &palette).fg,
            Some(palette.danger)
        );
        let last_day = RemainingTime::Remaining {
            days: 1,
            hours: 1,
            minutes: 0,
            last_day: true,
        };
        assert_eq!(remaining_style(&last_day, &palette).fg, Some(palette.warning));
        let plenty = RemainingTime::Remaining {
            days: 5,
            hours: 0,
            minutes: 0,
            last_day: false,
        };
        assert_eq!(remaining_style(&plenty, &palette).fg, Some(palette.success));
    }
}
