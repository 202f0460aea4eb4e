use crate::app::{App, Filter, Mode};
use chrono::{DateTime, Utc};
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

/// 渲染顶部标题栏：过滤标签和同步状态
pub fn render_header(f: &mut Frame, area: Rect, app: &App, now: DateTime<Utc>) {
    let palette = &app.palette;

    let mut spans = vec![Span::styled(
        " taskdue ",
        Style::default()
            .fg(palette.bg)
            .bg(palette.accent)
            .add_modifier(Modifier::BOLD),
    )];
    spans.push(Span::raw(" "));

    for filter in [Filter::Active, Filter::Completed, Filter::All] {
        let style = if filter == app.filter {
            Style::default()
                .fg(palette.accent)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(palette.muted)
        };
        spans.push(Span::styled(format!(" {} ", filter.label()), style));
    }

    spans.push(Span::raw("   "));
    spans.push(sync_status(app));

    let overdue = app.store.overdue(now).count();
    if overdue > 0 {
        spans.push(Span::raw("   "));
        spans.push(Span::styled(
            format!("{} overdue", overdue),
            Style::default()
                .fg(palette.danger)
                .add_modifier(Modifier::BOLD),
        ));
    }

    let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(palette.surface));
    f.render_widget(paragraph, area);
}

fn sync_status(app: &App) -> Span<'static> {
    let palette = &app.palette;
    let pending = app.store.pending_count();

    if !app.store.has_remote() {
        Span::styled("○ local only", Style::default().fg(palette.muted))
    } else if !app.store.is_online() {
        Span::styled(
            format!("● offline ({} queued)", pending),
            Style::default().fg(palette.warning),
        )
    } else if pending > 0 {
        Span::styled(
            format!("● online ({} queued)", pending),
            Style::default().fg(palette.warning),
        )
    } else {
        Span::styled("● online", Style::default().fg(palette.success))
    }
}

/// 渲染底部状态栏（Helix 风格）
pub fn render(f: &mut Frame, area: Rect, app: &App) {
    let palette = &app.palette;
    let (mode_text, mode_color) = match app.mode {
        Mode::Normal => ("NORMAL", palette.success),
        Mode::Dialog => ("EDIT", palette.warning),
        Mode::Help => ("HELP", palette.accent),
    };

    let key = Style::default().fg(palette.accent);
    let line = Line::from(vec![
        Span::styled(
            format!(" {} ", mode_text),
            Style::default()
                .fg(palette.bg)
                .bg(mode_color)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled("a", key),
        Span::raw(" add  "),
        Span::styled("e", key),
        Span::raw(" edit  "),
        Span::styled("x", key),
        Span::raw(" done  "),
        Span::styled("d", key),
        Span::raw(" delete  "),
        Span::styled("Tab", key),
        Span::raw(" filter  "),
        Span::styled("r", key),
        Span::raw(" sync  "),
        Span::styled("?", key),
        Span::raw(" help  "),
        Span::styled("q", key),
        Span::raw(" quit"),
    ]);

    let paragraph = Paragraph::new(line).style(Style::default().fg(palette.fg).bg(palette.surface));
    f.render_widget(paragraph, area);
}
