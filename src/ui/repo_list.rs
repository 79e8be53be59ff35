use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};
use ratatui::Frame;

use crate::app::App;
use crate::avatar::Avatar;
use crate::list::{Row, SentinelKind};
use crate::types::RepoSummary;

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let results = &app.results;

    if results.row_count() == 0 {
        let block = Block::default().borders(Borders::ALL).title("Repositories");
        let message = if results.is_refreshing() {
            "Searching..."
        } else if results.should_show_empty_hint() {
            "Could not load repositories. Press r to try again."
        } else {
            "No repositories found"
        };
        let empty = Paragraph::new(message)
            .block(block)
            .style(Style::default().fg(Color::Gray));
        frame.render_widget(empty, area);
        return;
    }

    let w = area.width.saturating_sub(2) as usize;
    let fixed = 12; // avatar(1) + space(1) + stars(8) + spaces(2)
    let flex = w.saturating_sub(fixed).max(10);

    let items: Vec<ListItem> = (0..results.row_count())
        .filter_map(|position| results.row_at(position).map(|row| (position, row)))
        .map(|(position, row)| match row {
            Row::Repo(repo) => repo_item(app, repo, position == app.selected, flex),
            Row::Sentinel(kind) => sentinel_item(app, kind),
        })
        .collect();

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(
                    "Repositories ({}, {} page{})",
                    results.items().len(),
                    results.session().current_page(),
                    if results.session().current_page() == 1 { "" } else { "s" }
                )),
        )
        .highlight_style(Style::default().bg(Color::DarkGray));

    let mut state = ListState::default()
        .with_offset(app.offset)
        .with_selected(Some(app.selected));

    frame.render_stateful_widget(list, area, &mut state);
}

fn repo_item<'a>(app: &App, repo: &'a RepoSummary, selected: bool, flex: usize) -> ListItem<'a> {
    let style = if selected {
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };

    let avatar = match app.avatar(&repo.owner_avatar_url) {
        Some(Avatar::Ready(_)) => Span::styled("◆", Style::default().fg(Color::Green)),
        Some(Avatar::Pending) => Span::styled("◇", Style::default().fg(Color::DarkGray)),
        Some(Avatar::Failed) | None => Span::styled("·", Style::default().fg(Color::DarkGray)),
    };

    let name = repo.full_name();
    let name_display = if name.chars().count() > flex {
        let cut: String = name.chars().take(flex.saturating_sub(3)).collect();
        format!("{}...", cut)
    } else {
        name
    };

    ListItem::new(Line::from(vec![
        avatar,
        Span::raw(" "),
        Span::styled(format!("{:<flex$}", name_display), style),
        Span::raw("  "),
        Span::styled(
            format!("★ {:>6}", repo.stars),
            Style::default().fg(Color::DarkGray),
        ),
    ]))
}

fn sentinel_item(app: &App, kind: SentinelKind) -> ListItem<'static> {
    let line = match kind {
        SentinelKind::Loading => Line::from(Span::styled(
            format!("{} Loading more...", app.spinner_frame()),
            Style::default().fg(Color::Yellow),
        )),
        SentinelKind::Retry => Line::from(vec![
            Span::styled("↻ ", Style::default().fg(Color::Red)),
            Span::styled(
                "Loading failed. Press Enter to retry",
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            ),
        ]),
    };
    ListItem::new(line)
}
