mod repo_list;

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use crate::app::{App, InputMode};

/// Header and status bar take one line each, the list block two borders.
const CHROME_HEIGHT: u16 = 4;

/// Number of list rows that fit into a terminal of size `area`.
pub fn list_viewport_height(area: Rect) -> usize {
    area.height.saturating_sub(CHROME_HEIGHT) as usize
}

pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(frame.area());

    render_header(frame, app, chunks[0]);
    repo_list::render(frame, app, chunks[1]);
    render_status_bar(frame, app, chunks[2]);
}

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let line = match app.input_mode {
        InputMode::Search => Line::from(vec![
            Span::styled(
                "Search: ",
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw(app.search_input.as_str()),
            Span::styled("█", Style::default().fg(Color::Gray)),
        ]),
        InputMode::Browse => {
            let query = app.results.session().active_query();
            let title = if query.is_everything() {
                "starseek - Top repositories".to_string()
            } else {
                format!("starseek - \"{}\"", query.term())
            };
            let mut spans = vec![Span::styled(
                title,
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            )];
            if !app.filter.is_empty() {
                spans.push(Span::styled(
                    format!("  [{}]", app.filter),
                    Style::default().fg(Color::Gray),
                ));
            }
            Line::from(spans)
        }
    };

    let header = Paragraph::new(line).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let status = if let Some(error) = &app.error {
        Line::from(vec![Span::styled(
            format!("Error: {}", error),
            Style::default().fg(Color::Red),
        )])
    } else if let Some(notice) = &app.notice {
        Line::from(vec![Span::styled(
            notice.as_str(),
            Style::default().fg(Color::Green),
        )])
    } else if app.results.is_refreshing() {
        Line::from(vec![Span::styled(
            format!("{} Searching...", app.spinner_frame()),
            Style::default().fg(Color::Yellow),
        )])
    } else if app.is_loading() {
        Line::from(vec![Span::styled(
            format!(
                "{} Loading page {}...",
                app.spinner_frame(),
                app.results.session().current_page() + 1
            ),
            Style::default().fg(Color::Yellow),
        )])
    } else {
        let help = match app.input_mode {
            InputMode::Search => {
                let min = app.results.min_query_len();
                format!("Enter: search (min {} chars) | Esc: cancel", min)
            }
            InputMode::Browse => {
                "/: search | j/k/g/G: nav | Ctrl+d/u: page | Enter/o: open | y: yank url | r: refresh | q: quit"
                    .to_string()
            }
        };
        Line::from(vec![Span::styled(help, Style::default().fg(Color::Gray))])
    };

    let status_bar = Paragraph::new(status).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(status_bar, area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewport_excludes_chrome() {
        assert_eq!(list_viewport_height(Rect::new(0, 0, 80, 24)), 20);
        assert_eq!(list_viewport_height(Rect::new(0, 0, 80, 3)), 0);
    }
}
