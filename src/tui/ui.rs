//! Screen layout for the chat TUI

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, Paragraph, Widget, Wrap},
    Frame,
};

use super::app::{App, Connection, Pane};
use super::compose;
use super::messages;
use super::sidebar;

/// Width of the user list in the wide layout.
const SIDEBAR_WIDTH: u16 = 24;

fn connection_indicator(connection: &Connection) -> (&'static str, Color) {
    match connection {
        Connection::Online => ("*", Color::Green),
        Connection::Connecting => ("~", Color::Yellow),
        Connection::Offline(_) => ("o", Color::Red),
    }
}

pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();

    let [header_area, main_area, status_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Fill(1),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(header_area, frame.buffer_mut(), app);

    let panes = app.visible_panes();
    let content_area = if panes.contains(&Pane::Users) && panes.contains(&Pane::Messages) {
        let [sidebar_area, content_area] =
            Layout::horizontal([Constraint::Length(SIDEBAR_WIDTH), Constraint::Fill(1)])
                .areas(main_area);
        render_sidebar(sidebar_area, frame.buffer_mut(), app);
        Some(content_area)
    } else if panes.contains(&Pane::Users) {
        render_sidebar(main_area, frame.buffer_mut(), app);
        None
    } else {
        Some(main_area)
    };

    if let Some(content_area) = content_area {
        let [messages_area, compose_area] = Layout::vertical([
            Constraint::Fill(1),
            Constraint::Length(compose::COMPOSE_HEIGHT),
        ])
        .areas(content_area);

        let partner = app.session.highlighted_user().map(|u| u.username.as_str());
        let title = match partner {
            Some(name) => format!("Chat with {}", name),
            None => "No conversation".to_string(),
        };

        messages::render(
            messages_area,
            frame.buffer_mut(),
            app.session.view(),
            &app.messages,
            &title,
            app.active_pane == Pane::Messages,
        );
        compose::render(
            compose_area,
            frame,
            &app.compose,
            partner,
            app.active_pane == Pane::Compose,
        );
    }

    render_status(status_area, frame.buffer_mut(), app);

    if let Some(ref text) = app.alert {
        render_alert(frame, text);
    }
}

fn render_sidebar(area: Rect, buf: &mut Buffer, app: &App) {
    sidebar::render(
        area,
        buf,
        app.session.directory(),
        &app.sidebar,
        app.session.highlighted(),
        app.active_pane == Pane::Users,
    );
}

fn render_header(area: Rect, buf: &mut Buffer, app: &App) {
    let title = " duochat";
    let (symbol, color) = connection_indicator(&app.connection);
    let user = format!(" {} {} ", symbol, app.session.me().username);

    let padding = (area.width as usize).saturating_sub(title.len() + user.chars().count());

    let line = Line::from(vec![
        Span::styled(
            title,
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" ".repeat(padding)),
        Span::styled(user, Style::default().fg(color)),
    ]);

    Paragraph::new(line)
        .style(Style::default().bg(Color::DarkGray))
        .render(area, buf);
}

fn render_status(area: Rect, buf: &mut Buffer, app: &App) {
    let bar = Style::default().bg(Color::DarkGray);

    if let Some((ref msg, is_error)) = app.status {
        let color = if is_error { Color::Red } else { Color::Green };
        Paragraph::new(Line::from(Span::styled(
            format!(" {} ", msg),
            Style::default().fg(color),
        )))
        .style(bar)
        .render(area, buf);
        return;
    }

    let (symbol, color) = connection_indicator(&app.connection);
    let connection = match &app.connection {
        Connection::Online => "connected".to_string(),
        Connection::Connecting => "connecting".to_string(),
        Connection::Offline(reason) => format!("offline: {}", reason),
    };
    let sep = Span::styled(" | ", Style::default().fg(Color::Gray));

    let mut spans = vec![
        Span::styled(format!(" {} {}", symbol, connection), Style::default().fg(color)),
        sep.clone(),
        Span::styled(
            format!("Tab: {}", app.active_pane.as_str()),
            Style::default().fg(Color::Cyan),
        ),
        sep.clone(),
        Span::styled(
            "C-a attach  C-l logout  Esc back  C-c quit",
            Style::default().fg(Color::Gray),
        ),
    ];
    if let Some(ref log) = app.last_log {
        spans.push(sep);
        spans.push(Span::styled(
            log.trim().to_string(),
            Style::default().fg(Color::DarkGray),
        ));
    }

    Paragraph::new(Line::from(spans)).style(bar).render(area, buf);
}

/// Centered popup for blocking notices.
fn render_alert(frame: &mut Frame, text: &str) {
    let area = frame.area();
    let width = (text.chars().count() as u16 + 6).max(20).min(area.width);
    let height = 5.min(area.height);
    let popup = Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    );

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Double)
        .border_style(Style::default().fg(Color::Red))
        .title(" Alert ");

    let body = Paragraph::new(vec![
        Line::from(Span::styled(
            text.to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled("[Enter] OK", Style::default().fg(Color::Gray))),
    ])
    .alignment(Alignment::Center)
    .wrap(Wrap { trim: true })
    .block(block);

    frame.render_widget(Clear, popup);
    frame.render_widget(body, popup);
}
