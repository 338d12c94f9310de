//! Messages pane: the active conversation, newest at the bottom.

use chrono::Local;
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph, Widget},
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::models::{Content, Direction};
use crate::session::{ChatMessage, MessageView};

/// Scroll position, counted in lines up from the newest message.
///
/// At 0 the pane follows new messages as they arrive.
#[derive(Default)]
pub struct MessagesState {
    pub scroll_from_bottom: usize,
}

impl MessagesState {
    pub fn scroll_up(&mut self, lines: usize) {
        self.scroll_from_bottom = self.scroll_from_bottom.saturating_add(lines);
    }

    pub fn scroll_down(&mut self, lines: usize) {
        self.scroll_from_bottom = self.scroll_from_bottom.saturating_sub(lines);
    }

    /// Jump back to the newest message.
    pub fn follow(&mut self) {
        self.scroll_from_bottom = 0;
    }
}

/// Render the messages pane.
pub fn render(
    area: Rect,
    buf: &mut Buffer,
    view: &MessageView,
    state: &MessagesState,
    title: &str,
    focused: bool,
) {
    let border_style = if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let border_type = if focused {
        BorderType::Double
    } else {
        BorderType::Plain
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(border_type)
        .border_style(border_style);
    let inner = block.inner(area);
    block.render(area, buf);

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    let header_area = Rect::new(inner.x, inner.y, inner.width, 1);
    Paragraph::new(Line::from(Span::styled(
        format!(" {} ", title),
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD),
    )))
    .style(Style::default().bg(Color::DarkGray))
    .render(header_area, buf);

    let body = Rect::new(
        inner.x,
        inner.y + 1,
        inner.width,
        inner.height.saturating_sub(1),
    );
    if body.height == 0 {
        return;
    }

    if let Some(notice) = view.notice() {
        let style = match view {
            MessageView::Error(_) => Style::default().fg(Color::Red),
            _ => Style::default().fg(Color::DarkGray),
        };
        let y = body.y + body.height / 2;
        Paragraph::new(Line::from(Span::styled(notice, style)))
            .alignment(Alignment::Center)
            .render(Rect::new(body.x, y, body.width, 1), buf);
        return;
    }

    let lines = build_message_lines(view.messages(), body.width as usize);
    let height = body.height as usize;
    let top = first_visible_line(lines.len(), height, state.scroll_from_bottom);

    for (row, line) in lines.iter().skip(top).take(height).enumerate() {
        let line_area = Rect::new(body.x, body.y + row as u16, body.width, 1);
        Paragraph::new(line.clone()).render(line_area, buf);
    }

    if lines.len() > height {
        let x = body.x + body.width.saturating_sub(1);
        if top > 0 {
            let cell = &mut buf[(x, body.y)];
            cell.set_char('^');
            cell.set_style(Style::default().fg(Color::DarkGray));
        }
        if top + height < lines.len() {
            let cell = &mut buf[(x, body.y + body.height - 1)];
            cell.set_char('v');
            cell.set_style(Style::default().fg(Color::DarkGray));
        }
    }
}

/// Index of the top visible line when `scroll_from_bottom` lines are hidden
/// below the viewport.
fn first_visible_line(total: usize, height: usize, scroll_from_bottom: usize) -> usize {
    let max_top = total.saturating_sub(height);
    max_top.saturating_sub(scroll_from_bottom)
}

/// Sent messages sit on the right, received on the left; each has its sender
/// (and time) above the content.
fn build_message_lines(messages: &[ChatMessage], width: usize) -> Vec<Line<'static>> {
    // Bubbles use at most three quarters of the pane.
    let bubble = (width * 3 / 4).max(10).min(width.saturating_sub(1)).max(1);
    let mut lines = Vec::new();

    for msg in messages {
        let (alignment, name_color) = match msg.direction {
            Direction::Sent => (Alignment::Right, Color::Green),
            Direction::Received => (Alignment::Left, Color::Cyan),
        };

        let mut header = vec![Span::styled(
            msg.sender.clone(),
            Style::default().fg(name_color).add_modifier(Modifier::BOLD),
        )];
        if let Some(at) = msg.sent_at {
            header.push(Span::styled(
                format!("  {}", at.with_timezone(&Local).format("%H:%M")),
                Style::default().fg(Color::DarkGray),
            ));
        }
        lines.push(pad(Line::from(header), alignment));

        for line in content_lines(&msg.content, bubble) {
            lines.push(pad(line, alignment));
        }

        lines.push(Line::from(""));
    }

    lines
}

/// Keep one column clear of the pane edge so the scroll markers never hide text.
fn pad(mut line: Line<'static>, alignment: Alignment) -> Line<'static> {
    match alignment {
        Alignment::Right => line.spans.push(Span::raw(" ")),
        _ => line.spans.insert(0, Span::raw(" ")),
    }
    line.alignment(alignment)
}

fn content_lines(content: &Content, width: usize) -> Vec<Line<'static>> {
    let tag_style = Style::default()
        .fg(Color::Magenta)
        .add_modifier(Modifier::BOLD);
    let url_style = Style::default()
        .fg(Color::Blue)
        .add_modifier(Modifier::UNDERLINED);

    match content {
        Content::Text(text) => wrap_text(text, width)
            .into_iter()
            .map(Line::from)
            .collect(),
        Content::Image { url } | Content::Video { url } => {
            let tag = content.tag().unwrap_or_default();
            let mut wrapped = wrap_text(url, width.saturating_sub(tag.len() + 1));
            let first = if wrapped.is_empty() {
                String::new()
            } else {
                wrapped.remove(0)
            };
            let mut lines = vec![Line::from(vec![
                Span::styled(format!("{} ", tag), tag_style),
                Span::styled(first, url_style),
            ])];
            lines.extend(
                wrapped
                    .into_iter()
                    .map(|l| Line::from(Span::styled(l, url_style))),
            );
            lines
        }
        Content::File { url, name } => {
            let mut lines = vec![Line::from(vec![
                Span::styled("[file] ", tag_style),
                Span::styled(
                    name.clone(),
                    Style::default().add_modifier(Modifier::BOLD),
                ),
            ])];
            lines.extend(
                wrap_text(url, width)
                    .into_iter()
                    .map(|l| Line::from(Span::styled(l, url_style))),
            );
            lines
        }
    }
}

/// Word-wrap to `max_width` columns. Words longer than a line are split.
fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    if max_width == 0 {
        return vec![];
    }
    let mut result = Vec::new();
    for line in text.lines() {
        if line.width() <= max_width {
            result.push(line.to_string());
            continue;
        }

        let mut current = String::new();
        let mut current_w = 0;
        for word in line.split_whitespace() {
            let word_w = word.width();
            if current_w > 0 && current_w + 1 + word_w <= max_width {
                current.push(' ');
                current.push_str(word);
                current_w += 1 + word_w;
                continue;
            }
            if current_w > 0 {
                result.push(std::mem::take(&mut current));
                current_w = 0;
            }
            for c in word.chars() {
                let w = c.width().unwrap_or(0);
                if current_w + w > max_width && current_w > 0 {
                    result.push(std::mem::take(&mut current));
                    current_w = 0;
                }
                current.push(c);
                current_w += w;
            }
        }
        if !current.is_empty() {
            result.push(current);
        }
    }
    result
}
