//! User list: everyone you can chat with.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph, Widget},
};

use crate::models::{User, UserId};

/// Cursor over the directory. The directory itself lives in the session.
#[derive(Default)]
pub struct SidebarState {
    pub selected: usize,
}

impl SidebarState {
    pub fn move_up(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn move_down(&mut self, count: usize) {
        if self.selected + 1 < count {
            self.selected += 1;
        }
    }

    /// Keep the cursor inside a list of `count` rows.
    pub fn clamp(&mut self, count: usize) {
        self.selected = self.selected.min(count.saturating_sub(1));
    }

    /// Put the cursor on `id`, if it is listed.
    pub fn focus(&mut self, users: &[User], id: UserId) {
        if let Some(pos) = users.iter().position(|u| u.id == id) {
            self.selected = pos;
        }
    }

    pub fn selected_user<'a>(&self, users: &'a [User]) -> Option<&'a User> {
        users.get(self.selected)
    }
}

/// Render the user list. `users` is `None` while the directory loads;
/// `active` marks the partner of the open chat.
pub fn render(
    area: Rect,
    buf: &mut Buffer,
    users: Option<&[User]>,
    state: &SidebarState,
    active: Option<UserId>,
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
        .border_style(border_style)
        .title(" Users ");
    let inner = block.inner(area);
    block.render(area, buf);

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    let Some(users) = users else {
        render_row(
            buf,
            Rect::new(inner.x, inner.y, inner.width, 1),
            " Loading...",
            Style::default().fg(Color::DarkGray),
        );
        return;
    };

    if users.is_empty() {
        render_row(
            buf,
            Rect::new(inner.x, inner.y, inner.width, 1),
            " Nobody else here yet",
            Style::default().fg(Color::DarkGray),
        );
        return;
    }

    let height = inner.height as usize;
    let offset = compute_scroll_offset(state.selected, height, users.len());

    for (row, (idx, user)) in users.iter().enumerate().skip(offset).take(height).enumerate() {
        let selected = idx == state.selected;
        let is_active = active == Some(user.id);

        let cursor = if selected && focused { "\u{25BA}" } else { " " };
        let marker = if is_active { "*" } else { " " };
        let label = format!("{}{} {}", cursor, marker, user.username);

        let style = if selected {
            Style::default()
                .fg(Color::White)
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD)
        } else if is_active {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };

        let area = Rect::new(inner.x, inner.y + row as u16, inner.width, 1);
        render_row(buf, area, &label, style);
    }
}

/// Keep the selected row visible.
fn compute_scroll_offset(selected: usize, height: usize, total: usize) -> usize {
    if total <= height || selected < height {
        return 0;
    }
    selected
        .saturating_sub(height - 1)
        .min(total.saturating_sub(height))
}

/// A full-width row, truncated and padded so the style covers the line.
fn render_row(buf: &mut Buffer, area: Rect, text: &str, style: Style) {
    let width = area.width as usize;
    let truncated: String = text.chars().take(width).collect();
    let pad = width.saturating_sub(truncated.chars().count());
    let line = Line::from(vec![
        Span::styled(truncated, style),
        Span::styled(" ".repeat(pad), style),
    ]);
    Paragraph::new(line).render(area, buf);
}
