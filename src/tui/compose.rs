//! Compose box: single-line input for messages and attachment paths.

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph},
    Frame,
};
use unicode_width::UnicodeWidthChar;

/// What the input line is currently collecting.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ComposeMode {
    #[default]
    Message,
    /// Path of a file to upload into the active conversation.
    AttachPath,
}

#[derive(Default)]
pub struct ComposeState {
    pub input: String,
    /// Cursor position (character offset into `input`).
    pub cursor_pos: usize,
    pub mode: ComposeMode,
    /// Draft message kept while the attach prompt is open.
    stashed: Option<(String, usize)>,
}

impl ComposeState {
    pub fn insert_char(&mut self, c: char) {
        let byte_pos = self.char_to_byte(self.cursor_pos);
        self.input.insert(byte_pos, c);
        self.cursor_pos += 1;
    }

    /// Delete the character before the cursor.
    pub fn backspace(&mut self) {
        if self.cursor_pos > 0 {
            let byte_pos = self.char_to_byte(self.cursor_pos);
            let prev_byte_pos = self.char_to_byte(self.cursor_pos - 1);
            self.input.drain(prev_byte_pos..byte_pos);
            self.cursor_pos -= 1;
        }
    }

    /// Delete the character under the cursor.
    pub fn delete(&mut self) {
        if self.cursor_pos < self.input.chars().count() {
            let byte_pos = self.char_to_byte(self.cursor_pos);
            let next_byte_pos = self.char_to_byte(self.cursor_pos + 1);
            self.input.drain(byte_pos..next_byte_pos);
        }
    }

    pub fn move_left(&mut self) {
        self.cursor_pos = self.cursor_pos.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        if self.cursor_pos < self.input.chars().count() {
            self.cursor_pos += 1;
        }
    }

    pub fn move_home(&mut self) {
        self.cursor_pos = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor_pos = self.input.chars().count();
    }

    pub fn clear(&mut self) {
        self.input.clear();
        self.cursor_pos = 0;
    }

    /// Open the attach prompt, keeping any draft message aside.
    pub fn start_attach(&mut self) {
        if self.mode == ComposeMode::AttachPath {
            return;
        }
        self.stashed = Some((std::mem::take(&mut self.input), self.cursor_pos));
        self.cursor_pos = 0;
        self.mode = ComposeMode::AttachPath;
    }

    /// Leave the attach prompt and restore the draft.
    pub fn end_attach(&mut self) {
        if self.mode != ComposeMode::AttachPath {
            return;
        }
        let (input, cursor_pos) = self.stashed.take().unwrap_or_default();
        self.input = input;
        self.cursor_pos = cursor_pos;
        self.mode = ComposeMode::Message;
    }

    fn char_to_byte(&self, char_pos: usize) -> usize {
        self.input
            .char_indices()
            .nth(char_pos)
            .map(|(i, _)| i)
            .unwrap_or(self.input.len())
    }
}

/// Border + one input line + border.
pub const COMPOSE_HEIGHT: u16 = 3;

/// Render the compose box. Takes the `Frame` to place the terminal cursor.
pub fn render(
    area: Rect,
    frame: &mut Frame,
    state: &ComposeState,
    partner: Option<&str>,
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
    let title = match state.mode {
        ComposeMode::Message => " Message ",
        ComposeMode::AttachPath => " Attach file (Enter uploads, Esc cancels) ",
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(border_type)
        .border_style(border_style)
        .title(title);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if inner.height == 0 || inner.width == 0 {
        return;
    }
    let input_area = Rect::new(inner.x, inner.y, inner.width, 1);

    if state.input.is_empty() {
        let placeholder = match (state.mode, partner) {
            (ComposeMode::AttachPath, _) => " Path to file...".to_string(),
            (ComposeMode::Message, Some(name)) => format!(" Message {}...", name),
            (ComposeMode::Message, None) => " Select a user to start chatting".to_string(),
        };
        let line = Line::from(Span::styled(
            placeholder,
            Style::default().fg(Color::DarkGray),
        ));
        frame.render_widget(Paragraph::new(line), input_area);
        if focused {
            frame.set_cursor_position((input_area.x + 1, input_area.y));
        }
        return;
    }

    let display = visible_input(&state.input, state.cursor_pos, input_area.width as usize);
    let line = Line::from(Span::styled(
        format!(" {}", display.visible),
        Style::default().fg(Color::White),
    ));
    frame.render_widget(Paragraph::new(line), input_area);

    if focused {
        let x = input_area.x + 1 + display.cursor_offset as u16;
        frame.set_cursor_position((x, input_area.y));
    }
}

struct DisplayText {
    visible: String,
    /// Cursor column within `visible`.
    cursor_offset: usize,
}

/// Scroll the input horizontally so the cursor stays on screen.
fn visible_input(input: &str, cursor_pos: usize, width: usize) -> DisplayText {
    // One column goes to the leading space.
    let avail = width.saturating_sub(1);
    if avail == 0 {
        return DisplayText {
            visible: String::new(),
            cursor_offset: 0,
        };
    }
    let chars: Vec<char> = input.chars().collect();
    let col = |c: &char| c.width().unwrap_or(0);

    let cursor_col: usize = chars.iter().take(cursor_pos).map(col).sum();
    let total: usize = chars.iter().map(col).sum();
    if total < avail {
        return DisplayText {
            visible: input.to_string(),
            cursor_offset: cursor_col,
        };
    }

    // Drop characters from the left until the cursor fits.
    let mut start = 0;
    let mut skipped = 0;
    while cursor_col.saturating_sub(skipped) >= avail && start < chars.len() {
        skipped += col(&chars[start]);
        start += 1;
    }

    let mut visible = String::new();
    let mut used = 0;
    for c in &chars[start..] {
        let w = col(c);
        if used + w > avail {
            break;
        }
        visible.push(*c);
        used += w;
    }

    DisplayText {
        visible,
        cursor_offset: cursor_col.saturating_sub(skipped),
    }
}
