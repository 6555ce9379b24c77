use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    widgets::Widget,
};
use tui_textarea::{CursorMove, Input, Key, TextArea};

/// Event emitted by TextInput widget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextInputEvent {
    None,
    Submit,
    Cancel,
    HistoryChanged,
}

/// Single-line text input wrapping tui-textarea, with Up/Down history recall.
pub struct TextInput {
    textarea: TextArea<'static>,
    value: String,
    /// Entries oldest first
    history: Vec<String>,
    history_index: Option<usize>,
    history_temp: Option<String>,
    text_color: Option<Color>,
    focused: bool,
}

impl TextInput {
    pub fn new() -> Self {
        let mut input = Self {
            textarea: TextArea::default(),
            value: String::new(),
            history: Vec::new(),
            history_index: None,
            history_temp: None,
            text_color: None,
            focused: false,
        };
        input.apply_style();
        input
    }

    pub fn with_text_color(mut self, color: Color) -> Self {
        self.text_color = Some(color);
        self.apply_style();
        self
    }

    /// Replace the recall list (oldest first)
    pub fn set_history(&mut self, history: Vec<String>) {
        self.history = history;
        self.history_index = None;
        self.history_temp = None;
    }

    fn apply_style(&mut self) {
        let mut style = Style::default();
        if let Some(color) = self.text_color {
            style = style.fg(color);
        }
        self.textarea.set_style(style);
        self.textarea.set_cursor_line_style(Style::default());
        let cursor_style = if self.focused {
            Style::default().add_modifier(Modifier::REVERSED)
        } else {
            style
        };
        self.textarea.set_cursor_style(cursor_style);
    }

    pub fn set_focused(&mut self, focused: bool) {
        self.focused = focused;
        self.apply_style();
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Replace the text; the cursor moves to the end.
    pub fn set_value(&mut self, value: String) {
        let single_line = value.replace(['\n', '\r'], " ");
        self.textarea = TextArea::new(vec![single_line.clone()]);
        self.value = single_line;
        self.apply_style();
        self.textarea.move_cursor(CursorMove::End);
    }

    pub fn clear(&mut self) {
        self.set_value(String::new());
        self.history_index = None;
        self.history_temp = None;
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    fn navigate_history_up(&mut self) {
        if self.history.is_empty() {
            return;
        }
        if self.history_index.is_none() {
            self.history_temp = Some(self.value.clone());
        }
        let index = match self.history_index {
            Some(i) => i.saturating_sub(1),
            None => self.history.len() - 1,
        };
        self.history_index = Some(index);
        if let Some(entry) = self.history.get(index).cloned() {
            self.set_value(entry);
        }
    }

    fn navigate_history_down(&mut self) {
        let Some(current) = self.history_index else {
            return;
        };
        if current + 1 >= self.history.len() {
            let temp = self.history_temp.take().unwrap_or_default();
            self.history_index = None;
            self.set_value(temp);
        } else {
            self.history_index = Some(current + 1);
            if let Some(entry) = self.history.get(current + 1).cloned() {
                self.set_value(entry);
            }
        }
    }

    pub fn handle_key(&mut self, event: &KeyEvent) -> TextInputEvent {
        match event.code {
            KeyCode::Enter => TextInputEvent::Submit,
            KeyCode::Esc => TextInputEvent::Cancel,
            KeyCode::Up => {
                self.navigate_history_up();
                TextInputEvent::HistoryChanged
            }
            KeyCode::Down => {
                self.navigate_history_down();
                TextInputEvent::HistoryChanged
            }
            _ => {
                self.textarea.input(key_event_to_input(event));
                self.value = self.textarea.lines().first().cloned().unwrap_or_default();
                self.history_index = None;
                self.history_temp = None;
                TextInputEvent::None
            }
        }
    }
}

impl Default for TextInput {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert crossterm KeyEvent to tui_textarea::Input
fn key_event_to_input(event: &KeyEvent) -> Input {
    let key = match event.code {
        KeyCode::Char(c) => Key::Char(c),
        KeyCode::Backspace => Key::Backspace,
        KeyCode::Left => Key::Left,
        KeyCode::Right => Key::Right,
        KeyCode::Home => Key::Home,
        KeyCode::End => Key::End,
        KeyCode::Delete => Key::Delete,
        KeyCode::Tab | KeyCode::BackTab => Key::Tab,
        _ => Key::Null,
    };
    Input {
        key,
        ctrl: event.modifiers.contains(KeyModifiers::CONTROL),
        alt: event.modifiers.contains(KeyModifiers::ALT),
        shift: event.modifiers.contains(KeyModifiers::SHIFT),
    }
}

impl Widget for &TextInput {
    fn render(self, area: Rect, buf: &mut ratatui::buffer::Buffer) {
        self.textarea.render(area, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_typing_updates_value() {
        let mut input = TextInput::new();
        for c in "a.csv".chars() {
            assert_eq!(input.handle_key(&key(KeyCode::Char(c))), TextInputEvent::None);
        }
        assert_eq!(input.value(), "a.csv");
        input.handle_key(&key(KeyCode::Backspace));
        assert_eq!(input.value(), "a.cs");
        assert_eq!(input.handle_key(&key(KeyCode::Enter)), TextInputEvent::Submit);
        assert_eq!(input.handle_key(&key(KeyCode::Esc)), TextInputEvent::Cancel);
    }

    #[test]
    fn test_history_navigation_restores_draft() {
        let mut input = TextInput::new();
        input.set_history(vec!["old.csv".into(), "new.csv".into()]);
        input.set_value("draft".into());

        input.handle_key(&key(KeyCode::Up));
        assert_eq!(input.value(), "new.csv");
        input.handle_key(&key(KeyCode::Up));
        assert_eq!(input.value(), "old.csv");
        input.handle_key(&key(KeyCode::Up));
        assert_eq!(input.value(), "old.csv");
        input.handle_key(&key(KeyCode::Down));
        assert_eq!(input.value(), "new.csv");
        input.handle_key(&key(KeyCode::Down));
        assert_eq!(input.value(), "draft");
    }

    #[test]
    fn test_clear() {
        let mut input = TextInput::new();
        input.set_value("hello".to_string());
        assert!(!input.is_empty());
        input.clear();
        assert!(input.is_empty());
    }
}
