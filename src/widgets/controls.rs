use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    widgets::{Block, Paragraph, Widget},
};

/// Bottom bar: key hints on the left, load status on the right.
pub struct Controls {
    pub hints: Vec<(&'static str, &'static str)>,
    pub status: Option<String>,
    pub bg_color: Color,
    pub key_color: Color,
    pub label_color: Color,
    pub busy: bool,
    pub throbber_frame: u8,
}

impl Default for Controls {
    fn default() -> Self {
        Self {
            hints: Vec::new(),
            status: None,
            bg_color: Color::Indexed(236),
            key_color: Color::Cyan,
            label_color: Color::White,
            busy: false,
            throbber_frame: 0,
        }
    }
}

impl Controls {
    pub fn new(hints: Vec<(&'static str, &'static str)>) -> Self {
        Self {
            hints,
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_busy(mut self, busy: bool, throbber_frame: u8) -> Self {
        self.busy = busy;
        self.throbber_frame = throbber_frame;
        self
    }

    pub fn with_colors(mut self, bg_color: Color, key_color: Color, label_color: Color) -> Self {
        self.bg_color = bg_color;
        self.key_color = key_color;
        self.label_color = label_color;
        self
    }
}

impl Widget for &Controls {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let no_bg = self.bg_color == Color::Reset;
        if !no_bg {
            Block::default()
                .style(Style::default().bg(self.bg_color))
                .render(area, buf);
        }

        const THROBBER_WIDTH: u16 = 3;
        let status_width = self
            .status
            .as_ref()
            .map(|s| s.chars().count() as u16 + 1)
            .unwrap_or(0);
        let mut available = area
            .width
            .saturating_sub(status_width + THROBBER_WIDTH + 1);

        // Pairs that do not fit are dropped from the right, never shrunk
        let pair_width = |(key, action): &(&str, &str)| -> u16 {
            key.chars().count() as u16 + action.chars().count() as u16 + 2
        };
        let mut n_show = 0;
        for pair in &self.hints {
            let need = pair_width(pair);
            if available < need {
                break;
            }
            available -= need;
            n_show += 1;
        }

        let mut constraints: Vec<Constraint> = self
            .hints
            .iter()
            .take(n_show)
            .flat_map(|(key, action)| {
                [
                    Constraint::Length(key.chars().count() as u16 + 1),
                    Constraint::Length(action.chars().count() as u16 + 1),
                ]
            })
            .collect();
        constraints.push(Constraint::Fill(1));
        constraints.push(Constraint::Length(status_width));
        constraints.push(Constraint::Length(THROBBER_WIDTH));
        let layout = Layout::new(Direction::Horizontal, constraints).split(area);

        let base = if no_bg {
            Style::default()
        } else {
            Style::default().bg(self.bg_color)
        };
        let key_style = base.fg(self.key_color);
        let label_style = base.fg(self.label_color);

        for (i, (key, action)) in self.hints.iter().take(n_show).enumerate() {
            Paragraph::new(*key).style(key_style).render(layout[i * 2], buf);
            Paragraph::new(*action)
                .style(label_style)
                .render(layout[i * 2 + 1], buf);
        }

        let fill_idx = n_show * 2;
        if let Some(status) = &self.status {
            Paragraph::new(status.as_str())
                .style(label_style)
                .right_aligned()
                .render(layout[fill_idx + 1], buf);
        }

        const THROBBER_ASCII: [char; 4] = ['|', '/', '-', '\\'];
        let throbber = if self.busy {
            THROBBER_ASCII[self.throbber_frame as usize % 4].to_string()
        } else {
            " ".to_string()
        };
        Paragraph::new(throbber)
            .style(key_style)
            .centered()
            .render(layout[fill_idx + 2], buf);
    }
}

/// `1234567` -> `1,234,567`
pub fn format_count(n: u64) -> String {
    let s = n.to_string();
    let mut out = String::with_capacity(s.len() + s.len() / 3);
    for (i, ch) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
