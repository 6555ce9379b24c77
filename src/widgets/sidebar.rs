//! Axis and series pickers.

use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, StatefulWidget, Widget},
};

use crate::config::Theme;
use crate::selection::{AxisColumn, Selection};

pub const SIDEBAR_WIDTH: u16 = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SidebarFocus {
    #[default]
    Axis,
    Series,
}

#[derive(Debug, Default)]
pub struct SidebarState {
    pub focus: SidebarFocus,
    pub axis_list: ListState,
    pub series_list: ListState,
}

impl SidebarState {
    pub fn reset(&mut self) {
        self.focus = SidebarFocus::Axis;
        self.axis_list = ListState::default();
        self.series_list = ListState::default();
    }

    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            SidebarFocus::Axis => SidebarFocus::Series,
            SidebarFocus::Series => SidebarFocus::Axis,
        };
    }

    fn focused_list(&mut self) -> &mut ListState {
        match self.focus {
            SidebarFocus::Axis => &mut self.axis_list,
            SidebarFocus::Series => &mut self.series_list,
        }
    }

    /// Move the cursor in the focused list, wrapping at both ends.
    pub fn move_cursor(&mut self, delta: isize, len: usize) {
        let list = self.focused_list();
        if len == 0 {
            list.select(None);
            return;
        }
        let current = list.selected().unwrap_or(0).min(len - 1) as isize;
        let next = (current + delta).rem_euclid(len as isize) as usize;
        list.select(Some(next));
    }

    /// Cursor position in the focused list, clamped to `len`.
    pub fn cursor(&self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        let list = match self.focus {
            SidebarFocus::Axis => &self.axis_list,
            SidebarFocus::Series => &self.series_list,
        };
        Some(list.selected().unwrap_or(0).min(len - 1))
    }
}

/// Renders the axis list (radio) above the series list (checkboxes).
pub struct Sidebar<'a> {
    pub axis_candidates: &'a [AxisColumn],
    pub series_candidates: &'a [String],
    pub selection: &'a Selection,
    /// Terminal color per selected series, in selection order
    pub series_colors: &'a [(String, Color)],
    pub theme: &'a Theme,
}

impl StatefulWidget for Sidebar<'_> {
    type State = SidebarState;

    fn render(self, area: Rect, buf: &mut Buffer, state: &mut SidebarState) {
        let split = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
            .split(area);

        let text = Style::default().fg(self.theme.get("text_primary"));
        let dimmed = Style::default().fg(self.theme.get("dimmed"));
        let active = self.theme.get("sidebar_border_active");
        let inactive = self.theme.get("sidebar_border");
        let block = |title: &'static str, focused: bool| {
            Block::default()
                .borders(Borders::ALL)
                .title(title)
                .border_style(Style::default().fg(if focused { active } else { inactive }))
        };
        let highlight = |focused: bool| {
            if focused {
                Style::default().add_modifier(Modifier::REVERSED)
            } else {
                Style::default()
            }
        };

        let axis_items: Vec<ListItem> = self
            .axis_candidates
            .iter()
            .map(|axis| {
                let mark = if axis == self.selection.axis() {
                    "(*) "
                } else {
                    "( ) "
                };
                ListItem::new(Line::from(vec![
                    Span::styled(mark, dimmed),
                    Span::styled(axis.label().to_string(), text),
                ]))
            })
            .collect();
        let axis_focused = state.focus == SidebarFocus::Axis;
        clamp_selection(&mut state.axis_list, axis_items.len());
        StatefulWidget::render(
            List::new(axis_items)
                .block(block("X Axis", axis_focused))
                .highlight_style(highlight(axis_focused)),
            split[0],
            buf,
            &mut state.axis_list,
        );

        let series_focused = state.focus == SidebarFocus::Series;
        let series_block = block("Series", series_focused);
        if self.series_candidates.is_empty() {
            let inner = series_block.inner(split[1]);
            series_block.render(split[1], buf);
            ratatui::widgets::Paragraph::new("No numeric columns yet")
                .style(dimmed)
                .render(inner, buf);
            return;
        }
        let series_items: Vec<ListItem> = self
            .series_candidates
            .iter()
            .map(|column| {
                let color = self
                    .series_colors
                    .iter()
                    .find(|(name, _)| name == column)
                    .map(|(_, c)| *c);
                let (mark, mark_style) = match color {
                    Some(c) => ("[x] ", Style::default().fg(c)),
                    None => ("[ ] ", dimmed),
                };
                ListItem::new(Line::from(vec![
                    Span::styled(mark, mark_style),
                    Span::styled(column.clone(), text),
                ]))
            })
            .collect();
        clamp_selection(&mut state.series_list, series_items.len());
        StatefulWidget::render(
            List::new(series_items)
                .block(series_block)
                .highlight_style(highlight(series_focused)),
            split[1],
            buf,
            &mut state.series_list,
        );
    }
}

fn clamp_selection(list: &mut ListState, len: usize) {
    match (list.selected(), len) {
        (_, 0) => list.select(None),
        (None, _) => list.select(Some(0)),
        (Some(i), len) if i >= len => list.select(Some(len - 1)),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_wraps() {
        let mut state = SidebarState::default();
        state.move_cursor(-1, 3);
        assert_eq!(state.cursor(3), Some(2));
        state.move_cursor(1, 3);
        assert_eq!(state.cursor(3), Some(0));
        state.toggle_focus();
        assert_eq!(state.focus, SidebarFocus::Series);
        assert_eq!(state.cursor(0), None);
        state.move_cursor(1, 2);
        assert_eq!(state.cursor(2), Some(1));
        assert_eq!(state.cursor(1), Some(0));
    }
}
