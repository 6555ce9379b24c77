use ratatui::{
    buffer::Buffer,
    layout::Rect,
    widgets::{Paragraph, Widget},
};

#[derive(Default)]
pub struct DebugState {
    pub num_events: usize,
    pub num_frames: usize,
    pub num_key_events: usize,
    pub last_key_event_name: String,
    /// Parser envelopes dropped because they belonged to an older session
    pub stale_envelopes: usize,
    pub num_ticks: usize,
    pub pending_rows: usize,
    pub generation: u64,
    pub enabled: bool,
}

impl DebugState {
    pub fn on_key(&mut self, event: &crossterm::event::KeyEvent) {
        self.num_key_events += 1;
        self.last_key_event_name = format!("{:?}", event.code);
    }
}

impl Widget for &DebugState {
    fn render(self, area: Rect, buf: &mut Buffer) {
        Paragraph::new(format!(
            "events={} keys={} last_key={} frames={} gen={} ticks={} pending={} stale={}",
            self.num_events,
            self.num_key_events,
            self.last_key_event_name,
            self.num_frames,
            self.generation,
            self.num_ticks,
            self.pending_rows,
            self.stale_envelopes
        ))
        .render(area, buf);
    }
}
