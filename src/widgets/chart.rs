//! Terminal line chart and the load progress gauge.

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Rect},
    style::{Color, Style},
    symbols,
    text::Span,
    widgets::{Axis, Block, Borders, Chart, Dataset, Gauge, GraphType, Paragraph, Widget},
};

use crate::chart_data::{decimate, ChartProjection};
use crate::config::Theme;
use crate::ingest::progress::Progress;
use crate::ingest::row::format_number;
use crate::widgets::controls::format_count;

pub struct ChartView<'a> {
    pub projection: &'a ChartProjection,
    /// Terminal color per projected series, same order as `projection.series`
    pub series_colors: &'a [Color],
    pub theme: &'a Theme,
    pub max_points: usize,
    pub title: String,
}

impl Widget for ChartView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let axis_style = Style::default().fg(self.theme.get("chart_axis"));
        let label_style = Style::default().fg(self.theme.get("text_primary"));
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.theme.get("sidebar_border")))
            .title(self.title.as_str());

        let Some((x_min, x_max, y_min, y_max)) = self.projection.bounds() else {
            let message = if self.projection.series.is_empty() {
                "Select one or more series to plot"
            } else {
                "No numeric values to plot yet"
            };
            let inner = block.inner(area);
            block.render(area, buf);
            let middle = Rect {
                y: inner.y + inner.height / 2,
                height: inner.height.min(1),
                ..inner
            };
            Paragraph::new(message)
                .style(Style::default().fg(self.theme.get("dimmed")))
                .alignment(Alignment::Center)
                .render(middle, buf);
            return;
        };
        let (x_min, x_max) = pad_range(x_min, x_max);
        let (y_min, y_max) = pad_range(y_min, y_max);

        let points: Vec<Vec<(f64, f64)>> = (0..self.projection.series.len())
            .map(|i| decimate(&self.projection.points(i), self.max_points))
            .collect();

        let datasets: Vec<Dataset> = self
            .projection
            .series
            .iter()
            .zip(points.iter())
            .enumerate()
            .map(|(i, (series, data))| {
                let color = self.series_colors.get(i).copied().unwrap_or(Color::Reset);
                Dataset::default()
                    .name(series.column.clone())
                    .marker(symbols::Marker::Braille)
                    .graph_type(GraphType::Line)
                    .style(Style::default().fg(color))
                    .data(data)
            })
            .collect();

        let x_label = |x: f64| {
            if self.projection.axis_numeric {
                format_number(x)
            } else {
                self.projection.axis_label_at(x.round().max(0.0) as usize)
            }
        };
        let x_labels = vec![
            Span::styled(x_label(x_min), label_style),
            Span::styled(x_label((x_min + x_max) / 2.0), label_style),
            Span::styled(x_label(x_max), label_style),
        ];
        let y_labels = vec![
            Span::styled(format_number(y_min), label_style),
            Span::styled(format_number((y_min + y_max) / 2.0), label_style),
            Span::styled(format_number(y_max), label_style),
        ];

        Chart::new(datasets)
            .block(block)
            .x_axis(
                Axis::default()
                    .title(self.projection.axis_label.as_str())
                    .style(axis_style)
                    .bounds([x_min, x_max])
                    .labels(x_labels),
            )
            .y_axis(
                Axis::default()
                    .style(axis_style)
                    .bounds([y_min, y_max])
                    .labels(y_labels),
            )
            .legend_position(Some(ratatui::widgets::LegendPosition::TopRight))
            .render(area, buf);
    }
}

fn pad_range(min: f64, max: f64) -> (f64, f64) {
    if max > min {
        (min, max)
    } else {
        (min - 1.0, max + 1.0)
    }
}

/// One-line gauge: percent when the total is known, otherwise just the row count.
pub struct ProgressGauge<'a> {
    pub progress: Progress,
    pub theme: &'a Theme,
}

impl ProgressGauge<'_> {
    pub fn label(&self) -> String {
        let loaded = format_count(self.progress.loaded as u64);
        match self.progress.percent() {
            _ if self.progress.finished => format!("{} rows loaded", loaded),
            Some(pct) => format!(
                "Loading {} / {} rows ({:.0}%)",
                loaded,
                format_count(self.progress.total),
                pct
            ),
            None => format!("Loading {} rows", loaded),
        }
    }
}

impl Widget for ProgressGauge<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let ratio = if self.progress.finished {
            1.0
        } else {
            self.progress.percent().unwrap_or(0.0) / 100.0
        };
        Gauge::default()
            .gauge_style(Style::default().fg(self.theme.get("progress_bar")))
            .ratio(ratio.clamp(0.0, 1.0))
            .label(self.label())
            .render(area, buf);
    }
}
