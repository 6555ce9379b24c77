//! Project the visible dataset and selection into renderer-agnostic series.

use crate::ingest::row::{format_number, TypedRow, Value};
use crate::selection::{numeric_value, AxisColumn, Selection};
use color_eyre::eyre::eyre;
use color_eyre::Result;

/// Series colors, assigned by position in the selection (index modulo length).
pub const DEFAULT_PALETTE: [&str; 10] = [
    "#AEC6CF", "#FFB347", "#B39EB5", "#77DD77", "#FF6961", "#FDFD96", "#CFCFC4", "#FFD1DC",
    "#B0E0E6", "#E6E6FA",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    /// Parse `#rrggbb`.
    pub fn from_hex(s: &str) -> Result<Self> {
        let s = s.trim();
        if !s.starts_with('#') || s.len() != 7 || !s.is_ascii() {
            return Err(eyre!(
                "Invalid hex color format: '{}'. Expected format: #rrggbb",
                s
            ));
        }
        let component = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&s[range], 16).map_err(|_| eyre!("Invalid hex color: {}", s))
        };
        Ok(Self(component(1..3)?, component(3..5)?, component(5..7)?))
    }

    /// Mix toward `background`; `opacity` 1.0 keeps the color, 0.0 yields the background.
    pub fn blend(self, background: Rgb, opacity: f64) -> Rgb {
        let a = opacity.clamp(0.0, 1.0);
        let mix = |fg: u8, bg: u8| (fg as f64 * a + bg as f64 * (1.0 - a)).round() as u8;
        Rgb(
            mix(self.0, background.0),
            mix(self.1, background.1),
            mix(self.2, background.2),
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Palette {
    colors: Vec<Rgb>,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            colors: DEFAULT_PALETTE
                .iter()
                .filter_map(|hex| Rgb::from_hex(hex).ok())
                .collect(),
        }
    }
}

impl Palette {
    pub fn from_hex<S: AsRef<str>>(colors: &[S]) -> Result<Self> {
        if colors.is_empty() {
            return Err(eyre!("Palette must contain at least one color"));
        }
        let colors = colors
            .iter()
            .map(|c| Rgb::from_hex(c.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { colors })
    }

    pub fn color(&self, idx: usize) -> Rgb {
        self.colors[idx % self.colors.len()]
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }
}

/// One selected column across the visible rows. `None` marks a gap (null or non-numeric text).
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesData {
    pub column: String,
    pub color: Rgb,
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartProjection {
    pub axis_label: String,
    /// Axis value per row: the row index for the synthetic axis, else the column's values
    pub axis: Vec<Value>,
    /// True when every axis value reads as a finite number and can be used as x directly
    pub axis_numeric: bool,
    pub series: Vec<SeriesData>,
    /// 1.0 once ingestion finished; reduced while rows are still streaming in
    pub opacity: f64,
}

/// Build the projection. A series equal to the axis column is not drawn, but keeps its palette
/// slot so colors do not shift when the axis changes.
pub fn project(
    rows: &[TypedRow],
    selection: &Selection,
    palette: &Palette,
    finished: bool,
    streaming_opacity: f64,
) -> ChartProjection {
    let axis: Vec<Value> = match selection.axis() {
        AxisColumn::Index => (0..rows.len()).map(|i| Value::Number(i as f64)).collect(),
        AxisColumn::Column(name) => rows
            .iter()
            .map(|row| row.get(name).cloned().unwrap_or(Value::Null))
            .collect(),
    };
    let axis_numeric = !axis.is_empty()
        && axis
            .iter()
            .all(|v| numeric_value(v).is_some_and(f64::is_finite));

    let series = selection
        .series()
        .iter()
        .enumerate()
        .filter(|(_, column)| selection.axis().column() != Some(column.as_str()))
        .map(|(idx, column)| SeriesData {
            column: column.clone(),
            color: palette.color(idx),
            values: rows
                .iter()
                .map(|row| row.get(column).and_then(numeric_value))
                .collect(),
        })
        .collect();

    ChartProjection {
        axis_label: selection.axis().label().to_string(),
        axis,
        axis_numeric,
        series,
        opacity: if finished {
            1.0
        } else {
            streaming_opacity.clamp(0.0, 1.0)
        },
    }
}

impl ChartProjection {
    pub fn len(&self) -> usize {
        self.axis.len()
    }

    pub fn is_empty(&self) -> bool {
        self.axis.is_empty()
    }

    /// x used for row `i`
    pub fn x(&self, i: usize) -> f64 {
        if self.axis_numeric {
            self.axis.get(i).and_then(numeric_value).unwrap_or(i as f64)
        } else {
            i as f64
        }
    }

    /// Label for row `i` on the x axis
    pub fn axis_label_at(&self, i: usize) -> String {
        match self.axis.get(i) {
            Some(Value::Number(n)) => format_number(*n),
            Some(v) => v.display(),
            None => String::new(),
        }
    }

    /// Finite `(x, y)` points for one series; gaps are skipped.
    pub fn points(&self, series_idx: usize) -> Vec<(f64, f64)> {
        let Some(series) = self.series.get(series_idx) else {
            return Vec::new();
        };
        series
            .values
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.map(|y| (self.x(i), y)))
            .filter(|(x, y)| x.is_finite() && y.is_finite())
            .collect()
    }

    /// `(x_min, x_max, y_min, y_max)` over all series points; `None` when there are none.
    pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        let mut bounds: Option<(f64, f64, f64, f64)> = None;
        for idx in 0..self.series.len() {
            for (x, y) in self.points(idx) {
                bounds = Some(match bounds {
                    None => (x, x, y, y),
                    Some((x0, x1, y0, y1)) => (x0.min(x), x1.max(x), y0.min(y), y1.max(y)),
                });
            }
        }
        bounds
    }
}

/// Keep at most `max` points by taking every n-th one; the last point is always kept.
pub fn decimate(points: &[(f64, f64)], max: usize) -> Vec<(f64, f64)> {
    if max == 0 || points.len() <= max {
        return points.to_vec();
    }
    let step = points.len().div_ceil(max);
    let mut out: Vec<(f64, f64)> = points.iter().step_by(step).copied().collect();
    if let Some(last) = points.last() {
        if out.last() != Some(last) {
            out.push(*last);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::row::{RawRow, Schema};
    use std::sync::Arc;

    fn rows(headers: &[&str], data: &[&[Option<&str>]]) -> Vec<TypedRow> {
        let schema = Arc::new(Schema::new(headers.iter().map(|h| h.to_string()).collect()));
        data.iter()
            .map(|fields| {
                let raw: RawRow = fields.iter().map(|f| f.map(str::to_string)).collect();
                TypedRow::from_raw(&raw, &schema)
            })
            .collect()
    }

    #[test]
    fn test_palette_cycles() {
        let palette = Palette::default();
        assert_eq!(palette.len(), 10);
        assert_eq!(palette.color(0), Rgb(0xAE, 0xC6, 0xCF));
        assert_eq!(palette.color(10), palette.color(0));
        assert_eq!(palette.color(13), palette.color(3));
    }

    #[test]
    fn test_palette_from_hex_rejects_bad_input() {
        assert!(Palette::from_hex::<&str>(&[]).is_err());
        assert!(Palette::from_hex(&["#12345"]).is_err());
        assert!(Palette::from_hex(&["#zzzzzz"]).is_err());
        assert_eq!(
            Palette::from_hex(&["#000000", "#ffffff"]).unwrap().color(3),
            Rgb(255, 255, 255)
        );
    }

    #[test]
    fn test_index_axis_projection() {
        let data = rows(
            &["t", "a", "b"],
            &[
                &[Some("10"), Some("1"), Some("x")],
                &[Some("20"), Some("2.5"), Some("4kg")],
                &[Some("30"), Some(""), None],
            ],
        );
        let mut selection = Selection::new();
        selection.toggle_series("b");
        selection.toggle_series("a");
        let projection = project(&data, &selection, &Palette::default(), false, 0.5);

        assert_eq!(projection.axis_label, "Index");
        assert!(projection.axis_numeric);
        assert_eq!(projection.opacity, 0.5);
        assert_eq!(projection.series.len(), 2);
        assert_eq!(projection.series[0].column, "b");
        assert_eq!(projection.series[0].values, vec![None, Some(4.0), None]);
        assert_eq!(projection.series[1].color, Palette::default().color(1));
        assert_eq!(projection.series[1].values, vec![Some(1.0), Some(2.5), None]);
        assert_eq!(projection.points(1), vec![(0.0, 1.0), (1.0, 2.5)]);
    }

    #[test]
    fn test_column_axis_projection() {
        let data = rows(
            &["t", "a"],
            &[&[Some("10"), Some("1")], &[Some("20"), Some("2")]],
        );
        let mut selection = Selection::new();
        selection.toggle_series("a");
        selection.set_axis(AxisColumn::Column("t".into()));
        let projection = project(&data, &selection, &Palette::default(), true, 0.5);
        assert_eq!(projection.opacity, 1.0);
        assert_eq!(projection.points(0), vec![(10.0, 1.0), (20.0, 2.0)]);
        assert_eq!(projection.bounds(), Some((10.0, 20.0, 1.0, 2.0)));
        assert_eq!(projection.axis_label_at(1), "20");
    }

    #[test]
    fn test_text_axis_falls_back_to_row_index() {
        let data = rows(
            &["day", "a"],
            &[&[Some("mon"), Some("1")], &[Some("tue"), Some("2")]],
        );
        let mut selection = Selection::new();
        selection.set_axis(AxisColumn::Column("day".into()));
        selection.toggle_series("a");
        let projection = project(&data, &selection, &Palette::default(), true, 0.5);
        assert!(!projection.axis_numeric);
        assert_eq!(projection.points(0), vec![(0.0, 1.0), (1.0, 2.0)]);
        assert_eq!(projection.axis_label_at(0), "mon");
    }

    #[test]
    fn test_series_equal_to_axis_is_skipped() {
        let data = rows(&["t", "a"], &[&[Some("1"), Some("2")]]);
        let mut selection = Selection::new();
        selection.toggle_series("t");
        selection.toggle_series("a");
        selection.set_axis(AxisColumn::Column("t".into()));
        let projection = project(&data, &selection, &Palette::default(), true, 0.5);
        assert_eq!(projection.series.len(), 1);
        assert_eq!(projection.series[0].column, "a");
        assert_eq!(projection.series[0].color, Palette::default().color(1));
    }

    #[test]
    fn test_empty_projection_has_no_bounds() {
        let projection = project(&[], &Selection::new(), &Palette::default(), false, 0.5);
        assert!(projection.is_empty());
        assert!(!projection.axis_numeric);
        assert_eq!(projection.bounds(), None);
        assert!(projection.points(0).is_empty());
    }

    #[test]
    fn test_decimate_keeps_last_point() {
        let points: Vec<(f64, f64)> = (0..10).map(|i| (i as f64, i as f64)).collect();
        let out = decimate(&points, 4);
        assert!(out.len() <= 5);
        assert_eq!(out.first(), Some(&(0.0, 0.0)));
        assert_eq!(out.last(), Some(&(9.0, 9.0)));
        assert_eq!(decimate(&points, 100).len(), 10);
    }

    #[test]
    fn test_blend() {
        assert_eq!(Rgb(200, 100, 0).blend(Rgb(0, 0, 0), 0.5), Rgb(100, 50, 0));
        assert_eq!(Rgb(200, 100, 0).blend(Rgb(0, 0, 0), 1.0), Rgb(200, 100, 0));
    }
}
