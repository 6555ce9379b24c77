//! Chart export to PNG (plotters bitmap backend).

use crate::chart_data::ChartProjection;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use std::path::{Path, PathBuf};

/// Bounds and labels for rendering the chart to a file.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartExportBounds {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
    /// X-axis column name (for axis label).
    pub x_label: String,
    /// Y-axis column name(s), e.g. "col" or "a, b" (for axis label).
    pub y_label: String,
}

impl ChartExportBounds {
    /// Bounds covering every point of the projection, widened when a range is degenerate.
    pub fn from_projection(projection: &ChartProjection) -> Option<Self> {
        let (x_min, x_max, y_min, y_max) = projection.bounds()?;
        let (x_min, x_max) = widen(x_min, x_max);
        let (y_min, y_max) = widen(y_min, y_max);
        Some(Self {
            x_min,
            x_max,
            y_min,
            y_max,
            x_label: projection.axis_label.clone(),
            y_label: projection
                .series
                .iter()
                .map(|s| s.column.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        })
    }
}

fn widen(min: f64, max: f64) -> (f64, f64) {
    if max > min {
        (min, max)
    } else {
        let pad = if min == 0.0 { 1.0 } else { min.abs() * 0.05 };
        (min - pad, max + pad)
    }
}

/// `<stem>-chart-<timestamp>.png` in the current directory.
pub fn default_export_path(source: Option<&Path>) -> PathBuf {
    let stem = source
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .map(|n| n.split('.').next().unwrap_or(n).to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "sheetplot".to_string());
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    PathBuf::from(format!("{}-chart-{}.png", stem, stamp))
}

/// Write the projection as a line chart PNG of `size` pixels.
pub fn write_chart_png(path: &Path, projection: &ChartProjection, size: (u32, u32)) -> Result<()> {
    use plotters::prelude::*;

    let bounds =
        ChartExportBounds::from_projection(projection).ok_or_else(|| eyre!("No data to export"))?;

    let root = BitMapBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .margin(30)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(bounds.x_min..bounds.x_max, bounds.y_min..bounds.y_max)?;

    let labels_from_axis = !projection.axis_numeric;
    let x_formatter = |x: &f64| {
        if labels_from_axis && *x >= 0.0 && x.fract() == 0.0 {
            projection.axis_label_at(*x as usize)
        } else {
            crate::ingest::row::format_number(*x)
        }
    };

    chart
        .configure_mesh()
        .x_desc(bounds.x_label.as_str())
        .y_desc(bounds.y_label.as_str())
        .x_label_formatter(&x_formatter)
        .draw()?;

    for (idx, series) in projection.series.iter().enumerate() {
        let points = projection.points(idx);
        if points.is_empty() {
            continue;
        }
        let color = RGBColor(series.color.0, series.color.1, series.color.2);
        chart
            .draw_series(LineSeries::new(points, color.stroke_width(2)))?
            .label(series.column.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}
