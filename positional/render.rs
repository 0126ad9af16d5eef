// ========================================================================================
//                                   Rendering Sinks
// ========================================================================================
//
// A sink accepts a finished `Figure` and a destination identifier. The file sinks draw
// through plotters; the memory sink keeps the figures for callers that want to inspect
// or re-render them without touching the file system.

use crate::config::ImageFormat;
use crate::error::{PositionalVarianceError, Result};
use crate::figure::{Figure, LEGEND_HEIGHT, Panel};
use crate::palette::Rgb;
use plotters::coord::Shift;
use plotters::prelude::*;
use std::ffi::OsString;
use std::fs::create_dir_all;
use std::path::{Path, PathBuf};

pub trait RenderSink {
    /// Renders `figure` to `destination` and returns where it ended up.
    fn render(&mut self, figure: &Figure, destination: &Path) -> Result<PathBuf>;
}

/// Writes PNG files through the plotters bitmap backend.
#[derive(Debug, Default)]
pub struct BitmapSink;

/// Writes SVG files through the plotters SVG backend.
#[derive(Debug, Default)]
pub struct SvgSink;

/// Keeps rendered figures in memory, keyed by destination.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub rendered: Vec<(PathBuf, Figure)>,
}

impl RenderSink for BitmapSink {
    fn render(&mut self, figure: &Figure, destination: &Path) -> Result<PathBuf> {
        let path = prepare_destination(destination, ImageFormat::Png.extension())?;
        {
            let root = BitMapBackend::new(&path, figure.size).into_drawing_area();
            draw_figure(&root, figure).map_err(|e| sink_failure(&path, e))?;
        }
        Ok(path)
    }
}

impl RenderSink for SvgSink {
    fn render(&mut self, figure: &Figure, destination: &Path) -> Result<PathBuf> {
        let path = prepare_destination(destination, ImageFormat::Svg.extension())?;
        {
            let root = SVGBackend::new(&path, figure.size).into_drawing_area();
            draw_figure(&root, figure).map_err(|e| sink_failure(&path, e))?;
        }
        Ok(path)
    }
}

impl RenderSink for MemorySink {
    fn render(&mut self, figure: &Figure, destination: &Path) -> Result<PathBuf> {
        self.rendered.push((destination.to_path_buf(), figure.clone()));
        Ok(destination.to_path_buf())
    }
}

/// Appends the extension rather than replacing one, so dots already in the
/// destination name are kept.
fn prepare_destination(destination: &Path, extension: &str) -> Result<PathBuf> {
    let mut name = OsString::from(destination.as_os_str());
    name.push(".");
    name.push(extension);
    let path = PathBuf::from(name);
    if let Some(parent) = path.parent() {
        create_dir_all(parent).map_err(|e| sink_failure(&path, e))?;
    }
    Ok(path)
}

fn sink_failure(path: &Path, error: impl std::fmt::Display) -> PositionalVarianceError {
    PositionalVarianceError::RenderSinkFailure {
        path: path.to_path_buf(),
        message: error.to_string(),
    }
}

fn to_plotters(colour: Rgb) -> RGBColor {
    let (r, g, b) = colour.to_rgb8();
    RGBColor(r, g, b)
}

fn draw_figure<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    figure: &Figure,
) -> std::result::Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
    root.fill(&WHITE)?;
    let body_height = figure.size.1.saturating_sub(LEGEND_HEIGHT);
    let (body, legend_area) = root.split_vertically(body_height);
    let areas = body.split_evenly(figure.grid);
    for (panel, area) in figure.panels.iter().zip(areas.iter()) {
        draw_panel(area, panel, figure)?;
    }
    draw_legend(&legend_area, figure)?;
    root.present()?;
    Ok(())
}

fn draw_panel<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    panel: &Panel,
    figure: &Figure,
) -> std::result::Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
    let n_rows = figure.n_rows();
    let n_stages = figure.n_stages();
    let style = &figure.style;
    let label_width = if panel.show_row_labels {
        label_area_width(&figure.row_labels, style.label_font_size)
    } else {
        10
    };

    // Segmented axes put one discrete cell per stage and per biomarker. Row 0 is drawn
    // at the top, so the y axis is flipped.
    let mut chart = ChartBuilder::on(area)
        .margin(10)
        .caption(&panel.title, ("sans-serif", style.title_font_size))
        .x_label_area_size(style.stage_font_size.saturating_mul(3).saturating_add(10))
        .y_label_area_size(label_width)
        .build_cartesian_2d(
            (0..n_stages as i32 - 1).into_segmented(),
            (0..n_rows as i32 - 1).into_segmented(),
        )?;

    let stage_tick = |v: &SegmentValue<i32>| match v {
        SegmentValue::CenterOf(k) => figure
            .stage_ticks
            .get(*k as usize)
            .cloned()
            .unwrap_or_default(),
        _ => String::new(),
    };
    let row_label = |v: &SegmentValue<i32>| match v {
        SegmentValue::CenterOf(y) if panel.show_row_labels => n_rows
            .checked_sub(*y as usize + 1)
            .and_then(|row| figure.row_labels.get(row))
            .cloned()
            .unwrap_or_default(),
        _ => String::new(),
    };
    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(n_stages)
        .y_labels(n_rows)
        .x_label_formatter(&stage_tick)
        .y_label_formatter(&row_label)
        .x_desc(style.stage_label.as_str())
        .x_label_style(("sans-serif", style.stage_font_size))
        .y_label_style(("sans-serif", style.label_font_size))
        .axis_desc_style(("sans-serif", style.stage_font_size.saturating_add(2)))
        .draw()?;

    let edge = |idx: usize, len: usize| {
        if idx >= len {
            SegmentValue::Last
        } else {
            SegmentValue::Exact(idx as i32)
        }
    };
    chart.draw_series(panel.cells.indexed_iter().map(|((row, stage), &colour)| {
        let y = n_rows - row - 1;
        Rectangle::new(
            [
                (edge(stage, n_stages), edge(y, n_rows)),
                (edge(stage + 1, n_stages), edge(y + 1, n_rows)),
            ],
            to_plotters(colour).filled(),
        )
    }))?;
    Ok(())
}

/// Pixels reserved for biomarker labels, estimated at 0.6 of the font size per character.
fn label_area_width(labels: &[String], font_size: u32) -> u32 {
    let longest = labels.iter().map(String::len).max().unwrap_or(0);
    let longest = u32::try_from(longest).unwrap_or(u32::MAX);
    (longest.saturating_mul(font_size) / 5).saturating_mul(3).max(20)
}

fn draw_legend<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    figure: &Figure,
) -> std::result::Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
    const SWATCH: i32 = 18;
    const ENTRY_WIDTH: i32 = 120;
    let font = ("sans-serif", figure.style.label_font_size).into_font();
    let top = (LEGEND_HEIGHT as i32 - SWATCH) / 2;
    for (idx, entry) in figure.legend.iter().enumerate() {
        let x = 20 + idx as i32 * ENTRY_WIDTH;
        area.draw(&Rectangle::new(
            [(x, top), (x + SWATCH, top + SWATCH)],
            to_plotters(entry.colour).filled(),
        ))?;
        area.draw(&Rectangle::new(
            [(x, top), (x + SWATCH, top + SWATCH)],
            BLACK.stroke_width(1),
        ))?;
        area.draw(&Text::new(
            entry.label.clone(),
            (x + SWATCH + 6, top + 2),
            font.clone(),
        ))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_is_appended_not_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = prepare_destination(&dir.path().join("cohort.v2_all-subtypes"), "png").unwrap();
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "cohort.v2_all-subtypes.png"
        );
    }

    #[test]
    fn label_area_grows_with_the_longest_label_and_saturates() {
        let labels = vec!["Hippocampus".to_string(), "MMSE".to_string()];
        assert_eq!(label_area_width(&labels, 10), 66);
        assert_eq!(label_area_width(&[], 14), 20);
        assert_eq!(label_area_width(&labels, u32::MAX), u32::MAX / 5 * 3);
    }

    #[test]
    fn palette_colours_map_to_full_intensity_channels() {
        assert_eq!(to_plotters(crate::palette::BLUE), RGBColor(0, 0, 255));
        assert_eq!(to_plotters(crate::palette::MAGENTA), RGBColor(255, 0, 255));
        assert_eq!(to_plotters(crate::palette::RED), RGBColor(255, 0, 0));
    }
}
