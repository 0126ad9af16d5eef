// ========================================================================================
//                                In-Memory Figure Model
// ========================================================================================
//
// A figure is fully described before any backend is touched: panel titles, row labels,
// stage ticks and the colour of every cell. Sinks only translate this description into
// pixels, so a failing sink can never alter what the caller receives.

use crate::config::RenderOptions;
use crate::error::{PositionalVarianceError, Result};
use crate::matrix::{PositionalVarianceMatrix, PositionalVarianceSummary, StageBinning};
use crate::palette::{Rgb, SeverityPalette};
use crate::schema::SeveritySchema;
use ndarray::Array2;

/// Height in pixels of the legend strip below the panels.
pub const LEGEND_HEIGHT: u32 = 48;

/// One subtype, or the proportion-weighted combination of all subtypes.
#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    pub title: String,
    /// Caller's subtype index; `None` for the combined panel.
    pub subtype: Option<usize>,
    /// Display-resolution probabilities behind the cells.
    pub matrix: PositionalVarianceMatrix,
    /// Cell colours indexed `[row, display stage]`, rows in biomarker display order.
    pub cells: Array2<Rgb>,
    /// Only the leftmost panel of each grid row carries biomarker labels.
    pub show_row_labels: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegendEntry {
    pub label: String,
    pub colour: Rgb,
}

/// Font sizes and axis wording shared by all panels of a figure.
#[derive(Debug, Clone, PartialEq)]
pub struct FigureStyle {
    pub title_font_size: u32,
    pub label_font_size: u32,
    pub stage_font_size: u32,
    pub stage_label: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Figure {
    pub panels: Vec<Panel>,
    /// Grid shape as (rows, columns).
    pub grid: (usize, usize),
    /// Total size in pixels, legend strip included.
    pub size: (u32, u32),
    /// Biomarker labels in display order.
    pub row_labels: Vec<String>,
    /// Tick label for every display stage; empty strings are not drawn.
    pub stage_ticks: Vec<String>,
    pub legend: Vec<LegendEntry>,
    pub style: FigureStyle,
}

impl Figure {
    pub fn n_rows(&self) -> usize {
        self.row_labels.len()
    }

    pub fn n_stages(&self) -> usize {
        self.stage_ticks.len()
    }
}

/// Grid used to tile `n_panels` panels in one figure.
pub fn grid_shape(n_panels: usize) -> (usize, usize) {
    match n_panels {
        0 | 1 => (1, 1),
        n if n < 3 => (1, n),
        n if n < 7 => (2, n.div_ceil(2)),
        n => (3, n.div_ceil(3)),
    }
}

/// Number of panels drawn in each figure.
pub fn panels_per_figure(n_subtypes: usize, separate_subtypes: bool) -> usize {
    if separate_subtypes { 1 } else { n_subtypes + 1 }
}

/// Pixel size of a figure tiling `grid`: `figure_size` when set, otherwise one
/// `panel_size` per grid cell plus the legend strip.
pub fn figure_size(options: &RenderOptions, grid: (usize, usize)) -> Result<(u32, u32)> {
    let (width, height) = match options.figure_size {
        Some(size) => size,
        None => {
            let (panel_width, panel_height) = options.panel_size;
            let width = u32::try_from(grid.1)
                .ok()
                .and_then(|columns| panel_width.checked_mul(columns));
            let height = u32::try_from(grid.0)
                .ok()
                .and_then(|rows| panel_height.checked_mul(rows))
                .and_then(|body| body.checked_add(LEGEND_HEIGHT));
            match (width, height) {
                (Some(width), Some(height)) => (width, height),
                _ => {
                    return Err(PositionalVarianceError::InvalidOption(format!(
                        "panel_size ({panel_width}, {panel_height}) tiled {}x{} overflows the \
                         figure dimensions",
                        grid.0, grid.1
                    )));
                }
            }
        }
    };
    if width == 0 || height <= LEGEND_HEIGHT {
        return Err(PositionalVarianceError::InvalidOption(format!(
            "figure size ({width}, {height}) leaves no room for panels above the \
             {LEGEND_HEIGHT} px legend"
        )));
    }
    Ok((width, height))
}

/// Builds the panels for every subtype and the combined panel.
///
/// Returns one figure holding every panel, or one figure per panel when
/// `separate_subtypes` is set. Labels and titles must already be validated.
pub fn layout_figures(
    summary: &PositionalVarianceSummary,
    schema: &SeveritySchema,
    palette: &SeverityPalette,
    options: &RenderOptions,
) -> Result<Vec<Figure>> {
    let row_labels = row_labels(&summary.biomarker_order, options);
    let stage_ticks = stage_ticks(&summary.binning, options.stage_interval);
    let legend = legend(schema, palette, options);
    let style = FigureStyle {
        title_font_size: options.title_font_size,
        label_font_size: options.label_font_size,
        stage_font_size: options.stage_font_size,
        stage_label: options.stage_label.clone(),
    };

    let mut panels: Vec<Panel> = summary
        .subtype_order
        .iter()
        .enumerate()
        .map(|(position, &subtype)| {
            let matrix = &summary.subtype_matrices[subtype];
            Panel {
                title: subtype_title(position, summary.mean_proportions[subtype], options),
                subtype: Some(subtype),
                cells: cell_colours(matrix, schema, palette, &summary.biomarker_order),
                matrix: matrix.clone(),
                show_row_labels: true,
            }
        })
        .collect();
    panels.push(Panel {
        title: match options.n_samples {
            Some(n) => format!("All subtypes (n={n})"),
            None => "All subtypes".to_string(),
        },
        subtype: None,
        cells: cell_colours(&summary.combined, schema, palette, &summary.biomarker_order),
        matrix: summary.combined.clone(),
        show_row_labels: true,
    });

    let assemble = |panels: Vec<Panel>| -> Result<Figure> {
        let grid = grid_shape(panels.len());
        let panels = panels
            .into_iter()
            .enumerate()
            .map(|(idx, panel)| Panel {
                show_row_labels: idx % grid.1 == 0,
                ..panel
            })
            .collect();
        Ok(Figure {
            panels,
            grid,
            size: figure_size(options, grid)?,
            row_labels: row_labels.clone(),
            stage_ticks: stage_ticks.clone(),
            legend: legend.clone(),
            style: style.clone(),
        })
    };

    if options.separate_subtypes {
        panels.into_iter().map(|panel| assemble(vec![panel])).collect()
    } else {
        Ok(vec![assemble(panels)?])
    }
}

/// Colours every (biomarker row, stage) cell from the probabilities of that
/// biomarker's events.
pub fn cell_colours(
    matrix: &PositionalVarianceMatrix,
    schema: &SeveritySchema,
    palette: &SeverityPalette,
    biomarker_order: &[usize],
) -> Array2<Rgb> {
    Array2::from_shape_fn((biomarker_order.len(), matrix.n_stages()), |(row, stage)| {
        let biomarker = biomarker_order[row];
        palette.mix(
            schema
                .events_of(biomarker)
                .map(|(event, e)| (e.level, matrix.probability(event, stage))),
        )
    })
}

fn subtype_title(position: usize, proportion: f64, options: &RenderOptions) -> String {
    if let Some(titles) = &options.subtype_titles {
        return titles[position].clone();
    }
    let number = position + 1;
    if options.cross_validated {
        return format!("Subtype {number} cross-validated");
    }
    match options.n_samples {
        Some(n) => format!(
            "Subtype {number} (f={proportion:.2}, n={})",
            (proportion * n as f64).round()
        ),
        None => format!("Subtype {number} (f={proportion:.2})"),
    }
}

fn row_labels(order: &[usize], options: &RenderOptions) -> Vec<String> {
    order
        .iter()
        .map(|&b| match &options.biomarker_labels {
            Some(labels) => labels[b].clone(),
            None => format!("Biomarker {b}"),
        })
        .collect()
}

/// Tick labels are 1-based raw stages; coarsened stages show their raw range.
fn stage_ticks(binning: &StageBinning, interval: usize) -> Vec<String> {
    let interval = interval.max(1);
    (0..binning.n_display())
        .map(|display| {
            if display % interval != 0 {
                return String::new();
            }
            let raw = binning.raw_range(display);
            if raw.len() == 1 {
                format!("{}", raw.start + 1)
            } else {
                format!("{}-{}", raw.start + 1, raw.end)
            }
        })
        .collect()
}

fn legend(
    schema: &SeveritySchema,
    palette: &SeverityPalette,
    options: &RenderOptions,
) -> Vec<LegendEntry> {
    schema
        .levels()
        .iter()
        .enumerate()
        .filter_map(|(idx, &threshold)| {
            palette.colour(idx + 1).map(|colour| LegendEntry {
                label: options.model_variant.threshold_label(threshold),
                colour,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_follows_panel_count() {
        assert_eq!(grid_shape(1), (1, 1));
        assert_eq!(grid_shape(2), (1, 2));
        assert_eq!(grid_shape(3), (2, 2));
        assert_eq!(grid_shape(6), (2, 3));
        assert_eq!(grid_shape(7), (3, 3));
        assert_eq!(grid_shape(10), (3, 4));
    }

    #[test]
    fn figure_size_tiles_panels_above_the_legend() {
        let options = RenderOptions::default();
        assert_eq!(figure_size(&options, (2, 2)).unwrap(), (1280, 720 + LEGEND_HEIGHT));
        assert_eq!(panels_per_figure(3, false), 4);
        assert_eq!(panels_per_figure(3, true), 1);
    }

    #[test]
    fn oversized_panels_are_rejected_instead_of_overflowing() {
        let options = RenderOptions {
            panel_size: (u32::MAX, 10),
            ..RenderOptions::default()
        };
        assert!(figure_size(&options, (1, 1)).is_ok());
        let err = figure_size(&options, (1, 2)).unwrap_err();
        assert!(matches!(err, PositionalVarianceError::InvalidOption(_)));

        let tall = RenderOptions {
            panel_size: (10, u32::MAX),
            ..RenderOptions::default()
        };
        assert!(figure_size(&tall, (1, 1)).is_err());
    }

    #[test]
    fn empty_explicit_figure_sizes_are_rejected() {
        for size in [(0, 600), (800, 0), (800, LEGEND_HEIGHT)] {
            let options = RenderOptions {
                figure_size: Some(size),
                ..RenderOptions::default()
            };
            assert!(figure_size(&options, (1, 1)).is_err(), "{size:?}");
        }
    }

    #[test]
    fn coarse_ticks_show_raw_ranges() {
        let binning = StageBinning::new(6, Some(3)).unwrap();
        assert_eq!(stage_ticks(&binning, 1), vec!["1-2", "3-4", "5-6"]);
        let full = StageBinning::new(4, None).unwrap();
        assert_eq!(stage_ticks(&full, 2), vec!["1", "", "3", ""]);
    }

    #[test]
    fn titles_report_proportion_and_scaled_count() {
        let mut options = RenderOptions {
            n_samples: Some(200),
            ..RenderOptions::default()
        };
        assert_eq!(subtype_title(0, 0.6, &options), "Subtype 1 (f=0.60, n=120)");
        options.n_samples = None;
        assert_eq!(subtype_title(1, 0.25, &options), "Subtype 2 (f=0.25)");
        options.cross_validated = true;
        assert_eq!(subtype_title(2, 0.25, &options), "Subtype 3 cross-validated");
    }
}
