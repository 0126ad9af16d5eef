// ========================================================================================
//                          Positional-Variance Diagram Entry Point
// ========================================================================================
//
// `plot_positional_var` runs the whole operation in three phases:
//
// 1.  Validation: the schema, sequences, proportions and display options are checked
//     against each other. Nothing is computed if any check fails.
// 2.  Aggregation and layout: per-subtype and combined matrices, the shared biomarker
//     order, and the in-memory figures.
// 3.  Output: when a save path is configured, every figure goes to the sink. A sink
//     failure is logged and returned alongside the figures rather than replacing them.

use crate::config::{ImageFormat, RenderOptions};
use crate::error::{PositionalVarianceError, Result};
use crate::figure::{Figure, figure_size, grid_shape, layout_figures, panels_per_figure};
use crate::matrix::PositionalVarianceSummary;
use crate::render::{BitmapSink, RenderSink, SvgSink};
use crate::samples::{PosteriorSamples, SubtypeProportions};
use crate::schema::SeveritySchema;
use log::{info, warn};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Everything a call produces. The summary and figures are always present; the
/// save result is `Some` only when a save path was configured.
#[derive(Debug)]
pub struct PositionalVarianceOutput {
    pub summary: PositionalVarianceSummary,
    pub figures: Vec<Figure>,
    pub save_result: Option<Result<Vec<PathBuf>>>,
}

impl PositionalVarianceOutput {
    /// Paths written by the sink, or an empty slice if nothing was saved.
    pub fn saved_paths(&self) -> &[PathBuf] {
        match &self.save_result {
            Some(Ok(paths)) => paths,
            _ => &[],
        }
    }
}

/// Builds positional-variance figures and writes them with the file sink matching
/// `options.image_format`.
pub fn plot_positional_var(
    samples: &PosteriorSamples,
    proportions: &SubtypeProportions,
    schema: &SeveritySchema,
    options: &RenderOptions,
) -> Result<PositionalVarianceOutput> {
    match options.image_format {
        ImageFormat::Png => {
            plot_positional_var_with_sink(samples, proportions, schema, options, &mut BitmapSink)
        }
        ImageFormat::Svg => {
            plot_positional_var_with_sink(samples, proportions, schema, options, &mut SvgSink)
        }
    }
}

/// Same as `plot_positional_var`, but sends figures to a caller-supplied sink.
pub fn plot_positional_var_with_sink(
    samples: &PosteriorSamples,
    proportions: &SubtypeProportions,
    schema: &SeveritySchema,
    options: &RenderOptions,
    sink: &mut dyn RenderSink,
) -> Result<PositionalVarianceOutput> {
    let palette = options.model_variant.palette();
    palette.check_levels(schema.n_levels())?;
    validate_options(schema, samples, options)?;

    let summary = PositionalVarianceSummary::compute(samples, proportions, schema, options)?;
    let figures = layout_figures(&summary, schema, palette, options)?;

    let save_result = options.save_path.as_deref().map(|prefix| {
        let result = save_figures(&figures, prefix, options.separate_subtypes, sink);
        if let Err(e) = &result {
            warn!("Positional-variance figures were computed but not saved: {e}");
        }
        result
    });

    Ok(PositionalVarianceOutput {
        summary,
        figures,
        save_result,
    })
}

/// Sends every figure to `sink`, naming destinations after `prefix`.
///
/// A combined figure goes to `{prefix}_all-subtypes`. Separated figures go to
/// `{prefix}_subtype{i}` in panel order, with the combined panel at `{prefix}_combined`.
pub fn save_figures(
    figures: &[Figure],
    prefix: &Path,
    separate_subtypes: bool,
    sink: &mut dyn RenderSink,
) -> Result<Vec<PathBuf>> {
    figures
        .iter()
        .enumerate()
        .map(|(idx, figure)| {
            let suffix = if !separate_subtypes {
                "_all-subtypes".to_string()
            } else if figure.panels.iter().all(|panel| panel.subtype.is_none()) {
                "_combined".to_string()
            } else {
                format!("_subtype{idx}")
            };
            let path = sink.render(figure, &with_suffix(prefix, &suffix))?;
            info!("Wrote positional-variance figure to {}", path.display());
            Ok(path)
        })
        .collect()
}

fn with_suffix(prefix: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(prefix.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

fn validate_options(
    schema: &SeveritySchema,
    samples: &PosteriorSamples,
    options: &RenderOptions,
) -> Result<()> {
    if let Some(labels) = &options.biomarker_labels {
        if labels.len() != schema.n_biomarkers() {
            return Err(PositionalVarianceError::ShapeMismatch(format!(
                "{} biomarker labels supplied for {} biomarkers",
                labels.len(),
                schema.n_biomarkers()
            )));
        }
        if options.biomarker_order.is_some() {
            warn!(
                "Both biomarker labels and an explicit order were given; labels follow the order."
            );
        }
    }
    if let Some(titles) = &options.subtype_titles {
        if titles.len() != samples.n_subtypes() {
            return Err(PositionalVarianceError::InvalidOption(format!(
                "{} subtype titles supplied for {} subtypes",
                titles.len(),
                samples.n_subtypes()
            )));
        }
    }
    if options.stage_interval == 0 {
        return Err(PositionalVarianceError::InvalidOption(
            "stage_interval must be positive".to_string(),
        ));
    }
    let (width, height) = options.panel_size;
    if width == 0 || height == 0 {
        return Err(PositionalVarianceError::InvalidOption(format!(
            "panel_size must be positive, got ({width}, {height})"
        )));
    }
    let n_panels = panels_per_figure(samples.n_subtypes(), options.separate_subtypes);
    figure_size(options, grid_shape(n_panels))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_is_appended_to_the_prefix() {
        assert_eq!(
            with_suffix(Path::new("out/cohort"), "_all-subtypes"),
            PathBuf::from("out/cohort_all-subtypes")
        );
    }
}
