// ========================================================================================
//                           Positional-Variance Aggregation
// ========================================================================================
//
// A positional-variance matrix holds, for every event, the fraction of posterior draws
// that place it at each ordinal stage. Matrices are always accumulated at full stage
// resolution and only coarsened afterwards, so ordering decisions never depend on the
// display resolution.

use crate::config::RenderOptions;
use crate::error::{PositionalVarianceError, Result};
use crate::samples::{PosteriorSamples, SubtypeProportions};
use crate::schema::SeveritySchema;
use itertools::Itertools;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use std::ops::Range;

/// Event-by-stage probability table for one subtype or for the weighted combination.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionalVarianceMatrix {
    probabilities: Array2<f64>,
}

impl PositionalVarianceMatrix {
    /// Accumulates the draws of one subtype at full stage resolution.
    pub fn from_draws(samples: &PosteriorSamples, subtype: usize) -> Self {
        let n_stages = samples.n_stages();
        let n_draws = samples.n_draws();
        let mut counts = Array2::<f64>::zeros((n_stages, n_stages));
        for draw in 0..n_draws {
            for (stage, &event) in samples.draw(subtype, draw).iter().enumerate() {
                counts[(event, stage)] += 1.0;
            }
        }
        counts /= n_draws as f64;
        Self {
            probabilities: counts,
        }
    }

    /// Weighted average of `matrices`; weights are normalised by their sum.
    pub fn weighted_mean(
        matrices: &[PositionalVarianceMatrix],
        weights: ArrayView1<'_, f64>,
    ) -> Result<Self> {
        let Some(first) = matrices.first() else {
            return Err(PositionalVarianceError::DegenerateInput(
                "no subtype matrices to combine".to_string(),
            ));
        };
        if weights.len() != matrices.len() {
            return Err(PositionalVarianceError::ShapeMismatch(format!(
                "{} weights supplied for {} subtype matrices",
                weights.len(),
                matrices.len()
            )));
        }
        let total: f64 = weights.sum();
        if !(total > 0.0) {
            return Err(PositionalVarianceError::DegenerateInput(
                "every subtype has zero mean proportion, so subtypes cannot be combined"
                    .to_string(),
            ));
        }

        let mut combined = Array2::<f64>::zeros(first.probabilities.raw_dim());
        for (matrix, &weight) in matrices.iter().zip(weights.iter()) {
            combined.scaled_add(weight / total, &matrix.probabilities);
        }
        Ok(Self {
            probabilities: combined,
        })
    }

    /// Sums raw stages into the display stages of `binning`.
    pub fn coarsen(&self, binning: &StageBinning) -> Self {
        if !binning.is_coarsened() {
            return self.clone();
        }
        let mut coarse = Array2::<f64>::zeros((self.n_events(), binning.n_display()));
        for (raw, column) in self.probabilities.axis_iter(Axis(1)).enumerate() {
            let mut target = coarse.column_mut(binning.display_stage(raw));
            target += &column;
        }
        Self {
            probabilities: coarse,
        }
    }

    pub fn probabilities(&self) -> ArrayView2<'_, f64> {
        self.probabilities.view()
    }

    pub fn probability(&self, event: usize, stage: usize) -> f64 {
        self.probabilities[(event, stage)]
    }

    pub fn n_events(&self) -> usize {
        self.probabilities.nrows()
    }

    pub fn n_stages(&self) -> usize {
        self.probabilities.ncols()
    }

    /// Mean stage index of `event` under this distribution.
    pub fn expected_stage(&self, event: usize) -> f64 {
        self.probabilities
            .row(event)
            .iter()
            .enumerate()
            .map(|(stage, p)| stage as f64 * p)
            .sum()
    }
}

/// Maps raw ordinal stages onto a (possibly coarser) set of display stages.
///
/// Raw stage `k` of `n_raw` lands in display stage `floor(k * n_display / n_raw)`, which
/// gives contiguous bins whose widths differ by at most one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageBinning {
    n_raw: usize,
    n_display: usize,
}

impl StageBinning {
    /// `requested` of `None`, or anything at least `n_raw`, keeps full resolution.
    pub fn new(n_raw: usize, requested: Option<usize>) -> Result<Self> {
        if n_raw == 0 {
            return Err(PositionalVarianceError::DegenerateInput(
                "there are no stages to display".to_string(),
            ));
        }
        let n_display = match requested {
            Some(0) => {
                return Err(PositionalVarianceError::InvalidOption(
                    "display_stages must be positive".to_string(),
                ));
            }
            Some(d) => d.min(n_raw),
            None => n_raw,
        };
        Ok(Self { n_raw, n_display })
    }

    pub fn n_raw(&self) -> usize {
        self.n_raw
    }

    pub fn n_display(&self) -> usize {
        self.n_display
    }

    pub fn is_coarsened(&self) -> bool {
        self.n_display < self.n_raw
    }

    pub fn display_stage(&self, raw: usize) -> usize {
        raw * self.n_display / self.n_raw
    }

    /// Raw stages covered by display stage `display`.
    pub fn raw_range(&self, display: usize) -> Range<usize> {
        let first_raw = |d: usize| (d * self.n_raw).div_ceil(self.n_display);
        first_raw(display)..first_raw(display + 1).min(self.n_raw)
    }
}

/// Everything the figure needs, computed once per call.
#[derive(Debug, Clone)]
pub struct PositionalVarianceSummary {
    /// Display-resolution matrices, indexed by the caller's subtype index.
    pub subtype_matrices: Vec<PositionalVarianceMatrix>,
    /// Proportion-weighted combination of all subtypes at display resolution.
    pub combined: PositionalVarianceMatrix,
    pub mean_proportions: Array1<f64>,
    /// Subtype indices in panel order.
    pub subtype_order: Vec<usize>,
    /// Biomarker indices in top-to-bottom row order, shared by every panel.
    pub biomarker_order: Vec<usize>,
    pub binning: StageBinning,
}

impl PositionalVarianceSummary {
    /// Validates the inputs against each other and aggregates every subtype.
    ///
    /// No array is indexed until all dimension, permutation and weight checks pass.
    pub fn compute(
        samples: &PosteriorSamples,
        proportions: &SubtypeProportions,
        schema: &SeveritySchema,
        options: &RenderOptions,
    ) -> Result<Self> {
        samples.validate_against(schema)?;
        proportions.validate_against(samples)?;
        let n_subtypes = samples.n_subtypes();
        if let Some(order) = options.subtype_order.as_deref() {
            check_permutation("subtype_order", order, n_subtypes)?;
        }
        if let Some(order) = options.biomarker_order.as_deref() {
            check_permutation("biomarker_order", order, schema.n_biomarkers())?;
        }
        let binning = StageBinning::new(schema.n_events(), options.display_stages)?;
        if binning.is_coarsened() {
            log::debug!(
                "Coarsening {} stages into {} display stages",
                binning.n_raw(),
                binning.n_display()
            );
        }

        let raw: Vec<PositionalVarianceMatrix> = (0..n_subtypes)
            .map(|subtype| PositionalVarianceMatrix::from_draws(samples, subtype))
            .collect();
        let mean_proportions = proportions.mean_per_subtype();
        let combined_raw = PositionalVarianceMatrix::weighted_mean(&raw, mean_proportions.view())?;

        let biomarker_order = match options.biomarker_order.as_deref() {
            Some(order) => order.to_vec(),
            None => order_biomarkers(schema, &combined_raw),
        };
        let subtype_order = match options.subtype_order.as_deref() {
            Some(order) => order.to_vec(),
            None => order_subtypes(mean_proportions.view()),
        };

        Ok(Self {
            subtype_matrices: raw.iter().map(|m| m.coarsen(&binning)).collect(),
            combined: combined_raw.coarsen(&binning),
            mean_proportions,
            subtype_order,
            biomarker_order,
            binning,
        })
    }
}

/// Orders biomarkers by the expected stage of their highest threshold, earliest first.
/// Ties keep biomarker index order.
pub fn order_biomarkers(
    schema: &SeveritySchema,
    combined: &PositionalVarianceMatrix,
) -> Vec<usize> {
    (0..schema.n_biomarkers())
        .map(|b| (b, combined.expected_stage(schema.last_event_of(b))))
        .sorted_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(b, _)| b)
        .collect()
}

/// Orders subtypes by descending mean proportion. Ties keep subtype index order.
pub fn order_subtypes(mean_proportions: ArrayView1<'_, f64>) -> Vec<usize> {
    mean_proportions
        .iter()
        .enumerate()
        .sorted_by(|a, b| b.1.total_cmp(a.1))
        .map(|(s, _)| s)
        .collect()
}

fn check_permutation(name: &str, order: &[usize], n: usize) -> Result<()> {
    let mut seen = vec![false; n];
    let valid = order.len() == n
        && order
            .iter()
            .all(|&idx| idx < n && !std::mem::replace(&mut seen[idx], true));
    if !valid {
        return Err(PositionalVarianceError::InvalidOption(format!(
            "{name} must be a permutation of 0..{n}, got {order:?}"
        )));
    }
    Ok(())
}
