// ========================================================================================
//                              Posterior Sample Containers
// ========================================================================================

use crate::error::{PositionalVarianceError, Result};
use crate::schema::SeveritySchema;
use ndarray::{Array1, Array2, Array3, ArrayView1, ArrayView2, Axis};

/// Posterior event orderings for every subtype.
///
/// The array is indexed `[subtype, stage, draw]` and holds the index of the event
/// occupying `stage` in that draw, using the event enumeration of `SeveritySchema`.
#[derive(Debug, Clone)]
pub struct PosteriorSamples {
    sequences: Array3<usize>,
}

impl PosteriorSamples {
    pub fn new(sequences: Array3<usize>) -> Result<Self> {
        let (n_subtypes, n_stages, n_draws) = sequences.dim();
        if n_subtypes == 0 || n_stages == 0 || n_draws == 0 {
            return Err(PositionalVarianceError::DegenerateInput(format!(
                "posterior sequences have shape ({n_subtypes}, {n_stages}, {n_draws}); \
                 every axis must be non-empty"
            )));
        }
        Ok(Self { sequences })
    }

    pub fn n_subtypes(&self) -> usize {
        self.sequences.len_of(Axis(0))
    }

    /// Number of ordinal stages, which equals the number of events.
    pub fn n_stages(&self) -> usize {
        self.sequences.len_of(Axis(1))
    }

    pub fn n_draws(&self) -> usize {
        self.sequences.len_of(Axis(2))
    }

    /// Stage-to-event assignment of one draw.
    pub fn draw(&self, subtype: usize, draw: usize) -> ArrayView1<'_, usize> {
        self.sequences.slice(ndarray::s![subtype, .., draw])
    }

    /// Checks the sequences against the schema before any of them is indexed.
    ///
    /// The stage axis must match the schema's event count, and every draw must
    /// be a permutation of the event indices.
    pub fn validate_against(&self, schema: &SeveritySchema) -> Result<()> {
        let n_events = schema.n_events();
        if self.n_stages() != n_events {
            return Err(PositionalVarianceError::ShapeMismatch(format!(
                "posterior sequences encode {} events, but the severity schema defines {} \
                 ({} biomarkers)",
                self.n_stages(),
                n_events,
                schema.n_biomarkers()
            )));
        }

        let mut seen = vec![false; n_events];
        for subtype in 0..self.n_subtypes() {
            for draw in 0..self.n_draws() {
                seen.iter_mut().for_each(|flag| *flag = false);
                for (stage, &event) in self.draw(subtype, draw).iter().enumerate() {
                    let reason = if event >= n_events {
                        format!("event index {event} at stage {stage} is out of range")
                    } else if seen[event] {
                        format!("event {event} is placed more than once")
                    } else {
                        seen[event] = true;
                        continue;
                    };
                    return Err(PositionalVarianceError::InvalidSequence {
                        subtype,
                        draw,
                        n_events,
                        reason,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Per-draw estimates of each subtype's share of the population, indexed `[subtype, draw]`.
///
/// Values are relative weights: they need not sum to one, but must be finite and
/// non-negative.
#[derive(Debug, Clone)]
pub struct SubtypeProportions {
    values: Array2<f64>,
}

impl SubtypeProportions {
    pub fn new(values: Array2<f64>) -> Result<Self> {
        let (n_subtypes, n_draws) = values.dim();
        if n_subtypes == 0 || n_draws == 0 {
            return Err(PositionalVarianceError::DegenerateInput(format!(
                "subtype proportions have shape ({n_subtypes}, {n_draws}); \
                 both axes must be non-empty"
            )));
        }
        if let Some(((subtype, draw), &value)) = values
            .indexed_iter()
            .find(|(_, v)| !v.is_finite() || **v < 0.0)
        {
            return Err(PositionalVarianceError::InvalidWeight {
                subtype,
                draw,
                value,
            });
        }
        Ok(Self { values })
    }

    /// Accepts proportions laid out `[draw, subtype]`.
    pub fn from_draw_major(values: Array2<f64>) -> Result<Self> {
        Self::new(values.reversed_axes().as_standard_layout().into_owned())
    }

    pub fn n_subtypes(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_draws(&self) -> usize {
        self.values.ncols()
    }

    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    /// Mean proportion of each subtype across draws.
    pub fn mean_per_subtype(&self) -> Array1<f64> {
        self.values.sum_axis(Axis(1)) / self.n_draws() as f64
    }

    pub fn validate_against(&self, samples: &PosteriorSamples) -> Result<()> {
        if self.n_subtypes() != samples.n_subtypes() {
            return Err(PositionalVarianceError::ShapeMismatch(format!(
                "proportions describe {} subtypes, but posterior sequences describe {}",
                self.n_subtypes(),
                samples.n_subtypes()
            )));
        }
        if self.n_draws() != samples.n_draws() {
            return Err(PositionalVarianceError::ShapeMismatch(format!(
                "proportions hold {} draws, but posterior sequences hold {}",
                self.n_draws(),
                samples.n_draws()
            )));
        }
        Ok(())
    }
}
