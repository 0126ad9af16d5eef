use std::path::PathBuf;
use thiserror::Error;

/// Every way a positional-variance computation or rendering can fail.
///
/// Validation variants are produced before any array is indexed, so a caller
/// never observes a partially built figure. `RenderSinkFailure` is the only
/// variant that can occur after the matrices exist.
#[derive(Error, Debug)]
pub enum PositionalVarianceError {
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Degenerate input: {0}")]
    DegenerateInput(String),

    #[error(
        "Subtype proportion for subtype {subtype}, draw {draw} must be finite and \
         non-negative, but was {value}."
    )]
    InvalidWeight {
        subtype: usize,
        draw: usize,
        value: f64,
    },

    #[error("Invalid severity schema for biomarker {biomarker}: {reason}")]
    InvalidSchema { biomarker: usize, reason: String },

    #[error(
        "Draw {draw} of subtype {subtype} is not a permutation of the {n_events} events: {reason}"
    )]
    InvalidSequence {
        subtype: usize,
        draw: usize,
        n_events: usize,
        reason: String,
    },

    #[error(
        "The severity schema defines {found} distinct severity levels, but colours are \
         only defined for {supported}."
    )]
    UnsupportedSeverityLevels { found: usize, supported: usize },

    #[error("Invalid display option: {0}")]
    InvalidOption(String),

    #[error("Failed to render figure to '{}': {message}", path.display())]
    RenderSinkFailure { path: PathBuf, message: String },
}

pub type Result<T> = std::result::Result<T, PositionalVarianceError>;
