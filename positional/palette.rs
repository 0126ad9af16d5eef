// ========================================================================================
//                              Severity Colour Encoding
// ========================================================================================
//
// There is exactly one severity palette in the crate. Every model variant and every
// panel borrows the same static table, so the colours cannot drift between call paths.

use crate::error::{PositionalVarianceError, Result};
use serde::{Deserialize, Serialize};

/// An RGB colour with channels in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgb(pub [f64; 3]);

impl Rgb {
    pub const WHITE: Rgb = Rgb([1.0, 1.0, 1.0]);

    /// Converts to 8-bit channels, rounding to the nearest value.
    pub fn to_rgb8(self) -> (u8, u8, u8) {
        let [r, g, b] = self.0.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8);
        (r, g, b)
    }
}

pub const BLUE: Rgb = Rgb([0.0, 0.0, 1.0]);
pub const MAGENTA: Rgb = Rgb([1.0, 0.0, 1.0]);
pub const RED: Rgb = Rgb([1.0, 0.0, 0.0]);
pub const VIOLET: Rgb = Rgb([0.5, 0.0, 1.0]);
pub const CYAN: Rgb = Rgb([0.0, 1.0, 1.0]);
pub const SPRING_GREEN: Rgb = Rgb([0.0, 1.0, 0.5]);

/// Immutable mapping from severity level (1-based) to colour.
#[derive(Debug, PartialEq)]
pub struct SeverityPalette {
    colours: &'static [Rgb],
}

/// Levels 1 to 3 are blue, magenta and red. Levels 4 to 6 continue with violet,
/// cyan and spring green; higher levels are rejected.
pub static SEVERITY_PALETTE: SeverityPalette = SeverityPalette {
    colours: &[BLUE, MAGENTA, RED, VIOLET, CYAN, SPRING_GREEN],
};

impl SeverityPalette {
    /// Number of severity levels this palette can colour.
    pub fn supported_levels(&self) -> usize {
        self.colours.len()
    }

    /// Colour of a 1-based severity level, or `None` outside the palette.
    pub fn colour(&self, level: usize) -> Option<Rgb> {
        level
            .checked_sub(1)
            .and_then(|idx| self.colours.get(idx))
            .copied()
    }

    pub fn check_levels(&self, n_levels: usize) -> Result<()> {
        if n_levels > self.supported_levels() {
            return Err(PositionalVarianceError::UnsupportedSeverityLevels {
                found: n_levels,
                supported: self.supported_levels(),
            });
        }
        Ok(())
    }

    /// Mixes several `(level, probability)` contributions on a white background.
    ///
    /// Each contribution removes `probability` from every channel that is zero in
    /// its level's colour, floored at zero. A single contribution therefore equals
    /// the level colour composited over white with alpha = probability.
    pub fn mix<I>(&self, contributions: I) -> Rgb
    where
        I: IntoIterator<Item = (usize, f64)>,
    {
        let mut channels = Rgb::WHITE.0;
        for (level, probability) in contributions {
            let Some(colour) = self.colour(level) else {
                continue;
            };
            let alpha = opacity(probability);
            for (channel, &value) in channels.iter_mut().zip(colour.0.iter()) {
                if value == 0.0 {
                    *channel -= alpha;
                }
            }
        }
        Rgb(channels.map(|c| c.max(0.0)))
    }
}

/// Opacity of a cell: its probability clamped to [0, 1].
pub fn opacity(probability: f64) -> f64 {
    if probability.is_nan() {
        0.0
    } else {
        probability.clamp(0.0, 1.0)
    }
}

/// Which progression model produced the thresholds. Only the legend wording differs;
/// both variants share `SEVERITY_PALETTE`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelVariant {
    #[default]
    Zscore,
    Ordinal,
}

impl ModelVariant {
    pub fn palette(self) -> &'static SeverityPalette {
        &SEVERITY_PALETTE
    }

    pub fn threshold_label(self, threshold: u32) -> String {
        match self {
            Self::Zscore => format!("z = {threshold}"),
            Self::Ordinal => format!("score = {threshold}"),
        }
    }
}
