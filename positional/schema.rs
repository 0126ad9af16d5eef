// ========================================================================================
//                                  Severity Schema
// ========================================================================================
//
// The schema is the table of severity thresholds defined for every biomarker. It fixes
// the set of events whose positions are estimated and the order in which the posterior
// samples refer to them, so everything downstream is validated against it.

use crate::error::{PositionalVarianceError, Result};
use itertools::Itertools;
use ndarray::{Array2, ArrayView2};

/// Marks a threshold slot that a biomarker does not use.
pub const NOT_APPLICABLE: u32 = 0;

/// One (biomarker, severity level) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub biomarker: usize,
    /// The raw threshold value from the schema, e.g. a z-score of 2.
    pub threshold: u32,
    /// The 1-based rank of `threshold` among all distinct thresholds of the schema.
    pub level: usize,
}

/// A validated severity-threshold table.
///
/// Rows are biomarkers and columns are threshold slots. Present thresholds are
/// strictly increasing along a row and may only be followed by `NOT_APPLICABLE`
/// padding. Events are enumerated slot-major: the first threshold of every
/// biomarker, then the second threshold of every biomarker, and so on. That
/// enumeration is the event index used by posterior sequences.
#[derive(Debug, Clone)]
pub struct SeveritySchema {
    thresholds: Array2<u32>,
    events: Vec<Event>,
    levels: Vec<u32>,
    last_event: Vec<usize>,
}

impl SeveritySchema {
    pub fn new(thresholds: Array2<u32>) -> Result<Self> {
        let (n_biomarkers, n_slots) = thresholds.dim();
        if n_biomarkers == 0 {
            return Err(PositionalVarianceError::DegenerateInput(
                "the severity schema has no biomarkers".to_string(),
            ));
        }
        if n_slots == 0 {
            return Err(PositionalVarianceError::DegenerateInput(
                "the severity schema has no threshold slots".to_string(),
            ));
        }

        for (biomarker, row) in thresholds.outer_iter().enumerate() {
            validate_row(biomarker, &row.to_vec())?;
        }

        let levels: Vec<u32> = thresholds
            .iter()
            .copied()
            .filter(|&t| t != NOT_APPLICABLE)
            .sorted_unstable()
            .dedup()
            .collect();

        let mut events = Vec::with_capacity(thresholds.len());
        let mut last_event = vec![0usize; n_biomarkers];
        for slot in 0..n_slots {
            for biomarker in 0..n_biomarkers {
                let threshold = thresholds[(biomarker, slot)];
                if threshold == NOT_APPLICABLE {
                    continue;
                }
                // Rows are increasing, so the latest event seen for a biomarker is its highest.
                last_event[biomarker] = events.len();
                let level = levels
                    .binary_search(&threshold)
                    .map(|idx| idx + 1)
                    .map_err(|_| PositionalVarianceError::InvalidSchema {
                        biomarker,
                        reason: format!("threshold {threshold} is missing from the level table"),
                    })?;
                events.push(Event {
                    biomarker,
                    threshold,
                    level,
                });
            }
        }

        log::debug!(
            "Severity schema: {} biomarkers, {} events, {} severity levels",
            n_biomarkers,
            events.len(),
            levels.len()
        );

        Ok(Self {
            thresholds,
            events,
            levels,
            last_event,
        })
    }

    /// Builds a schema from row vectors, rejecting ragged input.
    pub fn from_rows(rows: &[Vec<u32>]) -> Result<Self> {
        let n_slots = rows.first().map_or(0, Vec::len);
        if let Some((biomarker, row)) = rows.iter().find_position(|row| row.len() != n_slots) {
            return Err(PositionalVarianceError::ShapeMismatch(format!(
                "schema row {biomarker} has {} slots, expected {n_slots}",
                row.len()
            )));
        }
        let flat: Vec<u32> = rows.iter().flatten().copied().collect();
        let thresholds = Array2::from_shape_vec((rows.len(), n_slots), flat)
            .map_err(|e| PositionalVarianceError::ShapeMismatch(e.to_string()))?;
        Self::new(thresholds)
    }

    pub fn n_biomarkers(&self) -> usize {
        self.thresholds.nrows()
    }

    pub fn n_events(&self) -> usize {
        self.events.len()
    }

    /// Number of distinct severity levels across all biomarkers.
    pub fn n_levels(&self) -> usize {
        self.levels.len()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Distinct threshold values in ascending order; index `i` is severity level `i + 1`.
    pub fn levels(&self) -> &[u32] {
        &self.levels
    }

    pub fn thresholds(&self) -> ArrayView2<'_, u32> {
        self.thresholds.view()
    }

    /// Event index of the highest threshold defined for `biomarker`.
    pub fn last_event_of(&self, biomarker: usize) -> usize {
        self.last_event[biomarker]
    }

    /// Iterates the `(event_index, event)` pairs belonging to `biomarker`.
    pub fn events_of(&self, biomarker: usize) -> impl Iterator<Item = (usize, &Event)> + '_ {
        self.events
            .iter()
            .enumerate()
            .filter(move |(_, event)| event.biomarker == biomarker)
    }
}

fn validate_row(biomarker: usize, row: &[u32]) -> Result<()> {
    let present = row
        .iter()
        .take_while(|&&t| t != NOT_APPLICABLE)
        .count();
    if present == 0 {
        return Err(PositionalVarianceError::InvalidSchema {
            biomarker,
            reason: "no severity thresholds are defined".to_string(),
        });
    }
    if let Some(slot) = row[present..].iter().position(|&t| t != NOT_APPLICABLE) {
        return Err(PositionalVarianceError::InvalidSchema {
            biomarker,
            reason: format!(
                "threshold in slot {} follows a not-applicable slot",
                present + slot
            ),
        });
    }
    if let Some((a, b)) = row[..present].iter().tuple_windows().find(|(a, b)| a >= b) {
        return Err(PositionalVarianceError::InvalidSchema {
            biomarker,
            reason: format!("thresholds must be strictly increasing, found {a} then {b}"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn events_are_enumerated_slot_major() {
        let schema = SeveritySchema::new(array![[1, 2, 3], [1, 2, 0]]).unwrap();
        let order: Vec<(usize, u32)> = schema
            .events()
            .iter()
            .map(|e| (e.biomarker, e.threshold))
            .collect();
        assert_eq!(order, vec![(0, 1), (1, 1), (0, 2), (1, 2), (0, 3)]);
        assert_eq!(schema.n_events(), 5);
        assert_eq!(schema.last_event_of(0), 4);
        assert_eq!(schema.last_event_of(1), 3);
    }

    #[test]
    fn levels_rank_distinct_thresholds() {
        let schema = SeveritySchema::new(array![[1, 3, 5], [3, 5, 0]]).unwrap();
        assert_eq!(schema.levels(), &[1, 3, 5]);
        let levels: Vec<usize> = schema.events().iter().map(|e| e.level).collect();
        assert_eq!(levels, vec![1, 2, 2, 3, 3]);
    }

    #[test]
    fn sentinel_slots_never_produce_events() {
        let schema = SeveritySchema::new(array![[1, 2, 0]]).unwrap();
        assert_eq!(schema.n_events(), 2);
        assert!(schema.events().iter().all(|e| e.threshold != NOT_APPLICABLE));
        assert_eq!(schema.events_of(0).count(), 2);
    }

    #[test]
    fn non_increasing_rows_are_rejected() {
        let err = SeveritySchema::new(array![[2, 1, 3]]).unwrap_err();
        assert!(matches!(
            err,
            PositionalVarianceError::InvalidSchema { biomarker: 0, .. }
        ));
    }

    #[test]
    fn interior_sentinels_are_rejected() {
        let err = SeveritySchema::new(array![[1, 2, 3], [1, 0, 3]]).unwrap_err();
        assert!(matches!(
            err,
            PositionalVarianceError::InvalidSchema { biomarker: 1, .. }
        ));
    }

    #[test]
    fn ragged_rows_are_a_shape_mismatch() {
        let err = SeveritySchema::from_rows(&[vec![1, 2, 3], vec![1, 2]]).unwrap_err();
        assert!(matches!(err, PositionalVarianceError::ShapeMismatch(_)));
    }

    #[test]
    fn empty_schema_is_degenerate() {
        let err = SeveritySchema::new(Array2::<u32>::zeros((0, 3))).unwrap_err();
        assert!(matches!(err, PositionalVarianceError::DegenerateInput(_)));
    }
}
