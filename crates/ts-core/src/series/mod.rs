//! Concrete storage for fetched data blocks
//!
//! A series is a sorted x-axis plus a flat values buffer holding
//! `component_count` values per sample: one for scalars, three for vectors,
//! one per band for spectrograms.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::range::TimeRange;

/// Measurement unit attached to an axis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub name: String,
    /// The unit is a unit of time.
    pub time_unit: bool,
}

impl Unit {
    pub fn new(name: impl Into<String>, time_unit: bool) -> Self {
        Self { name: name.into(), time_unit }
    }
}

/// Error raised when a series buffer does not match its declared shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SeriesError {
    #[error("component count must be at least 1")]
    NoComponents,
    #[error("{values} values for {samples} samples of {components} components")]
    MismatchedShape {
        samples: usize,
        components: usize,
        values: usize,
    },
    #[error("x-axis samples are not sorted")]
    UnsortedAxis,
}

/// One contiguous block of sampled data.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSeries {
    x_axis: Vec<f64>,
    values: Vec<f64>,
    component_count: usize,
    x_unit: Unit,
    values_unit: Unit,
}

impl DataSeries {
    /// Build a series, validating the buffer shape against the declared
    /// component count and the x-axis ordering.
    pub fn new(
        x_axis: Vec<f64>,
        values: Vec<f64>,
        component_count: usize,
        x_unit: Unit,
        values_unit: Unit,
    ) -> Result<Self, SeriesError> {
        if component_count == 0 {
            return Err(SeriesError::NoComponents);
        }
        if values.len() != x_axis.len() * component_count {
            return Err(SeriesError::MismatchedShape {
                samples: x_axis.len(),
                components: component_count,
                values: values.len(),
            });
        }
        if x_axis.windows(2).any(|w| w[0] > w[1]) {
            return Err(SeriesError::UnsortedAxis);
        }
        Ok(Self { x_axis, values, component_count, x_unit, values_unit })
    }

    pub fn len(&self) -> usize {
        self.x_axis.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x_axis.is_empty()
    }

    pub fn x_axis(&self) -> &[f64] {
        &self.x_axis
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn component_count(&self) -> usize {
        self.component_count
    }

    pub fn x_unit(&self) -> &Unit {
        &self.x_unit
    }

    pub fn values_unit(&self) -> &Unit {
        &self.values_unit
    }

    /// The `component`-th value of sample `index`.
    pub fn value_at(&self, index: usize, component: usize) -> Option<f64> {
        if component >= self.component_count {
            return None;
        }
        self.values.get(index * self.component_count + component).copied()
    }

    /// The x-axis span actually covered by the samples.
    pub fn coverage(&self) -> Option<TimeRange> {
        match (self.x_axis.first(), self.x_axis.last()) {
            (Some(&first), Some(&last)) => Some(TimeRange::between(first, last)),
            _ => None,
        }
    }

    /// Merge with a newer block into a fresh series, the newer samples
    /// winning wherever the two x-spans overlap. Returns `None` when the
    /// shapes are incompatible and the newer block must replace this one.
    pub fn merged_with(&self, newer: &DataSeries) -> Option<DataSeries> {
        if self.component_count != newer.component_count {
            return None;
        }
        if newer.is_empty() {
            return Some(self.clone());
        }
        let lo = *newer.x_axis.first().unwrap_or(&f64::NEG_INFINITY);
        let hi = *newer.x_axis.last().unwrap_or(&f64::INFINITY);

        let cc = self.component_count;
        let mut x_axis = Vec::with_capacity(self.len() + newer.len());
        let mut values = Vec::with_capacity((self.len() + newer.len()) * cc);

        let mut copy_sample = |src: &DataSeries, i: usize| {
            x_axis.push(src.x_axis[i]);
            values.extend_from_slice(&src.values[i * cc..(i + 1) * cc]);
        };

        for i in 0..self.len() {
            if self.x_axis[i] < lo {
                copy_sample(self, i);
            }
        }
        for i in 0..newer.len() {
            copy_sample(newer, i);
        }
        for i in 0..self.len() {
            if self.x_axis[i] > hi {
                copy_sample(self, i);
            }
        }

        Some(DataSeries {
            x_axis,
            values,
            component_count: cc,
            x_unit: newer.x_unit.clone(),
            values_unit: newer.values_unit.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar(x: Vec<f64>) -> DataSeries {
        let values = x.iter().map(|v| v * 10.0).collect();
        DataSeries::new(x, values, 1, Unit::new("t", true), Unit::default()).unwrap()
    }

    #[test]
    fn rejects_mismatched_shape() {
        let err = DataSeries::new(vec![0.0, 1.0], vec![0.0, 1.0, 2.0], 2, Unit::default(), Unit::default());
        assert_eq!(
            err,
            Err(SeriesError::MismatchedShape { samples: 2, components: 2, values: 3 })
        );
    }

    #[test]
    fn rejects_zero_components_and_unsorted_axis() {
        assert_eq!(
            DataSeries::new(vec![], vec![], 0, Unit::default(), Unit::default()),
            Err(SeriesError::NoComponents)
        );
        assert_eq!(
            DataSeries::new(vec![1.0, 0.0], vec![0.0, 0.0], 1, Unit::default(), Unit::default()),
            Err(SeriesError::UnsortedAxis)
        );
    }

    #[test]
    fn coverage_spans_first_to_last_sample() {
        let series = scalar(vec![5.0, 6.0, 9.0]);
        let coverage = series.coverage().unwrap();
        assert_eq!(coverage.start(), 5.0);
        assert_eq!(coverage.end(), 9.0);
        assert!(scalar(vec![]).coverage().is_none());
    }

    #[test]
    fn merge_prefers_newer_samples_on_overlap() {
        let older = scalar(vec![0.0, 1.0, 2.0, 3.0]);
        let newer =
            DataSeries::new(vec![2.0, 3.0, 4.0], vec![-1.0, -2.0, -3.0], 1, Unit::default(), Unit::default())
                .unwrap();

        let merged = older.merged_with(&newer).unwrap();
        assert_eq!(merged.x_axis(), &[0.0, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(merged.values(), &[0.0, 10.0, -1.0, -2.0, -3.0]);
    }

    #[test]
    fn merge_keeps_old_samples_on_both_sides() {
        let older = scalar(vec![0.0, 1.0, 8.0, 9.0]);
        let newer = scalar(vec![4.0, 5.0]);
        let merged = older.merged_with(&newer).unwrap();
        assert_eq!(merged.x_axis(), &[0.0, 1.0, 4.0, 5.0, 8.0, 9.0]);
    }

    #[test]
    fn merge_refuses_component_mismatch() {
        let older = scalar(vec![0.0, 1.0]);
        let vector =
            DataSeries::new(vec![2.0], vec![1.0, 2.0, 3.0], 3, Unit::default(), Unit::default()).unwrap();
        assert!(older.merged_with(&vector).is_none());
    }

    #[test]
    fn value_at_respects_component_layout() {
        let vector =
            DataSeries::new(vec![0.0, 1.0], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 3, Unit::default(), Unit::default())
                .unwrap();
        assert_eq!(vector.value_at(1, 2), Some(6.0));
        assert_eq!(vector.value_at(1, 3), None);
        assert_eq!(vector.value_at(2, 0), None);
    }
}
