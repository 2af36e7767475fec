use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use chrono::{DateTime, TimeDelta, Utc};
use thiserror::Error;

use crate::domain::grid::{GridError, IntervalGrid};
use crate::domain::series::SourceSeries;

pub const BUCKET_START_COLUMN: &str = "bucket_start";

#[derive(Debug, Error, Clone, PartialEq)]
pub enum MeterError {
    #[error("meter '{meter}' has no '{column}' value at {at}")]
    MissingQuantity {
        meter: String,
        column: String,
        at: DateTime<Utc>,
    },
    #[error("meter '{meter}' has more than one reading at {at}")]
    DuplicateBucket { meter: String, at: DateTime<Utc> },
    #[error("meter '{meter}' has a reading at {at} that is off its {interval} grid")]
    OffGrid {
        meter: String,
        at: DateTime<Utc>,
        interval: TimeDelta,
    },
    #[error("grid arithmetic failed: {0}")]
    Grid(#[from] GridError),
    #[error(
        "meters '{left}' ({left_interval}) and '{right}' ({right_interval}) have different intervals"
    )]
    IncompatibleInterval {
        left: String,
        left_interval: TimeDelta,
        right: String,
        right_interval: TimeDelta,
    },
    #[error(
        "meters '{left}' ({left_quantum}) and '{right}' ({right_quantum}) report different quanta"
    )]
    IncompatibleQuantum {
        left: String,
        left_quantum: String,
        right: String,
        right_quantum: String,
    },
    #[error("{operation} is not yet specified")]
    NotYetSpecified { operation: &'static str },
    #[error("meter '{meter}' reading at {at} cannot be rebased")]
    RebaseOutOfRange { meter: String, at: DateTime<Utc> },
}

/// A single-quantity series on a fixed grid, ready for comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct Meter {
    label: String,
    quantum: String,
    interval: TimeDelta,
    readings: BTreeMap<DateTime<Utc>, f64>,
}

impl Meter {
    pub(crate) fn from_readings(
        label: impl Into<String>,
        quantum: impl Into<String>,
        interval: TimeDelta,
        readings: BTreeMap<DateTime<Utc>, f64>,
    ) -> Self {
        Self {
            label: label.into(),
            quantum: quantum.into(),
            interval,
            readings,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn quantum(&self) -> &str {
        &self.quantum
    }

    pub fn interval(&self) -> TimeDelta {
        self.interval
    }

    pub fn readings(&self) -> &BTreeMap<DateTime<Utc>, f64> {
        &self.readings
    }

    pub fn get(&self, bucket_start: DateTime<Utc>) -> Option<f64> {
        self.readings.get(&bucket_start).copied()
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn ensure_same_interval(&self, other: &Meter) -> Result<(), MeterError> {
        if self.interval != other.interval {
            return Err(MeterError::IncompatibleInterval {
                left: self.label.clone(),
                left_interval: self.interval,
                right: other.label.clone(),
                right_interval: other.interval,
            });
        }
        Ok(())
    }

    /// The canonical form as a source table: `bucket_start` plus one quantum-named column.
    pub fn to_source_series(&self) -> SourceSeries {
        let mut series = SourceSeries::new(&self.label, BUCKET_START_COLUMN, &self.quantum);
        for (bucket_start, quantity) in &self.readings {
            series.push(
                *bucket_start,
                BTreeMap::from([(self.quantum.clone(), *quantity)]),
            );
        }
        series
    }
}

/// Reduces a source table to a meter: keeps the designated quantity column, renames it to
/// `quantum` and indexes by bucket start.
///
/// Every start must already lie on `grid`; nothing is resampled.
pub fn normalize(
    source: SourceSeries,
    quantum: &str,
    grid: &IntervalGrid,
) -> Result<Meter, MeterError> {
    let SourceSeries {
        label,
        quantity_label,
        records,
        ..
    } = source;

    let mut readings = BTreeMap::new();
    for mut record in records {
        if !grid.is_boundary(record.start)? {
            return Err(MeterError::OffGrid {
                meter: label,
                at: record.start,
                interval: grid.width(),
            });
        }

        let Some(quantity) = record.values.remove(&quantity_label) else {
            return Err(MeterError::MissingQuantity {
                meter: label,
                column: quantity_label,
                at: record.start,
            });
        };

        match readings.entry(record.start) {
            Entry::Vacant(entry) => {
                entry.insert(quantity);
            }
            Entry::Occupied(_) => {
                return Err(MeterError::DuplicateBucket {
                    meter: label,
                    at: record.start,
                });
            }
        }
    }

    tracing::debug!(
        meter = %label,
        quantum,
        readings = readings.len(),
        "normalized meter"
    );

    Ok(Meter::from_readings(label, quantum, grid.width(), readings))
}
