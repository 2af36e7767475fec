use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};

use crate::domain::meter::{Meter, MeterError};

#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonRow {
    pub bucket_start: DateTime<Utc>,
    /// One entry per column; `None` where the meter has no reading.
    pub values: Vec<Option<f64>>,
}

/// Meters side by side on the union of their bucket starts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComparisonTable {
    pub columns: Vec<String>,
    pub rows: Vec<ComparisonRow>,
}

impl ComparisonTable {
    pub fn column(&self, name: &str) -> Option<Vec<(DateTime<Utc>, Option<f64>)>> {
        let position = self.columns.iter().position(|column| column == name)?;
        Some(
            self.rows
                .iter()
                .map(|row| (row.bucket_start, row.values.get(position).copied().flatten()))
                .collect(),
        )
    }
}

/// Outer-joins `meters` on bucket start. All meters must share one interval.
pub fn build_comparison(meters: &[Meter]) -> Result<ComparisonTable, MeterError> {
    if let Some((first, rest)) = meters.split_first() {
        for meter in rest {
            first.ensure_same_interval(meter)?;
        }
    }

    let index: BTreeSet<DateTime<Utc>> = meters
        .iter()
        .flat_map(|meter| meter.readings().keys().copied())
        .collect();

    let rows = index
        .into_iter()
        .map(|bucket_start| ComparisonRow {
            bucket_start,
            values: meters.iter().map(|meter| meter.get(bucket_start)).collect(),
        })
        .collect();

    Ok(ComparisonTable {
        columns: column_names(meters),
        rows,
    })
}

/// Quantum names, suffixed by position (`kWh_1`, `kWh_2`) when meters share one.
fn column_names(meters: &[Meter]) -> Vec<String> {
    let mut totals: HashMap<&str, usize> = HashMap::new();
    for meter in meters {
        *totals.entry(meter.quantum()).or_default() += 1;
    }

    let mut seen: HashMap<&str, usize> = HashMap::new();
    meters
        .iter()
        .map(|meter| {
            let quantum = meter.quantum();
            if totals.get(quantum).copied().unwrap_or_default() <= 1 {
                return quantum.to_string();
            }
            let position = seen.entry(quantum).or_default();
            *position += 1;
            format!("{quantum}_{position}")
        })
        .collect()
}
