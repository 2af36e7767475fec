use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::domain::allocation::BucketAllocation;

/// Quantities summed per bucket start, ordered by time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BucketSeries {
    points: BTreeMap<DateTime<Utc>, f64>,
}

impl BucketSeries {
    /// Groups allocations by bucket and sums each group.
    ///
    /// Contributions are summed in ascending order so the result does not depend on the order
    /// the allocations arrive in.
    pub fn from_allocations(allocations: impl IntoIterator<Item = BucketAllocation>) -> Self {
        let mut grouped: BTreeMap<DateTime<Utc>, Vec<f64>> = BTreeMap::new();
        for allocation in allocations {
            grouped
                .entry(allocation.bucket_start)
                .or_default()
                .push(allocation.quantity);
        }

        let points = grouped
            .into_iter()
            .map(|(bucket_start, mut quantities)| {
                quantities.sort_by(f64::total_cmp);
                (bucket_start, quantities.into_iter().sum())
            })
            .collect();

        Self { points }
    }

    pub fn get(&self, bucket_start: DateTime<Utc>) -> Option<f64> {
        self.points.get(&bucket_start).copied()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (DateTime<Utc>, f64)> + '_ {
        self.points.iter().map(|(bucket_start, quantity)| (*bucket_start, *quantity))
    }

    pub fn total(&self) -> f64 {
        self.points.values().sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceRecord {
    pub start: DateTime<Utc>,
    pub values: BTreeMap<String, f64>,
}

/// A per-source table as delivered by a collaborator, before normalization.
///
/// `start_label` and `quantity_label` name the source's own columns; any other columns in
/// `values` are carried along until the normalizer strips them.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSeries {
    pub label: String,
    pub start_label: String,
    pub quantity_label: String,
    pub records: Vec<SourceRecord>,
}

impl SourceSeries {
    pub fn new(
        label: impl Into<String>,
        start_label: impl Into<String>,
        quantity_label: impl Into<String>,
    ) -> Self {
        Self {
            label: label.into(),
            start_label: start_label.into(),
            quantity_label: quantity_label.into(),
            records: Vec::new(),
        }
    }

    pub fn from_buckets(
        label: impl Into<String>,
        start_label: impl Into<String>,
        quantity_label: impl Into<String>,
        buckets: &BucketSeries,
    ) -> Self {
        let mut series = Self::new(label, start_label, quantity_label);
        series.records = buckets
            .iter()
            .map(|(start, quantity)| SourceRecord {
                start,
                values: BTreeMap::from([(series.quantity_label.clone(), quantity)]),
            })
            .collect();
        series
    }

    pub fn push(&mut self, start: DateTime<Utc>, values: BTreeMap<String, f64>) {
        self.records.push(SourceRecord { start, values });
    }
}

#[cfg(test)]
mod tests {
    use super::{BucketSeries, SourceSeries};
    use crate::domain::allocation::BucketAllocation;
    use crate::test_support::utc;

    fn allocation(hour: u32, quantity: f64) -> BucketAllocation {
        BucketAllocation {
            bucket_start: utc(2024, 1, 1, hour, 0, 0),
            quantity,
        }
    }

    #[test]
    fn sums_allocations_sharing_a_bucket() {
        let series = BucketSeries::from_allocations([
            allocation(11, 1.5),
            allocation(10, 2.0),
            allocation(11, 0.25),
        ]);

        assert_eq!(series.len(), 2);
        assert_eq!(series.get(utc(2024, 1, 1, 10, 0, 0)), Some(2.0));
        assert_eq!(series.get(utc(2024, 1, 1, 11, 0, 0)), Some(1.75));
        assert_eq!(series.get(utc(2024, 1, 1, 12, 0, 0)), None);
    }

    #[test]
    fn iterates_in_time_order() {
        let series = BucketSeries::from_allocations([allocation(12, 1.0), allocation(9, 1.0)]);
        let hours: Vec<_> = series.iter().map(|(start, _)| start).collect();

        assert_eq!(hours, vec![utc(2024, 1, 1, 9, 0, 0), utc(2024, 1, 1, 12, 0, 0)]);
    }

    #[test]
    fn converts_buckets_into_single_column_source() {
        let series = BucketSeries::from_allocations([allocation(10, 2.0)]);
        let source = SourceSeries::from_buckets("wallbox", "Start", "Energy (kWh)", &series);

        assert_eq!(source.records.len(), 1);
        assert_eq!(source.records[0].start, utc(2024, 1, 1, 10, 0, 0));
        assert_eq!(source.records[0].values.get("Energy (kWh)"), Some(&2.0));
    }
}
