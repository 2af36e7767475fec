use rayon::prelude::*;
use thiserror::Error;

use crate::domain::allocation::{AllocationError, allocate_session};
use crate::domain::grid::IntervalGrid;
use crate::domain::series::BucketSeries;
use crate::domain::session::Session;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AggregateError {
    #[error("session #{index} could not be allocated: {source}")]
    Session {
        index: usize,
        #[source]
        source: AllocationError,
    },
}

/// Allocates every session onto `grid` and sums the allocations per bucket.
///
/// Sessions are allocated in parallel; the grouped sum is the only join point.
pub fn aggregate_sessions(
    grid: &IntervalGrid,
    sessions: &[Session],
) -> Result<BucketSeries, AggregateError> {
    let allocations = sessions
        .par_iter()
        .enumerate()
        .map(|(index, session)| {
            allocate_session(grid, session)
                .map_err(|source| AggregateError::Session { index, source })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let series = BucketSeries::from_allocations(allocations.into_iter().flatten());

    tracing::debug!(
        sessions = sessions.len(),
        buckets = series.len(),
        "aggregated sessions into buckets"
    );

    Ok(series)
}
