use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::grid::{GridError, IntervalGrid};
use crate::domain::session::Session;

/// Relative tolerance for the allocated total against the session quantity.
pub const CONSERVATION_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketAllocation {
    pub bucket_start: DateTime<Utc>,
    pub quantity: f64,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AllocationError {
    #[error("grid arithmetic failed: {0}")]
    Grid(#[from] GridError),
    #[error("allocated {allocated} across buckets but the session carries {expected}")]
    ConservationViolated { expected: f64, allocated: f64 },
}

/// Splits a session's quantity across the grid buckets it overlaps.
///
/// With `B` the boundaries from `floor(start)` through `end`:
/// - a single boundary takes the whole quantity;
/// - otherwise `B[0]` takes the share for `ceil(start) - start`, `B[-1]` the share for
///   `end - floor(end)`, and the fully covered buckets split the remainder equally.
///
/// A start that sits on a boundary contributes no partial first share, so `B[0]` gets zero.
/// With only two boundaries there is no interior to take the remainder; `B[0]` is then fully
/// covered and takes it instead.
pub fn allocate_session(
    grid: &IntervalGrid,
    session: &Session,
) -> Result<Vec<BucketAllocation>, AllocationError> {
    let start = session.start();
    let end = session.end();
    let quantity = session.quantity();
    let boundaries: Vec<_> = grid.enumerate(start, end)?.collect();

    let allocations = match boundaries.as_slice() {
        [] => Vec::new(),
        [bucket_start] => vec![BucketAllocation {
            bucket_start: *bucket_start,
            quantity,
        }],
        [first, interior @ .., last] => {
            let rate = quantity / grid.fraction(session.duration());
            let first_share = rate * grid.fraction(grid.ceil(start)? - start);
            let last_share = rate * grid.fraction(end - grid.floor(end)?);

            let first_is_full = interior.is_empty() && grid.is_boundary(start)?;
            let full_buckets = interior.len() + usize::from(first_is_full);
            let full_share = if full_buckets == 0 {
                0.0
            } else {
                (quantity - first_share - last_share) / full_buckets as f64
            };

            let mut allocations = Vec::with_capacity(boundaries.len());
            allocations.push(BucketAllocation {
                bucket_start: *first,
                quantity: if first_is_full {
                    first_share + full_share
                } else {
                    first_share
                },
            });
            allocations.extend(interior.iter().map(|bucket_start| BucketAllocation {
                bucket_start: *bucket_start,
                quantity: full_share,
            }));
            allocations.push(BucketAllocation {
                bucket_start: *last,
                quantity: last_share,
            });
            allocations
        }
    };

    ensure_conserved(quantity, &allocations)?;
    Ok(allocations)
}

fn ensure_conserved(
    expected: f64,
    allocations: &[BucketAllocation],
) -> Result<(), AllocationError> {
    let allocated: f64 = allocations.iter().map(|allocation| allocation.quantity).sum();
    // Relative bound; a zero quantity must allocate exactly zero.
    if (allocated - expected).abs() > CONSERVATION_TOLERANCE * expected.abs() {
        return Err(AllocationError::ConservationViolated {
            expected,
            allocated,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeDelta, Utc};

    use super::{AllocationError, BucketAllocation, allocate_session, ensure_conserved};
    use crate::domain::grid::{IntervalGrid, IntervalWidth};
    use crate::domain::session::Session;
    use crate::test_support::{assert_close, utc};

    fn hourly() -> IntervalGrid {
        IntervalGrid::from_width(IntervalWidth::Hour)
    }

    fn allocate(start: DateTime<Utc>, minutes: i64, quantity: f64) -> Vec<BucketAllocation> {
        let session =
            Session::new(start, TimeDelta::minutes(minutes), quantity).expect("session is valid");
        allocate_session(&hourly(), &session).expect("allocation should succeed")
    }

    fn total(allocations: &[BucketAllocation]) -> f64 {
        allocations.iter().map(|allocation| allocation.quantity).sum()
    }

    #[test]
    fn splits_reference_session_proportionally() {
        let allocations = allocate(utc(2024, 1, 1, 10, 45, 0), 150, 10.0);

        let buckets: Vec<_> = allocations.iter().map(|a| a.bucket_start).collect();
        assert_eq!(
            buckets,
            vec![
                utc(2024, 1, 1, 10, 0, 0),
                utc(2024, 1, 1, 11, 0, 0),
                utc(2024, 1, 1, 12, 0, 0),
                utc(2024, 1, 1, 13, 0, 0),
            ]
        );
        assert_close(allocations[0].quantity, 1.0);
        assert_close(allocations[1].quantity, 4.0);
        assert_close(allocations[2].quantity, 4.0);
        assert_close(allocations[3].quantity, 1.0);
        assert_close(total(&allocations), 10.0);
    }

    #[test]
    fn keeps_session_inside_one_bucket_whole() {
        let allocations = allocate(utc(2024, 1, 1, 10, 10, 0), 30, 3.3);

        assert_eq!(
            allocations,
            vec![BucketAllocation {
                bucket_start: utc(2024, 1, 1, 10, 0, 0),
                quantity: 3.3,
            }]
        );
    }

    #[test]
    fn assigns_zero_duration_session_to_containing_bucket() {
        let allocations = allocate(utc(2024, 1, 1, 23, 59, 59), 0, 7.5);

        assert_eq!(
            allocations,
            vec![BucketAllocation {
                bucket_start: utc(2024, 1, 1, 23, 0, 0),
                quantity: 7.5,
            }]
        );
    }

    #[test]
    fn splits_two_bucket_session_by_overlap() {
        let allocations = allocate(utc(2024, 1, 1, 10, 30, 0), 60, 6.0);

        assert_eq!(allocations.len(), 2);
        assert_close(allocations[0].quantity, 3.0);
        assert_close(allocations[1].quantity, 3.0);
    }

    #[test]
    fn boundary_aligned_start_has_no_partial_first_share() {
        let allocations = allocate(utc(2024, 1, 1, 10, 0, 0), 90, 6.0);

        assert_eq!(allocations.len(), 2);
        assert_eq!(allocations[0].bucket_start, utc(2024, 1, 1, 10, 0, 0));
        assert_close(allocations[0].quantity, 4.0);
        assert_close(allocations[1].quantity, 2.0);
        assert_close(total(&allocations), 6.0);
    }

    #[test]
    fn fully_aligned_session_leaves_both_outer_boundaries_empty() {
        let allocations = allocate(utc(2024, 1, 1, 10, 0, 0), 120, 5.0);

        assert_eq!(allocations.len(), 3);
        assert_eq!(allocations[0].quantity, 0.0);
        assert_close(allocations[1].quantity, 5.0);
        assert_eq!(allocations[2].bucket_start, utc(2024, 1, 1, 12, 0, 0));
        assert_eq!(allocations[2].quantity, 0.0);
    }

    #[test]
    fn aligned_start_over_three_boundaries_gives_first_bucket_nothing() {
        let allocations = allocate(utc(2024, 1, 1, 10, 0, 0), 150, 10.0);

        let buckets: Vec<_> = allocations.iter().map(|a| a.bucket_start).collect();
        assert_eq!(
            buckets,
            vec![
                utc(2024, 1, 1, 10, 0, 0),
                utc(2024, 1, 1, 11, 0, 0),
                utc(2024, 1, 1, 12, 0, 0),
            ]
        );
        assert_eq!(allocations[0].quantity, 0.0);
        assert_close(allocations[1].quantity, 8.0);
        assert_close(allocations[2].quantity, 2.0);
    }

    #[test]
    fn aligned_start_over_four_boundaries_splits_interior_only() {
        let allocations = allocate(utc(2024, 1, 1, 10, 0, 0), 200, 10.0);

        assert_eq!(allocations.len(), 4);
        assert_eq!(allocations[0].quantity, 0.0);
        assert_close(allocations[1].quantity, 4.5);
        assert_close(allocations[2].quantity, 4.5);
        assert_close(allocations[3].quantity, 1.0);
        assert_close(total(&allocations), 10.0);
    }

    #[test]
    fn conserves_quantity_for_every_span_length() {
        let starts = [
            utc(2024, 3, 5, 8, 0, 0),
            utc(2024, 3, 5, 8, 1, 0),
            utc(2024, 3, 5, 8, 37, 13),
            utc(2024, 3, 5, 8, 59, 59),
        ];
        let durations = [0, 1, 59, 60, 61, 119, 120, 121, 180, 437, 1440, 4000];

        for start in starts {
            for minutes in durations {
                let quantity = 17.31;
                let allocations = allocate(start, minutes, quantity);
                let sum = total(&allocations);
                assert!(
                    (sum - quantity).abs() <= 1e-9 * quantity,
                    "start {start} minutes {minutes}: allocated {sum}"
                );
                assert!(allocations.iter().all(|a| a.quantity >= -1e-12));
            }
        }
    }

    #[test]
    fn handles_sub_second_durations() {
        let session = Session::new(
            utc(2024, 1, 1, 10, 59, 59),
            TimeDelta::milliseconds(1500),
            1.5,
        )
        .expect("session is valid");
        let allocations = allocate_session(&hourly(), &session).expect("allocation succeeds");

        assert_eq!(allocations.len(), 2);
        assert_close(allocations[0].quantity, 1.0);
        assert_close(allocations[1].quantity, 0.5);
    }

    #[test]
    fn conservation_tolerance_is_relative_for_small_quantities() {
        let allocations = [BucketAllocation {
            bucket_start: utc(2024, 1, 1, 10, 0, 0),
            quantity: 0.001 + 5e-10,
        }];

        assert!(matches!(
            ensure_conserved(0.001, &allocations),
            Err(AllocationError::ConservationViolated { .. })
        ));
        assert_eq!(ensure_conserved(0.0, &[]), Ok(()));
    }

    #[test]
    fn reports_conservation_violation_loudly() {
        let allocations = [BucketAllocation {
            bucket_start: utc(2024, 1, 1, 10, 0, 0),
            quantity: 9.0,
        }];

        assert_eq!(
            ensure_conserved(10.0, &allocations),
            Err(AllocationError::ConservationViolated {
                expected: 10.0,
                allocated: 9.0,
            })
        );
    }
}
