use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GridError {
    #[error("interval width must be positive, got {0}")]
    NonPositiveWidth(TimeDelta),
    #[error("unsupported interval '{0}'; supported intervals: h")]
    UnsupportedInterval(String),
    #[error("instant {0} cannot be aligned to the interval grid")]
    OutOfRange(DateTime<Utc>),
    #[error("range end {end} precedes range start {start}")]
    ReversedRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

/// Bucket widths the system knows how to compare on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntervalWidth {
    Hour,
}

impl IntervalWidth {
    pub fn from_code(code: &str) -> Result<Self, GridError> {
        match code.trim() {
            "h" => Ok(Self::Hour),
            other => Err(GridError::UnsupportedInterval(other.to_string())),
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Self::Hour => "h",
        }
    }

    pub fn seconds(self) -> i64 {
        match self {
            Self::Hour => 3600,
        }
    }
}

/// Fixed-width buckets aligned to multiples of `width` from the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalGrid {
    width: TimeDelta,
}

impl IntervalGrid {
    pub fn new(width: TimeDelta) -> Result<Self, GridError> {
        if width <= TimeDelta::zero() {
            return Err(GridError::NonPositiveWidth(width));
        }
        Ok(Self { width })
    }

    pub fn from_width(width: IntervalWidth) -> Self {
        Self {
            width: TimeDelta::seconds(width.seconds()),
        }
    }

    pub fn width(&self) -> TimeDelta {
        self.width
    }

    /// Latest boundary at or before `instant`.
    pub fn floor(&self, instant: DateTime<Utc>) -> Result<DateTime<Utc>, GridError> {
        instant
            .duration_trunc(self.width)
            .map_err(|_| GridError::OutOfRange(instant))
    }

    /// Earliest boundary at or after `instant`. A boundary is its own ceiling.
    pub fn ceil(&self, instant: DateTime<Utc>) -> Result<DateTime<Utc>, GridError> {
        let floor = self.floor(instant)?;
        if floor == instant {
            return Ok(floor);
        }
        floor
            .checked_add_signed(self.width)
            .ok_or(GridError::OutOfRange(instant))
    }

    pub fn is_boundary(&self, instant: DateTime<Utc>) -> Result<bool, GridError> {
        Ok(self.floor(instant)? == instant)
    }

    /// Boundaries from `floor(start)` through the last boundary `<= end`.
    ///
    /// Always yields at least one boundary, even for `start == end`. The returned iterator is
    /// cheap to clone, so callers can walk the same range more than once.
    pub fn enumerate(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Boundaries, GridError> {
        if end < start {
            return Err(GridError::ReversedRange { start, end });
        }
        Ok(Boundaries {
            next: Some(self.floor(start)?),
            last: end,
            width: self.width,
        })
    }

    /// `span` expressed in bucket widths.
    pub fn fraction(&self, span: TimeDelta) -> f64 {
        span_seconds(span) / span_seconds(self.width)
    }
}

#[derive(Debug, Clone)]
pub struct Boundaries {
    next: Option<DateTime<Utc>>,
    last: DateTime<Utc>,
    width: TimeDelta,
}

impl Iterator for Boundaries {
    type Item = DateTime<Utc>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.filter(|boundary| *boundary <= self.last)?;
        self.next = current.checked_add_signed(self.width);
        Some(current)
    }
}

pub(crate) fn span_seconds(span: TimeDelta) -> f64 {
    span.num_seconds() as f64 + f64::from(span.subsec_nanos()) * 1e-9
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use super::{GridError, IntervalGrid, IntervalWidth};
    use crate::test_support::utc;

    fn hourly() -> IntervalGrid {
        IntervalGrid::from_width(IntervalWidth::Hour)
    }

    #[test]
    fn rejects_non_positive_width() {
        assert_eq!(
            IntervalGrid::new(TimeDelta::zero()),
            Err(GridError::NonPositiveWidth(TimeDelta::zero()))
        );
        assert!(IntervalGrid::new(TimeDelta::seconds(-60)).is_err());
    }

    #[test]
    fn rejects_unsupported_interval_codes() {
        assert_eq!(IntervalWidth::from_code("h"), Ok(IntervalWidth::Hour));
        assert_eq!(
            IntervalWidth::from_code("15min"),
            Err(GridError::UnsupportedInterval("15min".to_string()))
        );
        assert_eq!(
            IntervalWidth::from_code("d").unwrap_err().to_string(),
            "unsupported interval 'd'; supported intervals: h"
        );
    }

    #[test]
    fn floors_and_ceils_to_hour_boundaries() {
        let grid = hourly();
        let instant = utc(2024, 1, 1, 10, 45, 0);

        assert_eq!(grid.floor(instant), Ok(utc(2024, 1, 1, 10, 0, 0)));
        assert_eq!(grid.ceil(instant), Ok(utc(2024, 1, 1, 11, 0, 0)));
    }

    #[test]
    fn boundary_is_its_own_floor_and_ceil() {
        let grid = hourly();
        let boundary = utc(2024, 1, 1, 10, 0, 0);

        assert_eq!(grid.floor(boundary), Ok(boundary));
        assert_eq!(grid.ceil(boundary), Ok(boundary));
        assert_eq!(grid.is_boundary(boundary), Ok(true));
        assert_eq!(grid.is_boundary(utc(2024, 1, 1, 10, 0, 1)), Ok(false));
    }

    #[test]
    fn enumerates_inclusive_of_end_boundary() {
        let grid = hourly();
        let boundaries: Vec<_> = grid
            .enumerate(utc(2024, 1, 1, 10, 45, 0), utc(2024, 1, 1, 12, 0, 0))
            .expect("range is valid")
            .collect();

        assert_eq!(
            boundaries,
            vec![
                utc(2024, 1, 1, 10, 0, 0),
                utc(2024, 1, 1, 11, 0, 0),
                utc(2024, 1, 1, 12, 0, 0),
            ]
        );
    }

    #[test]
    fn enumerates_single_boundary_for_empty_range() {
        let grid = hourly();
        let instant = utc(2024, 1, 1, 10, 20, 0);
        let boundaries: Vec<_> = grid
            .enumerate(instant, instant)
            .expect("range is valid")
            .collect();

        assert_eq!(boundaries, vec![utc(2024, 1, 1, 10, 0, 0)]);
    }

    #[test]
    fn enumeration_can_be_restarted() {
        let grid = hourly();
        let boundaries = grid
            .enumerate(utc(2024, 1, 1, 10, 0, 0), utc(2024, 1, 1, 13, 30, 0))
            .expect("range is valid");

        assert_eq!(boundaries.clone().count(), 4);
        assert_eq!(boundaries.count(), 4);
    }

    #[test]
    fn rejects_reversed_range() {
        let grid = hourly();
        let result = grid.enumerate(utc(2024, 1, 1, 11, 0, 0), utc(2024, 1, 1, 10, 0, 0));

        assert!(matches!(result, Err(GridError::ReversedRange { .. })));
    }

    #[test]
    fn expresses_spans_in_bucket_widths() {
        let grid = hourly();

        assert!((grid.fraction(TimeDelta::minutes(15)) - 0.25).abs() < 1e-12);
        assert!((grid.fraction(TimeDelta::minutes(150)) - 2.5).abs() < 1e-12);
        assert!((grid.fraction(TimeDelta::milliseconds(1_800_500)) - 0.500_138_888_9).abs() < 1e-9);
    }

    #[test]
    fn supports_sub_hour_grids_built_directly() {
        let grid = IntervalGrid::new(TimeDelta::minutes(30)).expect("width is positive");

        assert_eq!(
            grid.floor(utc(2024, 1, 1, 10, 45, 0)),
            Ok(utc(2024, 1, 1, 10, 30, 0))
        );
    }
}
