use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Utc};

use crate::domain::meter::{Meter, MeterError};

/// Leap year, so every reading (29 February included) has a rebased counterpart.
pub const REPRESENTATIVE_YEAR: i32 = 2000;

/// Calendar position that readings are folded onto before averaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarRebase {
    /// Month, day and time of day within one representative year.
    Year,
    Month,
    Day,
}

/// Subtracts `subtrahend` from `minuend`.
///
/// Only the preconditions are settled: both meters share an interval and a quantum. How
/// buckets covered by just one side should net out is still open, so the body reports that.
pub fn net_meter(minuend: &Meter, subtrahend: &Meter) -> Result<Meter, MeterError> {
    minuend.ensure_same_interval(subtrahend)?;
    if minuend.quantum() != subtrahend.quantum() {
        return Err(MeterError::IncompatibleQuantum {
            left: minuend.label().to_string(),
            left_quantum: minuend.quantum().to_string(),
            right: subtrahend.label().to_string(),
            right_quantum: subtrahend.quantum().to_string(),
        });
    }

    Err(MeterError::NotYetSpecified {
        operation: "net meter",
    })
}

/// Averages a meter's history by calendar position over its whole lookback window.
///
/// `CalendarRebase::Year` moves every reading into [`REPRESENTATIVE_YEAR`] and averages the
/// readings that land on the same instant, giving a typical-year profile. The monthly and
/// daily keys are not decided yet.
pub fn calendar_mean(meter: &Meter, rebase: CalendarRebase) -> Result<Meter, MeterError> {
    match rebase {
        CalendarRebase::Year => {}
        CalendarRebase::Month => {
            return Err(MeterError::NotYetSpecified {
                operation: "monthly calendar mean",
            });
        }
        CalendarRebase::Day => {
            return Err(MeterError::NotYetSpecified {
                operation: "daily calendar mean",
            });
        }
    }

    let mut grouped: BTreeMap<DateTime<Utc>, Vec<f64>> = BTreeMap::new();
    for (at, quantity) in meter.readings() {
        let rebased = at
            .with_year(REPRESENTATIVE_YEAR)
            .ok_or_else(|| MeterError::RebaseOutOfRange {
                meter: meter.label().to_string(),
                at: *at,
            })?;
        grouped.entry(rebased).or_default().push(*quantity);
    }

    let readings = grouped
        .into_iter()
        .map(|(rebased, mut quantities)| {
            quantities.sort_by(f64::total_cmp);
            let count = quantities.len() as f64;
            (rebased, quantities.into_iter().sum::<f64>() / count)
        })
        .collect();

    Ok(Meter::from_readings(
        meter.label(),
        meter.quantum(),
        meter.interval(),
        readings,
    ))
}
