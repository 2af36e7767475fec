use chrono::{DateTime, TimeDelta, Utc};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SessionError {
    #[error("session duration must not be negative, got {0}")]
    NegativeDuration(TimeDelta),
    #[error("session quantity must not be negative, got {0}")]
    NegativeQuantity(f64),
    #[error("session quantity must be finite, got {0}")]
    NonFiniteQuantity(f64),
    #[error("session starting at {start} with duration {duration} ends outside the calendar")]
    EndOutOfRange {
        start: DateTime<Utc>,
        duration: TimeDelta,
    },
    #[error("invalid session duration '{0}', expected H:MM:SS")]
    InvalidDuration(String),
}

/// One charging event. `quantity` is the total over the session, not a rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Session {
    start: DateTime<Utc>,
    duration: TimeDelta,
    quantity: f64,
}

impl Session {
    pub fn new(
        start: DateTime<Utc>,
        duration: TimeDelta,
        quantity: f64,
    ) -> Result<Self, SessionError> {
        if duration < TimeDelta::zero() {
            return Err(SessionError::NegativeDuration(duration));
        }
        if !quantity.is_finite() {
            return Err(SessionError::NonFiniteQuantity(quantity));
        }
        if quantity < 0.0 {
            return Err(SessionError::NegativeQuantity(quantity));
        }
        if start.checked_add_signed(duration).is_none() {
            return Err(SessionError::EndOutOfRange { start, duration });
        }

        Ok(Self {
            start,
            duration,
            quantity,
        })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn duration(&self) -> TimeDelta {
        self.duration
    }

    pub fn quantity(&self) -> f64 {
        self.quantity
    }

    pub fn end(&self) -> DateTime<Utc> {
        // Checked in `new`.
        self.start + self.duration
    }
}

/// Parses `H:MM:SS` with an optional fractional second. Hours may exceed 23.
pub fn parse_hms_duration(raw: &str) -> Result<TimeDelta, SessionError> {
    let invalid = || SessionError::InvalidDuration(raw.to_string());
    let trimmed = raw.trim();

    let mut parts = trimmed.split(':');
    let (Some(hours), Some(minutes), Some(seconds), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(invalid());
    };

    let hours = parse_digits(hours).ok_or_else(invalid)?;
    let minutes = parse_digits(minutes)
        .filter(|value| *value < 60)
        .ok_or_else(invalid)?;

    let (whole_seconds, fraction) = match seconds.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (seconds, None),
    };
    let whole_seconds = parse_digits(whole_seconds)
        .filter(|value| *value < 60)
        .ok_or_else(invalid)?;
    let nanos = match fraction {
        Some(fraction) => parse_fraction_nanos(fraction).ok_or_else(invalid)?,
        None => 0,
    };

    let total_seconds = hours
        .checked_mul(3600)
        .and_then(|value| value.checked_add(minutes * 60 + whole_seconds))
        .ok_or_else(invalid)?;

    TimeDelta::try_seconds(total_seconds)
        .and_then(|delta| delta.checked_add(&TimeDelta::nanoseconds(nanos)))
        .ok_or_else(invalid)
}

fn parse_digits(value: &str) -> Option<i64> {
    if value.is_empty() || !value.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

fn parse_fraction_nanos(fraction: &str) -> Option<i64> {
    if fraction.is_empty() || fraction.len() > 9 {
        return None;
    }
    let digits = parse_digits(fraction)?;
    let scale = 10_i64.pow(9 - fraction.len() as u32);
    Some(digits * scale)
}
