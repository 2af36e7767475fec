use std::fs::File;
use std::io::Read;
use std::path::PathBuf;

use chrono::{DateTime, LocalResult, NaiveDateTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use csv::StringRecord;
use thiserror::Error;

use crate::domain::session::{Session, SessionError, parse_hms_duration};

const START_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Column headers of a Wallbox sessions export, per export language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WallboxLabels {
    pub start: &'static str,
    pub duration: &'static str,
    pub quantity: &'static str,
}

const LABELS: &[(&str, WallboxLabels)] = &[(
    "en",
    WallboxLabels {
        start: "Start",
        duration: "Charging time (h:m:s)",
        quantity: "Energy (kWh)",
    },
)];

impl WallboxLabels {
    pub fn for_language(language: &str) -> Result<Self, WallboxError> {
        let language = language.trim();
        LABELS
            .iter()
            .find(|(code, _)| code.eq_ignore_ascii_case(language))
            .map(|(_, labels)| *labels)
            .ok_or_else(|| WallboxError::UnsupportedLanguage(language.to_string()))
    }
}

/// Shift applied to export timestamps before they are localized.
///
/// The Wallbox export stamps sessions one hour late. This correction undoes that and should be
/// set to zero once the export is fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportClockCorrection {
    offset: TimeDelta,
}

impl ExportClockCorrection {
    pub fn from_minutes(minutes: i64) -> Option<Self> {
        TimeDelta::try_minutes(minutes).map(|offset| Self { offset })
    }

    pub fn offset(&self) -> TimeDelta {
        self.offset
    }

    pub fn apply(&self, stamped: NaiveDateTime) -> Option<NaiveDateTime> {
        stamped.checked_sub_signed(self.offset)
    }
}

#[derive(Debug, Clone)]
pub struct WallboxConfig {
    pub csv_path: PathBuf,
    pub language: String,
    pub timezone: Tz,
    pub clock_correction: ExportClockCorrection,
}

#[derive(Debug, Error)]
pub enum WallboxError {
    #[error("unsupported wallbox export language: {0}")]
    UnsupportedLanguage(String),
    #[error("failed to open wallbox export {path}: {error}")]
    Open {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },
    #[error("failed to read wallbox export: {0}")]
    Csv(#[from] csv::Error),
    #[error("wallbox export is missing column '{0}'")]
    MissingColumn(&'static str),
    #[error("row {row}: invalid start timestamp '{value}'")]
    InvalidStart { row: usize, value: String },
    #[error("row {row}: invalid energy value '{value}'")]
    InvalidQuantity { row: usize, value: String },
    #[error("row {row}: local time {local} does not exist in {timezone}")]
    NonexistentLocalTime {
        row: usize,
        local: NaiveDateTime,
        timezone: String,
    },
    #[error("row {row}: {source}")]
    Session {
        row: usize,
        #[source]
        source: SessionError,
    },
}

struct Columns {
    start: usize,
    duration: usize,
    quantity: usize,
}

impl Columns {
    fn locate(headers: &StringRecord, labels: &WallboxLabels) -> Result<Self, WallboxError> {
        let find = |name: &'static str| {
            headers
                .iter()
                .position(|header| header.trim() == name)
                .ok_or(WallboxError::MissingColumn(name))
        };

        Ok(Self {
            start: find(labels.start)?,
            duration: find(labels.duration)?,
            quantity: find(labels.quantity)?,
        })
    }
}

pub fn read_sessions(config: &WallboxConfig) -> Result<Vec<Session>, WallboxError> {
    let file = File::open(&config.csv_path).map_err(|error| WallboxError::Open {
        path: config.csv_path.clone(),
        error,
    })?;
    read_sessions_from(file, config)
}

/// Reads one session per data row. `row` in errors counts data rows from 1.
pub fn read_sessions_from<R: Read>(
    reader: R,
    config: &WallboxConfig,
) -> Result<Vec<Session>, WallboxError> {
    let labels = WallboxLabels::for_language(&config.language)?;
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let columns = Columns::locate(reader.headers()?, &labels)?;

    let mut sessions = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record?;
        let row = index + 1;
        let field = |position: usize| record.get(position).unwrap_or_default().trim();

        let invalid_start = || WallboxError::InvalidStart {
            row,
            value: field(columns.start).to_string(),
        };
        let local = parse_start(field(columns.start))
            .and_then(|stamped| config.clock_correction.apply(stamped))
            .ok_or_else(invalid_start)?;
        let start = localize(local, config.timezone, row)?;

        let duration = parse_hms_duration(field(columns.duration))
            .map_err(|source| WallboxError::Session { row, source })?;
        let quantity = parse_quantity(field(columns.quantity)).ok_or_else(|| {
            WallboxError::InvalidQuantity {
                row,
                value: field(columns.quantity).to_string(),
            }
        })?;

        let session = Session::new(start, duration, quantity)
            .map_err(|source| WallboxError::Session { row, source })?;
        sessions.push(session);
    }

    tracing::info!(
        sessions = sessions.len(),
        timezone = %config.timezone.name(),
        clock_correction_minutes = config.clock_correction.offset().num_minutes(),
        "read wallbox sessions"
    );

    Ok(sessions)
}

fn parse_start(raw: &str) -> Option<NaiveDateTime> {
    START_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
}

/// The export writes decimals with a comma.
fn parse_quantity(raw: &str) -> Option<f64> {
    raw.replace(',', ".").parse().ok()
}

fn localize(local: NaiveDateTime, timezone: Tz, row: usize) -> Result<DateTime<Utc>, WallboxError> {
    match timezone.from_local_datetime(&local) {
        LocalResult::Single(instant) => Ok(instant.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, latest) => {
            tracing::warn!(
                row,
                local = %local,
                earliest = %earliest,
                latest = %latest,
                "ambiguous local session start, using the earlier instant"
            );
            Ok(earliest.with_timezone(&Utc))
        }
        LocalResult::None => Err(WallboxError::NonexistentLocalTime {
            row,
            local,
            timezone: timezone.name().to_string(),
        }),
    }
}
