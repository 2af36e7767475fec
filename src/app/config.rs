use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use chrono_tz::Tz;

use crate::adapters::octopus::OctopusConfig;
use crate::adapters::pvgis::PvgisConfig;
use crate::adapters::wallbox_csv::{ExportClockCorrection, WallboxConfig};
use crate::app::AppError;
use crate::domain::grid::IntervalWidth;

const DEFAULT_OCTOPUS_URI: &str = "https://api.octopus.energy/v1";
const DEFAULT_PVGIS_URI: &str = "https://re.jrc.ec.europa.eu/api/v5_2";
const METER_QUANTUM: &str = "kWh";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub wallbox: WallboxConfig,
    pub octopus: OctopusConfig,
    pub pvgis: PvgisConfig,
    pub interval: IntervalWidth,
    pub output_path: PathBuf,
    pub include_solar: bool,
    /// Unit every meter is normalized to.
    pub quantum: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok(), Utc::now().date_naive())
    }

    pub(crate) fn from_lookup<F>(lookup: F, today: NaiveDate) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = required(&lookup, "API_KEY")?;
        let mpan = required(&lookup, "ELECTRICITY_MPAN")?
            .parse::<u64>()
            .map_err(|_| AppError::config("ELECTRICITY_MPAN must be a valid number"))?;
        let serial = required(&lookup, "ELECTRICITY_SERIAL")?;

        let interval = IntervalWidth::from_code(&string_or_default(&lookup, "INTERVAL", "h"))?;
        let timezone = string_or_default(&lookup, "TIMEZONE", "Europe/London")
            .parse::<Tz>()
            .map_err(|err| AppError::config(format!("TIMEZONE is not a known zone: {err}")))?;
        let clock_offset_minutes =
            parse_or_default(&lookup, "WALLBOX_CLOCK_OFFSET_MINUTES", 60_i64)?;
        let clock_correction = ExportClockCorrection::from_minutes(clock_offset_minutes)
            .ok_or_else(|| AppError::config("WALLBOX_CLOCK_OFFSET_MINUTES is out of range"))?;
        let timeout = Duration::from_secs(parse_or_default(&lookup, "HTTP_TIMEOUT_SECS", 30_u64)?);
        let (period_from, period_to) = lookback_window(today)?;

        Ok(Self {
            wallbox: WallboxConfig {
                csv_path: PathBuf::from(string_or_default(
                    &lookup,
                    "WALLBOX_CSV",
                    "SessionsReport.csv",
                )),
                language: string_or_default(&lookup, "WALLBOX_LANGUAGE", "en"),
                timezone,
                clock_correction,
            },
            octopus: OctopusConfig {
                base_url: string_or_default(&lookup, "OCTOPUS_URI", DEFAULT_OCTOPUS_URI),
                api_key,
                mpan,
                serial,
                period_from,
                period_to,
                interval,
                timeout,
            },
            pvgis: PvgisConfig {
                base_url: string_or_default(&lookup, "PVGIS_URI", DEFAULT_PVGIS_URI),
                latitude: parse_or_default(&lookup, "LAT", 51.789_115_f64)?,
                longitude: parse_or_default(&lookup, "LON", -1.532_447_f64)?,
                start_year: parse_or_default(&lookup, "SOLAR_START_YEAR", 2020_i32)?,
                end_year: parse_or_default(&lookup, "SOLAR_END_YEAR", 2020_i32)?,
                peak_power_kw: parse_or_default(&lookup, "PEAK_POWER_KW", 3.44_f64)?,
                mounting: string_or_default(&lookup, "MOUNTING", "building"),
                system_loss: parse_or_default(&lookup, "SYSTEM_LOSS", 14.0_f64)?,
                angle: parse_or_default(&lookup, "ANGLE", 35.0_f64)?,
                aspect: parse_or_default(&lookup, "ASPECT", -35.0_f64)?,
                timeout,
            },
            interval,
            output_path: PathBuf::from(string_or_default(
                &lookup,
                "OUTPUT_CSV",
                "consumption_comp.csv",
            )),
            include_solar: parse_flag(&lookup, "INCLUDE_SOLAR")?,
            quantum: METER_QUANTUM.to_string(),
        })
    }
}

/// The twelve whole months before the current one, midnight UTC at both ends.
fn lookback_window(today: NaiveDate) -> Result<(DateTime<Utc>, DateTime<Utc>), AppError> {
    let month_start = |year: i32| {
        NaiveDate::from_ymd_opt(year, today.month(), 1)
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|midnight| midnight.and_utc())
            .ok_or_else(|| AppError::config(format!("no lookback window for {today}")))
    };

    Ok((month_start(today.year() - 1)?, month_start(today.year())?))
}

fn required<F>(lookup: &F, key: &str) -> Result<String, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::config(format!("{key} is required")))
}

fn string_or_default<F>(lookup: &F, key: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_or_default<T, F>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr + Copy,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::config(format!("{key} must be a valid number"))),
        None => Ok(default),
    }
}

fn parse_flag<F>(lookup: &F, key: &str) -> Result<bool, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        None | Some("") | Some("false") | Some("0") | Some("no") => Ok(false),
        Some("true") | Some("1") | Some("yes") => Ok(true),
        Some(_) => Err(AppError::config(format!("{key} must be true or false"))),
    }
}
