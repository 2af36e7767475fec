use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::adapters::source::{SeriesSource, UpstreamError, http_client};
use crate::domain::series::SourceSeries;

pub const SOURCE_NAME: &str = "pvgis";
pub const START_LABEL: &str = "time";
pub const QUANTITY_LABEL: &str = "P";

const HOURLY_ENDPOINT: &str = "/seriescalc";

#[derive(Debug, Clone)]
pub struct PvgisConfig {
    pub base_url: String,
    pub latitude: f64,
    pub longitude: f64,
    pub start_year: i32,
    pub end_year: i32,
    pub peak_power_kw: f64,
    /// `free` or `building`.
    pub mounting: String,
    /// Sum of system losses in percent.
    pub system_loss: f64,
    pub angle: f64,
    /// Azimuth of the plane: 0 = south, 90 = west, -90 = east.
    pub aspect: f64,
    pub timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct SeriesResponse {
    outputs: SeriesOutputs,
}

#[derive(Debug, Deserialize)]
struct SeriesOutputs {
    hourly: Vec<HourlyOutput>,
}

#[derive(Debug, Deserialize)]
struct HourlyOutput {
    time: String,
    #[serde(rename = "P")]
    power_w: f64,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

pub struct PvgisClient {
    config: PvgisConfig,
    client: reqwest::blocking::Client,
}

impl PvgisClient {
    pub fn new(config: PvgisConfig) -> Result<Self, UpstreamError> {
        let client = http_client(config.timeout)?;
        Ok(Self { config, client })
    }

    fn query(&self) -> Vec<(&'static str, String)> {
        let config = &self.config;
        vec![
            ("lat", config.latitude.to_string()),
            ("lon", config.longitude.to_string()),
            ("startyear", config.start_year.to_string()),
            ("endyear", config.end_year.to_string()),
            ("pvcalculation", "1".to_string()),
            ("peakpower", config.peak_power_kw.to_string()),
            ("mountingplace", config.mounting.clone()),
            ("loss", config.system_loss.to_string()),
            ("angle", config.angle.to_string()),
            ("aspect", config.aspect.to_string()),
            ("outputformat", "json".to_string()),
        ]
    }
}

impl SeriesSource for PvgisClient {
    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    fn fetch(&self) -> Result<SourceSeries, UpstreamError> {
        let url = format!(
            "{}{HOURLY_ENDPOINT}",
            self.config.base_url.trim_end_matches('/')
        );

        tracing::info!(
            start_year = self.config.start_year,
            end_year = self.config.end_year,
            peak_power_kw = self.config.peak_power_kw,
            "fetching pvgis hourly production"
        );

        let body = self
            .client
            .get(url)
            .query(&self.query())
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .and_then(reqwest::blocking::Response::text)
            .map_err(|error| UpstreamError::Http {
                source_name: SOURCE_NAME,
                error,
            })?;

        parse_hourly(&body)
    }
}

/// Parses `outputs.hourly` into a source series.
///
/// `P` arrives as watts averaged over the hour and is stored in kWh. Other numeric fields are
/// kept as-is.
pub fn parse_hourly(body: &str) -> Result<SourceSeries, UpstreamError> {
    let response: SeriesResponse =
        serde_json::from_str(body).map_err(|error| UpstreamError::data(SOURCE_NAME, error))?;

    if response.outputs.hourly.is_empty() {
        return Err(UpstreamError::data(SOURCE_NAME, "no hourly outputs"));
    }

    let mut series = SourceSeries::new(SOURCE_NAME, START_LABEL, QUANTITY_LABEL);
    for output in response.outputs.hourly {
        let start = parse_hour(&output.time)?;
        let mut values: BTreeMap<String, f64> = output
            .extra
            .iter()
            .filter_map(|(key, value)| value.as_f64().map(|number| (key.clone(), number)))
            .collect();
        values.insert(QUANTITY_LABEL.to_string(), output.power_w / 1000.0);
        series.push(start, values);
    }

    tracing::info!(readings = series.records.len(), "parsed pvgis hourly production");

    Ok(series)
}

/// `YYYYMMDD:HHMM`; the minutes are a sampling offset within the hour and are dropped.
fn parse_hour(raw: &str) -> Result<chrono::DateTime<Utc>, UpstreamError> {
    let invalid = || UpstreamError::data(SOURCE_NAME, format!("invalid time '{raw}'"));
    let trimmed = raw.trim();
    let hour = trimmed
        .get(..trimmed.len().saturating_sub(2))
        .filter(|hour| !hour.is_empty())
        .ok_or_else(invalid)?;

    NaiveDateTime::parse_from_str(&format!("{hour}00"), "%Y%m%d:%H%M")
        .map(|naive| naive.and_utc())
        .map_err(|_| invalid())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{PvgisClient, PvgisConfig, QUANTITY_LABEL, parse_hour, parse_hourly};
    use crate::adapters::source::UpstreamError;
    use crate::test_support::{assert_close, fixture_text, utc};

    #[test]
    fn parses_hourly_outputs_in_kwh() {
        let series = parse_hourly(&fixture_text("pvgis/seriescalc.json")).expect("fixture parses");

        assert_eq!(series.label, "pvgis");
        assert_eq!(series.records.len(), 4);
        assert_eq!(series.records[0].start, utc(2020, 6, 1, 0, 0, 0));
        assert_eq!(series.records[0].values.get(QUANTITY_LABEL), Some(&0.0));
        assert_close(series.records[3].values[QUANTITY_LABEL], 1.23456);
        assert_eq!(series.records[3].values.get("T2m"), Some(&19.4));
    }

    #[test]
    fn drops_sampling_minutes_from_time() {
        assert_eq!(parse_hour("20200101:0010").ok(), Some(utc(2020, 1, 1, 0, 0, 0)));
        assert_eq!(parse_hour("20201231:2310").ok(), Some(utc(2020, 12, 31, 23, 0, 0)));
        assert!(parse_hour("10").is_err());
        assert!(parse_hour("2020-01-01T00:10").is_err());
    }

    #[test]
    fn rejects_response_without_hourly_outputs() {
        assert!(matches!(
            parse_hourly(r#"{"outputs":{"monthly":[]}}"#),
            Err(UpstreamError::Data { .. })
        ));
        assert!(matches!(
            parse_hourly(r#"{"outputs":{"hourly":[]}}"#),
            Err(UpstreamError::Data { .. })
        ));
    }

    #[test]
    fn builds_query_from_configuration() {
        let client = PvgisClient::new(PvgisConfig {
            base_url: "https://re.jrc.ec.europa.eu/api/v5_2".to_string(),
            latitude: 51.789115,
            longitude: -1.532447,
            start_year: 2020,
            end_year: 2020,
            peak_power_kw: 3.44,
            mounting: "building".to_string(),
            system_loss: 14.0,
            angle: 35.0,
            aspect: -35.0,
            timeout: Duration::from_secs(5),
        })
        .expect("client builds");

        let query = client.query();
        assert!(query.contains(&("peakpower", "3.44".to_string())));
        assert!(query.contains(&("mountingplace", "building".to_string())));
        assert!(query.contains(&("aspect", "-35".to_string())));
        assert!(query.contains(&("outputformat", "json".to_string())));
    }
}
