use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;

use crate::adapters::source::{SeriesSource, UpstreamError, http_client};
use crate::domain::grid::IntervalWidth;
use crate::domain::series::SourceSeries;

pub const SOURCE_NAME: &str = "octopus";
pub const START_LABEL: &str = "interval_start";
pub const QUANTITY_LABEL: &str = "consumption";

const PAGE_SIZE: u32 = 25_000;

#[derive(Clone)]
pub struct OctopusConfig {
    pub base_url: String,
    pub api_key: String,
    pub mpan: u64,
    pub serial: String,
    pub period_from: DateTime<Utc>,
    pub period_to: DateTime<Utc>,
    pub interval: IntervalWidth,
    pub timeout: Duration,
}

impl fmt::Debug for OctopusConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OctopusConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("mpan", &self.mpan)
            .field("serial", &self.serial)
            .field("period_from", &self.period_from)
            .field("period_to", &self.period_to)
            .field("interval", &self.interval)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct ConsumptionPage {
    results: Vec<ConsumptionReading>,
}

#[derive(Debug, Deserialize)]
struct ConsumptionReading {
    consumption: f64,
    interval_start: String,
}

pub struct OctopusClient {
    config: OctopusConfig,
    client: reqwest::blocking::Client,
}

impl OctopusClient {
    pub fn new(config: OctopusConfig) -> Result<Self, UpstreamError> {
        let client = http_client(config.timeout)?;
        Ok(Self { config, client })
    }

    fn consumption_url(&self) -> String {
        format!(
            "{}/electricity-meter-points/{}/meters/{}/consumption/",
            self.config.base_url.trim_end_matches('/'),
            self.config.mpan,
            self.config.serial
        )
    }
}

fn group_by(interval: IntervalWidth) -> &'static str {
    match interval {
        IntervalWidth::Hour => "hour",
    }
}

impl SeriesSource for OctopusClient {
    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    fn fetch(&self) -> Result<SourceSeries, UpstreamError> {
        let http_error = |error| UpstreamError::Http {
            source_name: SOURCE_NAME,
            error,
        };

        let period_from = self
            .config
            .period_from
            .to_rfc3339_opts(SecondsFormat::Secs, true);
        let period_to = self
            .config
            .period_to
            .to_rfc3339_opts(SecondsFormat::Secs, true);
        let page_size = PAGE_SIZE.to_string();

        tracing::info!(
            mpan = self.config.mpan,
            period_from = %period_from,
            period_to = %period_to,
            "fetching octopus consumption"
        );

        let body = self
            .client
            .get(self.consumption_url())
            .basic_auth(&self.config.api_key, Some(""))
            .query(&[
                ("period_from", period_from.as_str()),
                ("period_to", period_to.as_str()),
                ("page_size", page_size.as_str()),
                ("group_by", group_by(self.config.interval)),
            ])
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .and_then(reqwest::blocking::Response::text)
            .map_err(http_error)?;

        parse_consumption(&body)
    }
}

/// Parses a consumption page into a source series.
///
/// The first result is dropped: the API labels it against the wrong interval.
pub fn parse_consumption(body: &str) -> Result<SourceSeries, UpstreamError> {
    let page: ConsumptionPage =
        serde_json::from_str(body).map_err(|error| UpstreamError::data(SOURCE_NAME, error))?;

    let mut series = SourceSeries::new(SOURCE_NAME, START_LABEL, QUANTITY_LABEL);
    for reading in page.results.into_iter().skip(1) {
        let start = DateTime::parse_from_rfc3339(reading.interval_start.trim())
            .map_err(|error| {
                UpstreamError::data(
                    SOURCE_NAME,
                    format!("invalid interval_start '{}': {error}", reading.interval_start),
                )
            })?
            .with_timezone(&Utc);
        series.push(
            start,
            BTreeMap::from([(QUANTITY_LABEL.to_string(), reading.consumption)]),
        );
    }

    if series.records.is_empty() {
        return Err(UpstreamError::data(
            SOURCE_NAME,
            "no consumption readings after the leading record",
        ));
    }

    tracing::info!(readings = series.records.len(), "parsed octopus consumption");

    Ok(series)
}
