use std::time::Duration;

use thiserror::Error;

use crate::domain::series::SourceSeries;

/// A collaborator that delivers one regular-grid series per fetch.
pub trait SeriesSource: Send + Sync {
    fn name(&self) -> &'static str;
    fn fetch(&self) -> Result<SourceSeries, UpstreamError>;
}

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request to {source_name} failed: {error}")]
    Http {
        source_name: &'static str,
        #[source]
        error: reqwest::Error,
    },
    #[error("{source_name} returned malformed data: {reason}")]
    Data {
        source_name: &'static str,
        reason: String,
    },
}

impl UpstreamError {
    pub fn data<E: std::fmt::Display>(source_name: &'static str, reason: E) -> Self {
        Self::Data {
            source_name,
            reason: reason.to_string(),
        }
    }
}

pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::blocking::Client, UpstreamError> {
    reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(UpstreamError::Client)
}
