use thiserror::Error;

use crate::adapters::csv_export::ExportError;
use crate::adapters::source::UpstreamError;
use crate::adapters::wallbox_csv::WallboxError;
use crate::domain::aggregate::AggregateError;
use crate::domain::grid::GridError;
use crate::domain::meter::MeterError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to initialize logging: {0}")]
    LoggingInit(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("invalid interval grid: {0}")]
    Grid(#[from] GridError),
    #[error("failed to load wallbox sessions: {0}")]
    Sessions(#[from] WallboxError),
    #[error("failed to aggregate sessions: {0}")]
    Aggregate(#[from] AggregateError),
    #[error("upstream source failed: {0}")]
    Upstream(#[from] UpstreamError),
    #[error("failed to align meters: {0}")]
    Meter(#[from] MeterError),
    #[error("failed to export comparison: {0}")]
    Export(#[from] ExportError),
}

impl AppError {
    pub fn logging_init<E: std::fmt::Display>(error: E) -> Self {
        Self::LoggingInit(error.to_string())
    }

    pub fn config<E: std::fmt::Display>(error: E) -> Self {
        Self::Config(error.to_string())
    }
}
