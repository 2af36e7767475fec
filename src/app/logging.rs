use tracing_subscriber::{EnvFilter, fmt};

use crate::app::AppError;

/// HTTP client internals are noisy at `info`.
const DEFAULT_DIRECTIVES: &str = "info,reqwest=warn,hyper_util=warn,rustls=warn";

pub fn init() -> Result<(), AppError> {
    fmt()
        .with_env_filter(env_filter())
        .with_target(true)
        .try_init()
        .map_err(AppError::logging_init)
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES))
}
