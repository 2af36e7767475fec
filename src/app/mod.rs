mod config;
mod error;
mod logging;
mod runtime;

pub use config::AppConfig;
pub use error::AppError;

pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    logging::init()?;

    let config = AppConfig::from_env()?;

    tracing::info!(
        wallbox_csv = %config.wallbox.csv_path.display(),
        timezone = %config.wallbox.timezone.name(),
        interval = config.interval.code(),
        period_from = %config.octopus.period_from,
        period_to = %config.octopus.period_to,
        include_solar = config.include_solar,
        output_csv = %config.output_path.display(),
        "application bootstrap initialized"
    );

    runtime::run(config)
}
