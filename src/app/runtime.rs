use crate::adapters::csv_export::write_csv;
use crate::adapters::octopus::OctopusClient;
use crate::adapters::pvgis::PvgisClient;
use crate::adapters::source::{SeriesSource, UpstreamError};
use crate::adapters::wallbox_csv::{WallboxLabels, read_sessions};
use crate::app::config::AppConfig;
use crate::app::error::AppError;
use crate::domain::aggregate::aggregate_sessions;
use crate::domain::comparison::{ComparisonTable, build_comparison};
use crate::domain::grid::IntervalGrid;
use crate::domain::meter::{Meter, normalize};
use crate::domain::series::SourceSeries;

const WALLBOX_METER: &str = "wallbox";

pub fn run(config: AppConfig) -> Result<(), AppError> {
    let grid = IntervalGrid::from_width(config.interval);
    let sources = upstream_sources(&config)?;

    let table = build_comparison_table(&config, &grid, &sources)?;
    write_csv(&table, &config.output_path)?;

    tracing::info!(
        meters = table.columns.len(),
        buckets = table.rows.len(),
        output_csv = %config.output_path.display(),
        "meter comparison exported"
    );
    Ok(())
}

fn upstream_sources(config: &AppConfig) -> Result<Vec<Box<dyn SeriesSource>>, UpstreamError> {
    let mut sources: Vec<Box<dyn SeriesSource>> =
        vec![Box::new(OctopusClient::new(config.octopus.clone())?)];
    if config.include_solar {
        sources.push(Box::new(PvgisClient::new(config.pvgis.clone())?));
    }
    Ok(sources)
}

/// Wallbox sessions first, then one meter per upstream source, aligned on one grid.
pub(crate) fn build_comparison_table(
    config: &AppConfig,
    grid: &IntervalGrid,
    sources: &[Box<dyn SeriesSource>],
) -> Result<ComparisonTable, AppError> {
    let mut meters = Vec::with_capacity(sources.len() + 1);
    meters.push(load_session_meter(config, grid)?);

    for source in sources {
        let series = source.fetch()?;
        tracing::info!(
            source = source.name(),
            records = series.records.len(),
            "fetched upstream series"
        );
        meters.push(normalize(series, &config.quantum, grid)?);
    }

    Ok(build_comparison(&meters)?)
}

fn load_session_meter(config: &AppConfig, grid: &IntervalGrid) -> Result<Meter, AppError> {
    let labels = WallboxLabels::for_language(&config.wallbox.language)?;
    let sessions = read_sessions(&config.wallbox)?;
    let buckets = aggregate_sessions(grid, &sessions)?;

    tracing::info!(
        sessions = sessions.len(),
        buckets = buckets.len(),
        total = buckets.total(),
        "allocated wallbox sessions"
    );

    let series = SourceSeries::from_buckets(WALLBOX_METER, labels.start, labels.quantity, &buckets);
    Ok(normalize(series, &config.quantum, grid)?)
}
