use anyhow::{bail, Result};
use meter_client::domain::NewReading;
use meter_service::{
    config::AppConfig,
    observability,
    pipeline::Pipeline,
    sinks::ReadingStoreSink,
    sources::ReadingCsvFileSource,
    store,
    transform::{ReadingRecord, ReadingValidation},
};
use std::{env, sync::Arc};

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        bail!("usage: backfill_readings <csv_file_path>");
    }
    let file_path = &args[1];

    // METER_CONFIG may point at a backfill-specific file.
    let cfg = AppConfig::load()?;
    let (readings, _tenants) = store::from_config(&cfg.store).await?;

    let pipeline: Pipeline<_, ReadingRecord, NewReading, _> = Pipeline {
        source: ReadingCsvFileSource::new(file_path),
        transform: Arc::new(ReadingValidation),
        sink: ReadingStoreSink::new(readings),
    };

    let report = pipeline.run().await?;
    tracing::info!(accepted = report.accepted, rejected = report.rejected, "backfill finished");

    Ok(())
}
