use std::sync::Arc;

use futures::StreamExt;
use meter_client::{domain::NewReading, StoreError};

use crate::{
    pipeline::{Envelope, PipelineError, Sink, SinkReport},
    store::ReadingStore,
};

/// Appends validated readings one at a time.
///
/// Rejected records (bad input upstream, or a timestamp already taken in the
/// partition) are logged and counted. An unavailable store stops the run;
/// nothing is retried here.
pub struct ReadingStoreSink {
    store: Arc<dyn ReadingStore>,
}

impl ReadingStoreSink {
    pub fn new(store: Arc<dyn ReadingStore>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl Sink<NewReading> for ReadingStoreSink {
    async fn run<S>(&self, mut input: S) -> Result<SinkReport, PipelineError>
    where
        S: futures::Stream<Item = Result<Envelope<NewReading>, PipelineError>> + Send + Unpin + 'static,
    {
        let mut report = SinkReport::default();

        while let Some(item) = input.next().await {
            let env = match item {
                Ok(env) => env,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping record rejected upstream");
                    metrics::counter!("backfill_rejected_total").increment(1);
                    report.rejected += 1;
                    continue;
                }
            };

            let position = env.position;
            match self.store.append(env.payload).await {
                Ok(reading) => {
                    metrics::counter!("backfill_stored_total").increment(1);
                    tracing::debug!(position, id = reading.id, room = %reading.room_identifier, "backfilled reading");
                    report.accepted += 1;
                }
                Err(e @ StoreError::DuplicateTimestamp { .. }) => {
                    tracing::warn!(position, error = %e, "skipping duplicate reading");
                    metrics::counter!("backfill_rejected_total").increment(1);
                    report.rejected += 1;
                }
                Err(e) => {
                    tracing::error!(position, error = %e, "reading store failed during backfill, giving up");
                    return Err(PipelineError::Sink(format!("record {position}: {e}")));
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        pipeline::Pipeline,
        sources::ReadingCsvFileSource,
        store::MemoryReadingStore,
        transform::{ReadingRecord, ReadingValidation},
    };
    use meter_client::domain::MeterType;
    use std::io::Write;

    #[tokio::test]
    async fn backfill_counts_accepted_and_rejected_records() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "room_number,meter_type,reading_value,captured_at").unwrap();
        writeln!(file, "101,electric,0100,2024-01-01T08:00:00Z").unwrap();
        writeln!(file, "101,electric,0135,2024-02-01T08:00:00Z").unwrap();
        // same instant as the first row
        writeln!(file, "101,electric,0140,2024-01-01T08:00:00Z").unwrap();
        writeln!(file, "101,gas,0001,2024-03-01T08:00:00Z").unwrap();
        writeln!(file, "101,electric,,2024-03-01T08:00:00Z").unwrap();

        let store = Arc::new(MemoryReadingStore::default());
        let pipeline: Pipeline<_, ReadingRecord, NewReading, _> = Pipeline {
            source: ReadingCsvFileSource::new(file.path()),
            transform: Arc::new(ReadingValidation),
            sink: ReadingStoreSink::new(store.clone()),
        };

        let report = pipeline.run().await.unwrap();
        assert_eq!(report, SinkReport { accepted: 2, rejected: 3 });

        let stored = store.list_ordered("101", MeterType::Electric).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[1].reading_value.as_str(), "0135");
    }
}
