use std::{fs::File, path::PathBuf, time::SystemTime};

use csv::StringRecord;
use time::OffsetDateTime;

use crate::{
    pipeline::{Envelope, EnvelopeStream, PipelineError, Source},
    transform::{ConfirmedReading, ReadingRecord},
};

/// CSV backfill source for historical readings.
///
/// Expected header columns (by name):
/// - room_number
/// - meter_type (`water` or `electric`)
/// - reading_value (digits, leading zeros kept)
/// - captured_at (RFC3339 timestamp)
/// - image_url (optional)
/// - recorded_by (optional)
///
/// A record that cannot be parsed is yielded as an error and the file keeps
/// streaming.
pub struct ReadingCsvFileSource {
    path: PathBuf,
}

impl ReadingCsvFileSource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

fn parse_optional_string(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn record_to_reading(record: &StringRecord, headers: &StringRecord) -> Result<ReadingRecord, PipelineError> {
    let get = |name: &str| -> Result<&str, PipelineError> {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .and_then(|idx| record.get(idx))
            .ok_or_else(|| PipelineError::Source(format!("missing column '{name}' in CSV record")))
    };

    let ts_str = get("captured_at")?;
    let captured_at = OffsetDateTime::parse(ts_str.trim(), &time::format_description::well_known::Rfc3339)
        .map_err(|e| PipelineError::Source(format!("invalid captured_at '{ts_str}': {e}")))?;

    Ok(ReadingRecord {
        confirmed: ConfirmedReading {
            room_number: get("room_number")?.to_string(),
            meter_type: get("meter_type")?.to_string(),
            reading: get("reading_value")?.to_string(),
            image_path: get("image_url").ok().and_then(parse_optional_string),
            user_id: get("recorded_by").ok().and_then(parse_optional_string),
        },
        captured_at,
    })
}

#[async_trait::async_trait]
impl Source<ReadingRecord> for ReadingCsvFileSource {
    async fn stream(&self) -> EnvelopeStream<ReadingRecord> {
        // Blocking CSV reads inside one task; backfill files are small.
        let path = self.path.clone();
        let s = async_stream::stream! {
            let file = match File::open(&path) {
                Ok(f) => f,
                Err(e) => {
                    yield Err(PipelineError::Source(format!("failed to open CSV file {}: {e}", path.display())));
                    return;
                }
            };
            let mut rdr = csv::Reader::from_reader(file);
            let headers = match rdr.headers() {
                Ok(h) => h.clone(),
                Err(e) => {
                    yield Err(PipelineError::Source(format!("failed to read CSV headers: {e}")));
                    return;
                }
            };

            for (idx, result) in rdr.records().enumerate() {
                let position = idx as u64 + 1;
                let parsed = result
                    .map_err(|e| PipelineError::Source(format!("record {position}: {e}")))
                    .and_then(|record| record_to_reading(&record, &headers));

                match parsed {
                    Ok(payload) => {
                        yield Ok(Envelope {
                            payload,
                            received_at: SystemTime::now(),
                            position,
                        });
                    }
                    Err(e) => {
                        metrics::counter!("backfill_csv_parse_errors_total").increment(1);
                        yield Err(e);
                    }
                }
            }
        };

        Box::pin(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::io::Write;

    #[tokio::test]
    async fn csv_rows_stream_in_file_order() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "room_number,meter_type,reading_value,captured_at,image_url,recorded_by").unwrap();
        writeln!(file, "101,electric,0100,2024-01-01T08:00:00Z,,").unwrap();
        writeln!(file, "101,electric,0135,not-a-date,,").unwrap();
        writeln!(file, "102,water,0042,2024-01-01T09:00:00Z,uploads/meter-a.jpg,3").unwrap();

        let items: Vec<_> = ReadingCsvFileSource::new(file.path()).stream().await.collect().await;
        assert_eq!(items.len(), 3);

        let first = items[0].as_ref().unwrap();
        assert_eq!(first.position, 1);
        assert_eq!(first.payload.confirmed.reading, "0100");
        assert_eq!(first.payload.confirmed.image_path, None);

        assert!(matches!(items[1], Err(PipelineError::Source(_))));

        let third = items[2].as_ref().unwrap();
        assert_eq!(third.payload.confirmed.meter_type, "water");
        assert_eq!(third.payload.confirmed.user_id.as_deref(), Some("3"));
    }

    #[tokio::test]
    async fn missing_file_yields_one_error() {
        let items: Vec<_> = ReadingCsvFileSource::new("/nonexistent/readings.csv")
            .stream()
            .await
            .collect()
            .await;
        assert_eq!(items.len(), 1);
        assert!(items[0].is_err());
    }
}
