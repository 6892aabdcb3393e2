//! Sequences one photograph through normalization, recognition, human
//! confirmation and storage, and serves the derived usage/billing view.

pub mod clock;
pub mod stage;

use std::{collections::HashMap, sync::Arc, time::Instant};

use meter_client::domain::{MeterType, Reading};
use serde::Serialize;

use crate::{
    billing::{build_partition_view, DateRange, DerivedRow, Occupancy, RateBook},
    evidence::EvidenceStore,
    ocr::{DigitExtractor, Normalizer, Recognition},
    store::{ReadingStore, TenantDirectory},
    transform::{validate_reading, ConfirmedReading},
    IngestError,
};

pub use clock::MonotonicClock;
pub use stage::{IngestionAttempt, Stage};

/// What a recognition request hands back for the person to confirm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecognitionOutcome {
    pub recognition: Recognition,
    /// No usable digits; the value has to be typed in by hand.
    pub low_confidence: bool,
    pub evidence_reference: String,
}

/// Derived view filter. `None` fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewFilter {
    pub room: Option<String>,
    pub meter_type: Option<MeterType>,
    pub range: DateRange,
}

pub struct Orchestrator {
    normalizer: Normalizer,
    extractor: DigitExtractor,
    evidence: Arc<dyn EvidenceStore>,
    readings: Arc<dyn ReadingStore>,
    tenants: Arc<dyn TenantDirectory>,
    rates: RateBook,
    clock: MonotonicClock,
}

impl Orchestrator {
    pub fn new(
        normalizer: Normalizer,
        extractor: DigitExtractor,
        evidence: Arc<dyn EvidenceStore>,
        readings: Arc<dyn ReadingStore>,
        tenants: Arc<dyn TenantDirectory>,
        rates: RateBook,
    ) -> Self {
        Self {
            normalizer,
            extractor,
            evidence,
            readings,
            tenants,
            rates,
            clock: MonotonicClock::new(),
        }
    }

    pub fn rates(&self) -> &RateBook {
        &self.rates
    }

    pub fn tenants(&self) -> &Arc<dyn TenantDirectory> {
        &self.tenants
    }

    /// Normalizes and recognizes one photograph, then keeps it as evidence.
    ///
    /// OCR is never retried. An empty digit string comes back as a
    /// low-confidence outcome, not an error.
    pub async fn recognize(&self, payload: Vec<u8>) -> Result<RecognitionOutcome, IngestError> {
        metrics::counter!("ocr_requests_total").increment(1);
        let mut attempt = IngestionAttempt::new();

        if payload.is_empty() {
            attempt.fail();
            metrics::counter!("invalid_image_total").increment(1);
            tracing::warn!("rejected empty image payload");
            return Err(IngestError::InvalidImage("empty image payload".to_string()));
        }

        let normalizer = self.normalizer;
        let (payload, normalized) = tokio::task::spawn_blocking(move || {
            let normalized = normalizer.normalize(&payload);
            (payload, normalized)
        })
        .await
        .map_err(|e| IngestError::OcrEngineUnavailable(format!("normalization task failed: {e}")))?;

        let normalized = match normalized {
            Ok(img) => img,
            Err(e) => {
                attempt.fail();
                if matches!(e, IngestError::InvalidImage(_)) {
                    metrics::counter!("invalid_image_total").increment(1);
                    tracing::warn!(error = %e, "photograph rejected");
                } else {
                    tracing::error!(error = %e, "cannot stage normalized image");
                }
                return Err(e);
            }
        };
        attempt.advance(Stage::Normalized)?;

        // The staged file moves into the task and is removed when it finishes,
        // whether recognition succeeded or not.
        let extractor = self.extractor.clone();
        let started = Instant::now();
        let recognized = tokio::task::spawn_blocking(move || extractor.extract(&normalized))
            .await
            .map_err(|e| IngestError::OcrEngineUnavailable(format!("recognition task failed: {e}")))
            .and_then(|res| res);
        metrics::histogram!("ocr_duration_seconds").record(started.elapsed().as_secs_f64());

        let recognition = match recognized {
            Ok(r) => r,
            Err(e) => {
                attempt.fail();
                metrics::counter!("ocr_engine_failures_total").increment(1);
                tracing::error!(error = %e, "OCR engine failed");
                return Err(e);
            }
        };
        attempt.advance(Stage::Recognized)?;

        let low_confidence = recognition.low_confidence();
        if low_confidence {
            metrics::counter!("ocr_low_confidence_total").increment(1);
            tracing::warn!(raw = %recognition.raw_text.trim(), "no usable digits recognized, manual entry required");
        }

        let extension = image::guess_format(&payload)
            .ok()
            .and_then(|f| f.extensions_str().first().copied())
            .unwrap_or("img");
        let evidence_reference = self.evidence.put(&payload, extension).await?;

        tracing::info!(
            digits = %recognition.digits,
            low_confidence,
            evidence = %evidence_reference,
            "meter photograph recognized"
        );

        Ok(RecognitionOutcome {
            recognition,
            low_confidence,
            evidence_reference,
        })
    }

    /// Stores a human-confirmed reading.
    ///
    /// A reading carrying an evidence reference continues a recognition;
    /// one without is a manual entry. The capture time comes from the
    /// process clock, never from the caller.
    pub async fn confirm(&self, input: ConfirmedReading) -> Result<Reading, IngestError> {
        let mut attempt = IngestionAttempt::resume(if input.image_path.is_some() {
            Stage::Recognized
        } else {
            Stage::Captured
        });

        let reading = match validate_reading(input, self.clock.now()) {
            Ok(r) => r,
            Err(e) => {
                metrics::counter!("validation_reading_rejected_total").increment(1);
                tracing::warn!(error = %e, "confirmed reading rejected");
                return Err(e);
            }
        };
        attempt.advance(Stage::Confirmed)?;

        // Only the append itself is serialized per partition, inside the store.
        let stored = match self.readings.append(reading).await {
            Ok(r) => r,
            Err(e) => {
                metrics::counter!("reading_store_rejected_total").increment(1);
                tracing::warn!(error = %e, "reading store refused append");
                return Err(e.into());
            }
        };
        attempt.advance(Stage::Stored)?;

        metrics::counter!("readings_stored_total", "meter_type" => stored.meter_type.as_str()).increment(1);
        tracing::info!(
            id = stored.id,
            room = %stored.room_identifier,
            meter_type = %stored.meter_type,
            value = %stored.reading_value,
            "reading stored"
        );
        Ok(stored)
    }

    /// Recomputes usage and bills for every partition matching `filter`.
    ///
    /// Rates are read once per call; occupancy once per room. Rows come back
    /// newest first.
    pub async fn derived_view(&self, filter: &ViewFilter) -> Result<Vec<DerivedRow>, IngestError> {
        metrics::counter!("derived_view_requests_total").increment(1);
        let rates = self.rates.snapshot();

        let partitions = self
            .readings
            .partitions(filter.room.as_deref(), filter.meter_type)
            .await?;

        let mut occupancy: HashMap<String, Occupancy> = HashMap::new();
        let mut rows = Vec::new();

        for key in partitions {
            let history = self
                .readings
                .list_ordered(&key.room_identifier, key.meter_type)
                .await?;

            if !occupancy.contains_key(&key.room_identifier) {
                let occ = self.occupancy(&key.room_identifier).await;
                occupancy.insert(key.room_identifier.clone(), occ);
            }
            let occ = occupancy.get(&key.room_identifier).cloned().unwrap_or_default();

            let partition_rows = match build_partition_view(history, rates.rate_for(key.meter_type), &occ, &filter.range) {
                Ok(rows) => rows,
                Err(e) => {
                    tracing::error!(partition = %key, error = %e, "cannot derive usage for partition");
                    return Err(e.into());
                }
            };

            for row in partition_rows.iter().filter(|r| r.observation.anomaly) {
                metrics::counter!("usage_anomalies_total", "meter_type" => key.meter_type.as_str()).increment(1);
                tracing::warn!(
                    id = row.reading.id,
                    partition = %key,
                    usage = row.observation.usage,
                    "meter value went backwards"
                );
            }
            rows.extend(partition_rows);
        }

        rows.sort_by(|a, b| {
            b.reading
                .captured_at
                .cmp(&a.reading.captured_at)
                .then(b.reading.id.cmp(&a.reading.id))
        });
        Ok(rows)
    }

    /// Occupancy for one room. A directory failure leaves the count unknown
    /// (bills are then not split) rather than failing the whole view.
    async fn occupancy(&self, room: &str) -> Occupancy {
        let count = match self.tenants.occupancy_count(room).await {
            Ok(n) => Some(n),
            Err(e) => {
                tracing::warn!(room, error = %e, "occupancy unavailable, billing the whole room");
                None
            }
        };
        let names = match self.tenants.tenant_names(room).await {
            Ok(names) => names,
            Err(e) => {
                tracing::warn!(room, error = %e, "tenant names unavailable");
                Vec::new()
            }
        };
        Occupancy { count, names }
    }
}
