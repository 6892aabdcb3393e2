use crate::IngestError;

/// Where one ingestion attempt currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Captured,
    Normalized,
    Recognized,
    Confirmed,
    Stored,
    Failed,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Captured => "captured",
            Stage::Normalized => "normalized",
            Stage::Recognized => "recognized",
            Stage::Confirmed => "confirmed",
            Stage::Stored => "stored",
            Stage::Failed => "failed",
        }
    }

    /// `Captured -> Confirmed` is the manual-entry path that skips OCR.
    fn can_advance_to(self, next: Stage) -> bool {
        matches!(
            (self, next),
            (Stage::Captured, Stage::Normalized)
                | (Stage::Normalized, Stage::Recognized)
                | (Stage::Recognized, Stage::Confirmed)
                | (Stage::Captured, Stage::Confirmed)
                | (Stage::Confirmed, Stage::Stored)
                | (Stage::Captured, Stage::Failed)
                | (Stage::Normalized, Stage::Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Stored | Stage::Failed)
    }
}

/// Tracks one photograph (or one manual entry) through the ingestion stages.
///
/// Attempts are independent of each other and never shared between requests.
#[derive(Debug)]
pub struct IngestionAttempt {
    stage: Stage,
}

impl Default for IngestionAttempt {
    fn default() -> Self {
        Self::new()
    }
}

impl IngestionAttempt {
    pub fn new() -> Self {
        Self { stage: Stage::Captured }
    }

    /// Picks an attempt back up in a later request, e.g. a confirmation that
    /// follows an earlier recognition.
    pub fn resume(stage: Stage) -> Self {
        Self { stage }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn advance(&mut self, next: Stage) -> Result<(), IngestError> {
        if !self.stage.can_advance_to(next) {
            return Err(IngestError::InvalidTransition {
                from: self.stage,
                to: next,
            });
        }
        tracing::debug!(from = self.stage.as_str(), to = next.as_str(), "ingestion stage");
        self.stage = next;
        Ok(())
    }

    /// Marks the attempt failed when the current stage allows it. Later
    /// stages keep their state: a confirmed reading that fails to store can
    /// be resubmitted.
    pub fn fail(&mut self) {
        if self.stage.can_advance_to(Stage::Failed) {
            self.stage = Stage::Failed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn photograph_path_reaches_stored() {
        let mut attempt = IngestionAttempt::new();
        for next in [Stage::Normalized, Stage::Recognized, Stage::Confirmed, Stage::Stored] {
            attempt.advance(next).unwrap();
        }
        assert!(attempt.stage().is_terminal());
    }

    #[test]
    fn manual_entry_skips_recognition() {
        let mut attempt = IngestionAttempt::new();
        attempt.advance(Stage::Confirmed).unwrap();
        attempt.advance(Stage::Stored).unwrap();
    }

    #[test]
    fn recognition_cannot_be_skipped_into_storage() {
        let mut attempt = IngestionAttempt::new();
        let res = attempt.advance(Stage::Stored);
        assert!(matches!(
            res,
            Err(IngestError::InvalidTransition {
                from: Stage::Captured,
                to: Stage::Stored
            })
        ));
        assert_eq!(attempt.stage(), Stage::Captured);
    }

    #[test]
    fn failure_only_applies_before_recognition() {
        let mut early = IngestionAttempt::resume(Stage::Normalized);
        early.fail();
        assert_eq!(early.stage(), Stage::Failed);
        assert!(early.advance(Stage::Recognized).is_err());

        let mut late = IngestionAttempt::resume(Stage::Confirmed);
        late.fail();
        assert_eq!(late.stage(), Stage::Confirmed);
    }
}
