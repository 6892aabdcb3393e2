use std::sync::{Arc, PoisonError, RwLock};

use meter_client::domain::{MeterType, Rate};
use serde::{Deserialize, Serialize};

use crate::IngestError;

/// Per-unit prices in effect at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rates {
    pub water: Rate,
    pub electric: Rate,
}

impl Default for Rates {
    fn default() -> Self {
        Self {
            water: Rate::whole(17),
            electric: Rate::whole(7),
        }
    }
}

impl Rates {
    pub fn rate_for(&self, meter_type: MeterType) -> Rate {
        match meter_type {
            MeterType::Water => self.water,
            MeterType::Electric => self.electric,
        }
    }
}

/// Partial replacement of the current rates.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct RateUpdate {
    pub water: Option<Rate>,
    pub electric: Option<Rate>,
}

/// Process-wide, mutable rate configuration.
///
/// Rates are not versioned: a change reprices every bill derived afterwards,
/// including bills for old readings. Derivations take one [`Rates`] snapshot
/// up front so a single response never mixes two rate sets.
#[derive(Debug, Clone, Default)]
pub struct RateBook {
    current: Arc<RwLock<Rates>>,
}

impl RateBook {
    pub fn new(initial: Rates) -> Self {
        Self {
            current: Arc::new(RwLock::new(initial)),
        }
    }

    pub fn snapshot(&self) -> Rates {
        *self.current.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn update(&self, update: RateUpdate) -> Result<Rates, IngestError> {
        for rate in [update.water, update.electric].into_iter().flatten() {
            if !rate.is_positive() {
                return Err(IngestError::InvalidRequest(format!("rate {rate} must be positive")));
            }
        }

        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(water) = update.water {
            current.water = water;
        }
        if let Some(electric) = update.electric {
            current.electric = electric;
        }
        tracing::info!(water = %current.water, electric = %current.electric, "rates updated");
        Ok(*current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_is_unaffected_by_later_updates() {
        let book = RateBook::new(Rates::default());
        let before = book.snapshot();

        book.update(RateUpdate {
            water: None,
            electric: Some(Rate::whole(9)),
        })
        .unwrap();

        assert_eq!(before.electric, Rate::whole(7));
        assert_eq!(book.snapshot().electric, Rate::whole(9));
        assert_eq!(book.snapshot().water, Rate::whole(17));
    }

    #[test]
    fn non_positive_update_is_rejected_and_changes_nothing() {
        let book = RateBook::new(Rates::default());
        let res = book.update(RateUpdate {
            water: Some(Rate::whole(20)),
            electric: Some(Rate::whole(0)),
        });

        assert!(matches!(res, Err(IngestError::InvalidRequest(_))));
        assert_eq!(book.snapshot(), Rates::default());
    }
}
