use std::sync::atomic::{AtomicI64, Ordering};

use time::{Duration, OffsetDateTime};

/// Hands out capture timestamps that never repeat or go backwards within the
/// process, at microsecond precision (what Postgres `timestamptz` keeps).
///
/// Two confirmations landing in the same microsecond get consecutive
/// microseconds instead of colliding in the store.
#[derive(Debug, Default)]
pub struct MonotonicClock {
    last_micros: AtomicI64,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> OffsetDateTime {
        self.next_after(OffsetDateTime::now_utc())
    }

    fn next_after(&self, wall: OffsetDateTime) -> OffsetDateTime {
        let wall_micros = i64::try_from(wall.unix_timestamp_nanos() / 1_000).unwrap_or(i64::MAX);

        let mut last = self.last_micros.load(Ordering::Relaxed);
        loop {
            let next = wall_micros.max(last.saturating_add(1));
            match self
                .last_micros
                .compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return OffsetDateTime::UNIX_EPOCH + Duration::microseconds(next),
                Err(actual) => last = actual,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{collections::HashSet, sync::Arc};
    use time::macros::datetime;

    #[test]
    fn same_wall_time_yields_increasing_instants() {
        let clock = MonotonicClock::new();
        let wall = datetime!(2024-05-01 12:00:00.000001500 UTC);

        let a = clock.next_after(wall);
        let b = clock.next_after(wall);
        assert_eq!(a, datetime!(2024-05-01 12:00:00.000001 UTC));
        assert_eq!(b - a, Duration::microseconds(1));
    }

    #[test]
    fn wall_clock_stepping_back_does_not_go_backwards() {
        let clock = MonotonicClock::new();
        let later = clock.next_after(datetime!(2024-05-01 12:00:00 UTC));
        let earlier = clock.next_after(datetime!(2024-05-01 11:59:00 UTC));
        assert!(earlier > later);
    }

    #[test]
    fn concurrent_callers_never_share_an_instant() {
        let clock = Arc::new(MonotonicClock::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let clock = clock.clone();
                std::thread::spawn(move || (0..250).map(|_| clock.now()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for h in handles {
            for t in h.join().unwrap() {
                assert!(seen.insert(t));
            }
        }
        assert_eq!(seen.len(), 1000);
    }
}
