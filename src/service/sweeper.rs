//! Periodic match sweep.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::MatchService;

/// Runs [`MatchService::run_sweep`] on a fixed interval.
#[derive(Debug, Clone)]
pub struct Sweeper {
    service: Arc<MatchService>,
    interval: Duration,
}

impl Sweeper {
    /// Creates a sweeper. A zero interval is raised to one second.
    #[must_use]
    pub fn new(service: Arc<MatchService>, interval: Duration) -> Self {
        Self {
            service,
            interval: interval.max(Duration::from_secs(1)),
        }
    }

    /// Spawns the sweep loop. The first sweep runs after one interval.
    #[must_use]
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker.tick().await;
            tracing::info!(interval_secs = self.interval.as_secs(), "match sweeper started");
            loop {
                ticker.tick().await;
                if let Err(e) = self.service.run_sweep().await {
                    tracing::warn!(error = %e, retryable = e.is_retryable(), "match sweep failed");
                }
            }
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::{NaiveDate, NaiveTime};

    use super::*;
    use crate::domain::{EventBus, MatchEvent, UserId};
    use crate::persistence::{MemoryStore, SwapStore};
    use crate::service::{Actor, PreferredDateInput, ServiceSettings, ShiftTemplate};

    fn on(day: u32) -> ShiftTemplate {
        let (Some(date), Some(start), Some(end)) = (
            NaiveDate::from_ymd_opt(2025, 6, day),
            NaiveTime::from_hms_opt(8, 0, 0),
            NaiveTime::from_hms_opt(16, 0, 0),
        ) else {
            panic!("valid fixture");
        };
        ShiftTemplate {
            date,
            start_time: start,
            end_time: end,
            truck_name: None,
            colleague_type: None,
        }
    }

    fn wanting(day: u32) -> Vec<PreferredDateInput> {
        let Some(date) = NaiveDate::from_ymd_opt(2025, 6, day) else {
            panic!("valid date");
        };
        vec![PreferredDateInput {
            date,
            shift_id: None,
            accepted_types: BTreeSet::new(),
        }]
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_creates_matches_on_tick() {
        let store: Arc<dyn SwapStore> = Arc::new(MemoryStore::new());
        let service = Arc::new(MatchService::new(
            store,
            EventBus::new(16),
            ServiceSettings::default(),
        ));
        let mut events = service.event_bus().subscribe();

        for (day, wants) in [(1, 2), (2, 1)] {
            let actor = Actor::User(UserId::new());
            let Ok(shift) = service.create_shift(actor, &on(day)).await else {
                panic!("shift");
            };
            let Ok(_) = service
                .submit_swap_request(actor, shift.id, &wanting(wants))
                .await
            else {
                panic!("request");
            };
        }

        let handle = Sweeper::new(Arc::clone(&service), Duration::from_secs(60)).spawn();
        let Ok(Ok(event)) = tokio::time::timeout(Duration::from_secs(120), events.recv()).await
        else {
            panic!("expected a match event from the sweep");
        };
        assert!(matches!(event, MatchEvent::MatchCreated { .. }));
        handle.abort();
    }
}
