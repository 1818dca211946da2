//! Background task turning match events into emails.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::templates::{SwapNotice, render};
use super::EmailSender;
use crate::domain::{MatchEvent, ShiftId, ShiftRecord, UserId};
use crate::persistence::SwapStore;

/// Outcome counters for one handled event.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Emails handed to the provider successfully.
    pub sent: usize,
    /// Emails that failed or timed out.
    pub failed: usize,
    /// Recipients skipped because no address or shift could be resolved.
    pub skipped: usize,
}

/// Subscribes to the event bus and emails both parties on accepted and
/// completed matches.
#[derive(Debug, Clone)]
pub struct Notifier {
    store: Arc<dyn SwapStore>,
    sender: Arc<dyn EmailSender>,
    timeout: Duration,
}

impl Notifier {
    /// Creates a notifier. `timeout` bounds every store lookup and send.
    #[must_use]
    pub fn new(store: Arc<dyn SwapStore>, sender: Arc<dyn EmailSender>, timeout: Duration) -> Self {
        Self {
            store,
            sender,
            timeout,
        }
    }

    /// Runs the notifier until the bus closes.
    #[must_use]
    pub fn spawn(self, mut events: broadcast::Receiver<MatchEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        let report = self.handle(&event).await;
                        tracing::debug!(
                            match_id = %event.match_id(),
                            event_type = event.event_type_str(),
                            sent = report.sent,
                            failed = report.failed,
                            skipped = report.skipped,
                            "notification pass finished"
                        );
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(lagged = n, "notifier lagged behind event bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            tracing::debug!("notifier stopped");
        })
    }

    /// Sends the emails for one event. Never fails; problems are logged and
    /// counted.
    pub async fn handle(&self, event: &MatchEvent) -> DeliveryReport {
        let (notice, requester_shift_id, acceptor_shift_id) = match event {
            MatchEvent::MatchAccepted {
                requester_shift_id,
                acceptor_shift_id,
                ..
            } => (SwapNotice::Accepted, *requester_shift_id, *acceptor_shift_id),
            MatchEvent::MatchCompleted {
                requester_shift_id,
                acceptor_shift_id,
                ..
            } => (SwapNotice::Completed, *requester_shift_id, *acceptor_shift_id),
            MatchEvent::MatchCreated { .. } | MatchEvent::MatchCancelled { .. } => {
                return DeliveryReport::default();
            }
        };

        let mut report = DeliveryReport::default();
        let Some((requester_shift, acceptor_shift)) =
            self.load_shifts(requester_shift_id, acceptor_shift_id).await
        else {
            tracing::warn!(match_id = %event.match_id(), "shifts unavailable; notifications skipped");
            report.skipped = 2;
            return report;
        };

        let parties = event.parties();
        let recipients = [
            (parties.requester_user_id, &requester_shift, &acceptor_shift),
            (parties.acceptor_user_id, &acceptor_shift, &requester_shift),
        ];
        for (user_id, given_up, taken_on) in recipients {
            let Some(address) = self.lookup_email(user_id).await else {
                report.skipped += 1;
                continue;
            };
            let message = render(notice, &address, given_up, taken_on);
            match tokio::time::timeout(self.timeout, self.sender.send(&message)).await {
                Ok(Ok(())) => report.sent += 1,
                Ok(Err(e)) => {
                    tracing::warn!(%user_id, error = %e, "notification email failed");
                    report.failed += 1;
                }
                Err(_) => {
                    tracing::warn!(%user_id, "notification email timed out");
                    report.failed += 1;
                }
            }
        }
        report
    }

    async fn load_shifts(&self, a: ShiftId, b: ShiftId) -> Option<(ShiftRecord, ShiftRecord)> {
        let shifts = match tokio::time::timeout(self.timeout, self.store.shifts_by_ids(&[a, b])).await
        {
            Ok(Ok(shifts)) => shifts,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "shift lookup for notification failed");
                return None;
            }
            Err(_) => {
                tracing::warn!("shift lookup for notification timed out");
                return None;
            }
        };
        let find = |id: ShiftId| shifts.iter().find(|s| s.id == id).cloned();
        Some((find(a)?, find(b)?))
    }

    async fn lookup_email(&self, user_id: UserId) -> Option<String> {
        match tokio::time::timeout(self.timeout, self.store.user_email(user_id)).await {
            Ok(Ok(Some(address))) => Some(address),
            Ok(Ok(None)) => {
                tracing::warn!(%user_id, "no email address registered");
                None
            }
            Ok(Err(e)) => {
                tracing::warn!(%user_id, error = %e, "email lookup failed");
                None
            }
            Err(_) => {
                tracing::warn!(%user_id, "email lookup timed out");
                None
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{NaiveDate, NaiveTime, Utc};

    use super::*;
    use crate::domain::{MatchId, MatchParties};
    use crate::notify::{EmailError, EmailMessage};
    use crate::persistence::MemoryStore;

    #[derive(Debug, Default)]
    struct RecordingSender {
        sent: Mutex<Vec<EmailMessage>>,
    }

    #[async_trait]
    impl EmailSender for RecordingSender {
        async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
            if let Ok(mut sent) = self.sent.lock() {
                sent.push(message.clone());
            }
            Ok(())
        }
    }

    #[derive(Debug)]
    struct FailingSender;

    #[async_trait]
    impl EmailSender for FailingSender {
        async fn send(&self, _message: &EmailMessage) -> Result<(), EmailError> {
            Err(EmailError::Build("provider rejected".to_string()))
        }
    }

    fn shift(owner: UserId, day: u32) -> ShiftRecord {
        let (Some(date), Some(start), Some(end)) = (
            NaiveDate::from_ymd_opt(2025, 6, day),
            NaiveTime::from_hms_opt(8, 0, 0),
            NaiveTime::from_hms_opt(16, 0, 0),
        ) else {
            panic!("valid fixture");
        };
        ShiftRecord {
            id: ShiftId::new(),
            date,
            start_time: start,
            end_time: end,
            truck_name: None,
            colleague_type: None,
            owner_user_id: owner,
        }
    }

    async fn setup(register_both: bool) -> (Arc<MemoryStore>, MatchEvent) {
        let store = Arc::new(MemoryStore::new());
        let x = UserId::new();
        let y = UserId::new();
        let Ok(()) = store.upsert_user_email(x, "x@example.com").await else {
            panic!("register x");
        };
        if register_both {
            let Ok(()) = store.upsert_user_email(y, "y@example.com").await else {
                panic!("register y");
            };
        }
        let sx = shift(x, 1);
        let sy = shift(y, 10);
        let Ok(()) = store.insert_shifts(&[sx.clone(), sy.clone()]).await else {
            panic!("insert shifts");
        };
        let event = MatchEvent::MatchAccepted {
            match_id: MatchId::new(),
            parties: MatchParties {
                requester_user_id: x,
                acceptor_user_id: y,
            },
            accepted_by: Some(x),
            requester_shift_id: sx.id,
            acceptor_shift_id: sy.id,
            timestamp: Utc::now(),
        };
        (store, event)
    }

    #[tokio::test]
    async fn accepted_match_emails_both_parties() {
        let (store, event) = setup(true).await;
        let sender = Arc::new(RecordingSender::default());
        let notifier = Notifier::new(store, Arc::clone(&sender) as Arc<dyn EmailSender>, Duration::from_secs(1));

        let report = notifier.handle(&event).await;
        assert_eq!(report.sent, 2);

        let Ok(sent) = sender.sent.lock() else {
            panic!("lock");
        };
        let mut recipients: Vec<&str> = sent.iter().map(|m| m.to.as_str()).collect();
        recipients.sort_unstable();
        assert_eq!(recipients, vec!["x@example.com", "y@example.com"]);
    }

    #[tokio::test]
    async fn provider_failure_is_counted_not_raised() {
        let (store, event) = setup(true).await;
        let notifier = Notifier::new(store, Arc::new(FailingSender), Duration::from_secs(1));
        let report = notifier.handle(&event).await;
        assert_eq!(report.failed, 2);
        assert_eq!(report.sent, 0);
    }

    #[tokio::test]
    async fn missing_address_is_skipped() {
        let (store, event) = setup(false).await;
        let notifier = Notifier::new(store, Arc::new(RecordingSender::default()), Duration::from_secs(1));
        let report = notifier.handle(&event).await;
        assert_eq!(report.sent, 1);
        assert_eq!(report.skipped, 1);
    }

    #[tokio::test]
    async fn cancelled_event_sends_nothing() {
        let (store, _) = setup(true).await;
        let notifier = Notifier::new(store, Arc::new(RecordingSender::default()), Duration::from_secs(1));
        let event = MatchEvent::MatchCancelled {
            match_id: MatchId::new(),
            parties: MatchParties {
                requester_user_id: UserId::new(),
                acceptor_user_id: UserId::new(),
            },
            requests_reverted: false,
            timestamp: Utc::now(),
        };
        assert_eq!(notifier.handle(&event).await, DeliveryReport::default());
    }
}
