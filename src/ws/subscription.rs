//! Per-connection subscription manager.
//!
//! Tracks which users a WebSocket client follows and filters match events
//! by their parties.

use std::collections::HashSet;

use crate::domain::{MatchParties, UserId};

/// Manages the set of user subscriptions for a single WebSocket connection.
#[derive(Debug, Default)]
pub struct SubscriptionManager {
    /// Followed users. If `subscribe_all` is true, this set is ignored.
    user_ids: HashSet<UserId>,
    /// Whether the client receives every event (wildcard `"*"`).
    subscribe_all: bool,
}

impl SubscriptionManager {
    /// Creates a new empty subscription manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds users to the subscription set.
    pub fn subscribe(&mut self, ids: &[UserId], wildcard: bool) {
        if wildcard {
            self.subscribe_all = true;
        }
        self.user_ids.extend(ids.iter().copied());
    }

    /// Removes users from the subscription set. `wildcard` clears the
    /// wildcard flag.
    pub fn unsubscribe(&mut self, ids: &[UserId], wildcard: bool) {
        if wildcard {
            self.subscribe_all = false;
        }
        for id in ids {
            self.user_ids.remove(id);
        }
    }

    /// Returns `true` if an event between `parties` should be forwarded.
    #[must_use]
    pub fn matches(&self, parties: &MatchParties) -> bool {
        self.subscribe_all
            || self.user_ids.contains(&parties.requester_user_id)
            || self.user_ids.contains(&parties.acceptor_user_id)
    }

    /// Returns the number of explicitly followed users.
    #[must_use]
    pub fn count(&self) -> usize {
        self.user_ids.len()
    }

    /// Returns `true` if the wildcard subscription is active.
    #[must_use]
    pub fn is_subscribed_all(&self) -> bool {
        self.subscribe_all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parties(a: UserId, b: UserId) -> MatchParties {
        MatchParties {
            requester_user_id: a,
            acceptor_user_id: b,
        }
    }

    #[test]
    fn empty_matches_nothing() {
        let mgr = SubscriptionManager::new();
        assert!(!mgr.matches(&parties(UserId::new(), UserId::new())));
    }

    #[test]
    fn either_party_matches() {
        let mut mgr = SubscriptionManager::new();
        let me = UserId::new();
        mgr.subscribe(&[me], false);
        assert!(mgr.matches(&parties(me, UserId::new())));
        assert!(mgr.matches(&parties(UserId::new(), me)));
        assert!(!mgr.matches(&parties(UserId::new(), UserId::new())));
    }

    #[test]
    fn wildcard_matches_everything_until_removed() {
        let mut mgr = SubscriptionManager::new();
        mgr.subscribe(&[], true);
        assert!(mgr.matches(&parties(UserId::new(), UserId::new())));
        mgr.unsubscribe(&[], true);
        assert!(!mgr.is_subscribed_all());
    }

    #[test]
    fn unsubscribe_removes_user() {
        let mut mgr = SubscriptionManager::new();
        let id = UserId::new();
        mgr.subscribe(&[id, UserId::new()], false);
        assert_eq!(mgr.count(), 2);
        mgr.unsubscribe(&[id], false);
        assert_eq!(mgr.count(), 1);
        assert!(!mgr.matches(&parties(id, UserId::new())));
    }
}
