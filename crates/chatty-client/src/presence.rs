//! Online-user roster.
//!
//! Fed only by the push transport: every roster event is a full snapshot and
//! replaces the set wholesale. Cleared whenever the connection goes away.

use std::collections::BTreeSet;

use tokio::sync::watch;

use chatty_shared::UserId;

pub struct PresenceTracker {
    online: watch::Sender<BTreeSet<UserId>>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        let (online, _) = watch::channel(BTreeSet::new());
        Self { online }
    }

    /// Observe roster changes.
    pub fn subscribe(&self) -> watch::Receiver<BTreeSet<UserId>> {
        self.online.subscribe()
    }

    pub fn replace_all<I>(&self, ids: I)
    where
        I: IntoIterator<Item = UserId>,
    {
        let roster: BTreeSet<UserId> = ids.into_iter().collect();
        tracing::debug!(online = roster.len(), "presence roster replaced");
        self.online.send_replace(roster);
    }

    pub fn clear(&self) {
        self.online.send_if_modified(|set| {
            let changed = !set.is_empty();
            set.clear();
            changed
        });
    }

    pub fn is_online(&self, id: &UserId) -> bool {
        self.online.borrow().contains(id)
    }

    /// Online ids in a stable order.
    pub fn online_ids(&self) -> Vec<UserId> {
        self.online.borrow().iter().cloned().collect()
    }

    pub fn online_count(&self) -> usize {
        self.online.borrow().len()
    }

    /// Online users other than `self_id`.
    pub fn online_peer_count(&self, self_id: &UserId) -> usize {
        let online = self.online.borrow();
        online.len() - usize::from(online.contains(self_id))
    }
}

impl Default for PresenceTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[&str]) -> Vec<UserId> {
        raw.iter().map(|s| UserId::from(*s)).collect()
    }

    #[test]
    fn test_replace_all_is_a_snapshot() {
        let presence = PresenceTracker::new();
        presence.replace_all(ids(&["u1", "u2", "u3"]));
        presence.replace_all(ids(&["u2", "u1"]));

        assert_eq!(presence.online_ids(), ids(&["u1", "u2"]));
        assert!(!presence.is_online(&UserId::from("u3")));
    }

    #[test]
    fn test_clear() {
        let presence = PresenceTracker::new();
        presence.replace_all(ids(&["u1"]));
        presence.clear();
        assert_eq!(presence.online_count(), 0);
    }

    #[test]
    fn test_peer_count_excludes_self() {
        let presence = PresenceTracker::new();
        presence.replace_all(ids(&["me", "u1", "u2"]));
        assert_eq!(presence.online_peer_count(&UserId::from("me")), 2);
        assert_eq!(presence.online_peer_count(&UserId::from("other")), 3);
    }

    #[tokio::test]
    async fn test_subscribers_see_whole_roster() {
        let presence = PresenceTracker::new();
        let mut rx = presence.subscribe();

        presence.replace_all(ids(&["u1", "u2"]));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().len(), 2);
    }
}
