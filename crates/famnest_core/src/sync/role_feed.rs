//! Role change subscription registry.

use crate::model::family::GroupId;
use crate::model::role::Role;
use crate::model::ActorId;
use log::debug;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Handle returned by `RoleChangeFeed::subscribe`.
pub type SubscriptionId = u64;

/// Receives the new role (`None` when the membership was removed).
pub type RoleChangeCallback = Arc<dyn Fn(Option<Role>) + Send + Sync>;

/// One committed membership change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleChange {
    pub group_id: GroupId,
    pub user_id: ActorId,
    pub role: Option<Role>,
}

struct Subscriber {
    group_id: GroupId,
    user_id: ActorId,
    callback: RoleChangeCallback,
}

/// Subscriber registry keyed by subscription id.
#[derive(Default)]
pub struct RoleChangeFeed {
    next_id: AtomicU64,
    subscribers: Mutex<BTreeMap<SubscriptionId, Subscriber>>,
}

impl RoleChangeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a callback for one (group, user) membership record.
    pub fn subscribe(
        &self,
        group_id: GroupId,
        user_id: &str,
        callback: RoleChangeCallback,
    ) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.lock().insert(
            id,
            Subscriber {
                group_id,
                user_id: user_id.trim().to_string(),
                callback,
            },
        );
        debug!("event=role_feed_subscribe module=sync status=ok subscription_id={id}");
        id
    }

    /// Removes one subscription. Returns `false` when it was unknown.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.lock().remove(&id).is_some();
        debug!(
            "event=role_feed_unsubscribe module=sync status={} subscription_id={id}",
            if removed { "ok" } else { "not_found" }
        );
        removed
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    /// Delivers one change to matching subscribers and returns how many ran.
    ///
    /// Callbacks run after the registry lock is released, so a callback may
    /// subscribe or unsubscribe without deadlocking.
    pub fn publish(&self, change: &RoleChange) -> usize {
        let targets = self
            .lock()
            .values()
            .filter(|sub| sub.group_id == change.group_id && sub.user_id == change.user_id)
            .map(|sub| Arc::clone(&sub.callback))
            .collect::<Vec<_>>();

        for callback in &targets {
            callback(change.role);
        }

        debug!(
            "event=role_feed_publish module=sync status=ok group_id={} role={} delivered={}",
            change.group_id,
            change.role.map_or("none", Role::as_str),
            targets.len()
        );
        targets.len()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<SubscriptionId, Subscriber>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
