//! Live permission context that follows role changes.
//!
//! A watch never mutates an engine. Each delivered role produces a fresh
//! `PermissionEngine`, swapped in atomically; readers keep whatever snapshot
//! they already hold. Between an upstream change and its delivery the
//! snapshot is stale; storage re-checks every mutation regardless.

use crate::model::family::GroupId;
use crate::model::ActorId;
use crate::permission::engine::PermissionEngine;
use crate::repo::family_repo::RoleStore;
use crate::repo::RepoResult;
use crate::sync::role_feed::SubscriptionId;
use log::debug;
use std::sync::{Arc, PoisonError, RwLock};

type EngineSlot = Arc<RwLock<EngineState>>;

/// Current engine plus the number of role deliveries received so far.
struct EngineState {
    deliveries: u64,
    engine: Arc<PermissionEngine>,
}

/// Engine holder for one (actor, family group) pair.
pub struct PermissionWatch {
    group_id: GroupId,
    actor_id: ActorId,
    slot: EngineSlot,
    subscription_id: SubscriptionId,
}

impl PermissionWatch {
    /// Subscribes to role changes, then resolves the current role.
    ///
    /// Subscribing first means no change committed after resolution can be
    /// missed. The resolved role is installed only while no delivery has
    /// arrived yet; a delivered role is at least as recent as the read.
    pub fn attach<S: RoleStore + ?Sized>(
        store: &S,
        group_id: GroupId,
        actor_id: &str,
    ) -> RepoResult<Self> {
        let actor_id = actor_id.trim().to_string();
        let slot: EngineSlot = Arc::new(RwLock::new(EngineState {
            deliveries: 0,
            engine: Arc::new(PermissionEngine::new(None, Some(actor_id.clone()))),
        }));

        let callback_slot = Arc::clone(&slot);
        let callback_actor = actor_id.clone();
        let subscription_id = store.subscribe_to_role_changes(
            group_id,
            &actor_id,
            Arc::new(move |role| {
                let engine = PermissionEngine::new(role, Some(callback_actor.clone()));
                let mut state = callback_slot
                    .write()
                    .unwrap_or_else(PoisonError::into_inner);
                state.deliveries += 1;
                state.engine = Arc::new(engine);
            }),
        );

        let role = match store.resolve_role(group_id, &actor_id) {
            Ok(role) => role,
            Err(err) => {
                store.unsubscribe(subscription_id);
                return Err(err);
            }
        };

        let installed = {
            let mut state = slot.write().unwrap_or_else(PoisonError::into_inner);
            if state.deliveries == 0 {
                state.engine = Arc::new(PermissionEngine::new(role, Some(actor_id.clone())));
                true
            } else {
                false
            }
        };
        debug!(
            "event=permission_watch_attach module=permission status=ok group_id={group_id} subscription_id={subscription_id} role={} resolved_installed={installed}",
            role.map_or("none", |role| role.as_str())
        );

        Ok(Self {
            group_id,
            actor_id,
            slot,
            subscription_id,
        })
    }

    /// Current engine snapshot.
    pub fn current(&self) -> Arc<PermissionEngine> {
        let state = self.slot.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&state.engine)
    }

    pub fn group_id(&self) -> GroupId {
        self.group_id
    }

    pub fn actor_id(&self) -> &str {
        &self.actor_id
    }

    /// Stops following role changes. The last snapshot stays readable by
    /// anyone already holding it.
    pub fn detach<S: RoleStore + ?Sized>(self, store: &S) -> bool {
        let removed = store.unsubscribe(self.subscription_id);
        debug!(
            "event=permission_watch_detach module=permission status=ok group_id={} subscription_id={} removed={removed}",
            self.group_id, self.subscription_id
        );
        removed
    }
}
