//! Typed subscription registry for push events.
//!
//! Subscriptions are keyed by a caller-supplied [`SubscriptionId`];
//! registering the same id again replaces the previous callback instead of
//! duplicating it, so a consumer that re-registers across repeated mounts
//! never sees an event twice. Unregistering on teardown is mandatory and
//! the returned [`SubscriptionHandle`] does it on drop.

use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::PushEvent;
use crate::dashes::{DashTotalUpdate, NewDashEvent};
use crate::moments::Moment;
use crate::trending::TrendingUpdate;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionId(String);

impl SubscriptionId {
    /// A stable, caller-chosen id. Consumers that re-subscribe for the same
    /// purpose should reuse the same id to stay idempotent.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// A fresh random id for one-off subscribers.
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The four inbound push event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    NewDash,
    DashTotalUpdate,
    TrendingUpdate,
    NewMoment,
}

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

#[derive(Default)]
pub(crate) struct SubscriptionRegistry {
    new_dash: DashMap<SubscriptionId, Callback<NewDashEvent>>,
    dash_total: DashMap<SubscriptionId, Callback<DashTotalUpdate>>,
    trending: DashMap<SubscriptionId, Callback<TrendingUpdate>>,
    new_moment: DashMap<SubscriptionId, Callback<Moment>>,
}

impl SubscriptionRegistry {
    pub(crate) fn register_new_dash(&self, id: SubscriptionId, callback: Callback<NewDashEvent>) {
        self.new_dash.insert(id, callback);
    }

    pub(crate) fn register_dash_total(
        &self,
        id: SubscriptionId,
        callback: Callback<DashTotalUpdate>,
    ) {
        self.dash_total.insert(id, callback);
    }

    pub(crate) fn register_trending(&self, id: SubscriptionId, callback: Callback<TrendingUpdate>) {
        self.trending.insert(id, callback);
    }

    pub(crate) fn register_new_moment(&self, id: SubscriptionId, callback: Callback<Moment>) {
        self.new_moment.insert(id, callback);
    }

    pub(crate) fn unregister(&self, kind: EventKind, id: &SubscriptionId) {
        match kind {
            EventKind::NewDash => {
                self.new_dash.remove(id);
            }
            EventKind::DashTotalUpdate => {
                self.dash_total.remove(id);
            }
            EventKind::TrendingUpdate => {
                self.trending.remove(id);
            }
            EventKind::NewMoment => {
                self.new_moment.remove(id);
            }
        }
    }

    pub(crate) fn clear(&self) {
        self.new_dash.clear();
        self.dash_total.clear();
        self.trending.clear();
        self.new_moment.clear();
    }

    /// Fans a push event out to every subscriber of its kind.
    pub(crate) fn dispatch(&self, event: &PushEvent) {
        match event {
            PushEvent::NewDash(dash) => {
                for entry in self.new_dash.iter() {
                    entry.value()(dash);
                }
            }
            PushEvent::DashTotalUpdate(update) => {
                for entry in self.dash_total.iter() {
                    entry.value()(update);
                }
            }
            PushEvent::TrendingUpdate(update) => {
                for entry in self.trending.iter() {
                    entry.value()(update);
                }
            }
            PushEvent::NewMoment(new_moment) => {
                for entry in self.new_moment.iter() {
                    entry.value()(&new_moment.moment);
                }
            }
        }
    }

    pub(crate) fn count(&self, kind: EventKind) -> usize {
        match kind {
            EventKind::NewDash => self.new_dash.len(),
            EventKind::DashTotalUpdate => self.dash_total.len(),
            EventKind::TrendingUpdate => self.trending.len(),
            EventKind::NewMoment => self.new_moment.len(),
        }
    }
}

/// RAII guard for one registered subscription. Dropping it unregisters the
/// callback, which keeps repeated consumer mounts from stacking handlers.
pub struct SubscriptionHandle {
    registry: Arc<SubscriptionRegistry>,
    kind: EventKind,
    id: SubscriptionId,
}

impl SubscriptionHandle {
    pub(crate) fn new(
        registry: Arc<SubscriptionRegistry>,
        kind: EventKind,
        id: SubscriptionId,
    ) -> Self {
        Self { registry, kind, id }
    }

    pub fn id(&self) -> &SubscriptionId {
        &self.id
    }

    /// Explicit early teardown; equivalent to dropping the handle.
    pub fn unsubscribe(self) {}
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.registry.unregister(self.kind, &self.id);
    }
}

impl std::fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("kind", &self.kind)
            .field("id", &self.id)
            .finish()
    }
}
