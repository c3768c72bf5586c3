//! Live trackers bound to realtime rooms.
//!
//! [`MomentLive`] joins one moment's room and tracks the latest dash event
//! plus the latest authoritative totals; [`CityLive`] joins a city room and
//! tracks trending changes and pushed moments. Switching the tracked target
//! leaves the old room and clears the subscriptions and state before
//! rejoining. Moment events for any other id are filtered out defensively,
//! tolerating a server that broadcasts more broadly than requested.

use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::dashes::NewDashEvent;
use crate::moments::Moment;
use crate::realtime::{RealtimeManager, Room, RoomGuard, SubscriptionHandle, SubscriptionId};
use crate::types::City;

/// Ephemeral per-moment counters. Never persisted; reset whenever the
/// tracked moment changes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveCounters {
    pub latest_dash: Option<NewDashEvent>,
    pub total_dashes: Option<i64>,
    pub dash_count: Option<i64>,
}

struct ActiveMoment {
    moment_id: String,
    _room: RoomGuard,
    _dash_sub: SubscriptionHandle,
    _total_sub: SubscriptionHandle,
}

pub struct MomentLive {
    realtime: RealtimeManager,
    instance: Uuid,
    counters: Arc<Mutex<LiveCounters>>,
    active: Option<ActiveMoment>,
}

impl MomentLive {
    pub fn new(realtime: RealtimeManager) -> Self {
        Self {
            realtime,
            instance: Uuid::new_v4(),
            counters: Arc::new(Mutex::new(LiveCounters::default())),
            active: None,
        }
    }

    pub fn moment_id(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.moment_id.as_str())
    }

    /// Snapshot of the current counters.
    pub fn counters(&self) -> LiveCounters {
        self.counters.lock().expect("counters lock poisoned").clone()
    }

    pub fn latest_dash(&self) -> Option<NewDashEvent> {
        self.counters().latest_dash
    }

    /// Latest authoritative `(total_dashes, dash_count)` pair, if any update
    /// arrived since the moment was set.
    pub fn totals(&self) -> Option<(i64, i64)> {
        let counters = self.counters();
        match (counters.total_dashes, counters.dash_count) {
            (Some(total), Some(count)) => Some((total, count)),
            _ => None,
        }
    }

    /// Clears the transient latest-dash display after its animation played.
    pub fn clear_latest_dash(&self) {
        self.counters
            .lock()
            .expect("counters lock poisoned")
            .latest_dash = None;
    }

    /// Points the tracker at a moment, or detaches it with `None`.
    ///
    /// Setting the id that is already tracked is a no-op. Any previous
    /// room membership and subscriptions are torn down before the new ones
    /// are created, so exactly one moment is ever subscribed at a time.
    pub fn set_moment(&mut self, moment_id: Option<&str>) {
        if self.moment_id() == moment_id {
            return;
        }

        // Teardown first: the old guards leave the room and unregister on
        // drop, and the counters only ever describe the current moment
        self.active = None;
        *self.counters.lock().expect("counters lock poisoned") = LiveCounters::default();

        let Some(moment_id) = moment_id else {
            return;
        };

        tracing::debug!(
            target: "dasham::live::set_moment",
            "Tracking live counters for moment {}",
            moment_id
        );

        let room = self.realtime.room_guard(Room::Moment(moment_id.to_string()));

        let id = moment_id.to_string();
        let counters = self.counters.clone();
        let dash_sub = self.realtime.subscribe_new_dash(
            SubscriptionId::new(format!("live-{}-new-dash", self.instance)),
            move |event| {
                if event.moment_id != id {
                    return;
                }
                counters.lock().expect("counters lock poisoned").latest_dash = Some(event.clone());
            },
        );

        let id = moment_id.to_string();
        let counters = self.counters.clone();
        let total_sub = self.realtime.subscribe_dash_totals(
            SubscriptionId::new(format!("live-{}-totals", self.instance)),
            move |update| {
                if update.moment_id != id {
                    return;
                }
                let mut counters = counters.lock().expect("counters lock poisoned");
                counters.total_dashes = Some(update.total_dashes);
                counters.dash_count = Some(update.dash_count);
            },
        );

        self.active = Some(ActiveMoment {
            moment_id: moment_id.to_string(),
            _room: room,
            _dash_sub: dash_sub,
            _total_sub: total_sub,
        });
    }
}

impl std::fmt::Debug for MomentLive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MomentLive")
            .field("moment_id", &self.moment_id())
            .field("counters", &self.counters())
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
struct CityEvents {
    trending_updated: Option<String>,
    new_moment: Option<Moment>,
}

struct ActiveCity {
    city: City,
    _room: RoomGuard,
    _trending_sub: SubscriptionHandle,
    _moment_sub: SubscriptionHandle,
}

/// City-scoped live updates: the latest trending change and the latest
/// pushed moment. The consumer takes the pushed moment and prepends it to
/// its feed; the trending signal is a cue to refetch the boards.
pub struct CityLive {
    realtime: RealtimeManager,
    instance: Uuid,
    events: Arc<Mutex<CityEvents>>,
    active: Option<ActiveCity>,
}

impl CityLive {
    pub fn new(realtime: RealtimeManager) -> Self {
        Self {
            realtime,
            instance: Uuid::new_v4(),
            events: Arc::new(Mutex::new(CityEvents::default())),
            active: None,
        }
    }

    pub fn city(&self) -> Option<City> {
        self.active.as_ref().map(|a| a.city)
    }

    /// Moment id of the latest trending change, if one arrived.
    pub fn trending_updated(&self) -> Option<String> {
        self.events
            .lock()
            .expect("events lock poisoned")
            .trending_updated
            .clone()
    }

    pub fn clear_trending_update(&self) {
        self.events
            .lock()
            .expect("events lock poisoned")
            .trending_updated = None;
    }

    /// Takes the latest pushed moment, clearing it so it is consumed once.
    pub fn take_new_moment(&self) -> Option<Moment> {
        self.events
            .lock()
            .expect("events lock poisoned")
            .new_moment
            .take()
    }

    /// Points the tracker at a city, or detaches it with `None`. Setting the
    /// city that is already tracked is a no-op.
    pub fn set_city(&mut self, city: Option<City>) {
        if self.city() == city {
            return;
        }

        self.active = None;
        *self.events.lock().expect("events lock poisoned") = CityEvents::default();

        let Some(city) = city else {
            return;
        };

        tracing::debug!(
            target: "dasham::live::set_city",
            "Tracking city updates for {}",
            city.slug()
        );

        let room = self.realtime.room_guard(Room::City(city));

        let events = self.events.clone();
        let trending_sub = self.realtime.subscribe_trending(
            SubscriptionId::new(format!("city-{}-trending", self.instance)),
            move |update| {
                events
                    .lock()
                    .expect("events lock poisoned")
                    .trending_updated = Some(update.moment_id.clone());
            },
        );

        let events = self.events.clone();
        let moment_sub = self.realtime.subscribe_new_moments(
            SubscriptionId::new(format!("city-{}-new-moment", self.instance)),
            move |moment| {
                events.lock().expect("events lock poisoned").new_moment = Some(moment.clone());
            },
        );

        self.active = Some(ActiveCity {
            city,
            _room: room,
            _trending_sub: trending_sub,
            _moment_sub: moment_sub,
        });
    }
}

impl std::fmt::Debug for CityLive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CityLive")
            .field("city", &self.city())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashes::{DashSender, DashTotalUpdate};
    use crate::realtime::{ControlMessage, PushEvent};
    use crate::types::Currency;
    use tokio::sync::mpsc;

    fn test_manager() -> RealtimeManager {
        let (event_sender, _event_receiver) = mpsc::channel(16);
        RealtimeManager::new("ws://localhost:4000/rt", event_sender)
    }

    fn dash_event(moment_id: &str, amount: i64) -> PushEvent {
        PushEvent::NewDash(NewDashEvent {
            dash_id: format!("d-{}", amount),
            moment_id: moment_id.to_string(),
            amount,
            currency: Currency::Ngn,
            message: None,
            sender: DashSender {
                id: "u1".to_string(),
                display_name: "Chidi".to_string(),
                username: "chidi_l".to_string(),
                avatar_url: None,
            },
            formatted_amount: format!("₦{}", amount / 100),
        })
    }

    fn totals_event(moment_id: &str, total: i64, count: i64) -> PushEvent {
        PushEvent::DashTotalUpdate(DashTotalUpdate {
            moment_id: moment_id.to_string(),
            total_dashes: total,
            dash_count: count,
        })
    }

    #[tokio::test]
    async fn test_tracks_events_for_current_moment() {
        let manager = test_manager();
        let mut live = MomentLive::new(manager.clone());

        live.set_moment(Some("m1"));
        manager.dispatch(&dash_event("m1", 5000));
        manager.dispatch(&totals_event("m1", 5000, 1));

        assert_eq!(live.latest_dash().unwrap().amount, 5000);
        assert_eq!(live.totals(), Some((5000, 1)));
    }

    #[tokio::test]
    async fn test_filters_events_for_other_moments() {
        let manager = test_manager();
        let mut live = MomentLive::new(manager.clone());

        live.set_moment(Some("m1"));
        manager.dispatch(&dash_event("m2", 5000));
        manager.dispatch(&totals_event("m2", 5000, 1));

        assert!(live.latest_dash().is_none());
        assert!(live.totals().is_none());
    }

    #[tokio::test]
    async fn test_switching_moments_clears_state_and_resubscribes() {
        let manager = test_manager();
        let mut live = MomentLive::new(manager.clone());

        live.set_moment(Some("m1"));
        manager.dispatch(&totals_event("m1", 5000, 1));
        assert_eq!(live.totals(), Some((5000, 1)));

        live.set_moment(Some("m2"));
        assert_eq!(live.counters(), LiveCounters::default());

        // Old subscription must be gone: m1 events are no longer observable
        manager.dispatch(&totals_event("m1", 9000, 2));
        assert!(live.totals().is_none());

        manager.dispatch(&totals_event("m2", 100, 1));
        assert_eq!(live.totals(), Some((100, 1)));
    }

    #[tokio::test]
    async fn test_exactly_one_room_membership_across_switches() {
        let manager = test_manager();
        let mut outbound = manager.take_outbound_receiver();
        let mut live = MomentLive::new(manager.clone());

        live.set_moment(Some("m1"));
        assert_eq!(
            outbound.try_recv().unwrap(),
            ControlMessage::JoinMoment {
                room: "m1".to_string()
            }
        );

        live.set_moment(Some("m2"));
        assert_eq!(
            outbound.try_recv().unwrap(),
            ControlMessage::LeaveMoment {
                room: "m1".to_string()
            }
        );
        assert_eq!(
            outbound.try_recv().unwrap(),
            ControlMessage::JoinMoment {
                room: "m2".to_string()
            }
        );
        assert!(outbound.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_set_same_moment_is_a_no_op() {
        let manager = test_manager();
        let mut outbound = manager.take_outbound_receiver();
        let mut live = MomentLive::new(manager.clone());

        live.set_moment(Some("m1"));
        let _ = outbound.try_recv();

        manager.dispatch(&totals_event("m1", 5000, 1));
        live.set_moment(Some("m1"));

        // No leave/join churn and no state reset
        assert!(outbound.try_recv().is_err());
        assert_eq!(live.totals(), Some((5000, 1)));
    }

    #[tokio::test]
    async fn test_detach_clears_everything() {
        let manager = test_manager();
        let mut live = MomentLive::new(manager.clone());

        live.set_moment(Some("m1"));
        manager.dispatch(&dash_event("m1", 5000));
        live.set_moment(None);

        assert!(live.moment_id().is_none());
        assert_eq!(live.counters(), LiveCounters::default());

        manager.dispatch(&dash_event("m1", 7000));
        assert!(live.latest_dash().is_none());
    }

    #[tokio::test]
    async fn test_city_live_tracks_trending_and_new_moments() {
        use crate::realtime::NewMomentEvent;
        use crate::trending::TrendingUpdate;

        let manager = test_manager();
        let mut city_live = CityLive::new(manager.clone());
        city_live.set_city(Some(City::Lagos));

        manager.dispatch(&PushEvent::TrendingUpdate(TrendingUpdate {
            moment_id: "m4".to_string(),
        }));
        assert_eq!(city_live.trending_updated().as_deref(), Some("m4"));

        city_live.clear_trending_update();
        assert!(city_live.trending_updated().is_none());

        manager.dispatch(&PushEvent::NewMoment(NewMomentEvent {
            moment: crate::moments::test_support::moment("fresh", 0, 0),
        }));

        // The pushed moment is consumed exactly once
        let pushed = city_live.take_new_moment().expect("new moment tracked");
        assert_eq!(pushed.id, "fresh");
        assert!(city_live.take_new_moment().is_none());
    }

    #[tokio::test]
    async fn test_city_live_switch_joins_and_leaves_rooms() {
        let manager = test_manager();
        let mut outbound = manager.take_outbound_receiver();
        let mut city_live = CityLive::new(manager.clone());

        city_live.set_city(Some(City::Lagos));
        assert_eq!(
            outbound.try_recv().unwrap(),
            ControlMessage::JoinCity {
                room: "lagos".to_string()
            }
        );

        city_live.set_city(Some(City::Nairobi));
        assert_eq!(
            outbound.try_recv().unwrap(),
            ControlMessage::LeaveCity {
                room: "lagos".to_string()
            }
        );
        assert_eq!(
            outbound.try_recv().unwrap(),
            ControlMessage::JoinCity {
                room: "nairobi".to_string()
            }
        );

        city_live.set_city(None);
        assert_eq!(
            outbound.try_recv().unwrap(),
            ControlMessage::LeaveCity {
                room: "nairobi".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_clear_latest_dash_keeps_totals() {
        let manager = test_manager();
        let mut live = MomentLive::new(manager.clone());

        live.set_moment(Some("m1"));
        manager.dispatch(&dash_event("m1", 5000));
        manager.dispatch(&totals_event("m1", 5000, 1));

        live.clear_latest_dash();
        assert!(live.latest_dash().is_none());
        assert_eq!(live.totals(), Some((5000, 1)));
    }
}
