use std::collections::BTreeSet;

use rescue_engine::Vec3;
use tracing::{debug, info};

use super::fire::{FireEntity, FireSet};
use super::types::{EventOutbox, EventStamp, FireId, SimEvent};

/// Authoritative set of burning fires.
#[derive(Debug, Default)]
pub struct FireRegistry {
    active: BTreeSet<FireId>,
    started_total: u32,
    extinguished_total: u32,
    outbox: EventOutbox,
}

impl FireRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `fire` to the active set. Emits `FireStarted` only when it was not already present.
    pub fn register_fire(&mut self, fire: Option<&FireEntity>) -> bool {
        let Some(fire) = fire else {
            return false;
        };
        if fire.is_extinguished() || !self.active.insert(fire.id()) {
            return false;
        }
        self.started_total = self.started_total.saturating_add(1);
        info!(
            fire_id = fire.id().0,
            host = fire.host().0,
            active = self.active.len(),
            "fire_registered"
        );
        self.outbox.push(SimEvent::FireStarted(fire.id()));
        true
    }

    pub fn notify_extinguished(&mut self, fire: Option<FireId>) -> bool {
        let Some(fire) = fire else {
            return false;
        };
        if !self.active.remove(&fire) {
            debug!(fire_id = fire.0, "extinguish_ignored_inactive");
            return false;
        }
        self.extinguished_total = self.extinguished_total.saturating_add(1);
        info!(
            fire_id = fire.0,
            active = self.active.len(),
            "fire_extinguished"
        );
        self.outbox.push(SimEvent::FireExtinguished(fire));
        true
    }

    pub fn all_fires_out(&self) -> bool {
        self.active.is_empty()
    }

    pub fn is_active(&self, fire: FireId) -> bool {
        self.active.contains(&fire)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn active_ids(&self) -> impl Iterator<Item = FireId> + '_ {
        self.active.iter().copied()
    }

    pub fn started_total(&self) -> u32 {
        self.started_total
    }

    pub fn extinguished_total(&self) -> u32 {
        self.extinguished_total
    }

    /// Closest burning fire whose host position is strictly inside `max_range`.
    ///
    /// Ids that no longer resolve, or resolve to an extinguished fire, are skipped.
    /// Ties keep the first fire in id order.
    pub fn find_nearest_active_fire(
        &self,
        fires: &FireSet,
        origin: Vec3,
        max_range: f32,
    ) -> Option<FireId> {
        let mut best = None;
        let mut best_distance = max_range;
        for id in &self.active {
            let Some(fire) = fires.get(*id) else {
                continue;
            };
            if fire.is_extinguished() {
                continue;
            }
            let distance = origin.distance(fire.position());
            if distance < best_distance {
                best_distance = distance;
                best = Some(*id);
            }
        }
        best
    }

    #[cfg(test)]
    pub(crate) fn drain_events(&mut self) -> Vec<SimEvent> {
        self.outbox.drain()
    }

    pub(crate) fn drain_stamped_events(&mut self) -> Vec<(EventStamp, SimEvent)> {
        self.outbox.drain_stamped()
    }
}
