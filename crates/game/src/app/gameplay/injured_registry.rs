use std::collections::BTreeSet;

use tracing::{info, warn};

use super::types::{CivilianId, EventOutbox, EventStamp, SimEvent};

/// Counts injured civilians and how many of them have been helped.
#[derive(Debug, Default)]
pub struct InjuredRegistry {
    registered: BTreeSet<CivilianId>,
    helped: u32,
    outbox: EventOutbox,
}

impl InjuredRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, civilian: CivilianId) -> bool {
        if !self.registered.insert(civilian) {
            return false;
        }
        info!(
            civilian_id = civilian.0,
            total = self.registered.len(),
            "injured_registered"
        );
        self.outbox.push(SimEvent::InjuredSpawned(civilian));
        true
    }

    /// Counts `civilian` as helped. Callers only report each civilian once.
    pub fn notify_helped(&mut self, civilian: CivilianId) {
        self.helped = self.helped.saturating_add(1);
        if self.helped as usize > self.registered.len() {
            warn!(
                civilian_id = civilian.0,
                helped = self.helped,
                total = self.registered.len(),
                "helped_count_exceeds_total"
            );
        }
        info!(
            civilian_id = civilian.0,
            helped = self.helped,
            total = self.registered.len(),
            "injured_helped"
        );
        self.outbox.push(SimEvent::InjuredHelped(civilian));
    }

    pub fn all_helped(&self) -> bool {
        let total = self.total();
        total > 0 && self.helped >= total
    }

    pub fn total(&self) -> u32 {
        u32::try_from(self.registered.len()).unwrap_or(u32::MAX)
    }

    pub fn helped(&self) -> u32 {
        self.helped
    }

    pub fn is_registered(&self, civilian: CivilianId) -> bool {
        self.registered.contains(&civilian)
    }

    #[cfg(test)]
    pub(crate) fn drain_events(&mut self) -> Vec<SimEvent> {
        self.outbox.drain()
    }

    pub(crate) fn drain_stamped_events(&mut self) -> Vec<(EventStamp, SimEvent)> {
        self.outbox.drain_stamped()
    }
}
