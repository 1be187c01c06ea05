use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FireId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CivilianId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResponderId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VehicleId(pub u64);

impl fmt::Display for FireId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fire#{}", self.0)
    }
}

impl fmt::Display for CivilianId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "civilian#{}", self.0)
    }
}

/// Something an actor can interact with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InteractTarget {
    Fire(FireId),
    Civilian(CivilianId),
}

/// Player-facing actions. `Interact` handles fires, `Help` handles injured civilians.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAction {
    Interact,
    Help,
}

impl InputAction {
    pub fn accepts(self, target: InteractTarget) -> bool {
        matches!(
            (self, target),
            (Self::Interact, InteractTarget::Fire(_)) | (Self::Help, InteractTarget::Civilian(_))
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimEvent {
    FireStarted(FireId),
    FireExtinguished(FireId),
    InjuredSpawned(CivilianId),
    InjuredHelped(CivilianId),
}

impl SimEvent {
    pub fn name(self) -> &'static str {
        match self {
            Self::FireStarted(_) => "fire_started",
            Self::FireExtinguished(_) => "fire_extinguished",
            Self::InjuredSpawned(_) => "injured_spawned",
            Self::InjuredHelped(_) => "injured_helped",
        }
    }
}

static NEXT_EVENT_STAMP: AtomicU64 = AtomicU64::new(0);

/// Raise order across every outbox, so events from separate registries can be merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct EventStamp(u64);

impl EventStamp {
    fn next() -> Self {
        Self(NEXT_EVENT_STAMP.fetch_add(1, Ordering::Relaxed))
    }
}

/// Accumulates engine-facing events until the session flushes them to subscribers.
#[derive(Debug, Default)]
pub(crate) struct EventOutbox {
    pending: Vec<(EventStamp, SimEvent)>,
}

impl EventOutbox {
    pub(crate) fn push(&mut self, event: SimEvent) {
        self.pending.push((EventStamp::next(), event));
    }

    #[cfg(test)]
    pub(crate) fn drain(&mut self) -> Vec<SimEvent> {
        self.drain_stamped()
            .into_iter()
            .map(|(_, event)| event)
            .collect()
    }

    pub(crate) fn drain_stamped(&mut self) -> Vec<(EventStamp, SimEvent)> {
        std::mem::take(&mut self.pending)
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Interleaves drained outboxes back into the order the events were raised.
pub(crate) fn merge_in_raise_order(
    batches: impl IntoIterator<Item = Vec<(EventStamp, SimEvent)>>,
) -> Vec<SimEvent> {
    let mut merged = batches.into_iter().flatten().collect::<Vec<_>>();
    merged.sort_by_key(|(stamp, _)| *stamp);
    merged.into_iter().map(|(_, event)| event).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_actions_route_by_target_kind() {
        assert!(InputAction::Interact.accepts(InteractTarget::Fire(FireId(1))));
        assert!(!InputAction::Interact.accepts(InteractTarget::Civilian(CivilianId(1))));
        assert!(InputAction::Help.accepts(InteractTarget::Civilian(CivilianId(1))));
        assert!(!InputAction::Help.accepts(InteractTarget::Fire(FireId(1))));
    }

    #[test]
    fn outbox_drains_in_push_order() {
        let mut outbox = EventOutbox::default();
        outbox.push(SimEvent::FireStarted(FireId(2)));
        outbox.push(SimEvent::FireExtinguished(FireId(2)));

        assert_eq!(
            outbox.drain(),
            vec![
                SimEvent::FireStarted(FireId(2)),
                SimEvent::FireExtinguished(FireId(2))
            ]
        );
        assert!(outbox.is_empty());
    }

    #[test]
    fn merged_outboxes_keep_raise_order_across_sources() {
        let mut fires = EventOutbox::default();
        let mut injured = EventOutbox::default();
        injured.push(SimEvent::InjuredSpawned(CivilianId(1)));
        fires.push(SimEvent::FireStarted(FireId(1)));
        injured.push(SimEvent::InjuredHelped(CivilianId(1)));
        fires.push(SimEvent::FireExtinguished(FireId(1)));

        assert_eq!(
            merge_in_raise_order([fires.drain_stamped(), injured.drain_stamped()]),
            vec![
                SimEvent::InjuredSpawned(CivilianId(1)),
                SimEvent::FireStarted(FireId(1)),
                SimEvent::InjuredHelped(CivilianId(1)),
                SimEvent::FireExtinguished(FireId(1)),
            ]
        );
    }
}
