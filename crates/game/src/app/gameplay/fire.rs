use std::collections::BTreeMap;

use rescue_engine::{ObjectId, SpatialQuery, Vec3, FLAMMABLE_TAG};
use tracing::{debug, info};

use super::fire_registry::FireRegistry;
use super::interaction::{InteractContext, Interactable};
use super::types::FireId;
use crate::config::FireConfig;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FireState {
    Unlit,
    Scheduled { ignite_at: f64 },
    Burning,
    Extinguished,
}

/// Flammable object picked by a spread check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpreadTarget {
    pub object: ObjectId,
    pub position: Vec3,
    pub structure: Option<ObjectId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FireEntity {
    id: FireId,
    host: ObjectId,
    structure: Option<ObjectId>,
    position: Vec3,
    emitter: Option<Vec3>,
    spread_radius: f32,
    spread_interval_seconds: f32,
    state: FireState,
    next_spread_at: Option<f64>,
}

impl FireEntity {
    pub fn new(
        id: FireId,
        host: ObjectId,
        structure: Option<ObjectId>,
        position: Vec3,
        config: &FireConfig,
    ) -> Self {
        Self {
            id,
            host,
            structure,
            position,
            emitter: None,
            spread_radius: config.spread_radius,
            spread_interval_seconds: config.spread_interval_seconds,
            state: FireState::Unlit,
            next_spread_at: None,
        }
    }

    pub fn with_emitter(mut self, emitter: Vec3) -> Self {
        self.emitter = Some(emitter);
        self
    }

    pub fn id(&self) -> FireId {
        self.id
    }

    pub fn host(&self) -> ObjectId {
        self.host
    }

    pub fn structure(&self) -> Option<ObjectId> {
        self.structure
    }

    /// Host position; nearest-fire lookups measure against this.
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Where the flames are, falling back to the host position.
    pub fn world_position(&self) -> Vec3 {
        self.emitter.unwrap_or(self.position)
    }

    pub fn state(&self) -> FireState {
        self.state
    }

    pub fn next_spread_at(&self) -> Option<f64> {
        self.next_spread_at
    }

    pub fn is_extinguished(&self) -> bool {
        self.state == FireState::Extinguished
    }

    pub fn is_burning(&self) -> bool {
        self.state == FireState::Burning
    }

    pub fn schedule_ignition(&mut self, now: f64, delay_seconds: f32) -> bool {
        if self.state != FireState::Unlit {
            return false;
        }
        let ignite_at = now + f64::from(delay_seconds.max(0.0));
        self.state = FireState::Scheduled { ignite_at };
        debug!(fire_id = self.id.0, ignite_at, "fire_ignition_scheduled");
        true
    }

    /// Starts burning, registers with `registry` and arms the first spread deadline.
    pub fn ignite(&mut self, now: f64, registry: Option<&mut FireRegistry>) -> bool {
        if matches!(self.state, FireState::Burning | FireState::Extinguished) {
            return false;
        }
        self.state = FireState::Burning;
        self.next_spread_at = Some(now + f64::from(self.spread_interval_seconds));
        info!(fire_id = self.id.0, host = self.host.0, "fire_ignited");
        if let Some(registry) = registry {
            registry.register_fire(Some(self));
        }
        true
    }

    pub fn poll_ignition(&mut self, now: f64, registry: Option<&mut FireRegistry>) -> bool {
        match self.state {
            FireState::Scheduled { ignite_at } if now >= ignite_at => self.ignite(now, registry),
            _ => false,
        }
    }

    /// Runs one spread check when the deadline has passed.
    ///
    /// The deadline is re-armed whether or not a target was found. The first
    /// flammable hit in query order that is not already burning wins.
    pub fn poll_spread<F>(
        &mut self,
        now: f64,
        spatial: Option<&dyn SpatialQuery>,
        hosts_fire: F,
    ) -> Option<SpreadTarget>
    where
        F: Fn(ObjectId) -> bool,
    {
        if self.state != FireState::Burning {
            return None;
        }
        let deadline = self.next_spread_at?;
        if now < deadline {
            return None;
        }
        self.next_spread_at = Some(now + f64::from(self.spread_interval_seconds));

        let spatial = spatial?;
        spatial
            .overlap_sphere(self.position, self.spread_radius)
            .into_iter()
            .filter(|hit| hit.object != self.host)
            .find(|hit| hit.has_tag(FLAMMABLE_TAG) && !hosts_fire(hit.object))
            .map(|hit| SpreadTarget {
                object: hit.object,
                position: hit.position,
                structure: hit.structure,
            })
    }

    /// Terminal transition. Returns `false` when already extinguished.
    pub fn extinguish(&mut self, registry: Option<&mut FireRegistry>) -> bool {
        if self.is_extinguished() {
            return false;
        }
        self.state = FireState::Extinguished;
        self.next_spread_at = None;
        debug!(fire_id = self.id.0, "fire_put_out");
        if let Some(registry) = registry {
            registry.notify_extinguished(Some(self.id));
        }
        true
    }
}

impl Interactable for FireEntity {
    fn interact(&mut self, context: &mut InteractContext<'_>) -> bool {
        self.extinguish(context.fires.as_deref_mut())
    }
}

/// Owns every fire and remembers which object hosts which fire.
#[derive(Debug, Default)]
pub struct FireSet {
    next_id: u64,
    fires: BTreeMap<FireId, FireEntity>,
    fire_by_host: BTreeMap<ObjectId, FireId>,
}

impl FireSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a new unlit fire to `host`. Returns `None` when the host already has one.
    pub fn spawn_on(
        &mut self,
        host: ObjectId,
        structure: Option<ObjectId>,
        position: Vec3,
        config: &FireConfig,
    ) -> Option<FireId> {
        if self.fire_by_host.contains_key(&host) {
            return None;
        }
        self.next_id = self.next_id.saturating_add(1);
        let id = FireId(self.next_id);
        self.fires
            .insert(id, FireEntity::new(id, host, structure, position, config));
        self.fire_by_host.insert(host, id);
        Some(id)
    }

    pub fn set_emitter(&mut self, id: FireId, emitter: Vec3) -> bool {
        let Some(fire) = self.fires.get_mut(&id) else {
            return false;
        };
        fire.emitter = Some(emitter);
        true
    }

    pub fn get(&self, id: FireId) -> Option<&FireEntity> {
        self.fires.get(&id)
    }

    pub fn get_mut(&mut self, id: FireId) -> Option<&mut FireEntity> {
        self.fires.get_mut(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FireEntity> + '_ {
        self.fires.values()
    }

    pub fn len(&self) -> usize {
        self.fires.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fires.is_empty()
    }

    pub fn fire_on(&self, host: ObjectId) -> Option<FireId> {
        self.fire_by_host.get(&host).copied()
    }

    pub fn hosts_fire(&self, host: ObjectId) -> bool {
        self.fire_by_host.contains_key(&host)
    }

    /// True when `root` or any object belonging to it carries a scheduled or burning fire.
    pub fn structure_on_fire(&self, root: ObjectId) -> bool {
        self.fires.values().any(|fire| {
            matches!(fire.state, FireState::Scheduled { .. } | FireState::Burning)
                && (fire.host == root || fire.structure == Some(root))
        })
    }

    pub fn ignite(&mut self, id: FireId, now: f64, registry: Option<&mut FireRegistry>) -> bool {
        self.fires
            .get_mut(&id)
            .is_some_and(|fire| fire.ignite(now, registry))
    }

    pub fn schedule_ignition(&mut self, id: FireId, now: f64, delay_seconds: f32) -> bool {
        self.fires
            .get_mut(&id)
            .is_some_and(|fire| fire.schedule_ignition(now, delay_seconds))
    }

    pub fn extinguish(&mut self, id: FireId, registry: Option<&mut FireRegistry>) -> bool {
        self.fires
            .get_mut(&id)
            .is_some_and(|fire| fire.extinguish(registry))
    }

    /// Advances scheduled ignitions and spread checks; returns fires started by spreading.
    ///
    /// Fires created during this call wait for their own first deadline.
    pub fn tick(
        &mut self,
        now: f64,
        spatial: Option<&dyn SpatialQuery>,
        config: &FireConfig,
        mut registry: Option<&mut FireRegistry>,
    ) -> Vec<FireId> {
        let ids = self.fires.keys().copied().collect::<Vec<_>>();
        let mut spawned = Vec::new();
        for id in ids {
            let target = {
                let Self {
                    fires,
                    fire_by_host,
                    ..
                } = &mut *self;
                let Some(fire) = fires.get_mut(&id) else {
                    continue;
                };
                fire.poll_ignition(now, registry.as_deref_mut());
                fire.poll_spread(now, spatial, |object| fire_by_host.contains_key(&object))
            };
            let Some(target) = target else {
                continue;
            };
            let Some(new_id) = self.spawn_on(target.object, target.structure, target.position, config)
            else {
                continue;
            };
            self.ignite(new_id, now, registry.as_deref_mut());
            info!(
                fire_id = new_id.0,
                source_fire_id = id.0,
                host = target.object.0,
                "fire_spread"
            );
            spawned.push(new_id);
        }
        spawned
    }
}

#[cfg(test)]
mod tests {
    use rescue_engine::{OverlapHit, SpatialIndex};

    use super::*;
    use crate::app::gameplay::test_support::FixedSpatial;
    use crate::app::gameplay::types::SimEvent;

    fn hit(object: u64, tag: &str) -> OverlapHit {
        OverlapHit {
            object: ObjectId(object),
            position: Vec3::new(object as f32, 0.0, 0.0),
            tag: tag.to_string(),
            structure: None,
        }
    }

    #[test]
    fn spread_waits_for_deadline_then_reschedules_without_target() {
        let config = FireConfig::default();
        let mut fire = FireEntity::new(FireId(1), ObjectId(1), None, Vec3::ZERO, &config);
        assert!(fire.ignite(0.0, None));
        let spatial = FixedSpatial::new(Vec::new());

        assert_eq!(fire.poll_spread(5.9, Some(&spatial), |_| false), None);
        assert_eq!(fire.next_spread_at(), Some(6.0));
        assert_eq!(fire.poll_spread(6.0, Some(&spatial), |_| false), None);
        assert_eq!(fire.next_spread_at(), Some(12.0));
    }

    #[test]
    fn spread_takes_first_eligible_hit_in_query_order() {
        let config = FireConfig::default();
        let mut fire = FireEntity::new(FireId(1), ObjectId(1), None, Vec3::ZERO, &config);
        fire.ignite(0.0, None);
        let spatial = FixedSpatial::new(vec![
            hit(1, FLAMMABLE_TAG),
            hit(7, "Untagged"),
            hit(9, FLAMMABLE_TAG),
            hit(3, FLAMMABLE_TAG),
            hit(4, FLAMMABLE_TAG),
        ]);

        let target = fire
            .poll_spread(6.0, Some(&spatial), |object| object == ObjectId(9))
            .expect("eligible neighbour");
        assert_eq!(target.object, ObjectId(3));
    }

    #[test]
    fn extinguished_fire_never_reignites_or_spreads() {
        let config = FireConfig::default();
        let mut registry = FireRegistry::new();
        let mut fire = FireEntity::new(FireId(1), ObjectId(1), None, Vec3::ZERO, &config);
        fire.ignite(0.0, Some(&mut registry));
        assert!(fire.extinguish(Some(&mut registry)));

        assert!(!fire.extinguish(Some(&mut registry)));
        assert!(!fire.ignite(1.0, Some(&mut registry)));
        let spatial = FixedSpatial::new(vec![hit(2, FLAMMABLE_TAG)]);
        assert_eq!(fire.poll_spread(100.0, Some(&spatial), |_| false), None);
        assert_eq!(
            registry.drain_events(),
            vec![
                SimEvent::FireStarted(FireId(1)),
                SimEvent::FireExtinguished(FireId(1))
            ]
        );
    }

    #[test]
    fn delayed_fire_ignites_at_deadline() {
        let config = FireConfig::default();
        let mut registry = FireRegistry::new();
        let mut fire = FireEntity::new(FireId(1), ObjectId(1), None, Vec3::ZERO, &config);
        assert!(fire.schedule_ignition(0.0, config.delayed_start_seconds));

        assert!(!fire.poll_ignition(4.9, Some(&mut registry)));
        assert!(registry.all_fires_out());
        assert!(fire.poll_ignition(5.0, Some(&mut registry)));
        assert!(registry.is_active(FireId(1)));
        assert_eq!(fire.next_spread_at(), Some(11.0));
    }

    #[test]
    fn emitter_changes_world_position_only() {
        let config = FireConfig::default();
        let fire = FireEntity::new(FireId(1), ObjectId(1), None, Vec3::ZERO, &config)
            .with_emitter(Vec3::new(0.0, 2.0, 1.0));
        assert_eq!(fire.position(), Vec3::ZERO);
        assert_eq!(fire.world_position(), Vec3::new(0.0, 2.0, 1.0));
    }

    #[test]
    fn set_tick_spreads_once_per_deadline_and_registers_new_fire() {
        let config = FireConfig::default();
        let mut registry = FireRegistry::new();
        let mut fires = FireSet::new();
        let mut index = SpatialIndex::new();
        index.insert(ObjectId(1), Vec3::ZERO, FLAMMABLE_TAG, None);
        index.insert(ObjectId(2), Vec3::new(3.0, 0.0, 0.0), FLAMMABLE_TAG, Some(ObjectId(5)));
        index.insert(ObjectId(3), Vec3::new(6.0, 0.0, 0.0), FLAMMABLE_TAG, None);
        let origin = fires
            .spawn_on(ObjectId(1), None, Vec3::ZERO, &config)
            .expect("spawn");
        fires.ignite(origin, 0.0, Some(&mut registry));

        assert!(fires.tick(3.0, Some(&index), &config, Some(&mut registry)).is_empty());
        let spawned = fires.tick(6.0, Some(&index), &config, Some(&mut registry));

        assert_eq!(spawned.len(), 1);
        assert_eq!(fires.fire_on(ObjectId(2)), Some(spawned[0]));
        assert!(registry.is_active(spawned[0]));
        assert!(fires.structure_on_fire(ObjectId(5)));
        assert_eq!(registry.active_count(), 2);

        let second_wave = fires.tick(12.0, Some(&index), &config, Some(&mut registry));
        assert_eq!(second_wave.len(), 1);
        assert_eq!(fires.fire_on(ObjectId(2)), Some(spawned[0]));
        assert_eq!(fires.fire_on(ObjectId(3)), Some(second_wave[0]));
        assert_eq!(fires.len(), 3);
        assert_eq!(registry.active_count(), 3);

        assert!(fires.tick(18.0, Some(&index), &config, Some(&mut registry)).is_empty());
        assert_eq!(registry.active_count(), 3);
    }

    #[test]
    fn spawn_refuses_second_fire_on_same_host() {
        let config = FireConfig::default();
        let mut fires = FireSet::new();
        assert!(fires.spawn_on(ObjectId(1), None, Vec3::ZERO, &config).is_some());
        assert!(fires.spawn_on(ObjectId(1), None, Vec3::ZERO, &config).is_none());
    }

    #[test]
    fn structure_on_fire_counts_scheduled_fires_but_not_extinguished() {
        let config = FireConfig::default();
        let mut fires = FireSet::new();
        let id = fires
            .spawn_on(ObjectId(10), None, Vec3::ZERO, &config)
            .expect("spawn");
        assert!(!fires.structure_on_fire(ObjectId(10)));

        fires.schedule_ignition(id, 0.0, 5.0);
        assert!(fires.structure_on_fire(ObjectId(10)));
        fires.extinguish(id, None);
        assert!(!fires.structure_on_fire(ObjectId(10)));
    }
}
