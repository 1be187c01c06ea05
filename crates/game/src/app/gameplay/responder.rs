use rescue_engine::{NavMesh, NavigationAgent, Vec3};
use tracing::{debug, info};

use super::fire::FireSet;
use super::fire_registry::FireRegistry;
use super::interaction::{InteractContext, Interactable};
use super::types::{FireId, ResponderId};
use crate::config::ResponderConfig;

const STOPPING_DISTANCE_FACTOR: f32 = 0.9;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResponderState {
    #[default]
    Follow,
    Assist,
}

/// What a responder tick needs to see and touch in the world.
pub struct ResponderWorld<'a> {
    pub fires: &'a mut FireSet,
    pub registry: Option<&'a mut FireRegistry>,
    pub navmesh: Option<&'a dyn NavMesh>,
}

/// Companion that trails the player and breaks off to put out nearby fires.
pub struct ResponderAgent {
    id: ResponderId,
    config: ResponderConfig,
    state: ResponderState,
    target: Option<FireId>,
    next_search_at: f64,
    next_interact_at: f64,
    nav: Box<dyn NavigationAgent>,
}

impl ResponderAgent {
    pub fn new(id: ResponderId, config: &ResponderConfig, mut nav: Box<dyn NavigationAgent>) -> Self {
        nav.set_stopped(false);
        nav.set_stopping_distance(config.follow_distance * STOPPING_DISTANCE_FACTOR);
        Self {
            id,
            config: config.clone(),
            state: ResponderState::Follow,
            target: None,
            next_search_at: 0.0,
            next_interact_at: 0.0,
            nav,
        }
    }

    pub fn id(&self) -> ResponderId {
        self.id
    }

    pub fn state(&self) -> ResponderState {
        self.state
    }

    pub fn target(&self) -> Option<FireId> {
        self.target
    }

    pub fn position(&self) -> Vec3 {
        self.nav.position()
    }

    pub fn nav(&self) -> &dyn NavigationAgent {
        self.nav.as_ref()
    }

    pub(crate) fn nav_mut(&mut self) -> &mut dyn NavigationAgent {
        self.nav.as_mut()
    }

    /// One behaviour step. Without a leader to follow the responder does nothing.
    ///
    /// Returns the fire it put out, if any.
    pub fn tick(
        &mut self,
        now: f64,
        leader: Option<Vec3>,
        world: &mut ResponderWorld<'_>,
    ) -> Option<FireId> {
        let leader = leader?;

        if let Some(target) = self.target {
            if !Self::target_is_live(target, world) {
                debug!(responder_id = self.id.0, fire_id = target.0, "responder_target_lost");
                self.clear_target_and_follow(now);
            }
        }

        if now >= self.next_search_at {
            self.next_search_at = now + f64::from(self.config.recheck_interval_seconds);
            if self.state == ResponderState::Follow || self.target.is_none() {
                let found = world.registry.as_deref().and_then(|registry| {
                    registry.find_nearest_active_fire(
                        world.fires,
                        self.nav.position(),
                        self.config.fire_detect_range,
                    )
                });
                if let Some(fire) = found {
                    self.set_assist_target(fire, world.fires);
                }
            }
        }

        if self.state == ResponderState::Assist && self.target.is_some() {
            self.assist(now, world)
        } else {
            self.follow(leader);
            None
        }
    }

    fn target_is_live(target: FireId, world: &ResponderWorld<'_>) -> bool {
        let burning = world
            .fires
            .get(target)
            .is_some_and(|fire| !fire.is_extinguished());
        let active = world
            .registry
            .as_deref()
            .map_or(true, |registry| registry.is_active(target));
        burning && active
    }

    fn set_assist_target(&mut self, fire: FireId, fires: &FireSet) {
        if !fires.get(fire).is_some_and(|entity| !entity.is_extinguished()) {
            return;
        }
        if self.target != Some(fire) {
            info!(responder_id = self.id.0, fire_id = fire.0, "responder_assist");
        }
        self.target = Some(fire);
        self.state = ResponderState::Assist;
        self.nav.reset_path();
    }

    fn clear_target_and_follow(&mut self, now: f64) {
        self.target = None;
        self.state = ResponderState::Follow;
        self.nav.reset_path();
        self.next_search_at = now + f64::from(self.config.recheck_interval_seconds);
    }

    fn follow(&mut self, leader: Vec3) {
        self.nav
            .set_stopping_distance(self.config.follow_distance * STOPPING_DISTANCE_FACTOR);
        if self.nav.position().distance(leader) > self.config.follow_distance {
            self.nav.set_destination(leader);
        } else if self.nav.has_path() {
            self.nav.reset_path();
        }
    }

    fn assist(&mut self, now: f64, world: &mut ResponderWorld<'_>) -> Option<FireId> {
        let target = self.target?;
        let Some(fire_position) = world
            .fires
            .get(target)
            .filter(|fire| !fire.is_extinguished())
            .map(|fire| fire.world_position())
        else {
            self.clear_target_and_follow(now);
            return None;
        };

        let nav_point = world
            .navmesh
            .and_then(|navmesh| {
                navmesh.sample_position(fire_position, self.config.reachable_sample_radius)
            })
            .unwrap_or(fire_position);

        self.nav
            .set_stopping_distance(self.config.assist_range * STOPPING_DISTANCE_FACTOR);
        self.nav.set_destination(nav_point);

        if !self.nav.path_pending() && self.nav.path_status().is_unusable() {
            debug!(
                responder_id = self.id.0,
                fire_id = target.0,
                status = ?self.nav.path_status(),
                "responder_path_unusable"
            );
            self.clear_target_and_follow(now);
            return None;
        }

        let distance = self.nav.position().distance(nav_point);
        if distance > self.config.assist_range || now < self.next_interact_at {
            return None;
        }

        let mut context = InteractContext {
            fires: world.registry.as_deref_mut(),
            injured: None,
        };
        let put_out = world
            .fires
            .get_mut(target)
            .is_some_and(|fire| fire.interact(&mut context));
        self.next_interact_at = now + f64::from(self.config.interact_cooldown_seconds);
        self.clear_target_and_follow(now);
        if put_out {
            info!(responder_id = self.id.0, fire_id = target.0, "responder_extinguished_fire");
            Some(target)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use rescue_engine::{ObjectId, PathStatus};

    use super::*;
    use crate::app::gameplay::test_support::{FixedNavMesh, ScriptedNav, ScriptedNavAgent};
    use crate::config::FireConfig;

    struct Fixture {
        fires: FireSet,
        registry: FireRegistry,
        fire: FireId,
        responder: ResponderAgent,
        script: Rc<RefCell<ScriptedNav>>,
    }

    fn fixture(responder_at: Vec3, fire_at: Vec3) -> Fixture {
        let mut fires = FireSet::new();
        let mut registry = FireRegistry::new();
        let fire = fires
            .spawn_on(ObjectId(1), None, fire_at, &FireConfig::default())
            .expect("spawn");
        fires.ignite(fire, 0.0, Some(&mut registry));
        let (nav, script) = ScriptedNavAgent::new(responder_at);
        let responder = ResponderAgent::new(ResponderId(1), &ResponderConfig::default(), Box::new(nav));
        Fixture {
            fires,
            registry,
            fire,
            responder,
            script,
        }
    }

    impl Fixture {
        fn tick(&mut self, now: f64, leader: Option<Vec3>) -> Option<FireId> {
            let mut world = ResponderWorld {
                fires: &mut self.fires,
                registry: Some(&mut self.registry),
                navmesh: None,
            };
            self.responder.tick(now, leader, &mut world)
        }
    }

    #[test]
    fn follows_leader_only_beyond_follow_distance() {
        let mut fx = fixture(Vec3::ZERO, Vec3::new(100.0, 0.0, 0.0));
        fx.tick(0.0, Some(Vec3::new(4.0, 0.0, 0.0)));
        assert_eq!(fx.script.borrow().set_destination_calls, 0);

        fx.tick(0.1, Some(Vec3::new(6.0, 0.0, 0.0)));
        assert_eq!(fx.script.borrow().last_requested, Some(Vec3::new(6.0, 0.0, 0.0)));
        assert!((fx.script.borrow().stopping_distance - 4.5).abs() < 1e-5);
        assert_eq!(fx.responder.state(), ResponderState::Follow);
    }

    #[test]
    fn without_leader_nothing_happens() {
        let mut fx = fixture(Vec3::ZERO, Vec3::new(3.0, 0.0, 0.0));
        assert_eq!(fx.tick(0.0, None), None);
        assert_eq!(fx.responder.state(), ResponderState::Follow);
        assert_eq!(fx.script.borrow().set_destination_calls, 0);
    }

    #[test]
    fn nearby_fire_switches_to_assist_and_travels_there() {
        let mut fx = fixture(Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0));
        fx.tick(0.0, Some(Vec3::ZERO));

        assert_eq!(fx.responder.state(), ResponderState::Assist);
        assert_eq!(fx.responder.target(), Some(fx.fire));
        assert_eq!(fx.script.borrow().last_requested, Some(Vec3::new(10.0, 0.0, 0.0)));
        assert!((fx.script.borrow().stopping_distance - 1.8).abs() < 1e-5);
    }

    #[test]
    fn fire_outside_detect_range_is_ignored() {
        let mut fx = fixture(Vec3::ZERO, Vec3::new(14.0, 0.0, 0.0));
        fx.tick(0.0, Some(Vec3::ZERO));
        assert_eq!(fx.responder.state(), ResponderState::Follow);
    }

    #[test]
    fn in_range_responder_extinguishes_and_returns_to_follow() {
        let mut fx = fixture(Vec3::ZERO, Vec3::new(1.5, 0.0, 0.0));
        let put_out = fx.tick(0.0, Some(Vec3::ZERO));

        assert_eq!(put_out, Some(fx.fire));
        assert!(fx.fires.get(fx.fire).expect("fire").is_extinguished());
        assert!(fx.registry.all_fires_out());
        assert_eq!(fx.responder.state(), ResponderState::Follow);
        assert_eq!(fx.responder.target(), None);
    }

    #[test]
    fn cooldown_delays_second_interaction() {
        let mut fx = fixture(Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0));
        let second = fx
            .fires
            .spawn_on(ObjectId(2), None, Vec3::new(-1.0, 0.0, 0.0), &FireConfig::default())
            .expect("spawn");
        fx.fires.ignite(second, 0.0, Some(&mut fx.registry));

        assert_eq!(fx.tick(0.0, Some(Vec3::ZERO)), Some(fx.fire));
        assert_eq!(fx.tick(0.5, Some(Vec3::ZERO)), None);
        assert_eq!(fx.responder.target(), Some(second));
        assert_eq!(fx.tick(0.6, Some(Vec3::ZERO)), None);
        assert_eq!(fx.tick(0.75, Some(Vec3::ZERO)), Some(second));
    }

    #[test]
    fn target_extinguished_elsewhere_reverts_within_a_tick() {
        let mut fx = fixture(Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0));
        fx.tick(0.0, Some(Vec3::ZERO));
        assert_eq!(fx.responder.state(), ResponderState::Assist);

        fx.fires.extinguish(fx.fire, Some(&mut fx.registry));
        fx.tick(0.1, Some(Vec3::ZERO));

        assert_eq!(fx.responder.state(), ResponderState::Follow);
        assert_eq!(fx.responder.target(), None);
    }

    #[test]
    fn partial_path_abandons_target_once_resolved() {
        let mut fx = fixture(Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0));
        fx.script.borrow_mut().hold_pending = true;
        fx.script.borrow_mut().status = PathStatus::Partial;

        fx.tick(0.0, Some(Vec3::ZERO));
        assert_eq!(fx.responder.state(), ResponderState::Assist);

        fx.script.borrow_mut().hold_pending = false;
        fx.tick(0.1, Some(Vec3::ZERO));
        assert_eq!(fx.responder.state(), ResponderState::Follow);
        assert!(!fx.fires.get(fx.fire).expect("fire").is_extinguished());
    }

    #[test]
    fn reachable_point_comes_from_nav_mesh_sample() {
        let mut fx = fixture(Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0));
        let navmesh = FixedNavMesh::snapping_to(Vec3::new(9.0, 0.0, 1.0));
        let mut world = ResponderWorld {
            fires: &mut fx.fires,
            registry: Some(&mut fx.registry),
            navmesh: Some(&navmesh),
        };
        fx.responder.tick(0.0, Some(Vec3::ZERO), &mut world);

        assert_eq!(fx.script.borrow().last_requested, Some(Vec3::new(9.0, 0.0, 1.0)));
    }

    #[test]
    fn missing_registry_never_assists() {
        let mut fx = fixture(Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0));
        let mut world = ResponderWorld {
            fires: &mut fx.fires,
            registry: None,
            navmesh: None,
        };
        assert_eq!(fx.responder.tick(0.0, Some(Vec3::ZERO), &mut world), None);
        assert_eq!(fx.responder.state(), ResponderState::Follow);
    }
}
