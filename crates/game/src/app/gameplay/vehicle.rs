use rescue_engine::{move_towards, NavMesh, NavigationAgent, Vec3};
use tracing::{debug, info};

use super::fire::FireSet;
use super::fire_registry::FireRegistry;
use super::types::{FireId, VehicleId};
use crate::config::VehicleConfig;

const HEADING_MIN_SPEED: f32 = 0.05;
const DEGENERATE_DIRECTION_SQ: f32 = 0.01;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum VehicleState {
    #[default]
    Searching,
    Traveling,
    Waiting {
        until: f64,
    },
}

/// Read-only view of the fires a vehicle drives to.
pub struct VehicleWorld<'a> {
    pub fires: &'a FireSet,
    pub registry: Option<&'a FireRegistry>,
    pub navmesh: Option<&'a dyn NavMesh>,
}

/// Fire engine that drives to the nearest fire, parks short of it for a while, then moves on.
pub struct VehicleAgent {
    id: VehicleId,
    config: VehicleConfig,
    state: VehicleState,
    target: Option<FireId>,
    next_search_at: f64,
    current_speed: f32,
    heading: Vec3,
    nav: Box<dyn NavigationAgent>,
}

impl VehicleAgent {
    pub fn new(id: VehicleId, config: &VehicleConfig, mut nav: Box<dyn NavigationAgent>) -> Self {
        nav.set_stopping_distance(config.stopping_distance);
        nav.set_speed(0.0);
        Self {
            id,
            config: config.clone(),
            state: VehicleState::Searching,
            target: None,
            next_search_at: 0.0,
            current_speed: 0.0,
            heading: Vec3::FORWARD,
            nav,
        }
    }

    pub fn id(&self) -> VehicleId {
        self.id
    }

    pub fn state(&self) -> VehicleState {
        self.state
    }

    pub fn target(&self) -> Option<FireId> {
        self.target
    }

    pub fn current_speed(&self) -> f32 {
        self.current_speed
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

    pub fn spawn(&mut self, navmesh: Option<&dyn NavMesh>) {
        let Some(navmesh) = navmesh else {
            return;
        };
        let start = self.nav.position();
        if let Some(point) = navmesh.sample_position(start, self.config.spawn_warp_radius) {
            if self.nav.warp(point) {
                debug!(vehicle_id = self.id.0, x = point.x, z = point.z, "vehicle_warped");
            }
        }
    }

    pub fn tick(&mut self, now: f64, dt_seconds: f32, world: &VehicleWorld<'_>) {
        self.track_heading();

        if let VehicleState::Waiting { until } = self.state {
            if now < until {
                self.smooth_speed(0.0, dt_seconds);
                return;
            }
            self.state = VehicleState::Searching;
        }

        if let Some(target) = self.target {
            if !Self::target_is_live(target, world) {
                self.clear_target(now, false);
            }
        }

        if self.target.is_none() && now >= self.next_search_at {
            self.target = world.registry.and_then(|registry| {
                registry.find_nearest_active_fire(world.fires, self.nav.position(), f32::INFINITY)
            });
            self.next_search_at = now + f64::from(self.config.recheck_interval_seconds);
            if let Some(target) = self.target {
                if let Some(nav_point) = self.approach_point(target, world) {
                    self.set_destination_smart(nav_point);
                }
                self.state = VehicleState::Traveling;
                info!(vehicle_id = self.id.0, fire_id = target.0, "vehicle_dispatched");
            }
        }

        let Some(target) = self.target else {
            self.smooth_speed(0.0, dt_seconds);
            return;
        };
        let Some(nav_point) = self.approach_point(target, world) else {
            self.clear_target(now, false);
            self.smooth_speed(0.0, dt_seconds);
            return;
        };

        if !self.nav.path_pending() && self.nav.path_status().is_unusable() {
            debug!(
                vehicle_id = self.id.0,
                fire_id = target.0,
                status = ?self.nav.path_status(),
                "vehicle_path_unusable"
            );
            self.clear_target(now, false);
            return;
        }

        let threshold = self.config.destination_change_threshold;
        let moved = self
            .nav
            .destination()
            .map_or(true, |current| current.distance_squared(nav_point) > threshold * threshold);
        if moved {
            self.set_destination_smart(nav_point);
        }

        let arrive_within = self.nav.stopping_distance().max(self.config.stopping_distance);
        if !self.nav.path_pending() && self.nav.remaining_distance() <= arrive_within {
            let until = now + f64::from(self.config.wait_seconds);
            info!(vehicle_id = self.id.0, fire_id = target.0, until, "vehicle_waiting");
            self.clear_target(now, true);
            self.state = VehicleState::Waiting { until };
            self.smooth_speed(0.0, dt_seconds);
            return;
        }

        self.smooth_speed(self.config.max_speed, dt_seconds);
    }

    fn target_is_live(target: FireId, world: &VehicleWorld<'_>) -> bool {
        let burning = world
            .fires
            .get(target)
            .is_some_and(|fire| !fire.is_extinguished());
        let active = world
            .registry
            .map_or(true, |registry| registry.is_active(target));
        burning && active
    }

    /// Navigable point short of the fire on the vehicle's side of it.
    ///
    /// Tries the standoff point, then the fire itself, then the raw fire position.
    fn approach_point(&self, target: FireId, world: &VehicleWorld<'_>) -> Option<Vec3> {
        let fire_position = world.fires.get(target)?.world_position();
        let to_fire = (fire_position - self.nav.position()).flattened();
        let direction = if to_fire.length_squared() < DEGENERATE_DIRECTION_SQ {
            self.heading
        } else {
            to_fire.try_normalized().unwrap_or(self.heading)
        };
        let standoff = (self.config.stopping_distance + self.config.approach_margin)
            .max(self.config.approach_minimum);
        let standoff_point = fire_position - direction * standoff;

        let Some(navmesh) = world.navmesh else {
            return Some(fire_position);
        };
        Some(
            navmesh
                .sample_position(standoff_point, self.config.sample_radius)
                .or_else(|| navmesh.sample_position(fire_position, self.config.sample_radius))
                .unwrap_or(fire_position),
        )
    }

    fn set_destination_smart(&mut self, point: Vec3) {
        self.nav.set_stopping_distance(self.config.stopping_distance);
        self.nav.set_destination(point);
    }

    fn clear_target(&mut self, now: f64, keep_search_cooldown: bool) {
        self.target = None;
        self.state = VehicleState::Searching;
        self.nav.reset_path();
        if !keep_search_cooldown {
            self.next_search_at = now + f64::from(self.config.recheck_interval_seconds);
        }
    }

    fn smooth_speed(&mut self, target_speed: f32, dt_seconds: f32) {
        let rate = if target_speed > self.current_speed {
            self.config.acceleration
        } else {
            self.config.deceleration
        };
        self.current_speed =
            move_towards(self.current_speed, target_speed, rate * dt_seconds.max(0.0));
        self.nav.set_speed(self.current_speed);
    }

    fn track_heading(&mut self) {
        let velocity = self.nav.velocity().flattened();
        if velocity.length() > HEADING_MIN_SPEED {
            if let Some(heading) = velocity.try_normalized() {
                self.heading = heading;
            }
        }
    }
}
