use rescue_engine::{NavMesh, NavigationAgent, ObjectId, Vec3};
use tracing::{debug, info};

use super::fire::FireSet;
use super::injured_registry::InjuredRegistry;
use super::interaction::{InteractContext, Interactable};
use super::types::CivilianId;
use crate::config::CivilianConfig;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CivilianState {
    #[default]
    Safe,
    Panicking,
    Calm,
    Helped,
}

impl CivilianState {
    pub fn is_injured(self) -> bool {
        matches!(self, Self::Panicking | Self::Calm)
    }

    pub fn is_panicking(self) -> bool {
        self == Self::Panicking
    }

    pub fn as_token(self) -> &'static str {
        match self {
            Self::Safe => "safe",
            Self::Panicking => "panicking",
            Self::Calm => "calm",
            Self::Helped => "helped",
        }
    }
}

/// Town resident that gets hurt when its house burns and flees to the closest safe point.
pub struct Civilian {
    id: CivilianId,
    house: Option<ObjectId>,
    safe_points: Vec<Vec3>,
    state: CivilianState,
    config: CivilianConfig,
    position: Vec3,
    nav: Option<Box<dyn NavigationAgent>>,
}

impl Civilian {
    pub fn new(
        id: CivilianId,
        position: Vec3,
        house: Option<ObjectId>,
        safe_points: Vec<Vec3>,
        config: &CivilianConfig,
        nav: Option<Box<dyn NavigationAgent>>,
    ) -> Self {
        Self {
            id,
            house,
            safe_points,
            state: CivilianState::Safe,
            config: config.clone(),
            position,
            nav,
        }
    }

    pub fn id(&self) -> CivilianId {
        self.id
    }

    pub fn house(&self) -> Option<ObjectId> {
        self.house
    }

    pub fn state(&self) -> CivilianState {
        self.state
    }

    pub fn is_injured(&self) -> bool {
        self.state.is_injured()
    }

    pub fn is_panicking(&self) -> bool {
        self.state.is_panicking()
    }

    pub fn is_helped(&self) -> bool {
        self.state == CivilianState::Helped
    }

    pub fn position(&self) -> Vec3 {
        self.nav
            .as_ref()
            .map_or(self.position, |nav| nav.position())
    }

    pub fn nav(&self) -> Option<&dyn NavigationAgent> {
        self.nav.as_deref()
    }

    pub(crate) fn nav_mut(&mut self) -> Option<&mut (dyn NavigationAgent + 'static)> {
        self.nav.as_deref_mut()
    }

    /// Registers the civilian and moves an off-surface agent onto the nav mesh.
    pub fn spawn(&mut self, navmesh: Option<&dyn NavMesh>, registry: Option<&mut InjuredRegistry>) {
        if let Some(registry) = registry {
            registry.register(self.id);
        }
        let (Some(nav), Some(navmesh)) = (self.nav.as_deref_mut(), navmesh) else {
            return;
        };
        if nav.is_on_nav_mesh() {
            return;
        }
        let start = nav.position();
        match navmesh.sample_position(start, self.config.spawn_warp_radius) {
            Some(point) if nav.warp(point) => {
                debug!(civilian_id = self.id.0, x = point.x, z = point.z, "civilian_warped");
            }
            _ => debug!(civilian_id = self.id.0, "civilian_spawn_off_mesh"),
        }
    }

    pub fn tick(&mut self, fires: &FireSet, navmesh: Option<&dyn NavMesh>) {
        // Injury does not need a nav agent; only fleeing does. A civilian without
        // one still turns injured so the player can help it in place.
        if self.state == CivilianState::Safe
            && self
                .house
                .is_some_and(|house| fires.structure_on_fire(house))
        {
            self.state = CivilianState::Panicking;
            info!(civilian_id = self.id.0, "civilian_injured");
        }

        match self.state {
            CivilianState::Panicking => self.flee(navmesh),
            CivilianState::Calm => {
                if let Some(nav) = self.nav.as_deref_mut() {
                    if nav.has_path() {
                        nav.reset_path();
                    }
                }
            }
            CivilianState::Safe | CivilianState::Helped => {}
        }
    }

    fn flee(&mut self, navmesh: Option<&dyn NavMesh>) {
        let target = self.best_safe_point(navmesh);
        let Some(nav) = self.nav.as_deref_mut() else {
            return;
        };
        if !nav.is_on_nav_mesh() {
            return;
        }

        let threshold = self.config.destination_change_threshold;
        let needs_request = nav
            .destination()
            .map_or(true, |current| current.distance_squared(target) > threshold * threshold);
        if needs_request {
            nav.set_destination(target);
        }

        let arrive_within = nav.stopping_distance().max(self.config.stop_at_safe_distance);
        if !nav.path_pending() && nav.remaining_distance() <= arrive_within {
            nav.reset_path();
            self.state = CivilianState::Calm;
            info!(civilian_id = self.id.0, "civilian_calm");
        }
    }

    /// Closest configured safe point (first wins ties), snapped to the nav mesh when possible.
    /// With no safe points the civilian stays where it is.
    pub fn best_safe_point(&self, navmesh: Option<&dyn NavMesh>) -> Vec3 {
        let position = self.position();
        let mut best: Option<(Vec3, f32)> = None;
        for point in &self.safe_points {
            let distance = position.distance(*point);
            if best.map_or(true, |(_, best_distance)| distance < best_distance) {
                best = Some((*point, distance));
            }
        }
        let Some((point, _)) = best else {
            return position;
        };
        navmesh
            .and_then(|navmesh| navmesh.sample_position(point, self.config.safe_point_sample_radius))
            .unwrap_or(point)
    }

    /// Marks an injured civilian as helped. Ignored unless currently injured.
    pub fn help(&mut self, registry: Option<&mut InjuredRegistry>) -> bool {
        if !self.state.is_injured() {
            return false;
        }
        self.state = CivilianState::Helped;
        if let Some(nav) = self.nav.as_deref_mut() {
            if nav.has_path() {
                nav.reset_path();
            }
            nav.set_stopped(true);
        }
        info!(civilian_id = self.id.0, "civilian_helped");
        if let Some(registry) = registry {
            registry.notify_helped(self.id);
        }
        true
    }
}

impl Interactable for Civilian {
    fn interact(&mut self, context: &mut InteractContext<'_>) -> bool {
        self.help(context.injured.as_deref_mut())
    }
}
