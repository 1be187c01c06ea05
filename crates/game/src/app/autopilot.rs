use std::rc::Rc;

use rescue_engine::{GridNavAgent, GridNavMesh, NavMesh, NavigationAgent, Vec3};
use tracing::{debug, info};

use super::gameplay::{InputAction, InteractTarget, Session};

const GOAL_SAMPLE_RADIUS: f32 = 3.0;

/// Headless stand-in for the player: walks to the nearest burning fire or injured
/// civilian and presses the matching action once it is within reach.
pub(crate) struct AutoPlayer {
    nav: GridNavAgent,
    navmesh: Rc<GridNavMesh>,
    goal: Option<InteractTarget>,
    actions_taken: u32,
}

impl AutoPlayer {
    pub(crate) fn new(nav: GridNavAgent, navmesh: Rc<GridNavMesh>) -> Self {
        Self {
            nav,
            navmesh,
            goal: None,
            actions_taken: 0,
        }
    }

    pub(crate) fn position(&self) -> Vec3 {
        self.nav.position()
    }

    pub(crate) fn actions_taken(&self) -> u32 {
        self.actions_taken
    }

    /// Moves one step and acts on the current goal when it is in reach.
    pub(crate) fn step(&mut self, dt_seconds: f32, session: &mut Session) {
        let position = self.nav.position();
        let Some((target, target_position)) = nearest_goal(session, position) else {
            if self.goal.take().is_some() {
                self.nav.reset_path();
            }
            return;
        };
        if self.goal != Some(target) {
            debug!(target = ?target, "autopilot_goal_changed");
            self.goal = Some(target);
        }

        let reach = session.config().player.interaction_range;
        if target_position.flattened().distance(position.flattened()) <= reach {
            let action = match target {
                InteractTarget::Fire(_) => InputAction::Interact,
                InteractTarget::Civilian(_) => InputAction::Help,
            };
            if session.player_action(action, target, position) {
                self.actions_taken = self.actions_taken.saturating_add(1);
                info!(action = ?action, target = ?target, "autopilot_action");
                self.goal = None;
                self.nav.reset_path();
                return;
            }
        }

        let destination = self
            .navmesh
            .sample_position(target_position, GOAL_SAMPLE_RADIUS)
            .unwrap_or(target_position);
        self.nav.set_destination(destination);
        self.nav.step(dt_seconds);
    }
}

fn nearest_goal(session: &Session, from: Vec3) -> Option<(InteractTarget, Vec3)> {
    let fires = session
        .fires()
        .iter()
        .filter(|fire| session.fire_registry().is_active(fire.id()))
        .map(|fire| (InteractTarget::Fire(fire.id()), fire.world_position()));
    let civilians = session
        .civilians()
        .filter(|civilian| civilian.is_injured())
        .map(|civilian| (InteractTarget::Civilian(civilian.id()), civilian.position()));

    let from = from.flattened();
    let mut best: Option<(InteractTarget, Vec3, f32)> = None;
    for (target, position) in fires.chain(civilians) {
        let distance = position.flattened().distance(from);
        if best.map_or(true, |(_, _, best_distance)| distance < best_distance) {
            best = Some((target, position, distance));
        }
    }
    best.map(|(target, position, _)| (target, position))
}
