mod grid;

pub use grid::{GridError, GridNavAgent, GridNavMesh, NAV_BLOCKED_GLYPH};

use crate::Vec3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PathStatus {
    #[default]
    Complete,
    Partial,
    Invalid,
}

impl PathStatus {
    /// True when the path cannot bring the agent all the way to its destination.
    pub fn is_unusable(self) -> bool {
        matches!(self, Self::Partial | Self::Invalid)
    }
}

/// Navigable-surface queries shared by every agent.
pub trait NavMesh {
    /// Nearest navigable point within `max_distance` of `point`.
    fn sample_position(&self, point: Vec3, max_distance: f32) -> Option<Vec3>;
}

/// Per-entity steering handle owned by a mobile entity.
///
/// Path computation may take several ticks: callers poll `path_pending`,
/// `path_status` and `remaining_distance` instead of waiting on the request.
pub trait NavigationAgent {
    fn position(&self) -> Vec3;
    fn velocity(&self) -> Vec3;
    fn is_on_nav_mesh(&self) -> bool;

    /// Requests travel to `point`. Re-requesting the current destination keeps the resolved path.
    fn set_destination(&mut self, point: Vec3) -> bool;
    fn destination(&self) -> Option<Vec3>;
    fn has_path(&self) -> bool;
    fn path_pending(&self) -> bool;
    fn path_status(&self) -> PathStatus;
    fn remaining_distance(&self) -> f32;
    fn reset_path(&mut self);
    fn warp(&mut self, point: Vec3) -> bool;

    fn stopping_distance(&self) -> f32;
    fn set_stopping_distance(&mut self, distance: f32);
    fn speed(&self) -> f32;
    fn set_speed(&mut self, speed: f32);
    fn is_stopped(&self) -> bool;
    fn set_stopped(&mut self, stopped: bool);

    /// Advances path resolution and movement. Services that steer on their own leave this empty.
    fn step(&mut self, _dt_seconds: f32) {}
}
