use std::cell::RefCell;
use std::rc::Rc;

use rescue_engine::{NavMesh, NavigationAgent, OverlapHit, PathStatus, SpatialQuery, Vec3};

/// Navigation state a test scripts directly.
#[derive(Debug, Clone)]
pub(crate) struct ScriptedNav {
    pub position: Vec3,
    pub velocity: Vec3,
    pub on_nav_mesh: bool,
    pub destination: Option<Vec3>,
    pub last_requested: Option<Vec3>,
    pub has_path: bool,
    pub pending: bool,
    /// New requests come back pending while this is set.
    pub hold_pending: bool,
    pub status: PathStatus,
    pub remaining: f32,
    pub stopping_distance: f32,
    pub speed: f32,
    pub stopped: bool,
    pub set_destination_calls: u32,
    pub reset_calls: u32,
}

impl ScriptedNav {
    fn at(position: Vec3) -> Self {
        Self {
            position,
            velocity: Vec3::ZERO,
            on_nav_mesh: true,
            destination: None,
            last_requested: None,
            has_path: false,
            pending: false,
            hold_pending: false,
            status: PathStatus::Complete,
            remaining: f32::INFINITY,
            stopping_distance: 0.0,
            speed: 3.5,
            stopped: false,
            set_destination_calls: 0,
            reset_calls: 0,
        }
    }
}

pub(crate) struct ScriptedNavAgent {
    script: Rc<RefCell<ScriptedNav>>,
}

impl ScriptedNavAgent {
    pub(crate) fn new(position: Vec3) -> (Self, Rc<RefCell<ScriptedNav>>) {
        let script = Rc::new(RefCell::new(ScriptedNav::at(position)));
        (
            Self {
                script: Rc::clone(&script),
            },
            script,
        )
    }
}

impl NavigationAgent for ScriptedNavAgent {
    fn position(&self) -> Vec3 {
        self.script.borrow().position
    }

    fn velocity(&self) -> Vec3 {
        self.script.borrow().velocity
    }

    fn is_on_nav_mesh(&self) -> bool {
        self.script.borrow().on_nav_mesh
    }

    fn set_destination(&mut self, point: Vec3) -> bool {
        let mut script = self.script.borrow_mut();
        script.set_destination_calls += 1;
        script.destination = Some(point);
        script.last_requested = Some(point);
        script.has_path = true;
        script.pending = script.hold_pending;
        true
    }

    fn destination(&self) -> Option<Vec3> {
        self.script.borrow().destination
    }

    fn has_path(&self) -> bool {
        self.script.borrow().has_path
    }

    fn path_pending(&self) -> bool {
        self.script.borrow().pending
    }

    fn path_status(&self) -> PathStatus {
        self.script.borrow().status
    }

    fn remaining_distance(&self) -> f32 {
        self.script.borrow().remaining
    }

    fn reset_path(&mut self) {
        let mut script = self.script.borrow_mut();
        script.reset_calls += 1;
        script.destination = None;
        script.has_path = false;
        script.pending = false;
    }

    fn warp(&mut self, point: Vec3) -> bool {
        let mut script = self.script.borrow_mut();
        script.position = point;
        script.on_nav_mesh = true;
        true
    }

    fn stopping_distance(&self) -> f32 {
        self.script.borrow().stopping_distance
    }

    fn set_stopping_distance(&mut self, distance: f32) {
        self.script.borrow_mut().stopping_distance = distance;
    }

    fn speed(&self) -> f32 {
        self.script.borrow().speed
    }

    fn set_speed(&mut self, speed: f32) {
        self.script.borrow_mut().speed = speed;
    }

    fn is_stopped(&self) -> bool {
        self.script.borrow().stopped
    }

    fn set_stopped(&mut self, stopped: bool) {
        self.script.borrow_mut().stopped = stopped;
    }
}

/// Nav mesh whose every sample lands on one fixed point, or nowhere.
pub(crate) struct FixedNavMesh {
    snap: Option<Vec3>,
}

impl FixedNavMesh {
    pub(crate) fn snapping_to(point: Vec3) -> Self {
        Self { snap: Some(point) }
    }

    pub(crate) fn unreachable() -> Self {
        Self { snap: None }
    }
}

impl NavMesh for FixedNavMesh {
    fn sample_position(&self, _point: Vec3, _max_distance: f32) -> Option<Vec3> {
        self.snap
    }
}

/// Returns the same overlap list for every query.
pub(crate) struct FixedSpatial {
    hits: Vec<OverlapHit>,
}

impl FixedSpatial {
    pub(crate) fn new(hits: Vec<OverlapHit>) -> Self {
        Self { hits }
    }
}

impl SpatialQuery for FixedSpatial {
    fn overlap_sphere(&self, _center: Vec3, _radius: f32) -> Vec<OverlapHit> {
        self.hits.clone()
    }
}
