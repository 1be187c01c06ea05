use std::rc::Rc;

use thiserror::Error;

use super::{NavMesh, NavigationAgent, PathStatus};
use crate::Vec3;

pub const NAV_BLOCKED_GLYPH: char = '#';
const DESTINATION_REUSE_EPSILON_SQ: f32 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct TileCoord {
    x: u32,
    z: u32,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GridError {
    #[error("grid dimensions must be non-zero, got {width}x{height}")]
    EmptyGrid { width: u32, height: u32 },
    #[error("expected {expected} tiles, got {actual}")]
    TileCountMismatch { expected: usize, actual: usize },
    #[error("row {row} has {actual} columns, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        actual: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
struct GridPath {
    waypoints: Vec<Vec3>,
    status: PathStatus,
}

/// Tile-grid navigable surface on the XZ plane.
///
/// Tile `(x, z)` covers `origin + [x, x + 1) x [z, z + 1)`; its center is
/// `origin + (x + 0.5, z + 0.5)`. Heights are flattened to `origin.y`.
#[derive(Debug, Clone, PartialEq)]
pub struct GridNavMesh {
    width: u32,
    height: u32,
    origin: Vec3,
    walkable: Vec<bool>,
}

impl GridNavMesh {
    pub fn new(
        width: u32,
        height: u32,
        origin: Vec3,
        walkable: Vec<bool>,
    ) -> Result<Self, GridError> {
        if width == 0 || height == 0 {
            return Err(GridError::EmptyGrid { width, height });
        }
        let expected = width as usize * height as usize;
        if walkable.len() != expected {
            return Err(GridError::TileCountMismatch {
                expected,
                actual: walkable.len(),
            });
        }
        Ok(Self {
            width,
            height,
            origin,
            walkable,
        })
    }

    pub fn open(width: u32, height: u32, origin: Vec3) -> Result<Self, GridError> {
        Self::new(width, height, origin, vec![true; width as usize * height as usize])
    }

    /// Builds a grid from text rows; row index is `z`, `#` marks a blocked tile.
    pub fn from_rows<S: AsRef<str>>(origin: Vec3, rows: &[S]) -> Result<Self, GridError> {
        let height = rows.len();
        let width = rows.first().map(|row| row.as_ref().chars().count()).unwrap_or(0);
        let mut walkable = Vec::with_capacity(width * height);
        for (row_index, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            let columns = row.chars().count();
            if columns != width {
                return Err(GridError::RaggedRow {
                    row: row_index,
                    expected: width,
                    actual: columns,
                });
            }
            walkable.extend(row.chars().map(|glyph| glyph != NAV_BLOCKED_GLYPH));
        }
        Self::new(width as u32, height as u32, origin, walkable)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    pub fn is_walkable_world(&self, point: Vec3) -> bool {
        self.world_to_tile(point)
            .is_some_and(|tile| self.is_walkable(tile))
    }

    fn world_to_tile(&self, world: Vec3) -> Option<TileCoord> {
        if !world.is_finite() {
            return None;
        }
        let tile_x = (world.x - self.origin.x).floor();
        let tile_z = (world.z - self.origin.z).floor();
        if tile_x < 0.0 || tile_z < 0.0 {
            return None;
        }
        let tile_x = tile_x as u32;
        let tile_z = tile_z as u32;
        if tile_x >= self.width || tile_z >= self.height {
            return None;
        }
        Some(TileCoord {
            x: tile_x,
            z: tile_z,
        })
    }

    fn clamped_tile(&self, world: Vec3) -> TileCoord {
        let max_x = (self.width - 1) as f32;
        let max_z = (self.height - 1) as f32;
        let tile_x = (world.x - self.origin.x).floor();
        let tile_z = (world.z - self.origin.z).floor();
        TileCoord {
            x: if tile_x.is_finite() { tile_x.clamp(0.0, max_x) as u32 } else { 0 },
            z: if tile_z.is_finite() { tile_z.clamp(0.0, max_z) as u32 } else { 0 },
        }
    }

    fn tile_center_world(&self, tile: TileCoord) -> Vec3 {
        Vec3 {
            x: self.origin.x + tile.x as f32 + 0.5,
            y: self.origin.y,
            z: self.origin.z + tile.z as f32 + 0.5,
        }
    }

    fn on_surface(&self, point: Vec3) -> Vec3 {
        Vec3 {
            y: self.origin.y,
            ..point
        }
    }

    fn is_walkable(&self, tile: TileCoord) -> bool {
        self.index_of(tile)
            .and_then(|index| self.walkable.get(index))
            .copied()
            .unwrap_or(false)
    }

    fn index_of(&self, tile: TileCoord) -> Option<usize> {
        if tile.x >= self.width || tile.z >= self.height {
            return None;
        }
        Some(tile.z as usize * self.width as usize + tile.x as usize)
    }

    fn coord_of(&self, index: usize) -> TileCoord {
        TileCoord {
            x: (index as u32) % self.width,
            z: (index as u32) / self.width,
        }
    }

    /// `None` when the start is off the surface; otherwise a complete or partial path.
    fn find_path(&self, start_world: Vec3, goal_world: Vec3) -> Option<GridPath> {
        let start_tile = self.world_to_tile(start_world)?;
        if !self.is_walkable(start_tile) {
            return None;
        }
        let goal_on_surface = self.is_walkable_world(goal_world);
        let goal_tile = self.clamped_tile(goal_world);

        let (tile_path, reached_goal) = self.find_path_tiles(start_tile, goal_tile)?;
        let status = if reached_goal && goal_on_surface {
            PathStatus::Complete
        } else {
            PathStatus::Partial
        };

        let mut waypoints = tile_path
            .iter()
            .skip(1)
            .map(|tile| self.tile_center_world(*tile))
            .collect::<Vec<_>>();
        if status == PathStatus::Complete {
            let goal_point = self.on_surface(goal_world);
            match waypoints.last_mut() {
                Some(last) => *last = goal_point,
                None => waypoints.push(goal_point),
            }
        } else if waypoints.is_empty() {
            waypoints.push(self.tile_center_world(start_tile));
        }

        Some(GridPath { waypoints, status })
    }

    /// A* over 4-neighbour tiles. When the goal is unreachable the path ends at the
    /// explored tile closest to it and the flag is `false`.
    fn find_path_tiles(
        &self,
        start: TileCoord,
        goal: TileCoord,
    ) -> Option<(Vec<TileCoord>, bool)> {
        let start_index = self.index_of(start)?;
        if start == goal {
            return Some((vec![start], true));
        }

        let node_count = self.walkable.len();
        let mut closed = vec![false; node_count];
        let mut best_g = vec![u32::MAX; node_count];
        let mut parent = vec![None::<usize>; node_count];
        let mut open = Vec::new();
        let mut next_insertion = 0u64;

        let start_h = manhattan_distance(start, goal);
        open.push(OpenNode {
            coord: start,
            h_cost: start_h,
            f_cost: start_h,
            insertion_order: next_insertion,
        });
        next_insertion = next_insertion.saturating_add(1);
        best_g[start_index] = 0;
        let mut closest = (start_h, 0u32, start_index);

        while !open.is_empty() {
            let best_index = pick_best_open_node_index(&open);
            let current = open.swap_remove(best_index);
            let Some(current_index) = self.index_of(current.coord) else {
                continue;
            };
            if closed[current_index] {
                continue;
            }
            closed[current_index] = true;

            let current_g = best_g[current_index];
            if (current.h_cost, current_g) < (closest.0, closest.1) {
                closest = (current.h_cost, current_g, current_index);
            }
            if current.coord == goal {
                let path = reconstruct_tile_path(self, &parent, start_index, current_index)?;
                return Some((path, true));
            }

            for neighbor in self.neighbors(current.coord).into_iter().flatten() {
                let Some(neighbor_index) = self.index_of(neighbor) else {
                    continue;
                };
                if closed[neighbor_index] || !self.is_walkable(neighbor) {
                    continue;
                }

                let tentative_g = current_g.saturating_add(1);
                if tentative_g >= best_g[neighbor_index] {
                    continue;
                }

                best_g[neighbor_index] = tentative_g;
                parent[neighbor_index] = Some(current_index);
                let h_cost = manhattan_distance(neighbor, goal);
                open.push(OpenNode {
                    coord: neighbor,
                    h_cost,
                    f_cost: tentative_g.saturating_add(h_cost),
                    insertion_order: next_insertion,
                });
                next_insertion = next_insertion.saturating_add(1);
            }
        }

        let path = reconstruct_tile_path(self, &parent, start_index, closest.2)?;
        Some((path, false))
    }

    fn neighbors(&self, coord: TileCoord) -> [Option<TileCoord>; 4] {
        let north = (coord.z + 1 < self.height).then(|| TileCoord {
            x: coord.x,
            z: coord.z + 1,
        });
        let east = (coord.x + 1 < self.width).then(|| TileCoord {
            x: coord.x + 1,
            z: coord.z,
        });
        let south = (coord.z > 0).then(|| TileCoord {
            x: coord.x,
            z: coord.z - 1,
        });
        let west = (coord.x > 0).then(|| TileCoord {
            x: coord.x - 1,
            z: coord.z,
        });
        [north, east, south, west]
    }
}

impl NavMesh for GridNavMesh {
    fn sample_position(&self, point: Vec3, max_distance: f32) -> Option<Vec3> {
        if !point.is_finite() || !max_distance.is_finite() || max_distance < 0.0 {
            return None;
        }
        if self.is_walkable_world(point) {
            return Some(self.on_surface(point));
        }

        let reach = max_distance.ceil() as i64 + 1;
        let center_x = (point.x - self.origin.x).floor() as i64;
        let center_z = (point.z - self.origin.z).floor() as i64;
        let flat_point = point.flattened();
        let mut best: Option<(f32, Vec3)> = None;
        for tile_z in (center_z - reach)..=(center_z + reach) {
            for tile_x in (center_x - reach)..=(center_x + reach) {
                if tile_x < 0 || tile_z < 0 {
                    continue;
                }
                let tile = TileCoord {
                    x: tile_x as u32,
                    z: tile_z as u32,
                };
                if !self.is_walkable(tile) {
                    continue;
                }
                let center = self.tile_center_world(tile);
                let distance = center.flattened().distance(flat_point);
                if distance > max_distance {
                    continue;
                }
                if best.map_or(true, |(best_distance, _)| distance < best_distance) {
                    best = Some((distance, center));
                }
            }
        }
        best.map(|(_, center)| center)
    }
}

#[derive(Debug, Clone, Copy)]
struct OpenNode {
    coord: TileCoord,
    h_cost: u32,
    f_cost: u32,
    insertion_order: u64,
}

fn pick_best_open_node_index(open: &[OpenNode]) -> usize {
    let mut best_index = 0usize;
    for index in 1..open.len() {
        if open_node_order_key(open[index]) < open_node_order_key(open[best_index]) {
            best_index = index;
        }
    }
    best_index
}

fn open_node_order_key(node: OpenNode) -> (u32, u32, u32, u32, u64) {
    (
        node.f_cost,
        node.h_cost,
        node.coord.z,
        node.coord.x,
        node.insertion_order,
    )
}

fn reconstruct_tile_path(
    mesh: &GridNavMesh,
    parent: &[Option<usize>],
    start_index: usize,
    end_index: usize,
) -> Option<Vec<TileCoord>> {
    let mut cursor = end_index;
    let mut indices = vec![cursor];
    while cursor != start_index {
        cursor = parent.get(cursor).and_then(|value| *value)?;
        indices.push(cursor);
    }
    indices.reverse();
    Some(indices.into_iter().map(|index| mesh.coord_of(index)).collect())
}

fn manhattan_distance(a: TileCoord, b: TileCoord) -> u32 {
    a.x.abs_diff(b.x).saturating_add(a.z.abs_diff(b.z))
}

/// Waypoint-following agent on a shared [`GridNavMesh`].
///
/// A destination request resolves on the next `step`, so `path_pending` is true
/// for the tick in which the request was issued.
#[derive(Debug, Clone)]
pub struct GridNavAgent {
    mesh: Rc<GridNavMesh>,
    position: Vec3,
    velocity: Vec3,
    speed: f32,
    stopping_distance: f32,
    stopped: bool,
    destination: Option<Vec3>,
    pending: bool,
    status: PathStatus,
    waypoints: Vec<Vec3>,
    next_waypoint: usize,
}

impl GridNavAgent {
    pub fn new(mesh: Rc<GridNavMesh>, position: Vec3, speed: f32) -> Self {
        Self {
            mesh,
            position,
            velocity: Vec3::ZERO,
            speed: speed.max(0.0),
            stopping_distance: 0.0,
            stopped: false,
            destination: None,
            pending: false,
            status: PathStatus::Complete,
            waypoints: Vec::new(),
            next_waypoint: 0,
        }
    }

    fn resolve_path(&mut self) {
        self.pending = false;
        let Some(goal) = self.destination else {
            return;
        };
        self.next_waypoint = 0;
        match self.mesh.find_path(self.position, goal) {
            Some(path) => {
                self.status = path.status;
                self.waypoints = path.waypoints;
            }
            None => {
                self.status = PathStatus::Invalid;
                self.waypoints.clear();
            }
        }
    }

    fn path_length_remaining(&self) -> f32 {
        let mut cursor = self.position;
        let mut total = 0.0;
        for waypoint in self.waypoints.iter().skip(self.next_waypoint) {
            total += waypoint.flattened().distance(cursor.flattened());
            cursor = *waypoint;
        }
        total
    }
}

impl NavigationAgent for GridNavAgent {
    fn position(&self) -> Vec3 {
        self.position
    }

    fn velocity(&self) -> Vec3 {
        self.velocity
    }

    fn is_on_nav_mesh(&self) -> bool {
        self.mesh.is_walkable_world(self.position)
    }

    fn set_destination(&mut self, point: Vec3) -> bool {
        if !point.is_finite() {
            return false;
        }
        if let Some(current) = self.destination {
            if !self.pending && current.distance_squared(point) <= DESTINATION_REUSE_EPSILON_SQ {
                return true;
            }
        }
        self.destination = Some(point);
        self.pending = true;
        true
    }

    fn destination(&self) -> Option<Vec3> {
        self.destination
    }

    fn has_path(&self) -> bool {
        self.destination.is_some() && !self.waypoints.is_empty()
    }

    fn path_pending(&self) -> bool {
        self.pending
    }

    fn path_status(&self) -> PathStatus {
        self.status
    }

    fn remaining_distance(&self) -> f32 {
        if self.pending || self.status == PathStatus::Invalid {
            return f32::INFINITY;
        }
        self.path_length_remaining()
    }

    fn reset_path(&mut self) {
        self.destination = None;
        self.pending = false;
        self.status = PathStatus::Complete;
        self.waypoints.clear();
        self.next_waypoint = 0;
        self.velocity = Vec3::ZERO;
    }

    fn warp(&mut self, point: Vec3) -> bool {
        if !self.mesh.is_walkable_world(point) {
            return false;
        }
        self.position = self.mesh.on_surface(point);
        self.reset_path();
        true
    }

    fn stopping_distance(&self) -> f32 {
        self.stopping_distance
    }

    fn set_stopping_distance(&mut self, distance: f32) {
        self.stopping_distance = distance.max(0.0);
    }

    fn speed(&self) -> f32 {
        self.speed
    }

    fn set_speed(&mut self, speed: f32) {
        self.speed = if speed.is_finite() { speed.max(0.0) } else { 0.0 };
    }

    fn is_stopped(&self) -> bool {
        self.stopped
    }

    fn set_stopped(&mut self, stopped: bool) {
        self.stopped = stopped;
        if stopped {
            self.velocity = Vec3::ZERO;
        }
    }

    fn step(&mut self, dt_seconds: f32) {
        if self.pending {
            self.resolve_path();
        }
        self.velocity = Vec3::ZERO;
        if self.stopped || dt_seconds <= 0.0 || self.destination.is_none() {
            return;
        }

        let start = self.position;
        let mut budget = self.speed * dt_seconds;
        while budget > 0.0 && self.next_waypoint < self.waypoints.len() {
            if self.path_length_remaining() <= self.stopping_distance {
                break;
            }
            let waypoint = self.waypoints[self.next_waypoint];
            let to_waypoint = (waypoint - self.position).flattened();
            let distance = to_waypoint.length();
            if distance <= budget {
                self.position = waypoint;
                budget -= distance;
                self.next_waypoint += 1;
            } else {
                self.position = self.position + to_waypoint * (budget / distance);
                budget = 0.0;
            }
        }
        self.velocity = (self.position - start) * dt_seconds.recip();
    }
}
