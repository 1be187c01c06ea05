use std::collections::BTreeMap;
use std::rc::Rc;

use rescue_engine::{GridError, GridNavAgent, GridNavMesh, NavMesh, ObjectId, SpatialIndex, Vec3};
use thiserror::Error;
use tracing::{debug, info};

use super::gameplay::{CivilianSpawn, FireSpawn, FireStart, Session};
use crate::config::{MissionConfig, ObjectConfig, ScenarioConfig};
use crate::presentation::PresentationSink;

const PLAYER_SPAWN_SAMPLE_RADIUS: f32 = 3.0;

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("scenario grid is invalid: {0}")]
    Grid(#[source] GridError),
    #[error("object id {id} is declared twice")]
    DuplicateObject { id: u64 },
    #[error("object {id} belongs to unknown structure {structure}")]
    UnknownStructure { id: u64, structure: u64 },
    #[error("fire {index} is hosted by unknown object {host}")]
    UnknownFireHost { index: usize, host: u64 },
    #[error("fire {index} is a second fire on object {host}")]
    DuplicateFireHost { index: usize, host: u64 },
    #[error("civilian {index} lives in unknown object {house}")]
    UnknownHouse { index: usize, house: u64 },
}

/// A ready-to-run mission: the session plus the player's own agent.
pub struct Scenario {
    pub session: Session,
    pub navmesh: Rc<GridNavMesh>,
    pub player: GridNavAgent,
}

pub fn build_scenario(
    config: MissionConfig,
    presentation: Box<dyn PresentationSink>,
) -> Result<Scenario, ScenarioError> {
    let layout = config.scenario_or_demo();
    let navmesh = Rc::new(
        GridNavMesh::from_rows(layout.origin, &layout.grid).map_err(ScenarioError::Grid)?,
    );
    let objects = index_objects(&layout)?;

    let mut spatial = SpatialIndex::new();
    for object in objects.values() {
        spatial.insert(
            ObjectId(object.id),
            object.position,
            object.tag.clone(),
            object.structure.map(ObjectId),
        );
    }

    let civilian_speed = config.civilian.move_speed;
    let responder_speed = config.responder.move_speed;
    let player_speed = config.player.move_speed;
    let mut session = Session::new(config)
        .with_navmesh(navmesh.clone())
        .with_spatial(Box::new(spatial))
        .with_presentation(presentation);

    for (index, civilian) in layout.civilians.iter().enumerate() {
        if let Some(house) = civilian.house {
            if !objects.contains_key(&house) {
                return Err(ScenarioError::UnknownHouse { index, house });
            }
        }
        let nav = GridNavAgent::new(Rc::clone(&navmesh), civilian.position, civilian_speed);
        session.add_civilian(
            CivilianSpawn {
                position: civilian.position,
                house: civilian.house.map(ObjectId),
                safe_points: civilian.safe_points.clone(),
            },
            Some(Box::new(nav)),
        );
    }

    for position in &layout.responders {
        let nav = GridNavAgent::new(Rc::clone(&navmesh), *position, responder_speed);
        session.add_responder(Box::new(nav));
    }

    for position in &layout.vehicles {
        let nav = GridNavAgent::new(Rc::clone(&navmesh), *position, 0.0);
        session.add_vehicle(Box::new(nav));
    }

    for (index, fire) in layout.fires.iter().enumerate() {
        let Some(host) = objects.get(&fire.host) else {
            return Err(ScenarioError::UnknownFireHost {
                index,
                host: fire.host,
            });
        };
        let spawn = FireSpawn {
            host: ObjectId(host.id),
            structure: host.structure.map(ObjectId),
            position: host.position,
            emitter: fire.emitter,
            start: if fire.delayed {
                FireStart::Delayed
            } else {
                FireStart::Immediate
            },
        };
        if session.add_fire(spawn).is_none() {
            return Err(ScenarioError::DuplicateFireHost {
                index,
                host: fire.host,
            });
        }
    }

    let player_spawn = player_spawn_or(&navmesh, layout.player);
    let player = GridNavAgent::new(Rc::clone(&navmesh), player_spawn, player_speed);
    session.set_leader(Some(player_spawn));

    info!(
        width = navmesh.width(),
        height = navmesh.height(),
        objects = objects.len(),
        fires = session.fires().len(),
        civilians = layout.civilians.len(),
        responders = layout.responders.len(),
        vehicles = layout.vehicles.len(),
        "scenario_loaded"
    );

    Ok(Scenario {
        session,
        navmesh,
        player,
    })
}

fn index_objects(layout: &ScenarioConfig) -> Result<BTreeMap<u64, ObjectConfig>, ScenarioError> {
    let mut objects = BTreeMap::new();
    for object in &layout.objects {
        if objects.insert(object.id, object.clone()).is_some() {
            return Err(ScenarioError::DuplicateObject { id: object.id });
        }
    }
    for object in objects.values() {
        if let Some(structure) = object.structure {
            if !objects.contains_key(&structure) {
                return Err(ScenarioError::UnknownStructure {
                    id: object.id,
                    structure,
                });
            }
        }
    }
    debug!(count = objects.len(), "scenario_objects_indexed");
    Ok(objects)
}

/// Start position used when the configured player spawn is off the grid.
pub fn player_spawn_or(navmesh: &GridNavMesh, requested: Vec3) -> Vec3 {
    navmesh
        .sample_position(requested, PLAYER_SPAWN_SAMPLE_RADIUS)
        .unwrap_or(requested)
}
