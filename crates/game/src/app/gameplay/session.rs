use std::collections::BTreeMap;
use std::rc::Rc;

use rescue_engine::{
    EventHub, NavMesh, NavigationAgent, ObjectId, SimClock, SpatialQuery, SubscriptionId, Vec3,
};
use tracing::{debug, info};

use super::alarm::AlarmController;
use super::civilian::{Civilian, CivilianState};
use super::fire::FireSet;
use super::fire_registry::FireRegistry;
use super::injured_registry::InjuredRegistry;
use super::interaction::{InteractContext, Interactable};
use super::mission::{MissionHandle, MissionSnapshot, MissionState};
use super::responder::{ResponderAgent, ResponderWorld};
use super::subscriber::{EventContext, SimSubscriber};
use super::types::{
    merge_in_raise_order, CivilianId, FireId, InputAction, InteractTarget, ResponderId, VehicleId,
};
use super::vehicle::{VehicleAgent, VehicleWorld};
use crate::config::MissionConfig;
use crate::presentation::{
    ActorRef, AnimatorCue, Cue, GaitTracker, Locomotion, NullPresentation, PresentationSink,
};

pub const SIM_SYSTEM_ORDER_TEXT: &str =
    "Navigation>Fires>Civilians>Responders>Vehicles>Presentation";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimSystemId {
    Navigation,
    Fires,
    Civilians,
    Responders,
    Vehicles,
    Presentation,
}

impl SimSystemId {
    pub fn name(self) -> &'static str {
        match self {
            Self::Navigation => "Navigation",
            Self::Fires => "Fires",
            Self::Civilians => "Civilians",
            Self::Responders => "Responders",
            Self::Vehicles => "Vehicles",
            Self::Presentation => "Presentation",
        }
    }
}

const SIM_SYSTEM_ORDER: [SimSystemId; 6] = [
    SimSystemId::Navigation,
    SimSystemId::Fires,
    SimSystemId::Civilians,
    SimSystemId::Responders,
    SimSystemId::Vehicles,
    SimSystemId::Presentation,
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FireStart {
    #[default]
    Immediate,
    Delayed,
    Dormant,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FireSpawn {
    pub host: ObjectId,
    pub structure: Option<ObjectId>,
    pub position: Vec3,
    pub emitter: Option<Vec3>,
    pub start: FireStart,
}

impl FireSpawn {
    pub fn immediate(host: ObjectId, position: Vec3) -> Self {
        Self {
            host,
            structure: None,
            position,
            emitter: None,
            start: FireStart::Immediate,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CivilianSpawn {
    pub position: Vec3,
    pub house: Option<ObjectId>,
    pub safe_points: Vec<Vec3>,
}

#[derive(Debug, Default)]
struct PresentedState {
    fire_emitting: BTreeMap<FireId, bool>,
    civilian_states: BTreeMap<CivilianId, CivilianState>,
    gaits: BTreeMap<ActorRef, GaitTracker>,
}

/// One mission: every entity, both registries, the subscriber list and the clock.
///
/// Each tick runs the systems in [`SIM_SYSTEM_ORDER_TEXT`] order. Registry events are
/// delivered to subscribers after every step that can produce them, so a cascade
/// (fire out, mission complete, time paused) finishes inside that step.
pub struct Session {
    config: MissionConfig,
    clock: SimClock,
    fires: FireSet,
    fire_registry: FireRegistry,
    injured_registry: InjuredRegistry,
    civilians: BTreeMap<CivilianId, Civilian>,
    responders: BTreeMap<ResponderId, ResponderAgent>,
    vehicles: BTreeMap<VehicleId, VehicleAgent>,
    navmesh: Option<Rc<dyn NavMesh>>,
    spatial: Option<Box<dyn SpatialQuery>>,
    subscribers: EventHub<dyn SimSubscriber>,
    mission: MissionHandle,
    presentation: Box<dyn PresentationSink>,
    presented: PresentedState,
    leader: Option<Vec3>,
    last_tick_order: Vec<SimSystemId>,
    next_civilian_id: u64,
    next_responder_id: u64,
    next_vehicle_id: u64,
}

impl Session {
    pub fn new(config: MissionConfig) -> Self {
        let mission = MissionHandle::new();
        let mut subscribers: EventHub<dyn SimSubscriber> = EventHub::new();
        subscribers.subscribe("mission", Box::new(mission.clone()));
        subscribers.subscribe("alarm", Box::new(AlarmController::new()));
        Self {
            config,
            clock: SimClock::new(),
            fires: FireSet::new(),
            fire_registry: FireRegistry::new(),
            injured_registry: InjuredRegistry::new(),
            civilians: BTreeMap::new(),
            responders: BTreeMap::new(),
            vehicles: BTreeMap::new(),
            navmesh: None,
            spatial: None,
            subscribers,
            mission,
            presentation: Box::new(NullPresentation),
            presented: PresentedState::default(),
            leader: None,
            last_tick_order: Vec::with_capacity(SIM_SYSTEM_ORDER.len()),
            next_civilian_id: 0,
            next_responder_id: 0,
            next_vehicle_id: 0,
        }
    }

    pub fn with_navmesh(mut self, navmesh: Rc<dyn NavMesh>) -> Self {
        self.navmesh = Some(navmesh);
        self
    }

    pub fn with_spatial(mut self, spatial: Box<dyn SpatialQuery>) -> Self {
        self.spatial = Some(spatial);
        self
    }

    pub fn with_presentation(mut self, presentation: Box<dyn PresentationSink>) -> Self {
        self.presentation = presentation;
        self
    }

    pub fn subscribe(
        &mut self,
        label: &'static str,
        subscriber: Box<dyn SimSubscriber>,
    ) -> SubscriptionId {
        self.subscribers.subscribe(label, subscriber)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    pub fn config(&self) -> &MissionConfig {
        &self.config
    }

    pub fn clock(&self) -> &SimClock {
        &self.clock
    }

    pub fn fires(&self) -> &FireSet {
        &self.fires
    }

    pub fn fire_registry(&self) -> &FireRegistry {
        &self.fire_registry
    }

    pub fn injured_registry(&self) -> &InjuredRegistry {
        &self.injured_registry
    }

    pub fn civilian(&self, id: CivilianId) -> Option<&Civilian> {
        self.civilians.get(&id)
    }

    pub fn civilians(&self) -> impl Iterator<Item = &Civilian> + '_ {
        self.civilians.values()
    }

    pub fn responder(&self, id: ResponderId) -> Option<&ResponderAgent> {
        self.responders.get(&id)
    }

    pub fn vehicle(&self, id: VehicleId) -> Option<&VehicleAgent> {
        self.vehicles.get(&id)
    }

    pub fn mission(&self) -> &MissionHandle {
        &self.mission
    }

    pub fn mission_state(&self) -> MissionState {
        self.mission.state()
    }

    pub fn mission_snapshot(&self) -> MissionSnapshot {
        self.mission.snapshot(self.clock.unscaled_time())
    }

    pub fn last_tick_order(&self) -> &[SimSystemId] {
        &self.last_tick_order
    }

    pub fn leader(&self) -> Option<Vec3> {
        self.leader
    }

    /// Position responders trail behind, usually the player.
    pub fn set_leader(&mut self, leader: Option<Vec3>) {
        self.leader = leader;
    }

    pub fn add_fire(&mut self, spawn: FireSpawn) -> Option<FireId> {
        let Some(id) = self
            .fires
            .spawn_on(spawn.host, spawn.structure, spawn.position, &self.config.fire)
        else {
            debug!(host = spawn.host.0, "fire_spawn_rejected_host_burning");
            return None;
        };
        if let Some(emitter) = spawn.emitter {
            self.fires.set_emitter(id, emitter);
        }
        let now = self.clock.time();
        match spawn.start {
            FireStart::Immediate => {
                self.fires.ignite(id, now, Some(&mut self.fire_registry));
            }
            FireStart::Delayed => {
                self.fires
                    .schedule_ignition(id, now, self.config.fire.delayed_start_seconds);
            }
            FireStart::Dormant => {}
        }
        self.flush_events();
        Some(id)
    }

    /// Lights a dormant or scheduled fire right away.
    pub fn ignite(&mut self, id: FireId) -> bool {
        let lit = self
            .fires
            .ignite(id, self.clock.time(), Some(&mut self.fire_registry));
        self.flush_events();
        lit
    }

    pub fn add_civilian(
        &mut self,
        spawn: CivilianSpawn,
        nav: Option<Box<dyn NavigationAgent>>,
    ) -> CivilianId {
        self.next_civilian_id = self.next_civilian_id.saturating_add(1);
        let id = CivilianId(self.next_civilian_id);
        let mut civilian = Civilian::new(
            id,
            spawn.position,
            spawn.house,
            spawn.safe_points,
            &self.config.civilian,
            nav,
        );
        civilian.spawn(self.navmesh.as_deref(), Some(&mut self.injured_registry));
        self.civilians.insert(id, civilian);
        self.flush_events();
        id
    }

    pub fn add_responder(&mut self, nav: Box<dyn NavigationAgent>) -> ResponderId {
        self.next_responder_id = self.next_responder_id.saturating_add(1);
        let id = ResponderId(self.next_responder_id);
        self.responders
            .insert(id, ResponderAgent::new(id, &self.config.responder, nav));
        id
    }

    pub fn add_vehicle(&mut self, nav: Box<dyn NavigationAgent>) -> VehicleId {
        self.next_vehicle_id = self.next_vehicle_id.saturating_add(1);
        let id = VehicleId(self.next_vehicle_id);
        let mut vehicle = VehicleAgent::new(id, &self.config.vehicle, nav);
        vehicle.spawn(self.navmesh.as_deref());
        self.vehicles.insert(id, vehicle);
        id
    }

    pub fn target_position(&self, target: InteractTarget) -> Option<Vec3> {
        match target {
            InteractTarget::Fire(id) => self.fires.get(id).map(|fire| fire.world_position()),
            InteractTarget::Civilian(id) => self.civilians.get(&id).map(Civilian::position),
        }
    }

    /// Interacts with `target` regardless of who asked. Unknown targets are ignored.
    pub fn interact(&mut self, target: InteractTarget) -> bool {
        let mut context = InteractContext {
            fires: Some(&mut self.fire_registry),
            injured: Some(&mut self.injured_registry),
        };
        let changed = match target {
            InteractTarget::Fire(id) => self
                .fires
                .get_mut(id)
                .is_some_and(|fire| fire.interact(&mut context)),
            InteractTarget::Civilian(id) => self
                .civilians
                .get_mut(&id)
                .is_some_and(|civilian| civilian.interact(&mut context)),
        };
        self.flush_events();
        changed
    }

    /// Player input: `Interact` reaches fires, `Help` reaches civilians, both within reach.
    pub fn player_action(
        &mut self,
        action: InputAction,
        target: InteractTarget,
        player_position: Vec3,
    ) -> bool {
        if !action.accepts(target) {
            debug!(action = ?action, target = ?target, "player_action_not_applicable");
            return false;
        }
        let Some(position) = self.target_position(target) else {
            return false;
        };
        if position.flattened().distance(player_position.flattened())
            > self.config.player.interaction_range
        {
            debug!(action = ?action, target = ?target, "player_action_out_of_range");
            return false;
        }
        self.interact(target)
    }

    pub fn tick(&mut self, unscaled_dt_seconds: f32) {
        self.clock.advance(unscaled_dt_seconds);
        let now = self.clock.time();
        let dt_seconds = self.clock.delta_seconds();

        self.last_tick_order.clear();
        for system_id in SIM_SYSTEM_ORDER {
            self.last_tick_order.push(system_id);
            self.run_system(system_id, now, dt_seconds);
        }
    }

    fn run_system(&mut self, system_id: SimSystemId, now: f64, dt_seconds: f32) {
        match system_id {
            SimSystemId::Navigation => self.run_navigation_system(dt_seconds),
            SimSystemId::Fires => self.run_fire_system(now),
            SimSystemId::Civilians => self.run_civilian_system(),
            SimSystemId::Responders => self.run_responder_system(now),
            SimSystemId::Vehicles => self.run_vehicle_system(now, dt_seconds),
            SimSystemId::Presentation => self.run_presentation_system(dt_seconds),
        }
    }

    fn run_navigation_system(&mut self, dt_seconds: f32) {
        for civilian in self.civilians.values_mut() {
            if let Some(nav) = civilian.nav_mut() {
                nav.step(dt_seconds);
            }
        }
        for responder in self.responders.values_mut() {
            responder.nav_mut().step(dt_seconds);
        }
        for vehicle in self.vehicles.values_mut() {
            vehicle.nav_mut().step(dt_seconds);
        }
    }

    fn run_fire_system(&mut self, now: f64) {
        let spread = self.fires.tick(
            now,
            self.spatial.as_deref(),
            &self.config.fire,
            Some(&mut self.fire_registry),
        );
        if !spread.is_empty() {
            debug!(count = spread.len(), "fires_spread_this_tick");
        }
        self.flush_events();
    }

    fn run_civilian_system(&mut self) {
        let navmesh = self.navmesh.as_deref();
        for civilian in self.civilians.values_mut() {
            civilian.tick(&self.fires, navmesh);
        }
    }

    fn run_responder_system(&mut self, now: f64) {
        let ids = self.responders.keys().copied().collect::<Vec<_>>();
        for id in ids {
            let Some(responder) = self.responders.get_mut(&id) else {
                continue;
            };
            let mut world = ResponderWorld {
                fires: &mut self.fires,
                registry: Some(&mut self.fire_registry),
                navmesh: self.navmesh.as_deref(),
            };
            responder.tick(now, self.leader, &mut world);
            self.flush_events();
        }
    }

    fn run_vehicle_system(&mut self, now: f64, dt_seconds: f32) {
        let world = VehicleWorld {
            fires: &self.fires,
            registry: Some(&self.fire_registry),
            navmesh: self.navmesh.as_deref(),
        };
        for vehicle in self.vehicles.values_mut() {
            vehicle.tick(now, dt_seconds, &world);
        }
    }

    fn run_presentation_system(&mut self, dt_seconds: f32) {
        let presentation = self.presentation.as_mut();

        for fire in self.fires.iter() {
            let emitting = fire.is_burning();
            let was_emitting = self
                .presented
                .fire_emitting
                .insert(fire.id(), emitting)
                .unwrap_or(false);
            if was_emitting != emitting {
                presentation.cue(Cue::FireEmission {
                    fire: fire.id(),
                    emitting,
                });
            }
        }

        for civilian in self.civilians.values() {
            let actor = ActorRef::Civilian(civilian.id());
            let state = civilian.state();
            let previous = self
                .presented
                .civilian_states
                .insert(civilian.id(), state)
                .unwrap_or_default();
            if previous.is_injured() != state.is_injured() {
                presentation.cue(Cue::Animator {
                    actor,
                    cue: AnimatorCue::IsInjured(state.is_injured()),
                });
            }
            if previous.is_panicking() != state.is_panicking() {
                presentation.cue(Cue::Animator {
                    actor,
                    cue: AnimatorCue::IsPanicking(state.is_panicking()),
                });
            }
            if previous != state && state == CivilianState::Helped {
                presentation.cue(Cue::Animator {
                    actor,
                    cue: AnimatorCue::Helped,
                });
            }
            if let Some(nav) = civilian.nav() {
                let locomotion = agent_locomotion(nav);
                presentation.locomotion(actor, locomotion);
                self.presented
                    .gaits
                    .entry(actor)
                    .or_default()
                    .advance(actor, locomotion, dt_seconds, presentation);
            }
        }

        for responder in self.responders.values() {
            let actor = ActorRef::Responder(responder.id());
            let locomotion = agent_locomotion(responder.nav());
            presentation.locomotion(actor, locomotion);
            self.presented
                .gaits
                .entry(actor)
                .or_default()
                .advance(actor, locomotion, dt_seconds, presentation);
        }
        for vehicle in self.vehicles.values() {
            presentation.locomotion(
                ActorRef::Vehicle(vehicle.id()),
                Locomotion::from_speeds(vehicle.current_speed(), self.config.vehicle.max_speed),
            );
        }

        self.mission
            .update_timer(self.clock.unscaled_time(), presentation);
    }

    /// Delivers pending registry events in raise order to every subscriber, in
    /// subscription order.
    fn flush_events(&mut self) {
        let mut pause_requested = false;
        loop {
            let batch = merge_in_raise_order([
                self.fire_registry.drain_stamped_events(),
                self.injured_registry.drain_stamped_events(),
            ]);
            if batch.is_empty() {
                break;
            }
            for event in batch {
                let mut context = EventContext::new(
                    &self.fire_registry,
                    &self.injured_registry,
                    self.clock.unscaled_time(),
                    self.presentation.as_mut(),
                );
                let report = self
                    .subscribers
                    .deliver(event.name(), |subscriber| subscriber.on_event(event, &mut context));
                pause_requested |= context.pause_requested();
                debug!(
                    event = event.name(),
                    delivered = report.delivered,
                    failed = report.failed.len(),
                    "event_delivered"
                );
            }
        }
        if pause_requested && !self.clock.is_paused() {
            self.clock.set_time_scale(0.0);
            info!(
                tick = self.clock.tick(),
                unscaled_time = self.clock.unscaled_time(),
                "simulation_paused"
            );
        }
    }
}

fn agent_locomotion(nav: &dyn NavigationAgent) -> Locomotion {
    Locomotion::from_speeds(nav.velocity().flattened().length(), nav.speed())
}

#[cfg(test)]
mod tests;
