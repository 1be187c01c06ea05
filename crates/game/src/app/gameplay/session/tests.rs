use std::cell::RefCell;
use std::rc::Rc;

use rescue_engine::{GridNavAgent, GridNavMesh, SpatialIndex, SubscriberError, FLAMMABLE_TAG};

use super::*;
use crate::app::gameplay::test_support::ScriptedNavAgent;
use crate::app::gameplay::{
    ResponderState, SimEvent, VehicleState, FIRES_DONE_TEXT, FIRE_ALERT_TEXT, INJURED_DONE_TEXT,
    MISSION_COMPLETE_TEXT,
};
use crate::presentation::{HudSlot, RecordingPresentation};

const DT: f32 = 1.0 / 60.0;

fn recording_session(config: MissionConfig) -> (Session, Rc<RefCell<RecordingPresentation>>) {
    let sink = Rc::new(RefCell::new(RecordingPresentation::default()));
    let session = Session::new(config).with_presentation(Box::new(Rc::clone(&sink)));
    (session, sink)
}

fn tick_for(session: &mut Session, seconds: f32, dt: f32) {
    let steps = (seconds / dt).ceil() as u32;
    for _ in 0..steps {
        session.tick(dt);
    }
}

struct EventLog {
    seen: Rc<RefCell<Vec<SimEvent>>>,
}

impl SimSubscriber for EventLog {
    fn on_event(
        &mut self,
        event: SimEvent,
        _context: &mut EventContext<'_>,
    ) -> Result<(), SubscriberError> {
        self.seen.borrow_mut().push(event);
        Ok(())
    }
}

struct AlwaysFails;

impl SimSubscriber for AlwaysFails {
    fn on_event(
        &mut self,
        _event: SimEvent,
        _context: &mut EventContext<'_>,
    ) -> Result<(), SubscriberError> {
        Err(SubscriberError::Rejected("listener offline".to_string()))
    }
}

#[test]
fn tick_runs_systems_in_fixed_order() {
    let mut session = Session::new(MissionConfig::default());
    session.tick(DT);

    let order = session
        .last_tick_order()
        .iter()
        .map(|system| system.name())
        .collect::<Vec<_>>()
        .join(">");
    assert_eq!(order, SIM_SYSTEM_ORDER_TEXT);
}

#[test]
fn first_fire_starts_mission_with_alert_then_alarm() {
    let (mut session, sink) = recording_session(MissionConfig::default());
    let fire = session
        .add_fire(FireSpawn::immediate(ObjectId(1), Vec3::ZERO))
        .expect("fire");

    assert_eq!(session.mission_state(), MissionState::InProgress);
    assert_eq!(
        sink.borrow().cues,
        vec![
            Cue::hud(HudSlot::Alert, FIRE_ALERT_TEXT),
            Cue::hud(HudSlot::Fires, ""),
            Cue::AlertFlashStart,
            Cue::AlarmStart,
        ]
    );

    session.tick(DT);
    assert_eq!(
        sink.borrow().count(&Cue::FireEmission {
            fire,
            emitting: true
        }),
        1
    );
}

#[test]
fn second_fire_on_same_host_is_rejected() {
    let mut session = Session::new(MissionConfig::default());
    assert!(session
        .add_fire(FireSpawn::immediate(ObjectId(1), Vec3::ZERO))
        .is_some());
    assert!(session
        .add_fire(FireSpawn::immediate(ObjectId(1), Vec3::ZERO))
        .is_none());
    assert_eq!(session.fire_registry().active_count(), 1);
}

#[test]
fn delayed_fire_ignites_after_start_delay() {
    let mut session = Session::new(MissionConfig::default());
    let fire = session
        .add_fire(FireSpawn {
            start: FireStart::Delayed,
            ..FireSpawn::immediate(ObjectId(1), Vec3::ZERO)
        })
        .expect("fire");

    tick_for(&mut session, 4.8, 0.1);
    assert!(!session.fire_registry().is_active(fire));
    assert_eq!(session.mission_state(), MissionState::NotStarted);

    tick_for(&mut session, 0.3, 0.1);
    assert!(session.fire_registry().is_active(fire));
    assert_eq!(session.mission_state(), MissionState::InProgress);
}

#[test]
fn burning_fire_spreads_to_flammable_neighbour_on_interval() {
    let mut index = SpatialIndex::new();
    index.insert(ObjectId(1), Vec3::ZERO, FLAMMABLE_TAG, None);
    index.insert(ObjectId(2), Vec3::new(4.0, 0.0, 0.0), "Untagged", None);
    index.insert(ObjectId(3), Vec3::new(6.0, 0.0, 0.0), FLAMMABLE_TAG, None);
    index.insert(ObjectId(4), Vec3::new(30.0, 0.0, 0.0), FLAMMABLE_TAG, None);
    let mut session = Session::new(MissionConfig::default()).with_spatial(Box::new(index));
    session.add_fire(FireSpawn::immediate(ObjectId(1), Vec3::ZERO));

    tick_for(&mut session, 5.5, 0.5);
    assert_eq!(session.fires().len(), 1);

    tick_for(&mut session, 1.0, 0.5);
    assert!(session.fires().fire_on(ObjectId(3)).is_some());
    assert!(session.fires().fire_on(ObjectId(2)).is_none());
    assert!(session.fires().fire_on(ObjectId(4)).is_none());
    assert_eq!(session.fire_registry().active_count(), 2);
}

#[test]
fn putting_out_one_of_two_fires_keeps_mission_running() {
    let (mut session, sink) = recording_session(MissionConfig::default());
    let first = session
        .add_fire(FireSpawn::immediate(ObjectId(1), Vec3::ZERO))
        .expect("first fire");
    let second = session
        .add_fire(FireSpawn::immediate(ObjectId(2), Vec3::new(20.0, 0.0, 0.0)))
        .expect("second fire");

    assert!(session.interact(InteractTarget::Fire(first)));
    session.tick(DT);

    assert!(!session.fire_registry().all_fires_out());
    assert!(session.fire_registry().is_active(second));
    assert_eq!(session.mission_state(), MissionState::InProgress);
    assert!(!session.clock().is_paused());
    {
        let sink = sink.borrow();
        assert!(!sink
            .cues
            .iter()
            .any(|cue| matches!(cue, Cue::MissionComplete { .. })));
        assert!(sink.hud_texts(HudSlot::Banner).is_empty());
        assert_eq!(sink.count(&Cue::AlarmStop), 0);
    }

    assert!(session.interact(InteractTarget::Fire(second)));
    assert_eq!(session.mission_state(), MissionState::Complete);
    assert_eq!(
        sink.borrow().hud_texts(HudSlot::Banner),
        vec![MISSION_COMPLETE_TEXT]
    );
}

#[test]
fn responder_extinguishes_and_mission_completes_without_civilians() {
    let (mut session, sink) = recording_session(MissionConfig::default());
    let (nav, _script) = ScriptedNavAgent::new(Vec3::ZERO);
    let responder = session.add_responder(Box::new(nav));
    session.set_leader(Some(Vec3::ZERO));
    let fire = session
        .add_fire(FireSpawn::immediate(ObjectId(1), Vec3::new(1.0, 0.0, 0.0)))
        .expect("fire");

    session.tick(DT);

    assert!(session.fires().get(fire).expect("fire").is_extinguished());
    assert_eq!(session.mission_state(), MissionState::Complete);
    assert!(session.clock().is_paused());
    assert_eq!(
        session.responder(responder).expect("responder").state(),
        ResponderState::Follow
    );
    {
        let sink = sink.borrow();
        assert_eq!(sink.count(&Cue::AlarmStop), 1);
        assert_eq!(sink.hud_texts(HudSlot::Fires).last(), Some(&FIRES_DONE_TEXT));
        assert!(sink
            .cues
            .iter()
            .any(|cue| matches!(cue, Cue::MissionComplete { .. })));
    }

    let elapsed = session.mission_snapshot().elapsed_seconds.expect("elapsed");
    let scaled_before = session.clock().time();
    tick_for(&mut session, 1.0, DT);
    assert_eq!(session.clock().time(), scaled_before);
    assert!(session.clock().unscaled_time() > 1.0);
    assert_eq!(session.mission_snapshot().elapsed_seconds, Some(elapsed));
}

#[test]
fn civilian_flees_calms_and_player_help_completes_mission() {
    let (mut session, sink) = recording_session(MissionConfig::default());
    let (nav, script) = ScriptedNavAgent::new(Vec3::new(2.0, 0.0, 0.0));
    let civilian = session.add_civilian(
        CivilianSpawn {
            position: Vec3::new(2.0, 0.0, 0.0),
            house: Some(ObjectId(5)),
            safe_points: vec![
                Vec3::new(20.0, 0.0, 0.0),
                Vec3::new(8.0, 0.0, 0.0),
                Vec3::new(-30.0, 0.0, 0.0),
            ],
        },
        Some(Box::new(nav)),
    );
    let fire = session
        .add_fire(FireSpawn::immediate(ObjectId(5), Vec3::ZERO))
        .expect("fire");

    session.tick(DT);
    assert_eq!(
        session.civilian(civilian).expect("civilian").state(),
        CivilianState::Panicking
    );
    assert_eq!(script.borrow().last_requested, Some(Vec3::new(8.0, 0.0, 0.0)));

    {
        let mut script = script.borrow_mut();
        script.position = Vec3::new(7.5, 0.0, 0.0);
        script.remaining = 0.5;
    }
    session.tick(DT);
    assert_eq!(
        session.civilian(civilian).expect("civilian").state(),
        CivilianState::Calm
    );

    let player = Vec3::new(9.0, 0.0, 0.0);
    assert!(session.player_action(InputAction::Help, InteractTarget::Civilian(civilian), player));
    assert_eq!(session.injured_registry().helped(), 1);
    assert_eq!(session.mission_state(), MissionState::InProgress);
    assert_eq!(sink.borrow().hud_texts(HudSlot::Injured), vec![INJURED_DONE_TEXT]);

    assert!(session.interact(InteractTarget::Fire(fire)));
    assert_eq!(session.mission_state(), MissionState::Complete);

    session.tick(DT);
    let actor = ActorRef::Civilian(civilian);
    let animator = sink
        .borrow()
        .cues
        .iter()
        .filter_map(|cue| match cue {
            Cue::Animator { actor: seen, cue } if *seen == actor => Some(*cue),
            _ => None,
        })
        .collect::<Vec<_>>();
    assert_eq!(
        animator,
        vec![
            AnimatorCue::IsInjured(true),
            AnimatorCue::IsPanicking(true),
            AnimatorCue::IsPanicking(false),
            AnimatorCue::IsInjured(false),
            AnimatorCue::Helped,
        ]
    );
}

#[test]
fn player_actions_route_by_target_kind_and_reach() {
    let mut session = Session::new(MissionConfig::default());
    let fire = session
        .add_fire(FireSpawn::immediate(ObjectId(1), Vec3::ZERO))
        .expect("fire");
    let (nav, _script) = ScriptedNavAgent::new(Vec3::ZERO);
    let civilian = session.add_civilian(
        CivilianSpawn {
            position: Vec3::ZERO,
            house: Some(ObjectId(1)),
            safe_points: Vec::new(),
        },
        Some(Box::new(nav)),
    );
    session.tick(DT);

    let near = Vec3::new(1.0, 0.0, 0.0);
    let far = Vec3::new(50.0, 0.0, 0.0);
    assert!(!session.player_action(InputAction::Help, InteractTarget::Fire(fire), near));
    assert!(!session.player_action(
        InputAction::Interact,
        InteractTarget::Civilian(civilian),
        near
    ));
    assert!(!session.player_action(InputAction::Interact, InteractTarget::Fire(fire), far));
    assert!(session.fire_registry().is_active(fire));

    assert!(session.player_action(InputAction::Interact, InteractTarget::Fire(fire), near));
    assert!(!session.player_action(InputAction::Interact, InteractTarget::Fire(fire), near));
    assert!(session.fire_registry().all_fires_out());
}

#[test]
fn failing_subscriber_does_not_block_later_subscribers() {
    let mut session = Session::new(MissionConfig::default());
    let seen = Rc::new(RefCell::new(Vec::new()));
    session.subscribe("broken", Box::new(AlwaysFails));
    session.subscribe(
        "log",
        Box::new(EventLog {
            seen: Rc::clone(&seen),
        }),
    );

    let fire = session
        .add_fire(FireSpawn::immediate(ObjectId(1), Vec3::ZERO))
        .expect("fire");
    session.interact(InteractTarget::Fire(fire));

    assert_eq!(
        *seen.borrow(),
        vec![SimEvent::FireStarted(fire), SimEvent::FireExtinguished(fire)]
    );
    assert_eq!(session.mission_state(), MissionState::Complete);
}

#[test]
fn unsubscribed_listener_stops_receiving() {
    let mut session = Session::new(MissionConfig::default());
    let seen = Rc::new(RefCell::new(Vec::new()));
    let subscription = session.subscribe(
        "log",
        Box::new(EventLog {
            seen: Rc::clone(&seen),
        }),
    );
    session.add_fire(FireSpawn::immediate(ObjectId(1), Vec3::ZERO));
    assert!(session.unsubscribe(subscription));
    session.add_fire(FireSpawn::immediate(ObjectId(2), Vec3::ZERO));

    assert_eq!(seen.borrow().len(), 1);
}

#[test]
fn grid_responder_walks_to_fire_and_puts_it_out() {
    let mesh = Rc::new(GridNavMesh::open(20, 20, Vec3::ZERO).expect("grid"));
    let mut session = Session::new(MissionConfig::default()).with_navmesh(mesh.clone());
    let start = Vec3::new(3.5, 0.0, 3.5);
    let responder = session.add_responder(Box::new(GridNavAgent::new(mesh, start, 3.5)));
    session.set_leader(Some(start));
    let fire = session
        .add_fire(FireSpawn::immediate(ObjectId(1), Vec3::new(10.0, 0.0, 10.0)))
        .expect("fire");

    let mut ticks = 0;
    while session.mission_state() != MissionState::Complete && ticks < 60 * 30 {
        session.tick(DT);
        ticks += 1;
    }

    assert!(session.fires().get(fire).expect("fire").is_extinguished());
    assert_eq!(session.mission_state(), MissionState::Complete);
    let position = session.responder(responder).expect("responder").position();
    assert!(position.distance(Vec3::new(10.0, 0.0, 10.0)) <= 2.0);
}

#[test]
fn grid_vehicle_parks_short_of_fire_and_waits() {
    let mesh = Rc::new(GridNavMesh::open(40, 10, Vec3::ZERO).expect("grid"));
    let mut session = Session::new(MissionConfig::default()).with_navmesh(mesh.clone());
    let vehicle = session.add_vehicle(Box::new(GridNavAgent::new(
        mesh,
        Vec3::new(2.5, 0.0, 5.5),
        0.0,
    )));
    let fire = session
        .add_fire(FireSpawn::immediate(ObjectId(1), Vec3::new(30.0, 0.0, 5.5)))
        .expect("fire");

    let mut ticks = 0;
    while !matches!(
        session.vehicle(vehicle).expect("vehicle").state(),
        VehicleState::Waiting { .. }
    ) && ticks < 60 * 20
    {
        session.tick(DT);
        ticks += 1;
    }

    let vehicle = session.vehicle(vehicle).expect("vehicle");
    assert!(matches!(vehicle.state(), VehicleState::Waiting { .. }));
    assert!(vehicle.position().x > 2.5);
    assert!(vehicle.position().distance(Vec3::new(30.0, 0.0, 5.5)) > 8.0);
    assert!(session.fire_registry().is_active(fire));
}

#[test]
fn grid_civilian_reaches_nearest_safe_point() {
    let mesh = Rc::new(GridNavMesh::open(20, 20, Vec3::ZERO).expect("grid"));
    let (session, sink) = recording_session(MissionConfig::default());
    let mut session = session.with_navmesh(mesh.clone());
    let start = Vec3::new(5.5, 0.0, 5.5);
    let civilian = session.add_civilian(
        CivilianSpawn {
            position: start,
            house: Some(ObjectId(7)),
            safe_points: vec![
                Vec3::new(15.5, 0.0, 15.5),
                Vec3::new(1.5, 0.0, 1.5),
                Vec3::new(18.5, 0.0, 2.5),
            ],
        },
        Some(Box::new(GridNavAgent::new(mesh, start, 3.5))),
    );
    session.add_fire(FireSpawn::immediate(ObjectId(7), Vec3::new(5.0, 0.0, 8.0)));

    let mut ticks = 0;
    while session.civilian(civilian).expect("civilian").state() != CivilianState::Calm
        && ticks < 60 * 10
    {
        session.tick(DT);
        ticks += 1;
    }

    let civilian = session.civilian(civilian).expect("civilian");
    assert_eq!(civilian.state(), CivilianState::Calm);
    assert!(civilian.position().distance(Vec3::new(1.5, 0.0, 1.5)) <= 1.5);
    let footsteps = sink
        .borrow()
        .cues
        .iter()
        .filter(|cue| matches!(cue, Cue::Footstep { .. }))
        .count();
    assert!(footsteps >= 3, "footsteps = {footsteps}");
}
