//! Output-only presentation seam: audio, HUD text, alert flash and animator cues.
//!
//! Nothing here feeds back into the simulation.

use tracing::{debug, info, trace};

use crate::app::gameplay::{CivilianId, FireId, ResponderId, VehicleId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ActorRef {
    Civilian(CivilianId),
    Responder(ResponderId),
    Vehicle(VehicleId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HudSlot {
    Alert,
    Fires,
    Injured,
    Timer,
    Banner,
}

impl HudSlot {
    pub fn as_token(self) -> &'static str {
        match self {
            Self::Alert => "alert",
            Self::Fires => "fires",
            Self::Injured => "injured",
            Self::Timer => "timer",
            Self::Banner => "banner",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimatorCue {
    IsInjured(bool),
    IsPanicking(bool),
    Helped,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cue {
    AlarmStart,
    AlarmStop,
    AlertFlashStart,
    AlertFlashStop,
    Hud { slot: HudSlot, text: String },
    MissionComplete { elapsed_seconds: f64 },
    FireEmission { fire: FireId, emitting: bool },
    Animator { actor: ActorRef, cue: AnimatorCue },
    Footstep { actor: ActorRef },
    Landed { actor: ActorRef },
}

impl Cue {
    pub fn hud(slot: HudSlot, text: impl Into<String>) -> Self {
        Self::Hud {
            slot,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Locomotion {
    pub speed: f32,
    /// Speed relative to the agent's configured top speed, clamped to `0..=1`.
    pub motion_speed: f32,
    /// Nav agents stay on the surface, so this is only false for hosts that add airtime.
    pub grounded: bool,
}

impl Locomotion {
    pub fn from_speeds(speed: f32, top_speed: f32) -> Self {
        let motion_speed = if top_speed > 0.01 {
            (speed / top_speed).clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            speed,
            motion_speed,
            grounded: true,
        }
    }
}

pub const FOOTSTEP_STRIDE_METERS: f32 = 0.75;

/// Turns per-tick locomotion into footstep and landing triggers for one walking actor.
#[derive(Debug, Clone, Copy)]
pub struct GaitTracker {
    travelled: f32,
    grounded: bool,
}

impl Default for GaitTracker {
    fn default() -> Self {
        Self {
            travelled: 0.0,
            grounded: true,
        }
    }
}

impl GaitTracker {
    pub fn advance(
        &mut self,
        actor: ActorRef,
        locomotion: Locomotion,
        dt_seconds: f32,
        sink: &mut dyn PresentationSink,
    ) {
        let landed = locomotion.grounded && !self.grounded;
        self.grounded = locomotion.grounded;
        if landed {
            self.travelled = 0.0;
            sink.cue(Cue::Landed { actor });
        }
        if !self.grounded {
            return;
        }
        self.travelled += locomotion.speed.max(0.0) * dt_seconds.max(0.0);
        while self.travelled >= FOOTSTEP_STRIDE_METERS {
            self.travelled -= FOOTSTEP_STRIDE_METERS;
            sink.cue(Cue::Footstep { actor });
        }
    }
}

pub trait PresentationSink {
    fn cue(&mut self, cue: Cue);

    fn locomotion(&mut self, _actor: ActorRef, _locomotion: Locomotion) {}
}

#[derive(Debug, Default)]
pub struct NullPresentation;

impl PresentationSink for NullPresentation {
    fn cue(&mut self, _cue: Cue) {}
}

/// Logs cues for the headless binary.
#[derive(Debug, Default)]
pub struct TracingPresentation;

impl PresentationSink for TracingPresentation {
    fn cue(&mut self, cue: Cue) {
        match cue {
            Cue::AlarmStart => info!("alarm_start"),
            Cue::AlarmStop => info!("alarm_stop"),
            Cue::AlertFlashStart => debug!("alert_flash_start"),
            Cue::AlertFlashStop => debug!("alert_flash_stop"),
            Cue::Hud { slot, text } => info!(slot = slot.as_token(), text = %text, "hud_text"),
            Cue::MissionComplete { elapsed_seconds } => {
                info!(elapsed_seconds, "mission_complete_banner")
            }
            Cue::FireEmission { fire, emitting } => {
                debug!(fire_id = fire.0, emitting, "fire_emission")
            }
            Cue::Animator { actor, cue } => debug!(actor = ?actor, cue = ?cue, "animator_cue"),
            Cue::Footstep { actor } => trace!(actor = ?actor, "footstep"),
            Cue::Landed { actor } => debug!(actor = ?actor, "landed"),
        }
    }
}

/// Keeps every cue it receives; tests read them back.
#[derive(Debug, Default)]
pub struct RecordingPresentation {
    pub cues: Vec<Cue>,
    pub locomotion: Vec<(ActorRef, Locomotion)>,
}

impl RecordingPresentation {
    pub fn hud_texts(&self, slot: HudSlot) -> Vec<&str> {
        self.cues
            .iter()
            .filter_map(|cue| match cue {
                Cue::Hud { slot: seen, text } if *seen == slot => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, expected: &Cue) -> usize {
        self.cues.iter().filter(|cue| *cue == expected).count()
    }
}

impl PresentationSink for RecordingPresentation {
    fn cue(&mut self, cue: Cue) {
        self.cues.push(cue);
    }

    fn locomotion(&mut self, actor: ActorRef, locomotion: Locomotion) {
        self.locomotion.push((actor, locomotion));
    }
}

/// A sink the session can own while a test keeps reading it.
impl<T: PresentationSink + ?Sized> PresentationSink for std::rc::Rc<std::cell::RefCell<T>> {
    fn cue(&mut self, cue: Cue) {
        self.borrow_mut().cue(cue);
    }

    fn locomotion(&mut self, actor: ActorRef, locomotion: Locomotion) {
        self.borrow_mut().locomotion(actor, locomotion);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn motion_speed_is_relative_and_clamped() {
        let half = Locomotion::from_speeds(2.0, 4.0);
        assert!((half.motion_speed - 0.5).abs() < 1e-6);
        assert!(half.grounded);
        assert_eq!(Locomotion::from_speeds(9.0, 4.0).motion_speed, 1.0);
        assert_eq!(Locomotion::from_speeds(1.0, 0.0).motion_speed, 0.0);
    }

    #[test]
    fn recording_sink_filters_hud_by_slot() {
        let mut sink = RecordingPresentation::default();
        sink.cue(Cue::hud(HudSlot::Alert, "There is a fire in the area!"));
        sink.cue(Cue::AlarmStart);
        sink.cue(Cue::hud(HudSlot::Fires, ""));

        assert_eq!(sink.hud_texts(HudSlot::Alert), vec!["There is a fire in the area!"]);
        assert_eq!(sink.count(&Cue::AlarmStart), 1);
    }

    #[test]
    fn gait_emits_one_footstep_per_stride_while_grounded() {
        let actor = ActorRef::Civilian(CivilianId(1));
        let mut gait = GaitTracker::default();
        let mut sink = RecordingPresentation::default();
        let walking = Locomotion::from_speeds(2.0, 4.0);

        for _ in 0..10 {
            gait.advance(actor, walking, 0.1, &mut sink);
        }
        assert_eq!(sink.count(&Cue::Footstep { actor }), 2);

        gait.advance(actor, Locomotion::from_speeds(0.0, 3.0), 1.0, &mut sink);
        assert_eq!(sink.count(&Cue::Footstep { actor }), 2);
    }

    #[test]
    fn gait_lands_once_after_airtime() {
        let actor = ActorRef::Responder(ResponderId(1));
        let mut gait = GaitTracker::default();
        let mut sink = RecordingPresentation::default();
        let airborne = Locomotion {
            grounded: false,
            ..Locomotion::from_speeds(4.0, 4.0)
        };

        gait.advance(actor, airborne, 1.0, &mut sink);
        assert!(sink.cues.is_empty());
        gait.advance(actor, Locomotion::from_speeds(0.0, 4.0), 0.1, &mut sink);
        gait.advance(actor, Locomotion::from_speeds(0.0, 4.0), 0.1, &mut sink);

        assert_eq!(sink.cues, vec![Cue::Landed { actor }]);
    }
}
