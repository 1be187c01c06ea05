use std::cell::RefCell;
use std::rc::Rc;

use rescue_engine::SubscriberError;
use tracing::info;

use super::subscriber::{EventContext, SimSubscriber};
use super::types::SimEvent;
use crate::presentation::{Cue, HudSlot, PresentationSink};

pub const FIRE_ALERT_TEXT: &str = "There is a fire in the area!";
pub const FIRES_DONE_TEXT: &str = "All fires have been extinguished";
pub const INJURED_DONE_TEXT: &str = "All injured civilians have been helped!";
pub const MISSION_COMPLETE_TEXT: &str = "Mission Complete!";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MissionState {
    #[default]
    NotStarted,
    InProgress,
    Complete,
}

impl MissionState {
    pub fn as_token(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Complete => "complete",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MissionSnapshot {
    pub state: MissionState,
    pub elapsed_seconds: Option<f64>,
}

/// Tracks mission start/completion from registry events and drives the mission HUD.
///
/// Elapsed time is measured on the unscaled clock so the pause on completion
/// does not freeze the measurement before it is taken.
#[derive(Debug, Default)]
pub struct MissionCoordinator {
    state: MissionState,
    started_at_unscaled: f64,
    completed_elapsed: Option<f64>,
    last_timer_text: Option<String>,
}

impl MissionCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MissionState {
        self.state
    }

    pub fn elapsed_seconds(&self, now_unscaled: f64) -> Option<f64> {
        match self.state {
            MissionState::NotStarted => None,
            MissionState::InProgress => Some((now_unscaled - self.started_at_unscaled).max(0.0)),
            MissionState::Complete => self.completed_elapsed,
        }
    }

    pub fn snapshot(&self, now_unscaled: f64) -> MissionSnapshot {
        MissionSnapshot {
            state: self.state,
            elapsed_seconds: self.elapsed_seconds(now_unscaled),
        }
    }

    /// Refreshes the running `mm:ss` timer, only emitting when the text changes.
    pub fn update_timer(&mut self, now_unscaled: f64, presentation: &mut dyn PresentationSink) {
        if self.state != MissionState::InProgress {
            return;
        }
        let text = format_timer(now_unscaled - self.started_at_unscaled);
        if self.last_timer_text.as_deref() == Some(text.as_str()) {
            return;
        }
        presentation.cue(Cue::hud(HudSlot::Timer, text.clone()));
        self.last_timer_text = Some(text);
    }

    pub fn handle(&mut self, event: SimEvent, context: &mut EventContext<'_>) {
        if self.state == MissionState::Complete {
            return;
        }
        match event {
            SimEvent::FireStarted(fire) => {
                if self.state == MissionState::NotStarted {
                    self.state = MissionState::InProgress;
                    self.started_at_unscaled = context.now_unscaled;
                    info!(fire_id = fire.0, "mission_started");
                }
                context.presentation.cue(Cue::hud(HudSlot::Alert, FIRE_ALERT_TEXT));
                context.presentation.cue(Cue::hud(HudSlot::Fires, ""));
                context.presentation.cue(Cue::AlertFlashStart);
                self.try_complete(context);
            }
            SimEvent::FireExtinguished(_) => {
                if context.fires.all_fires_out() {
                    context.presentation.cue(Cue::hud(HudSlot::Fires, FIRES_DONE_TEXT));
                    context.presentation.cue(Cue::hud(HudSlot::Alert, ""));
                    context.presentation.cue(Cue::hud(HudSlot::Timer, ""));
                    context.presentation.cue(Cue::AlertFlashStop);
                    self.last_timer_text = None;
                }
                self.try_complete(context);
            }
            SimEvent::InjuredHelped(_) => {
                if context.injured.all_helped() {
                    context.presentation.cue(Cue::hud(HudSlot::Injured, INJURED_DONE_TEXT));
                }
                self.try_complete(context);
            }
            SimEvent::InjuredSpawned(_) => {}
        }
    }

    fn try_complete(&mut self, context: &mut EventContext<'_>) {
        if self.state != MissionState::InProgress {
            return;
        }
        let fires_done = context.fires.all_fires_out();
        let injured_done = context.injured.total() == 0 || context.injured.all_helped();
        if !(fires_done && injured_done) {
            return;
        }
        let elapsed_seconds = (context.now_unscaled - self.started_at_unscaled).max(0.0);
        self.state = MissionState::Complete;
        self.completed_elapsed = Some(elapsed_seconds);
        info!(
            elapsed_seconds,
            helped = context.injured.helped(),
            fires_put_out = context.fires.extinguished_total(),
            "mission_complete"
        );
        context.presentation.cue(Cue::hud(HudSlot::Banner, MISSION_COMPLETE_TEXT));
        context
            .presentation
            .cue(Cue::MissionComplete { elapsed_seconds });
        context.request_pause();
    }
}

fn format_timer(seconds: f64) -> String {
    let whole = seconds.max(0.0).floor() as u64;
    format!("{:02}:{:02}", whole / 60, whole % 60)
}

/// Shared handle so the session, HUD and subscribers all read one coordinator.
#[derive(Debug, Clone, Default)]
pub struct MissionHandle {
    inner: Rc<RefCell<MissionCoordinator>>,
}

impl MissionHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MissionState {
        self.inner.borrow().state()
    }

    pub fn snapshot(&self, now_unscaled: f64) -> MissionSnapshot {
        self.inner.borrow().snapshot(now_unscaled)
    }

    pub fn update_timer(&self, now_unscaled: f64, presentation: &mut dyn PresentationSink) {
        if let Ok(mut coordinator) = self.inner.try_borrow_mut() {
            coordinator.update_timer(now_unscaled, presentation);
        }
    }
}

impl SimSubscriber for MissionHandle {
    fn on_event(
        &mut self,
        event: SimEvent,
        context: &mut EventContext<'_>,
    ) -> Result<(), SubscriberError> {
        let mut coordinator = self
            .inner
            .try_borrow_mut()
            .map_err(|_| SubscriberError::Reentrant)?;
        coordinator.handle(event, context);
        Ok(())
    }
}
