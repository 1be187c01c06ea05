use rescue_engine::SubscriberError;
use tracing::debug;

use super::subscriber::{EventContext, SimSubscriber};
use super::types::SimEvent;
use crate::presentation::Cue;

/// Looping alarm that runs while any fire is burning.
#[derive(Debug, Default)]
pub struct AlarmController {
    playing: bool,
}

impl AlarmController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }
}

impl SimSubscriber for AlarmController {
    fn on_event(
        &mut self,
        event: SimEvent,
        context: &mut EventContext<'_>,
    ) -> Result<(), SubscriberError> {
        match event {
            SimEvent::FireStarted(_) if !self.playing => {
                self.playing = true;
                debug!("alarm_playing");
                context.presentation.cue(Cue::AlarmStart);
            }
            SimEvent::FireExtinguished(_) if self.playing && context.fires.all_fires_out() => {
                self.playing = false;
                debug!("alarm_stopped");
                context.presentation.cue(Cue::AlarmStop);
            }
            _ => {}
        }
        Ok(())
    }
}
