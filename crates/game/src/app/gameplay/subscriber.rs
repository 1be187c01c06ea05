use rescue_engine::SubscriberError;

use super::fire_registry::FireRegistry;
use super::injured_registry::InjuredRegistry;
use super::types::SimEvent;
use crate::presentation::PresentationSink;

/// Read access to the registries plus the presentation sink, handed to every subscriber.
pub struct EventContext<'a> {
    pub fires: &'a FireRegistry,
    pub injured: &'a InjuredRegistry,
    pub now_unscaled: f64,
    pub presentation: &'a mut dyn PresentationSink,
    pause_requested: bool,
}

impl<'a> EventContext<'a> {
    pub fn new(
        fires: &'a FireRegistry,
        injured: &'a InjuredRegistry,
        now_unscaled: f64,
        presentation: &'a mut dyn PresentationSink,
    ) -> Self {
        Self {
            fires,
            injured,
            now_unscaled,
            presentation,
            pause_requested: false,
        }
    }

    /// Asks the session to stop scaled time once delivery finishes.
    pub fn request_pause(&mut self) {
        self.pause_requested = true;
    }

    pub fn pause_requested(&self) -> bool {
        self.pause_requested
    }
}

pub trait SimSubscriber {
    fn on_event(&mut self, event: SimEvent, context: &mut EventContext<'_>)
        -> Result<(), SubscriberError>;
}
