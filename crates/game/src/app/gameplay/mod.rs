mod alarm;
mod civilian;
mod fire;
mod fire_registry;
mod injured_registry;
mod interaction;
mod mission;
mod responder;
mod session;
mod subscriber;
mod types;
mod vehicle;

#[cfg(test)]
pub(crate) mod test_support;

pub use alarm::AlarmController;
pub use civilian::{Civilian, CivilianState};
pub use fire::{FireEntity, FireSet, FireState, SpreadTarget};
pub use fire_registry::FireRegistry;
pub use injured_registry::InjuredRegistry;
pub use interaction::{InteractContext, Interactable};
pub use mission::{
    MissionCoordinator, MissionHandle, MissionSnapshot, MissionState, FIRES_DONE_TEXT,
    FIRE_ALERT_TEXT, INJURED_DONE_TEXT, MISSION_COMPLETE_TEXT,
};
pub use responder::{ResponderAgent, ResponderState, ResponderWorld};
pub use session::{
    CivilianSpawn, FireSpawn, FireStart, Session, SimSystemId, SIM_SYSTEM_ORDER_TEXT,
};
pub use subscriber::{EventContext, SimSubscriber};
pub use types::{CivilianId, FireId, InputAction, InteractTarget, ResponderId, SimEvent, VehicleId};
pub use vehicle::{VehicleAgent, VehicleState, VehicleWorld};
