use super::fire_registry::FireRegistry;
use super::injured_registry::InjuredRegistry;

/// Registries an interaction may report to. Either may be absent, in which case
/// the entity still changes state but nobody is told.
#[derive(Default)]
pub struct InteractContext<'a> {
    pub fires: Option<&'a mut FireRegistry>,
    pub injured: Option<&'a mut InjuredRegistry>,
}

pub trait Interactable {
    /// Returns `true` when the interaction changed the entity.
    fn interact(&mut self, context: &mut InteractContext<'_>) -> bool;
}
