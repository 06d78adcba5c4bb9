use crate::climate::ClimateState;

/// State-change events broadcast to engine subscribers.
///
/// Distinct from `FromIntegrationMessage` (transport-level). The engine converts
/// `FromIntegrationMessage` into `Event` at the boundary.
#[derive(Debug, Clone)]
pub enum Event {
    ClimateStateChanged {
        entity_id: String,
        state: ClimateState,
    },
    EntityRemoved {
        entity_id: String,
    },
}
