//! Type-safe message system for the engine
//!
//! Messages are split by direction to enforce correct usage at compile time:
//! - `FromIntegrationMessage`: Events from integrations to the engine
//! - `ToIntegrationMessage`: Commands from the engine to integrations

use crate::climate::ClimateState;
use crate::climate::HvacMode;

/// Messages FROM integrations TO the engine (events/state updates)
#[derive(Debug, Clone)]
pub enum FromIntegrationMessage {
    /// An entity was discovered and registered
    EntityDiscovered {
        entity_id: String,
        integration_name: String,
    },

    /// An entity was removed (config entry unloaded, etc.)
    EntityRemoved { entity_id: String },

    /// A climate entity asked for its state to be written
    ClimateStateChanged {
        entity_id: String,
        state: ClimateState,
    },
}

/// A user command for a climate entity
#[derive(Debug, Clone, PartialEq)]
pub enum ClimateCommand {
    /// Change the setpoint, optionally switching mode first
    SetTemperature {
        temperature: f64,
        hvac_mode: Option<HvacMode>,
    },

    SetHvacMode(HvacMode),
}

/// Messages FROM the engine TO integrations (commands)
#[derive(Debug, Clone, PartialEq)]
pub enum ToIntegrationMessage {
    ClimateCommand {
        entity_id: String,
        command: ClimateCommand,
    },
}
