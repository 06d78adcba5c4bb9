use std::collections::HashMap;

use serde::Serialize;

use crate::climate::ClimateState;

/// Centralized snapshot of the entire engine state.
#[derive(Debug, Clone, Default, Serialize)]
pub struct State {
    pub climates: HashMap<String, ClimateState>,
}
