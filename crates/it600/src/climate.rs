//! Climate entity data model.
//!
//! `DeviceSnapshot` is the cached view of one thermostat. `ClimateState` is what
//! the engine sees when the entity writes its state.

use serde::Deserialize;
use serde::Serialize;

/// Setpoint granularity supported by iT600 thermostats.
pub const TARGET_TEMPERATURE_STEP: f64 = 0.5;

/// The gateway reports all temperatures in Celsius.
pub const TEMPERATURE_UNIT: &str = "°C";

/// HVAC modes offered to the user, in display order.
pub const HVAC_MODES: [HvacMode; 2] = [HvacMode::Heat, HvacMode::Off];

/// Operating mode of a thermostat.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum HvacMode {
    Heat,
    Off,
}

impl HvacMode {
    /// Map a vendor mode string to an HVAC mode. Unknown modes map to `None`.
    pub fn from_vendor(mode: &str) -> Option<Self> {
        mode.parse().ok()
    }

    /// The mode string the vendor client expects.
    pub fn vendor_mode(&self) -> &str {
        self.as_ref()
    }

    fn icon(self) -> Option<&'static str> {
        match self {
            HvacMode::Heat => Some("mdi:white-balance-sunny"),
            HvacMode::Off => None,
        }
    }
}

/// Connectivity as last observed from the gateway client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    /// No connectivity signal seen yet.
    #[default]
    Unknown,
    Connected,
    Disconnected,
}

impl Connectivity {
    /// Unknown counts as available so entities don't flicker during startup.
    pub fn is_available(self) -> bool {
        !matches!(self, Connectivity::Disconnected)
    }
}

/// Cached state of a single thermostat.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeviceSnapshot {
    pub device_id: String,
    pub name: Option<String>,
    pub current_temperature: Option<f64>,
    pub min_temperature: Option<f64>,
    pub max_temperature: Option<f64>,
    pub target_temperature: Option<f64>,
    pub rssi: Option<f64>,
    pub power: bool,
    pub hvac_mode: Option<HvacMode>,
    pub connectivity: Connectivity,
}

impl DeviceSnapshot {
    pub fn new(device_id: impl Into<String>, name: Option<String>) -> Self {
        Self {
            device_id: device_id.into(),
            name,
            ..Self::default()
        }
    }

    /// Mode as presented to the user: OFF whenever the unit is powered down.
    pub fn observed_hvac_mode(&self) -> Option<HvacMode> {
        if self.power {
            self.hvac_mode
        } else {
            Some(HvacMode::Off)
        }
    }

    pub fn icon(&self) -> Option<&'static str> {
        if !self.power {
            return None;
        }
        self.hvac_mode.and_then(HvacMode::icon)
    }

    pub fn to_state(&self) -> ClimateState {
        ClimateState {
            name: self.name.clone(),
            unique_id: self.device_id.clone(),
            available: self.connectivity.is_available(),
            hvac_mode: self.observed_hvac_mode(),
            hvac_modes: HVAC_MODES.to_vec(),
            current_temperature: self.current_temperature,
            target_temperature: self.target_temperature,
            target_temperature_step: TARGET_TEMPERATURE_STEP,
            min_temp: self.min_temperature,
            max_temp: self.max_temperature,
            temperature_unit: TEMPERATURE_UNIT.to_string(),
            icon: self.icon().map(String::from),
            rssi: self.rssi,
            should_poll: false,
        }
    }
}

/// Host-visible state of a climate entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClimateState {
    pub name: Option<String>,
    pub unique_id: String,
    pub available: bool,
    pub hvac_mode: Option<HvacMode>,
    pub hvac_modes: Vec<HvacMode>,
    pub current_temperature: Option<f64>,
    pub target_temperature: Option<f64>,
    pub target_temperature_step: f64,
    pub min_temp: Option<f64>,
    pub max_temp: Option<f64>,
    pub temperature_unit: String,
    pub icon: Option<String>,
    pub rssi: Option<f64>,
    /// Entities are push-updated by the gateway client.
    pub should_poll: bool,
}
