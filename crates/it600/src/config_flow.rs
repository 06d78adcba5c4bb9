//! Interactive setup of gateway config entries.
//!
//! Two entry points: the `user` step (manual host/port/EUID entry) and the
//! `zeroconf` step (an advertised gateway), which is followed by a
//! `zeroconf_confirm` step where the user supplies the EUID.

use std::collections::BTreeMap;
use std::collections::HashSet;

use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::client::default_port;
use crate::client::GatewayClient;
use crate::client::GatewayConnector;
use crate::client::GatewayEntry;
use crate::error::GatewayError;

/// Gateways advertise themselves as `Gateway_<serial number>`.
pub const ZEROCONF_NAME_PREFIX: &str = "Gateway_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FlowStep {
    User,
    ZeroconfConfirm,
}

/// What the host should do after a flow step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowResult {
    ShowForm {
        step_id: FlowStep,
        /// Field name (or `base`) -> error key
        errors: BTreeMap<String, String>,
        description_placeholders: BTreeMap<String, String>,
    },
    CreateEntry {
        title: String,
        data: GatewayEntry,
    },
    Abort {
        reason: String,
    },
}

impl FlowResult {
    fn abort(reason: &str) -> Self {
        FlowResult::Abort {
            reason: reason.to_string(),
        }
    }
}

/// Fields of the manual setup form.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserInput {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub euid: String,
}

/// A zeroconf service advertisement.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ZeroconfInfo {
    pub name: Option<String>,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
struct Discovered {
    host: String,
    port: u16,
    serial_number: String,
}

/// Extract the gateway serial number from an advertised service name.
pub fn serial_from_service_name(name: &str) -> Option<&str> {
    name.strip_prefix(ZEROCONF_NAME_PREFIX)
        .filter(|serial| !serial.is_empty())
}

pub struct ConfigFlow<'a, K: GatewayConnector> {
    connector: &'a K,
    /// Unique ids (serial numbers) of entries that already exist
    configured: HashSet<String>,
    discovered: Option<Discovered>,
}

impl<'a, K: GatewayConnector> ConfigFlow<'a, K> {
    pub fn new(connector: &'a K, configured: HashSet<String>) -> Self {
        Self {
            connector,
            configured,
            discovered: None,
        }
    }

    /// Manual setup. `None` shows the empty form.
    pub async fn step_user(&mut self, input: Option<UserInput>) -> FlowResult {
        let Some(input) = input else {
            return Self::setup_form(BTreeMap::new());
        };

        let mut entry = GatewayEntry {
            host: input.host,
            port: input.port,
            euid: input.euid,
            serial_number: None,
        };

        let serial = match self.probe(&entry).await {
            Ok(serial) => serial,
            Err(e) => {
                let mut errors = BTreeMap::new();
                errors.insert("base".to_string(), e.reason().to_string());
                return Self::setup_form(errors);
            }
        };

        if self.configured.contains(&serial) {
            return FlowResult::abort("already_configured");
        }

        info!("Creating config entry for gateway {}", serial);
        entry.serial_number = Some(serial.clone());
        FlowResult::CreateEntry {
            title: serial,
            data: entry,
        }
    }

    /// A gateway was advertised on the local network.
    pub async fn step_zeroconf(&mut self, info: Option<ZeroconfInfo>) -> FlowResult {
        let Some(info) = info else {
            return FlowResult::abort("connection_error");
        };

        let Some(serial) = info.name.as_deref().and_then(serial_from_service_name) else {
            debug!("Ignoring zeroconf advertisement {:?}", info.name);
            return FlowResult::abort("not_gateway");
        };

        if self.configured.contains(serial) {
            return FlowResult::abort("already_configured");
        }

        info!("Discovered gateway {} at {}:{}", serial, info.host, info.port);
        self.discovered = Some(Discovered {
            host: info.host,
            port: info.port,
            serial_number: serial.to_string(),
        });

        self.confirm_form(BTreeMap::new())
    }

    /// The user confirmed a discovered gateway and entered its EUID.
    pub async fn step_zeroconf_confirm(&mut self, euid: Option<String>) -> FlowResult {
        let Some(discovered) = self.discovered.clone() else {
            return FlowResult::abort("connection_error");
        };

        let Some(euid) = euid.filter(|e| !e.trim().is_empty()) else {
            return self.confirm_form(BTreeMap::new());
        };

        let entry = GatewayEntry {
            host: discovered.host,
            port: discovered.port,
            euid,
            serial_number: Some(discovered.serial_number.clone()),
        };

        let serial = match self.probe(&entry).await {
            Ok(serial) => serial,
            Err(e) => return FlowResult::abort(e.reason()),
        };

        if self.configured.contains(&serial) {
            return FlowResult::abort("already_configured");
        }

        info!("Creating config entry for discovered gateway {}", serial);
        FlowResult::CreateEntry {
            title: discovered.serial_number,
            data: entry,
        }
    }

    /// Connect once to learn the gateway's serial number.
    async fn probe(&self, entry: &GatewayEntry) -> Result<String, GatewayError> {
        let client = self.connector.client(entry);
        let result = client.connect().await;
        if let Err(e) = client.close().await {
            warn!("Failed to close probe connection to {}: {}", entry.host, e);
        }
        result
    }

    fn setup_form(errors: BTreeMap<String, String>) -> FlowResult {
        FlowResult::ShowForm {
            step_id: FlowStep::User,
            errors,
            description_placeholders: BTreeMap::new(),
        }
    }

    fn confirm_form(&self, errors: BTreeMap<String, String>) -> FlowResult {
        let mut placeholders = BTreeMap::new();
        if let Some(discovered) = &self.discovered {
            placeholders.insert(
                "serial_number".to_string(),
                discovered.serial_number.clone(),
            );
        }
        FlowResult::ShowForm {
            step_id: FlowStep::ZeroconfConfirm,
            errors,
            description_placeholders: placeholders,
        }
    }
}
