//! Per-thermostat state mirror.
//!
//! A `DeviceStateMirror` keeps one `DeviceSnapshot` in step with the gateway
//! client, forwards user commands to it, and writes the resulting state to the
//! engine. Push updates from the client arrive over an mpsc channel and are
//! drained by a task spawned in `attach()`.

use std::sync::Arc;
use std::sync::Weak;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::backoff::ReconnectBackoff;
use crate::climate::ClimateState;
use crate::climate::Connectivity;
use crate::climate::DeviceSnapshot;
use crate::climate::HvacMode;
use crate::client::DeviceEntry;
use crate::client::GatewayClient;
use crate::client::UpdateReceiver;
use crate::engine::FromIntegrationMessage;
use crate::engine::FromIntegrationSender;
use crate::error::ClimateError;
use crate::error::GatewayError;

pub struct DeviceStateMirror<C: GatewayClient> {
    entity_id: String,
    device_id: String,
    client: Arc<C>,

    /// Held across every "read gateway → write snapshot" sequence
    snapshot: Mutex<DeviceSnapshot>,

    to_engine: FromIntegrationSender,
    backoff: std::sync::Mutex<ReconnectBackoff>,

    /// Pending reconnect timers; aborted on detach
    reconnect_tasks: std::sync::Mutex<Vec<JoinHandle<()>>>,

    /// Task draining push updates from the client
    listener_task: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl<C: GatewayClient + 'static> DeviceStateMirror<C> {
    pub fn new(
        entity_id: String,
        device: &DeviceEntry,
        client: Arc<C>,
        to_engine: FromIntegrationSender,
    ) -> Self {
        Self {
            entity_id,
            device_id: device.id.clone(),
            client,
            snapshot: Mutex::new(DeviceSnapshot::new(device.id.clone(), device.name.clone())),
            to_engine,
            backoff: std::sync::Mutex::new(ReconnectBackoff::new()),
            reconnect_tasks: std::sync::Mutex::new(Vec::new()),
            listener_task: std::sync::Mutex::new(None),
        }
    }

    /// Replace the reconnect delay source.
    pub fn with_backoff(mut self, backoff: ReconnectBackoff) -> Self {
        self.backoff = std::sync::Mutex::new(backoff);
        self
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub async fn snapshot(&self) -> DeviceSnapshot {
        self.snapshot.lock().await.clone()
    }

    pub async fn state(&self) -> ClimateState {
        self.snapshot.lock().await.to_state()
    }

    pub async fn available(&self) -> bool {
        self.snapshot.lock().await.connectivity.is_available()
    }

    /// Whether a reconnect timer is still waiting to fire.
    pub fn reconnect_pending(&self) -> bool {
        self.reconnect_tasks
            .lock()
            .map(|tasks| tasks.iter().any(|t| !t.is_finished()))
            .unwrap_or(false)
    }

    /// Register for push updates and open the gateway connection.
    ///
    /// A failed connect is logged, not returned: connectivity stays unknown
    /// until the client reports a change.
    pub async fn attach(self: &Arc<Self>) {
        debug!(
            "Added climate device {} with state: {:?}",
            self.entity_id,
            self.snapshot().await
        );

        let (tx, rx) = mpsc::unbounded_channel();
        self.client.add_update_callback(tx);

        let task = tokio::spawn(Self::listen(Arc::downgrade(self), rx));
        if let Ok(mut slot) = self.listener_task.lock() {
            if let Some(old) = slot.replace(task) {
                old.abort();
            }
        }

        if let Err(e) = self.client.connect().await {
            error!("Exception connecting to gateway for {}: {}", self.entity_id, e);
        }
    }

    async fn listen(mirror: Weak<Self>, mut rx: UpdateReceiver) {
        while let Some(update) = rx.recv().await {
            let Some(mirror) = mirror.upgrade() else {
                break;
            };
            mirror.on_vendor_update(update.device_id.as_deref()).await;
        }
    }

    /// Stop listening, drop pending reconnects and close the gateway connection.
    ///
    /// Safe to call more than once, and without a prior successful connect.
    pub async fn detach(&self) {
        if let Ok(mut slot) = self.listener_task.lock() {
            if let Some(task) = slot.take() {
                task.abort();
            }
        }
        if let Ok(mut tasks) = self.reconnect_tasks.lock() {
            for task in tasks.drain(..) {
                task.abort();
            }
        }
        if let Err(e) = self.client.close().await {
            warn!("Failed to close gateway connection for {}: {}", self.entity_id, e);
        }
    }

    /// Set a new target temperature.
    ///
    /// The cached target is updated right after the command is issued, whether
    /// or not the gateway accepted it, since confirmations are slow to arrive.
    pub async fn set_temperature(&self, temperature: f64) -> Result<(), ClimateError> {
        if !temperature.is_finite() {
            return Err(ClimateError::NonFiniteTemperature(temperature));
        }

        debug!("Setting {} to {} degrees", self.device_id, temperature);
        let result = self
            .client
            .set_temperature(&self.device_id, temperature)
            .await;
        self.log_command_result("set temperature", result);

        self.snapshot.lock().await.target_temperature = Some(temperature);
        self.write_state().await;
        Ok(())
    }

    /// Set the target temperature, switching HVAC mode first if one is given.
    pub async fn set_temperature_with_mode(
        &self,
        temperature: f64,
        hvac_mode: Option<HvacMode>,
    ) -> Result<(), ClimateError> {
        if !temperature.is_finite() {
            return Err(ClimateError::NonFiniteTemperature(temperature));
        }
        if let Some(mode) = hvac_mode {
            self.set_mode(mode).await;
        }
        self.set_temperature(temperature).await
    }

    /// Change the operating mode.
    ///
    /// Commands go out in a fixed order: power, mode, then the cached setpoint
    /// again because the thermostat drops its setpoint on a mode change.
    pub async fn set_mode(&self, mode: HvacMode) {
        debug!("Setting {} to {} mode", self.device_id, mode);

        if mode == HvacMode::Off {
            self.snapshot.lock().await.power = false;
            let result = self.client.set_power_off(&self.device_id).await;
            self.log_command_result("power off", result);
            self.write_state().await;
            return;
        }

        if !self.client.power(&self.device_id) {
            self.snapshot.lock().await.power = true;
            let result = self.client.set_power_on(&self.device_id).await;
            self.log_command_result("power on", result);
        }

        let result = self
            .client
            .set_mode(&self.device_id, mode.vendor_mode())
            .await;
        self.log_command_result("set mode", result);

        let target = self.snapshot.lock().await.target_temperature;
        if let Some(target) = target {
            let result = self.client.set_temperature(&self.device_id, target).await;
            self.log_command_result("set temperature", result);
        }

        self.snapshot.lock().await.hvac_mode = Some(mode);
        self.write_state().await;
    }

    /// Copy every observable field from the gateway client into the snapshot.
    pub async fn refresh(&self) {
        let mut snapshot = self.snapshot.lock().await;

        let connected = self.client.is_connected();
        self.observe_connectivity(&mut snapshot, connected);

        let id = self.device_id.as_str();
        snapshot.current_temperature = self.client.temperature(id);
        snapshot.min_temperature = self.client.min_setpoint(id);
        snapshot.max_temperature = self.client.max_setpoint(id);
        snapshot.target_temperature = self.client.setpoint(id);
        snapshot.rssi = self.client.rssi(id);
        snapshot.power = self.client.power(id);
        snapshot.hvac_mode = self
            .client
            .mode(id)
            .as_deref()
            .and_then(HvacMode::from_vendor);
    }

    /// Handle a push notification from the gateway client.
    pub async fn on_vendor_update(&self, device_id: Option<&str>) {
        {
            let mut snapshot = self.snapshot.lock().await;
            let connected = self.client.is_connected();
            self.observe_connectivity(&mut snapshot, connected);
        }

        let for_us = match device_id {
            None => true,
            Some(id) => id == self.device_id,
        };
        if for_us {
            debug!("Gateway sent a status update for device {:?}", device_id);
            self.refresh().await;
            self.write_state().await;
        }
    }

    /// Send the current state to the engine.
    pub async fn write_state(&self) {
        let state = self.state().await;
        let msg = FromIntegrationMessage::ClimateStateChanged {
            entity_id: self.entity_id.clone(),
            state,
        };
        if let Err(e) = self.to_engine.send(msg).await {
            warn!("Failed to send ClimateStateChanged message: {}", e);
        }
    }

    fn observe_connectivity(&self, snapshot: &mut DeviceSnapshot, connected: bool) {
        match (snapshot.connectivity, connected) {
            (Connectivity::Connected, false) => {
                snapshot.connectivity = Connectivity::Disconnected;
                self.schedule_reconnect();
            }
            (Connectivity::Unknown, false) => {
                snapshot.connectivity = Connectivity::Disconnected;
            }
            (Connectivity::Disconnected, true) => {
                snapshot.connectivity = Connectivity::Connected;
                info!("Connection to gateway was restored for {}", self.entity_id);
            }
            (Connectivity::Unknown, true) => {
                snapshot.connectivity = Connectivity::Connected;
            }
            (Connectivity::Connected, true) | (Connectivity::Disconnected, false) => {}
        }
    }

    fn schedule_reconnect(&self) {
        let minutes = match self.backoff.lock() {
            Ok(mut backoff) => backoff.next_minutes(),
            Err(_) => 1,
        };
        error!(
            "Connection to gateway was lost for {}. Reconnecting in {} minutes",
            self.entity_id, minutes
        );

        let client = Arc::clone(&self.client);
        let entity_id = self.entity_id.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(minutes * 60)).await;
            match client.connect().await {
                Ok(_) => info!("Reconnected to gateway for {}", entity_id),
                Err(e) => warn!("Reconnect to gateway for {} failed: {}", entity_id, e),
            }
        });

        if let Ok(mut tasks) = self.reconnect_tasks.lock() {
            tasks.retain(|t| !t.is_finished());
            tasks.push(task);
        }
    }

    fn log_command_result(&self, command: &str, result: Result<(), GatewayError>) {
        if let Err(e) = result {
            warn!("Gateway rejected {} for {}: {}", command, self.device_id, e);
        }
    }
}
