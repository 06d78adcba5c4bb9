use std::collections::BTreeMap;
use std::collections::HashMap;
use std::collections::HashSet;
use std::error::Error;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::backoff::setup_retry_delay;
use crate::client::GatewayClient;
use crate::client::GatewayConnector;
use crate::client::GatewayEntry;
use crate::engine::ClimateCommand;
use crate::engine::FromIntegrationMessage;
use crate::engine::FromIntegrationSender;
use crate::engine::Integration;
use crate::engine::ToIntegrationMessage;
use crate::error::ClimateError;
use crate::error::SetupError;
use crate::mirror::DeviceStateMirror;

pub const INTEGRATION_NAME: &str = "it600";

/// A gateway whose setup succeeded, with the entities created for it.
struct LoadedEntry<C: GatewayClient> {
    client: Arc<C>,
    entity_ids: Vec<String>,
}

/// State shared between the integration and its setup retry tasks.
struct Loaded<C: GatewayClient> {
    entries: HashMap<String, LoadedEntry<C>>,
    entities: HashMap<String, Arc<DeviceStateMirror<C>>>,
}

impl<C: GatewayClient> Default for Loaded<C> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            entities: HashMap::new(),
        }
    }
}

type SharedLoaded<C> = Arc<Mutex<Loaded<C>>>;

/// Salus iT600 integration
///
/// Owns one gateway client per config entry and one climate entity per
/// thermostat the gateway reports.
pub struct It600Integration<K: GatewayConnector> {
    connector: Arc<K>,
    entries: BTreeMap<String, GatewayEntry>,
    loaded: SharedLoaded<K::Client>,
    to_engine: Option<FromIntegrationSender>,

    /// Setup retries for entries that were not ready, keyed by entry id
    retry_tasks: HashMap<String, JoinHandle<()>>,
}

impl<K: GatewayConnector + 'static> It600Integration<K> {
    pub fn new(connector: K, entries: BTreeMap<String, GatewayEntry>) -> Self {
        Self {
            connector: Arc::new(connector),
            entries,
            loaded: Arc::new(Mutex::new(Loaded::default())),
            to_engine: None,
            retry_tasks: HashMap::new(),
        }
    }

    /// Serial numbers of the configured gateways, for duplicate detection in
    /// the config flow.
    pub fn configured_unique_ids(&self) -> HashSet<String> {
        self.entries
            .values()
            .filter_map(|e| e.serial_number.clone())
            .collect()
    }

    /// Entity ids currently provided by this integration.
    pub async fn entity_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.loaded.lock().await.entities.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn is_loaded(&self, entry_id: &str) -> bool {
        self.loaded.lock().await.entries.contains_key(entry_id)
    }

    /// Connect to one gateway and create an entity per thermostat.
    async fn setup_entry(
        connector: &K,
        loaded: &SharedLoaded<K::Client>,
        to_engine: &FromIntegrationSender,
        entry_id: &str,
        entry: &GatewayEntry,
    ) -> Result<(), SetupError> {
        if entry.host.is_empty() || entry.euid.is_empty() {
            return Err(SetupError::Configuration(
                "host and euid are required".to_string(),
            ));
        }

        let client = Arc::new(connector.client(entry));
        let serial = client.connect().await.map_err(SetupError::from)?;
        info!("[{}] Connected to gateway {}", entry_id, serial);

        let devices = client.devices();
        if devices.is_empty() {
            error!("[{}] Error getting device list from gateway", entry_id);
            if let Err(e) = client.close().await {
                warn!("[{}] Failed to close gateway connection: {}", entry_id, e);
            }
            loaded.lock().await.entries.insert(
                entry_id.to_string(),
                LoadedEntry {
                    client,
                    entity_ids: Vec::new(),
                },
            );
            return Ok(());
        }

        let mut entity_ids = Vec::with_capacity(devices.len());
        for device in &devices {
            let entity_id = format!("climate.{}", device.id);
            let mirror = Arc::new(DeviceStateMirror::new(
                entity_id.clone(),
                device,
                Arc::clone(&client),
                to_engine.clone(),
            ));

            mirror.refresh().await;
            register_entity(&entity_id, to_engine).await;
            mirror.write_state().await;
            mirror.attach().await;

            loaded
                .lock()
                .await
                .entities
                .insert(entity_id.clone(), mirror);
            entity_ids.push(entity_id);
        }

        info!(
            "[{}] Set up {} climate entities: {:?}",
            entry_id,
            entity_ids.len(),
            entity_ids
        );
        loaded
            .lock()
            .await
            .entries
            .insert(entry_id.to_string(), LoadedEntry { client, entity_ids });
        Ok(())
    }

    /// Keep retrying a gateway that was not ready yet.
    fn spawn_setup_retry(&mut self, entry_id: String, entry: GatewayEntry, tx: FromIntegrationSender) {
        let connector = Arc::clone(&self.connector);
        let loaded = Arc::clone(&self.loaded);
        let key = entry_id.clone();
        let task = tokio::spawn(async move {
            let mut tries = 0;
            loop {
                let delay = setup_retry_delay(tries);
                info!("[{}] Retrying setup in {:?}", entry_id, delay);
                tokio::time::sleep(delay).await;
                tries += 1;

                match Self::setup_entry(&connector, &loaded, &tx, &entry_id, &entry).await {
                    Ok(()) => break,
                    Err(SetupError::NotReady(e)) => {
                        warn!("[{}] Gateway still not ready: {}", entry_id, e);
                    }
                    Err(e) => {
                        error!("[{}] Setup failed: {}", entry_id, e);
                        break;
                    }
                }
            }
        });
        if let Some(old) = self.retry_tasks.insert(key, task) {
            old.abort();
        }
    }

    /// Tear down one config entry: cancel a pending setup retry, detach its
    /// entities and close its client.
    ///
    /// Returns false when the entry was neither loaded nor waiting to retry.
    pub async fn unload_entry(&mut self, entry_id: &str) -> bool {
        let mut cancelled = false;
        if let Some(task) = self.retry_tasks.remove(entry_id) {
            cancelled = !task.is_finished();
            task.abort();
            if cancelled {
                info!("[{}] Cancelled pending setup retry", entry_id);
            }
        }

        let (entry, mirrors) = {
            let mut loaded = self.loaded.lock().await;
            let Some(entry) = loaded.entries.remove(entry_id) else {
                return cancelled;
            };
            let mirrors: Vec<_> = entry
                .entity_ids
                .iter()
                .filter_map(|id| loaded.entities.remove(id))
                .collect();
            (entry, mirrors)
        };

        for mirror in mirrors {
            mirror.detach().await;
            if let Some(tx) = &self.to_engine {
                notify_entity_removed(mirror.entity_id(), tx).await;
            }
        }
        if let Err(e) = entry.client.close().await {
            warn!("[{}] Failed to close gateway connection: {}", entry_id, e);
        }
        info!("[{}] Unloaded", entry_id);
        true
    }

    async fn mirror(&self, entity_id: &str) -> Result<Arc<DeviceStateMirror<K::Client>>, ClimateError> {
        self.loaded
            .lock()
            .await
            .entities
            .get(entity_id)
            .cloned()
            .ok_or_else(|| ClimateError::UnknownEntity(entity_id.to_string()))
    }

    /// Execute a climate command against one entity
    pub async fn send_climate_command(
        &self,
        entity_id: &str,
        command: ClimateCommand,
    ) -> Result<(), ClimateError> {
        let mirror = self.mirror(entity_id).await?;
        match command {
            ClimateCommand::SetTemperature {
                temperature,
                hvac_mode,
            } => {
                mirror
                    .set_temperature_with_mode(temperature, hvac_mode)
                    .await
            }
            ClimateCommand::SetHvacMode(mode) => {
                mirror.set_mode(mode).await;
                Ok(())
            }
        }
    }
}

/// Register an entity with the engine
async fn register_entity(entity_id: &str, to_engine: &FromIntegrationSender) {
    let msg = FromIntegrationMessage::EntityDiscovered {
        entity_id: entity_id.to_string(),
        integration_name: INTEGRATION_NAME.to_string(),
    };
    if let Err(e) = to_engine.send(msg).await {
        warn!("Failed to send EntityDiscovered message: {}", e);
    } else {
        info!("Registered entity: {}", entity_id);
    }
}

/// Notify the engine that an entity has been removed
async fn notify_entity_removed(entity_id: &str, to_engine: &FromIntegrationSender) {
    let msg = FromIntegrationMessage::EntityRemoved {
        entity_id: entity_id.to_string(),
    };
    if let Err(e) = to_engine.send(msg).await {
        warn!("Failed to send EntityRemoved message: {}", e);
    }
}

#[async_trait]
impl<K: GatewayConnector + 'static> Integration for It600Integration<K> {
    fn name(&self) -> &str {
        INTEGRATION_NAME
    }

    async fn setup(&mut self, tx: FromIntegrationSender) -> Result<(), Box<dyn Error + Send>> {
        self.to_engine = Some(tx.clone());

        let entries: Vec<(String, GatewayEntry)> = self
            .entries
            .iter()
            .map(|(id, e)| (id.clone(), e.clone()))
            .collect();

        for (entry_id, entry) in entries {
            info!(
                "[{}] Setting up gateway at {}:{}",
                entry_id, entry.host, entry.port
            );
            match Self::setup_entry(&self.connector, &self.loaded, &tx, &entry_id, &entry).await {
                Ok(()) => {}
                Err(SetupError::NotReady(e)) => {
                    warn!("[{}] Gateway not ready: {}", entry_id, e);
                    self.spawn_setup_retry(entry_id, entry, tx.clone());
                }
                Err(e) => {
                    error!("[{}] Setup failed: {}", entry_id, e);
                }
            }
        }

        info!("it600 integration ready to handle commands");
        Ok(())
    }

    async fn handle_message(
        &mut self,
        msg: ToIntegrationMessage,
    ) -> Result<(), Box<dyn Error + Send>> {
        match msg {
            ToIntegrationMessage::ClimateCommand { entity_id, command } => {
                info!("Handling climate command for {}: {:?}", entity_id, command);
                self.send_climate_command(&entity_id, command)
                    .await
                    .map_err(|e| -> Box<dyn Error + Send> { Box::new(e) })?;
            }
        }
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), Box<dyn Error + Send>> {
        info!("it600 integration shutting down");
        for (_, task) in self.retry_tasks.drain() {
            task.abort();
        }
        let entry_ids: Vec<String> = self.loaded.lock().await.entries.keys().cloned().collect();
        for entry_id in entry_ids {
            self.unload_entry(&entry_id).await;
        }
        Ok(())
    }
}
