use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::error::GatewayError;

/// Push notification from the gateway client.
///
/// `device_id` is `None` when the update concerns every device (e.g. a
/// connectivity change).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VendorUpdate {
    pub device_id: Option<String>,
}

/// Listener registered with a gateway client.
pub type UpdateSender = mpsc::UnboundedSender<VendorUpdate>;
pub type UpdateReceiver = mpsc::UnboundedReceiver<VendorUpdate>;

/// A thermostat as listed by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceEntry {
    pub id: String,
    pub name: Option<String>,
}

/// Connection parameters for a gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayEntry {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub euid: String,
    /// Serial number of the gateway, used as the entry's unique id.
    #[serde(default)]
    pub serial_number: Option<String>,
}

pub fn default_port() -> u16 {
    80
}

/// Trait for gateway client operations
///
/// The wire protocol, encryption and session handling live behind this trait.
/// Readers are expected to be cheap and served from the client's own cache.
#[async_trait]
pub trait GatewayClient: Send + Sync {
    /// Open the connection. Returns the gateway's serial number.
    async fn connect(&self) -> Result<String, GatewayError>;

    /// Close the connection. Must be safe to call repeatedly.
    async fn close(&self) -> Result<(), GatewayError>;

    fn is_connected(&self) -> bool;

    fn devices(&self) -> Vec<DeviceEntry>;

    fn temperature(&self, device_id: &str) -> Option<f64>;
    fn min_setpoint(&self, device_id: &str) -> Option<f64>;
    fn max_setpoint(&self, device_id: &str) -> Option<f64>;
    fn setpoint(&self, device_id: &str) -> Option<f64>;
    fn rssi(&self, device_id: &str) -> Option<f64>;
    fn power(&self, device_id: &str) -> bool;
    fn mode(&self, device_id: &str) -> Option<String>;

    async fn set_temperature(&self, device_id: &str, temperature: f64)
        -> Result<(), GatewayError>;
    async fn set_power_on(&self, device_id: &str) -> Result<(), GatewayError>;
    async fn set_power_off(&self, device_id: &str) -> Result<(), GatewayError>;
    async fn set_mode(&self, device_id: &str, mode: &str) -> Result<(), GatewayError>;

    /// Register a listener for push updates.
    fn add_update_callback(&self, listener: UpdateSender);
}

/// Builds gateway clients from connection parameters.
pub trait GatewayConnector: Send + Sync {
    type Client: GatewayClient + 'static;

    fn client(&self, entry: &GatewayEntry) -> Self::Client;
}

#[cfg(test)]
pub use mock::Call;
#[cfg(test)]
pub use mock::MockConnector;
#[cfg(test)]
pub use mock::MockDevice;
#[cfg(test)]
pub use mock::MockGatewayClient;

#[cfg(test)]
mod mock {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::Mutex;

    use super::*;

    /// A vendor call recorded by the mock, in issue order.
    #[derive(Debug, Clone, PartialEq)]
    pub enum Call {
        Connect,
        Close,
        SetTemperature(String, f64),
        PowerOn(String),
        PowerOff(String),
        SetMode(String, String),
    }

    #[derive(Debug, Clone, Default)]
    pub struct MockDevice {
        pub name: Option<String>,
        pub temperature: Option<f64>,
        pub min_setpoint: Option<f64>,
        pub max_setpoint: Option<f64>,
        pub setpoint: Option<f64>,
        pub rssi: Option<f64>,
        pub power: bool,
        pub mode: Option<String>,
    }

    #[derive(Debug, Default)]
    struct Inner {
        connected: bool,
        connect_result: Option<GatewayError>,
        command_result: Option<GatewayError>,
        serial: String,
        devices: Vec<(String, MockDevice)>,
        calls: Vec<Call>,
        listeners: Vec<UpdateSender>,
    }

    /// Mock gateway client for testing
    ///
    /// Cloning shares the underlying state so tests can keep a handle after
    /// passing the client to the code under test.
    #[derive(Debug, Clone, Default)]
    pub struct MockGatewayClient {
        inner: Arc<Mutex<Inner>>,
    }

    impl MockGatewayClient {
        pub fn new() -> Self {
            let client = Self::default();
            client.inner.lock().unwrap().serial = "001E5E0D32906128".to_string();
            client
        }

        pub fn add_device(&self, id: &str, device: MockDevice) {
            self.inner
                .lock()
                .unwrap()
                .devices
                .push((id.to_string(), device));
        }

        pub fn update_device(&self, id: &str, f: impl FnOnce(&mut MockDevice)) {
            let mut inner = self.inner.lock().unwrap();
            if let Some((_, device)) = inner.devices.iter_mut().find(|(d, _)| d == id) {
                f(device);
            }
        }

        pub fn set_connected(&self, connected: bool) {
            self.inner.lock().unwrap().connected = connected;
        }

        pub fn fail_connect(&self, err: Option<GatewayError>) {
            self.inner.lock().unwrap().connect_result = err;
        }

        pub fn fail_commands(&self, err: Option<GatewayError>) {
            self.inner.lock().unwrap().command_result = err;
        }

        pub fn calls(&self) -> Vec<Call> {
            self.inner.lock().unwrap().calls.clone()
        }

        pub fn clear_calls(&self) {
            self.inner.lock().unwrap().calls.clear();
        }

        pub fn connect_count(&self) -> usize {
            self.calls()
                .iter()
                .filter(|c| matches!(c, Call::Connect))
                .count()
        }

        pub fn listener_count(&self) -> usize {
            self.inner.lock().unwrap().listeners.len()
        }

        /// Push an update to every registered listener.
        pub fn push_update(&self, device_id: Option<&str>) {
            let inner = self.inner.lock().unwrap();
            for listener in &inner.listeners {
                let _ = listener.send(VendorUpdate {
                    device_id: device_id.map(String::from),
                });
            }
        }

        fn device<T>(&self, id: &str, f: impl FnOnce(&MockDevice) -> T) -> Option<T> {
            let inner = self.inner.lock().unwrap();
            inner.devices.iter().find(|(d, _)| d == id).map(|(_, d)| f(d))
        }

        fn command(&self, call: Call) -> Result<(), GatewayError> {
            let mut inner = self.inner.lock().unwrap();
            inner.calls.push(call);
            match &inner.command_result {
                Some(err) => Err(err.clone()),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl GatewayClient for MockGatewayClient {
        async fn connect(&self) -> Result<String, GatewayError> {
            let mut inner = self.inner.lock().unwrap();
            inner.calls.push(Call::Connect);
            if let Some(err) = &inner.connect_result {
                return Err(err.clone());
            }
            inner.connected = true;
            Ok(inner.serial.clone())
        }

        async fn close(&self) -> Result<(), GatewayError> {
            let mut inner = self.inner.lock().unwrap();
            inner.calls.push(Call::Close);
            inner.connected = false;
            Ok(())
        }

        fn is_connected(&self) -> bool {
            self.inner.lock().unwrap().connected
        }

        fn devices(&self) -> Vec<DeviceEntry> {
            self.inner
                .lock()
                .unwrap()
                .devices
                .iter()
                .map(|(id, d)| DeviceEntry {
                    id: id.clone(),
                    name: d.name.clone(),
                })
                .collect()
        }

        fn temperature(&self, device_id: &str) -> Option<f64> {
            self.device(device_id, |d| d.temperature).flatten()
        }

        fn min_setpoint(&self, device_id: &str) -> Option<f64> {
            self.device(device_id, |d| d.min_setpoint).flatten()
        }

        fn max_setpoint(&self, device_id: &str) -> Option<f64> {
            self.device(device_id, |d| d.max_setpoint).flatten()
        }

        fn setpoint(&self, device_id: &str) -> Option<f64> {
            self.device(device_id, |d| d.setpoint).flatten()
        }

        fn rssi(&self, device_id: &str) -> Option<f64> {
            self.device(device_id, |d| d.rssi).flatten()
        }

        fn power(&self, device_id: &str) -> bool {
            self.device(device_id, |d| d.power).unwrap_or(false)
        }

        fn mode(&self, device_id: &str) -> Option<String> {
            self.device(device_id, |d| d.mode.clone()).flatten()
        }

        async fn set_temperature(
            &self,
            device_id: &str,
            temperature: f64,
        ) -> Result<(), GatewayError> {
            self.command(Call::SetTemperature(device_id.to_string(), temperature))
        }

        async fn set_power_on(&self, device_id: &str) -> Result<(), GatewayError> {
            self.command(Call::PowerOn(device_id.to_string()))
        }

        async fn set_power_off(&self, device_id: &str) -> Result<(), GatewayError> {
            self.command(Call::PowerOff(device_id.to_string()))
        }

        async fn set_mode(&self, device_id: &str, mode: &str) -> Result<(), GatewayError> {
            self.command(Call::SetMode(device_id.to_string(), mode.to_string()))
        }

        fn add_update_callback(&self, listener: UpdateSender) {
            self.inner.lock().unwrap().listeners.push(listener);
        }
    }

    /// Hands out clients from a table keyed by host, so tests can script each
    /// gateway before setup runs.
    #[derive(Debug, Clone, Default)]
    pub struct MockConnector {
        clients: Arc<Mutex<HashMap<String, MockGatewayClient>>>,
    }

    impl MockConnector {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn insert(&self, host: &str, client: MockGatewayClient) {
            self.clients
                .lock()
                .unwrap()
                .insert(host.to_string(), client);
        }
    }

    impl GatewayConnector for MockConnector {
        type Client = MockGatewayClient;

        fn client(&self, entry: &GatewayEntry) -> MockGatewayClient {
            self.clients
                .lock()
                .unwrap()
                .entry(entry.host.clone())
                .or_insert_with(MockGatewayClient::new)
                .clone()
        }
    }
}
