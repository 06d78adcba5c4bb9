//! Salus iT600 gateway integration.
//!
//! Thermostats behind an iT600 gateway are exposed as climate entities of the
//! engine. The gateway protocol itself is provided by a [`GatewayClient`]
//! implementation; this crate mirrors device state, forwards commands and
//! handles reconnects.

pub mod backoff;
pub mod climate;
pub mod client;
pub mod config;
pub mod config_flow;
pub mod engine;
pub mod error;
pub mod integration;
pub mod logging;
pub mod mirror;

pub use climate::ClimateState;
pub use climate::Connectivity;
pub use climate::DeviceSnapshot;
pub use climate::HvacMode;
pub use client::GatewayClient;
pub use client::GatewayConnector;
pub use client::GatewayEntry;
pub use config::Config;
pub use config::LogLevel;
pub use engine::Engine;
pub use engine::Event;
pub use engine::State;
pub use error::ClimateError;
pub use error::ConfigError;
pub use error::GatewayError;
pub use error::SetupError;
pub use integration::It600Integration;
pub use mirror::DeviceStateMirror;
