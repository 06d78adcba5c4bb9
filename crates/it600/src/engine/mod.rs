mod engine;
mod event;
mod integration;
mod message;
pub mod state;

pub use engine::Engine;
pub use event::Event;
pub use integration::FromIntegrationSender;
pub use integration::Integration;
pub use integration::ToIntegrationSender;
pub use message::ClimateCommand;
pub use message::FromIntegrationMessage;
pub use message::ToIntegrationMessage;
pub use state::State;
