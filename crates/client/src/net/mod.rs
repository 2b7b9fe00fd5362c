pub mod client;
pub mod config;
pub mod input;
pub mod interpolation;
pub mod prediction;
pub mod reconciliation;
pub mod status;
pub mod supervisor;
pub mod ws;

pub use client::{ConnectError, ConnectionManager, Inbound};
pub use config::ClientConfig;
pub use input::InputState;
pub use prediction::LocalInputPredictor;
pub use reconciliation::ReconciliationEngine;
pub use status::{Intent, IntentError, StatusMachine};
pub use supervisor::{DisconnectionSupervisor, Verdict};
pub use ws::WsTransport;
