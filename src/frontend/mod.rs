//! Delivery of results and errors to remote frontends, and receipt of
//! command requests from them.
//!
//! [`FrontendPort`] is the abstraction the daemon drives; the only
//! concrete implementation in this crate is [`mqtt::MqttFrontend`]. A
//! frontend failing to connect or publish is a [`crate::error::PicalorError::TransportFailure`],
//! which is logged and does not stop the measurement worker.

pub mod mqtt;

use anyhow::Result;
use serde_json::Value;

/// A pending command received from a frontend: its name and JSON payload.
pub struct CommandRequest {
    pub name: String,
    pub payload: Value,
}

/// Transport-agnostic interface between the daemon and a remote frontend.
pub trait FrontendPort: Send {
    /// Publish the latest results snapshot.
    fn publish_results(&self, results: &Value) -> Result<()>;

    /// Publish a non-fatal error string for observability.
    fn publish_error(&self, message: &str) -> Result<()>;

    /// Publish the outcome of a dispatched command.
    fn publish_command_response(&self, command: &str, ok: bool, body: &Value) -> Result<()>;

    /// Non-blocking poll for the next queued command request, if any.
    fn poll_command(&self) -> Option<CommandRequest>;
}
