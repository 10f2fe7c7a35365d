//! AdminChannel trait for mocking
//!
//! The channel is an opaque request/response pipe: it executes one named
//! command and returns the raw JSON payload. [`crate::CephCli`] implements it
//! for production, tests use `MockAdminChannel`.

use crate::error::CephError;
use crate::models::MonCommand;

/// Transport for Ceph administrative commands.
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait AdminChannel: Send + Sync {
    /// Execute `command` and return the raw response payload.
    async fn command(&self, command: &MonCommand) -> Result<Vec<u8>, CephError>;
}
