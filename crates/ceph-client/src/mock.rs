//! Mock AdminChannel for unit testing
//!
//! Stores canned responses in memory, keyed by command prefix, and records
//! every command it receives so tests can assert on what was sent.

use crate::channel::AdminChannel;
use crate::error::CephError;
use crate::models::MonCommand;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
enum Reply {
    Payload(Vec<u8>),
    Failure(String),
}

/// Mock AdminChannel for testing
///
/// Clones share state, so a test can keep a handle after moving the channel
/// into a client.
#[derive(Debug, Clone, Default)]
pub struct MockAdminChannel {
    replies: Arc<Mutex<HashMap<String, Reply>>>,
    commands: Arc<Mutex<Vec<MonCommand>>>,
}

impl MockAdminChannel {
    /// Create a mock with no canned responses
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `prefix` with `payload` (for test setup)
    pub fn set_response(&self, prefix: &str, payload: &str) {
        self.replies
            .lock()
            .unwrap()
            .insert(prefix.to_string(), Reply::Payload(payload.as_bytes().to_vec()));
    }

    /// Make `prefix` fail with a transport error (for test setup)
    pub fn fail_command(&self, prefix: &str, message: &str) {
        self.replies
            .lock()
            .unwrap()
            .insert(prefix.to_string(), Reply::Failure(message.to_string()));
    }

    /// Commands received so far, oldest first
    pub fn commands(&self) -> Vec<MonCommand> {
        self.commands.lock().unwrap().clone()
    }

    /// Number of times `prefix` was sent
    pub fn count(&self, prefix: &str) -> usize {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.prefix == prefix)
            .count()
    }
}

#[async_trait::async_trait]
impl AdminChannel for MockAdminChannel {
    async fn command(&self, command: &MonCommand) -> Result<Vec<u8>, CephError> {
        self.commands.lock().unwrap().push(command.clone());

        let reply = self.replies.lock().unwrap().get(&command.prefix).cloned();
        match reply {
            Some(Reply::Payload(payload)) => Ok(payload),
            Some(Reply::Failure(message)) => Err(CephError::QueryFailed {
                prefix: command.prefix.clone(),
                message,
            }),
            None => Err(CephError::QueryFailed {
                prefix: command.prefix.clone(),
                message: "no canned response".to_string(),
            }),
        }
    }
}
