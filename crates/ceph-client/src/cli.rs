//! `ceph` CLI transport
//!
//! Runs each administrative command as a `ceph` subprocess. The CLI reads
//! the same `ceph.conf` and keyring a librados client would, so credentials
//! and monitor addresses are configured the usual way.

use crate::channel::AdminChannel;
use crate::error::CephError;
use crate::models::MonCommand;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

const DEFAULT_BINARY: &str = "ceph";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Administrative channel backed by the `ceph` command line tool.
#[derive(Debug, Clone)]
pub struct CephCli {
    binary: PathBuf,
    conf: Option<PathBuf>,
    id: Option<String>,
    timeout: Duration,
}

/// Builder for [`CephCli`].
#[derive(Debug, Clone)]
pub struct CephCliBuilder {
    inner: CephCli,
}

impl CephCli {
    /// Start building a channel with the defaults (`ceph` from `PATH`, 30s timeout).
    pub fn builder() -> CephCliBuilder {
        CephCliBuilder {
            inner: CephCli {
                binary: PathBuf::from(DEFAULT_BINARY),
                conf: None,
                id: None,
                timeout: DEFAULT_TIMEOUT,
            },
        }
    }

    /// Arguments passed to the binary for `command`.
    ///
    /// The prefix words become positional arguments, followed by the output
    /// format, e.g. `--conf /etc/ceph/ceph.conf mgr services --format json`.
    pub fn args(&self, command: &MonCommand) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(conf) = &self.conf {
            args.push("--conf".to_string());
            args.push(conf.display().to_string());
        }
        if let Some(id) = &self.id {
            args.push("--id".to_string());
            args.push(id.clone());
        }
        args.extend(command.prefix.split_whitespace().map(str::to_string));
        args.push("--format".to_string());
        args.push(command.format.clone());
        args
    }
}

impl CephCliBuilder {
    /// Path or name of the `ceph` binary.
    pub fn binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.inner.binary = binary.into();
        self
    }

    /// Path to `ceph.conf`.
    pub fn conf(mut self, conf: impl Into<PathBuf>) -> Self {
        self.inner.conf = Some(conf.into());
        self
    }

    /// Client id (the `client.` prefix is implied).
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.inner.id = Some(id.into());
        self
    }

    /// Per-command deadline.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.inner.timeout = timeout;
        self
    }

    /// Finish building.
    pub fn build(self) -> CephCli {
        self.inner
    }
}

#[async_trait::async_trait]
impl AdminChannel for CephCli {
    async fn command(&self, command: &MonCommand) -> Result<Vec<u8>, CephError> {
        let args = self.args(command);
        debug!(binary = %self.binary.display(), ?args, "Running ceph command");

        let child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(CephError::QueryFailed {
                    prefix: command.prefix.clone(),
                    message: format!("failed to run {}: {e}", self.binary.display()),
                });
            }
            Err(_elapsed) => {
                return Err(CephError::QueryFailed {
                    prefix: command.prefix.clone(),
                    message: format!("timed out after {:?}", self.timeout),
                });
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CephError::QueryFailed {
                prefix: command.prefix.clone(),
                message: format!("{} - {}", output.status, stderr.trim()),
            });
        }

        Ok(output.stdout)
    }
}
