//! Ceph Administrative Client
//!
//! A small Rust client for sending administrative (mon/mgr) commands to a
//! Ceph cluster and decoding their JSON responses.
//!
//! # Example
//!
//! ```no_run
//! use ceph_client::{CephCli, CephClient, MgrService};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let channel = CephCli::builder()
//!     .conf("/etc/ceph/ceph.conf")
//!     .id("admin")
//!     .build();
//! let client = CephClient::new(channel);
//!
//! // Make sure the cluster answers before doing anything else
//! client.ping().await?;
//!
//! let services = client.mgr_services().await?;
//! println!("dashboard at {}", services.url(MgrService::Dashboard));
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Channel abstraction**: [`AdminChannel`] hides how commands reach the cluster
//! - **CLI transport**: [`CephCli`] drives the `ceph` binary with a per-command timeout
//! - **Mocking**: `MockAdminChannel` (feature `test-util`) for unit tests

pub mod channel;
pub mod cli;
pub mod client;
pub mod error;
pub mod models;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use channel::AdminChannel;
pub use cli::{CephCli, CephCliBuilder};
pub use client::CephClient;
pub use error::CephError;
pub use models::*;
#[cfg(any(test, feature = "test-util"))]
pub use mock::MockAdminChannel;
