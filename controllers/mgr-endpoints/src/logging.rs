//! Logging setup.
//!
//! The filter sits behind a reload layer so the debug flag can be flipped
//! by a config reload without reinstalling the subscriber.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry, fmt, reload};

const INFO_DIRECTIVES: &str = "info";
const DEBUG_DIRECTIVES: &str = "info,mgr_endpoints_controller=debug,ceph_client=debug";

/// Handle for changing log verbosity at runtime.
#[derive(Debug, Clone)]
pub struct LogControl {
    handle: Option<reload::Handle<EnvFilter, Registry>>,
    debug: Arc<AtomicBool>,
}

impl LogControl {
    /// Install the global subscriber.
    ///
    /// `RUST_LOG`, when set, decides the initial filter; otherwise `debug`
    /// does.
    pub fn init(debug: bool) -> Self {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| filter_for(debug));
        let (layer, handle) = reload::Layer::new(filter);

        tracing_subscriber::registry()
            .with(layer)
            .with(fmt::layer())
            .init();

        Self {
            handle: Some(handle),
            debug: Arc::new(AtomicBool::new(debug)),
        }
    }

    /// A control that tracks the flag without a subscriber behind it.
    pub fn detached(debug: bool) -> Self {
        Self {
            handle: None,
            debug: Arc::new(AtomicBool::new(debug)),
        }
    }

    /// Switch between debug and info verbosity.
    pub fn set_debug(&self, debug: bool) {
        self.debug.store(debug, Ordering::Relaxed);
        if let Some(handle) = &self.handle {
            if let Err(e) = handle.modify(|filter| *filter = filter_for(debug)) {
                warn!(error = %e, "Failed to change log level");
            }
        }
    }

    /// Current debug flag.
    pub fn is_debug(&self) -> bool {
        self.debug.load(Ordering::Relaxed)
    }
}

fn filter_for(debug: bool) -> EnvFilter {
    EnvFilter::new(if debug { DEBUG_DIRECTIVES } else { INFO_DIRECTIVES })
}
