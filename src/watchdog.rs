//! Hardware watchdog.
//!
//! Once enabled, the watchdog must be serviced within its timeout window or
//! the driver reports [`ErrorKind::WatchdogTimeout`](crate::ErrorKind::WatchdogTimeout)
//! on the next call. Nothing here keeps time; meeting the deadline is up to
//! the caller.

use crate::error::{check, Result};
use crate::session::Device;
use std::fmt;
use tracing::{info, instrument, trace};

/// What the board does when the watchdog expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchdogMode {
    /// Report the expiry only.
    MonitorOnly,
    /// Put the outputs into their safe state.
    SafeState,
}

impl WatchdogMode {
    const fn monitor_only(self) -> u8 {
        match self {
            Self::MonitorOnly => 1,
            Self::SafeState => 0,
        }
    }
}

impl fmt::Display for WatchdogMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MonitorOnly => write!(f, "monitor-only"),
            Self::SafeState => write!(f, "safe-state"),
        }
    }
}

impl Device {
    /// Arm the watchdog.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionInactive`](crate::Error::SessionInactive) or
    /// the driver error.
    #[instrument(level = "debug", skip(self))]
    pub fn enable_watchdog(&self, mode: WatchdogMode) -> Result<()> {
        let _active = self.active()?;
        check(self.driver().enable_watchdog(mode.monitor_only()))?;
        info!(%mode, "watchdog armed");
        Ok(())
    }

    /// Restart the watchdog timeout.
    ///
    /// # Errors
    ///
    /// As [`Device::enable_watchdog`]. A missed deadline surfaces as an error
    /// for which [`Error::is_fatal`](crate::Error::is_fatal) holds.
    pub fn service_watchdog(&self) -> Result<()> {
        let _active = self.active()?;
        trace!("watchdog serviced");
        check(self.driver().service_watchdog())
    }
}
