//! ctr700: Safe Rust Bindings for the CTR-700 Edge Controller
//!
//! This crate wraps `libctr700drv`, the native driver of the SYS TEC CTR-700
//! industrial controller, in a reference-counted, typed API with interrupt
//! dispatch and a structured error taxonomy.
//!
//! # Design Philosophy
//!
//! - **Zero unsafe in public API**: All FFI quarantined in internal modules
//! - **Validate before crossing**: channel numbers and parameters are checked
//!   against the board's [`HardwareInfo`] before any foreign call
//! - **No silent failure**: every native status code is surfaced as an [`Error`]
//!
//! # Subsystems
//!
//! | Subsystem | Module | Operations |
//! |-----------|--------|------------|
//! | Session lifecycle | [`session`] | acquire, release, version, tick count, hardware info |
//! | Digital, relay, analog, temperature | [`io`] | read, write, mode selection |
//! | Counters | [`counter`] | mode, enable, preload, value |
//! | PWM/PTO | [`pwm`] | time base, parameters, enable, PTO state |
//! | Interrupts | [`interrupt`] | register, unregister |
//! | Watchdog | [`watchdog`] | enable, service |
//!
//! # Quick Start
//!
//! ```no_run
//! use ctr700::Device;
//!
//! if let Some(device) = Device::linked() {
//!     let session = device.open().expect("driver initialisation failed");
//!     session.set_digital_out(0, true).expect("DO0 write failed");
//!     println!("DI0: {}", session.digital_in(0).expect("DI0 read failed"));
//! } else {
//!     println!("built without the native driver");
//! }
//! ```
//!
//! # Feature Flags
//!
//! - `native` - Link against `libctr700drv` and enable [`Device::linked`]
//!
//! # Safety Guarantees
//!
//! This crate uses `#![deny(unsafe_code)]` at the library level. All FFI
//! code is quarantined in the internal `ffi` module, which is not exported.
//!
//! # Error Handling
//!
//! All operations that can fail return [`Result<T, Error>`]. Native status
//! codes keep their [`ErrorKind`]; misuse detected in this crate (inactive
//! session, premature enable, double registration) has its own variants.
//!
//! # Thread Safety
//!
//! [`Device`] is `Send + Sync`. Channel operations may run concurrently from
//! any thread; session transitions are serialised internally. Interrupt
//! handlers run on the driver's thread.
//!
//! # Testing without Hardware
//!
//! [`sim::SimulatedDriver`] implements the driver interface in process:
//!
//! ```
//! use ctr700::sim::SimulatedDriver;
//! use ctr700::Device;
//! use std::sync::Arc;
//!
//! let driver = Arc::new(SimulatedDriver::new());
//! let session = Device::new(driver.clone()).open()?;
//! driver.set_temperature(0, 215_000);
//! assert!((session.temperature(0)? - 21.5).abs() < 1e-9);
//! # Ok::<(), ctr700::Error>(())
//! ```

// SAFETY: This crate denies unsafe code at the library level.
// All unsafe FFI code is quarantined in src/ffi/, which is not exported.
// We use deny (not forbid) so it can be overridden in the ffi module.
#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod counter;
pub mod driver;
pub mod error;
pub mod interrupt;
pub mod io;
pub mod pwm;
pub mod session;
pub mod sim;
pub mod watchdog;

// FFI module is internal only - not exported
mod ffi;

// Re-export main types for convenience
pub use counter::{CounterConfig, CounterDirection, CounterMode, CounterTrigger};
pub use error::{classify, Error, ErrorKind, Result, ResultCode, Subsystem};
pub use interrupt::{InterruptEvent, Trigger};
pub use io::{raw_to_celsius, AnalogMode, DiagInfo};
pub use pwm::{OutputMode, PtoConfig, PwmConfig, PwmPhase, PwmTimebase};
pub use session::{Device, DriverVersion, HardwareInfo, Session};
pub use watchdog::WatchdogMode;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_version_not_empty() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_device_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Device>();
        assert_send_sync::<Session>();
    }

    #[test]
    fn test_error_reexport() {
        let err = Error::not_configured(Subsystem::Pwm, 0);
        assert!(err.is_contract_violation());
        assert_eq!(classify(0xf2), ErrorKind::WatchdogTimeout);
    }

    #[test]
    fn test_simulated_session() {
        let session = Device::new(Arc::new(sim::SimulatedDriver::new()))
            .open()
            .unwrap();
        assert_eq!(session.version().unwrap().to_string(), "2.1");
        assert_eq!(session.hardware_info().unwrap().relay, 2);
    }
}
