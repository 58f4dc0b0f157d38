//! Device session lifecycle.
//!
//! The native driver has a single global state that must be initialised
//! and shut down pairwise. [`Device`] wraps that state in a reference count:
//! the first [`Device::acquire`] initialises the driver, the matching last
//! [`Device::release`] shuts it down. Every other operation of the crate is
//! a method on `Device` and fails with [`Error::SessionInactive`] while the
//! count is zero.
//!
//! # Example
//!
//! ```
//! use ctr700::sim::SimulatedDriver;
//! use ctr700::Device;
//! use std::sync::Arc;
//!
//! let device = Device::new(Arc::new(SimulatedDriver::new()));
//! let session = device.open()?;
//! let info = session.hardware_info()?;
//! println!("PCB revision {}", info.pcb_revision);
//! session.close()?;
//! # Ok::<(), ctr700::Error>(())
//! ```
//!
//! # Concurrency
//!
//! Foreign calls run under a shared lifecycle lock; `acquire`/`release`
//! take it exclusively, so no call can overlap the native shutdown.

use crate::counter::CounterState;
use crate::driver::{NativeDriver, RawHwInfo};
use crate::error::{check, Error, Result, Subsystem};
use crate::interrupt::CallbackRegistry;
use crate::pwm::PwmState;
use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Driver library version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DriverVersion {
    /// Major version.
    pub major: u8,
    /// Minor version.
    pub minor: u8,
}

impl fmt::Display for DriverVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Channel counts of the board, queried once per session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HardwareInfo {
    /// PCB revision number.
    pub pcb_revision: u16,
    /// Digital inputs.
    pub digital_in: u16,
    /// Digital outputs.
    pub digital_out: u16,
    /// Relay outputs.
    pub relay: u16,
    /// Analog inputs.
    pub analog_in: u16,
    /// Analog outputs.
    pub analog_out: u16,
    /// Counters.
    pub counter: u16,
    /// A/B decoders.
    pub encoder: u16,
    /// PWM/PTO outputs.
    pub pwm: u16,
    /// Temperature sensors.
    pub temperature: u16,
}

impl HardwareInfo {
    /// Number of channels the board has for `subsystem`.
    #[must_use]
    pub const fn channel_count(&self, subsystem: Subsystem) -> u16 {
        match subsystem {
            Subsystem::DigitalIn => self.digital_in,
            Subsystem::DigitalOut => self.digital_out,
            Subsystem::Relay => self.relay,
            Subsystem::AnalogIn => self.analog_in,
            Subsystem::AnalogOut => self.analog_out,
            Subsystem::Counter => self.counter,
            Subsystem::Encoder => self.encoder,
            Subsystem::Pwm => self.pwm,
            Subsystem::Temperature => self.temperature,
        }
    }

    /// Check that `channel` lies in `[0, count)` for `subsystem`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidChannel`] otherwise.
    pub const fn validate(&self, subsystem: Subsystem, channel: u8) -> Result<()> {
        let available = self.channel_count(subsystem);
        if (channel as u16) < available {
            Ok(())
        } else {
            Err(Error::invalid_channel(subsystem, channel, available))
        }
    }
}

impl From<RawHwInfo> for HardwareInfo {
    fn from(raw: RawHwInfo) -> Self {
        Self {
            pcb_revision: raw.pcb_revision,
            digital_in: raw.di_channels,
            digital_out: raw.do_channels,
            relay: raw.relay_channels,
            analog_in: raw.ai_channels,
            analog_out: raw.ao_channels,
            counter: raw.cnt_channels,
            encoder: raw.enc_channels,
            pwm: raw.pwm_channels,
            temperature: raw.tmp_channels,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct Lifecycle {
    ref_count: usize,
}

/// Proof that the session is active; holds off shutdown while alive.
pub(crate) type ActiveGuard<'a> = RwLockReadGuard<'a, Lifecycle>;

/// Reference-counted gateway to the native driver.
///
/// Construct one per driver with [`Device::new`], or use [`Device::linked`]
/// for the process-wide device backed by `libctr700drv`.
pub struct Device {
    driver: Arc<dyn NativeDriver>,
    lifecycle: RwLock<Lifecycle>,
    // Serialises acquire/release so callback draining sees a stable count.
    transition: Mutex<()>,
    hw_info: Mutex<Option<HardwareInfo>>,
    pub(crate) counters: Mutex<HashMap<u8, CounterState>>,
    pub(crate) pwm: Mutex<HashMap<u8, PwmState>>,
    pub(crate) callbacks: Arc<CallbackRegistry>,
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("ref_count", &self.ref_count())
            .field("hw_info", &*self.hw_info.lock())
            .finish_non_exhaustive()
    }
}

impl Device {
    /// Create a device over `driver`. No foreign call is made.
    #[must_use]
    pub fn new(driver: Arc<dyn NativeDriver>) -> Arc<Self> {
        Arc::new(Self {
            driver,
            lifecycle: RwLock::new(Lifecycle::default()),
            transition: Mutex::new(()),
            hw_info: Mutex::new(None),
            counters: Mutex::new(HashMap::new()),
            pwm: Mutex::new(HashMap::new()),
            callbacks: Arc::new(CallbackRegistry::default()),
        })
    }

    /// The process-wide device backed by the linked `libctr700drv`.
    ///
    /// Always returns the same instance.
    #[cfg(feature = "native")]
    #[must_use]
    pub fn linked() -> Option<Arc<Self>> {
        use crate::ffi::ctr700drv::LinkedDriver;
        use std::sync::OnceLock;

        static DEVICE: OnceLock<Arc<Device>> = OnceLock::new();
        Some(Arc::clone(
            DEVICE.get_or_init(|| Self::new(Arc::new(LinkedDriver::new()))),
        ))
    }

    /// The process-wide device backed by the linked `libctr700drv`.
    ///
    /// Returns `None`: the crate was built without the `native` feature.
    #[cfg(not(feature = "native"))]
    #[must_use]
    pub const fn linked() -> Option<Arc<Self>> {
        None
    }

    /// Check if the crate was built against the native driver.
    #[must_use]
    pub const fn is_available() -> bool {
        cfg!(feature = "native")
    }

    /// Take a reference on the session, initialising the driver on 0→1.
    ///
    /// # Errors
    ///
    /// Returns the driver error if initialisation fails; the count is left
    /// unchanged in that case.
    #[instrument(level = "debug", skip(self))]
    pub fn acquire(&self) -> Result<()> {
        let _transition = self.transition.lock();
        let mut lifecycle = self.lifecycle.write();
        if lifecycle.ref_count == 0 {
            check(self.driver.initialize())?;
            debug!("native driver initialized");
        }
        lifecycle.ref_count += 1;
        Ok(())
    }

    /// Drop a reference on the session, shutting the driver down on 1→0.
    ///
    /// On the final release every registered interrupt handler is
    /// unregistered before the native shutdown is issued.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotAcquired`] if the count is already zero, or the
    /// driver error reported by the shutdown. The count reaches zero even if
    /// the shutdown fails.
    #[instrument(level = "debug", skip(self))]
    pub fn release(&self) -> Result<()> {
        let _transition = self.transition.lock();
        let count = self.lifecycle.read().ref_count;
        match count {
            0 => return Err(Error::NotAcquired),
            // Let in-flight dispatches finish while handlers can still
            // reach the device; they would block on the write lock below.
            1 => self.unregister_all(),
            _ => {}
        }

        let mut lifecycle = self.lifecycle.write();
        lifecycle.ref_count -= 1;
        if lifecycle.ref_count > 0 {
            return Ok(());
        }
        // Handlers registered since the drain above. Their dispatches may be
        // waiting for the lifecycle lock, so retire them only after it is
        // released.
        let late = self.detach_interrupts();
        self.reset_channel_state();
        let result = check(self.driver.shut_down());
        drop(lifecycle);
        for slot in late {
            slot.retire();
        }
        debug!(?result, "native driver shut down");
        result
    }

    /// Open a counted [`Session`] handle.
    ///
    /// # Errors
    ///
    /// Same as [`Device::acquire`].
    pub fn open(self: &Arc<Self>) -> Result<Session> {
        self.acquire()?;
        Ok(Session {
            device: Arc::clone(self),
            released: false,
        })
    }

    /// Current reference count.
    #[must_use]
    pub fn ref_count(&self) -> usize {
        self.lifecycle.read().ref_count
    }

    /// Check if at least one reference is held.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.ref_count() > 0
    }

    /// Version of the native driver library.
    ///
    /// Does not require an active session.
    ///
    /// # Errors
    ///
    /// Returns the driver error if the query fails.
    pub fn version(&self) -> Result<DriverVersion> {
        let (mut major, mut minor) = (0, 0);
        check(self.driver.get_version(&mut major, &mut minor))?;
        Ok(DriverVersion { major, minor })
    }

    /// Monotonic system tick count in milliseconds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionInactive`] or the driver error.
    pub fn tick_count(&self) -> Result<u32> {
        let _active = self.active()?;
        let mut ticks = 0;
        check(self.driver.get_tick_count(&mut ticks))?;
        Ok(ticks)
    }

    /// Channel counts of the board.
    ///
    /// Queried from the driver on first use and cached until the session
    /// shuts down.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionInactive`] or the driver error.
    pub fn hardware_info(&self) -> Result<HardwareInfo> {
        let _active = self.active()?;
        self.cached_hardware_info()
    }

    pub(crate) fn driver(&self) -> &dyn NativeDriver {
        self.driver.as_ref()
    }

    /// Hold off shutdown for the duration of an operation.
    ///
    /// Recursive so that interrupt handlers running on a driver thread can
    /// call back into the device while a foreign call is in progress.
    pub(crate) fn active(&self) -> Result<ActiveGuard<'_>> {
        let lifecycle = self.lifecycle.read_recursive();
        if lifecycle.ref_count == 0 {
            return Err(Error::SessionInactive);
        }
        Ok(lifecycle)
    }

    /// Validate `channel` against the cached channel count. Caller holds an
    /// [`ActiveGuard`].
    pub(crate) fn validate(&self, subsystem: Subsystem, channel: u8) -> Result<()> {
        self.cached_hardware_info()?.validate(subsystem, channel)
    }

    fn cached_hardware_info(&self) -> Result<HardwareInfo> {
        let mut cached = self.hw_info.lock();
        if let Some(info) = *cached {
            return Ok(info);
        }
        let mut raw = RawHwInfo::default();
        check(self.driver.get_hardware_info(&mut raw))?;
        let info = HardwareInfo::from(raw);
        debug!(?info, "hardware info queried");
        *cached = Some(info);
        Ok(info)
    }

    fn reset_channel_state(&self) {
        *self.hw_info.lock() = None;
        self.counters.lock().clear();
        self.pwm.lock().clear();
    }

    fn retain(&self) {
        self.lifecycle.write().ref_count += 1;
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        let leaked = self.lifecycle.get_mut().ref_count;
        if leaked == 0 {
            return;
        }
        warn!(leaked, "device dropped while acquired, forcing shutdown");
        self.unregister_all();
        if let Err(e) = check(self.driver.shut_down()) {
            warn!(error = %e, "forced shutdown failed");
        }
    }
}

/// A counted reference on a [`Device`].
///
/// Dereferences to the device, so every operation is available on the
/// session. Cloning takes another reference; dropping releases it.
#[derive(Debug)]
pub struct Session {
    device: Arc<Device>,
    released: bool,
}

impl Session {
    /// Release this reference and report the outcome.
    ///
    /// # Errors
    ///
    /// Returns the driver error if this was the last reference and the
    /// native shutdown failed.
    pub fn close(mut self) -> Result<()> {
        self.released = true;
        self.device.release()
    }

    /// The device this session belongs to.
    #[must_use]
    pub const fn device(&self) -> &Arc<Device> {
        &self.device
    }
}

impl Clone for Session {
    fn clone(&self) -> Self {
        // Count is at least one while `self` exists, no native call needed.
        self.device.retain();
        Self {
            device: Arc::clone(&self.device),
            released: false,
        }
    }
}

impl Deref for Session {
    type Target = Device;

    fn deref(&self) -> &Device {
        &self.device
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.device.release() {
            warn!(error = %e, "session release failed");
        }
    }
}
