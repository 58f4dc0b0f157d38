//! Edge-triggered interrupt handlers for digital inputs.
//!
//! The native driver reports edges through a fixed `(channel, value)`
//! callback. The bridge keeps a table of one handler per channel and routes
//! each report to the handler registered for that channel.
//!
//! # Example
//!
//! ```
//! use ctr700::interrupt::Trigger;
//! use ctr700::sim::SimulatedDriver;
//! use ctr700::Device;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! let driver = Arc::new(SimulatedDriver::new());
//! let session = Device::new(driver.clone()).open()?;
//!
//! let edges = Arc::new(AtomicUsize::new(0));
//! let seen = Arc::clone(&edges);
//! session.register_interrupt(3, Trigger::RISING_EDGE, move |event| {
//!     assert_eq!(event.channel, 3);
//!     seen.fetch_add(1, Ordering::SeqCst);
//! })?;
//!
//! driver.set_digital_input(3, true);
//! session.unregister_interrupt(3)?;
//! driver.set_digital_input(3, false);
//! driver.set_digital_input(3, true);
//!
//! assert_eq!(edges.load(Ordering::SeqCst), 1);
//! # Ok::<(), ctr700::Error>(())
//! ```
//!
//! # Guarantees
//!
//! - Dispatch may run on a driver thread concurrently with registration.
//! - Once [`Device::unregister_interrupt`] returns, the handler it removed
//!   is never invoked again. It waits for a dispatch already inside the
//!   handler to finish.
//! - A panicking handler is caught at the dispatch boundary.
//!
//! Handlers may call channel operations on the device and register or
//! unregister other channels. They must not unregister their own channel,
//! nor open or release session references from inside the handler: those
//! wait for the running dispatch and would deadlock.

use crate::driver::InterruptSink;
use crate::error::{check, Error, Result, Subsystem};
use crate::session::Device;
use bitflags::bitflags;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, instrument, trace, warn};

bitflags! {
    /// Edges that raise an interrupt. Values match `tCtr700DrvInterruptTrigger`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Trigger: u32 {
        /// Low to high.
        const RISING_EDGE = 0x01;
        /// High to low.
        const FALLING_EDGE = 0x02;
        /// Any change.
        const BOTH_EDGES = Self::RISING_EDGE.bits() | Self::FALLING_EDGE.bits();
    }
}

/// One edge reported by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterruptEvent {
    /// Digital input channel.
    pub channel: u8,
    /// Raw input value after the edge.
    pub value: u8,
}

impl InterruptEvent {
    /// Check if the input is high after the edge.
    #[must_use]
    pub const fn is_high(&self) -> bool {
        self.value != 0
    }
}

type Handler = Box<dyn Fn(InterruptEvent) + Send + Sync>;

pub(crate) struct Slot {
    generation: u64,
    trigger: Trigger,
    handler: Handler,
    // Held for the whole handler call; cleared once the slot is retired.
    live: Mutex<bool>,
}

impl Slot {
    /// Wait out any dispatch inside the handler and stop further ones.
    ///
    /// Must be called without holding the registration lock or the
    /// lifecycle lock: the running handler may need either.
    pub(crate) fn retire(&self) {
        *self.live.lock() = false;
    }
}

/// Channel → handler table shared with the driver's dispatch path.
#[derive(Default)]
pub(crate) struct CallbackRegistry {
    slots: RwLock<HashMap<u8, Arc<Slot>>>,
    next_generation: AtomicU64,
    // Serialises register/unregister so the native and local tables agree.
    registration: Mutex<()>,
}

impl CallbackRegistry {
    fn insert(&self, channel: u8, trigger: Trigger, handler: Handler) -> Result<u64> {
        let mut slots = self.slots.write();
        if slots.contains_key(&channel) {
            return Err(Error::AlreadyRegistered { channel });
        }
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        slots.insert(
            channel,
            Arc::new(Slot {
                generation,
                trigger,
                handler,
                live: Mutex::new(true),
            }),
        );
        Ok(generation)
    }

    /// Take the channel's slot out of the table. New reports no longer find
    /// it, but a dispatch already inside the handler keeps running until the
    /// slot is retired.
    fn detach(&self, channel: u8) -> Option<Arc<Slot>> {
        self.slots.write().remove(&channel)
    }

    fn detach_all(&self) -> Vec<(u8, Arc<Slot>)> {
        let mut detached: Vec<_> = self.slots.write().drain().collect();
        detached.sort_unstable_by_key(|(channel, _)| *channel);
        detached
    }

    fn channels(&self) -> Vec<u8> {
        let mut channels: Vec<u8> = self.slots.read().keys().copied().collect();
        channels.sort_unstable();
        channels
    }

    fn trigger(&self, channel: u8) -> Option<Trigger> {
        self.slots.read().get(&channel).map(|slot| slot.trigger)
    }

    /// Route one report from the driver to the current handler.
    pub(crate) fn dispatch(&self, channel: u8, value: u8) {
        let Some(slot) = self.slots.read().get(&channel).cloned() else {
            trace!(channel, "interrupt for unregistered channel dropped");
            return;
        };
        let live = slot.live.lock();
        if !*live {
            trace!(channel, generation = slot.generation, "stale interrupt dropped");
            return;
        }
        let event = InterruptEvent { channel, value };
        if catch_unwind(AssertUnwindSafe(|| (slot.handler)(event))).is_err() {
            warn!(channel, generation = slot.generation, "interrupt handler panicked");
        }
        drop(live);
    }

    fn sink(self: &Arc<Self>) -> InterruptSink {
        let registry = Arc::downgrade(self);
        Arc::new(move |channel, value| {
            if let Some(registry) = registry.upgrade() {
                registry.dispatch(channel, value);
            }
        })
    }
}

impl Device {
    /// Register `handler` for edges on digital input `channel`.
    ///
    /// # Errors
    ///
    /// - [`Error::SessionInactive`] without an active session
    /// - [`Error::InvalidChannel`] if `channel` is not a digital input
    /// - [`Error::EmptyTrigger`] if `trigger` selects no edge
    /// - [`Error::AlreadyRegistered`] if the channel already has a handler,
    ///   which stays in place
    /// - the driver error if native registration fails
    #[instrument(level = "debug", skip(self, handler))]
    pub fn register_interrupt<F>(&self, channel: u8, trigger: Trigger, handler: F) -> Result<()>
    where
        F: Fn(InterruptEvent) + Send + Sync + 'static,
    {
        let _active = self.active()?;
        self.validate(Subsystem::DigitalIn, channel)?;
        if trigger.is_empty() {
            return Err(Error::EmptyTrigger { channel });
        }

        let registration = self.callbacks.registration.lock();
        // Local slot first, so an edge raised during registration finds it.
        let generation = self.callbacks.insert(channel, trigger, Box::new(handler))?;
        let sink = self.callbacks.sink();
        let code = self
            .driver()
            .register_interrupt_callback(channel, trigger.bits(), sink);
        if let Err(e) = check(code) {
            let slot = self.callbacks.detach(channel);
            drop(registration);
            if let Some(slot) = slot {
                slot.retire();
            }
            return Err(e);
        }
        debug!(channel, generation, "interrupt handler registered");
        Ok(())
    }

    /// Remove the handler of `channel` and stop the driver signalling it.
    ///
    /// The native unregister is issued even if no handler is registered
    /// locally. The local handler is removed even if the native call fails.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionInactive`], [`Error::InvalidChannel`], or the
    /// driver error of the native unregister.
    #[instrument(level = "debug", skip(self))]
    pub fn unregister_interrupt(&self, channel: u8) -> Result<()> {
        let _active = self.active()?;
        self.validate(Subsystem::DigitalIn, channel)?;

        let (slot, code) = {
            let _registration = self.callbacks.registration.lock();
            let slot = self.callbacks.detach(channel);
            (slot, self.driver().unregister_interrupt_callback(channel))
        };
        if let Some(slot) = slot {
            slot.retire();
            debug!(channel, generation = slot.generation, "interrupt handler unregistered");
        }
        check(code)
    }

    /// Check if `channel` has a registered handler.
    #[must_use]
    pub fn is_interrupt_registered(&self, channel: u8) -> bool {
        self.callbacks.trigger(channel).is_some()
    }

    /// Trigger mask of the handler registered on `channel`.
    #[must_use]
    pub fn interrupt_trigger(&self, channel: u8) -> Option<Trigger> {
        self.callbacks.trigger(channel)
    }

    /// Channels with a registered handler, ascending.
    #[must_use]
    pub fn registered_interrupts(&self) -> Vec<u8> {
        self.callbacks.channels()
    }

    /// Unregister every handler. Used on shutdown; failures are logged.
    pub(crate) fn unregister_all(&self) {
        for slot in self.detach_interrupts() {
            slot.retire();
        }
    }

    /// Remove every handler from the table and the driver without waiting
    /// for running dispatches. The caller retires the returned slots once it
    /// holds no lock a handler could need.
    pub(crate) fn detach_interrupts(&self) -> Vec<Arc<Slot>> {
        let _registration = self.callbacks.registration.lock();
        self.callbacks
            .detach_all()
            .into_iter()
            .map(|(channel, slot)| {
                if let Err(e) = check(self.driver().unregister_interrupt_callback(channel)) {
                    warn!(channel, error = %e, "unregister on shutdown failed");
                }
                slot
            })
            .collect()
    }
}
