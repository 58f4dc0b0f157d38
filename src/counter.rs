//! Counter and A/B decoder channels.
//!
//! A counter must be given a mode with [`Device::counter_set_mode`] before
//! it can be enabled. The configuration is remembered per channel for the
//! lifetime of the session.

use crate::error::{check, Error, Result, Subsystem};
use crate::session::Device;
use std::fmt;
use tracing::{debug, instrument};

/// What a counter channel counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CounterMode {
    /// Count edges on the input.
    #[default]
    Counter,
    /// Decode a quadrature A/B signal.
    AbDecoder,
}

/// Edge that advances the counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CounterTrigger {
    /// Low to high.
    #[default]
    RisingEdge,
    /// High to low.
    FallingEdge,
    /// Any change.
    AnyEdge,
}

/// Counting direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CounterDirection {
    /// Increment on each trigger.
    #[default]
    Up,
    /// Decrement on each trigger.
    Down,
}

impl CounterMode {
    const fn raw(self) -> u8 {
        match self {
            Self::Counter => 0,
            Self::AbDecoder => 1,
        }
    }
}

impl CounterTrigger {
    const fn raw(self) -> u8 {
        match self {
            Self::RisingEdge => 0,
            Self::FallingEdge => 1,
            Self::AnyEdge => 2,
        }
    }
}

impl CounterDirection {
    const fn raw(self) -> u8 {
        match self {
            Self::Up => 0,
            Self::Down => 1,
        }
    }
}

/// Counter channel configuration.
///
/// ```
/// use ctr700::counter::{CounterConfig, CounterDirection, CounterMode, CounterTrigger};
///
/// let config = CounterConfig::new(CounterMode::Counter)
///     .with_trigger(CounterTrigger::FallingEdge)
///     .with_direction(CounterDirection::Down);
/// assert_eq!(config.trigger, CounterTrigger::FallingEdge);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CounterConfig {
    /// Counting mode.
    pub mode: CounterMode,
    /// Advancing edge.
    pub trigger: CounterTrigger,
    /// Direction.
    pub direction: CounterDirection,
}

impl CounterConfig {
    /// Configuration for `mode`, counting up on rising edges.
    #[must_use]
    pub const fn new(mode: CounterMode) -> Self {
        Self {
            mode,
            trigger: CounterTrigger::RisingEdge,
            direction: CounterDirection::Up,
        }
    }

    /// Set the advancing edge.
    #[must_use]
    pub const fn with_trigger(mut self, trigger: CounterTrigger) -> Self {
        self.trigger = trigger;
        self
    }

    /// Set the direction.
    #[must_use]
    pub const fn with_direction(mut self, direction: CounterDirection) -> Self {
        self.direction = direction;
        self
    }
}

impl fmt::Display for CounterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}/{:?}/{:?}", self.mode, self.trigger, self.direction)
    }
}

/// Per-channel bookkeeping kept by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CounterState {
    pub(crate) config: CounterConfig,
    pub(crate) enabled: bool,
}

impl Device {
    /// Configure counter `channel`.
    ///
    /// [`CounterMode::AbDecoder`] additionally requires `channel` to be a
    /// valid encoder channel.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionInactive`], [`Error::InvalidChannel`] or the
    /// driver error.
    #[instrument(level = "debug", skip(self))]
    pub fn counter_set_mode(&self, channel: u8, config: CounterConfig) -> Result<()> {
        let _active = self.active()?;
        self.validate(Subsystem::Counter, channel)?;
        if config.mode == CounterMode::AbDecoder {
            self.validate(Subsystem::Encoder, channel)?;
        }

        let mut counters = self.counters.lock();
        check(self.driver().cnt_set_mode(
            channel,
            config.mode.raw(),
            config.trigger.raw(),
            config.direction.raw(),
        ))?;
        let enabled = counters.get(&channel).is_some_and(|state| state.enabled);
        counters.insert(channel, CounterState { config, enabled });
        debug!(channel, %config, "counter configured");
        Ok(())
    }

    /// Start or stop counter `channel`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConfigured`] when enabling a channel that has no
    /// mode yet; otherwise as [`Device::counter_set_mode`]. Disabling is
    /// always forwarded.
    #[instrument(level = "debug", skip(self))]
    pub fn counter_enable(&self, channel: u8, enable: bool) -> Result<()> {
        let _active = self.active()?;
        self.validate(Subsystem::Counter, channel)?;

        let mut counters = self.counters.lock();
        if enable && !counters.contains_key(&channel) {
            return Err(Error::not_configured(Subsystem::Counter, channel));
        }
        check(self.driver().cnt_enable(channel, u8::from(enable)))?;
        if let Some(state) = counters.get_mut(&channel) {
            state.enabled = enable;
        }
        Ok(())
    }

    /// Load `preload` into counter `channel`.
    ///
    /// # Errors
    ///
    /// As [`Device::counter_set_mode`].
    pub fn counter_set_preload(&self, channel: u8, preload: i32) -> Result<()> {
        let _active = self.active()?;
        self.validate(Subsystem::Counter, channel)?;
        check(self.driver().cnt_set_preload(channel, preload))
    }

    /// Current value of counter `channel`.
    ///
    /// # Errors
    ///
    /// As [`Device::counter_set_mode`].
    pub fn counter_value(&self, channel: u8) -> Result<i32> {
        let _active = self.active()?;
        self.validate(Subsystem::Counter, channel)?;
        let mut value = 0;
        check(self.driver().cnt_get_value(channel, &mut value))?;
        Ok(value)
    }

    /// Configuration last applied to counter `channel` in this session.
    #[must_use]
    pub fn counter_config(&self, channel: u8) -> Option<CounterConfig> {
        self.counters.lock().get(&channel).map(|state| state.config)
    }

    /// Whether counter `channel` was enabled in this session.
    #[must_use]
    pub fn counter_enabled(&self, channel: u8) -> bool {
        self.counters
            .lock()
            .get(&channel)
            .is_some_and(|state| state.enabled)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::driver::RawHwInfo;
    use crate::error::ErrorKind;
    use crate::sim::SimulatedDriver;
    use std::sync::Arc;

    fn open() -> (Arc<SimulatedDriver>, crate::Session) {
        let driver = Arc::new(SimulatedDriver::new());
        let session = Device::new(driver.clone()).open().unwrap();
        (driver, session)
    }

    #[test]
    fn test_config_builder_defaults() {
        let config = CounterConfig::new(CounterMode::AbDecoder);
        assert_eq!(config.trigger, CounterTrigger::RisingEdge);
        assert_eq!(config.direction, CounterDirection::Up);
        assert_eq!(config.to_string(), "AbDecoder/RisingEdge/Up");
    }

    #[test]
    fn test_counter_scenario() {
        let (driver, session) = open();
        session
            .counter_set_mode(0, CounterConfig::new(CounterMode::Counter))
            .unwrap();
        session.counter_enable(0, true).unwrap();
        driver.set_counter_value(0, 42);
        assert_eq!(session.counter_value(0).unwrap(), 42);
        assert_eq!(driver.counter_mode(0), Some((0, 0, 0)));
        assert!(driver.counter_enabled(0));
        assert!(session.counter_enabled(0));
    }

    #[test]
    fn test_raw_encoding() {
        let (driver, session) = open();
        let config = CounterConfig::new(CounterMode::AbDecoder)
            .with_trigger(CounterTrigger::AnyEdge)
            .with_direction(CounterDirection::Down);
        session.counter_set_mode(0, config).unwrap();
        assert_eq!(driver.counter_mode(0), Some((1, 2, 1)));
        assert_eq!(session.counter_config(0), Some(config));
    }

    #[test]
    fn test_enable_requires_mode() {
        let (driver, session) = open();
        let err = session.counter_enable(0, true).unwrap_err();
        assert_eq!(err, Error::not_configured(Subsystem::Counter, 0));
        assert_eq!(err.kind(), Some(ErrorKind::InvalidParameter));
        assert_eq!(driver.call_count("cnt_enable"), 0);
    }

    #[test]
    fn test_disable_always_allowed() {
        let (driver, session) = open();
        session.counter_enable(0, false).unwrap();
        assert_eq!(driver.call_count("cnt_enable"), 1);
    }

    #[test]
    fn test_decoder_needs_encoder_channel() {
        let driver = Arc::new(SimulatedDriver::new());
        driver.set_hardware_info(RawHwInfo {
            cnt_channels: 2,
            enc_channels: 1,
            ..SimulatedDriver::CTR700_LAYOUT
        });
        let session = Device::new(driver.clone()).open().unwrap();
        session
            .counter_set_mode(1, CounterConfig::new(CounterMode::Counter))
            .unwrap();
        let err = session
            .counter_set_mode(1, CounterConfig::new(CounterMode::AbDecoder))
            .unwrap_err();
        assert_eq!(err, Error::invalid_channel(Subsystem::Encoder, 1, 1));
        assert_eq!(driver.call_count("cnt_set_mode"), 1);
    }

    #[test]
    fn test_preload_and_failed_mode() {
        let (driver, session) = open();
        session.counter_set_preload(0, -17).unwrap();
        assert_eq!(session.counter_value(0).unwrap(), -17);

        driver.fail_next("cnt_set_mode", 0xfb);
        let err = session
            .counter_set_mode(0, CounterConfig::default())
            .unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::InvalidMode));
        assert_eq!(session.counter_config(0), None);
    }

    #[test]
    fn test_state_cleared_on_shutdown() {
        let driver = Arc::new(SimulatedDriver::new());
        let device = Device::new(driver);
        let session = device.open().unwrap();
        session
            .counter_set_mode(0, CounterConfig::default())
            .unwrap();
        session.close().unwrap();

        let session = device.open().unwrap();
        assert_eq!(session.counter_config(0), None);
        assert!(session.counter_enable(0, true).is_err());
    }

    #[test]
    fn test_out_of_range_counter() {
        let (driver, session) = open();
        assert!(session.counter_value(1).is_err());
        assert_eq!(driver.call_count("cnt_get_value"), 0);
    }
}
