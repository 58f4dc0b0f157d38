//! PWM and PTO outputs.
//!
//! Both share the same channels and time base. Each channel moves through
//! a small state machine:
//!
//! ```text
//! Unconfigured --set_timebase + set_param--> Configured --enable--> Running
//!       ^                                        ^                    |
//!       +--------------- shutdown ---------------+------ disable -----+
//! ```
//!
//! Setting the parameters of the other mode switches the channel over, so a
//! channel is always either a PWM or a PTO output. Enabling a channel that
//! is not configured for the requested mode is rejected before the driver
//! sees it.
//!
//! ```
//! use ctr700::pwm::{PwmConfig, PwmTimebase};
//! use ctr700::sim::SimulatedDriver;
//! use ctr700::Device;
//! use std::sync::Arc;
//!
//! let session = Device::new(Arc::new(SimulatedDriver::new())).open()?;
//! assert!(session.pwm_enable(0, true).is_err());
//! session.pwm_configure(0, PwmConfig::new(PwmTimebase::Ms1, 1000, 250))?;
//! session.pwm_enable(0, true)?;
//! # Ok::<(), ctr700::Error>(())
//! ```

use crate::error::{check, Error, Result, Subsystem};
use crate::session::Device;
use std::fmt;
use tracing::{debug, instrument, trace};

/// Tick length of a PWM/PTO channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PwmTimebase {
    /// 800 nanoseconds per tick.
    Ns800,
    /// 1 millisecond per tick.
    Ms1,
}

impl PwmTimebase {
    const fn raw(self) -> u8 {
        match self {
            Self::Ns800 => 1,
            Self::Ms1 => 2,
        }
    }

    /// Length of one tick in nanoseconds.
    #[must_use]
    pub const fn tick_nanos(self) -> u64 {
        match self {
            Self::Ns800 => 800,
            Self::Ms1 => 1_000_000,
        }
    }
}

impl fmt::Display for PwmTimebase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ns800 => write!(f, "800ns"),
            Self::Ms1 => write!(f, "1ms"),
        }
    }
}

/// Parameters of a PWM output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PwmConfig {
    /// Tick length.
    pub timebase: PwmTimebase,
    /// Period in ticks.
    pub period: u16,
    /// High time in ticks, at most `period`.
    pub pulse_len: u16,
}

impl PwmConfig {
    /// Create a PWM configuration.
    #[must_use]
    pub const fn new(timebase: PwmTimebase, period: u16, pulse_len: u16) -> Self {
        Self {
            timebase,
            period,
            pulse_len,
        }
    }

    /// Check the parameters without touching the hardware.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] if the period is zero or the pulse
    /// is longer than the period.
    pub fn validate(&self) -> Result<()> {
        validate_pwm(self.period, self.pulse_len)
    }

    /// Fraction of the period the output is high.
    #[must_use]
    pub fn duty_cycle(&self) -> f64 {
        if self.period == 0 {
            return 0.0;
        }
        f64::from(self.pulse_len) / f64::from(self.period)
    }
}

/// Parameters of one PTO table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PtoConfig {
    /// Tick length.
    pub timebase: PwmTimebase,
    /// Initial period in ticks.
    pub period: u16,
    /// Change of the period after each pulse.
    pub delta: i16,
    /// Number of pulses to emit.
    pub pulse_count: u32,
}

impl PtoConfig {
    /// A single pulse at a constant period.
    #[must_use]
    pub const fn new(timebase: PwmTimebase, period: u16) -> Self {
        Self {
            timebase,
            period,
            delta: 0,
            pulse_count: 1,
        }
    }

    /// Set the period change per pulse.
    #[must_use]
    pub const fn with_delta(mut self, delta: i16) -> Self {
        self.delta = delta;
        self
    }

    /// Set the number of pulses.
    #[must_use]
    pub const fn with_pulse_count(mut self, pulse_count: u32) -> Self {
        self.pulse_count = pulse_count;
        self
    }

    /// Check the parameters without touching the hardware.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] if the period is zero.
    pub fn validate(&self) -> Result<()> {
        validate_pto(self.period)
    }
}

fn validate_pwm(period: u16, pulse_len: u16) -> Result<()> {
    if period == 0 {
        return Err(Error::invalid_parameter("PWM period must be non-zero"));
    }
    if pulse_len > period {
        return Err(Error::invalid_parameter(format!(
            "pulse length {pulse_len} exceeds period {period}"
        )));
    }
    Ok(())
}

fn validate_pto(period: u16) -> Result<()> {
    if period == 0 {
        return Err(Error::invalid_parameter("PTO period must be non-zero"));
    }
    Ok(())
}

/// Output mode of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputMode {
    /// Continuous pulse width modulation.
    Pwm,
    /// Pulse train from the parameter table.
    Pto,
}

/// Where a channel is in its setup sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PwmPhase {
    /// Time base or parameters missing.
    Unconfigured,
    /// Ready to be enabled in the given mode.
    Configured(OutputMode),
    /// Running in the given mode.
    Running(OutputMode),
}

/// Per-channel bookkeeping kept by the device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct PwmState {
    timebase: Option<PwmTimebase>,
    mode: Option<OutputMode>,
    running: bool,
}

impl PwmState {
    const fn phase(&self) -> PwmPhase {
        match (self.timebase, self.mode, self.running) {
            (Some(_), Some(mode), true) => PwmPhase::Running(mode),
            (Some(_), Some(mode), false) => PwmPhase::Configured(mode),
            _ => PwmPhase::Unconfigured,
        }
    }

    /// Refuse to reprogram a channel that runs in the other mode.
    fn check_switch(&self, channel: u8, target: OutputMode) -> Result<()> {
        match self.mode {
            Some(mode) if self.running && mode != target => Err(Error::invalid_parameter(
                format!("channel {channel} is running as {mode:?}, disable it first"),
            )),
            _ => Ok(()),
        }
    }

    /// Track an accepted enable or disable sent in `target` mode. Stopping
    /// the other mode's generator leaves a running channel running.
    fn switch(&mut self, target: OutputMode, run: bool) {
        if self.mode == Some(target) {
            self.running = run;
        }
    }

    fn check_ready(&self, channel: u8, target: OutputMode) -> Result<()> {
        if self.timebase.is_some() && self.mode == Some(target) {
            Ok(())
        } else {
            Err(Error::not_configured(Subsystem::Pwm, channel))
        }
    }
}

impl Device {
    /// Select the time base of PWM/PTO `channel`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionInactive`], [`Error::InvalidChannel`] or the
    /// driver error.
    #[instrument(level = "debug", skip(self))]
    pub fn pwm_set_timebase(&self, channel: u8, timebase: PwmTimebase) -> Result<()> {
        let _active = self.active()?;
        self.validate(Subsystem::Pwm, channel)?;

        let mut channels = self.pwm.lock();
        check(self.driver().pwm_set_time_base(channel, timebase.raw()))?;
        channels.entry(channel).or_default().timebase = Some(timebase);
        Ok(())
    }

    /// Set period and pulse length of PWM `channel`, in time base ticks.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] for a zero period, a pulse longer
    /// than the period, or a channel running as PTO; otherwise as
    /// [`Device::pwm_set_timebase`].
    #[instrument(level = "debug", skip(self))]
    pub fn pwm_set_param(&self, channel: u8, period: u16, pulse_len: u16) -> Result<()> {
        let _active = self.active()?;
        self.validate(Subsystem::Pwm, channel)?;
        validate_pwm(period, pulse_len)?;

        let mut channels = self.pwm.lock();
        let state = channels.entry(channel).or_default();
        state.check_switch(channel, OutputMode::Pwm)?;
        check(self.driver().pwm_set_param(channel, period, pulse_len))?;
        state.mode = Some(OutputMode::Pwm);
        Ok(())
    }

    /// Apply a complete [`PwmConfig`] to `channel`.
    ///
    /// # Errors
    ///
    /// As [`Device::pwm_set_param`]. Nothing is sent if validation fails.
    pub fn pwm_configure(&self, channel: u8, config: PwmConfig) -> Result<()> {
        config.validate()?;
        self.pwm_set_timebase(channel, config.timebase)?;
        self.pwm_set_param(channel, config.period, config.pulse_len)
    }

    /// Start or stop PWM `channel`.
    ///
    /// Enabling a running channel does nothing. Disabling is always sent to
    /// the driver, but only marks the channel stopped if it runs as PWM.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConfigured`] when enabling a channel whose time
    /// base or PWM parameters are missing; otherwise as
    /// [`Device::pwm_set_timebase`].
    #[instrument(level = "debug", skip(self))]
    pub fn pwm_enable(&self, channel: u8, run: bool) -> Result<()> {
        let _active = self.active()?;
        self.validate(Subsystem::Pwm, channel)?;

        let mut channels = self.pwm.lock();
        let state = channels.entry(channel).or_default();
        if run {
            state.check_ready(channel, OutputMode::Pwm)?;
            if state.running {
                trace!(channel, "PWM already running");
                return Ok(());
            }
        }
        check(self.driver().pwm_enable(channel, u8::from(run)))?;
        state.switch(OutputMode::Pwm, run);
        debug!(channel, phase = ?state.phase(), "PWM switched");
        Ok(())
    }

    /// Append a PTO table entry for `channel`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] for a zero period or a channel
    /// running as PWM, the driver's
    /// [`ErrorKind::ResourceExhausted`](crate::ErrorKind::ResourceExhausted)
    /// when the table is full; otherwise as [`Device::pwm_set_timebase`].
    #[instrument(level = "debug", skip(self))]
    pub fn pto_set_param(
        &self,
        channel: u8,
        period: u16,
        delta: i16,
        pulse_count: u32,
    ) -> Result<()> {
        let _active = self.active()?;
        self.validate(Subsystem::Pwm, channel)?;
        validate_pto(period)?;

        let mut channels = self.pwm.lock();
        let state = channels.entry(channel).or_default();
        state.check_switch(channel, OutputMode::Pto)?;
        check(
            self.driver()
                .pto_set_param(channel, period, delta, pulse_count),
        )?;
        state.mode = Some(OutputMode::Pto);
        Ok(())
    }

    /// Apply a complete [`PtoConfig`] to `channel`.
    ///
    /// # Errors
    ///
    /// As [`Device::pto_set_param`]. Nothing is sent if validation fails.
    pub fn pto_configure(&self, channel: u8, config: PtoConfig) -> Result<()> {
        config.validate()?;
        self.pwm_set_timebase(channel, config.timebase)?;
        self.pto_set_param(channel, config.period, config.delta, config.pulse_count)
    }

    /// Start or stop the pulse train on `channel`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConfigured`] when enabling a channel without a
    /// time base or PTO parameters; otherwise as
    /// [`Device::pwm_set_timebase`].
    #[instrument(level = "debug", skip(self))]
    pub fn pto_enable(&self, channel: u8, run: bool) -> Result<()> {
        let _active = self.active()?;
        self.validate(Subsystem::Pwm, channel)?;

        let mut channels = self.pwm.lock();
        let state = channels.entry(channel).or_default();
        if run {
            state.check_ready(channel, OutputMode::Pto)?;
        }
        check(self.driver().pto_enable(channel, u8::from(run)))?;
        state.switch(OutputMode::Pto, run);
        debug!(channel, phase = ?state.phase(), "PTO switched");
        Ok(())
    }

    /// Whether the pulse train on `channel` is still running.
    ///
    /// # Errors
    ///
    /// As [`Device::pwm_set_timebase`].
    pub fn pto_state(&self, channel: u8) -> Result<bool> {
        let _active = self.active()?;
        self.validate(Subsystem::Pwm, channel)?;

        let mut channels = self.pwm.lock();
        let mut run = 0;
        check(self.driver().pto_get_state(channel, &mut run))?;
        let running = run != 0;
        if let Some(state) = channels.get_mut(&channel) {
            if state.mode == Some(OutputMode::Pto) {
                state.running = running;
            }
        }
        Ok(running)
    }

    /// Setup phase of PWM/PTO `channel` in this session.
    #[must_use]
    pub fn pwm_phase(&self, channel: u8) -> PwmPhase {
        self.pwm
            .lock()
            .get(&channel)
            .map_or(PwmPhase::Unconfigured, PwmState::phase)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::sim::{SimulatedDriver, PTO_TABLE_CAPACITY};
    use std::sync::Arc;

    fn open() -> (Arc<SimulatedDriver>, crate::Session) {
        let driver = Arc::new(SimulatedDriver::new());
        let session = Device::new(driver.clone()).open().unwrap();
        (driver, session)
    }

    #[test]
    fn test_config_validation() {
        assert!(PwmConfig::new(PwmTimebase::Ms1, 100, 100).validate().is_ok());
        assert!(PwmConfig::new(PwmTimebase::Ms1, 100, 101).validate().is_err());
        assert!(PwmConfig::new(PwmTimebase::Ns800, 0, 0).validate().is_err());
        assert!(PtoConfig::new(PwmTimebase::Ms1, 0).validate().is_err());
        let pto = PtoConfig::new(PwmTimebase::Ns800, 500)
            .with_delta(-5)
            .with_pulse_count(20);
        assert!(pto.validate().is_ok());
        assert_eq!((pto.delta, pto.pulse_count), (-5, 20));
    }

    #[test]
    fn test_duty_cycle_and_timebase() {
        let config = PwmConfig::new(PwmTimebase::Ms1, 1000, 250);
        assert!((config.duty_cycle() - 0.25).abs() < f64::EPSILON);
        assert_eq!(PwmTimebase::Ns800.tick_nanos(), 800);
        assert_eq!(PwmTimebase::Ms1.to_string(), "1ms");
    }

    #[test]
    fn test_enable_before_configuration() {
        let (driver, session) = open();
        let err = session.pwm_enable(0, true).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::InvalidParameter));
        assert!(err.is_contract_violation());

        session.pwm_set_timebase(0, PwmTimebase::Ms1).unwrap();
        assert!(session.pwm_enable(0, true).is_err());
        assert_eq!(driver.call_count("pwm_enable"), 0);

        session.pwm_set_param(0, 1000, 500).unwrap();
        assert_eq!(session.pwm_phase(0), PwmPhase::Configured(OutputMode::Pwm));
        session.pwm_enable(0, true).unwrap();
        session.pwm_enable(0, true).unwrap();
        assert_eq!(driver.call_count("pwm_enable"), 1);
        assert_eq!(session.pwm_phase(0), PwmPhase::Running(OutputMode::Pwm));
        assert!(driver.pwm_running(0));
    }

    #[test]
    fn test_disable_always_forwarded() {
        let (driver, session) = open();
        session.pwm_enable(1, false).unwrap();
        session.pwm_enable(1, false).unwrap();
        assert_eq!(driver.call_count("pwm_enable"), 2);
        assert_eq!(session.pwm_phase(1), PwmPhase::Unconfigured);
    }

    #[test]
    fn test_invalid_param_sends_nothing() {
        let (driver, session) = open();
        let err = session.pwm_set_param(0, 10, 11).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { .. }));
        assert!(session
            .pwm_configure(0, PwmConfig::new(PwmTimebase::Ms1, 0, 0))
            .is_err());
        assert_eq!(driver.call_count("pwm_set_param"), 0);
        assert_eq!(driver.call_count("pwm_set_time_base"), 0);
    }

    #[test]
    fn test_configure_writes_driver() {
        let (driver, session) = open();
        session
            .pwm_configure(1, PwmConfig::new(PwmTimebase::Ns800, 1250, 625))
            .unwrap();
        assert_eq!(driver.pwm_time_base(1), Some(1));
        assert_eq!(driver.pwm_param(1), Some((1250, 625)));
    }

    #[test]
    fn test_pto_lifecycle() {
        let (driver, session) = open();
        assert!(session.pto_enable(0, true).is_err());
        session
            .pto_configure(0, PtoConfig::new(PwmTimebase::Ms1, 100).with_pulse_count(5))
            .unwrap();
        session.pto_enable(0, true).unwrap();
        assert!(session.pto_state(0).unwrap());
        assert_eq!(session.pwm_phase(0), PwmPhase::Running(OutputMode::Pto));

        driver.finish_pto(0);
        assert!(!session.pto_state(0).unwrap());
        assert_eq!(session.pwm_phase(0), PwmPhase::Configured(OutputMode::Pto));
    }

    #[test]
    fn test_mode_switch() {
        let (_driver, session) = open();
        session
            .pwm_configure(0, PwmConfig::new(PwmTimebase::Ms1, 100, 50))
            .unwrap();
        session.pwm_enable(0, true).unwrap();
        // Cannot load a pulse train while PWM is running.
        assert!(session.pto_set_param(0, 100, 0, 1).is_err());

        session.pwm_enable(0, false).unwrap();
        session.pto_set_param(0, 100, 0, 1).unwrap();
        assert_eq!(session.pwm_phase(0), PwmPhase::Configured(OutputMode::Pto));
        assert!(session.pwm_enable(0, true).is_err());
    }

    #[test]
    fn test_disable_in_other_mode_keeps_running() {
        let (driver, session) = open();
        session
            .pwm_configure(0, PwmConfig::new(PwmTimebase::Ms1, 100, 50))
            .unwrap();
        session.pwm_enable(0, true).unwrap();

        // Forwarded, but the PWM generator is untouched.
        session.pto_enable(0, false).unwrap();
        assert_eq!(driver.call_count("pto_enable"), 1);
        assert!(driver.pwm_running(0));
        assert_eq!(session.pwm_phase(0), PwmPhase::Running(OutputMode::Pwm));
        assert!(session.pto_set_param(0, 100, 0, 1).is_err());

        session.pwm_enable(0, false).unwrap();
        assert_eq!(session.pwm_phase(0), PwmPhase::Configured(OutputMode::Pwm));
    }

    #[test]
    fn test_pwm_disable_keeps_pulse_train_running() {
        let (_driver, session) = open();
        session
            .pto_configure(1, PtoConfig::new(PwmTimebase::Ns800, 200).with_pulse_count(50))
            .unwrap();
        session.pto_enable(1, true).unwrap();
        session.pwm_enable(1, false).unwrap();
        assert_eq!(session.pwm_phase(1), PwmPhase::Running(OutputMode::Pto));
        assert!(session.pwm_set_param(1, 100, 50).is_err());
    }

    #[test]
    fn test_out_of_range_channel_sends_nothing() {
        let (driver, session) = open();
        let count = session.hardware_info().unwrap().pwm;
        let channel = u8::try_from(count).unwrap();
        let expected = Error::invalid_channel(Subsystem::Pwm, channel, count);
        assert_eq!(session.pwm_set_timebase(channel, PwmTimebase::Ms1), Err(expected.clone()));
        assert_eq!(session.pwm_set_param(channel, 100, 50), Err(expected.clone()));
        assert_eq!(session.pwm_enable(channel, false), Err(expected.clone()));
        assert_eq!(session.pto_set_param(channel, 100, 0, 1), Err(expected.clone()));
        assert_eq!(session.pto_enable(channel, false), Err(expected.clone()));
        assert_eq!(session.pto_state(channel), Err(expected));
        assert!(driver
            .calls()
            .iter()
            .all(|c| !c.starts_with("pwm_") && !c.starts_with("pto_")));
    }

    #[test]
    fn test_pto_table_exhaustion() {
        let (_driver, session) = open();
        session.pwm_set_timebase(0, PwmTimebase::Ms1).unwrap();
        for _ in 0..PTO_TABLE_CAPACITY {
            session.pto_set_param(0, 100, 1, 10).unwrap();
        }
        let err = session.pto_set_param(0, 100, 1, 10).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::ResourceExhausted));
    }

    #[test]
    fn test_state_cleared_on_shutdown() {
        let device = Device::new(Arc::new(SimulatedDriver::new()));
        let session = device.open().unwrap();
        session
            .pwm_configure(0, PwmConfig::new(PwmTimebase::Ms1, 100, 50))
            .unwrap();
        session.close().unwrap();

        let session = device.open().unwrap();
        assert_eq!(session.pwm_phase(0), PwmPhase::Unconfigured);
    }
}
