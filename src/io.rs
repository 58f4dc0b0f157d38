//! Digital, relay, analog and temperature channels, plus the operator
//! controls on the front panel.
//!
//! Every channel accessor validates the channel number against the board's
//! [`HardwareInfo`](crate::HardwareInfo) before the foreign call is made.
//! Values are returned raw; converting analog samples to volts or
//! milliamperes is left to the caller. Temperatures come in 1/10000 °C and
//! [`raw_to_celsius`] converts them.

use crate::driver::RawDiagInfo;
use crate::error::{check, Result, Subsystem};
use crate::session::Device;
use std::fmt;
use tracing::instrument;

/// Raw temperature units per degree Celsius.
pub const TEMPERATURE_SCALE: f64 = 10_000.0;

/// Convert a raw temperature reading to degrees Celsius.
#[must_use]
pub fn raw_to_celsius(raw: i32) -> f64 {
    f64::from(raw) / TEMPERATURE_SCALE
}

/// Measurement mode of an analog input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AnalogMode {
    /// Voltage measurement.
    #[default]
    Voltage,
    /// Current measurement.
    Current,
}

impl AnalogMode {
    const fn raw(self) -> u8 {
        match self {
            Self::Voltage => 0,
            Self::Current => 1,
        }
    }
}

impl fmt::Display for AnalogMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Voltage => write!(f, "voltage"),
            Self::Current => write!(f, "current"),
        }
    }
}

/// Snapshot of the board's fault signals, as reported by the driver.
///
/// The flags keep the polarity of the hardware lines. Use
/// [`DiagInfo::is_healthy`] for a polarity-aware summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiagInfo {
    /// Power supply of the digital outputs missing (active high).
    pub digital_out_power_fail: bool,
    /// Digital output driver diagnostic line (active low).
    pub digital_out_diag: bool,
    /// Digital input error line (active low).
    pub digital_in_error: bool,
    /// USB over-current line (active low).
    pub usb_over_current: bool,
}

impl DiagInfo {
    /// Check that no fault line is asserted.
    #[must_use]
    pub const fn is_healthy(&self) -> bool {
        !self.digital_out_power_fail
            && self.digital_out_diag
            && self.digital_in_error
            && self.usb_over_current
    }
}

impl From<RawDiagInfo> for DiagInfo {
    fn from(raw: RawDiagInfo) -> Self {
        Self {
            digital_out_power_fail: raw.digi_out_power_fail != 0,
            digital_out_diag: raw.digi_out_diag != 0,
            digital_in_error: raw.digi_in_error != 0,
            usb_over_current: raw.usb_over_current != 0,
        }
    }
}

impl fmt::Display for DiagInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DO_PF: {}, /DO_DIAG: {}, /DI_ERR: {}, /USB_OC: {}",
            self.digital_out_power_fail,
            self.digital_out_diag,
            self.digital_in_error,
            self.usb_over_current
        )
    }
}

impl Device {
    /// Read digital input `channel`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionInactive`](crate::Error::SessionInactive),
    /// [`Error::InvalidChannel`](crate::Error::InvalidChannel) or the driver error.
    pub fn digital_in(&self, channel: u8) -> Result<bool> {
        let _active = self.active()?;
        self.validate(Subsystem::DigitalIn, channel)?;
        let mut state = 0;
        check(self.driver().get_digi_in(channel, &mut state))?;
        Ok(state != 0)
    }

    /// Drive digital output `channel`.
    ///
    /// # Errors
    ///
    /// Same as [`Device::digital_in`].
    pub fn set_digital_out(&self, channel: u8, on: bool) -> Result<()> {
        let _active = self.active()?;
        self.validate(Subsystem::DigitalOut, channel)?;
        check(self.driver().set_digi_out(channel, u8::from(on)))
    }

    /// Switch relay `channel`.
    ///
    /// # Errors
    ///
    /// Same as [`Device::digital_in`].
    pub fn set_relay(&self, channel: u8, on: bool) -> Result<()> {
        let _active = self.active()?;
        self.validate(Subsystem::Relay, channel)?;
        check(self.driver().set_relay(channel, u8::from(on)))
    }

    /// Select the measurement mode of analog input `channel`.
    ///
    /// # Errors
    ///
    /// Same as [`Device::digital_in`].
    #[instrument(level = "debug", skip(self))]
    pub fn set_analog_mode(&self, channel: u8, mode: AnalogMode) -> Result<()> {
        let _active = self.active()?;
        self.validate(Subsystem::AnalogIn, channel)?;
        check(self.driver().adc_set_mode(channel, mode.raw()))
    }

    /// Raw ADC sample of analog input `channel`.
    ///
    /// # Errors
    ///
    /// Same as [`Device::digital_in`].
    pub fn analog_in(&self, channel: u8) -> Result<u16> {
        let _active = self.active()?;
        self.validate(Subsystem::AnalogIn, channel)?;
        let mut value = 0;
        check(self.driver().adc_get_value(channel, &mut value))?;
        Ok(value)
    }

    /// Raw reading of temperature `sensor`, in 1/10000 °C.
    ///
    /// # Errors
    ///
    /// Same as [`Device::digital_in`].
    pub fn temperature_raw(&self, sensor: u8) -> Result<i32> {
        let _active = self.active()?;
        self.validate(Subsystem::Temperature, sensor)?;
        let mut value = 0;
        check(self.driver().tmp_get_value(sensor, &mut value))?;
        Ok(value)
    }

    /// Temperature of `sensor` in degrees Celsius.
    ///
    /// # Errors
    ///
    /// Same as [`Device::digital_in`].
    pub fn temperature(&self, sensor: u8) -> Result<f64> {
        self.temperature_raw(sensor).map(raw_to_celsius)
    }

    /// Switch the RUN LED.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionInactive`](crate::Error::SessionInactive) or
    /// the driver error.
    pub fn set_run_led(&self, on: bool) -> Result<()> {
        let _active = self.active()?;
        check(self.driver().set_run_led(u8::from(on)))
    }

    /// Switch the ERROR LED.
    ///
    /// # Errors
    ///
    /// Same as [`Device::set_run_led`].
    pub fn set_err_led(&self, on: bool) -> Result<()> {
        let _active = self.active()?;
        check(self.driver().set_err_led(u8::from(on)))
    }

    /// Position of the RUN/STOP switch; `true` means RUN.
    ///
    /// # Errors
    ///
    /// Same as [`Device::set_run_led`].
    pub fn run_switch(&self) -> Result<bool> {
        self.read_flag(|driver, state| driver.get_run_switch(state))
    }

    /// State of the configuration DIP switch.
    ///
    /// # Errors
    ///
    /// Same as [`Device::set_run_led`].
    pub fn config_enabled(&self) -> Result<bool> {
        self.read_flag(|driver, state| driver.get_config_enabled(state))
    }

    /// Check if the board reports a power failure.
    ///
    /// # Errors
    ///
    /// Same as [`Device::set_run_led`].
    pub fn power_fail(&self) -> Result<bool> {
        self.read_flag(|driver, state| driver.get_power_fail(state))
    }

    /// Fail line of the backplane bus.
    ///
    /// # Errors
    ///
    /// Same as [`Device::set_run_led`].
    pub fn ext_fail(&self) -> Result<bool> {
        self.read_flag(|driver, state| driver.get_ext_fail(state))
    }

    /// Drive the reset line of the backplane bus.
    ///
    /// # Errors
    ///
    /// Same as [`Device::set_run_led`].
    pub fn set_ext_reset(&self, enable: bool) -> Result<()> {
        let _active = self.active()?;
        check(self.driver().set_ext_reset(u8::from(enable)))
    }

    /// Current state of the fault signals. Not cached.
    ///
    /// # Errors
    ///
    /// Same as [`Device::set_run_led`].
    pub fn diag_info(&self) -> Result<DiagInfo> {
        let _active = self.active()?;
        let mut raw = RawDiagInfo::default();
        check(self.driver().get_diag_info(&mut raw))?;
        Ok(DiagInfo::from(raw))
    }

    fn read_flag(
        &self,
        query: impl FnOnce(&dyn crate::driver::NativeDriver, &mut u8) -> i32,
    ) -> Result<bool> {
        let _active = self.active()?;
        let mut state = 0;
        check(query(self.driver(), &mut state))?;
        Ok(state != 0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::{Error, ErrorKind};
    use crate::sim::SimulatedDriver;
    use std::sync::Arc;

    fn open() -> (Arc<SimulatedDriver>, crate::Session) {
        let driver = Arc::new(SimulatedDriver::new());
        let session = Device::new(driver.clone()).open().unwrap();
        (driver, session)
    }

    #[test]
    fn test_raw_to_celsius() {
        assert!((raw_to_celsius(1_234_560) - 123.456).abs() < 1e-9);
        assert!((raw_to_celsius(-52_500) + 5.25).abs() < 1e-9);
        assert!(raw_to_celsius(0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_digital_roundtrip_through_driver() {
        let (driver, session) = open();
        driver.set_digital_input(3, true);
        assert!(session.digital_in(3).unwrap());
        session.set_digital_out(1, true).unwrap();
        assert!(driver.digital_output(1));
        session.set_relay(0, true).unwrap();
        assert!(driver.relay(0));
    }

    #[test]
    fn test_out_of_range_channels() {
        let (driver, session) = open();
        let info = session.hardware_info().unwrap();
        let di = u8::try_from(info.digital_in).unwrap();
        let relay = u8::try_from(info.relay).unwrap();
        assert!(matches!(
            session.digital_in(di),
            Err(Error::InvalidChannel {
                subsystem: Subsystem::DigitalIn,
                ..
            })
        ));
        assert!(session.set_relay(relay, true).is_err());
        assert!(session.analog_in(200).is_err());
        assert!(session.temperature(9).is_err());
        assert_eq!(driver.call_count("get_digi_in"), 0);
        assert_eq!(driver.call_count("set_relay"), 0);
        assert_eq!(driver.call_count("adc_get_value"), 0);
        assert_eq!(driver.call_count("tmp_get_value"), 0);
    }

    #[test]
    fn test_analog() {
        let (driver, session) = open();
        session.set_analog_mode(1, AnalogMode::Current).unwrap();
        assert_eq!(driver.analog_mode(1), Some(1));
        driver.set_analog_input(1, 0x7fff);
        assert_eq!(session.analog_in(1).unwrap(), 0x7fff);
    }

    #[test]
    fn test_temperature_conversion() {
        let (driver, session) = open();
        driver.set_temperature(1, 1_234_560);
        assert_eq!(session.temperature_raw(1).unwrap(), 1_234_560);
        assert!((session.temperature(1).unwrap() - 123.456).abs() < 1e-9);
    }

    #[test]
    fn test_operator_controls() {
        let (driver, session) = open();
        session.set_run_led(true).unwrap();
        session.set_err_led(false).unwrap();
        assert!(driver.run_led());
        assert!(!driver.err_led());
        driver.set_run_switch(true);
        assert!(session.run_switch().unwrap());
        assert!(!session.config_enabled().unwrap());
        assert!(!session.power_fail().unwrap());
        assert!(!session.ext_fail().unwrap());
        session.set_ext_reset(true).unwrap();
        assert_eq!(driver.call_count("set_ext_reset"), 1);
    }

    #[test]
    fn test_diag_info_not_cached() {
        let (driver, session) = open();
        assert!(session.diag_info().unwrap().is_healthy());
        driver.set_diag_info(RawDiagInfo {
            digi_out_power_fail: 1,
            digi_out_diag: 1,
            digi_in_error: 1,
            usb_over_current: 1,
        });
        let diag = session.diag_info().unwrap();
        assert!(diag.digital_out_power_fail);
        assert!(!diag.is_healthy());
        assert_eq!(driver.call_count("get_diag_info"), 2);
    }

    #[test]
    fn test_diag_display() {
        let diag = DiagInfo::from(RawDiagInfo::default());
        assert_eq!(
            diag.to_string(),
            "DO_PF: false, /DO_DIAG: false, /DI_ERR: false, /USB_OC: false"
        );
    }

    #[test]
    fn test_driver_error_propagates() {
        let (driver, session) = open();
        driver.fail_next("get_digi_in", 0xf7);
        let err = session.digital_in(0).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::DeviceAccessFailed));
        assert!(!err.is_contract_violation());
    }

    #[test]
    fn test_inactive_session() {
        let driver = Arc::new(SimulatedDriver::new());
        let device = Device::new(driver.clone());
        assert_eq!(device.digital_in(0), Err(Error::SessionInactive));
        assert_eq!(device.set_run_led(true), Err(Error::SessionInactive));
        assert!(driver.calls().is_empty());
    }
}
