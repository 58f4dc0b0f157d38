//! Error types for the CTR-700 binding layer.
//!
//! Two families of failure are kept apart:
//!
//! - **Driver errors**: the native driver returned a non-success status code.
//!   The code is classified by [`classify`] into an [`ErrorKind`] and carried
//!   in [`Error::Driver`] together with the raw value.
//! - **Contract violations**: misuse detected inside the binding layer before
//!   any foreign call is made (inactive session, double registration, enabling
//!   an output that was never configured, ...). These never carry a native code.
//!
//! Bad channel numbers and out-of-domain parameters are also rejected locally,
//! but they map onto the same [`ErrorKind`] the driver would have reported.

use std::fmt;
use thiserror::Error;

/// Status codes returned by every foreign call of `libctr700drv`.
///
/// The set is closed; any other value is surfaced as [`ErrorKind::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ResultCode {
    /// The call succeeded.
    Success = 0x00,
    /// Generic error.
    Error = 0xff,
    /// The functionality is not implemented by the library.
    NotImplemented = 0xfe,
    /// A parameter is invalid (out of range, null pointer).
    InvalidParameter = 0xfd,
    /// The channel number is invalid.
    InvalidChannel = 0xfc,
    /// The mode is invalid.
    InvalidMode = 0xfb,
    /// The timebase is invalid.
    InvalidTimebase = 0xfa,
    /// The PTO delta parameter is invalid.
    InvalidDelta = 0xf9,
    /// The PTO parameter table is completely filled.
    PtoParamTabFull = 0xf8,
    /// Access to the device or peripheral failed.
    DevAccessFailed = 0xf7,
    /// Process image configuration is invalid.
    InvalidProcImgCfg = 0xf6,
    /// Process image configuration is unknown.
    ProcImgCfgUnknown = 0xf5,
    /// Shared process image error.
    ShpImgError = 0xf4,
    /// Address out of range.
    AddressOutOfRange = 0xf3,
    /// The watchdog timed out.
    WatchdogTimeout = 0xf2,
}

impl ResultCode {
    /// Every defined status code, in declaration order.
    pub const ALL: [Self; 15] = [
        Self::Success,
        Self::Error,
        Self::NotImplemented,
        Self::InvalidParameter,
        Self::InvalidChannel,
        Self::InvalidMode,
        Self::InvalidTimebase,
        Self::InvalidDelta,
        Self::PtoParamTabFull,
        Self::DevAccessFailed,
        Self::InvalidProcImgCfg,
        Self::ProcImgCfgUnknown,
        Self::ShpImgError,
        Self::AddressOutOfRange,
        Self::WatchdogTimeout,
    ];

    /// Create from a raw status value.
    ///
    /// Returns `None` for values outside the defined set.
    #[must_use]
    pub const fn from_raw(code: i32) -> Option<Self> {
        match code {
            0x00 => Some(Self::Success),
            0xff => Some(Self::Error),
            0xfe => Some(Self::NotImplemented),
            0xfd => Some(Self::InvalidParameter),
            0xfc => Some(Self::InvalidChannel),
            0xfb => Some(Self::InvalidMode),
            0xfa => Some(Self::InvalidTimebase),
            0xf9 => Some(Self::InvalidDelta),
            0xf8 => Some(Self::PtoParamTabFull),
            0xf7 => Some(Self::DevAccessFailed),
            0xf6 => Some(Self::InvalidProcImgCfg),
            0xf5 => Some(Self::ProcImgCfgUnknown),
            0xf4 => Some(Self::ShpImgError),
            0xf3 => Some(Self::AddressOutOfRange),
            0xf2 => Some(Self::WatchdogTimeout),
            _ => None,
        }
    }

    /// The raw value as passed across the foreign boundary.
    #[must_use]
    pub const fn raw(self) -> i32 {
        self as i32
    }
}

/// Classified outcome of a foreign call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The call succeeded.
    Success,
    /// Unspecified driver error.
    GenericError,
    /// Functionality not implemented by the driver.
    NotImplemented,
    /// Parameter out of its domain.
    InvalidParameter,
    /// Channel number out of range.
    InvalidChannel,
    /// Mode out of its domain.
    InvalidMode,
    /// Timebase out of its domain.
    InvalidTimebase,
    /// PTO delta rejected.
    InvalidDelta,
    /// PTO parameter table full.
    ResourceExhausted,
    /// Device or peripheral access failed.
    DeviceAccessFailed,
    /// Process image configuration invalid.
    ConfigurationInvalid,
    /// Process image configuration unknown.
    ConfigurationUnknown,
    /// Shared process image error.
    SharedImageError,
    /// Address out of range.
    AddressOutOfRange,
    /// The caller failed to service the watchdog in time.
    WatchdogTimeout,
    /// A status value outside the defined set.
    Unknown(i32),
}

impl ErrorKind {
    /// Check if this is the success outcome.
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

impl From<ResultCode> for ErrorKind {
    fn from(code: ResultCode) -> Self {
        classify(code.raw())
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::GenericError => write!(f, "generic error"),
            Self::NotImplemented => write!(f, "not implemented"),
            Self::InvalidParameter => write!(f, "invalid parameter"),
            Self::InvalidChannel => write!(f, "invalid channel"),
            Self::InvalidMode => write!(f, "invalid mode"),
            Self::InvalidTimebase => write!(f, "invalid timebase"),
            Self::InvalidDelta => write!(f, "invalid delta"),
            Self::ResourceExhausted => write!(f, "PTO parameter table full"),
            Self::DeviceAccessFailed => write!(f, "device access failed"),
            Self::ConfigurationInvalid => write!(f, "process image configuration invalid"),
            Self::ConfigurationUnknown => write!(f, "process image configuration unknown"),
            Self::SharedImageError => write!(f, "shared process image error"),
            Self::AddressOutOfRange => write!(f, "address out of range"),
            Self::WatchdogTimeout => write!(f, "watchdog timeout"),
            Self::Unknown(code) => write!(f, "unknown status {code:#x}"),
        }
    }
}

/// Classify a raw status code returned by the native driver.
///
/// Total over `i32`: anything outside the defined set is
/// [`ErrorKind::Unknown`], never [`ErrorKind::Success`].
#[must_use]
pub const fn classify(code: i32) -> ErrorKind {
    match ResultCode::from_raw(code) {
        Some(ResultCode::Success) => ErrorKind::Success,
        Some(ResultCode::Error) => ErrorKind::GenericError,
        Some(ResultCode::NotImplemented) => ErrorKind::NotImplemented,
        Some(ResultCode::InvalidParameter) => ErrorKind::InvalidParameter,
        Some(ResultCode::InvalidChannel) => ErrorKind::InvalidChannel,
        Some(ResultCode::InvalidMode) => ErrorKind::InvalidMode,
        Some(ResultCode::InvalidTimebase) => ErrorKind::InvalidTimebase,
        Some(ResultCode::InvalidDelta) => ErrorKind::InvalidDelta,
        Some(ResultCode::PtoParamTabFull) => ErrorKind::ResourceExhausted,
        Some(ResultCode::DevAccessFailed) => ErrorKind::DeviceAccessFailed,
        Some(ResultCode::InvalidProcImgCfg) => ErrorKind::ConfigurationInvalid,
        Some(ResultCode::ProcImgCfgUnknown) => ErrorKind::ConfigurationUnknown,
        Some(ResultCode::ShpImgError) => ErrorKind::SharedImageError,
        Some(ResultCode::AddressOutOfRange) => ErrorKind::AddressOutOfRange,
        Some(ResultCode::WatchdogTimeout) => ErrorKind::WatchdogTimeout,
        None => ErrorKind::Unknown(code),
    }
}

/// Translate a raw status code into a `Result`.
///
/// # Errors
///
/// Returns [`Error::Driver`] for every code that does not classify as success.
pub fn check(code: i32) -> Result<()> {
    match classify(code) {
        ErrorKind::Success => Ok(()),
        kind => Err(Error::driver(kind, code)),
    }
}

/// I/O subsystems of the controller, each with its own channel range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subsystem {
    /// Digital inputs.
    DigitalIn,
    /// Digital outputs.
    DigitalOut,
    /// Relay outputs.
    Relay,
    /// Analog inputs.
    AnalogIn,
    /// Analog outputs.
    AnalogOut,
    /// Counters.
    Counter,
    /// A/B decoders.
    Encoder,
    /// PWM/PTO outputs.
    Pwm,
    /// Temperature sensors.
    Temperature,
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DigitalIn => write!(f, "digital input"),
            Self::DigitalOut => write!(f, "digital output"),
            Self::Relay => write!(f, "relay"),
            Self::AnalogIn => write!(f, "analog input"),
            Self::AnalogOut => write!(f, "analog output"),
            Self::Counter => write!(f, "counter"),
            Self::Encoder => write!(f, "A/B decoder"),
            Self::Pwm => write!(f, "PWM/PTO"),
            Self::Temperature => write!(f, "temperature sensor"),
        }
    }
}

/// Primary error type of the binding layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The native driver returned a non-success status.
    #[error("driver error: {kind} (code {code:#04x})")]
    Driver {
        /// Classified status.
        kind: ErrorKind,
        /// Raw status as returned by the foreign call.
        code: i32,
    },

    /// Channel number outside `[0, available)` for its subsystem.
    #[error("invalid {subsystem} channel {channel} (board has {available})")]
    InvalidChannel {
        /// Subsystem the channel was addressed in.
        subsystem: Subsystem,
        /// Requested channel.
        channel: u8,
        /// Channel count reported by the hardware.
        available: u16,
    },

    /// A parameter was rejected before crossing the foreign boundary.
    #[error("invalid parameter: {reason}")]
    InvalidParameter {
        /// What was wrong.
        reason: String,
    },

    /// An output was enabled before its parameters were set.
    #[error("{subsystem} channel {channel} enabled before it was configured")]
    NotConfigured {
        /// Subsystem of the channel.
        subsystem: Subsystem,
        /// The channel.
        channel: u8,
    },

    /// Operation attempted without an active session.
    #[error("no active session: acquire the device before using it")]
    SessionInactive,

    /// `release()` called more often than `acquire()`.
    #[error("device released more often than it was acquired")]
    NotAcquired,

    /// A handler is already registered for the channel.
    #[error("interrupt handler already registered for channel {channel}")]
    AlreadyRegistered {
        /// The channel.
        channel: u8,
    },

    /// An interrupt was requested without selecting any edge.
    #[error("interrupt trigger for channel {channel} selects no edge")]
    EmptyTrigger {
        /// The channel.
        channel: u8,
    },
}

/// Result type alias for binding-layer operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a new `Driver` error.
    #[must_use]
    pub const fn driver(kind: ErrorKind, code: i32) -> Self {
        Self::Driver { kind, code }
    }

    /// Create a new `InvalidChannel` error.
    #[must_use]
    pub const fn invalid_channel(subsystem: Subsystem, channel: u8, available: u16) -> Self {
        Self::InvalidChannel {
            subsystem,
            channel,
            available,
        }
    }

    /// Create a new `InvalidParameter` error.
    #[must_use]
    pub fn invalid_parameter(reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            reason: reason.into(),
        }
    }

    /// Create a new `NotConfigured` error.
    #[must_use]
    pub const fn not_configured(subsystem: Subsystem, channel: u8) -> Self {
        Self::NotConfigured { subsystem, channel }
    }

    /// The [`ErrorKind`] this error corresponds to.
    ///
    /// Local validation failures map onto the kind the driver would have
    /// reported. Pure contract violations have no kind.
    #[must_use]
    pub const fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Driver { kind, .. } => Some(*kind),
            Self::InvalidChannel { .. } => Some(ErrorKind::InvalidChannel),
            Self::InvalidParameter { .. }
            | Self::NotConfigured { .. }
            | Self::EmptyTrigger { .. } => Some(ErrorKind::InvalidParameter),
            Self::SessionInactive | Self::NotAcquired | Self::AlreadyRegistered { .. } => None,
        }
    }

    /// Check if this error was detected by the binding layer itself
    /// rather than reported by the driver.
    #[must_use]
    pub const fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Self::NotConfigured { .. }
                | Self::SessionInactive
                | Self::NotAcquired
                | Self::AlreadyRegistered { .. }
                | Self::EmptyTrigger { .. }
        )
    }

    /// Check if this error requires supervised recovery.
    ///
    /// A watchdog timeout means the caller missed its real-time obligation;
    /// retrying the failed call does not fix that.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Driver {
                kind: ErrorKind::WatchdogTimeout,
                ..
            }
        )
    }

    /// Get the raw status code if this error came from the driver.
    #[must_use]
    pub const fn error_code(&self) -> Option<i32> {
        match self {
            Self::Driver { code, .. } => Some(*code),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_error_implements_std_error() {
        fn assert_std_error<T: std::error::Error + Send + Sync + 'static>() {}
        assert_std_error::<Error>();
    }

    #[test]
    fn test_from_raw_roundtrips_defined_codes() {
        for code in ResultCode::ALL {
            assert_eq!(ResultCode::from_raw(code.raw()), Some(code));
        }
        assert_eq!(ResultCode::from_raw(0x01), None);
        assert_eq!(ResultCode::from_raw(-1), None);
        assert_eq!(ResultCode::from_raw(0x1ff), None);
    }

    #[test]
    fn test_classify_is_distinct_for_defined_codes() {
        let kinds: HashSet<ErrorKind> = ResultCode::ALL
            .iter()
            .map(|code| classify(code.raw()))
            .collect();
        assert_eq!(kinds.len(), ResultCode::ALL.len());
    }

    #[test]
    fn test_from_result_code() {
        assert_eq!(ErrorKind::from(ResultCode::Success), ErrorKind::Success);
        assert_eq!(
            ErrorKind::from(ResultCode::PtoParamTabFull),
            ErrorKind::ResourceExhausted
        );
        assert_eq!(
            ErrorKind::from(ResultCode::InvalidProcImgCfg),
            ErrorKind::ConfigurationInvalid
        );
        for code in ResultCode::ALL {
            assert!(!matches!(ErrorKind::from(code), ErrorKind::Unknown(_)));
        }
    }

    #[test]
    fn test_classify_unknown_is_never_success() {
        assert_eq!(classify(0x42), ErrorKind::Unknown(0x42));
        assert_eq!(classify(-255), ErrorKind::Unknown(-255));
        // Sign-extended 0xff must not alias the generic error.
        assert_eq!(classify(-1), ErrorKind::Unknown(-1));
        assert!(!classify(0x100).is_success());
    }

    #[test]
    fn test_check() {
        assert_eq!(check(0), Ok(()));
        let err = check(0xf8).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::ResourceExhausted));
        assert_eq!(err.error_code(), Some(0xf8));
        assert!(!err.is_contract_violation());
    }

    #[test]
    fn test_driver_error_message_includes_code() {
        let msg = Error::driver(ErrorKind::InvalidTimebase, 0xfa).to_string();
        assert!(msg.contains("invalid timebase"));
        assert!(msg.contains("0xfa"));
    }

    #[test]
    fn test_invalid_channel_message() {
        let msg = Error::invalid_channel(Subsystem::Relay, 3, 2).to_string();
        assert_eq!(msg, "invalid relay channel 3 (board has 2)");
    }

    #[test]
    fn test_display_impl_not_generic() {
        let errors = vec![
            Error::driver(ErrorKind::GenericError, 0xff),
            Error::invalid_channel(Subsystem::Pwm, 9, 2),
            Error::invalid_parameter("pulse longer than period"),
            Error::not_configured(Subsystem::Pwm, 0),
            Error::SessionInactive,
            Error::NotAcquired,
            Error::AlreadyRegistered { channel: 1 },
            Error::EmptyTrigger { channel: 1 },
        ];

        for err in errors {
            let msg = err.to_string();
            assert!(msg.len() > 10, "Message too short: {msg}");
            assert!(!msg.eq_ignore_ascii_case("error"), "Generic message: {msg}");
        }
    }

    #[test]
    fn test_contract_violations_have_no_code() {
        for err in [
            Error::SessionInactive,
            Error::NotAcquired,
            Error::AlreadyRegistered { channel: 0 },
            Error::not_configured(Subsystem::Counter, 0),
        ] {
            assert!(err.is_contract_violation());
            assert!(err.error_code().is_none());
        }
    }

    #[test]
    fn test_local_validation_kinds() {
        assert_eq!(
            Error::invalid_channel(Subsystem::DigitalIn, 20, 16).kind(),
            Some(ErrorKind::InvalidChannel)
        );
        assert_eq!(
            Error::not_configured(Subsystem::Pwm, 1).kind(),
            Some(ErrorKind::InvalidParameter)
        );
        assert_eq!(Error::SessionInactive.kind(), None);
    }

    #[test]
    fn test_watchdog_timeout_is_fatal() {
        assert!(check(0xf2).unwrap_err().is_fatal());
        assert!(!check(0xff).unwrap_err().is_fatal());
        assert!(!Error::SessionInactive.is_fatal());
    }

    #[test]
    fn test_subsystem_display() {
        assert_eq!(Subsystem::DigitalIn.to_string(), "digital input");
        assert_eq!(Subsystem::Encoder.to_string(), "A/B decoder");
        assert_eq!(Subsystem::Temperature.to_string(), "temperature sensor");
    }

    #[test]
    fn test_unknown_kind_display() {
        assert_eq!(ErrorKind::Unknown(0x42).to_string(), "unknown status 0x42");
    }
}
