//! The foreign call boundary of `libctr700drv`, as a safe trait.
//!
//! [`NativeDriver`] mirrors the C API one to one: every method returns the
//! raw status code and writes results through `&mut` out-parameters, exactly
//! as the native functions do through pointers. Nothing here interprets
//! codes or validates arguments; that is the job of [`crate::Device`].
//!
//! Two implementations ship with the crate:
//!
//! - `LinkedDriver` (feature `native`) calls into the real library.
//! - [`SimulatedDriver`](crate::sim::SimulatedDriver) is an in-process fake
//!   used by tests, benches and demos.

use std::sync::Arc;

/// Hardware information record, layout-compatible with `tCtr700DrvHwInfo`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawHwInfo {
    /// PCB revision number.
    pub pcb_revision: u16,
    /// Number of digital inputs.
    pub di_channels: u16,
    /// Number of digital outputs.
    pub do_channels: u16,
    /// Number of relay outputs.
    pub relay_channels: u16,
    /// Number of analog inputs.
    pub ai_channels: u16,
    /// Number of analog outputs.
    pub ao_channels: u16,
    /// Number of counter channels.
    pub cnt_channels: u16,
    /// Number of A/B decoder channels.
    pub enc_channels: u16,
    /// Number of PWM channels.
    pub pwm_channels: u16,
    /// Number of temperature channels.
    pub tmp_channels: u16,
}

/// Diagnostic record, layout-compatible with `tCtr700DrvDiagInfo`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawDiagInfo {
    /// Digital output power fail (active high).
    pub digi_out_power_fail: u8,
    /// Digital output driver diagnostic (active low).
    pub digi_out_diag: u8,
    /// Digital input error (active low).
    pub digi_in_error: u8,
    /// USB over-current (active low).
    pub usb_over_current: u8,
}

/// Receiver for interrupts raised by the driver: `(channel, value)`.
///
/// The driver may call it from any thread, concurrently with other calls.
pub type InterruptSink = Arc<dyn Fn(u8, u8) + Send + Sync>;

/// Safe mirror of the `libctr700drv` C API.
///
/// Implementations must be callable from several threads at once. Boolean
/// arguments and results use the driver's `0`/`1` byte convention.
pub trait NativeDriver: Send + Sync {
    /// `Ctr700DrvGetVersion`.
    fn get_version(&self, major: &mut u8, minor: &mut u8) -> i32;
    /// `Ctr700DrvInitialize`.
    fn initialize(&self) -> i32;
    /// `Ctr700DrvShutDown`.
    fn shut_down(&self) -> i32;
    /// `Ctr700DrvGetTickCount`, milliseconds from an arbitrary origin.
    fn get_tick_count(&self, ticks: &mut u32) -> i32;
    /// `Ctr700DrvEnableWatchdog`.
    fn enable_watchdog(&self, monitor_only: u8) -> i32;
    /// `Ctr700DrvServiceWatchdog`.
    fn service_watchdog(&self) -> i32;
    /// `Ctr700DrvGetHardwareInfo`.
    fn get_hardware_info(&self, info: &mut RawHwInfo) -> i32;

    /// `Ctr700DrvSetRunLed`.
    fn set_run_led(&self, state: u8) -> i32;
    /// `Ctr700DrvSetErrLed`.
    fn set_err_led(&self, state: u8) -> i32;
    /// `Ctr700DrvGetRunSwitch`.
    fn get_run_switch(&self, state: &mut u8) -> i32;
    /// `Ctr700DrvGetConfigEnabled`.
    fn get_config_enabled(&self, state: &mut u8) -> i32;
    /// `Ctr700DrvGetPowerFail`.
    fn get_power_fail(&self, state: &mut u8) -> i32;
    /// `Ctr700DrvGetDiagInfo`.
    fn get_diag_info(&self, info: &mut RawDiagInfo) -> i32;
    /// `Ctr700DrvGetExtFail`.
    fn get_ext_fail(&self, state: &mut u8) -> i32;
    /// `Ctr700DrvSetExtReset`.
    fn set_ext_reset(&self, enable: u8) -> i32;

    /// `Ctr700DrvGetDigiIn`.
    fn get_digi_in(&self, channel: u8, state: &mut u8) -> i32;
    /// `Ctr700DrvSetDigiOut`.
    fn set_digi_out(&self, channel: u8, enable: u8) -> i32;
    /// `Ctr700DrvSetRelay`.
    fn set_relay(&self, channel: u8, enable: u8) -> i32;

    /// `Ctr700DrvCntEnable`.
    fn cnt_enable(&self, channel: u8, enable: u8) -> i32;
    /// `Ctr700DrvCntSetMode`.
    fn cnt_set_mode(&self, channel: u8, mode: u8, trigger: u8, direction: u8) -> i32;
    /// `Ctr700DrvCntSetPreload`.
    fn cnt_set_preload(&self, channel: u8, preload: i32) -> i32;
    /// `Ctr700DrvCntGetValue`.
    fn cnt_get_value(&self, channel: u8, value: &mut i32) -> i32;

    /// `Ctr700DrvPwmSetTimeBase`.
    fn pwm_set_time_base(&self, channel: u8, time_base: u8) -> i32;
    /// `Ctr700DrvPwmSetParam`.
    fn pwm_set_param(&self, channel: u8, period: u16, pulse_len: u16) -> i32;
    /// `Ctr700DrvPwmEnable`.
    fn pwm_enable(&self, channel: u8, run: u8) -> i32;
    /// `Ctr700DrvPtoSetParam`.
    fn pto_set_param(&self, channel: u8, period: u16, delta: i16, pulse_count: u32) -> i32;
    /// `Ctr700DrvPtoEnable`.
    fn pto_enable(&self, channel: u8, run: u8) -> i32;
    /// `Ctr700DrvPtoGetState`.
    fn pto_get_state(&self, channel: u8, run: &mut u8) -> i32;

    /// `Ctr700DrvAdcGetValue`.
    fn adc_get_value(&self, channel: u8, value: &mut u16) -> i32;
    /// `Ctr700DrvAdcSetMode`.
    fn adc_set_mode(&self, channel: u8, mode: u8) -> i32;

    /// `Ctr700DrvTmpGetValue`, in 1/10000 degree Celsius.
    fn tmp_get_value(&self, sensor: u8, value: &mut i32) -> i32;

    /// `Ctr700DrvRegisterInterruptCallback`.
    ///
    /// The implementation routes the driver's fixed-signature callback for
    /// `channel` to `sink`.
    fn register_interrupt_callback(&self, channel: u8, trigger: u32, sink: InterruptSink) -> i32;
    /// `Ctr700DrvUnregisterInterruptCallback`.
    fn unregister_interrupt_callback(&self, channel: u8) -> i32;
}
