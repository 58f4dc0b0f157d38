//! Bindings to `libctr700drv.so`.
//!
//! # Safety
//!
//! Every extern function takes plain integers or pointers to caller-owned
//! storage that outlives the call. The driver never retains those pointers.
//! The only pointer it retains is the interrupt callback, which is a
//! `'static` function item.
//!
//! # Thread Safety
//!
//! The driver serialises access internally; all functions may be called from
//! any thread. Interrupt callbacks are raised from a driver-owned thread.

use crate::driver::{InterruptSink, NativeDriver, RawDiagInfo, RawHwInfo};
use parking_lot::RwLock;
use std::os::raw::c_uint;

/// Fixed callback signature expected by the driver: `(channel, value)`.
type RawInterruptCallback = Option<extern "C" fn(u8, u8)>;

#[allow(non_snake_case)]
#[link(name = "ctr700drv")]
extern "C" {
    fn Ctr700DrvGetVersion(puMajor: *mut u8, puMinor: *mut u8) -> i32;
    fn Ctr700DrvInitialize() -> i32;
    fn Ctr700DrvShutDown() -> i32;
    fn Ctr700DrvGetTickCount(puTickCount: *mut u32) -> i32;
    fn Ctr700DrvEnableWatchdog(fMonitorOnly: u8) -> i32;
    fn Ctr700DrvServiceWatchdog() -> i32;
    fn Ctr700DrvGetHardwareInfo(pHwInfo: *mut RawHwInfo) -> i32;

    fn Ctr700DrvSetRunLed(fState: u8) -> i32;
    fn Ctr700DrvSetErrLed(fState: u8) -> i32;
    fn Ctr700DrvGetRunSwitch(pfRunSwitch: *mut u8) -> i32;
    fn Ctr700DrvGetConfigEnabled(pfConfig: *mut u8) -> i32;
    fn Ctr700DrvGetPowerFail(pfFail: *mut u8) -> i32;
    fn Ctr700DrvGetDiagInfo(pDiagInfo: *mut RawDiagInfo) -> i32;
    fn Ctr700DrvGetExtFail(pfFail: *mut u8) -> i32;
    fn Ctr700DrvSetExtReset(fEnable: u8) -> i32;

    fn Ctr700DrvGetDigiIn(uChannel: u8, pfState: *mut u8) -> i32;
    fn Ctr700DrvSetDigiOut(uChannel: u8, fEnable: u8) -> i32;
    fn Ctr700DrvSetRelay(uChannel: u8, fEnable: u8) -> i32;

    fn Ctr700DrvCntEnable(uChannel: u8, fEnable: u8) -> i32;
    fn Ctr700DrvCntSetMode(uChannel: u8, uMode: u8, uTrigger: u8, uDir: u8) -> i32;
    fn Ctr700DrvCntSetPreload(uChannel: u8, iPreload: i32) -> i32;
    fn Ctr700DrvCntGetValue(uChannel: u8, piValue: *mut i32) -> i32;

    fn Ctr700DrvPwmSetTimeBase(uChannel: u8, uTimeBase: u8) -> i32;
    fn Ctr700DrvPwmSetParam(uChannel: u8, uPeriod: u16, uPulseLen: u16) -> i32;
    fn Ctr700DrvPwmEnable(uChannel: u8, fRun: u8) -> i32;
    fn Ctr700DrvPtoSetParam(uChannel: u8, uPeriod: u16, iDelta: i16, uPulseCnt: u32) -> i32;
    fn Ctr700DrvPtoEnable(uChannel: u8, fRun: u8) -> i32;
    fn Ctr700DrvPtoGetState(uChannel: u8, pfRun: *mut u8) -> i32;

    fn Ctr700DrvAdcGetValue(uChannel: u8, puAdcValue: *mut u16) -> i32;
    fn Ctr700DrvAdcSetMode(uChannel: u8, uMode: u8) -> i32;

    fn Ctr700DrvTmpGetValue(uSensor: u8, piValue: *mut i32) -> i32;

    fn Ctr700DrvRegisterInterruptCallback(
        uChannel: u8,
        pfnCallback: RawInterruptCallback,
        uInterruptTrigger: c_uint,
    ) -> i32;
    fn Ctr700DrvUnregisterInterruptCallback(uChannel: u8) -> i32;
}

// The callback carries no user data, so the route back into Rust is global.
// There is exactly one native driver per process.
static SINK: RwLock<Option<InterruptSink>> = parking_lot::const_rwlock(None);

/// Fixed-signature function handed to the driver for every channel.
extern "C" fn trampoline(channel: u8, value: u8) {
    let sink = SINK.read().clone();
    if let Some(sink) = sink {
        // The sink catches handler panics, nothing unwinds out of here.
        sink(channel, value);
    }
}

/// [`NativeDriver`] backed by the linked `libctr700drv`.
///
/// Zero-sized; all state lives inside the native library.
#[derive(Debug, Default)]
pub struct LinkedDriver {
    _private: (),
}

impl LinkedDriver {
    /// Create a handle to the linked driver.
    #[must_use]
    pub const fn new() -> Self {
        Self { _private: () }
    }
}

impl NativeDriver for LinkedDriver {
    fn get_version(&self, major: &mut u8, minor: &mut u8) -> i32 {
        // SAFETY: both pointers come from live `&mut u8` borrows.
        unsafe { Ctr700DrvGetVersion(major, minor) }
    }

    fn initialize(&self) -> i32 {
        // SAFETY: no arguments.
        unsafe { Ctr700DrvInitialize() }
    }

    fn shut_down(&self) -> i32 {
        // SAFETY: no arguments.
        let code = unsafe { Ctr700DrvShutDown() };
        *SINK.write() = None;
        code
    }

    fn get_tick_count(&self, ticks: &mut u32) -> i32 {
        // SAFETY: pointer comes from a live `&mut u32` borrow.
        unsafe { Ctr700DrvGetTickCount(ticks) }
    }

    fn enable_watchdog(&self, monitor_only: u8) -> i32 {
        // SAFETY: plain integer argument.
        unsafe { Ctr700DrvEnableWatchdog(monitor_only) }
    }

    fn service_watchdog(&self) -> i32 {
        // SAFETY: no arguments.
        unsafe { Ctr700DrvServiceWatchdog() }
    }

    fn get_hardware_info(&self, info: &mut RawHwInfo) -> i32 {
        // SAFETY: RawHwInfo is #[repr(C)] and layout-identical to tCtr700DrvHwInfo.
        unsafe { Ctr700DrvGetHardwareInfo(info) }
    }

    fn set_run_led(&self, state: u8) -> i32 {
        // SAFETY: plain integer argument.
        unsafe { Ctr700DrvSetRunLed(state) }
    }

    fn set_err_led(&self, state: u8) -> i32 {
        // SAFETY: plain integer argument.
        unsafe { Ctr700DrvSetErrLed(state) }
    }

    fn get_run_switch(&self, state: &mut u8) -> i32 {
        // SAFETY: pointer comes from a live `&mut u8` borrow.
        unsafe { Ctr700DrvGetRunSwitch(state) }
    }

    fn get_config_enabled(&self, state: &mut u8) -> i32 {
        // SAFETY: pointer comes from a live `&mut u8` borrow.
        unsafe { Ctr700DrvGetConfigEnabled(state) }
    }

    fn get_power_fail(&self, state: &mut u8) -> i32 {
        // SAFETY: pointer comes from a live `&mut u8` borrow.
        unsafe { Ctr700DrvGetPowerFail(state) }
    }

    fn get_diag_info(&self, info: &mut RawDiagInfo) -> i32 {
        // SAFETY: RawDiagInfo is #[repr(C)] and layout-identical to tCtr700DrvDiagInfo.
        unsafe { Ctr700DrvGetDiagInfo(info) }
    }

    fn get_ext_fail(&self, state: &mut u8) -> i32 {
        // SAFETY: pointer comes from a live `&mut u8` borrow.
        unsafe { Ctr700DrvGetExtFail(state) }
    }

    fn set_ext_reset(&self, enable: u8) -> i32 {
        // SAFETY: plain integer argument.
        unsafe { Ctr700DrvSetExtReset(enable) }
    }

    fn get_digi_in(&self, channel: u8, state: &mut u8) -> i32 {
        // SAFETY: pointer comes from a live `&mut u8` borrow.
        unsafe { Ctr700DrvGetDigiIn(channel, state) }
    }

    fn set_digi_out(&self, channel: u8, enable: u8) -> i32 {
        // SAFETY: plain integer arguments.
        unsafe { Ctr700DrvSetDigiOut(channel, enable) }
    }

    fn set_relay(&self, channel: u8, enable: u8) -> i32 {
        // SAFETY: plain integer arguments.
        unsafe { Ctr700DrvSetRelay(channel, enable) }
    }

    fn cnt_enable(&self, channel: u8, enable: u8) -> i32 {
        // SAFETY: plain integer arguments.
        unsafe { Ctr700DrvCntEnable(channel, enable) }
    }

    fn cnt_set_mode(&self, channel: u8, mode: u8, trigger: u8, direction: u8) -> i32 {
        // SAFETY: plain integer arguments.
        unsafe { Ctr700DrvCntSetMode(channel, mode, trigger, direction) }
    }

    fn cnt_set_preload(&self, channel: u8, preload: i32) -> i32 {
        // SAFETY: plain integer arguments.
        unsafe { Ctr700DrvCntSetPreload(channel, preload) }
    }

    fn cnt_get_value(&self, channel: u8, value: &mut i32) -> i32 {
        // SAFETY: pointer comes from a live `&mut i32` borrow.
        unsafe { Ctr700DrvCntGetValue(channel, value) }
    }

    fn pwm_set_time_base(&self, channel: u8, time_base: u8) -> i32 {
        // SAFETY: plain integer arguments.
        unsafe { Ctr700DrvPwmSetTimeBase(channel, time_base) }
    }

    fn pwm_set_param(&self, channel: u8, period: u16, pulse_len: u16) -> i32 {
        // SAFETY: plain integer arguments.
        unsafe { Ctr700DrvPwmSetParam(channel, period, pulse_len) }
    }

    fn pwm_enable(&self, channel: u8, run: u8) -> i32 {
        // SAFETY: plain integer arguments.
        unsafe { Ctr700DrvPwmEnable(channel, run) }
    }

    fn pto_set_param(&self, channel: u8, period: u16, delta: i16, pulse_count: u32) -> i32 {
        // SAFETY: plain integer arguments.
        unsafe { Ctr700DrvPtoSetParam(channel, period, delta, pulse_count) }
    }

    fn pto_enable(&self, channel: u8, run: u8) -> i32 {
        // SAFETY: plain integer arguments.
        unsafe { Ctr700DrvPtoEnable(channel, run) }
    }

    fn pto_get_state(&self, channel: u8, run: &mut u8) -> i32 {
        // SAFETY: pointer comes from a live `&mut u8` borrow.
        unsafe { Ctr700DrvPtoGetState(channel, run) }
    }

    fn adc_get_value(&self, channel: u8, value: &mut u16) -> i32 {
        // SAFETY: pointer comes from a live `&mut u16` borrow.
        unsafe { Ctr700DrvAdcGetValue(channel, value) }
    }

    fn adc_set_mode(&self, channel: u8, mode: u8) -> i32 {
        // SAFETY: plain integer arguments.
        unsafe { Ctr700DrvAdcSetMode(channel, mode) }
    }

    fn tmp_get_value(&self, sensor: u8, value: &mut i32) -> i32 {
        // SAFETY: pointer comes from a live `&mut i32` borrow.
        unsafe { Ctr700DrvTmpGetValue(sensor, value) }
    }

    fn register_interrupt_callback(&self, channel: u8, trigger: u32, sink: InterruptSink) -> i32 {
        // Install the route before the driver can fire.
        *SINK.write() = Some(sink);
        // SAFETY: `trampoline` is a 'static function item with the exact
        // signature of tCtr700DrvInterruptCallback.
        unsafe {
            Ctr700DrvRegisterInterruptCallback(
                channel,
                Some(trampoline),
                trigger,
            )
        }
    }

    fn unregister_interrupt_callback(&self, channel: u8) -> i32 {
        // SAFETY: plain integer argument.
        unsafe { Ctr700DrvUnregisterInterruptCallback(channel) }
    }
}
