//! In-process stand-in for `libctr700drv`.
//!
//! [`SimulatedDriver`] implements [`NativeDriver`] over a plain state table.
//! It records the name of every call, can be told to fail the next call of
//! a given operation, and raises interrupts when a test drives a digital
//! input through [`SimulatedDriver::set_digital_input`].

use crate::driver::{InterruptSink, NativeDriver, RawDiagInfo, RawHwInfo};
use crate::error::ResultCode;
use parking_lot::Mutex;
use std::collections::HashMap;

const OK: i32 = ResultCode::Success as i32;

/// Entries in the simulated PTO parameter table.
pub const PTO_TABLE_CAPACITY: usize = 16;

#[derive(Default)]
struct State {
    calls: Vec<&'static str>,
    failures: HashMap<&'static str, i32>,

    tick_count: u32,
    hw_info: RawHwInfo,
    diag_info: RawDiagInfo,
    watchdog: Option<u8>,
    watchdog_services: usize,

    run_led: bool,
    err_led: bool,
    run_switch: bool,
    config_enabled: bool,
    power_fail: bool,
    ext_fail: bool,
    ext_reset: bool,

    digital_in: HashMap<u8, bool>,
    digital_out: HashMap<u8, bool>,
    relays: HashMap<u8, bool>,

    counter_enabled: HashMap<u8, bool>,
    counter_mode: HashMap<u8, (u8, u8, u8)>,
    counter_value: HashMap<u8, i32>,

    pwm_time_base: HashMap<u8, u8>,
    pwm_param: HashMap<u8, (u16, u16)>,
    pwm_running: HashMap<u8, bool>,
    pto_table: Vec<(u8, u16, i16, u32)>,
    pto_running: HashMap<u8, bool>,

    analog_mode: HashMap<u8, u8>,
    analog_in: HashMap<u8, u16>,
    temperature: HashMap<u8, i32>,

    interrupts: HashMap<u8, (u32, InterruptSink)>,
}

/// Simulated CTR-700 driver.
///
/// Starts with the channel layout of a stock CTR-700 and every input low.
/// Channel numbers are not checked; that is the caller's job.
pub struct SimulatedDriver {
    version: (u8, u8),
    state: Mutex<State>,
}

impl std::fmt::Debug for SimulatedDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedDriver")
            .field("version", &self.version)
            .field("calls", &self.state.lock().calls.len())
            .finish_non_exhaustive()
    }
}

impl Default for SimulatedDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedDriver {
    /// Hardware layout reported by default.
    pub const CTR700_LAYOUT: RawHwInfo = RawHwInfo {
        pcb_revision: 4,
        di_channels: 16,
        do_channels: 16,
        relay_channels: 2,
        ai_channels: 4,
        ao_channels: 0,
        cnt_channels: 1,
        enc_channels: 1,
        pwm_channels: 2,
        tmp_channels: 2,
    };

    /// Create a simulated driver reporting version 2.1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            version: (2, 1),
            state: Mutex::new(State {
                hw_info: Self::CTR700_LAYOUT,
                // Active-low lines idle high.
                diag_info: RawDiagInfo {
                    digi_out_power_fail: 0,
                    digi_out_diag: 1,
                    digi_in_error: 1,
                    usb_over_current: 1,
                },
                ..State::default()
            }),
        }
    }

    /// Names of all calls so far, oldest first.
    #[must_use]
    pub fn calls(&self) -> Vec<&'static str> {
        self.state.lock().calls.clone()
    }

    /// Forget the calls recorded so far.
    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// How often `op` was called.
    #[must_use]
    pub fn call_count(&self, op: &str) -> usize {
        self.state.lock().calls.iter().filter(|c| **c == op).count()
    }

    /// Make the next call of `op` return `code` without side effects.
    pub fn fail_next(&self, op: &'static str, code: i32) {
        self.state.lock().failures.insert(op, code);
    }

    /// Set the millisecond tick counter.
    pub fn set_tick_count(&self, ticks: u32) {
        self.state.lock().tick_count = ticks;
    }

    /// Replace the reported hardware layout.
    pub fn set_hardware_info(&self, info: RawHwInfo) {
        self.state.lock().hw_info = info;
    }

    /// Replace the reported diagnostic lines.
    pub fn set_diag_info(&self, info: RawDiagInfo) {
        self.state.lock().diag_info = info;
    }

    /// Move the RUN/STOP switch.
    pub fn set_run_switch(&self, run: bool) {
        self.state.lock().run_switch = run;
    }

    /// Set the configuration DIP switch.
    pub fn set_config_enabled(&self, enabled: bool) {
        self.state.lock().config_enabled = enabled;
    }

    /// Set the power fail line.
    pub fn set_power_fail(&self, fail: bool) {
        self.state.lock().power_fail = fail;
    }

    /// Set the backplane fail line.
    pub fn set_ext_fail(&self, fail: bool) {
        self.state.lock().ext_fail = fail;
    }

    /// Drive digital input `channel`, raising an interrupt if a registered
    /// trigger matches the edge.
    ///
    /// The interrupt is delivered on the calling thread.
    pub fn set_digital_input(&self, channel: u8, high: bool) {
        let sink = {
            let mut state = self.state.lock();
            let previous = state.digital_in.insert(channel, high).unwrap_or(false);
            let edge = match (previous, high) {
                (false, true) => 0x01,
                (true, false) => 0x02,
                _ => 0,
            };
            state
                .interrupts
                .get(&channel)
                .filter(|(trigger, _)| trigger & edge != 0)
                .map(|(_, sink)| sink.clone())
        };
        // Outside the lock: handlers call back into the driver.
        if let Some(sink) = sink {
            sink(channel, u8::from(high));
        }
    }

    /// Set the raw sample of analog input `channel`.
    pub fn set_analog_input(&self, channel: u8, value: u16) {
        self.state.lock().analog_in.insert(channel, value);
    }

    /// Set the raw reading of temperature `sensor`, in 1/10000 °C.
    pub fn set_temperature(&self, sensor: u8, raw: i32) {
        self.state.lock().temperature.insert(sensor, raw);
    }

    /// Set the value of counter `channel`.
    pub fn set_counter_value(&self, channel: u8, value: i32) {
        self.state.lock().counter_value.insert(channel, value);
    }

    /// Mark the pulse train on `channel` as finished.
    pub fn finish_pto(&self, channel: u8) {
        self.state.lock().pto_running.insert(channel, false);
    }

    /// State of digital output `channel`.
    #[must_use]
    pub fn digital_output(&self, channel: u8) -> bool {
        self.state.lock().digital_out.get(&channel).copied().unwrap_or(false)
    }

    /// State of relay `channel`.
    #[must_use]
    pub fn relay(&self, channel: u8) -> bool {
        self.state.lock().relays.get(&channel).copied().unwrap_or(false)
    }

    /// State of the RUN LED.
    #[must_use]
    pub fn run_led(&self) -> bool {
        self.state.lock().run_led
    }

    /// State of the ERROR LED.
    #[must_use]
    pub fn err_led(&self) -> bool {
        self.state.lock().err_led
    }

    /// State of the backplane reset line.
    #[must_use]
    pub fn ext_reset(&self) -> bool {
        self.state.lock().ext_reset
    }

    /// Last mode written to analog input `channel`.
    #[must_use]
    pub fn analog_mode(&self, channel: u8) -> Option<u8> {
        self.state.lock().analog_mode.get(&channel).copied()
    }

    /// Whether counter `channel` is enabled.
    #[must_use]
    pub fn counter_enabled(&self, channel: u8) -> bool {
        self.state.lock().counter_enabled.get(&channel).copied().unwrap_or(false)
    }

    /// Last `(mode, trigger, direction)` written to counter `channel`.
    #[must_use]
    pub fn counter_mode(&self, channel: u8) -> Option<(u8, u8, u8)> {
        self.state.lock().counter_mode.get(&channel).copied()
    }

    /// Last time base written to PWM `channel`.
    #[must_use]
    pub fn pwm_time_base(&self, channel: u8) -> Option<u8> {
        self.state.lock().pwm_time_base.get(&channel).copied()
    }

    /// Last `(period, pulse_len)` written to PWM `channel`.
    #[must_use]
    pub fn pwm_param(&self, channel: u8) -> Option<(u16, u16)> {
        self.state.lock().pwm_param.get(&channel).copied()
    }

    /// Whether PWM `channel` is running.
    #[must_use]
    pub fn pwm_running(&self, channel: u8) -> bool {
        self.state.lock().pwm_running.get(&channel).copied().unwrap_or(false)
    }

    /// Mode byte of the last watchdog enable, if any.
    #[must_use]
    pub fn watchdog(&self) -> Option<u8> {
        self.state.lock().watchdog
    }

    /// How often the watchdog was serviced.
    #[must_use]
    pub fn watchdog_services(&self) -> usize {
        self.state.lock().watchdog_services
    }

    /// Record `op` and run `effect` unless a failure is pending for it.
    fn call(&self, op: &'static str, effect: impl FnOnce(&mut State) -> i32) -> i32 {
        let mut state = self.state.lock();
        state.calls.push(op);
        if let Some(code) = state.failures.remove(op) {
            return code;
        }
        effect(&mut state)
    }
}

impl NativeDriver for SimulatedDriver {
    fn get_version(&self, major: &mut u8, minor: &mut u8) -> i32 {
        let (ma, mi) = self.version;
        self.call("get_version", |_| {
            *major = ma;
            *minor = mi;
            OK
        })
    }

    fn initialize(&self) -> i32 {
        self.call("initialize", |_| OK)
    }

    fn shut_down(&self) -> i32 {
        self.call("shut_down", |state| {
            state.interrupts.clear();
            state.watchdog = None;
            state.pto_table.clear();
            OK
        })
    }

    fn get_tick_count(&self, ticks: &mut u32) -> i32 {
        self.call("get_tick_count", |state| {
            *ticks = state.tick_count;
            OK
        })
    }

    fn enable_watchdog(&self, monitor_only: u8) -> i32 {
        self.call("enable_watchdog", |state| {
            state.watchdog = Some(monitor_only);
            OK
        })
    }

    fn service_watchdog(&self) -> i32 {
        self.call("service_watchdog", |state| {
            state.watchdog_services += 1;
            OK
        })
    }

    fn get_hardware_info(&self, info: &mut RawHwInfo) -> i32 {
        self.call("get_hardware_info", |state| {
            *info = state.hw_info;
            OK
        })
    }

    fn set_run_led(&self, on: u8) -> i32 {
        self.call("set_run_led", |state| {
            state.run_led = on != 0;
            OK
        })
    }

    fn set_err_led(&self, on: u8) -> i32 {
        self.call("set_err_led", |state| {
            state.err_led = on != 0;
            OK
        })
    }

    fn get_run_switch(&self, run: &mut u8) -> i32 {
        self.call("get_run_switch", |state| {
            *run = u8::from(state.run_switch);
            OK
        })
    }

    fn get_config_enabled(&self, enabled: &mut u8) -> i32 {
        self.call("get_config_enabled", |state| {
            *enabled = u8::from(state.config_enabled);
            OK
        })
    }

    fn get_power_fail(&self, fail: &mut u8) -> i32 {
        self.call("get_power_fail", |state| {
            *fail = u8::from(state.power_fail);
            OK
        })
    }

    fn get_diag_info(&self, info: &mut RawDiagInfo) -> i32 {
        self.call("get_diag_info", |state| {
            *info = state.diag_info;
            OK
        })
    }

    fn get_ext_fail(&self, fail: &mut u8) -> i32 {
        self.call("get_ext_fail", |state| {
            *fail = u8::from(state.ext_fail);
            OK
        })
    }

    fn set_ext_reset(&self, enable: u8) -> i32 {
        self.call("set_ext_reset", |state| {
            state.ext_reset = enable != 0;
            OK
        })
    }

    fn get_digi_in(&self, channel: u8, value: &mut u8) -> i32 {
        self.call("get_digi_in", |state| {
            *value = u8::from(state.digital_in.get(&channel).copied().unwrap_or(false));
            OK
        })
    }

    fn set_digi_out(&self, channel: u8, enable: u8) -> i32 {
        self.call("set_digi_out", |state| {
            state.digital_out.insert(channel, enable != 0);
            OK
        })
    }

    fn set_relay(&self, channel: u8, enable: u8) -> i32 {
        self.call("set_relay", |state| {
            state.relays.insert(channel, enable != 0);
            OK
        })
    }

    fn cnt_enable(&self, channel: u8, enable: u8) -> i32 {
        self.call("cnt_enable", |state| {
            state.counter_enabled.insert(channel, enable != 0);
            OK
        })
    }

    fn cnt_set_mode(&self, channel: u8, mode: u8, trigger: u8, direction: u8) -> i32 {
        self.call("cnt_set_mode", |state| {
            if mode > 1 || trigger > 2 || direction > 1 {
                return ResultCode::InvalidMode as i32;
            }
            state.counter_mode.insert(channel, (mode, trigger, direction));
            OK
        })
    }

    fn cnt_set_preload(&self, channel: u8, preload: i32) -> i32 {
        self.call("cnt_set_preload", |state| {
            state.counter_value.insert(channel, preload);
            OK
        })
    }

    fn cnt_get_value(&self, channel: u8, value: &mut i32) -> i32 {
        self.call("cnt_get_value", |state| {
            *value = state.counter_value.get(&channel).copied().unwrap_or(0);
            OK
        })
    }

    fn pwm_set_time_base(&self, channel: u8, time_base: u8) -> i32 {
        self.call("pwm_set_time_base", |state| {
            if !matches!(time_base, 1 | 2) {
                return ResultCode::InvalidTimebase as i32;
            }
            state.pwm_time_base.insert(channel, time_base);
            OK
        })
    }

    fn pwm_set_param(&self, channel: u8, period: u16, pulse_len: u16) -> i32 {
        self.call("pwm_set_param", |state| {
            if pulse_len > period {
                return ResultCode::InvalidParameter as i32;
            }
            state.pwm_param.insert(channel, (period, pulse_len));
            OK
        })
    }

    fn pwm_enable(&self, channel: u8, run: u8) -> i32 {
        self.call("pwm_enable", |state| {
            state.pwm_running.insert(channel, run != 0);
            OK
        })
    }

    fn pto_set_param(&self, channel: u8, period: u16, delta: i16, pulse_count: u32) -> i32 {
        self.call("pto_set_param", |state| {
            if state.pto_table.len() >= PTO_TABLE_CAPACITY {
                return ResultCode::PtoParamTabFull as i32;
            }
            state.pto_table.push((channel, period, delta, pulse_count));
            OK
        })
    }

    fn pto_enable(&self, channel: u8, run: u8) -> i32 {
        self.call("pto_enable", |state| {
            state.pto_running.insert(channel, run != 0);
            if run == 0 {
                state.pto_table.retain(|entry| entry.0 != channel);
            }
            OK
        })
    }

    fn pto_get_state(&self, channel: u8, run: &mut u8) -> i32 {
        self.call("pto_get_state", |state| {
            *run = u8::from(state.pto_running.get(&channel).copied().unwrap_or(false));
            OK
        })
    }

    fn adc_get_value(&self, channel: u8, value: &mut u16) -> i32 {
        self.call("adc_get_value", |state| {
            *value = state.analog_in.get(&channel).copied().unwrap_or(0);
            OK
        })
    }

    fn adc_set_mode(&self, channel: u8, mode: u8) -> i32 {
        self.call("adc_set_mode", |state| {
            if mode > 1 {
                return ResultCode::InvalidMode as i32;
            }
            state.analog_mode.insert(channel, mode);
            OK
        })
    }

    fn tmp_get_value(&self, sensor: u8, value: &mut i32) -> i32 {
        self.call("tmp_get_value", |state| {
            *value = state.temperature.get(&sensor).copied().unwrap_or(0);
            OK
        })
    }

    fn register_interrupt_callback(&self, channel: u8, trigger: u32, sink: InterruptSink) -> i32 {
        self.call("register_interrupt_callback", |state| {
            state.interrupts.insert(channel, (trigger, sink));
            OK
        })
    }

    fn unregister_interrupt_callback(&self, channel: u8) -> i32 {
        self.call("unregister_interrupt_callback", |state| {
            state.interrupts.remove(&channel);
            OK
        })
    }
}
