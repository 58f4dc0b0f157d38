//! Property-based tests for ctr700.
//!
//! Uses proptest to generate random inputs and verify invariants hold.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use ctr700::counter::{CounterConfig, CounterMode};
use ctr700::error::{classify, ErrorKind, ResultCode, Subsystem};
use ctr700::interrupt::Trigger;
use ctr700::io::AnalogMode;
use ctr700::pwm::{PwmConfig, PwmTimebase};
use ctr700::sim::SimulatedDriver;
use ctr700::{Device, Error};
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;

fn subsystem_strategy() -> impl Strategy<Value = Subsystem> {
    prop_oneof![
        Just(Subsystem::DigitalIn),
        Just(Subsystem::DigitalOut),
        Just(Subsystem::Relay),
        Just(Subsystem::AnalogIn),
        Just(Subsystem::Counter),
        Just(Subsystem::Pwm),
        Just(Subsystem::Temperature),
    ]
}

fn timebase_strategy() -> impl Strategy<Value = PwmTimebase> {
    prop_oneof![Just(PwmTimebase::Ns800), Just(PwmTimebase::Ms1)]
}

/// Issue the `op`-th channel operation of `subsystem` on `channel`.
///
/// Every operation is valid for an in-range channel on a fresh session.
fn touch(device: &Device, subsystem: Subsystem, channel: u8, op: u8) -> ctr700::Result<()> {
    match subsystem {
        Subsystem::DigitalIn => match op % 3 {
            0 => device.digital_in(channel).map(drop),
            1 => device.register_interrupt(channel, Trigger::RISING_EDGE, |_| {}),
            _ => device.unregister_interrupt(channel),
        },
        Subsystem::DigitalOut => device.set_digital_out(channel, true),
        Subsystem::Relay => device.set_relay(channel, true),
        Subsystem::AnalogIn => match op % 2 {
            0 => device.analog_in(channel).map(drop),
            _ => device.set_analog_mode(channel, AnalogMode::Current),
        },
        Subsystem::Counter => match op % 4 {
            0 => device.counter_value(channel).map(drop),
            1 => device.counter_set_mode(channel, CounterConfig::new(CounterMode::Counter)),
            2 => device.counter_enable(channel, false),
            _ => device.counter_set_preload(channel, 7),
        },
        Subsystem::Pwm => match op % 6 {
            0 => device.pwm_set_timebase(channel, PwmTimebase::Ms1),
            1 => device.pwm_set_param(channel, 100, 50),
            2 => device.pwm_enable(channel, false),
            3 => device.pto_set_param(channel, 100, 0, 1),
            4 => device.pto_enable(channel, false),
            _ => device.pto_state(channel).map(drop),
        },
        Subsystem::Temperature => match op % 2 {
            0 => device.temperature_raw(channel).map(drop),
            _ => device.temperature(channel).map(drop),
        },
        // Reached only through counter and board queries.
        Subsystem::AnalogOut | Subsystem::Encoder => Ok(()),
    }
}

proptest! {
    #[test]
    fn prop_unknown_codes_never_success(code in any::<i32>()) {
        let kind = classify(code);
        if ResultCode::from_raw(code).is_none() {
            prop_assert_eq!(kind, ErrorKind::Unknown(code));
        }
        if code != 0 {
            prop_assert_ne!(kind, ErrorKind::Success);
        }
    }

    #[test]
    fn prop_refcount_follows_balanced_sequence(ops in prop::collection::vec(any::<bool>(), 0..64)) {
        let driver = Arc::new(SimulatedDriver::new());
        let device = Device::new(driver.clone());
        let mut expected = 0usize;
        for acquire in ops {
            if acquire {
                device.acquire().unwrap();
                expected += 1;
            } else if expected > 0 {
                device.release().unwrap();
                expected -= 1;
            } else {
                prop_assert_eq!(device.release(), Err(Error::NotAcquired));
            }
            prop_assert_eq!(device.ref_count(), expected);
            prop_assert_eq!(device.is_active(), expected > 0);
        }
        let opened = driver.call_count("initialize");
        let closed = driver.call_count("shut_down");
        prop_assert_eq!(opened - closed, usize::from(expected > 0));
    }

    #[test]
    fn prop_out_of_range_rejected_without_foreign_call(
        subsystem in subsystem_strategy(),
        offset in 0u8..64,
        op in any::<u8>(),
    ) {
        let driver = Arc::new(SimulatedDriver::new());
        let session = Device::new(driver.clone()).open().unwrap();
        let info = session.hardware_info().unwrap();
        let count = info.channel_count(subsystem);
        let Ok(channel) = u8::try_from(u16::from(offset) + count) else {
            return Ok(());
        };
        let before = driver.calls().len();
        let err = touch(&session, subsystem, channel, op).unwrap_err();
        prop_assert_eq!(err, Error::invalid_channel(subsystem, channel, count));
        prop_assert_eq!(driver.calls().len(), before);
    }

    #[test]
    fn prop_in_range_channels_accepted(
        subsystem in subsystem_strategy(),
        raw in any::<u8>(),
        op in any::<u8>(),
    ) {
        let driver = Arc::new(SimulatedDriver::new());
        let session = Device::new(driver).open().unwrap();
        let count = session.hardware_info().unwrap().channel_count(subsystem);
        let channel = u8::try_from(u16::from(raw) % count).unwrap();
        prop_assert!(touch(&session, subsystem, channel, op).is_ok());
    }

    #[test]
    fn prop_pwm_validation(
        timebase in timebase_strategy(),
        period in any::<u16>(),
        pulse_len in any::<u16>(),
    ) {
        let config = PwmConfig::new(timebase, period, pulse_len);
        prop_assert_eq!(config.validate().is_ok(), period > 0 && pulse_len <= period);
        if config.validate().is_ok() {
            prop_assert!((0.0..=1.0).contains(&config.duty_cycle()));
        }
    }
}

#[test]
fn test_defined_codes_classify_distinctly() {
    let kinds: HashSet<ErrorKind> = ResultCode::ALL
        .iter()
        .map(|code| classify(code.raw()))
        .collect();
    assert_eq!(kinds.len(), ResultCode::ALL.len());
    assert!(!kinds.iter().any(|k| matches!(k, ErrorKind::Unknown(_))));
}
