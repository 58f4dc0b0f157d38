//! Runlight Example
//!
//! Rotates a single lit output across the digital outputs. Pressing DI0
//! reverses the direction; the RUN/STOP switch in STOP ends the demo.
//!
//! Run with: cargo run --features native --example runlight

use ctr700::{Device, Trigger, WatchdogMode};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> ctr700::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("CTR_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let Some(device) = Device::linked() else {
        println!("libctr700drv not linked");
        return Ok(());
    };
    let session = device.open()?;
    let outputs = u8::try_from(session.hardware_info()?.digital_out).unwrap_or(u8::MAX);
    if outputs == 0 {
        println!("board has no digital outputs");
        return session.close();
    }

    let reverse = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&reverse);
    session.register_interrupt(0, Trigger::RISING_EDGE, move |_| {
        flag.fetch_xor(true, Ordering::SeqCst);
    })?;

    session.enable_watchdog(WatchdogMode::MonitorOnly)?;
    session.set_run_led(true)?;
    info!(outputs, "runlight started");

    let mut lit: u8 = 0;
    while session.run_switch()? {
        session.set_digital_out(lit, false)?;
        lit = if reverse.load(Ordering::SeqCst) {
            lit.checked_sub(1).unwrap_or(outputs - 1)
        } else {
            (lit + 1) % outputs
        };
        session.set_digital_out(lit, true)?;
        session.service_watchdog()?;
        sleep(Duration::from_millis(100));
    }

    session.set_digital_out(lit, false)?;
    session.set_run_led(false)?;
    session.unregister_interrupt(0)?;
    info!("runlight stopped");
    session.close()
}
