//! Counter Example
//!
//! Counts edges on counter 0, counting down from a preload, and prints the
//! value until the RUN/STOP switch is set to STOP.
//!
//! Run with: cargo run --features native --example counter

use ctr700::{CounterConfig, CounterDirection, CounterMode, CounterTrigger, Device};
use std::thread::sleep;
use std::time::Duration;
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

    let config = CounterConfig::new(CounterMode::Counter)
        .with_trigger(CounterTrigger::AnyEdge)
        .with_direction(CounterDirection::Down);
    session.counter_set_mode(0, config)?;
    session.counter_set_preload(0, 1000)?;
    session.counter_enable(0, true)?;

    while session.run_switch()? {
        println!("CNT0: {:>8}", session.counter_value(0)?);
        sleep(Duration::from_millis(200));
    }

    session.counter_enable(0, false)?;
    session.close()
}
