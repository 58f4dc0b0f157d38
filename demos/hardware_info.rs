//! Hardware Info Example
//!
//! Reports driver version, channel layout and diagnostic state of the board.
//!
//! Run with: cargo run --features native --example `hardware_info`

use ctr700::{Device, Subsystem};
use tracing_subscriber::EnvFilter;

fn main() -> ctr700::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("CTR_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let Some(device) = Device::linked() else {
        println!("libctr700drv not linked, nothing to report");
        return Ok(());
    };

    println!("╔════════════════════════════════════════════════════════════╗");
    println!("║          CTR-700 - Hardware Information                    ║");
    println!("╚════════════════════════════════════════════════════════════╝");
    println!();
    println!("Driver Version:  {}", device.version()?);
    println!("Binding Version: {}", ctr700::VERSION);
    println!();

    let session = device.open()?;
    let info = session.hardware_info()?;
    println!("PCB revision: {}", info.pcb_revision);
    for subsystem in [
        Subsystem::DigitalIn,
        Subsystem::DigitalOut,
        Subsystem::Relay,
        Subsystem::AnalogIn,
        Subsystem::AnalogOut,
        Subsystem::Counter,
        Subsystem::Encoder,
        Subsystem::Pwm,
        Subsystem::Temperature,
    ] {
        println!("  {:<16} {:>3}", subsystem.to_string(), info.channel_count(subsystem));
    }
    println!();

    let diag = session.diag_info()?;
    println!("Diagnostics: {diag}");
    println!("Healthy:     {}", if diag.is_healthy() { "yes" } else { "NO" });
    println!("Run switch:  {}", if session.run_switch()? { "RUN" } else { "STOP" });
    println!("Power fail:  {}", session.power_fail()?);
    for sensor in 0..u8::try_from(info.temperature).unwrap_or(u8::MAX) {
        println!("Temperature {sensor}: {:.2} °C", session.temperature(sensor)?);
    }

    session.close()
}
