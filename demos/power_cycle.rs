//! Power cycle every bulb
//!
//! Turns all bulbs off, waits, then turns them back on and prints what
//! lightsd reports.
//!
//! Run with: LIGHTSD_PORT=1234 cargo run --example power_cycle

use lightsc::{ClientBuilder, Target};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    lightsc::core::init_logging("info")?;

    let builder = ClientBuilder::from_env()?;
    println!("Connecting to lightsd@{}:{}", builder.host(), builder.port());
    let mut client = builder.connect().await?;

    client.power_off(Target::all()).await?;
    println!("All bulbs off");

    tokio::time::sleep(Duration::from_secs(2)).await;

    client.power_on(Target::all()).await?;
    println!("All bulbs on");

    for bulb in client.get_light_states(Target::all()).await? {
        println!(
            "  {:<20} power={} hsbk={:?} tags={:?}",
            bulb.label, bulb.power, bulb.hsbk, bulb.tags
        );
    }

    client.close().await?;
    Ok(())
}
