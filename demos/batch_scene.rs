//! Set a scene in one round trip
//!
//! Queues several commands in a batch and sends them together, then prints
//! the outcome of each one.
//!
//! Run with: LIGHTSD_PORT=1234 cargo run --example batch_scene

use lightsc::{ClientBuilder, Hsbk, Target};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    lightsc::core::init_logging("info")?;

    let mut client = ClientBuilder::from_env()?.connect().await?;

    let warm = Hsbk::new(30.0, 0.4, 0.6, 2700);
    let mut batch = client.batch()?;
    batch.power_on(Target::all()).await?;
    batch
        .set_light_from_hsbk(
            Target::tag("kitchen"),
            warm.hue,
            warm.saturation,
            warm.brightness,
            warm.kelvin,
            800,
        )
        .await?;
    batch.power_off(Target::tag("bedroom")).await?;
    let pulse = batch
        .sine(Target::tag("desk"), Hsbk::new(200.0, 1.0, 0.8, 3500), 1000, 3.0, 0.5, true)
        .await?;
    println!("Sending {} commands", batch.pending_len());

    let results = batch.send().await?;
    for entry in &results {
        match &entry.outcome {
            Ok(value) => println!("  {:<20} ok {}", entry.method, value),
            Err(e) => println!("  {:<20} failed: {}", entry.method, e),
        }
    }

    if let Some(id) = pulse.queued_id() {
        let pulsed: bool = results.get(id)?;
        println!("Desk pulse accepted: {}", pulsed);
    }

    client.close().await?;
    Ok(())
}
