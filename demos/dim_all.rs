//! Dim or brighten bulbs relative to their current level
//!
//! Run with: LIGHTSD_PORT=1234 cargo run --example dim_all -- -0.2 '#kitchen'

use lightsc::{ClientBuilder, Target};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    lightsc::core::init_logging("info")?;

    let mut args = std::env::args().skip(1);
    let delta: f64 = match args.next() {
        Some(raw) => raw.parse()?,
        None => -0.1,
    };
    let target = args.next().map(Target::from).unwrap_or_else(Target::all);

    let mut client = ClientBuilder::from_env()?.connect().await?;

    println!("Adjusting brightness of {} by {:+}", target, delta);
    let outcomes = client.adjust_brightness(target, delta).await?;
    let refused = outcomes.iter().filter(|outcome| outcome.is_err()).count();
    println!("{} bulbs updated, {} refused", outcomes.len() - refused, refused);
    for error in outcomes.iter().filter_map(|outcome| outcome.as_ref().err()) {
        println!("  {}", error);
    }

    for bulb in client.get_light_states(Target::all()).await? {
        println!("  {:<20} brightness={:.2}", bulb.label, bulb.hsbk.brightness);
    }

    client.close().await?;
    Ok(())
}
