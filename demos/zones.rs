//! Poll and control a BreatheAudio amplifier from the command line
//!
//! ```text
//! cargo run --example zones -- /dev/ttyUSB0                 # print all zones
//! cargo run --example zones -- /dev/ttyUSB0 watch           # poll every 10s
//! cargo run --example zones -- /dev/ttyUSB0 2 volume 40     # set zone 2 volume
//! cargo run --example zones -- /dev/ttyUSB0 2 power on
//! ```

use breatheaudio::{AmplifierClient, AmplifierConfig, Zone, POLL_INTERVAL};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "breatheaudio=info".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(port) = args.first() else {
        eprintln!("usage: zones <port> [watch | <zone> <power|mute|volume|source> <value>]");
        std::process::exit(2);
    };

    let config = AmplifierConfig::new(port.as_str())
        .with_source(1, "Source 1")
        .with_source(2, "Source 2")
        .with_source(3, "Source 3")
        .with_source(4, "Source 4")
        .with_source(5, "Source 5")
        .with_source(6, "Source 6");

    let client = AmplifierClient::open(&config)?;
    if let Err(e) = client.probe().await {
        eprintln!("Amplifier at {} is not ready: {}", port, e);
        std::process::exit(1);
    }
    let zones = client.zones(&config.source_table()?);

    match args.get(1).map(String::as_str) {
        None => print_zones(&zones).await?,
        Some("watch") => loop {
            print_zones(&zones).await?;
            tokio::time::sleep(POLL_INTERVAL).await;
        },
        Some(zone) => {
            let zone: u8 = zone.parse()?;
            let (command, value) = match (args.get(2), args.get(3)) {
                (Some(command), Some(value)) => (command.as_str(), value.as_str()),
                _ => return Err("expected <command> <value>".into()),
            };
            match command {
                "power" => client.set_power(zone, value == "on").await?,
                "mute" => client.set_mute(zone, value == "on").await?,
                "volume" => client.set_volume(zone, value.parse()?).await?,
                "source" => client.set_source(zone, value.parse()?).await?,
                other => return Err(format!("unknown command {}", other).into()),
            }
            println!("{:?}", client.zone_status(zone).await?);
        }
    }

    Ok(())
}

async fn print_zones(zones: &[Zone]) -> Result<(), Box<dyn std::error::Error>> {
    for zone in zones {
        zone.update().await?;
        match zone.state() {
            Some(state) => println!(
                "{}: power={} mute={} volume={:.0}% source={}",
                zone.name(),
                state.power,
                state.mute,
                state.volume_level * 100.0,
                state.source_name.as_deref().unwrap_or("-")
            ),
            None => println!("{}: unknown", zone.name()),
        }
    }
    Ok(())
}
