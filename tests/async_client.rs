mod common;

use breatheaudio::{AmplifierClient, AmplifierConfig, AsyncTransport, BreatheError};
use common::{init_tracing, spawn_device, SimAmplifier};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(2);

fn connect() -> (AmplifierClient, Arc<Mutex<SimAmplifier>>) {
    let sim = SimAmplifier::shared();
    let (transport, link) = AsyncTransport::channel(TIMEOUT);
    spawn_device(link, sim.clone());
    (AmplifierClient::new(transport), sim)
}

fn config() -> AmplifierConfig {
    AmplifierConfig::new("/dev/ttyUSB0")
        .with_source(1, "Streamer")
        .with_source(2, "Turntable")
        .with_source(3, "TV")
}

#[tokio::test]
async fn commands_reach_the_device() {
    init_tracing();
    let (client, sim) = connect();

    client.set_power(2, true).await.unwrap();
    client.set_source(2, 4).await.unwrap();
    client.set_volume(2, 50).await.unwrap();

    let status = client.zone_status(2).await.unwrap().unwrap();
    assert!(status.power);
    assert_eq!(status.source, 4);
    assert!((status.volume - 39.0 / 78.0 * 100.0).abs() < 1e-9);

    let zone = sim.lock().unwrap().zone(2);
    assert_eq!(zone.native_volume, 39);
}

#[tokio::test]
async fn invalid_zone_is_rejected() {
    let (client, sim) = connect();
    assert!(matches!(
        client.set_mute(9, true).await,
        Err(BreatheError::InvalidZone(9))
    ));
    assert!(sim.lock().unwrap().frames.is_empty());
}

#[tokio::test]
async fn snapshot_then_restore_reproduces_state() {
    let (client, sim) = connect();

    client.set_power(5, true).await.unwrap();
    client.set_volume(5, 63).await.unwrap();
    client.set_source(5, 3).await.unwrap();
    let captured = client.snapshot(5).await.unwrap().unwrap();
    assert_eq!(client.snapshot_of(5), Some(captured));

    client.set_power(5, false).await.unwrap();
    assert!(client.restore(5).await.unwrap());

    assert_eq!(client.zone_status(5).await.unwrap(), Some(captured));
    assert!(!client.restore(6).await.unwrap());

    let frames = sim.lock().unwrap().frames.clone();
    assert!(!frames.iter().any(|f| f.starts_with("*Z06")));
}

#[tokio::test]
async fn concurrent_callers_get_their_own_replies() {
    let (client, sim) = connect();
    for zone in 1..=6u8 {
        client.set_power(zone, true).await.unwrap();
        client.set_source(zone, i32::from(zone)).await.unwrap();
    }

    let mut tasks = Vec::new();
    for zone in 1..=6u8 {
        let client = client.clone();
        tasks.push(tokio::spawn(async move {
            for _ in 0..10 {
                let status = client.zone_status(zone).await.unwrap().unwrap();
                assert_eq!(status.zone, zone);
                assert_eq!(status.source, zone);
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(sim.lock().unwrap().frames.len(), 12 + 60);
}

#[tokio::test(start_paused = true)]
async fn silent_device_times_out() {
    let (client, sim) = connect();
    sim.lock().unwrap().silent = true;

    assert_eq!(client.zone_status(1).await.unwrap(), None);
    assert!(matches!(
        client.set_power(1, true).await,
        Err(BreatheError::Timeout { .. })
    ));
    assert!(client.probe().await.unwrap_err().is_connectivity());

    // The lock is released after a timeout
    sim.lock().unwrap().silent = false;
    client.set_power(1, true).await.unwrap();
    assert!(client.zone_status(1).await.unwrap().unwrap().power);
}

#[tokio::test(start_paused = true)]
async fn zones_track_last_known_state() {
    let (client, sim) = connect();
    let sources = config().source_table().unwrap();
    let zones = client.zones(&sources);
    assert_eq!(zones.len(), 6);
    assert_eq!(zones[0].name(), "Zone 1");
    assert_eq!(zones[5].unique_id("amp"), "amp_6");

    let zone = &zones[2];
    assert_eq!(zone.state(), None);
    assert_eq!(zone.source_list(), ["Streamer", "Turntable", "TV"]);

    zone.turn_on().await.unwrap();
    zone.select_source("TV").await.unwrap();
    zone.set_volume_level(0.5).await.unwrap();
    assert!(zone.update().await.unwrap());

    let state = zone.state().unwrap();
    assert!(state.power);
    assert_eq!(state.source_name.as_deref(), Some("TV"));
    assert!((state.volume_level - 0.5).abs() < 1e-9);

    zone.volume_up().await.unwrap();
    zone.update().await.unwrap();
    assert_eq!(sim.lock().unwrap().zone(3).native_volume, 47);

    let frames_before = sim.lock().unwrap().frames.len();
    zone.select_source("Radio").await.unwrap();
    assert_eq!(sim.lock().unwrap().frames.len(), frames_before);

    // A failed poll keeps the previous state
    let before = zone.state();
    sim.lock().unwrap().silent = true;
    assert!(!zone.update().await.unwrap());
    assert_eq!(zone.state(), before);
}

#[tokio::test]
async fn volume_step_needs_known_volume() {
    let (client, sim) = connect();
    let zones = client.zones(&config().source_table().unwrap());

    zones[0].volume_down().await.unwrap();
    assert!(sim.lock().unwrap().frames.is_empty());
}

#[tokio::test]
async fn zone_restore_refreshes_state() {
    let (client, _sim) = connect();
    let zones = client.zones(&config().source_table().unwrap());
    let zone = &zones[1];

    zone.turn_on().await.unwrap();
    zone.mute_volume(true).await.unwrap();
    zone.snapshot().await.unwrap();
    zone.turn_off().await.unwrap();

    assert!(zone.restore().await.unwrap());
    let state = zone.state().unwrap();
    assert!(state.power);
    assert!(state.mute);
}
