use esp_led_remote::brightness::Direction;
use esp_led_remote::config::{ConfigData, MemoryStore, PlaylistEntry, RecordStore};
use esp_led_remote::device::{DeviceCommand, DeviceGateway, Rgb};
use esp_led_remote::state::{StartOutcome, State};
use esp_led_remote::ui::{find_swatch, StatusLevel};
use esp_led_remote::{MockGateway, Remote, SharedStore};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

fn remote_with(gateway: MockGateway, config: ConfigData) -> Remote<MockGateway> {
    let store: SharedStore = Arc::new(Mutex::new(MemoryStore::new(config)));
    Remote::new(gateway, store)
}

fn abc_config() -> ConfigData {
    ConfigData {
        cycle: vec![
            PlaylistEntry::new("A", "#ff0000", "a"),
            PlaylistEntry::new("B", "#00ff00", "b"),
            PlaylistEntry::new("C", "#0000ff", "c"),
        ],
        ..ConfigData::default()
    }
}

#[tokio::test(start_paused = true)]
async fn test_cycle_walks_playlist_in_order() {
    let remote = remote_with(MockGateway::new(), abc_config());
    assert_eq!(remote.cycle.start(), StartOutcome::Started);
    assert_eq!(remote.cycle.state(), State::Running);

    sleep(Duration::from_millis(10)).await;
    assert_eq!(remote.gateway.button_presses(), vec!["a"]);

    sleep(Duration::from_secs(3)).await;
    assert_eq!(remote.gateway.button_presses(), vec!["a", "b"]);

    sleep(Duration::from_secs(6)).await;
    assert_eq!(remote.gateway.button_presses(), vec!["a", "b", "c", "a"]);
    assert_eq!(remote.status.snapshot().preview.unwrap().label, "A");

    remote.cycle.stop();
}

#[tokio::test(start_paused = true)]
async fn test_tick_overhead_is_absorbed() {
    // Each press takes 1s, so the wait after a tick shrinks to 2s.
    let remote = remote_with(MockGateway::with_latency(Duration::from_secs(1)), abc_config());
    remote.cycle.start();

    sleep(Duration::from_millis(10)).await;
    assert_eq!(remote.gateway.button_presses(), vec!["a"]);

    sleep(Duration::from_secs(3)).await;
    assert_eq!(remote.gateway.button_presses(), vec!["a", "b"]);

    sleep(Duration::from_secs(3)).await;
    assert_eq!(remote.gateway.button_presses(), vec!["a", "b", "c"]);

    remote.cycle.stop();
}

#[tokio::test(start_paused = true)]
async fn test_one_second_interval_with_slow_device() {
    let config = ConfigData {
        cycle_interval: 1.0,
        ..abc_config()
    };
    let remote = remote_with(MockGateway::with_latency(Duration::from_millis(300)), config);
    remote.cycle.start();

    sleep(Duration::from_millis(3010)).await;
    assert_eq!(remote.gateway.button_presses(), vec!["a", "b", "c", "a"]);
    remote.cycle.stop();
}

#[tokio::test(start_paused = true)]
async fn test_empty_playlist_does_not_start() {
    let remote = remote_with(MockGateway::new(), ConfigData::default());
    assert_eq!(remote.cycle.start(), StartOutcome::EmptyPlaylist);
    assert_eq!(remote.cycle.state(), State::Idle);
    assert_eq!(remote.status.active_toast().as_deref(), Some("Add colors to the cycle first"));

    sleep(Duration::from_secs(10)).await;
    assert!(remote.gateway.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_second_start_is_ignored() {
    let remote = remote_with(MockGateway::new(), abc_config());
    assert_eq!(remote.cycle.start(), StartOutcome::Started);
    assert_eq!(remote.cycle.start(), StartOutcome::AlreadyRunning);

    sleep(Duration::from_millis(3010)).await;
    assert_eq!(remote.gateway.button_presses(), vec!["a", "b"]);
    remote.cycle.stop();
}

#[tokio::test(start_paused = true)]
async fn test_stop_then_start_restarts_from_first_entry() {
    let remote = remote_with(MockGateway::new(), abc_config());
    remote.cycle.start();
    sleep(Duration::from_millis(3010)).await;
    assert_eq!(remote.gateway.button_presses(), vec!["a", "b"]);

    remote.cycle.stop();
    remote.cycle.stop();
    assert_eq!(remote.cycle.state(), State::Idle);
    assert_eq!(remote.cycle.current_index(), None);

    sleep(Duration::from_secs(10)).await;
    assert_eq!(remote.gateway.button_presses(), vec!["a", "b"]);

    remote.gateway.clear_calls();
    remote.cycle.start();
    sleep(Duration::from_millis(10)).await;
    assert_eq!(remote.gateway.button_presses(), vec!["a"]);
    remote.cycle.stop();
}

#[tokio::test(start_paused = true)]
async fn test_stop_during_tick_schedules_nothing_more() {
    let remote = remote_with(MockGateway::with_latency(Duration::from_secs(1)), abc_config());
    remote.cycle.start();
    sleep(Duration::from_millis(500)).await;
    remote.cycle.stop();

    sleep(Duration::from_secs(20)).await;
    assert_eq!(remote.gateway.button_presses(), vec!["a"]);
}

#[tokio::test(start_paused = true)]
async fn test_restart_waits_for_the_stopped_tick() {
    // Each press takes 100ms: a full dim tick is 5 down, the switch, then 5 up.
    let config = ConfigData {
        dim_between: true,
        dim_target_pct: 70.0,
        dim_delay: 0,
        ..abc_config()
    };
    let remote = remote_with(MockGateway::with_latency(Duration::from_millis(100)), config);
    remote.cycle.start();
    sleep(Duration::from_millis(250)).await;
    remote.cycle.stop();
    assert_eq!(remote.cycle.start(), StartOutcome::Started);

    sleep(Duration::from_millis(3000)).await;
    let mut tick = vec!["down"; 5];
    tick.push("a");
    tick.extend(vec!["up"; 5]);
    let expected: Vec<&str> = tick.iter().chain(tick.iter()).copied().collect();
    assert_eq!(remote.gateway.button_presses(), expected);
    assert_eq!(remote.status.snapshot().brightness_pct, 100);
    assert_eq!(remote.cycle.state(), State::Running);
    remote.cycle.stop();
}

#[tokio::test(start_paused = true)]
async fn test_huge_interval_keeps_scheduler_usable() {
    let config = ConfigData {
        cycle_interval: 1e20,
        ..abc_config()
    };
    let remote = remote_with(MockGateway::new(), config);
    remote.cycle.start();

    sleep(Duration::from_millis(50)).await;
    assert_eq!(remote.gateway.button_presses(), vec!["a"]);
    assert_eq!(remote.cycle.state(), State::Running);

    remote.cycle.stop();
    assert_eq!(remote.cycle.state(), State::Idle);
    assert_eq!(remote.cycle.start(), StartOutcome::Started);
    sleep(Duration::from_millis(50)).await;
    assert_eq!(remote.gateway.button_presses(), vec!["a", "a"]);
    remote.cycle.stop();
}

#[tokio::test(start_paused = true)]
async fn test_dim_between_switches() {
    let config = ConfigData {
        dim_between: true,
        dim_target_pct: 70.0,
        dim_delay: 0,
        ..abc_config()
    };
    let remote = remote_with(MockGateway::new(), config);
    remote.cycle.start();
    sleep(Duration::from_millis(10)).await;
    remote.cycle.stop();

    let mut expected = vec!["down"; 5];
    expected.push("a");
    expected.extend(vec!["up"; 5]);
    assert_eq!(remote.gateway.button_presses(), expected);
    assert_eq!(remote.status.snapshot().brightness_pct, 100);
}

#[tokio::test(start_paused = true)]
async fn test_dim_press_delay_spaces_presses() {
    let config = ConfigData {
        dim_between: true,
        dim_target_pct: 70.0,
        dim_delay: 120,
        ..abc_config()
    };
    let remote = remote_with(MockGateway::new(), config);
    remote.cycle.start();

    // Five dim presses, 120ms apart, before the colour switch.
    sleep(Duration::from_millis(550)).await;
    assert_eq!(remote.gateway.button_presses(), vec!["down"; 5]);
    sleep(Duration::from_millis(100)).await;
    assert_eq!(remote.gateway.button_presses().get(5).map(String::as_str), Some("a"));
    remote.cycle.stop();
}

#[tokio::test(start_paused = true)]
async fn test_failures_keep_the_cycle_running() {
    let remote = remote_with(MockGateway::new(), abc_config());
    remote.gateway.set_failing(true);
    remote.cycle.start();

    sleep(Duration::from_millis(10)).await;
    let snapshot = remote.status.snapshot();
    assert_eq!(snapshot.level, StatusLevel::Bad);
    assert_eq!(snapshot.text, "Error");
    assert_eq!(remote.status.active_toast().as_deref(), Some("Send failed"));

    sleep(Duration::from_secs(3)).await;
    assert_eq!(remote.cycle.state(), State::Running);
    assert_eq!(remote.gateway.button_presses(), vec!["a", "b"]);
    remote.cycle.stop();
}

#[tokio::test(start_paused = true)]
async fn test_playlist_edits_persist() {
    let store = Arc::new(Mutex::new(MemoryStore::new(ConfigData::default())));
    let shared: SharedStore = store.clone();
    let remote = Remote::new(MockGateway::new(), shared);

    assert_eq!(remote.cycle.add_entry(PlaylistEntry::new("A", "#ff0000", "a")), 1);
    assert_eq!(remote.cycle.add_entry(PlaylistEntry::new("A", "#ff0000", "a")), 2);
    assert!(remote.cycle.remove_entry(7).is_none());
    assert_eq!(remote.status.snapshot().queue.len(), 2);

    {
        let store = store.lock().unwrap();
        assert_eq!(store.record().cycle.len(), 2);
        assert_eq!(store.save_count(), 2);
    }

    remote.cycle.start();
    remote.cycle.remove_entry(0);
    assert_eq!(remote.cycle.state(), State::Running);
    remote.cycle.remove_entry(0);
    assert_eq!(remote.cycle.state(), State::Idle);
    assert!(store.lock().unwrap().record().cycle.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_settings_apply_from_next_tick() {
    let remote = remote_with(MockGateway::new(), abc_config());
    remote.cycle.start();
    sleep(Duration::from_millis(10)).await;

    let mut settings = remote.cycle.settings();
    settings.interval_secs = 1.0;
    remote.cycle.update_settings(settings);

    // The wait already under way keeps the old 3s interval.
    sleep(Duration::from_millis(2000)).await;
    assert_eq!(remote.gateway.button_presses(), vec!["a"]);
    sleep(Duration::from_millis(1000)).await;
    assert_eq!(remote.gateway.button_presses(), vec!["a", "b"]);
    sleep(Duration::from_millis(1000)).await;
    assert_eq!(remote.gateway.button_presses(), vec!["a", "b", "c"]);
    remote.cycle.stop();
}

#[tokio::test(start_paused = true)]
async fn test_swatch_click_honours_add_to_cycle() {
    let remote = remote_with(MockGateway::new(), ConfigData::default());
    let red = find_swatch("Red").unwrap();

    remote.select_swatch(red).await.unwrap();
    assert_eq!(remote.gateway.button_presses(), vec!["red"]);
    assert_eq!(remote.status.snapshot().preview.unwrap().fill, "#ff0000");

    remote.set_add_to_cycle(true);
    remote.select_swatch(red).await.unwrap();
    assert_eq!(remote.gateway.button_presses(), vec!["red"]);
    assert_eq!(remote.cycle.playlist(), vec![red.playlist_entry()]);
}

#[tokio::test(start_paused = true)]
async fn test_hold_repeats_until_release() {
    let remote = remote_with(MockGateway::new(), ConfigData::default());
    assert!(remote.hold_start(Direction::Down));
    assert!(!remote.hold_start(Direction::Up));
    assert!(remote.is_holding());

    // Fires at 0, 180 and 360ms.
    sleep(Duration::from_millis(400)).await;
    remote.hold_release();
    assert!(!remote.is_holding());
    assert_eq!(remote.gateway.button_presses(), vec!["down"; 3]);
    assert_eq!(remote.status.snapshot().brightness_pct, 81);

    sleep(Duration::from_secs(2)).await;
    assert_eq!(remote.gateway.button_presses().len(), 3);
}

#[tokio::test]
async fn test_color_is_prescaled_by_brightness() {
    let remote = remote_with(MockGateway::new(), ConfigData::default());
    for _ in 0..4 {
        remote.brightness_step(Direction::Down).await.unwrap();
    }
    assert_eq!(remote.status.snapshot().brightness_pct, 75);

    remote.gateway.clear_calls();
    remote.send_color("#ff8000").await.unwrap();
    assert_eq!(remote.gateway.calls(), vec![DeviceCommand::Color(Rgb::new(191, 96, 0))]);

    assert!(remote.send_color("orange").await.is_err());
    assert_eq!(remote.gateway.calls().len(), 1);
    assert_eq!(remote.status.active_toast().as_deref(), Some("Invalid color"));
}

#[tokio::test]
async fn test_unconfigured_device_sends_nothing() {
    let config = ConfigData {
        base_url: String::new(),
        ..ConfigData::default()
    };
    let remote = remote_with(MockGateway::new(), config);
    assert!(!remote.gateway.endpoint().is_configured());

    assert_eq!(remote.ping().await, StatusLevel::Warn);
    assert!(remote.press_button("red").await.is_err());
    assert!(remote.gateway.calls().is_empty());
    assert_eq!(remote.status.active_toast().as_deref(), Some("Base URL is empty"));

    assert_eq!(remote.save("http://10.0.0.7/", "").await, StatusLevel::Ok);
    assert_eq!(remote.gateway.endpoint().base_url(), "http://10.0.0.7");
}
