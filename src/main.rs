use anyhow::{bail, Context};
use clap::Parser;
use std::sync::{Arc, Mutex};

use esp_led_remote::about::about;
use esp_led_remote::config::{ConfigStore, PlaylistEntry};
use esp_led_remote::device::{DeviceEndpoint, HttpGateway};
use esp_led_remote::state::StartOutcome;
use esp_led_remote::ui::{find_swatch, StatusLevel, DEFAULT_SWATCHES};
use esp_led_remote::{Args, Command, ConfigCommand, CycleCommand, RecordStore, Remote, SharedStore, PROGRAM_TITLE};

// Application Entry Point
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::init();

    let args = Args::parse();
    log::info!("Starting {}", PROGRAM_TITLE);

    let store = match &args.config {
        Some(path) => ConfigStore::open(path),
        None => ConfigStore::open_default(),
    }
    .context("Failed to open config")?;
    log::debug!("Using config at {}", store.path().display());
    let store: SharedStore = Arc::new(Mutex::new(store));

    let remote = Remote::new(HttpGateway::new(DeviceEndpoint::new("", None)), store);
    let ok = run(&remote, args.command).await?;

    if let Some(toast) = remote.status.active_toast() {
        println!("{}", toast);
    }
    if !ok {
        bail!("{}", remote.status.snapshot().text);
    }
    Ok(())
}

// Runs one command. `Ok(false)` means the intent ran but reported a failure.
async fn run(remote: &Remote<HttpGateway>, command: Command) -> anyhow::Result<bool> {
    let ok = match command {
        Command::Ping => remote.ping().await == StatusLevel::Ok,
        Command::Button { name } => remote.press_button(&name).await.is_ok(),
        Command::Power { state } => remote.power(state).await.is_ok(),
        Command::Brightness { direction, times } => {
            let mut ok = true;
            for _ in 0..times {
                ok &= remote.brightness_step(direction).await.is_ok();
            }
            println!("Brightness: {}%", remote.status.snapshot().brightness_pct);
            ok
        }
        Command::Color { hex } => remote.send_color(&hex).await.is_ok(),
        Command::Ir { name } => remote.send_ir(&name).await.is_ok(),
        Command::Swatches => {
            for swatch in DEFAULT_SWATCHES {
                println!("{:<8} {}  ({})", swatch.name, swatch.hex, swatch.button_code);
            }
            true
        }
        Command::Swatch { name } => match find_swatch(&name) {
            Some(swatch) => remote.select_swatch(swatch).await.is_ok(),
            None => bail!("No swatch named {:?}", name),
        },
        Command::Config(ConfigCommand::Show) => {
            let record = remote.store.lock().map_err(|_| anyhow::anyhow!("Config lock poisoned"))?.record().clone();
            println!("Base URL:   {}", record.base_url);
            println!("Auth token: {}", if record.auth_token.is_empty() { "(none)" } else { "(set)" });
            println!("Cycle:      {} entries", record.cycle.len());
            true
        }
        Command::Config(ConfigCommand::Set { base_url, auth_token }) => {
            let (current_url, current_token) = {
                let store = remote.store.lock().map_err(|_| anyhow::anyhow!("Config lock poisoned"))?;
                let record = store.record();
                (record.base_url.clone(), record.auth_token.clone())
            };
            let base_url = base_url.unwrap_or(current_url);
            let auth_token = auth_token.unwrap_or(current_token);
            remote.save(&base_url, &auth_token).await == StatusLevel::Ok
        }
        Command::Cycle(command) => run_cycle(remote, command).await?,
        Command::About => {
            for line in about() {
                println!("{}", line);
            }
            true
        }
    };
    Ok(ok)
}

async fn run_cycle(remote: &Remote<HttpGateway>, command: CycleCommand) -> anyhow::Result<bool> {
    match command {
        CycleCommand::List => {
            let queue = remote.status.snapshot().queue;
            if queue.is_empty() {
                println!("Cycle is empty.");
            }
            for line in queue {
                println!("{}", line);
            }
        }
        CycleCommand::Add { name, fill, button } => {
            let len = remote.cycle.add_entry(PlaylistEntry::new(name, fill, button));
            println!("Cycle now has {} entries.", len);
        }
        CycleCommand::AddSwatch { name } => {
            let Some(swatch) = find_swatch(&name) else {
                bail!("No swatch named {:?}", name);
            };
            let len = remote.cycle.add_entry(swatch.playlist_entry());
            println!("Added {} ({} entries).", swatch.name, len);
        }
        CycleCommand::Remove { index } => {
            if remote.cycle.remove_entry(index).is_none() {
                bail!("No cycle entry at index {}", index);
            }
        }
        CycleCommand::Clear => remote.cycle.clear(),
        CycleCommand::Run => {
            if remote.cycle.start() != StartOutcome::Started {
                return Ok(false);
            }
            println!("Cycling, press Ctrl-C to stop.");
            tokio::signal::ctrl_c().await.context("Failed to wait for Ctrl-C")?;
            remote.cycle.stop();
        }
        CycleCommand::Settings {
            interval,
            dim_between,
            dim_target,
            dim_delay,
            add_to_cycle,
        } => {
            let mut settings = remote.cycle.settings();
            if let Some(v) = interval {
                settings.interval_secs = v;
            }
            if let Some(v) = dim_between {
                settings.dim_between = v;
            }
            if let Some(v) = dim_target {
                settings.dim_target_pct = v;
            }
            if let Some(v) = dim_delay {
                settings.press_delay_ms = v;
            }
            if let Some(v) = add_to_cycle {
                settings.add_to_cycle = v;
            }
            let settings = remote.cycle.update_settings(settings);
            println!("Interval:     {:.1}s", settings.interval_secs);
            println!("Dim between:  {}", settings.dim_between);
            println!("Dim target:   {:.0}%", settings.dim_target_pct);
            println!("Press delay:  {}ms", settings.press_delay_ms);
            println!("Add to cycle: {}", settings.add_to_cycle);
        }
    }
    Ok(true)
}
