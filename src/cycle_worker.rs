use crate::brightness::{level_from_percent, presses_needed, Direction};
use crate::config::{CycleSettings, PlaylistEntry};
use crate::device::{brightness_button, report_failure, DeviceCommand, DeviceGateway};
use crate::state::{StartOutcome, State};
use crate::ui::{StatusBoard, StatusLevel};
use crate::util::lock_or_recover;
use crate::{SharedBrightness, SharedStore};
use log::{debug, error, info, trace, warn};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};

// Playlist, settings and run state shared between the handle and the worker task
struct Playback {
    playlist: Vec<PlaylistEntry>,
    settings: CycleSettings,
    run: Option<CycleRun>,
    // Bumped on every start and stop. A worker whose generation is stale never ticks again.
    generation: u64,
    // Most recently spawned worker. It may still be finishing a tick after stop().
    worker: Option<JoinHandle<()>>,
}

struct CycleRun {
    index: usize,
    generation: u64,
}

/// Walks the playlist on a timer, one button press per tick, with the
/// optional dim-switch-undim choreography around each switch.
///
/// Only one cycle runs at a time. Gateway calls made by a tick are strictly
/// sequential; manual presses made meanwhile are not coordinated with it.
pub struct CycleScheduler<G: DeviceGateway> {
    gateway: Arc<G>,
    brightness: SharedBrightness,
    status: StatusBoard,
    store: SharedStore,
    playback: Arc<Mutex<Playback>>,
    wake: Arc<Notify>,
}

impl<G: DeviceGateway> Clone for CycleScheduler<G> {
    fn clone(&self) -> Self {
        Self {
            gateway: self.gateway.clone(),
            brightness: self.brightness.clone(),
            status: self.status.clone(),
            store: self.store.clone(),
            playback: self.playback.clone(),
            wake: self.wake.clone(),
        }
    }
}

impl<G: DeviceGateway> CycleScheduler<G> {
    /// Creates an idle scheduler, restoring playlist and settings from `store`.
    pub fn new(
        gateway: Arc<G>,
        brightness: SharedBrightness,
        status: StatusBoard,
        store: SharedStore,
    ) -> Self {
        let (playlist, settings) = {
            let store = lock_or_recover(&store);
            let record = store.record();
            (record.cycle.clone(), record.cycle_settings())
        };
        info!("Restored cycle with {} entries", playlist.len());
        status.set_queue(&playlist);

        Self {
            gateway,
            brightness,
            status,
            store,
            playback: Arc::new(Mutex::new(Playback {
                playlist,
                settings,
                run: None,
                generation: 0,
                worker: None,
            })),
            wake: Arc::new(Notify::new()),
        }
    }

    pub fn state(&self) -> State {
        if lock_or_recover(&self.playback).run.is_some() {
            State::Running
        } else {
            State::Idle
        }
    }

    /// Number of ticks taken since the last start, if running.
    pub fn current_index(&self) -> Option<usize> {
        lock_or_recover(&self.playback).run.as_ref().map(|run| run.index)
    }

    pub fn playlist(&self) -> Vec<PlaylistEntry> {
        lock_or_recover(&self.playback).playlist.clone()
    }

    pub fn settings(&self) -> CycleSettings {
        lock_or_recover(&self.playback).settings
    }

    /// Starts cycling from the first entry. The first tick fires right away.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> StartOutcome {
        let mut playback = lock_or_recover(&self.playback);
        if playback.run.is_some() {
            debug!("Start ignored: cycle already running.");
            return StartOutcome::AlreadyRunning;
        }
        if playback.playlist.is_empty() {
            drop(playback);
            warn!("Start ignored: cycle playlist is empty.");
            self.status.toast("Add colors to the cycle first");
            return StartOutcome::EmptyPlaylist;
        }

        playback.generation += 1;
        let generation = playback.generation;
        playback.run = Some(CycleRun { index: 0, generation });

        // The worker blocks on `playback` until this guard drops, so it always
        // sees the run registered above.
        let previous = playback.worker.take();
        let worker = self.clone();
        playback.worker = Some(tokio::spawn(async move {
            if let Some(previous) = previous {
                // A stopped worker may be mid-tick. Its presses finish before ours begin.
                if previous.await.is_err() {
                    warn!("Previous cycle worker ended abnormally.");
                }
            }
            worker.run_worker_loop(generation).await
        }));
        info!(
            "Cycle started: {} entries every {:.1}s",
            playback.playlist.len(),
            playback.settings.interval_secs
        );
        StartOutcome::Started
    }

    /// Cancels the pending tick. Idempotent. A tick already in flight finishes
    /// its remaining presses but never schedules another.
    pub fn stop(&self) {
        let stopped = {
            let mut playback = lock_or_recover(&self.playback);
            let run = playback.run.take();
            if run.is_some() {
                playback.generation += 1;
            }
            run
        };

        if let Some(run) = stopped {
            // Lets a sleeping worker notice the stale generation now instead of after the interval.
            self.wake.notify_waiters();
            info!("Cycle stopped after {} ticks.", run.index);
        }
    }

    /// Stops and empties the playlist.
    pub fn clear(&self) {
        self.stop();
        lock_or_recover(&self.playback).playlist.clear();
        self.persist();
        self.render();
        info!("Cycle playlist cleared.");
    }

    /// Appends an entry and returns the new playlist length.
    pub fn add_entry(&self, entry: PlaylistEntry) -> usize {
        let len = {
            let mut playback = lock_or_recover(&self.playback);
            debug!("Adding {} to cycle", entry);
            playback.playlist.push(entry);
            playback.playlist.len()
        };
        self.persist();
        self.render();
        len
    }

    /// Removes the entry at `index`. Out-of-range indices are ignored.
    pub fn remove_entry(&self, index: usize) -> Option<PlaylistEntry> {
        let (removed, now_empty) = {
            let mut playback = lock_or_recover(&self.playback);
            if index >= playback.playlist.len() {
                warn!(
                    "Remove ignored: index {} out of range (playlist has {} entries)",
                    index,
                    playback.playlist.len()
                );
                return None;
            }
            let removed = playback.playlist.remove(index);
            (removed, playback.playlist.is_empty())
        };
        debug!("Removed {} from cycle", removed);
        if now_empty {
            self.stop();
        }
        self.persist();
        self.render();
        Some(removed)
    }

    /// Replaces the live settings. Takes effect from the next tick.
    pub fn update_settings(&self, settings: CycleSettings) -> CycleSettings {
        let settings = settings.clamped();
        lock_or_recover(&self.playback).settings = settings;
        debug!("Cycle settings updated: {:?}", settings);
        self.persist();
        settings
    }

    /// Writes playlist and settings back to the store.
    pub fn save(&self) {
        self.persist();
    }

    fn persist(&self) {
        let (playlist, settings) = {
            let playback = lock_or_recover(&self.playback);
            (playback.playlist.clone(), playback.settings)
        };
        let mut store = lock_or_recover(&self.store);
        let record = store.record_mut();
        record.cycle = playlist;
        record.set_cycle_settings(&settings);
        if let Err(e) = store.save() {
            error!("Failed to save cycle: {}", e);
        }
    }

    fn render(&self) {
        let playlist = self.playlist();
        self.status.set_queue(&playlist);
    }

    fn is_current(&self, generation: u64) -> bool {
        let playback = lock_or_recover(&self.playback);
        playback.generation == generation && playback.run.is_some()
    }

    fn level(&self) -> f64 {
        lock_or_recover(&self.brightness).level()
    }

    // The worker: tick, wait out the rest of the interval, repeat until stale
    async fn run_worker_loop(self, generation: u64) {
        info!("Cycle worker loop starting (generation {}).", generation);
        loop {
            let started = Instant::now();
            if !self.run_tick(generation).await {
                break;
            }

            let delay = next_delay(self.settings().interval(), started.elapsed());
            // Created before the check so a stop() landing in between still wakes us.
            let woken = self.wake.notified();
            if !self.is_current(generation) {
                break;
            }
            trace!("Next tick in {:?}", delay);
            tokio::select! {
                _ = sleep(delay) => {}
                _ = woken => {}
            }
            if !self.is_current(generation) {
                break;
            }
        }
        info!("Cycle worker loop finished (generation {}).", generation);
    }

    /// One lap step. Returns `false` when this generation has been stopped.
    async fn run_tick(&self, generation: u64) -> bool {
        let (entry, settings) = {
            let mut playback = lock_or_recover(&self.playback);
            let Playback {
                playlist,
                settings,
                run,
                ..
            } = &mut *playback;
            let run = match run {
                Some(run) if run.generation == generation => run,
                _ => return false,
            };
            if playlist.is_empty() {
                return true;
            }
            let entry = playlist[run.index % playlist.len()].clone();
            run.index = run.index.wrapping_add(1);
            (entry, *settings)
        };
        debug!("Tick: {}", entry.display_name);

        let pre_dip = self.level();
        if settings.dim_between {
            let target = level_from_percent(settings.dim_target_pct);
            if pre_dip > target {
                let presses = presses_needed(pre_dip, target);
                debug!("Dimming {} presses toward {:.0}%", presses, settings.dim_target_pct);
                self.press_brightness(Direction::Down, presses, settings.press_delay())
                    .await;
            }
        }

        self.status.set_preview(&entry.display_name, &entry.preview_fill);
        match self
            .gateway
            .send(DeviceCommand::Button(entry.button_code.clone()))
            .await
        {
            Ok(_) => self.status.set_status(StatusLevel::Ok, "Connected"),
            Err(e) => report_failure(&self.status, "Cycle color switch", &e),
        }

        if settings.dim_between {
            let dipped = self.level();
            if dipped < pre_dip {
                let presses = presses_needed(dipped, pre_dip);
                debug!("Restoring brightness with {} presses", presses);
                self.press_brightness(Direction::Up, presses, settings.press_delay())
                    .await;
            }
        }
        true
    }

    // Each press is awaited, then the model steps, then the device gets `delay` to register it.
    async fn press_brightness(&self, direction: Direction, presses: u32, delay: Duration) {
        for i in 0..presses {
            let result = self
                .gateway
                .send(DeviceCommand::Button(brightness_button(direction).to_string()))
                .await;
            let percent = {
                let mut model = lock_or_recover(&self.brightness);
                model.step(direction);
                model.percent()
            };
            self.status.set_brightness(percent);
            trace!("Brightness {} press {}/{} -> {}%", direction, i + 1, presses, percent);
            if let Err(e) = result {
                report_failure(&self.status, "Brightness press", &e);
            }
            if !delay.is_zero() {
                sleep(delay).await;
            }
        }
    }
}

/// Time left in the interval after a tick that took `elapsed`. Never negative:
/// overhead beyond the interval makes the next tick fire immediately.
pub fn next_delay(interval: Duration, elapsed: Duration) -> Duration {
    interval.saturating_sub(elapsed)
}
