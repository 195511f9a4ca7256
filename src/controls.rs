use crate::brightness::Direction;
use crate::device::{
    brightness_button, check_health, ir_code_for, report_failure, DeviceCommand, DeviceEndpoint,
    DeviceGateway, PowerState,
};
use crate::error::RemoteError;
use crate::ui::{StatusBoard, StatusLevel, Swatch};
use crate::util::{lock_or_recover, parse_hex_color};
use crate::{Remote, SharedBrightness};
use log::{debug, info};
use serde_json::Value;
use std::sync::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Re-fire period while a brightness button is held.
pub const HOLD_REPEAT_MS: u64 = 180;

// --- Intent handlers ---
// Every handler reports its own outcome on the status board; the returned
// Result is informational for callers such as the CLI.

impl<G: DeviceGateway> Remote<G> {
    /// Points the gateway at the address and key in the stored record.
    pub fn load_saved(&self) {
        let endpoint = {
            let store = lock_or_recover(&self.store);
            let record = store.record();
            DeviceEndpoint::new(&record.base_url, record.auth_key())
        };
        info!("Device address: {}", endpoint.base_url());
        self.gateway.set_endpoint(endpoint);
    }

    /// Stores connection settings (and the current cycle), then pings.
    pub async fn save(&self, base_url: &str, auth_token: &str) -> StatusLevel {
        {
            let mut store = lock_or_recover(&self.store);
            let record = store.record_mut();
            record.base_url = base_url.trim().to_string();
            record.auth_token = auth_token.trim().to_string();
        }
        self.cycle.save();
        self.load_saved();
        self.status.toast("Saved");
        self.ping().await
    }

    pub async fn ping(&self) -> StatusLevel {
        check_health(&*self.gateway, &self.status).await
    }

    pub async fn press_button(&self, name: &str) -> Result<Value, RemoteError> {
        self.dispatch(DeviceCommand::Button(name.to_string()), name).await
    }

    pub async fn power(&self, state: PowerState) -> Result<Value, RemoteError> {
        let label = match state {
            PowerState::On => "Power ON",
            PowerState::Off => "Power OFF",
        };
        self.dispatch(DeviceCommand::Power(state), label).await
    }

    /// One brightness press; the tracked level moves with it.
    pub async fn brightness_step(&self, direction: Direction) -> Result<Value, RemoteError> {
        step_brightness(&*self.gateway, &self.brightness, &self.status, direction).await
    }

    /// Sends `hex` as a direct colour, scaled by the tracked brightness.
    pub async fn send_color(&self, hex: &str) -> Result<Value, RemoteError> {
        let rgb = match parse_hex_color(hex) {
            Ok(rgb) => rgb,
            Err(e) => {
                report_failure(&self.status, "Color", &e);
                return Err(e);
            }
        };
        let percent = lock_or_recover(&self.brightness).percent();
        self.status.set_preview(&hex.to_uppercase(), hex);
        self.dispatch(DeviceCommand::Color(rgb.prescaled(percent)), "Color sent")
            .await
    }

    /// Sends a named IR command from the NEC table.
    pub async fn send_ir(&self, name: &str) -> Result<Value, RemoteError> {
        let code = match ir_code_for(name) {
            Ok(code) => code,
            Err(e) => {
                report_failure(&self.status, "IR", &e);
                return Err(e);
            }
        };
        self.dispatch(DeviceCommand::Ir(code), name).await
    }

    /// Swatch click: queues the swatch when add-to-cycle is on, otherwise
    /// previews it and presses its button.
    pub async fn select_swatch(&self, swatch: &Swatch) -> Result<Value, RemoteError> {
        if self.cycle.settings().add_to_cycle {
            let len = self.cycle.add_entry(swatch.playlist_entry());
            self.status.toast(&format!("Added {} to cycle ({})", swatch.name, len));
            return Ok(Value::Null);
        }
        self.status.set_preview(swatch.name, swatch.hex);
        self.dispatch(DeviceCommand::Button(swatch.button_code.to_string()), swatch.name)
            .await
    }

    pub fn set_add_to_cycle(&self, enabled: bool) {
        let mut settings = self.cycle.settings();
        settings.add_to_cycle = enabled;
        self.cycle.update_settings(settings);
    }

    /// Starts re-firing brightness presses every [`HOLD_REPEAT_MS`] until
    /// [`Remote::hold_release`]. Returns `false` if a hold is already active.
    pub fn hold_start(&self, direction: Direction) -> bool {
        let gateway = self.gateway.clone();
        let brightness = self.brightness.clone();
        let status = self.status.clone();
        self.hold.start(async move {
            let mut ticker = interval(Duration::from_millis(HOLD_REPEAT_MS));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let _ = step_brightness(&*gateway, &brightness, &status, direction).await;
            }
        })
    }

    pub fn hold_release(&self) {
        self.hold.release();
    }

    pub fn is_holding(&self) -> bool {
        self.hold.is_active()
    }

    async fn dispatch(&self, command: DeviceCommand, success: &str) -> Result<Value, RemoteError> {
        let context = command.to_string();
        match self.gateway.send(command).await {
            Ok(reply) => {
                self.status.set_status(StatusLevel::Ok, "Connected");
                self.status.toast(success);
                Ok(reply)
            }
            Err(e) => {
                report_failure(&self.status, &context, &e);
                Err(e)
            }
        }
    }
}

async fn step_brightness<G: DeviceGateway>(
    gateway: &G,
    brightness: &SharedBrightness,
    status: &StatusBoard,
    direction: Direction,
) -> Result<Value, RemoteError> {
    let result = gateway
        .send(DeviceCommand::Button(brightness_button(direction).to_string()))
        .await;
    let percent = {
        let mut model = lock_or_recover(brightness);
        model.step(direction);
        model.percent()
    };
    status.set_brightness(percent);
    match result {
        Ok(reply) => {
            status.set_status(StatusLevel::Ok, "Connected");
            debug!("Brightness {} -> {}%", direction, percent);
            Ok(reply)
        }
        Err(e) => {
            report_failure(status, "Brightness", &e);
            Err(e)
        }
    }
}

/// Press-and-hold repeat timer. At most one is active; a second start while
/// one runs is refused.
#[derive(Debug, Default)]
pub struct HoldRepeat {
    active: Mutex<Option<JoinHandle<()>>>,
}

impl HoldRepeat {
    pub fn start<F>(&self, repeat: F) -> bool
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let mut active = lock_or_recover(&self.active);
        if active.as_ref().is_some_and(|h| !h.is_finished()) {
            debug!("Hold ignored: a repeat is already active.");
            return false;
        }
        *active = Some(tokio::spawn(repeat));
        true
    }

    pub fn release(&self) {
        if let Some(handle) = lock_or_recover(&self.active).take() {
            handle.abort();
            debug!("Hold released.");
        }
    }

    pub fn is_active(&self) -> bool {
        lock_or_recover(&self.active)
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }
}

impl Drop for HoldRepeat {
    fn drop(&mut self) {
        self.release();
    }
}
