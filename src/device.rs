use crate::brightness::Direction;
use crate::error::RemoteError;
use crate::ui::{StatusBoard, StatusLevel};
use log::{debug, trace, warn};
use reqwest::Method;
use serde_json::Value;
use std::future::Future;
use std::sync::RwLock;

/// Relay state for the `/power` endpoint.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PowerState {
    On,
    Off,
}

impl std::fmt::Display for PowerState {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            PowerState::On => write!(f, "on"),
            PowerState::Off => write!(f, "off"),
        }
    }
}

impl std::str::FromStr for PowerState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "on" => Ok(PowerState::On),
            "off" => Ok(PowerState::Off),
            other => Err(format!("expected on/off, got {:?}", other)),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Scales every channel by `percent` (0-100), the way the remote folds its
    /// brightness into a direct colour before sending it.
    pub fn prescaled(self, percent: u8) -> Self {
        let factor = f64::from(percent.min(100)) / 100.0;
        let scale = |c: u8| (f64::from(c) * factor).round() as u8;
        Self::new(scale(self.r), scale(self.g), scale(self.b))
    }
}

/// A raw IR frame for the `/ir` endpoint.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct IrCode {
    pub proto: &'static str,
    pub code: u32,
    pub bits: u8,
}

const NEC: &str = "NEC";

/// Named IR commands for the common 24-key RGB strip remote.
const IR_TABLE: &[(&str, IrCode)] = &[
    ("on", IrCode { proto: NEC, code: 0xF7C03F, bits: 32 }),
    ("off", IrCode { proto: NEC, code: 0xF740BF, bits: 32 }),
    ("up", IrCode { proto: NEC, code: 0xF700FF, bits: 32 }),
    ("down", IrCode { proto: NEC, code: 0xF7807F, bits: 32 }),
    ("red", IrCode { proto: NEC, code: 0xF720DF, bits: 32 }),
    ("green", IrCode { proto: NEC, code: 0xF7A05F, bits: 32 }),
    ("blue", IrCode { proto: NEC, code: 0xF7609F, bits: 32 }),
    ("white", IrCode { proto: NEC, code: 0xF7E01F, bits: 32 }),
    ("flash", IrCode { proto: NEC, code: 0xF7D02F, bits: 32 }),
    ("strobe", IrCode { proto: NEC, code: 0xF7F00F, bits: 32 }),
    ("fade", IrCode { proto: NEC, code: 0xF7C837, bits: 32 }),
    ("smooth", IrCode { proto: NEC, code: 0xF7E817, bits: 32 }),
];

/// Looks up a named IR command.
pub fn ir_code_for(name: &str) -> Result<IrCode, RemoteError> {
    let wanted = name.trim().to_ascii_lowercase();
    IR_TABLE
        .iter()
        .find(|(n, _)| *n == wanted)
        .map(|(_, code)| *code)
        .ok_or_else(|| RemoteError::UnmappedCommand(name.to_string()))
}

pub fn ir_command_names() -> impl Iterator<Item = &'static str> {
    IR_TABLE.iter().map(|(n, _)| *n)
}

pub const BRIGHTNESS_UP_BUTTON: &str = "up";
pub const BRIGHTNESS_DOWN_BUTTON: &str = "down";

/// Device button that nudges brightness one step in `direction`.
pub fn brightness_button(direction: Direction) -> &'static str {
    match direction {
        Direction::Up => BRIGHTNESS_UP_BUTTON,
        Direction::Down => BRIGHTNESS_DOWN_BUTTON,
    }
}

/// Everything the remote can ask of the device, one variant per endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCommand {
    Health,
    Button(String),
    Power(PowerState),
    Color(Rgb),
    Ir(IrCode),
}

impl DeviceCommand {
    pub fn path(&self) -> &'static str {
        match self {
            DeviceCommand::Health => "/health",
            DeviceCommand::Button(_) => "/btn",
            DeviceCommand::Power(_) => "/power",
            DeviceCommand::Color(_) => "/color",
            DeviceCommand::Ir(_) => "/ir",
        }
    }

    pub fn method(&self) -> Method {
        match self {
            DeviceCommand::Health => Method::GET,
            _ => Method::POST,
        }
    }

    /// Intent-specific query parameters, without the shared secret.
    pub fn params(&self) -> Vec<(&'static str, String)> {
        match self {
            DeviceCommand::Health => vec![],
            DeviceCommand::Button(name) => vec![("name", name.clone())],
            DeviceCommand::Power(state) => vec![("state", state.to_string())],
            DeviceCommand::Color(rgb) => vec![
                ("r", rgb.r.to_string()),
                ("g", rgb.g.to_string()),
                ("b", rgb.b.to_string()),
            ],
            DeviceCommand::Ir(ir) => vec![
                ("proto", ir.proto.to_string()),
                ("code", format!("0x{:X}", ir.code)),
                ("bits", ir.bits.to_string()),
            ],
        }
    }

    fn sends_key(&self) -> bool {
        !matches!(self, DeviceCommand::Health)
    }
}

impl std::fmt::Display for DeviceCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            DeviceCommand::Health => write!(f, "health"),
            DeviceCommand::Button(name) => write!(f, "button {}", name),
            DeviceCommand::Power(state) => write!(f, "power {}", state),
            DeviceCommand::Color(rgb) => write!(f, "color {},{},{}", rgb.r, rgb.g, rgb.b),
            DeviceCommand::Ir(ir) => write!(f, "ir {} 0x{:X}/{}", ir.proto, ir.code, ir.bits),
        }
    }
}

/// Where the device lives and the optional secret it expects.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceEndpoint {
    base_url: String,
    auth_key: Option<String>,
}

impl DeviceEndpoint {
    pub fn new(base_url: &str, auth_key: Option<&str>) -> Self {
        Self {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            auth_key: auth_key
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_string),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn is_configured(&self) -> bool {
        !self.base_url.is_empty()
    }

    /// Full URL for `command`, or a configuration error when no address is set.
    pub fn url_for(&self, command: &DeviceCommand) -> Result<String, RemoteError> {
        if !self.is_configured() {
            return Err(RemoteError::Configuration);
        }
        Ok(format!("{}{}", self.base_url, command.path()))
    }

    /// Query parameters for `command`, with the secret appended when set.
    pub fn query_for(&self, command: &DeviceCommand) -> Vec<(&'static str, String)> {
        let mut params = command.params();
        if command.sends_key() {
            if let Some(key) = &self.auth_key {
                params.push(("key", key.clone()));
            }
        }
        params
    }
}

/// One outbound call per intent. Calls are independent: no retry, no
/// coalescing and no ordering between them. Callers that need ordering await
/// each call before issuing the next.
pub trait DeviceGateway: Send + Sync + 'static {
    fn send(&self, command: DeviceCommand) -> impl Future<Output = Result<Value, RemoteError>> + Send;

    /// Points the gateway at a new address/secret.
    fn set_endpoint(&self, endpoint: DeviceEndpoint);

    fn endpoint(&self) -> DeviceEndpoint;
}

/// Gateway speaking HTTP to the device.
pub struct HttpGateway {
    client: reqwest::Client,
    endpoint: RwLock<DeviceEndpoint>,
}

impl HttpGateway {
    pub fn new(endpoint: DeviceEndpoint) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: RwLock::new(endpoint),
        }
    }

    fn build(&self, command: &DeviceCommand) -> Result<reqwest::RequestBuilder, RemoteError> {
        let endpoint = match self.endpoint.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => {
                log::error!("Endpoint lock poisoned!");
                poisoned.into_inner().clone()
            }
        };
        let url = endpoint.url_for(command)?;
        let query = endpoint.query_for(command);
        trace!("{} {} {:?}", command.method(), url, query);
        Ok(self.client.request(command.method(), url).query(&query))
    }
}

impl DeviceGateway for HttpGateway {
    fn send(&self, command: DeviceCommand) -> impl Future<Output = Result<Value, RemoteError>> + Send {
        let request = self.build(&command);
        async move {
            let response = request?.send().await?;
            let status = response.status();
            if !status.is_success() {
                let reason = status.canonical_reason().unwrap_or("").to_string();
                let body = match response.text().await {
                    Ok(text) if !text.is_empty() => text,
                    _ => reason,
                };
                warn!("Device rejected {}: HTTP {}", command, status.as_u16());
                return Err(RemoteError::DeviceRequestFailed {
                    status: status.as_u16(),
                    body,
                });
            }
            let text = response.text().await.unwrap_or_default();
            debug!("Device accepted {}", command);
            Ok(parse_reply(&text))
        }
    }

    fn set_endpoint(&self, endpoint: DeviceEndpoint) {
        match self.endpoint.write() {
            Ok(mut guard) => *guard = endpoint,
            Err(poisoned) => {
                log::error!("Endpoint lock poisoned!");
                *poisoned.into_inner() = endpoint;
            }
        }
    }

    fn endpoint(&self) -> DeviceEndpoint {
        match self.endpoint.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

/// Reply body as JSON. Empty or non-JSON bodies read as `{}`.
pub fn parse_reply(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| Value::Object(Default::default()))
}

/// Checks connectivity and reflects it on the status board. Never fails.
pub async fn check_health<G: DeviceGateway>(gateway: &G, status: &StatusBoard) -> StatusLevel {
    if !gateway.endpoint().is_configured() {
        status.set_status(StatusLevel::Warn, "Not connected");
        return StatusLevel::Warn;
    }
    match gateway.send(DeviceCommand::Health).await {
        Ok(_) => {
            status.set_status(StatusLevel::Ok, "Connected");
            StatusLevel::Ok
        }
        Err(e) => {
            debug!("Health check failed: {}", e);
            status.set_status(StatusLevel::Bad, "Unreachable");
            StatusLevel::Bad
        }
    }
}

/// Records a failed intent on the status board.
pub fn report_failure(status: &StatusBoard, context: &str, error: &RemoteError) {
    log::error!("{} failed: {}", context, error);
    status.set_status(StatusLevel::Bad, "Error");
    status.toast(error.toast_text());
}
