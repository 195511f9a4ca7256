//! Mock gateway for testing.

use crate::device::{DeviceCommand, DeviceEndpoint, DeviceGateway};
use crate::error::RemoteError;
use crate::util::lock_or_recover;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// A gateway that records every command instead of talking to a device.
///
/// Commands are recorded when issued. Replies can be delayed to simulate a slow
/// device, and the gateway can be switched into a failing mode where every call
/// returns `DeviceRequestFailed` (HTTP 503).
///
/// # Example
///
/// ```
/// use esp_led_remote::device::{DeviceCommand, DeviceGateway};
/// use esp_led_remote::MockGateway;
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let mock = MockGateway::new();
/// mock.send(DeviceCommand::Button("red".into())).await.unwrap();
/// assert_eq!(mock.button_presses(), vec!["red"]);
/// # });
/// ```
pub struct MockGateway {
    calls: Mutex<Vec<DeviceCommand>>,
    endpoint: Mutex<DeviceEndpoint>,
    failing: AtomicBool,
    latency: Mutex<Duration>,
}

impl MockGateway {
    /// Create a mock pointed at a placeholder address, replying instantly.
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            endpoint: Mutex::new(DeviceEndpoint::new("http://mock.local", None)),
            failing: AtomicBool::new(false),
            latency: Mutex::new(Duration::ZERO),
        }
    }

    /// Create a mock whose replies take `latency`.
    pub fn with_latency(latency: Duration) -> Self {
        let mock = Self::new();
        *lock_or_recover(&mock.latency) = latency;
        mock
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Every command issued so far, in order.
    pub fn calls(&self) -> Vec<DeviceCommand> {
        lock_or_recover(&self.calls).clone()
    }

    /// Names of the `/btn` presses issued so far, in order.
    pub fn button_presses(&self) -> Vec<String> {
        lock_or_recover(&self.calls)
            .iter()
            .filter_map(|c| match c {
                DeviceCommand::Button(name) => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear_calls(&self) {
        lock_or_recover(&self.calls).clear();
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceGateway for MockGateway {
    fn send(&self, command: DeviceCommand) -> impl Future<Output = Result<Value, RemoteError>> + Send {
        let configured = lock_or_recover(&self.endpoint).is_configured();
        if configured {
            lock_or_recover(&self.calls).push(command);
        }
        let failing = self.failing.load(Ordering::SeqCst);
        let latency = *lock_or_recover(&self.latency);

        async move {
            if !configured {
                return Err(RemoteError::Configuration);
            }
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            if failing {
                Err(RemoteError::DeviceRequestFailed {
                    status: 503,
                    body: "mock failure".to_string(),
                })
            } else {
                Ok(json!({ "ok": true }))
            }
        }
    }

    fn set_endpoint(&self, endpoint: DeviceEndpoint) {
        *lock_or_recover(&self.endpoint) = endpoint;
    }

    fn endpoint(&self) -> DeviceEndpoint {
        lock_or_recover(&self.endpoint).clone()
    }
}
