use crate::config::PlaylistEntry;
use crate::util::{lock_or_recover, luminance, parse_hex_color};
use chrono::{DateTime, Local};
use log::{debug, info};
use std::sync::{Arc, Mutex};

/// How long a toast stays visible.
pub const TOAST_DURATION_MS: i64 = 1800;

/// Colour of the connectivity dot.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum StatusLevel {
    Ok,
    #[default]
    Warn,
    Bad,
}

impl std::fmt::Display for StatusLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            StatusLevel::Ok => write!(f, "ok"),
            StatusLevel::Warn => write!(f, "warn"),
            StatusLevel::Bad => write!(f, "bad"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Toast {
    pub message: String,
    pub shown_at: DateTime<Local>,
}

impl Toast {
    pub fn is_visible_at(&self, now: DateTime<Local>) -> bool {
        (now - self.shown_at).num_milliseconds() < TOAST_DURATION_MS
    }
}

/// What the preview panel shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    pub label: String,
    pub fill: String,
    /// Text colour that stays readable over `fill`.
    pub text_color: &'static str,
}

impl Preview {
    pub fn new(label: &str, fill: &str) -> Self {
        Self {
            label: label.to_string(),
            fill: fill.to_string(),
            text_color: preview_text_color(fill),
        }
    }
}

/// Dark text over light fills, light text otherwise. Fills that are not plain
/// hex colours (gradients, names) get light text.
pub fn preview_text_color(fill: &str) -> &'static str {
    match parse_hex_color(fill) {
        Ok(rgb) if luminance(rgb) > 0.6 => "#111",
        _ => "#fff",
    }
}

#[derive(Debug, Clone, Default)]
pub struct StatusSnapshot {
    pub level: StatusLevel,
    pub text: String,
    pub toast: Option<Toast>,
    pub preview: Option<Preview>,
    pub brightness_pct: u8,
    pub queue: Vec<String>,
}

/// Everything the remote shows the user, shared between the intent handlers
/// and the cycle task.
#[derive(Debug, Clone, Default)]
pub struct StatusBoard {
    inner: Arc<Mutex<StatusSnapshot>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        let board = Self::default();
        board.set_status(StatusLevel::Warn, "Not connected");
        board
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        lock_or_recover(&self.inner).clone()
    }

    pub fn set_status(&self, level: StatusLevel, text: &str) {
        let mut state = lock_or_recover(&self.inner);
        if state.level != level || state.text != text {
            debug!("Status: {} ({})", text, level);
        }
        state.level = level;
        state.text = text.to_string();
    }

    pub fn toast(&self, message: &str) {
        info!("{}", message);
        lock_or_recover(&self.inner).toast = Some(Toast {
            message: message.to_string(),
            shown_at: Local::now(),
        });
    }

    /// The toast, if it has not expired yet.
    pub fn active_toast(&self) -> Option<String> {
        let now = Local::now();
        lock_or_recover(&self.inner)
            .toast
            .as_ref()
            .filter(|t| t.is_visible_at(now))
            .map(|t| t.message.clone())
    }

    pub fn set_preview(&self, label: &str, fill: &str) {
        debug!("Preview: {} ({})", label, fill);
        lock_or_recover(&self.inner).preview = Some(Preview::new(label, fill));
    }

    pub fn set_brightness(&self, percent: u8) {
        lock_or_recover(&self.inner).brightness_pct = percent;
    }

    /// Re-renders the visible cycle queue.
    pub fn set_queue(&self, playlist: &[PlaylistEntry]) {
        let lines = render_queue(playlist);
        debug!("Cycle queue now has {} entries", lines.len());
        lock_or_recover(&self.inner).queue = lines;
    }
}

/// One numbered line per playlist entry.
pub fn render_queue(playlist: &[PlaylistEntry]) -> Vec<String> {
    playlist
        .iter()
        .enumerate()
        .map(|(i, entry)| format!("{:>2}. {}", i, entry))
        .collect()
}

/// A colour button on the remote.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Swatch {
    pub name: &'static str,
    pub hex: &'static str,
    pub button_code: &'static str,
}

impl Swatch {
    pub fn playlist_entry(&self) -> PlaylistEntry {
        PlaylistEntry::new(self.name, self.hex, self.button_code)
    }
}

pub const DEFAULT_SWATCHES: &[Swatch] = &[
    Swatch { name: "Red", hex: "#ff0000", button_code: "red" },
    Swatch { name: "Green", hex: "#00ff00", button_code: "green" },
    Swatch { name: "Blue", hex: "#0000ff", button_code: "blue" },
    Swatch { name: "Yellow", hex: "#ffff00", button_code: "yellow" },
    Swatch { name: "Orange", hex: "#ff7a00", button_code: "orange" },
    Swatch { name: "Purple", hex: "#8000ff", button_code: "purple" },
    Swatch { name: "Pink", hex: "#ff33aa", button_code: "pink" },
    Swatch { name: "Cyan", hex: "#00ffff", button_code: "cyan" },
    Swatch { name: "White", hex: "#ffffff", button_code: "white" },
    Swatch { name: "Warm", hex: "#fff3d1", button_code: "warm" },
    Swatch { name: "Cool", hex: "#e7f1ff", button_code: "cool" },
    Swatch { name: "Lime", hex: "#bfff00", button_code: "lime" },
    Swatch { name: "Teal", hex: "#15c2b8", button_code: "teal" },
    Swatch { name: "Magenta", hex: "#ff00ff", button_code: "magenta" },
    Swatch { name: "Amber", hex: "#ffbf00", button_code: "amber" },
    Swatch { name: "Indigo", hex: "#3f51b5", button_code: "indigo" },
];

/// Finds a default swatch by name, ignoring case.
pub fn find_swatch(name: &str) -> Option<&'static Swatch> {
    DEFAULT_SWATCHES
        .iter()
        .find(|s| s.name.eq_ignore_ascii_case(name.trim()))
}
