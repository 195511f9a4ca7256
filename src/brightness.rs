//! Client-side brightness estimate.
//!
//! The device only understands relative "brighter"/"dimmer" button presses and
//! has no endpoint to read its brightness back. The level tracked here is the
//! remote's own guess: it moves one step with every press it issues, failed or
//! not, and will drift from the real lamp whenever a press is lost, another
//! remote is used, or the device is power-cycled. That drift is accepted; there
//! is nothing on the device side to reconcile against.

/// Size of one physical brightness press, as a fraction of full brightness.
pub const STEP: f64 = 1.0 / 16.0;

/// Lowest level the model will represent. Below this the lamp reads as "off".
pub const MIN_FLOOR: f64 = 0.56;

pub const MAX_LEVEL: f64 = 1.0;

// Absorbs float noise so exact multiples of STEP are not rounded up a press.
const PRESS_EPSILON: f64 = 1e-9;

/// Direction of a relative brightness press.
#[derive(Debug, Copy, Clone, PartialEq, Eq, clap::ValueEnum)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    /// Signed level change for one press in this direction.
    pub fn delta(self) -> f64 {
        match self {
            Direction::Up => STEP,
            Direction::Down => -STEP,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Direction::Up => write!(f, "up"),
            Direction::Down => write!(f, "down"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BrightnessModel {
    level: f64,
}

impl Default for BrightnessModel {
    fn default() -> Self {
        Self { level: MAX_LEVEL }
    }
}

impl BrightnessModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts the estimate at `level`, clamped into the representable range.
    pub fn with_level(level: f64) -> Self {
        Self {
            level: clamp_level(level),
        }
    }

    pub fn level(&self) -> f64 {
        self.level
    }

    /// Level as a whole percentage, for the brightness indicator.
    pub fn percent(&self) -> u8 {
        (self.level * 100.0).round() as u8
    }

    /// Moves the estimate by `delta` and returns the new level.
    pub fn adjust(&mut self, delta: f64) -> f64 {
        self.level = clamp_level(self.level + delta);
        self.level
    }

    /// Records one press in `direction`.
    pub fn step(&mut self, direction: Direction) -> f64 {
        self.adjust(direction.delta())
    }
}

fn clamp_level(level: f64) -> f64 {
    if level.is_nan() {
        return MAX_LEVEL;
    }
    level.clamp(MIN_FLOOR, MAX_LEVEL)
}

/// Number of presses needed to move from `from` to `to`.
///
/// Rounds up, so the requested change is never undershot (it may overshoot by
/// less than one step). A distance shorter than a single step needs no press.
pub fn presses_needed(from: f64, to: f64) -> u32 {
    let distance = (from - to).abs();
    if distance + PRESS_EPSILON < STEP {
        return 0;
    }
    (distance / STEP - PRESS_EPSILON).ceil().max(0.0) as u32
}

/// Dim target as a level, from a percentage clamped to `[floor%, 100]`.
pub fn level_from_percent(percent: f64) -> f64 {
    clamp_level(percent / 100.0)
}
