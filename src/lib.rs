// Export modules for the binary and tests
pub mod about;
pub mod brightness;
pub mod config;
pub mod controls;
pub mod cycle_worker;
pub mod device;
pub mod error;
pub mod mock;
pub mod state;
pub mod ui;
pub mod util;
pub mod vote;

// Re-export main types
pub use crate::config::{ConfigData, ConfigStore, MemoryStore, RecordStore};
pub use crate::cycle_worker::CycleScheduler;
pub use crate::device::{DeviceGateway, HttpGateway};
pub use crate::error::RemoteError;
pub use crate::mock::MockGateway;
pub use crate::state::State;
pub use crate::ui::StatusBoard;

// Constants
pub const PROGRAM_TITLE: &str = "ESP LED Remote";

// Type aliases for shared state
use std::sync::{Arc, Mutex};
pub type SharedBrightness = Arc<Mutex<brightness::BrightnessModel>>;
pub type SharedStore = Arc<Mutex<dyn RecordStore>>;

// Args struct for command line parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Config file to use instead of the one in the user config directory
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Check that the device answers
    Ping,
    /// Press a named remote button
    Button { name: String },
    /// Turn the strip on or off
    Power { state: device::PowerState },
    /// Step brightness up or down
    Brightness {
        #[arg(value_enum)]
        direction: brightness::Direction,
        #[arg(short, long, default_value_t = 1)]
        times: u32,
    },
    /// Send a #RRGGBB colour, scaled by the tracked brightness
    Color { hex: String },
    /// Send a named IR command
    Ir { name: String },
    /// List the colour swatches
    Swatches,
    /// Click a swatch by name
    Swatch { name: String },
    /// Show or change connection settings
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Manage and run the colour cycle
    #[command(subcommand)]
    Cycle(CycleCommand),
    /// Show program information
    About,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum ConfigCommand {
    Show,
    Set {
        #[arg(long)]
        base_url: Option<String>,
        #[arg(long)]
        auth_token: Option<String>,
    },
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum CycleCommand {
    /// Print the playlist
    List,
    /// Append an entry
    Add {
        name: String,
        fill: String,
        button: String,
    },
    /// Append one of the default swatches
    AddSwatch { name: String },
    /// Remove the entry at INDEX
    Remove { index: usize },
    /// Empty the playlist
    Clear,
    /// Cycle until Ctrl-C
    Run,
    /// Show or change cycle settings
    Settings {
        #[arg(long)]
        interval: Option<f64>,
        #[arg(long)]
        dim_between: Option<bool>,
        #[arg(long)]
        dim_target: Option<f64>,
        #[arg(long)]
        dim_delay: Option<u64>,
        #[arg(long)]
        add_to_cycle: Option<bool>,
    },
}

// The remote: device gateway plus everything the intents share
pub struct Remote<G: DeviceGateway> {
    pub gateway: Arc<G>,
    pub brightness: SharedBrightness,
    pub status: StatusBoard,
    pub store: SharedStore,
    pub cycle: CycleScheduler<G>,
    pub(crate) hold: controls::HoldRepeat,
}

impl<G: DeviceGateway> Remote<G> {
    /// Builds the remote around `gateway` and points it at the stored device.
    pub fn new(gateway: G, store: SharedStore) -> Self {
        let gateway = Arc::new(gateway);
        let brightness: SharedBrightness = Arc::new(Mutex::new(brightness::BrightnessModel::new()));
        let status = StatusBoard::new();
        let cycle = CycleScheduler::new(gateway.clone(), brightness.clone(), status.clone(), store.clone());

        let remote = Self {
            gateway,
            brightness,
            status,
            store,
            cycle,
            hold: controls::HoldRepeat::default(),
        };
        remote.load_saved();
        let percent = util::lock_or_recover(&remote.brightness).percent();
        remote.status.set_brightness(percent);
        remote
    }
}
