use crate::device::ir_command_names;
use crate::PROGRAM_TITLE;

pub fn about() -> Vec<String> {
    vec![
        format!("{} {}", PROGRAM_TITLE, env!("CARGO_PKG_VERSION")),
        "Drives an ESP32 LED strip controller over its HTTP API: remote buttons, \
        direct colours, IR codes, brightness tracking and a timed colour cycle.".to_string(),
        "\n".to_string(),
        format!("IR commands: {}", ir_command_names().collect::<Vec<_>>().join(", ")),
        "This program comes with ABSOLUTELY NO WARRANTY.".to_string(),
    ]
}
