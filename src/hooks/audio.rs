//! Pulseaudio event subscription through `pactl subscribe`.

use super::{CommandConfig, HookConfig};

#[must_use]
pub fn config() -> HookConfig {
    HookConfig::PulseAudio(CommandConfig::new(["pactl", "subscribe", "-n", "barwire"]))
}

/// Whether a `pactl subscribe` line describes an actual state change, as
/// opposed to client connect/disconnect noise.
#[must_use]
pub fn is_change_event(line: &str) -> bool {
    line.contains("Event 'change' on destination")
        || line.contains("Event 'change' on sink")
}
