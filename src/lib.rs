//! Feeds lemonbar with the output of small, event-driven widgets.
//!
//! A [`Panel`] owns one or more [`Screen`]s, each displaying widgets at the
//! left, center and right alignments. Widgets render lazily: external
//! sources (subprocesses, MPD, X11) notify through the hook registry, the
//! widget recomputes its content and the owning screen redraws its bar,
//! rate-limited and deduplicated.

pub mod error;
pub mod hooks;
pub mod panel;
pub mod screen;
pub mod sink;
pub mod tools;
pub mod update;
pub mod widgets;
pub mod xrandr;

pub use error::{Error, Result};
pub use panel::{Panel, PanelConfig};
pub use screen::{Alignment, Screen, ScreenConfig};
