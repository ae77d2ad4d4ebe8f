//! MPRIS media player via DBus.

use std::{sync::Arc, time::Duration};

use mpris::{PlaybackStatus, Player, PlayerFinder};

use super::{Widget, WidgetCore, WidgetStyle};

thread_local! {
    static PLAYER_FINDER: Option<PlayerFinder> = match PlayerFinder::new() {
        Ok(finder) => Some(finder),
        Err(e) => {
            tracing::error!("could not connect to dbus: {e}");
            None
        }
    };
}

fn with_player<R>(f: impl FnOnce(Player) -> Option<R>) -> Option<R> {
    PLAYER_FINDER.with(|finder| {
        let player = finder.as_ref()?.find_active().ok()?;
        f(player)
    })
}

fn format_track(artists: &[&str], title: &str) -> String {
    if artists.is_empty() {
        title.to_string()
    } else {
        format!("{} - {title}", artists.join(", "))
    }
}

fn now_playing() -> Option<String> {
    with_player(|player| {
        let status = player.get_playback_status().ok()?;
        if status == PlaybackStatus::Stopped {
            return None;
        }

        let metadata = player.get_metadata().ok()?;
        let title = metadata.title().filter(|t| !t.trim().is_empty())?;
        let artists: Vec<&str> = metadata
            .artists()
            .map(|artists| {
                artists
                    .iter()
                    .map(|a| a as &str)
                    .filter(|a| !a.trim().is_empty())
                    .collect()
            })
            .unwrap_or_default();
        let text = format_track(&artists, title);

        Some(if status == PlaybackStatus::Paused {
            format!("[paused] {text}")
        } else {
            text
        })
    })
}

/// Track playing on the active MPRIS player, polled over DBus.
pub struct PlayerWidget {
    core: WidgetCore,
}

impl PlayerWidget {
    #[must_use]
    pub fn new(style: WidgetStyle, refresh: Duration) -> Arc<Self> {
        Arc::new(Self {
            core: WidgetCore::new(style, Some(refresh)),
        })
    }
}

impl Widget for PlayerWidget {
    fn core(&self) -> &WidgetCore {
        &self.core
    }

    fn update(&self) {
        match now_playing() {
            Some(text) => self.core.set_content(self.core.decorate(&text)),
            None => self.core.set_content(String::new()),
        }
    }

    fn periodic(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_format_with_and_without_artists() {
        assert_eq!(format_track(&["a", "b"], "t"), "a, b - t");
        assert_eq!(format_track(&[], "t"), "t");
    }
}
