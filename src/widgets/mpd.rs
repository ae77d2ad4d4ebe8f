//! Current MPD song.

use std::{
    sync::{Arc, Weak},
    time::Duration,
};

use super::{Widget, WidgetCore, WidgetStyle};
use crate::hooks::{
    mpd::{value_of, MpdClient, MpdConfig},
    Callback, HookConfig, Notification,
};

fn render(status: &[(String, String)], song: &[(String, String)]) -> String {
    if value_of(status, "state") == Some("stop") {
        return String::new();
    }

    let title = value_of(song, "Title")
        .or_else(|| value_of(song, "file"))
        .unwrap_or_default();
    let text = match value_of(song, "Artist") {
        Some(artist) if !title.is_empty() => format!("{artist} - {title}"),
        _ => title.to_string(),
    };

    if value_of(status, "state") == Some("pause") {
        format!("[paused] {text}")
    } else {
        text
    }
}

/// Song currently playing on one MPD instance, requeried on every idle
/// notification.
pub struct MpdWidget {
    core: WidgetCore,
    config: MpdConfig,
}

impl MpdWidget {
    #[must_use]
    pub fn new(
        config: MpdConfig,
        style: WidgetStyle,
        refresh: Duration,
        failure_refresh: Duration,
    ) -> Arc<Self> {
        let widget = Arc::new(Self {
            core: WidgetCore::new(style, None),
            config: config.clone(),
        });

        let weak: Weak<Self> = Arc::downgrade(&widget);
        widget.core.pool().subscribe(
            Callback::new(move |notification| {
                if let Some(widget) = weak.upgrade() {
                    widget.apply(notification);
                }
            }),
            HookConfig::Mpd(config),
            refresh,
            failure_refresh,
        );

        widget
    }

    fn apply(&self, notification: &Notification) {
        if !notification.running {
            self.core.set_content(String::new());
            return;
        }
        self.update();
    }

    fn query(&self) -> crate::error::Result<String> {
        let mut client = MpdClient::connect(&self.config)?;
        let status = client.status()?;
        let song = client.current_song()?;
        Ok(render(&status, &song))
    }
}

impl Widget for MpdWidget {
    fn core(&self) -> &WidgetCore {
        &self.core
    }

    fn update(&self) {
        match self.query() {
            Ok(text) => self.core.set_content(self.core.decorate(&text)),
            Err(e) => {
                tracing::debug!("mpd query failed: {e}");
                self.core.set_content(String::new());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        io::{BufRead, BufReader, Write},
        net::TcpListener,
    };

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn playing_song_renders_artist_and_title() {
        let status = pairs(&[("state", "play")]);
        let song = pairs(&[("Artist", "Nina Simone"), ("Title", "Sinnerman")]);
        assert_eq!(render(&status, &song), "Nina Simone - Sinnerman");
    }

    #[test]
    fn paused_song_is_prefixed() {
        let status = pairs(&[("state", "pause")]);
        let song = pairs(&[("Artist", "a"), ("Title", "b")]);
        assert_eq!(render(&status, &song), "[paused] a - b");
    }

    #[test]
    fn stopped_player_renders_nothing() {
        let status = pairs(&[("state", "stop")]);
        let song = pairs(&[("Artist", "a"), ("Title", "b")]);
        assert_eq!(render(&status, &song), "");
    }

    #[test]
    fn untagged_songs_fall_back_to_the_file_name() {
        let status = pairs(&[("state", "play")]);
        let song = pairs(&[("file", "radio/stream.mp3")]);
        assert_eq!(render(&status, &song), "radio/stream.mp3");
    }

    #[test]
    fn update_queries_the_daemon() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            stream.write_all(b"OK MPD 0.23.5\n").unwrap();

            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            assert_eq!(line, "status\n");
            stream.write_all(b"state: play\nOK\n").unwrap();

            line.clear();
            reader.read_line(&mut line).unwrap();
            assert_eq!(line, "currentsong\n");
            stream
                .write_all(b"Artist: a\nTitle: b\nOK\n")
                .unwrap();
        });

        let widget = MpdWidget::new(
            MpdConfig {
                host: "127.0.0.1".to_string(),
                port,
                password: None,
            },
            WidgetStyle::default(),
            Duration::from_millis(100),
            Duration::from_millis(100),
        );
        widget.update();
        assert_eq!(widget.core().content(), "a - b");

        server.join().unwrap();
    }
}
