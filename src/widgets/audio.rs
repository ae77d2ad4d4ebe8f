//! Pulseaudio volume.

use std::{
    process::Command,
    sync::{Arc, Weak},
    time::Duration,
};

use super::{Widget, WidgetCore, WidgetStyle};
use crate::hooks::{self, Callback, HookEvent, Notification};

const STATUS_CMD: &[&str] = &["pulseaudio-ctl", "full-status"];

/// `full-status` prints `<volume> <sink muted> <source muted>`.
fn parse_status(output: &str) -> Option<(u32, bool)> {
    let mut fields = output.split_whitespace();
    let volume = fields.next()?.parse().ok()?;
    let muted = fields.next()? == "yes";
    Some((volume, muted))
}

fn render(volume: u32, muted: bool) -> String {
    if muted {
        "muted".to_string()
    } else {
        format!("{volume}%")
    }
}

/// Sink volume, requeried whenever `pactl subscribe` reports a change.
pub struct PulseAudioWidget {
    core: WidgetCore,
    status_cmd: Vec<String>,
}

impl PulseAudioWidget {
    #[must_use]
    pub fn new(style: WidgetStyle, failure_refresh: Duration) -> Arc<Self> {
        Self::with_status_cmd(STATUS_CMD.iter().map(ToString::to_string), style, failure_refresh)
    }

    #[must_use]
    pub fn with_status_cmd(
        status_cmd: impl IntoIterator<Item = String>,
        style: WidgetStyle,
        failure_refresh: Duration,
    ) -> Arc<Self> {
        let widget = Arc::new(Self {
            core: WidgetCore::new(style, None),
            status_cmd: status_cmd.into_iter().collect(),
        });

        let weak: Weak<Self> = Arc::downgrade(&widget);
        widget.core.pool().subscribe(
            Callback::new(move |notification| {
                if let Some(widget) = weak.upgrade() {
                    widget.apply(notification);
                }
            }),
            hooks::audio::config(),
            Duration::ZERO,
            failure_refresh,
        );

        widget
    }

    fn apply(&self, notification: &Notification) {
        if !notification.running {
            self.core.set_content(String::new());
            return;
        }
        // pactl also reports client connects and disconnects; only actual
        // state changes warrant a requery.
        if let HookEvent::Raw(line) = &notification.event {
            if !hooks::audio::is_change_event(line) {
                return;
            }
        }
        self.update();
    }

    fn query_status(&self) -> Option<(u32, bool)> {
        let (program, args) = self.status_cmd.split_first()?;
        let output = Command::new(program).args(args).output().ok()?;
        if !output.status.success() {
            return None;
        }
        parse_status(&String::from_utf8_lossy(&output.stdout))
    }
}

impl Widget for PulseAudioWidget {
    fn core(&self) -> &WidgetCore {
        &self.core
    }

    fn update(&self) {
        match self.query_status() {
            Some((volume, muted)) => {
                let text = render(volume, muted);
                self.core.set_content(self.core.decorate(&text));
            }
            None => self.core.set_content(String::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_status(output: &str) -> Arc<PulseAudioWidget> {
        PulseAudioWidget::with_status_cmd(
            ["sh", "-c", &format!("echo '{output}'")]
                .iter()
                .map(ToString::to_string),
            WidgetStyle::default(),
            Duration::from_secs(5),
        )
    }

    #[test]
    fn status_output_parses_to_volume_and_mute() {
        assert_eq!(parse_status("66 no no"), Some((66, false)));
        assert_eq!(parse_status("20 yes no"), Some((20, true)));
        assert_eq!(parse_status("garbage"), None);
    }

    #[test]
    fn update_queries_and_renders_the_volume() {
        let widget = fake_status("42 no no");
        widget.update();
        assert_eq!(widget.core().content(), "42%");
    }

    #[test]
    fn muted_sink_renders_as_muted() {
        let widget = fake_status("42 yes no");
        widget.update();
        assert_eq!(widget.core().content(), "muted");
    }

    #[test]
    fn empty_status_command_renders_nothing() {
        let widget = PulseAudioWidget::with_status_cmd(
            Vec::new(),
            WidgetStyle::default(),
            Duration::from_secs(5),
        );
        widget.update();
        assert_eq!(widget.core().content(), "");
    }

    #[test]
    fn change_events_trigger_a_requery() {
        let widget = fake_status("13 no no");
        widget.apply(&Notification {
            running: true,
            event: HookEvent::Raw("Event 'change' on sink #0".to_string()),
        });
        assert_eq!(widget.core().content(), "13%");

        // Connection noise does not.
        let noisy = fake_status("99 no no");
        noisy.apply(&Notification {
            running: true,
            event: HookEvent::Raw("Event 'new' on client #7".to_string()),
        });
        assert_eq!(noisy.core().content(), "");
    }
}
