//! bspwm desktop pager.

use std::{
    sync::{Arc, Mutex, Weak},
    time::Duration,
};

use super::{decorate, lock_ignore_poison, Widget, WidgetCore, WidgetStyle};
use crate::hooks::{
    self,
    bspwm::MonitorStatus,
    Callback, HookEvent, Notification,
};

/// Colours of one desktop (or monitor) cell.
#[derive(Clone, Debug, Default)]
pub struct CellStyle {
    pub fg: Option<String>,
    pub bg: Option<String>,
}

/// Per-state colours, keyed by the desktop prefix of the bspwm report.
#[derive(Clone, Debug, Default)]
pub struct BspwmColors {
    /// `O`: focused desktop with windows.
    pub focused_occupied: CellStyle,
    /// `o`: unfocused desktop with windows.
    pub occupied: CellStyle,
    /// `F`: focused empty desktop.
    pub focused_free: CellStyle,
    /// `f`: unfocused empty desktop.
    pub free: CellStyle,
    /// `U`: focused desktop with an urgent window.
    pub focused_urgent: CellStyle,
    /// `u`: unfocused desktop with an urgent window.
    pub urgent: CellStyle,
    pub monitor: CellStyle,
    pub focused_monitor: CellStyle,
}

impl BspwmColors {
    fn for_prefix(&self, prefix: char) -> &CellStyle {
        match prefix {
            'O' => &self.focused_occupied,
            'F' => &self.focused_free,
            'U' => &self.focused_urgent,
            'u' => &self.urgent,
            'f' => &self.free,
            _ => &self.occupied,
        }
    }
}

/// Clickable desktop list fed by the bspwm report subscription.
///
/// Monitor cells only appear on multi-monitor setups. Every cell focuses
/// its desktop or monitor when clicked.
pub struct BspwmDesktopWidget {
    core: WidgetCore,
    colors: BspwmColors,
    monitors: Mutex<Vec<MonitorStatus>>,
}

impl BspwmDesktopWidget {
    #[must_use]
    pub fn new(
        style: WidgetStyle,
        colors: BspwmColors,
        failure_refresh: Duration,
    ) -> Arc<Self> {
        let widget = Arc::new(Self {
            core: WidgetCore::new(style, None),
            colors,
            monitors: Mutex::new(Vec::new()),
        });

        let weak: Weak<Self> = Arc::downgrade(&widget);
        widget.core.pool().subscribe(
            Callback::new(move |notification| {
                if let Some(widget) = weak.upgrade() {
                    widget.apply(notification);
                }
            }),
            hooks::bspwm::config(),
            Duration::ZERO,
            failure_refresh,
        );

        widget
    }

    fn apply(&self, notification: &Notification) {
        // A dead subscription keeps the last known desktops on screen.
        if !notification.running {
            return;
        }
        if let HookEvent::Bspwm(monitors) = &notification.event {
            *lock_ignore_poison(&self.monitors) = monitors.clone();
            self.update();
        }
    }

    fn cell(&self, text: &str, colors: &CellStyle, action: String) -> String {
        decorate(
            text,
            &WidgetStyle {
                fg: colors.fg.clone(),
                bg: colors.bg.clone(),
                padding: 1,
                font: None,
                actions: vec![(1, action)],
            },
        )
    }

    fn render(&self, monitors: &[MonitorStatus]) -> String {
        let mut out = String::new();
        for monitor in monitors {
            if monitors.len() > 1 {
                let colors = if monitor.focused {
                    &self.colors.focused_monitor
                } else {
                    &self.colors.monitor
                };
                let action = format!("bspc monitor -f \"{}\"", monitor.name);
                out.push_str(&self.cell(&monitor.name, colors, action));
            }
            for desktop in &monitor.desktops {
                let Some(prefix) = desktop.chars().next() else {
                    continue;
                };
                let name = &desktop[1..];
                let action = format!("bspc desktop -f \"{name}\"");
                out.push_str(&self.cell(name, self.colors.for_prefix(prefix), action));
            }
        }
        out
    }
}

impl Widget for BspwmDesktopWidget {
    fn core(&self) -> &WidgetCore {
        &self.core
    }

    fn update(&self) {
        let monitors = lock_ignore_poison(&self.monitors).clone();
        if monitors.is_empty() {
            self.core.set_content(String::new());
            return;
        }
        let text = self.render(&monitors);
        self.core.set_content(self.core.decorate(&text));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::bspwm::parse_status;

    fn colors() -> BspwmColors {
        BspwmColors {
            focused_occupied: CellStyle {
                fg: Some("#FF0000".to_string()),
                bg: None,
            },
            ..BspwmColors::default()
        }
    }

    #[test]
    fn single_monitor_renders_desktops_only() {
        let widget =
            BspwmDesktopWidget::new(WidgetStyle::default(), colors(), Duration::from_secs(5));
        widget.apply(&Notification {
            running: true,
            event: HookEvent::Bspwm(parse_status("WMeDP-1:Ofoo:fbar:LT")),
        });

        assert_eq!(
            widget.core().content(),
            "%{A1:bspc desktop -f \"foo\":}%{F#FF0000} foo %{F-}%{A}\
             %{A1:bspc desktop -f \"bar\":} bar %{A}"
        );
    }

    #[test]
    fn multiple_monitors_get_monitor_cells() {
        let widget =
            BspwmDesktopWidget::new(WidgetStyle::default(), BspwmColors::default(), Duration::from_secs(5));
        widget.apply(&Notification {
            running: true,
            event: HookEvent::Bspwm(parse_status("Wma:Ox:Mb:Fy")),
        });

        assert_eq!(
            widget.core().content(),
            "%{A1:bspc monitor -f \"a\":} a %{A}\
             %{A1:bspc desktop -f \"x\":} x %{A}\
             %{A1:bspc monitor -f \"b\":} b %{A}\
             %{A1:bspc desktop -f \"y\":} y %{A}"
        );
    }

    #[test]
    fn degraded_notifications_keep_the_last_content() {
        let widget =
            BspwmDesktopWidget::new(WidgetStyle::default(), BspwmColors::default(), Duration::from_secs(5));
        widget.apply(&Notification {
            running: true,
            event: HookEvent::Bspwm(parse_status("WMa:Ox")),
        });
        let before = widget.core().content();

        widget.apply(&Notification {
            running: false,
            event: HookEvent::Bspwm(Vec::new()),
        });
        assert_eq!(widget.core().content(), before);
    }
}
