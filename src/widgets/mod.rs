//! Widgets produce decorated text; screens gather it into frames.
//!
//! A widget caches its last content and only asks its screens to redraw
//! when that content actually changed. Hook-driven widgets subscribe to
//! their own (non-listening) pool, which merges upward when the widget is
//! attached to a screen.

pub mod audio;
pub mod battery;
pub mod bspwm;
pub mod clock;
pub mod mpd;
pub mod player;
pub mod text;
pub mod xorg;

use std::{
    sync::{Arc, Mutex, Weak},
    thread::JoinHandle,
    time::Duration,
};

use crate::{
    hooks::HookPool,
    screen::{Screen, ScreenInner},
    tools::{split_sleep, StopToken},
};

pub use text::TextWidget;

/// Fallback refresh when a widget has no explicit rate and no screen yet.
pub(crate) const DEFAULT_REFRESH: Duration = Duration::from_millis(100);

/// Appearance and click behaviour shared by all widgets.
#[derive(Clone, Debug, Default)]
pub struct WidgetStyle {
    pub fg: Option<String>,
    pub bg: Option<String>,
    /// Spaces added around the text, inside the colour scopes.
    pub padding: usize,
    /// Index of the bar font to select with `%{T}`.
    pub font: Option<u32>,
    /// Clickable areas as (mouse button, shell command) pairs.
    pub actions: Vec<(u8, String)>,
}

/// Wrap `text` in lemonbar markup according to `style`.
#[must_use]
pub fn decorate(text: &str, style: &WidgetStyle) -> String {
    use std::fmt::Write;

    let mut out = String::new();
    for (button, cmd) in &style.actions {
        let _ = write!(out, "%{{A{button}:{cmd}:}}");
    }
    if let Some(bg) = &style.bg {
        let _ = write!(out, "%{{B{bg}}}");
    }
    if let Some(fg) = &style.fg {
        let _ = write!(out, "%{{F{fg}}}");
    }
    if let Some(font) = style.font {
        let _ = write!(out, "%{{T{font}}}");
    }

    let pad = " ".repeat(style.padding);
    out.push_str(&pad);
    out.push_str(text);
    out.push_str(&pad);

    if style.font.is_some() {
        out.push_str("%{T-}");
    }
    if style.fg.is_some() {
        out.push_str("%{F-}");
    }
    if style.bg.is_some() {
        out.push_str("%{B-}");
    }
    for _ in &style.actions {
        out.push_str("%{A}");
    }
    out
}

/// State common to every widget: cached content, screen back-references,
/// the widget's own hook pool and its update thread.
pub struct WidgetCore {
    style: WidgetStyle,
    refresh: Option<Duration>,
    content: Mutex<String>,
    screens: Mutex<Vec<Weak<ScreenInner>>>,
    pool: Arc<HookPool>,
    pub(crate) stop: StopToken,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl WidgetCore {
    #[must_use]
    pub fn new(style: WidgetStyle, refresh: Option<Duration>) -> Self {
        Self {
            style,
            refresh,
            content: Mutex::new(String::new()),
            screens: Mutex::new(Vec::new()),
            pool: HookPool::new(false),
            stop: StopToken::new(),
            thread: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn style(&self) -> &WidgetStyle {
        &self.style
    }

    #[must_use]
    pub fn pool(&self) -> &Arc<HookPool> {
        &self.pool
    }

    #[must_use]
    pub fn content(&self) -> String {
        lock_ignore_poison(&self.content).clone()
    }

    #[must_use]
    pub fn decorate(&self, text: &str) -> String {
        decorate(text, &self.style)
    }

    /// Effective refresh: the explicit rate, or the fastest screen's rate.
    #[must_use]
    pub fn refresh(&self) -> Duration {
        if let Some(refresh) = self.refresh {
            return refresh;
        }
        lock_ignore_poison(&self.screens)
            .iter()
            .filter_map(Weak::upgrade)
            .map(|screen| screen.refresh())
            .min()
            .unwrap_or(DEFAULT_REFRESH)
    }

    pub(crate) fn attach_screen(&self, screen: &Screen) {
        let weak = Arc::downgrade(&screen.inner);
        let mut screens = lock_ignore_poison(&self.screens);
        if !screens.iter().any(|s| s.ptr_eq(&weak)) {
            screens.push(weak);
        }
    }

    /// Cache `new_content` and, if it changed, request a redraw from every
    /// screen showing this widget.
    ///
    /// The fan-out runs on its own thread: a redraw blocks on the draw
    /// mutex and the rate-limit sleep, and must not stall the caller
    /// (a hook callback or a widget loop).
    pub fn set_content(&self, new_content: String) {
        let changed = {
            let mut content = lock_ignore_poison(&self.content);
            if *content == new_content {
                false
            } else {
                *content = new_content;
                true
            }
        };
        if !changed {
            return;
        }

        let screens: Vec<Arc<ScreenInner>> = lock_ignore_poison(&self.screens)
            .iter()
            .filter_map(Weak::upgrade)
            .collect();
        if screens.is_empty() {
            return;
        }

        let spawned = std::thread::Builder::new()
            .name("widget-update".to_string())
            .spawn(move || {
                for screen in screens {
                    if let Err(e) = screen.update() {
                        tracing::error!("screen update failed: {e}");
                    }
                }
            });
        if let Err(e) = spawned {
            tracing::error!("could not spawn the screen update thread: {e}");
        }
    }
}

/// A piece of bar content.
pub trait Widget: Send + Sync {
    fn core(&self) -> &WidgetCore;

    /// Recompute the content and push it to the attached screens.
    fn update(&self);

    /// Periodic widgets rerun `update` at their refresh rate; the others
    /// update once at startup and are driven by hook notifications.
    fn periodic(&self) -> bool {
        false
    }

    /// Ask the widget loop to exit and wait for it.
    fn stop(&self) {
        let core = self.core();
        core.stop.set();
        if let Some(handle) = lock_ignore_poison(&core.thread).take() {
            let _ = handle.join();
        }
    }
}

/// Start a widget: run `update` once, then keep it running at the refresh
/// rate when the widget is periodic.
pub(crate) fn start(widget: &Arc<dyn Widget>) {
    let core = widget.core();
    if !core.stop.is_set() {
        return;
    }
    core.stop.clear();

    let widget = Arc::clone(widget);
    let spawned = std::thread::Builder::new()
        .name("widget".to_string())
        .spawn(move || {
            widget.update();
            while widget.periodic() {
                split_sleep(widget.core().refresh(), &widget.core().stop);
                if widget.core().stop.is_set() {
                    break;
                }
                widget.update();
            }
        });
    match spawned {
        Ok(handle) => *lock_ignore_poison(&core.thread) = Some(handle),
        Err(e) => {
            tracing::error!("could not spawn the widget thread: {e}");
            core.stop.set();
        }
    }
}

pub(crate) fn lock_ignore_poison<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decorate_without_style_is_the_identity() {
        assert_eq!(decorate("test", &WidgetStyle::default()), "test");
    }

    #[test]
    fn decorate_wraps_text_in_markup_scopes() {
        let style = WidgetStyle {
            fg: Some("#FFFF11".to_string()),
            bg: Some("#FF9021".to_string()),
            padding: 2,
            font: Some(1),
            actions: Vec::new(),
        };
        assert_eq!(
            decorate("test", &style),
            "%{B#FF9021}%{F#FFFF11}%{T1}  test  %{T-}%{F-}%{B-}"
        );
    }

    #[test]
    fn decorate_closes_one_scope_per_action() {
        let style = WidgetStyle {
            actions: vec![
                (1, "bspc desktop -f \"web\"".to_string()),
                (3, "bspc monitor -f \"HDMI-0\"".to_string()),
            ],
            ..WidgetStyle::default()
        };
        assert_eq!(
            decorate("web", &style),
            "%{A1:bspc desktop -f \"web\":}%{A3:bspc monitor -f \"HDMI-0\":}web%{A}%{A}"
        );
    }

    #[test]
    fn set_content_dedups_identical_content() {
        let core = WidgetCore::new(WidgetStyle::default(), None);
        core.set_content("a".to_string());
        assert_eq!(core.content(), "a");
        core.set_content("a".to_string());
        assert_eq!(core.content(), "a");
        core.set_content("b".to_string());
        assert_eq!(core.content(), "b");
    }

    #[test]
    fn widget_refresh_defaults_without_screens() {
        let core = WidgetCore::new(WidgetStyle::default(), None);
        assert_eq!(core.refresh(), DEFAULT_REFRESH);

        let fixed = WidgetCore::new(WidgetStyle::default(), Some(Duration::from_secs(3)));
        assert_eq!(fixed.refresh(), Duration::from_secs(3));
    }
}
