//! One bar area, usually mapped to one physical output.

use std::{
    sync::{Arc, Mutex, MutexGuard, Weak},
    time::Duration,
};

use crate::{
    error::{Error, Result},
    hooks::HookPool,
    panel::PanelInner,
    sink::{BarConfig, Geometry},
    tools::StopToken,
    update::Drawer,
    widgets::{self, Widget},
    xrandr,
};

/// Where a widget sits in the bar.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Alignment {
    Left,
    Center,
    Right,
}

impl Alignment {
    /// The lemonbar alignment switch, as in `%{l}`.
    #[must_use]
    pub fn flag(self) -> char {
        match self {
            Self::Left => 'l',
            Self::Center => 'c',
            Self::Right => 'r',
        }
    }
}

impl TryFrom<char> for Alignment {
    type Error = Error;

    fn try_from(c: char) -> Result<Self> {
        match c {
            'l' => Ok(Self::Left),
            'c' => Ok(Self::Center),
            'r' => Ok(Self::Right),
            _ => Err(Error::InvalidAlignment(c)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ScreenConfig {
    /// RandR output name used to discover the bar geometry.
    pub name: Option<String>,
    /// Redraw rate limit; falls back to the panel's rate.
    pub refresh: Option<Duration>,
    /// Bar height in pixels, applied to discovered geometries.
    pub height: u32,
    /// Margins (left, right, top, bottom) applied to a discovered geometry.
    pub offset: (i32, i32, i32, i32),
    /// Explicit geometry, bypassing discovery.
    pub geometry: Option<Geometry>,
    /// Bar command override for this screen.
    pub bar_cmd: Option<String>,
    pub fonts: Vec<String>,
    pub fg: Option<String>,
    pub bg: Option<String>,
    pub clickable: Option<u32>,
    pub extra: Vec<String>,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            name: None,
            refresh: None,
            height: 18,
            offset: (0, 0, 0, 0),
            geometry: None,
            bar_cmd: None,
            fonts: Vec::new(),
            fg: None,
            bg: None,
            clickable: None,
            extra: Vec::new(),
        }
    }
}

#[derive(Default)]
struct AlignedWidgets {
    left: Vec<Arc<dyn Widget>>,
    center: Vec<Arc<dyn Widget>>,
    right: Vec<Arc<dyn Widget>>,
}

impl AlignedWidgets {
    fn list_mut(&mut self, alignment: Alignment) -> &mut Vec<Arc<dyn Widget>> {
        match alignment {
            Alignment::Left => &mut self.left,
            Alignment::Center => &mut self.center,
            Alignment::Right => &mut self.right,
        }
    }

    fn all(&self) -> Vec<Arc<dyn Widget>> {
        self.left
            .iter()
            .chain(&self.center)
            .chain(&self.right)
            .cloned()
            .collect()
    }
}

pub(crate) struct ScreenInner {
    pub(crate) config: ScreenConfig,
    widgets: Mutex<AlignedWidgets>,
    pub(crate) panel: Mutex<Weak<PanelInner>>,
    pub(crate) pool: Arc<HookPool>,
    pub(crate) drawer: Drawer,
    pub(crate) stop: StopToken,
}

impl ScreenInner {
    fn widgets(&self) -> MutexGuard<'_, AlignedWidgets> {
        match self.widgets.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn panel(&self) -> Option<Arc<PanelInner>> {
        match self.panel.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
        .upgrade()
    }

    pub(crate) fn refresh(&self) -> Duration {
        self.config
            .refresh
            .or_else(|| self.panel().map(|panel| panel.config.refresh))
            .unwrap_or(widgets::DEFAULT_REFRESH)
    }

    /// Current frame of this screen: the cached content of every widget,
    /// grouped under its alignment switch. Empty alignments are skipped.
    pub(crate) fn gather(&self) -> String {
        use std::fmt::Write;

        let widgets = self.widgets();
        let mut out = String::new();
        for (alignment, list) in [
            (Alignment::Left, &widgets.left),
            (Alignment::Center, &widgets.center),
            (Alignment::Right, &widgets.right),
        ] {
            if list.is_empty() {
                continue;
            }
            let _ = write!(out, "%{{{}}}", alignment.flag());
            for widget in list {
                out.push_str(&widget.core().content());
            }
        }
        out
    }

    /// Redraw this screen, or the whole panel when it runs a single bar.
    pub(crate) fn update(&self) -> Result<()> {
        if let Some(panel) = self.panel() {
            if !panel.config.instance_per_screen {
                return panel.update();
            }
        }
        self.drawer
            .update(&|| self.gather(), self.refresh(), &self.stop)
    }

    fn bar_cmd(&self) -> String {
        self.config
            .bar_cmd
            .clone()
            .or_else(|| self.panel().map(|panel| panel.config.bar_cmd.clone()))
            .unwrap_or_else(|| "lemonbar".to_string())
    }

    fn geometry(&self) -> Result<Option<Geometry>> {
        if let Some(geometry) = &self.config.geometry {
            return Ok(Some(geometry.clone()));
        }
        let Some(name) = &self.config.name else {
            // No output to discover: let the bar pick width and position,
            // but still pass the configured height.
            return Ok(Some(Geometry::Size {
                width: None,
                height: Some(self.config.height),
                x: None,
                y: None,
            }));
        };

        let outputs = xrandr::screen_geometries()?;
        let output = outputs
            .get(name)
            .ok_or_else(|| Error::UnknownOutput(name.clone()))?;

        let (left, right, top, bottom) = self.config.offset;
        let width = (output.width as i32 - left - right).max(0) as u32;
        Ok(Some(Geometry::Size {
            width: Some(width),
            height: Some(self.config.height),
            x: Some(output.x + left),
            y: Some(output.y + top - bottom),
        }))
    }

    pub(crate) fn bar_config(&self) -> Result<BarConfig> {
        Ok(BarConfig {
            cmd: self.bar_cmd(),
            geometry: self.geometry()?,
            fonts: self.config.fonts.clone(),
            fg: self.config.fg.clone(),
            bg: self.config.bg.clone(),
            clickable: self.config.clickable,
            extra: self.config.extra.clone(),
        })
    }

    pub(crate) fn init_bar(&self) -> Result<()> {
        self.drawer.init_bar(self.bar_config()?)
    }

    pub(crate) fn start(&self, own_bar: bool) -> Result<()> {
        self.stop.clear();
        if own_bar {
            self.init_bar()?;
        }
        // Release the widgets lock before touching widget threads: a
        // running widget may be inside gather(), which takes it too.
        let all = self.widgets().all();
        for widget in all {
            widgets::start(&widget);
        }
        Ok(())
    }

    pub(crate) fn stop(&self) {
        self.stop.set();
        let all = self.widgets().all();
        for widget in all {
            widget.stop();
        }
        self.drawer.stop_bar(false);
    }
}

/// Handle on one screen. Clones share the same underlying screen.
#[derive(Clone)]
pub struct Screen {
    pub(crate) inner: Arc<ScreenInner>,
}

impl Screen {
    #[must_use]
    pub fn new(config: ScreenConfig) -> Self {
        Self {
            inner: Arc::new(ScreenInner {
                config,
                widgets: Mutex::new(AlignedWidgets::default()),
                panel: Mutex::new(Weak::new()),
                pool: HookPool::new(false),
                drawer: Drawer::new(),
                stop: StopToken::new(),
            }),
        }
    }

    pub fn add_widget(&self, alignment: Alignment, widget: Arc<dyn Widget>) {
        self.add_widgets(alignment, &[widget], None);
    }

    /// Register widgets under `alignment`, at `index` or appended.
    ///
    /// Each widget's hook pool is reparented here and merged, so its
    /// subscriptions become visible to the screen and, transitively, to
    /// the panel.
    pub fn add_widgets(
        &self,
        alignment: Alignment,
        new_widgets: &[Arc<dyn Widget>],
        index: Option<usize>,
    ) {
        {
            let mut widgets = self.inner.widgets();
            let list = widgets.list_mut(alignment);
            let at = index.unwrap_or(list.len()).min(list.len());
            for (i, widget) in new_widgets.iter().enumerate() {
                list.insert(at + i, Arc::clone(widget));
            }
        }
        for widget in new_widgets {
            widget.core().attach_screen(self);
            widget.core().pool().set_parent(&self.inner.pool);
            self.inner.pool.merge(widget.core().pool());
        }
    }

    #[must_use]
    pub fn gather(&self) -> String {
        self.inner.gather()
    }

    pub fn update(&self) -> Result<()> {
        self.inner.update()
    }

    pub fn init_bar(&self) -> Result<()> {
        self.inner.init_bar()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::widgets::{TextWidget, WidgetStyle};
    use std::time::Instant;

    fn text(t: &str) -> Arc<dyn Widget> {
        let widget = TextWidget::new(t, WidgetStyle::default());
        widget.update();
        widget
    }

    #[test]
    fn alignment_parses_from_chars() {
        assert_eq!(Alignment::try_from('l').unwrap(), Alignment::Left);
        assert_eq!(Alignment::try_from('c').unwrap(), Alignment::Center);
        assert_eq!(Alignment::try_from('r').unwrap(), Alignment::Right);
        assert!(matches!(
            Alignment::try_from('x'),
            Err(Error::InvalidAlignment('x'))
        ));
    }

    #[test]
    fn gather_concatenates_widgets_in_insertion_order() {
        let screen = Screen::new(ScreenConfig::default());
        screen.add_widget(Alignment::Left, text("test"));
        screen.add_widget(Alignment::Left, text("test1"));

        assert_eq!(screen.gather(), "%{l}testtest1");
    }

    #[test]
    fn gather_skips_empty_alignments() {
        let screen = Screen::new(ScreenConfig::default());
        screen.add_widget(Alignment::Right, text("clock"));
        assert_eq!(screen.gather(), "%{r}clock");

        screen.add_widget(Alignment::Left, text("desktops"));
        assert_eq!(screen.gather(), "%{l}desktops%{r}clock");
    }

    #[test]
    fn add_widgets_honours_the_index() {
        let screen = Screen::new(ScreenConfig::default());
        screen.add_widget(Alignment::Left, text("a"));
        screen.add_widget(Alignment::Left, text("c"));
        screen.add_widgets(Alignment::Left, &[text("b")], Some(1));

        assert_eq!(screen.gather(), "%{l}abc");
    }

    #[test]
    fn widget_refresh_follows_the_fastest_screen() {
        let fast = Screen::new(ScreenConfig {
            refresh: Some(Duration::from_secs(1)),
            ..ScreenConfig::default()
        });
        let slow = Screen::new(ScreenConfig {
            refresh: Some(Duration::from_secs(3)),
            ..ScreenConfig::default()
        });

        let widget = text("shared");
        fast.add_widget(Alignment::Left, Arc::clone(&widget));
        slow.add_widget(Alignment::Left, widget.clone());

        assert_eq!(widget.core().refresh(), Duration::from_secs(1));
    }

    #[test]
    fn bar_geometry_falls_back_to_the_height() {
        let screen = Screen::new(ScreenConfig {
            height: 24,
            ..ScreenConfig::default()
        });

        let config = screen.inner.bar_config().unwrap();
        assert_eq!(
            config.geometry,
            Some(Geometry::Size {
                width: None,
                height: Some(24),
                x: None,
                y: None,
            })
        );
        assert_eq!(
            crate::sink::bar_args(&config),
            ["lemonbar", "-g", "x24++"]
        );
    }

    #[test]
    fn explicit_geometry_bypasses_the_height_fallback() {
        let screen = Screen::new(ScreenConfig {
            geometry: Some(Geometry::Literal("250x250+5+5".to_string())),
            ..ScreenConfig::default()
        });

        let config = screen.inner.bar_config().unwrap();
        assert_eq!(
            config.geometry,
            Some(Geometry::Literal("250x250+5+5".to_string()))
        );
    }

    fn cat_bar() -> BarConfig {
        BarConfig {
            cmd: "cat".to_string(),
            ..BarConfig::default()
        }
    }

    #[test]
    fn content_change_reaches_every_screen_showing_the_widget() {
        let first = Screen::new(ScreenConfig::default());
        let second = Screen::new(ScreenConfig::default());
        first.inner.drawer.init_bar(cat_bar()).unwrap();
        second.inner.drawer.init_bar(cat_bar()).unwrap();

        let widget = TextWidget::new("shared", WidgetStyle::default());
        first.add_widget(Alignment::Left, widget.clone());
        second.add_widget(Alignment::Left, widget.clone());

        widget.update();

        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline
            && (first.inner.drawer.frames_written() < 1
                || second.inner.drawer.frames_written() < 1)
        {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(first.inner.drawer.frames_written(), 1);
        assert_eq!(second.inner.drawer.frames_written(), 1);

        first.inner.drawer.stop_bar(true);
        second.inner.drawer.stop_bar(true);
    }
}
