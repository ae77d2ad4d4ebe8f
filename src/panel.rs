//! Top-level bar coordinator.

use std::{
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use crate::{
    error::Result,
    hooks::HookPool,
    screen::Screen,
    sink::{BarConfig, Geometry},
    tools::StopToken,
    update::Drawer,
};

#[derive(Clone, Debug)]
pub struct PanelConfig {
    /// Minimum delay between two redraws of one bar.
    pub refresh: Duration,
    /// One bar process per screen, or a single bar splitting its output
    /// across monitors with `%{S+}`.
    pub instance_per_screen: bool,
    pub bar_cmd: String,
    /// Appearance of the single bar; per-screen bars use their screen's
    /// configuration instead.
    pub geometry: Option<Geometry>,
    pub fonts: Vec<String>,
    pub fg: Option<String>,
    pub bg: Option<String>,
    pub clickable: Option<u32>,
    pub extra: Vec<String>,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            refresh: Duration::from_millis(100),
            instance_per_screen: true,
            bar_cmd: "lemonbar".to_string(),
            geometry: None,
            fonts: Vec::new(),
            fg: None,
            bg: None,
            clickable: None,
            extra: Vec::new(),
        }
    }
}

pub(crate) struct PanelInner {
    pub(crate) config: PanelConfig,
    screens: Mutex<Vec<Screen>>,
    pub(crate) pool: Arc<HookPool>,
    pub(crate) drawer: Drawer,
    pub(crate) stop: StopToken,
}

impl PanelInner {
    fn screens(&self) -> MutexGuard<'_, Vec<Screen>> {
        match self.screens.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Frame of the single bar: every screen's frame, joined with the
    /// monitor-switch marker.
    pub(crate) fn gather(&self) -> String {
        self.screens()
            .iter()
            .map(Screen::gather)
            .collect::<Vec<_>>()
            .join("%{S+}")
    }

    pub(crate) fn update(&self) -> Result<()> {
        self.drawer
            .update(&|| self.gather(), self.config.refresh, &self.stop)
    }

    fn bar_config(&self) -> BarConfig {
        BarConfig {
            cmd: self.config.bar_cmd.clone(),
            geometry: self.config.geometry.clone(),
            fonts: self.config.fonts.clone(),
            fg: self.config.fg.clone(),
            bg: self.config.bg.clone(),
            clickable: self.config.clickable,
            extra: self.config.extra.clone(),
        }
    }
}

/// The whole bar: screens, their widgets and the shared hook registry.
///
/// This is the only listening pool in the hierarchy, so hooks run exactly
/// once however many widgets subscribed to them.
#[derive(Clone)]
pub struct Panel {
    inner: Arc<PanelInner>,
}

impl Panel {
    #[must_use]
    pub fn new(config: PanelConfig) -> Self {
        Self {
            inner: Arc::new(PanelInner {
                config,
                screens: Mutex::new(Vec::new()),
                pool: HookPool::new(true),
                drawer: Drawer::new(),
                stop: StopToken::new(),
            }),
        }
    }

    pub fn add_screen(&self, screen: &Screen) {
        self.add_screens(&[screen.clone()], None);
    }

    /// Register screens at `index` or appended, reparenting their hook
    /// pools so every subscription below ends up here.
    pub fn add_screens(&self, new_screens: &[Screen], index: Option<usize>) {
        {
            let mut screens = self.inner.screens();
            let at = index.unwrap_or(screens.len()).min(screens.len());
            for (i, screen) in new_screens.iter().enumerate() {
                screens.insert(at + i, screen.clone());
            }
        }
        for screen in new_screens {
            *lock_weak(screen) = Arc::downgrade(&self.inner);
            screen.inner.pool.set_parent(&self.inner.pool);
            self.inner.pool.merge(&screen.inner.pool);
        }
    }

    #[must_use]
    pub fn gather(&self) -> String {
        self.inner.gather()
    }

    /// Run the panel: spawn the bars, start every widget and hook, then
    /// block until [`stop`](Self::stop) is called from another thread.
    pub fn start(&self) -> Result<()> {
        self.inner.stop.clear();

        if !self.inner.config.instance_per_screen {
            self.inner.drawer.init_bar(self.inner.bar_config())?;
        }
        let screens = self.inner.screens().clone();
        for screen in &screens {
            screen.inner.start(self.inner.config.instance_per_screen)?;
        }
        self.inner.pool.start();

        self.inner.stop.wait();
        Ok(())
    }

    /// Stop hooks, widgets and bars, and release [`start`](Self::start).
    pub fn stop(&self) {
        self.inner.stop.set();
        self.inner.pool.stop();
        for screen in self.inner.screens().iter() {
            screen.inner.stop();
        }
        self.inner.drawer.stop_bar(false);
    }
}

fn lock_weak(screen: &Screen) -> std::sync::MutexGuard<'_, std::sync::Weak<PanelInner>> {
    match screen.inner.panel.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
