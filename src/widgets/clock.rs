//! Local time.

use std::{sync::Arc, time::Duration};

use super::{Widget, WidgetCore, WidgetStyle};

/// Current local time, rendered through a strftime format string.
pub struct ClockWidget {
    core: WidgetCore,
    format: String,
}

impl ClockWidget {
    /// `format` follows chrono's strftime syntax, e.g. `"%a %d %b %H:%M"`.
    #[must_use]
    pub fn new(format: impl Into<String>, style: WidgetStyle, refresh: Duration) -> Arc<Self> {
        Arc::new(Self {
            core: WidgetCore::new(style, Some(refresh)),
            format: format.into(),
        })
    }

    fn render(&self) -> String {
        chrono::Local::now().format(&self.format).to_string()
    }
}

impl Widget for ClockWidget {
    fn core(&self) -> &WidgetCore {
        &self.core
    }

    fn update(&self) {
        let text = self.render();
        self.core.set_content(self.core.decorate(&text));
    }

    fn periodic(&self) -> bool {
        true
    }
}
