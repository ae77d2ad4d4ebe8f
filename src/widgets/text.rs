//! Static text.

use std::sync::Arc;

use super::{Widget, WidgetCore, WidgetStyle};

/// Fixed text, decorated once at startup.
pub struct TextWidget {
    core: WidgetCore,
    text: String,
}

impl TextWidget {
    #[must_use]
    pub fn new(text: impl Into<String>, style: WidgetStyle) -> Arc<Self> {
        Arc::new(Self {
            core: WidgetCore::new(style, None),
            text: text.into(),
        })
    }
}

impl Widget for TextWidget {
    fn core(&self) -> &WidgetCore {
        &self.core
    }

    fn update(&self) {
        self.core.set_content(self.core.decorate(&self.text));
    }
}
