//! Title of the focused X11 window.

use std::{
    sync::{Arc, Weak},
    time::Duration,
};

use xcb::{x, Xid};

use super::{Widget, WidgetCore, WidgetStyle};
use crate::{
    error::{Error, Result},
    hooks::{Callback, HookConfig, HookEvent, Notification},
};

/// Property changes that can move the focus or rename the focused window.
const WATCHED_ATOMS: &[&str] = &["_NET_ACTIVE_WINDOW", "_NET_WM_NAME", "WM_NAME"];

fn is_title_event(atoms: &[String]) -> bool {
    atoms.iter().any(|a| WATCHED_ATOMS.contains(&a.as_str()))
}

fn intern_atom(conn: &xcb::Connection, name: &str) -> Result<x::Atom> {
    let cookie = conn.send_request(&x::InternAtom {
        only_if_exists: true,
        name: name.as_bytes(),
    });
    Ok(conn.wait_for_reply(cookie)?.atom())
}

fn window_title(conn: &xcb::Connection, window: x::Window) -> Result<Option<String>> {
    let net_wm_name = intern_atom(conn, "_NET_WM_NAME")?;
    let utf8_string = intern_atom(conn, "UTF8_STRING")?;

    let cookie = conn.send_request(&x::GetProperty {
        delete: false,
        window,
        property: net_wm_name,
        r#type: utf8_string,
        long_offset: 0,
        long_length: 1024,
    });
    let reply = conn.wait_for_reply(cookie)?;
    let bytes: &[u8] = reply.value();
    if !bytes.is_empty() {
        return Ok(Some(String::from_utf8_lossy(bytes).into_owned()));
    }

    // Older clients only set the ICCCM name.
    let cookie = conn.send_request(&x::GetProperty {
        delete: false,
        window,
        property: x::ATOM_WM_NAME,
        r#type: x::ATOM_STRING,
        long_offset: 0,
        long_length: 1024,
    });
    let reply = conn.wait_for_reply(cookie)?;
    let bytes: &[u8] = reply.value();
    if bytes.is_empty() {
        Ok(None)
    } else {
        Ok(Some(String::from_utf8_lossy(bytes).into_owned()))
    }
}

fn active_window_title() -> Result<Option<String>> {
    let (conn, screen_num) = xcb::Connection::connect(None)?;
    let setup = conn.get_setup();
    let screen = setup
        .roots()
        .nth(screen_num as usize)
        .ok_or_else(|| Error::X11(format!("no X screen {screen_num}")))?;

    let net_active_window = intern_atom(&conn, "_NET_ACTIVE_WINDOW")?;
    let cookie = conn.send_request(&x::GetProperty {
        delete: false,
        window: screen.root(),
        property: net_active_window,
        r#type: x::ATOM_WINDOW,
        long_offset: 0,
        long_length: 1,
    });
    let reply = conn.wait_for_reply(cookie)?;
    let windows: &[x::Window] = reply.value();
    match windows.first() {
        Some(&window) if window.resource_id() != 0 => window_title(&conn, window),
        _ => Ok(None),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    out.push_str("...");
    out
}

/// Title of the active window, requeried when the root window reports a
/// focus or title change.
pub struct ActiveWindowWidget {
    core: WidgetCore,
    max_chars: Option<usize>,
}

impl ActiveWindowWidget {
    #[must_use]
    pub fn new(
        style: WidgetStyle,
        max_chars: Option<usize>,
        failure_refresh: Duration,
    ) -> Arc<Self> {
        let widget = Arc::new(Self {
            core: WidgetCore::new(style, None),
            max_chars,
        });

        let weak: Weak<Self> = Arc::downgrade(&widget);
        widget.core.pool().subscribe(
            Callback::new(move |notification| {
                if let Some(widget) = weak.upgrade() {
                    widget.apply(notification);
                }
            }),
            HookConfig::Xorg,
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
        if let HookEvent::Xorg(atoms) = &notification.event {
            if is_title_event(atoms) {
                self.update();
            }
        }
    }
}

impl Widget for ActiveWindowWidget {
    fn core(&self) -> &WidgetCore {
        &self.core
    }

    fn update(&self) {
        match active_window_title() {
            Ok(Some(title)) => {
                let text = match self.max_chars {
                    Some(max) => truncate(&title, max),
                    None => title,
                };
                self.core.set_content(self.core.decorate(&text));
            }
            Ok(None) => self.core.set_content(String::new()),
            Err(e) => {
                tracing::debug!("could not fetch the active window title: {e}");
                self.core.set_content(String::new());
            }
        }
    }
}
