//! X11 property-change watcher on the root window.

use std::time::Duration;

use xcb::x;

use super::{HookEvent, Notification, Runner};
use crate::{
    error::{Error, Result},
    tools::split_sleep,
};

fn atom_name(conn: &xcb::Connection, atom: x::Atom) -> Result<String> {
    let cookie = conn.send_request(&x::GetAtomName { atom });
    let reply = conn.wait_for_reply(cookie)?;
    Ok(reply.name().to_utf8().into_owned())
}

fn watch(runner: &Runner, refresh: Duration) -> Result<()> {
    let (conn, screen_num) = xcb::Connection::connect(None)?;
    let setup = conn.get_setup();
    let screen = setup
        .roots()
        .nth(screen_num as usize)
        .ok_or_else(|| Error::X11(format!("no X screen {screen_num}")))?;
    let root = screen.root();

    conn.send_and_check_request(&x::ChangeWindowAttributes {
        window: root,
        value_list: &[x::Cw::EventMask(x::EventMask::PROPERTY_CHANGE)],
    })?;
    conn.flush()?;

    while !runner.stop.is_set() {
        let mut atoms = Vec::new();
        while let Some(event) = conn.poll_for_event()? {
            if let xcb::Event::X(x::Event::PropertyNotify(e)) = event {
                atoms.push(atom_name(&conn, e.atom())?);
            }
        }
        if !atoms.is_empty() {
            tracing::debug!("xorg events received: {:?}", atoms);
            runner.notify(&Notification {
                running: true,
                event: HookEvent::Xorg(atoms),
            });
        }
        split_sleep(refresh, &runner.stop);
    }

    Ok(())
}

/// Poll the root window for property changes, notifying the atom names.
/// Reconnects after the failure backoff if the X connection drops.
pub(crate) fn run(runner: &Runner) {
    let refresh = if runner.refresh.is_zero() {
        Duration::from_millis(500)
    } else {
        runner.refresh
    };
    let backoff = if runner.failure_refresh.is_zero() {
        refresh
    } else {
        runner.failure_refresh
    };

    while !runner.stop.is_set() {
        if let Err(e) = watch(runner, refresh) {
            tracing::error!("xorg hook error: {e}");
            runner.notify(&Notification {
                running: false,
                event: HookEvent::Xorg(Vec::new()),
            });
            split_sleep(backoff, &runner.stop);
        }
    }
}
