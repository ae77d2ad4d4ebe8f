//! Screen geometry discovery over the RandR extension.

use std::collections::HashMap;

use xcb::randr;

use crate::error::{Error, Result};

/// Pixel geometry of one connected output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutputGeometry {
    pub width: u32,
    pub height: u32,
    pub x: i32,
    pub y: i32,
}

fn output_geometry(
    conn: &xcb::Connection,
    resources: &randr::GetScreenResourcesCurrentReply,
    output: randr::Output,
) -> Result<(String, OutputGeometry)> {
    let info = conn.wait_for_reply(conn.send_request(&randr::GetOutputInfo {
        output,
        config_timestamp: resources.config_timestamp(),
    }))?;
    let name = String::from_utf8_lossy(info.name()).into_owned();

    // Disconnected outputs have no CRTC; the request fails and the output
    // is skipped by the caller.
    let crtc = conn.wait_for_reply(conn.send_request(&randr::GetCrtcInfo {
        crtc: info.crtc(),
        config_timestamp: resources.config_timestamp(),
    }))?;

    Ok((
        name,
        OutputGeometry {
            width: u32::from(crtc.width()),
            height: u32::from(crtc.height()),
            x: i32::from(crtc.x()),
            y: i32::from(crtc.y()),
        },
    ))
}

/// Map every connected output name to its geometry.
pub fn screen_geometries() -> Result<HashMap<String, OutputGeometry>> {
    let (conn, screen_num) =
        xcb::Connection::connect_with_extensions(None, &[xcb::Extension::RandR], &[])?;

    // Here screen does not relate to monitors, but the virtual screen made
    // up of all monitors.
    let setup = conn.get_setup();
    let screen = setup
        .roots()
        .nth(screen_num as usize)
        .ok_or_else(|| Error::X11(format!("no X screen {screen_num}")))?;
    let root = screen.root();

    let resources = conn.wait_for_reply(conn.send_request(&randr::GetScreenResourcesCurrent {
        window: root,
    }))?;

    let mut outputs = HashMap::new();
    for &output in resources.outputs() {
        match output_geometry(&conn, &resources, output) {
            Ok((name, geometry)) => {
                outputs.insert(name, geometry);
            }
            Err(e) => {
                tracing::debug!("error when trying to fetch screen infos: {e}");
            }
        }
    }
    Ok(outputs)
}
