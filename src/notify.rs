//! Best-effort desktop notifications over org.freedesktop.Notifications.

use crate::debugln;

use std::collections::HashMap;
use std::error::Error;
use zbus::zvariant::Value;

/// Fire-and-forget: a missing notification daemon is not worth surfacing.
pub fn send(summary: &str, body: &str) {
    if let Err(e) = send_inner(summary, body) {
        debugln!("notify - ignored failure: {}", e);
    }
}

fn send_inner(summary: &str, body: &str) -> Result<(), Box<dyn Error>> {
    let conn = zbus::blocking::Connection::session()?;
    let proxy = zbus::blocking::Proxy::new(
        &conn,
        "org.freedesktop.Notifications",
        "/org/freedesktop/Notifications",
        "org.freedesktop.Notifications",
    )?;

    let _: u32 = proxy.call(
        "Notify",
        &(
            "splitcraft",
            0u32,
            "input-gaming",
            summary,
            body,
            Vec::<&str>::new(),
            HashMap::<&str, Value>::new(),
            4000i32,
        ),
    )?;
    Ok(())
}
