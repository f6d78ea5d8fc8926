//! Screen geometry, queried once per layout application.

use crate::logln;

use std::error::Error;
use x11rb::connection::Connection;

#[derive(Clone, Copy, Debug)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

pub fn query() -> ScreenSize {
    match query_x11() {
        Ok(size) => size,
        Err(e) => {
            logln!("screen - geometry query failed ({}), assuming 1920x1080", e);
            ScreenSize {
                width: 1920,
                height: 1080,
            }
        }
    }
}

fn query_x11() -> Result<ScreenSize, Box<dyn Error>> {
    let (conn, screen_num) = x11rb::connect(None)?;
    let screen = &conn.setup().roots[screen_num];
    Ok(ScreenSize {
        width: u32::from(screen.width_in_pixels),
        height: u32::from(screen.height_in_pixels),
    })
}
