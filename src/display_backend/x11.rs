//! X11 Display Backend
//!
//! Reads the focused window for profile switching.
//!
//! This module uses:
//! - `_NET_ACTIVE_WINDOW` on the root window to find the focused window
//! - `_NET_WM_NAME` (UTF-8), falling back to `WM_NAME`, for the title
//! - `WM_CLASS` property for application identification

use super::{WindowInfo, WindowQuery};
use anyhow::{Context, Result};
use tracing::{debug, info};
use x11rb::connection::Connection;
use x11rb::protocol::xproto::*;
use x11rb::rust_connection::RustConnection;

/// Focused-window query over one X connection
pub struct X11WindowQuery {
    conn: RustConnection,
    /// Root window
    root: Window,
    net_active_window: Atom,
    net_wm_name: Atom,
    utf8_string: Atom,
}

impl X11WindowQuery {
    /// Connect to the X server named by DISPLAY
    pub fn new() -> Result<Self> {
        let (conn, screen_num) = x11rb::connect(None)
            .context("Failed to connect to X11 display")?;

        let root = conn.setup().roots[screen_num].root;
        let net_active_window = intern_atom(&conn, "_NET_ACTIVE_WINDOW")?;
        let net_wm_name = intern_atom(&conn, "_NET_WM_NAME")?;
        let utf8_string = intern_atom(&conn, "UTF8_STRING")?;

        info!("X11 window query initialized (root: {})", root);

        Ok(Self {
            conn,
            root,
            net_active_window,
            net_wm_name,
            utf8_string,
        })
    }

    fn active_window(&self) -> Result<Option<Window>> {
        let prop = self
            .conn
            .get_property(false, self.root, self.net_active_window, AtomEnum::WINDOW, 0, 1)?
            .reply()?;
        Ok(prop
            .value32()
            .and_then(|mut it| it.next())
            .filter(|&w| w != x11rb::NONE))
    }

    fn window_title(&self, w: Window) -> Result<Option<String>> {
        let prop = self
            .conn
            .get_property(false, w, self.net_wm_name, self.utf8_string, 0, 1024)?
            .reply()?;
        if !prop.value.is_empty() {
            return Ok(Some(String::from_utf8_lossy(&prop.value).to_string()));
        }

        let prop = self
            .conn
            .get_property(false, w, AtomEnum::WM_NAME, AtomEnum::ANY, 0, 1024)?
            .reply()?;
        if prop.value.is_empty() {
            Ok(None)
        } else {
            Ok(Some(String::from_utf8_lossy(&prop.value).to_string()))
        }
    }

    fn query(&self) -> Result<Option<WindowInfo>> {
        let Some(w) = self.active_window()? else {
            return Ok(None);
        };

        let title = self.window_title(w)?;
        let (instance, class) = match get_wm_class(&self.conn, w)? {
            Some((instance, class)) => (non_empty(instance), non_empty(class)),
            None => (None, None),
        };

        Ok(Some(WindowInfo {
            title,
            class,
            instance,
        }))
    }
}

impl WindowQuery for X11WindowQuery {
    fn current_window(&self) -> Option<WindowInfo> {
        match self.query() {
            Ok(info) => info,
            Err(e) => {
                debug!("Active window query failed: {}", e);
                None
            }
        }
    }
}

fn non_empty(s: String) -> Option<String> {
    (!s.is_empty()).then_some(s)
}

/// Intern an X11 atom by name
fn intern_atom<C: Connection>(conn: &C, name: &str) -> Result<Atom> {
    Ok(conn.intern_atom(false, name.as_bytes())?.reply()?.atom)
}

/// Get WM_CLASS property (instance, class) for a window
fn get_wm_class<C: Connection>(conn: &C, w: Window) -> Result<Option<(String, String)>> {
    let prop = conn
        .get_property(false, w, AtomEnum::WM_CLASS, AtomEnum::STRING, 0, 1024)?
        .reply()?;

    if prop.value.is_empty() {
        return Ok(None);
    }

    Ok(Some(split_wm_class(&prop.value)))
}

/// WM_CLASS holds two NUL-terminated strings: instance then class
fn split_wm_class(value: &[u8]) -> (String, String) {
    let parts: Vec<&[u8]> = value
        .split(|&b| b == 0)
        .filter(|p| !p.is_empty())
        .collect();

    let instance = parts
        .first()
        .map(|p| String::from_utf8_lossy(p).to_string())
        .unwrap_or_default();
    let class = parts
        .get(1)
        .map(|p| String::from_utf8_lossy(p).to_string())
        .unwrap_or_default();
    (instance, class)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_wm_class() {
        assert_eq!(
            split_wm_class(b"krita\0krita\0"),
            ("krita".to_string(), "krita".to_string())
        );
        assert_eq!(
            split_wm_class(b"Navigator\0firefox\0"),
            ("Navigator".to_string(), "firefox".to_string())
        );
        assert_eq!(split_wm_class(b"only\0"), ("only".to_string(), String::new()));
    }
}
