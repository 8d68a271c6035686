//! Display Backend Abstraction
//!
//! Answers one question for profile switching: which window has focus.
//! X11 sessions (and XWayland) are queried through x11rb; everything else
//! falls back to a backend that never reports a window, which leaves the
//! active profile untouched.

#[cfg(feature = "x11")]
pub mod x11;

pub mod null;

/// Detected display server type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayServer {
    X11,
    Wayland,
    Unknown,
}

impl DisplayServer {
    /// Detect the current display server from environment variables
    pub fn detect() -> Self {
        // Check XDG_SESSION_TYPE first (most reliable on modern systems)
        if let Ok(session_type) = std::env::var("XDG_SESSION_TYPE") {
            match session_type.to_lowercase().as_str() {
                "wayland" => return DisplayServer::Wayland,
                "x11" => return DisplayServer::X11,
                _ => {}
            }
        }

        if std::env::var("WAYLAND_DISPLAY").is_ok() {
            return DisplayServer::Wayland;
        }

        if std::env::var("DISPLAY").is_ok() {
            return DisplayServer::X11;
        }

        DisplayServer::Unknown
    }

    /// Get a human-readable name for the display server
    pub fn name(&self) -> &'static str {
        match self {
            DisplayServer::X11 => "X11",
            DisplayServer::Wayland => "Wayland",
            DisplayServer::Unknown => "Unknown",
        }
    }
}

/// Identity of the focused window. Any field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowInfo {
    pub title: Option<String>,
    pub class: Option<String>,
    pub instance: Option<String>,
}

impl WindowInfo {
    pub fn new(
        title: Option<&str>,
        class: Option<&str>,
        instance: Option<&str>,
    ) -> Self {
        Self {
            title: title.map(str::to_string),
            class: class.map(str::to_string),
            instance: instance.map(str::to_string),
        }
    }

    /// Candidate strings for pattern matching, in match order
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        [&self.title, &self.class, &self.instance]
            .into_iter()
            .filter_map(|f| f.as_deref())
    }
}

/// Trait for focused-window queries
pub trait WindowQuery: Send {
    /// Currently focused window, `None` when it cannot be determined
    fn current_window(&self) -> Option<WindowInfo>;
}

/// Factory for creating display backend components
pub struct DisplayBackend {
    display_server: DisplayServer,
}

impl DisplayBackend {
    /// Create a new display backend with auto-detection
    pub fn new() -> Self {
        let display_server = DisplayServer::detect();
        tracing::info!("Detected display server: {}", display_server.name());
        Self { display_server }
    }

    /// Create a backend for a specific display server
    pub fn for_server(display_server: DisplayServer) -> Self {
        Self { display_server }
    }

    /// Get the detected display server type
    pub fn display_server(&self) -> DisplayServer {
        self.display_server
    }

    /// Create a window query for the current display server.
    ///
    /// On Wayland only XWayland clients are visible, and only when DISPLAY
    /// is set.
    pub fn create_window_query(&self) -> Box<dyn WindowQuery> {
        match self.display_server {
            #[cfg(feature = "x11")]
            DisplayServer::X11 => self.x11_or_null(),
            #[cfg(feature = "x11")]
            DisplayServer::Wayland if std::env::var("DISPLAY").is_ok() => {
                tracing::info!("Using X11 window query via XWayland");
                self.x11_or_null()
            }
            _ => {
                tracing::warn!(
                    "No window query available for {:?}, profiles will not auto-switch",
                    self.display_server
                );
                Box::new(null::NullWindowQuery)
            }
        }
    }

    #[cfg(feature = "x11")]
    fn x11_or_null(&self) -> Box<dyn WindowQuery> {
        match x11::X11WindowQuery::new() {
            Ok(query) => Box::new(query),
            Err(e) => {
                tracing::warn!("Failed to create X11 window query: {}", e);
                Box::new(null::NullWindowQuery)
            }
        }
    }
}

impl Default for DisplayBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_fields_skip_missing() {
        let info = WindowInfo::new(Some("Untitled"), None, Some("krita"));
        let fields: Vec<&str> = info.fields().collect();
        assert_eq!(fields, vec!["Untitled", "krita"]);
    }

    #[test]
    fn test_unknown_server_gets_null_query() {
        let backend = DisplayBackend::for_server(DisplayServer::Unknown);
        assert_eq!(backend.display_server(), DisplayServer::Unknown);
        assert!(backend.create_window_query().current_window().is_none());
    }
}
