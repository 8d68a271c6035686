//! Null/Fallback Display Backend
//!
//! Used when no display server is available or detection fails.

use super::{WindowInfo, WindowQuery};

/// Null window query - never knows the focused window
pub struct NullWindowQuery;

impl WindowQuery for NullWindowQuery {
    fn current_window(&self) -> Option<WindowInfo> {
        None
    }
}
