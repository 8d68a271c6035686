//! Profile resolution
//!
//! Picks the profile for the focused window and builds the effective
//! configuration the dispatcher works from.
//!
//! Selection order:
//! 1. Highest priority among profiles whose pattern matches title, class or
//!    instance. Ties go to the profile loaded first.
//! 2. The default profile.
//! 3. Whatever is active now (sticky fallback).

use crate::config::Configuration;
use crate::display_backend::WindowInfo;
use crate::pattern::glob_match;
use crate::profile::{Profile, ProfileSet};
use std::sync::Arc;
use tracing::{debug, info};

/// Base configuration with the active profile's overlay applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveConfiguration {
    pub config: Configuration,
    /// Name of the profile that produced this merge
    pub profile: Option<String>,
}

/// Emitted when the active profile changes
#[derive(Debug, Clone)]
pub struct ProfileSwitch {
    pub name: String,
    pub effective: Arc<EffectiveConfiguration>,
}

/// Build a fresh effective configuration.
///
/// Everything comes from `base`; only bindings and descriptions the
/// profile's overlay sets are replaced.
pub fn merge(base: &Configuration, profile: Option<&Profile>) -> EffectiveConfiguration {
    let mut config = base.clone();
    if let Some(overlay) = profile.and_then(|p| p.overlay.as_ref()) {
        config.registry.apply_overlay(overlay);
    }
    EffectiveConfiguration {
        config,
        profile: profile.map(|p| p.name.clone()),
    }
}

/// Does `profile` match any field of `window`?
pub fn matches(profile: &Profile, window: &WindowInfo) -> bool {
    window
        .fields()
        .any(|field| glob_match(&profile.window_pattern, field))
}

/// Tracks the active profile and the effective configuration
pub struct ProfileEngine {
    base: Arc<Configuration>,
    profiles: ProfileSet,
    active: Option<usize>,
    last_window: Option<WindowInfo>,
    effective: Arc<EffectiveConfiguration>,
}

impl ProfileEngine {
    pub fn new(base: Arc<Configuration>, profiles: ProfileSet) -> Self {
        let effective = Arc::new(merge(&base, None));
        Self {
            base,
            profiles,
            active: None,
            last_window: None,
            effective,
        }
    }

    pub fn profiles(&self) -> &ProfileSet {
        &self.profiles
    }

    pub fn base(&self) -> &Arc<Configuration> {
        &self.base
    }

    /// Current effective configuration
    pub fn effective(&self) -> Arc<EffectiveConfiguration> {
        Arc::clone(&self.effective)
    }

    /// Active profile, if any
    pub fn active(&self) -> Option<&Profile> {
        self.active.and_then(|i| self.profiles.get(i))
    }

    /// Profile index the selection rules pick for `window`.
    ///
    /// `None` means no match and no default: keep the current profile.
    pub fn select(&self, window: &WindowInfo) -> Option<usize> {
        let mut best: Option<(usize, i32)> = None;
        for (index, profile) in self.profiles.iter().enumerate() {
            if !matches(profile, window) {
                continue;
            }
            // Strictly greater so the first-loaded profile wins ties
            if best.is_none_or(|(_, priority)| profile.priority > priority) {
                best = Some((index, profile.priority));
            }
        }
        best.map(|(index, _)| index)
            .or_else(|| self.profiles.default_index())
    }

    /// Re-evaluate for the focused window.
    ///
    /// Repeated calls with the same window do nothing.
    pub fn resolve(&mut self, window: &WindowInfo) -> Option<ProfileSwitch> {
        if self.last_window.as_ref() == Some(window) {
            return None;
        }
        debug!(
            "Window changed: title={:?} class={:?} instance={:?}",
            window.title, window.class, window.instance
        );
        self.last_window = Some(window.clone());

        let index = self.select(window)?;
        if self.active == Some(index) {
            return None;
        }
        self.activate(index)
    }

    /// Switch to a profile by name regardless of the focused window
    pub fn switch_to(&mut self, name: &str) -> Option<ProfileSwitch> {
        let index = self.profiles.position(name)?;
        if self.active == Some(index) {
            return None;
        }
        self.activate(index)
    }

    fn activate(&mut self, index: usize) -> Option<ProfileSwitch> {
        let profile = self.profiles.get(index)?;
        let effective = Arc::new(merge(&self.base, Some(profile)));
        info!("Profile switched: '{}'", profile.name);

        self.active = Some(index);
        self.effective = Arc::clone(&effective);
        Some(ProfileSwitch {
            name: profile.name.clone(),
            effective,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{ButtonBinding, ButtonRegistry};

    fn window(title: &str, class: &str) -> WindowInfo {
        WindowInfo::new(Some(title), Some(class), None)
    }

    fn base() -> Arc<Configuration> {
        let mut config = Configuration::default();
        config.registry.set_button(0, ButtonBinding::key("b"));
        Arc::new(config)
    }

    fn engine(profiles: Vec<Profile>) -> ProfileEngine {
        ProfileEngine::new(base(), ProfileSet::new(profiles).unwrap())
    }

    #[test]
    fn test_highest_priority_wins() {
        let engine = engine(vec![
            Profile::new("Low", "*paint*", 1),
            Profile::new("High", "*krita*", 10),
        ]);
        let w = window("Krita paint", "krita");
        assert_eq!(engine.select(&w), Some(1));
    }

    #[test]
    fn test_tie_goes_to_first_loaded() {
        let engine = engine(vec![
            Profile::new("First", "*krita*", 5),
            Profile::new("Second", "krita", 5),
        ]);
        assert_eq!(engine.select(&window("x", "krita")), Some(0));
    }

    #[test]
    fn test_default_and_sticky_fallback() {
        let with_default = engine(vec![
            Profile::new("Krita", "*krita*", 5),
            Profile::new("Desktop", "*xfdesktop*", 0).with_default(true),
        ]);
        assert_eq!(with_default.select(&window("Terminal", "xterm")), Some(1));

        let mut sticky = engine(vec![Profile::new("Krita", "*krita*", 5)]);
        assert!(sticky.resolve(&window("Krita", "krita")).is_some());
        assert!(sticky.resolve(&window("Terminal", "xterm")).is_none());
        assert_eq!(sticky.active().map(|p| p.name.as_str()), Some("Krita"));
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let mut engine = engine(vec![Profile::new("Krita", "*krita*", 5)]);
        let w = window("Krita", "krita");
        let first = engine.resolve(&w).unwrap();
        assert_eq!(first.name, "Krita");
        let before = engine.effective();
        assert!(engine.resolve(&w).is_none());
        assert!(Arc::ptr_eq(&before, &engine.effective()));
    }

    #[test]
    fn test_same_profile_for_new_window_does_not_rebuild() {
        let mut engine = engine(vec![Profile::new("Krita", "*krita*", 5)]);
        engine.resolve(&window("a.kra - Krita", "krita"));
        let before = engine.effective();
        assert!(engine.resolve(&window("b.kra - Krita", "krita")).is_none());
        assert!(Arc::ptr_eq(&before, &engine.effective()));
    }

    #[test]
    fn test_merge_without_bindings_keeps_base() {
        let base = base();
        let mut overlay = ButtonRegistry::new();
        overlay.set_leader_description("Alt");
        let profile = Profile::new("Docs", "*", 0).with_overlay(overlay);

        let merged = merge(&base, Some(&profile));
        assert_eq!(merged.profile.as_deref(), Some("Docs"));

        let mut expected = (*base).clone();
        expected.registry.set_leader_description("Alt");
        assert_eq!(merged.config, expected);

        let plain = merge(&base, Some(&Profile::new("Plain", "*", 0)));
        assert_eq!(plain.config, *base);
    }

    #[test]
    fn test_merge_overrides_and_grows() {
        let mut overlay = ButtonRegistry::new();
        overlay.set_button(0, ButtonBinding::key("e"));
        overlay.set_button(30, ButtonBinding::key("z"));
        let profile = Profile::new("Krita", "*krita*", 0).with_overlay(overlay);

        let base = base();
        let merged = merge(&base, Some(&profile));
        assert_eq!(merged.config.registry.button(0).map(|b| b.action.as_str()), Some("e"));
        assert_eq!(merged.config.registry.button(30).map(|b| b.action.as_str()), Some("z"));
        // Base is untouched
        assert_eq!(base.registry.button(0).map(|b| b.action.as_str()), Some("b"));
        assert_eq!(base.registry.button_slots(), 1);
    }

    #[test]
    fn test_switch_to_by_name() {
        let mut engine = engine(vec![
            Profile::new("Krita", "*krita*", 5),
            Profile::new("Gimp", "*gimp*", 5),
        ]);
        assert_eq!(engine.switch_to("Gimp").map(|s| s.name), Some("Gimp".to_string()));
        assert!(engine.switch_to("Gimp").is_none());
        assert!(engine.switch_to("Blender").is_none());
    }
}
