//! Per-application profiles
//!
//! A profile pairs a window pattern with an overlay: button bindings, wheel
//! bindings and descriptions that replace the base configuration while a
//! matching window has focus. Profiles live in one TOML file each inside the
//! profile directory and are loaded in file-name order.

use crate::binding::ButtonRegistry;
use crate::config::{ConfigError, RawButton, RawWheel, build_registry};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Partial registry applied on top of the base configuration.
///
/// Leader, OSD, wheel-mode and device settings are not part of it.
pub type Overlay = ButtonRegistry;

/// Errors raised while loading or validating profiles
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("profile #{0} has an empty name")]
    EmptyName(usize),

    #[error("profile '{0}' has an empty pattern")]
    EmptyPattern(String),

    #[error("profile name '{0}' is used more than once")]
    DuplicateName(String),

    #[error("profiles '{first}' and '{second}' use the same pattern '{pattern}'")]
    DuplicatePattern {
        pattern: String,
        first: String,
        second: String,
    },

    #[error("profiles '{first}' and '{second}' are both marked default")]
    MultipleDefaults { first: String, second: String },

    #[error("failed to read profile directory {}: {source}", .path.display())]
    Dir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// A window-matched profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub name: String,
    pub window_pattern: String,
    pub priority: i32,
    pub is_default: bool,
    pub overlay: Option<Overlay>,
}

#[derive(Debug, Deserialize)]
struct RawProfile {
    name: String,

    pattern: String,

    #[serde(default)]
    priority: i32,

    #[serde(default)]
    default: bool,

    #[serde(default)]
    leader_description: Option<String>,

    #[serde(default)]
    button: Vec<RawButton>,

    #[serde(default)]
    wheel: Vec<RawWheel>,
}

impl Profile {
    /// Profile without an overlay
    pub fn new(name: impl Into<String>, window_pattern: impl Into<String>, priority: i32) -> Self {
        Self {
            name: name.into(),
            window_pattern: window_pattern.into(),
            priority,
            is_default: false,
            overlay: None,
        }
    }

    pub fn with_default(mut self, is_default: bool) -> Self {
        self.is_default = is_default;
        self
    }

    pub fn with_overlay(mut self, overlay: Overlay) -> Self {
        self.overlay = Some(overlay);
        self
    }

    /// Parse profile text
    pub fn from_toml_str(content: &str) -> Result<Self, ProfileError> {
        Self::parse(content, Path::new("<string>"))
    }

    /// Load one profile file
    pub fn load(path: &Path) -> Result<Self, ProfileError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    fn parse(content: &str, path: &Path) -> Result<Self, ProfileError> {
        let raw: RawProfile = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        let mut overlay = build_registry(&raw.button, &raw.wheel)?;
        if let Some(desc) = raw.leader_description {
            overlay.set_leader_description(desc);
        }

        let profile = Self::new(raw.name, raw.pattern, raw.priority).with_default(raw.default);
        if overlay == ButtonRegistry::default() {
            Ok(profile)
        } else {
            Ok(profile.with_overlay(overlay))
        }
    }
}

/// Validated, ordered collection of profiles
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileSet {
    profiles: Vec<Profile>,
}

impl ProfileSet {
    /// Validate profiles; load order is kept for tie-breaking
    pub fn new(profiles: Vec<Profile>) -> Result<Self, ProfileError> {
        let mut names: HashSet<&str> = HashSet::new();
        let mut patterns: HashMap<String, &str> = HashMap::new();
        let mut default: Option<&str> = None;

        for (position, profile) in profiles.iter().enumerate() {
            if profile.name.trim().is_empty() {
                return Err(ProfileError::EmptyName(position));
            }
            if profile.window_pattern.is_empty() {
                return Err(ProfileError::EmptyPattern(profile.name.clone()));
            }
            if !names.insert(&profile.name) {
                return Err(ProfileError::DuplicateName(profile.name.clone()));
            }
            let key = profile.window_pattern.to_lowercase();
            if let Some(first) = patterns.insert(key, &profile.name) {
                return Err(ProfileError::DuplicatePattern {
                    pattern: profile.window_pattern.clone(),
                    first: first.to_string(),
                    second: profile.name.clone(),
                });
            }
            if profile.is_default {
                if let Some(first) = default {
                    return Err(ProfileError::MultipleDefaults {
                        first: first.to_string(),
                        second: profile.name.clone(),
                    });
                }
                default = Some(&profile.name);
            }
        }

        Ok(Self { profiles })
    }

    /// Load every `*.toml` file in `dir`, sorted by file name.
    ///
    /// A missing directory yields an empty set.
    pub fn load_dir(dir: &Path) -> Result<Self, ProfileError> {
        if !dir.exists() {
            info!("No profile directory at {:?}", dir);
            return Ok(Self::default());
        }

        let entries = fs::read_dir(dir).map_err(|source| ProfileError::Dir {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut paths: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "toml"))
            .collect();
        paths.sort();

        let mut profiles = Vec::with_capacity(paths.len());
        for path in &paths {
            let profile = Profile::load(path)?;
            debug!("Loaded profile '{}' from {:?}", profile.name, path);
            profiles.push(profile);
        }

        let set = Self::new(profiles)?;
        info!("Loaded {} profile(s) from {:?}", set.len(), dir);
        Ok(set)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Profile> {
        self.profiles.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Profile> {
        self.profiles.iter()
    }

    /// Position of the profile called `name`
    pub fn position(&self, name: &str) -> Option<usize> {
        self.profiles.iter().position(|p| p.name == name)
    }

    /// Position of the default profile, if one is marked
    pub fn default_index(&self) -> Option<usize> {
        self.profiles.iter().position(|p| p.is_default)
    }
}
