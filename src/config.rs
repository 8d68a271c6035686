//! Configuration loading
//!
//! The daemon reads one TOML file (by default
//! `~/.config/keydial/config.toml`) holding device, leader, wheel, OSD and
//! profile settings plus the base button and wheel tables. Settings only
//! live in the base file; profile files can carry bindings and descriptions.

use crate::binding::{
    ActionKind, ButtonBinding, ButtonRegistry, FunctionType, LeaderEligibility,
    MAX_BUTTON_INDEX, MAX_WHEEL_SLOTS, PressMode, WheelBinding,
};
use crate::leader::LeaderMode;
use crate::wheel::{
    DEFAULT_CLICK_TIMEOUT_MS, MAX_CLICK_TIMEOUT_MS, MIN_CLICK_TIMEOUT_MS, WheelMode,
};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Default config directory name under the XDG config dir
pub const CONFIG_DIR_NAME: &str = "keydial";

/// Default config file name
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Huion KD100
pub const DEFAULT_VENDOR_ID: u16 = 0x256c;
pub const DEFAULT_PRODUCT_ID: u16 = 0x006d;

/// Errors raised while loading configuration or profile files
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not find config directory")]
    NoConfigDir,

    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("button index {0} is out of range (max {max})", max = MAX_BUTTON_INDEX)]
    ButtonIndex(usize),

    #[error("button {0} is defined more than once")]
    DuplicateButton(usize),

    #[error("wheel slot {0} is out of range (max {max})", max = MAX_WHEEL_SLOTS - 1)]
    WheelSlot(usize),

    #[error("wheel slot {0} is defined more than once")]
    DuplicateWheel(usize),

    #[error("button {index}: {reason}")]
    InvalidFunction { index: usize, reason: String },
}

/// USB identification and kernel driver handling
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeviceSettings {
    #[serde(default = "default_vendor_id")]
    pub vendor_id: u16,

    #[serde(default = "default_product_id")]
    pub product_id: u16,

    /// Leave the hid_uclogic driver alone (no warning when it is loaded)
    #[serde(default)]
    pub enable_uclogic: bool,
}

fn default_vendor_id() -> u16 {
    DEFAULT_VENDOR_ID
}

fn default_product_id() -> u16 {
    DEFAULT_PRODUCT_ID
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            vendor_id: DEFAULT_VENDOR_ID,
            product_id: DEFAULT_PRODUCT_ID,
            enable_uclogic: false,
        }
    }
}

/// Leader key settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LeaderSettings {
    /// Button bound as the leader key
    #[serde(default)]
    pub button: Option<usize>,

    /// Modifier prepended to the combined key, e.g. `shift`
    #[serde(default)]
    pub prefix: String,

    #[serde(default = "default_leader_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default)]
    pub mode: LeaderMode,

    #[serde(default)]
    pub description: Option<String>,
}

fn default_leader_timeout_ms() -> u64 {
    1000
}

impl Default for LeaderSettings {
    fn default() -> Self {
        Self {
            button: None,
            prefix: String::new(),
            timeout_ms: default_leader_timeout_ms(),
            mode: LeaderMode::OneShot,
            description: None,
        }
    }
}

impl LeaderSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Wheel slot selection settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WheelModeSettings {
    #[serde(default)]
    pub mode: WheelMode,

    #[serde(default = "default_click_timeout_ms")]
    pub click_timeout_ms: u64,
}

fn default_click_timeout_ms() -> u64 {
    DEFAULT_CLICK_TIMEOUT_MS
}

impl Default for WheelModeSettings {
    fn default() -> Self {
        Self {
            mode: WheelMode::Sequential,
            click_timeout_ms: DEFAULT_CLICK_TIMEOUT_MS,
        }
    }
}

impl WheelModeSettings {
    pub fn click_timeout(&self) -> Duration {
        Duration::from_millis(self.click_timeout_ms)
    }
}

/// On-screen display settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OsdSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Button that shows or hides the OSD
    #[serde(default)]
    pub toggle_button: Option<usize>,

    /// How many recent actions the OSD keeps
    #[serde(default = "default_recent_actions")]
    pub recent_actions: usize,
}

fn default_true() -> bool {
    true
}

fn default_recent_actions() -> usize {
    10
}

impl Default for OsdSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            toggle_button: None,
            recent_actions: default_recent_actions(),
        }
    }
}

/// Per-application profile settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProfileSettings {
    #[serde(default = "default_true")]
    pub auto_switch: bool,

    #[serde(default = "default_check_interval_ms")]
    pub check_interval_ms: u64,

    /// Directory with profile files, relative to the config file
    #[serde(default = "default_profile_dir")]
    pub directory: PathBuf,
}

fn default_check_interval_ms() -> u64 {
    500
}

fn default_profile_dir() -> PathBuf {
    PathBuf::from("profiles.d")
}

impl Default for ProfileSettings {
    fn default() -> Self {
        Self {
            auto_switch: true,
            check_interval_ms: default_check_interval_ms(),
            directory: default_profile_dir(),
        }
    }
}

impl ProfileSettings {
    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }
}

/// One `[[button]]` entry as written in a file
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct RawButton {
    pub index: usize,

    #[serde(default)]
    pub function: Option<String>,

    #[serde(rename = "type", default)]
    pub function_type: FunctionType,

    #[serde(default)]
    pub hold: bool,

    #[serde(default)]
    pub leader_eligible: Option<bool>,

    #[serde(default)]
    pub description: Option<String>,
}

/// One `[[wheel]]` entry as written in a file
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct RawWheel {
    #[serde(default)]
    pub slot: Option<usize>,

    #[serde(default)]
    pub clockwise: Option<String>,

    #[serde(default)]
    pub counterclockwise: Option<String>,

    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    device: DeviceSettings,

    #[serde(default)]
    leader: LeaderSettings,

    #[serde(default)]
    wheel_mode: WheelModeSettings,

    #[serde(default)]
    osd: OsdSettings,

    #[serde(default)]
    profiles: ProfileSettings,

    #[serde(default)]
    button: Vec<RawButton>,

    #[serde(default)]
    wheel: Vec<RawWheel>,
}

/// Build a registry from file entries.
///
/// Entries without a function only set a description.
pub(crate) fn build_registry(
    buttons: &[RawButton],
    wheels: &[RawWheel],
) -> Result<ButtonRegistry, ConfigError> {
    let mut registry = ButtonRegistry::new();

    let mut seen = HashSet::new();
    for raw in buttons {
        if raw.index > MAX_BUTTON_INDEX {
            return Err(ConfigError::ButtonIndex(raw.index));
        }
        if !seen.insert(raw.index) {
            return Err(ConfigError::DuplicateButton(raw.index));
        }

        if let Some(function) = &raw.function {
            let kind = ActionKind::classify(function, raw.function_type).map_err(|e| {
                ConfigError::InvalidFunction {
                    index: raw.index,
                    reason: e.to_string(),
                }
            })?;
            let press_mode = if raw.hold {
                PressMode::Hold
            } else {
                PressMode::Momentary
            };
            let eligibility = match raw.leader_eligible {
                Some(true) => LeaderEligibility::Eligible,
                Some(false) => LeaderEligibility::Ineligible,
                None => LeaderEligibility::Unset,
            };
            registry.set_button(
                raw.index,
                ButtonBinding::new(kind, function.clone())
                    .with_press_mode(press_mode)
                    .with_leader_eligibility(eligibility),
            );
        }
        if let Some(desc) = &raw.description {
            registry.set_description(raw.index, desc.clone());
        }
    }

    let mut seen = HashSet::new();
    for (position, raw) in wheels.iter().enumerate() {
        let slot = raw.slot.unwrap_or(position);
        if slot >= MAX_WHEEL_SLOTS {
            return Err(ConfigError::WheelSlot(slot));
        }
        if !seen.insert(slot) {
            return Err(ConfigError::DuplicateWheel(slot));
        }
        registry.set_wheel(
            slot,
            WheelBinding {
                clockwise: raw.clockwise.clone(),
                counterclockwise: raw.counterclockwise.clone(),
                description: raw.description.clone(),
            },
        );
    }

    Ok(registry)
}

/// Base configuration, immutable once loaded
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Configuration {
    pub registry: ButtonRegistry,
    pub device: DeviceSettings,
    pub leader: LeaderSettings,
    pub wheel_mode: WheelModeSettings,
    pub osd: OsdSettings,
    pub profiles: ProfileSettings,
    /// File the configuration came from, used to resolve relative paths
    pub source: Option<PathBuf>,
}

impl Configuration {
    /// Default config file path
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        Ok(dirs::config_dir()
            .ok_or(ConfigError::NoConfigDir)?
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME))
    }

    /// Find the config file to load.
    ///
    /// A relative path that does not exist is retried under the config
    /// directory.
    pub fn locate(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
        let Some(path) = path else {
            return Self::default_path();
        };
        if path.exists() || path.is_absolute() {
            return Ok(path.to_path_buf());
        }
        let fallback = dirs::config_dir()
            .ok_or(ConfigError::NoConfigDir)?
            .join(CONFIG_DIR_NAME)
            .join(path);
        if fallback.exists() {
            debug!("Using {:?} from config directory", fallback);
            Ok(fallback)
        } else {
            Ok(path.to_path_buf())
        }
    }

    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::parse(&content).map_err(|e| match e {
            ParseFailure::Toml(source) => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            ParseFailure::Invalid(e) => e,
        })?;
        config.source = Some(path.to_path_buf());

        info!(
            "Loaded config from {:?} ({} buttons, {} wheel slots)",
            path,
            config.registry.buttons().count(),
            config.registry.wheel_count()
        );
        Ok(config)
    }

    /// Parse config text that did not come from a file
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Self::parse(content).map_err(|e| match e {
            ParseFailure::Toml(source) => ConfigError::Parse {
                path: PathBuf::from("<string>"),
                source,
            },
            ParseFailure::Invalid(e) => e,
        })
    }

    fn parse(content: &str) -> Result<Self, ParseFailure> {
        let raw: RawConfig = toml::from_str(content).map_err(ParseFailure::Toml)?;
        let mut registry =
            build_registry(&raw.button, &raw.wheel).map_err(ParseFailure::Invalid)?;

        let mut leader = raw.leader;
        if let Some(index) = leader.button {
            if index > MAX_BUTTON_INDEX {
                return Err(ParseFailure::Invalid(ConfigError::ButtonIndex(index)));
            }
            if registry.button(index).is_some() {
                warn!("Leader button {} replaces its [[button]] binding", index);
            }
            registry.set_button(index, ButtonBinding::leader());
        }
        if let Some(desc) = leader.description.take() {
            registry.set_leader_description(desc);
        }

        let mut wheel_mode = raw.wheel_mode;
        let clamped = wheel_mode
            .click_timeout_ms
            .clamp(MIN_CLICK_TIMEOUT_MS, MAX_CLICK_TIMEOUT_MS);
        if clamped != wheel_mode.click_timeout_ms {
            warn!(
                "click_timeout_ms {} out of range, using {}",
                wheel_mode.click_timeout_ms, clamped
            );
            wheel_mode.click_timeout_ms = clamped;
        }

        if let Some(index) = raw.osd.toggle_button {
            if index > MAX_BUTTON_INDEX {
                return Err(ParseFailure::Invalid(ConfigError::ButtonIndex(index)));
            }
        }

        Ok(Self {
            registry,
            device: raw.device,
            leader,
            wheel_mode,
            osd: raw.osd,
            profiles: raw.profiles,
            source: None,
        })
    }

    /// Directory holding profile files, resolved against the config file
    pub fn profile_dir(&self) -> PathBuf {
        let dir = &self.profiles.directory;
        if dir.is_absolute() {
            return dir.clone();
        }
        match self.source.as_deref().and_then(Path::parent) {
            Some(parent) => parent.join(dir),
            None => dir.clone(),
        }
    }
}

enum ParseFailure {
    Toml(toml::de::Error),
    Invalid(ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::Rotation;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Configuration::from_toml_str("").unwrap();
        assert_eq!(config.device.vendor_id, 0x256c);
        assert_eq!(config.device.product_id, 0x006d);
        assert_eq!(config.leader.timeout_ms, 1000);
        assert_eq!(config.leader.mode, LeaderMode::OneShot);
        assert_eq!(config.wheel_mode.mode, WheelMode::Sequential);
        assert_eq!(config.wheel_mode.click_timeout_ms, 300);
        assert_eq!(config.profiles.check_interval_ms, 500);
        assert_eq!(config.osd.recent_actions, 10);
        assert_eq!(config.registry.button_slots(), 0);
    }

    #[test]
    fn test_full_config() {
        let toml = r#"
[device]
vendor_id = 0x256c
product_id = 0x006d

[leader]
button = 16
prefix = "shift"
mode = "sticky"
description = "Shift"

[wheel_mode]
mode = "sets"
click_timeout_ms = 250

[[button]]
index = 0
function = "b"
description = "Brush"

[[button]]
index = 1
function = "krita"
type = "command"

[[button]]
index = 2
function = "ctrl"
hold = true
leader_eligible = false

[[button]]
index = 3
function = "mouse2"

[[wheel]]
clockwise = "bracketright"
counterclockwise = "bracketleft"

[[wheel]]
clockwise = "plus"
counterclockwise = "minus"
description = "Zoom"
"#;
        let config = Configuration::from_toml_str(toml).unwrap();
        let reg = &config.registry;

        assert_eq!(config.leader.mode, LeaderMode::Sticky);
        assert_eq!(config.wheel_mode.mode, WheelMode::Sets);
        assert_eq!(config.wheel_mode.click_timeout_ms, 250);

        assert_eq!(reg.button(16).map(|b| b.kind), Some(ActionKind::Leader));
        assert_eq!(reg.leader_description(), Some("Shift"));
        assert_eq!(reg.button(1).map(|b| b.kind), Some(ActionKind::RunCommand));
        let ctrl = reg.button(2).unwrap();
        assert_eq!(ctrl.press_mode, PressMode::Hold);
        assert_eq!(ctrl.leader_eligible, LeaderEligibility::Ineligible);
        assert!(matches!(reg.button(3).map(|b| b.kind), Some(ActionKind::MouseButton(_))));
        assert_eq!(reg.description(0), Some("Brush"));

        assert_eq!(reg.wheel_count(), 2);
        assert_eq!(reg.wheel_action(1, Rotation::Clockwise), Some("plus"));
    }

    #[test]
    fn test_click_timeout_is_clamped() {
        let low = Configuration::from_toml_str("[wheel_mode]\nclick_timeout_ms = 10").unwrap();
        assert_eq!(low.wheel_mode.click_timeout_ms, 100);
        let high = Configuration::from_toml_str("[wheel_mode]\nclick_timeout_ms = 5000").unwrap();
        assert_eq!(high.wheel_mode.click_timeout_ms, 1000);
    }

    #[test]
    fn test_rejects_bad_entries() {
        let dup = "[[button]]\nindex = 1\nfunction = \"a\"\n[[button]]\nindex = 1\nfunction = \"b\"";
        assert!(matches!(
            Configuration::from_toml_str(dup),
            Err(ConfigError::DuplicateButton(1))
        ));

        let big = "[[button]]\nindex = 64\nfunction = \"a\"";
        assert!(matches!(
            Configuration::from_toml_str(big),
            Err(ConfigError::ButtonIndex(64))
        ));

        let mouse = "[[button]]\nindex = 0\nfunction = \"mouse9\"";
        assert!(matches!(
            Configuration::from_toml_str(mouse),
            Err(ConfigError::InvalidFunction { index: 0, .. })
        ));

        let wheel = "[[wheel]]\nclockwise = \"a\"\n[[wheel]]\nslot = 0\nclockwise = \"b\"";
        assert!(matches!(
            Configuration::from_toml_str(wheel),
            Err(ConfigError::DuplicateWheel(0))
        ));

        assert!(matches!(
            Configuration::from_toml_str("[leader]\nmode = \"sometimes\""),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_profile_dir_relative_to_source() {
        let mut config = Configuration::default();
        config.source = Some(PathBuf::from("/etc/keydial/config.toml"));
        assert_eq!(config.profile_dir(), PathBuf::from("/etc/keydial/profiles.d"));

        config.profiles.directory = PathBuf::from("/srv/profiles");
        assert_eq!(config.profile_dir(), PathBuf::from("/srv/profiles"));
    }
}
