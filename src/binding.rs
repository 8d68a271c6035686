//! Button and wheel bindings
//!
//! Function text from the configuration is classified once, at load time,
//! into an [`ActionKind`]. Dispatch never compares sentinel strings.

use crate::keycode::{WHEEL_TOGGLE_INDEX, button_name};
use serde::Deserialize;
use std::fmt;

/// Highest button index a configuration may reference
pub const MAX_BUTTON_INDEX: usize = 63;

/// Highest number of wheel slots a configuration may define
pub const MAX_WHEEL_SLOTS: usize = 32;

/// One of the five pointer buttons xdotool knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MouseButton(u8);

impl MouseButton {
    /// Create a mouse button, `None` outside 1..=5
    pub fn new(n: u8) -> Option<Self> {
        (1..=5).contains(&n).then_some(Self(n))
    }

    pub fn number(self) -> u8 {
        self.0
    }
}

/// What a button does when pressed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    /// Send a key (or key combination) by name
    KeyPress,
    /// Run a shell command
    RunCommand,
    /// Arm/disarm the leader modifier
    Leader,
    /// Cycle the wheel function
    Swap,
    /// Press a pointer button
    MouseButton(MouseButton),
    /// Explicit no-op that also releases anything held
    Null,
}

/// Configured type of a plain function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FunctionType {
    #[default]
    Key,
    Command,
}

/// Error for function text that looks like a sentinel but is not valid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidMouseButton(pub String);

impl fmt::Display for InvalidMouseButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid mouse button '{}' (expected mouse1..mouse5)", self.0)
    }
}

impl ActionKind {
    /// Classify configured function text.
    ///
    /// `leader`, `swap`, `NULL` and `mouse1`..`mouse5` are sentinels; anything
    /// else is a key name or command depending on `ty`.
    pub fn classify(function: &str, ty: FunctionType) -> Result<Self, InvalidMouseButton> {
        match function {
            "leader" => return Ok(ActionKind::Leader),
            "swap" => return Ok(ActionKind::Swap),
            "NULL" => return Ok(ActionKind::Null),
            _ => {}
        }

        if let Some(n) = function.strip_prefix("mouse") {
            if !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()) {
                return n
                    .parse::<u8>()
                    .ok()
                    .and_then(MouseButton::new)
                    .map(ActionKind::MouseButton)
                    .ok_or_else(|| InvalidMouseButton(function.to_string()));
            }
        }

        Ok(match ty {
            FunctionType::Key => ActionKind::KeyPress,
            FunctionType::Command => ActionKind::RunCommand,
        })
    }
}

/// Key press semantics for `KeyPress` bindings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PressMode {
    /// Key down, short delay, key up
    #[default]
    Momentary,
    /// Key down on press, key up when the device reports release
    Hold,
}

/// Whether the leader may combine with a button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LeaderEligibility {
    #[default]
    Unset,
    Eligible,
    Ineligible,
}

/// Binding for one logical button
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonBinding {
    pub kind: ActionKind,
    pub action: String,
    pub press_mode: PressMode,
    pub leader_eligible: LeaderEligibility,
}

impl ButtonBinding {
    pub fn new(kind: ActionKind, action: impl Into<String>) -> Self {
        Self {
            kind,
            action: action.into(),
            press_mode: PressMode::Momentary,
            leader_eligible: LeaderEligibility::Unset,
        }
    }

    /// Momentary key binding
    pub fn key(action: impl Into<String>) -> Self {
        Self::new(ActionKind::KeyPress, action)
    }

    /// Shell command binding
    pub fn command(action: impl Into<String>) -> Self {
        Self::new(ActionKind::RunCommand, action)
    }

    pub fn leader() -> Self {
        Self::new(ActionKind::Leader, "leader")
    }

    pub fn swap() -> Self {
        Self::new(ActionKind::Swap, "swap")
    }

    pub fn null() -> Self {
        Self::new(ActionKind::Null, "NULL")
    }

    pub fn mouse(button: MouseButton) -> Self {
        Self::new(ActionKind::MouseButton(button), format!("mouse{}", button.number()))
    }

    pub fn with_press_mode(mut self, press_mode: PressMode) -> Self {
        self.press_mode = press_mode;
        self
    }

    pub fn with_leader_eligibility(mut self, eligibility: LeaderEligibility) -> Self {
        self.leader_eligible = eligibility;
        self
    }

    /// Resolve eligibility for the binding at `index`.
    ///
    /// Unset resolves to eligible on every button except the wheel toggle,
    /// whatever the binding does.
    pub fn is_leader_eligible(&self, index: usize) -> bool {
        match self.leader_eligible {
            LeaderEligibility::Eligible => true,
            LeaderEligibility::Ineligible => false,
            LeaderEligibility::Unset => index != WHEEL_TOGGLE_INDEX,
        }
    }
}

/// Functions bound to one wheel slot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WheelBinding {
    pub clockwise: Option<String>,
    pub counterclockwise: Option<String>,
    pub description: Option<String>,
}

impl WheelBinding {
    pub fn new(clockwise: impl Into<String>, counterclockwise: impl Into<String>) -> Self {
        Self {
            clockwise: Some(clockwise.into()),
            counterclockwise: Some(counterclockwise.into()),
            description: None,
        }
    }
}

/// Wheel rotation direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    Clockwise,
    CounterClockwise,
}

/// Button and wheel tables of a configuration.
///
/// Indexed containers sized to the highest index referenced. An empty button
/// slot means "no binding", which is different from a `Null` binding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ButtonRegistry {
    buttons: Vec<Option<ButtonBinding>>,
    wheels: Vec<WheelBinding>,
    descriptions: Vec<Option<String>>,
    leader_description: Option<String>,
}

impl ButtonRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binding at `index`, if any
    pub fn button(&self, index: usize) -> Option<&ButtonBinding> {
        self.buttons.get(index).and_then(Option::as_ref)
    }

    /// Set the binding at `index`, growing the table when needed
    pub fn set_button(&mut self, index: usize, binding: ButtonBinding) {
        if index >= self.buttons.len() {
            self.buttons.resize(index + 1, None);
        }
        self.buttons[index] = Some(binding);
    }

    /// Number of button slots (bound or not)
    pub fn button_slots(&self) -> usize {
        self.buttons.len()
    }

    /// Iterate over bound buttons
    pub fn buttons(&self) -> impl Iterator<Item = (usize, &ButtonBinding)> {
        self.buttons
            .iter()
            .enumerate()
            .filter_map(|(i, b)| b.as_ref().map(|b| (i, b)))
    }

    pub fn wheel(&self, slot: usize) -> Option<&WheelBinding> {
        self.wheels.get(slot)
    }

    /// Set the wheel binding at `slot`, growing the table with empty slots
    pub fn set_wheel(&mut self, slot: usize, binding: WheelBinding) {
        if slot >= self.wheels.len() {
            self.wheels.resize(slot + 1, WheelBinding::default());
        }
        self.wheels[slot] = binding;
    }

    pub fn wheel_count(&self) -> usize {
        self.wheels.len()
    }

    pub fn wheels(&self) -> &[WheelBinding] {
        &self.wheels
    }

    /// Action bound to a rotation on `slot`. Out-of-range slots yield `None`.
    pub fn wheel_action(&self, slot: usize, rotation: Rotation) -> Option<&str> {
        let wheel = self.wheels.get(slot)?;
        match rotation {
            Rotation::Clockwise => wheel.clockwise.as_deref(),
            Rotation::CounterClockwise => wheel.counterclockwise.as_deref(),
        }
    }

    /// Set the description of a wheel slot, growing the table when needed
    pub fn set_wheel_description(&mut self, slot: usize, description: impl Into<String>) {
        if slot >= self.wheels.len() {
            self.wheels.resize(slot + 1, WheelBinding::default());
        }
        self.wheels[slot].description = Some(description.into());
    }

    pub fn description(&self, index: usize) -> Option<&str> {
        self.descriptions.get(index).and_then(|d| d.as_deref())
    }

    pub fn set_description(&mut self, index: usize, description: impl Into<String>) {
        if index >= self.descriptions.len() {
            self.descriptions.resize(index + 1, None);
        }
        self.descriptions[index] = Some(description.into());
    }

    pub fn leader_description(&self) -> Option<&str> {
        self.leader_description.as_deref()
    }

    pub fn set_leader_description(&mut self, description: impl Into<String>) {
        self.leader_description = Some(description.into());
    }

    /// Apply the entries set in `overlay` on top of this registry.
    ///
    /// Only what the overlay defines is replaced; wheel slots are merged per
    /// direction so a description-only entry keeps the base functions.
    pub fn apply_overlay(&mut self, overlay: &ButtonRegistry) {
        for (index, binding) in overlay.buttons() {
            self.set_button(index, binding.clone());
        }
        for (index, desc) in overlay.descriptions.iter().enumerate() {
            if let Some(desc) = desc {
                self.set_description(index, desc.clone());
            }
        }
        for (slot, wheel) in overlay.wheels.iter().enumerate() {
            if *wheel == WheelBinding::default() {
                continue;
            }
            if slot >= self.wheels.len() {
                self.wheels.resize(slot + 1, WheelBinding::default());
            }
            let target = &mut self.wheels[slot];
            if wheel.clockwise.is_some() {
                target.clockwise = wheel.clockwise.clone();
            }
            if wheel.counterclockwise.is_some() {
                target.counterclockwise = wheel.counterclockwise.clone();
            }
            if wheel.description.is_some() {
                target.description = wheel.description.clone();
            }
        }
        if let Some(desc) = &overlay.leader_description {
            self.leader_description = Some(desc.clone());
        }
    }

    /// Label for a button: its description, else its binding, else its name
    pub fn label(&self, index: usize) -> String {
        if let Some(desc) = self.description(index) {
            return desc.to_string();
        }
        match self.button(index) {
            Some(b) if b.kind == ActionKind::Leader => self
                .leader_description
                .clone()
                .unwrap_or_else(|| b.action.clone()),
            Some(b) => b.action.clone(),
            None => button_name(index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_sentinels() {
        assert_eq!(
            ActionKind::classify("leader", FunctionType::Key),
            Ok(ActionKind::Leader)
        );
        assert_eq!(ActionKind::classify("swap", FunctionType::Key), Ok(ActionKind::Swap));
        assert_eq!(ActionKind::classify("NULL", FunctionType::Command), Ok(ActionKind::Null));
        assert_eq!(
            ActionKind::classify("mouse3", FunctionType::Key),
            Ok(ActionKind::MouseButton(MouseButton::new(3).unwrap()))
        );
    }

    #[test]
    fn test_classify_plain_functions() {
        assert_eq!(
            ActionKind::classify("ctrl+z", FunctionType::Key),
            Ok(ActionKind::KeyPress)
        );
        assert_eq!(
            ActionKind::classify("krita --canvasonly", FunctionType::Command),
            Ok(ActionKind::RunCommand)
        );
        // Not a sentinel, just a key name that happens to start with "mouse"
        assert_eq!(
            ActionKind::classify("mousekeys", FunctionType::Key),
            Ok(ActionKind::KeyPress)
        );
    }

    #[test]
    fn test_classify_bad_mouse_button() {
        assert!(ActionKind::classify("mouse6", FunctionType::Key).is_err());
        assert!(ActionKind::classify("mouse0", FunctionType::Key).is_err());
    }

    #[test]
    fn test_leader_eligibility_resolution() {
        let key = ButtonBinding::key("b");
        assert!(key.is_leader_eligible(0));
        assert!(!key.is_leader_eligible(WHEEL_TOGGLE_INDEX));

        let forced = ButtonBinding::key("b").with_leader_eligibility(LeaderEligibility::Eligible);
        assert!(forced.is_leader_eligible(WHEEL_TOGGLE_INDEX));

        let off = ButtonBinding::key("b").with_leader_eligibility(LeaderEligibility::Ineligible);
        assert!(!off.is_leader_eligible(0));

        // Unset does not depend on what the button does
        assert!(ButtonBinding::command("krita").is_leader_eligible(5));
        assert!(ButtonBinding::mouse(MouseButton::new(2).unwrap()).is_leader_eligible(6));
        assert!(!ButtonBinding::command("krita").is_leader_eligible(WHEEL_TOGGLE_INDEX));
        let off = ButtonBinding::command("krita").with_leader_eligibility(LeaderEligibility::Ineligible);
        assert!(!off.is_leader_eligible(5));
    }

    #[test]
    fn test_registry_grows_and_keeps_absent_slots() {
        let mut reg = ButtonRegistry::new();
        reg.set_button(5, ButtonBinding::key("a"));
        assert_eq!(reg.button_slots(), 6);
        assert!(reg.button(2).is_none());
        assert_eq!(reg.button(5).map(|b| b.action.as_str()), Some("a"));
        assert!(reg.button(40).is_none());
    }

    #[test]
    fn test_wheel_action_bounds() {
        let mut reg = ButtonRegistry::new();
        reg.set_wheel(0, WheelBinding::new("plus", "minus"));
        assert_eq!(reg.wheel_action(0, Rotation::Clockwise), Some("plus"));
        assert_eq!(reg.wheel_action(0, Rotation::CounterClockwise), Some("minus"));
        assert_eq!(reg.wheel_action(4, Rotation::Clockwise), None);

        reg.set_wheel_description(2, "Zoom");
        assert_eq!(reg.wheel_count(), 3);
        assert_eq!(reg.wheel_action(1, Rotation::Clockwise), None);
    }

    #[test]
    fn test_apply_overlay() {
        let mut base = ButtonRegistry::new();
        base.set_button(0, ButtonBinding::key("b"));
        base.set_button(1, ButtonBinding::key("e"));
        base.set_wheel(0, WheelBinding::new("plus", "minus"));

        let mut overlay = ButtonRegistry::new();
        overlay.set_button(1, ButtonBinding::command("gimp"));
        overlay.set_button(20, ButtonBinding::key("z"));
        overlay.set_wheel_description(0, "Zoom");
        overlay.set_wheel(2, WheelBinding::new("up", "down"));
        overlay.set_leader_description("Ctrl");

        base.apply_overlay(&overlay);

        assert_eq!(base.button(0).map(|b| b.action.as_str()), Some("b"));
        assert_eq!(base.button(1).map(|b| b.kind), Some(ActionKind::RunCommand));
        assert_eq!(base.button(20).map(|b| b.action.as_str()), Some("z"));
        assert_eq!(base.wheel_action(0, Rotation::Clockwise), Some("plus"));
        assert_eq!(base.wheel(0).and_then(|w| w.description.as_deref()), Some("Zoom"));
        assert_eq!(base.wheel_count(), 3);
        assert_eq!(base.wheel_action(1, Rotation::Clockwise), None);
        assert_eq!(base.wheel_action(2, Rotation::CounterClockwise), Some("down"));
        assert_eq!(base.leader_description(), Some("Ctrl"));
    }

    #[test]
    fn test_label_fallbacks() {
        let mut reg = ButtonRegistry::new();
        reg.set_button(0, ButtonBinding::key("b"));
        reg.set_button(16, ButtonBinding::leader());
        reg.set_leader_description("Shift");
        reg.set_description(1, "Eraser");

        assert_eq!(reg.label(0), "b");
        assert_eq!(reg.label(1), "Eraser");
        assert_eq!(reg.label(16), "Shift");
        assert_eq!(reg.label(18), "WHEEL");
    }
}
