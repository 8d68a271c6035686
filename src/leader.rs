//! Leader-key state machine
//!
//! A leader button arms a modifier that combines with the next eligible
//! button into a single key combination (`prefix+action`).
//!
//! Modes:
//! - `OneShot`: armed until the next combination, a timeout, or an ineligible press
//! - `Sticky`: stays armed while combinations keep arriving within the timeout
//! - `Toggle`: press once to turn on, again to turn off; no timeout

use crate::binding::{ActionKind, ButtonBinding};
use crate::keycode::WHEEL_TOGGLE_INDEX;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::debug;

/// How the leader behaves after arming
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaderMode {
    #[default]
    OneShot,
    Sticky,
    Toggle,
}

/// Result of running a button press through the leader
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaderOutcome {
    /// The press was the leader itself; nothing else should happen
    Swallowed,
    /// The press produced a combination to send as one key tap
    Combination(String),
    /// Not consumed; dispatch the binding normally
    PassThrough,
}

/// Leader state, created once from the base configuration
#[derive(Debug, Clone)]
pub struct LeaderState {
    mode: LeaderMode,
    prefix: String,
    timeout: Duration,
    armed: bool,
    toggled_on: bool,
    armed_at: Option<Instant>,
}

impl LeaderState {
    pub fn new(mode: LeaderMode, prefix: impl Into<String>, timeout: Duration) -> Self {
        Self {
            mode,
            prefix: prefix.into(),
            timeout,
            armed: false,
            toggled_on: false,
            armed_at: None,
        }
    }

    pub fn mode(&self) -> LeaderMode {
        self.mode
    }

    /// Whether the next eligible press would combine
    pub fn is_armed(&self) -> bool {
        match self.mode {
            LeaderMode::Toggle => self.toggled_on,
            _ => self.armed,
        }
    }

    /// Return to idle. Toggle state is kept unless `clear_toggle` is set.
    fn disarm(&mut self, clear_toggle: bool) {
        self.armed = false;
        self.armed_at = None;
        if clear_toggle {
            self.toggled_on = false;
        }
    }

    /// Clear everything, including the toggle
    pub fn reset(&mut self) {
        self.disarm(true);
    }

    fn arm(&mut self, now: Instant) {
        self.armed = true;
        self.armed_at = Some(now);
    }

    fn combine(&self, action: &str) -> String {
        if self.prefix.is_empty() {
            action.to_string()
        } else {
            format!("{}+{}", self.prefix, action)
        }
    }

    fn expired(&self, now: Instant) -> bool {
        match self.armed_at {
            Some(at) => now.saturating_duration_since(at) > self.timeout,
            None => true,
        }
    }

    /// Run a button press through the leader.
    ///
    /// `binding` is the effective binding for `index`, if any.
    pub fn on_button(
        &mut self,
        index: usize,
        binding: Option<&ButtonBinding>,
        now: Instant,
    ) -> LeaderOutcome {
        // Wheel toggle never combines and drops a pending leader
        if index == WHEEL_TOGGLE_INDEX {
            if self.mode != LeaderMode::Toggle && self.armed {
                debug!("Leader cleared by wheel button");
                self.disarm(false);
            }
            return LeaderOutcome::PassThrough;
        }

        let Some(binding) = binding else {
            return LeaderOutcome::PassThrough;
        };

        if binding.kind == ActionKind::Leader {
            self.press_leader(index, now);
            return LeaderOutcome::Swallowed;
        }

        if !self.is_armed() {
            return LeaderOutcome::PassThrough;
        }

        if !binding.is_leader_eligible(index) {
            debug!("Button {} not eligible for leader", index);
            if self.mode == LeaderMode::OneShot {
                self.disarm(false);
            }
            return LeaderOutcome::PassThrough;
        }

        if self.mode != LeaderMode::Toggle && self.expired(now) {
            debug!("Leader timed out after {:?}", self.timeout);
            self.reset();
            return LeaderOutcome::PassThrough;
        }

        let combination = self.combine(&binding.action);
        match self.mode {
            LeaderMode::OneShot => self.reset(),
            LeaderMode::Sticky => self.armed_at = Some(now),
            LeaderMode::Toggle => {}
        }
        debug!("Leader combination: {}", combination);
        LeaderOutcome::Combination(combination)
    }

    fn press_leader(&mut self, index: usize, now: Instant) {
        match self.mode {
            LeaderMode::Toggle => {
                self.toggled_on = !self.toggled_on;
                if self.toggled_on {
                    self.arm(now);
                    debug!("Leader toggle on (button {})", index);
                } else {
                    self.disarm(true);
                    debug!("Leader toggle off (button {})", index);
                }
            }
            LeaderMode::OneShot | LeaderMode::Sticky => {
                if self.armed {
                    self.disarm(false);
                    debug!("Leader cancelled");
                } else {
                    self.arm(now);
                    debug!("Leader armed by button {}", index);
                }
            }
        }
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use crate::binding::{LeaderEligibility, MouseButton};
    use proptest::prelude::*;

    fn binding_strategy() -> impl Strategy<Value = Option<ButtonBinding>> {
        prop_oneof![
            Just(None),
            "[a-z]{1,6}".prop_map(|k| Some(ButtonBinding::key(k))),
            "[a-z]{1,6}".prop_map(|c| Some(ButtonBinding::command(c))),
            (1u8..=5).prop_map(|n| MouseButton::new(n).map(ButtonBinding::mouse)),
            Just(Some(ButtonBinding::swap())),
            Just(Some(ButtonBinding::null())),
            Just(Some(
                ButtonBinding::key("x").with_leader_eligibility(LeaderEligibility::Eligible)
            )),
        ]
    }

    fn mode_strategy() -> impl Strategy<Value = LeaderMode> {
        prop_oneof![
            Just(LeaderMode::OneShot),
            Just(LeaderMode::Sticky),
            Just(LeaderMode::Toggle),
        ]
    }

    proptest! {
        #[test]
        fn leader_stays_idle_without_leader_binding(
            mode in mode_strategy(),
            presses in prop::collection::vec((0usize..20, binding_strategy(), 0u64..2000), 0..64),
        ) {
            let mut state = LeaderState::new(mode, "shift", Duration::from_millis(1000));
            let mut now = Instant::now();
            for (index, binding, gap) in presses {
                now += Duration::from_millis(gap);
                let outcome = state.on_button(index, binding.as_ref(), now);
                prop_assert_eq!(outcome, LeaderOutcome::PassThrough);
                prop_assert!(!state.is_armed());
            }
        }
    }
}
