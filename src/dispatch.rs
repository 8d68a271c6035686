//! Event dispatch
//!
//! Turns decoded events into actions using the current effective
//! configuration. Owns the leader and wheel state machines and the
//! held key or mouse button, so everything here runs on the poll loop
//! without locks.

use crate::binding::{ActionKind, ButtonBinding, PressMode, Rotation};
use crate::keycode::LogicalEvent;
use crate::leader::{LeaderOutcome, LeaderState};
use crate::osd::OsdNotifier;
use crate::resolver::{EffectiveConfiguration, ProfileSwitch};
use crate::sink::{Action, ActionSink};
use crate::wheel::WheelModeState;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

/// Pause between key-down and key-up of a momentary press
pub const DEFAULT_TAP_DELAY: Duration = Duration::from_millis(10);

/// OSD text for a press that produced no action
const RAW_PRESS: &str = "press";

/// Something pressed and not yet released
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Held {
    Key(String),
    Mouse(u8),
}

impl Held {
    fn release_action(&self) -> Action {
        match self {
            Held::Key(key) => Action::KeyUp(key.clone()),
            Held::Mouse(n) => Action::MouseUp(*n),
        }
    }
}

/// Per-event orchestration of leader, wheel and bindings
pub struct Dispatcher<S: ActionSink, O: OsdNotifier> {
    effective: Arc<EffectiveConfiguration>,
    leader: LeaderState,
    wheel: WheelModeState,
    held: Option<Held>,
    sink: S,
    osd: O,
    tap_delay: Duration,
}

impl<S: ActionSink, O: OsdNotifier> Dispatcher<S, O> {
    /// Leader and wheel settings come from `effective`, which profiles
    /// cannot change, so the state machines live as long as the dispatcher.
    pub fn new(effective: Arc<EffectiveConfiguration>, sink: S, osd: O) -> Self {
        let config = &effective.config;
        let leader = LeaderState::new(
            config.leader.mode,
            config.leader.prefix.clone(),
            config.leader.timeout(),
        );
        let wheel = WheelModeState::new(config.wheel_mode.mode, config.wheel_mode.click_timeout());
        Self {
            effective,
            leader,
            wheel,
            held: None,
            sink,
            osd,
            tap_delay: DEFAULT_TAP_DELAY,
        }
    }

    pub fn with_tap_delay(mut self, tap_delay: Duration) -> Self {
        self.tap_delay = tap_delay;
        self
    }

    pub fn effective(&self) -> &Arc<EffectiveConfiguration> {
        &self.effective
    }

    pub fn leader(&self) -> &LeaderState {
        &self.leader
    }

    pub fn wheel(&self) -> &WheelModeState {
        &self.wheel
    }

    pub fn held(&self) -> Option<&Held> {
        self.held.as_ref()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn osd(&self) -> &O {
        &self.osd
    }

    pub fn osd_mut(&mut self) -> &mut O {
        &mut self.osd
    }

    fn wheel_slots(&self) -> usize {
        self.effective.config.registry.wheel_count()
    }

    /// Swap in a new effective configuration and tell the OSD
    pub fn apply_profile(&mut self, switch: ProfileSwitch) {
        self.effective = switch.effective;
        self.osd.record_profile_switch(&switch.name);
    }

    /// Time-driven work with no input: commits an expired swap sequence
    pub fn tick(&mut self, now: Instant) {
        let slots = self.wheel_slots();
        if let Some(change) = self.wheel.tick(now, slots) {
            self.osd.set_wheel_state(&change);
        }
    }

    /// Release whatever is held
    pub fn release_held(&mut self) {
        if let Some(held) = self.held.take() {
            debug!("Releasing {:?}", held);
            self.sink.execute(&held.release_action());
        }
    }

    /// Handle one decoded event
    pub fn handle_event(&mut self, event: LogicalEvent, now: Instant) {
        self.tick(now);

        match event {
            LogicalEvent::Idle => self.release_held(),
            LogicalEvent::WheelCw => self.rotate(Rotation::Clockwise),
            LogicalEvent::WheelCcw => self.rotate(Rotation::CounterClockwise),
            LogicalEvent::Button(index) => self.press(index, now),
        }
    }

    fn rotate(&mut self, rotation: Rotation) {
        let registry = &self.effective.config.registry;
        let Some(slot) = self.wheel.resolve(registry.wheel_count()) else {
            debug!("Wheel slot {} not defined", self.wheel.current_slot());
            return;
        };
        if let Some(action) = registry.wheel_action(slot, rotation) {
            let action = Action::KeyTap(action.to_string());
            self.sink.execute(&action);
        }
    }

    fn press(&mut self, index: usize, now: Instant) {
        let osd_settings = &self.effective.config.osd;
        if osd_settings.enabled && osd_settings.toggle_button == Some(index) {
            self.osd.toggle_visibility();
        }

        let effective = Arc::clone(&self.effective);
        let registry = &effective.config.registry;
        let binding = registry.button(index);

        match self.leader.on_button(index, binding, now) {
            LeaderOutcome::Swallowed => {
                self.osd.record_action(index, &registry.label(index));
                return;
            }
            LeaderOutcome::Combination(combination) => {
                self.sink.execute(&Action::KeyTap(combination.clone()));
                self.osd.record_action(index, &combination);
                return;
            }
            LeaderOutcome::PassThrough => {}
        }

        let Some(binding) = binding else {
            debug!("Button {} has no binding", index);
            self.osd.record_action(index, RAW_PRESS);
            return;
        };

        if self.run_binding(binding, now) {
            self.osd.record_action(index, &registry.label(index));
        } else {
            self.osd.record_action(index, RAW_PRESS);
        }
    }

    /// Perform a binding; false when nothing was sent
    fn run_binding(&mut self, binding: &ButtonBinding, now: Instant) -> bool {
        match binding.kind {
            ActionKind::Null => {
                self.release_held();
                false
            }
            ActionKind::Leader => false,
            ActionKind::Swap => {
                let slots = self.wheel_slots();
                if let Some(change) = self.wheel.press(now, slots) {
                    self.osd.set_wheel_state(&change);
                }
                true
            }
            ActionKind::MouseButton(button) => {
                self.hold(Held::Mouse(button.number()));
                self.sink.execute(&Action::MouseDown(button.number()));
                true
            }
            ActionKind::KeyPress if binding.action.trim().is_empty() => false,
            ActionKind::KeyPress => {
                match binding.press_mode {
                    PressMode::Momentary => {
                        self.sink.execute(&Action::KeyDown(binding.action.clone()));
                        // Blocks the poll loop for `tap_delay`
                        if !self.tap_delay.is_zero() {
                            thread::sleep(self.tap_delay);
                        }
                        self.sink.execute(&Action::KeyUp(binding.action.clone()));
                    }
                    PressMode::Hold => {
                        self.hold(Held::Key(binding.action.clone()));
                        self.sink.execute(&Action::KeyDown(binding.action.clone()));
                    }
                }
                true
            }
            ActionKind::RunCommand if binding.action.trim().is_empty() => false,
            ActionKind::RunCommand => {
                self.sink.execute(&Action::Run(binding.action.clone()));
                true
            }
        }
    }

    /// Track `next` as held, releasing a different held action first
    fn hold(&mut self, next: Held) {
        if self.held.as_ref().is_some_and(|held| *held != next) {
            self.release_held();
        }
        self.held = Some(next);
    }
}
