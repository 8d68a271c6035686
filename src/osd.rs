//! On-screen display state
//!
//! The dispatcher reports what happened (actions, profile switches, wheel
//! changes) through an [`OsdNotifier`]. `ChannelOsd` forwards owned events to
//! a consumer thread that keeps the display model: the last few actions, the
//! active profile, the wheel selection and whether the display is shown.
//! Drawing is left to whatever reads the model.

use crate::keycode::button_name;
use crate::wheel::{WheelChange, WheelMode};
use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use tracing::{debug, error, info};

/// Events sent to the OSD thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OsdEvent {
    /// Button `index` did `description`
    Action { index: usize, description: String },
    /// A profile became active
    ProfileSwitch(String),
    /// The wheel selection changed
    WheelState(WheelChange),
    /// Show or hide the display
    ToggleVisibility,
    /// Stop the OSD thread
    Shutdown,
}

/// Receives display notifications from the dispatcher
pub trait OsdNotifier: Send {
    fn record_action(&mut self, index: usize, description: &str);

    fn record_profile_switch(&mut self, name: &str);

    fn set_wheel_state(&mut self, change: &WheelChange);

    fn toggle_visibility(&mut self) {}
}

impl<T: OsdNotifier + ?Sized> OsdNotifier for Box<T> {
    fn record_action(&mut self, index: usize, description: &str) {
        (**self).record_action(index, description);
    }

    fn record_profile_switch(&mut self, name: &str) {
        (**self).record_profile_switch(name);
    }

    fn set_wheel_state(&mut self, change: &WheelChange) {
        (**self).set_wheel_state(change);
    }

    fn toggle_visibility(&mut self) {
        (**self).toggle_visibility();
    }
}

/// One line in the recent-actions list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecentAction {
    pub button: String,
    pub description: String,
}

/// What the OSD shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsdModel {
    recent: VecDeque<RecentAction>,
    capacity: usize,
    pub profile: Option<String>,
    pub wheel: Option<WheelChange>,
    pub visible: bool,
}

impl OsdModel {
    pub fn new(capacity: usize) -> Self {
        Self {
            recent: VecDeque::with_capacity(capacity),
            capacity,
            profile: None,
            wheel: None,
            visible: true,
        }
    }

    /// Most recent first
    pub fn recent(&self) -> impl Iterator<Item = &RecentAction> {
        self.recent.iter().rev()
    }

    pub fn apply(&mut self, event: OsdEvent) {
        match event {
            OsdEvent::Action { index, description } => {
                if self.capacity == 0 {
                    return;
                }
                if self.recent.len() == self.capacity {
                    self.recent.pop_front();
                }
                self.recent.push_back(RecentAction {
                    button: button_name(index),
                    description,
                });
            }
            OsdEvent::ProfileSwitch(name) => self.profile = Some(name),
            OsdEvent::WheelState(change) => self.wheel = Some(change),
            OsdEvent::ToggleVisibility => self.visible = !self.visible,
            OsdEvent::Shutdown => {}
        }
    }

    /// Status line for the wheel selection
    pub fn wheel_summary(&self) -> Option<String> {
        let change = self.wheel?;
        Some(match change.mode {
            WheelMode::Sequential => {
                format!("Wheel {}/{}", change.slot + 1, change.total_slots)
            }
            WheelMode::Sets => format!(
                "Set {} | Position {} | Wheel {}",
                change.set + 1,
                change.position + 1,
                change.slot + 1
            ),
        })
    }
}

/// Handle to the OSD consumer thread
pub struct OsdHandle {
    sender: Sender<OsdEvent>,
    thread: Option<thread::JoinHandle<OsdModel>>,
}

impl OsdHandle {
    /// Start the OSD thread
    pub fn start(recent_actions: usize) -> Self {
        let (tx, rx) = mpsc::channel();
        let thread = thread::spawn(move || run_osd_loop(rx, OsdModel::new(recent_actions)));
        Self {
            sender: tx,
            thread: Some(thread),
        }
    }

    /// Notifier feeding this OSD
    pub fn notifier(&self) -> ChannelOsd {
        ChannelOsd {
            sender: self.sender.clone(),
        }
    }

    /// Stop the thread and return its final model
    pub fn shutdown(mut self) -> Option<OsdModel> {
        let _ = self.sender.send(OsdEvent::Shutdown);
        let handle = self.thread.take()?;
        match handle.join() {
            Ok(model) => Some(model),
            Err(_) => {
                error!("OSD thread panicked");
                None
            }
        }
    }
}

impl Drop for OsdHandle {
    fn drop(&mut self) {
        let _ = self.sender.send(OsdEvent::Shutdown);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

fn run_osd_loop(rx: Receiver<OsdEvent>, mut model: OsdModel) -> OsdModel {
    info!("OSD thread started");
    while let Ok(event) = rx.recv() {
        if event == OsdEvent::Shutdown {
            break;
        }
        match &event {
            OsdEvent::Action { index, description } => {
                debug!("OSD: {} -> {}", button_name(*index), description)
            }
            OsdEvent::ProfileSwitch(name) => info!("OSD: profile {}", name),
            OsdEvent::ToggleVisibility => debug!("OSD: visible = {}", !model.visible),
            OsdEvent::WheelState(_) | OsdEvent::Shutdown => {}
        }
        let wheel_changed = matches!(event, OsdEvent::WheelState(_));
        model.apply(event);
        if wheel_changed {
            if let Some(summary) = model.wheel_summary() {
                debug!("OSD: {}", summary);
            }
        }
    }
    info!("OSD thread stopped");
    model
}

/// Sends OSD events over a channel
#[derive(Debug, Clone)]
pub struct ChannelOsd {
    sender: Sender<OsdEvent>,
}

impl ChannelOsd {
    fn send(&self, event: OsdEvent) {
        if self.sender.send(event).is_err() {
            debug!("OSD thread is gone, dropping event");
        }
    }
}

impl OsdNotifier for ChannelOsd {
    fn record_action(&mut self, index: usize, description: &str) {
        self.send(OsdEvent::Action {
            index,
            description: description.to_string(),
        });
    }

    fn record_profile_switch(&mut self, name: &str) {
        self.send(OsdEvent::ProfileSwitch(name.to_string()));
    }

    fn set_wheel_state(&mut self, change: &WheelChange) {
        self.send(OsdEvent::WheelState(*change));
    }

    fn toggle_visibility(&mut self) {
        self.send(OsdEvent::ToggleVisibility);
    }
}

/// Discards notifications (OSD disabled)
#[derive(Debug, Default)]
pub struct NullOsd;

impl OsdNotifier for NullOsd {
    fn record_action(&mut self, _index: usize, _description: &str) {}

    fn record_profile_switch(&mut self, _name: &str) {}

    fn set_wheel_state(&mut self, _change: &WheelChange) {}
}

/// Collects notifications in memory
#[derive(Debug, Default)]
pub struct RecordingOsd {
    pub events: Vec<OsdEvent>,
}

impl RecordingOsd {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OsdNotifier for RecordingOsd {
    fn record_action(&mut self, index: usize, description: &str) {
        self.events.push(OsdEvent::Action {
            index,
            description: description.to_string(),
        });
    }

    fn record_profile_switch(&mut self, name: &str) {
        self.events.push(OsdEvent::ProfileSwitch(name.to_string()));
    }

    fn set_wheel_state(&mut self, change: &WheelChange) {
        self.events.push(OsdEvent::WheelState(*change));
    }

    fn toggle_visibility(&mut self) {
        self.events.push(OsdEvent::ToggleVisibility);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action(index: usize, description: &str) -> OsdEvent {
        OsdEvent::Action {
            index,
            description: description.to_string(),
        }
    }

    #[test]
    fn test_recent_actions_ring() {
        let mut model = OsdModel::new(3);
        for i in 0..5 {
            model.apply(action(i, &format!("key{}", i)));
        }
        let recent: Vec<&str> = model.recent().map(|a| a.description.as_str()).collect();
        assert_eq!(recent, vec!["key4", "key3", "key2"]);
        assert_eq!(model.recent().next().map(|a| a.button.as_str()), Some("B4"));
    }

    #[test]
    fn test_zero_capacity_keeps_nothing() {
        let mut model = OsdModel::new(0);
        model.apply(action(1, "b"));
        assert_eq!(model.recent().count(), 0);
    }

    #[test]
    fn test_wheel_summary() {
        let mut model = OsdModel::new(10);
        assert_eq!(model.wheel_summary(), None);
        model.apply(OsdEvent::WheelState(WheelChange {
            mode: WheelMode::Sets,
            set: 1,
            position: 0,
            slot: 2,
            total_slots: 6,
        }));
        assert_eq!(
            model.wheel_summary().as_deref(),
            Some("Set 2 | Position 1 | Wheel 3")
        );
    }

    #[test]
    fn test_thread_applies_events_in_order() {
        let handle = OsdHandle::start(10);
        let mut osd = handle.notifier();
        osd.record_action(18, "swap");
        osd.record_profile_switch("Krita");
        osd.toggle_visibility();

        let model = handle.shutdown().unwrap();
        assert_eq!(model.profile.as_deref(), Some("Krita"));
        assert!(!model.visible);
        assert_eq!(model.recent().next().map(|a| a.button.as_str()), Some("WHEEL"));
    }

    #[test]
    fn test_notifier_survives_stopped_thread() {
        let handle = OsdHandle::start(10);
        let mut osd = handle.notifier();
        drop(handle);
        osd.record_profile_switch("Gimp");
    }
}
