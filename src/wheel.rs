//! Wheel function selection
//!
//! The swap button picks which wheel slot the rotary wheel drives.
//!
//! - `Sequential`: every press advances to the next slot, wrapping around
//! - `Sets`: slots are grouped in pairs. Presses are counted until the click
//!   timeout passes, then committed: one click flips the position inside the
//!   set, two clicks switch between set 0 and 1, three or more go to or from
//!   set 2.

use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::debug;

/// Number of sets in `Sets` mode
pub const SET_COUNT: usize = 3;

/// Slots per set in `Sets` mode
pub const SET_SIZE: usize = 2;

/// Bounds for the multi-click window
pub const MIN_CLICK_TIMEOUT_MS: u64 = 100;
pub const MAX_CLICK_TIMEOUT_MS: u64 = 1000;
pub const DEFAULT_CLICK_TIMEOUT_MS: u64 = 300;

/// How the swap button selects the wheel slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WheelMode {
    #[default]
    Sequential,
    Sets,
}

/// Snapshot of the wheel selection after a change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WheelChange {
    pub mode: WheelMode,
    pub set: usize,
    pub position: usize,
    pub slot: usize,
    pub total_slots: usize,
}

/// Wheel selection state
#[derive(Debug, Clone)]
pub struct WheelModeState {
    mode: WheelMode,
    click_timeout: Duration,
    current_set: usize,
    position_in_set: usize,
    sequential_slot: usize,
    pending_clicks: u32,
    last_click: Option<Instant>,
}

impl WheelModeState {
    pub fn new(mode: WheelMode, click_timeout: Duration) -> Self {
        Self {
            mode,
            click_timeout,
            current_set: 0,
            position_in_set: 0,
            sequential_slot: 0,
            pending_clicks: 0,
            last_click: None,
        }
    }

    pub fn mode(&self) -> WheelMode {
        self.mode
    }

    /// Selected slot, which may be past the end of the wheel table
    pub fn current_slot(&self) -> usize {
        match self.mode {
            WheelMode::Sequential => self.sequential_slot,
            WheelMode::Sets => self.current_set * SET_SIZE + self.position_in_set,
        }
    }

    /// Slot to use against a wheel table of `slot_count` entries.
    ///
    /// Sequential selection wraps, so a table that shrank under a profile
    /// switch still resolves. A Sets selection past the end resolves to none.
    pub fn resolve(&self, slot_count: usize) -> Option<usize> {
        if slot_count == 0 {
            return None;
        }
        match self.mode {
            WheelMode::Sequential => Some(self.sequential_slot % slot_count),
            WheelMode::Sets => {
                let slot = self.current_slot();
                (slot < slot_count).then_some(slot)
            }
        }
    }

    /// Clicks counted but not yet committed
    pub fn pending_clicks(&self) -> u32 {
        self.pending_clicks
    }

    fn snapshot(&self, slot_count: usize) -> WheelChange {
        WheelChange {
            mode: self.mode,
            set: self.current_set,
            position: self.position_in_set,
            slot: self.current_slot(),
            total_slots: slot_count,
        }
    }

    /// Register a swap press.
    ///
    /// Sequential mode applies right away. Sets mode only counts the click; a
    /// change is returned when an expired sequence had to be committed first.
    pub fn press(&mut self, now: Instant, slot_count: usize) -> Option<WheelChange> {
        match self.mode {
            WheelMode::Sequential => {
                self.sequential_slot = if slot_count == 0 {
                    0
                } else {
                    (self.sequential_slot + 1) % slot_count
                };
                debug!("Wheel slot {}", self.sequential_slot);
                Some(self.snapshot(slot_count))
            }
            WheelMode::Sets => {
                let committed = self.tick(now, slot_count);
                self.pending_clicks += 1;
                self.last_click = Some(now);
                debug!("Swap click {} pending", self.pending_clicks);
                committed
            }
        }
    }

    /// Commit a pending click sequence once the click timeout has passed
    pub fn tick(&mut self, now: Instant, slot_count: usize) -> Option<WheelChange> {
        if self.mode != WheelMode::Sets || self.pending_clicks == 0 {
            return None;
        }
        let last = self.last_click?;
        if now.saturating_duration_since(last) < self.click_timeout {
            return None;
        }

        let clicks = self.pending_clicks;
        self.pending_clicks = 0;
        self.last_click = None;
        self.commit(clicks);

        debug!(
            "Swap committed {} click(s): set {} position {} slot {}",
            clicks,
            self.current_set,
            self.position_in_set,
            self.current_slot()
        );
        Some(self.snapshot(slot_count))
    }

    fn commit(&mut self, clicks: u32) {
        match clicks {
            0 => {}
            1 => self.position_in_set = 1 - self.position_in_set,
            2 => {
                self.current_set = if self.current_set == 1 { 0 } else { 1 };
                self.position_in_set = 0;
            }
            _ => {
                self.current_set = if self.current_set == 2 { 0 } else { 2 };
                self.position_in_set = 0;
            }
        }
    }
}
