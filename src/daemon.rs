//! Poll loop
//!
//! Waits for the device, reads one report at a time and dispatches it, then
//! goes back to waiting when the device goes away. Profile switching and the
//! swap-click commit run on the same loop between reads.

use crate::device::Transport;
use crate::display_backend::WindowQuery;
use crate::dispatch::Dispatcher;
use crate::keycode::{self, LogicalEvent};
use crate::osd::OsdNotifier;
use crate::resolver::ProfileEngine;
use crate::sink::ActionSink;
use anyhow::Result;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Default read timeout, short enough for timely swap commits
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(10);

/// Pause between attempts to open a missing device
pub const DEFAULT_RECONNECT_BACKOFF: Duration = Duration::from_millis(250);

/// Loop timing
#[derive(Debug, Clone)]
pub struct DaemonOptions {
    pub poll_timeout: Duration,
    pub reconnect_backoff: Duration,
    /// How often to check the focused window
    pub profile_interval: Duration,
}

impl Default for DaemonOptions {
    fn default() -> Self {
        Self {
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            reconnect_backoff: DEFAULT_RECONNECT_BACKOFF,
            profile_interval: Duration::from_millis(500),
        }
    }
}

/// Automatic profile switching: the engine plus a way to find the focused window
pub struct ProfileWatcher {
    pub engine: ProfileEngine,
    pub query: Box<dyn WindowQuery>,
    next_check: Option<Instant>,
}

impl ProfileWatcher {
    pub fn new(engine: ProfileEngine, query: Box<dyn WindowQuery>) -> Self {
        Self {
            engine,
            query,
            next_check: None,
        }
    }
}

/// The remapping daemon
pub struct Daemon<T: Transport, S: ActionSink, O: OsdNotifier> {
    transport: T,
    dispatcher: Dispatcher<S, O>,
    profiles: Option<ProfileWatcher>,
    stop: Arc<AtomicBool>,
    options: DaemonOptions,
}

impl<T: Transport, S: ActionSink, O: OsdNotifier> Daemon<T, S, O> {
    pub fn new(transport: T, dispatcher: Dispatcher<S, O>, stop: Arc<AtomicBool>) -> Self {
        Self {
            transport,
            dispatcher,
            profiles: None,
            stop,
            options: DaemonOptions::default(),
        }
    }

    pub fn with_profiles(mut self, watcher: ProfileWatcher) -> Self {
        self.profiles = Some(watcher);
        self
    }

    pub fn with_options(mut self, options: DaemonOptions) -> Self {
        self.options = options;
        self
    }

    pub fn dispatcher(&self) -> &Dispatcher<S, O> {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut Dispatcher<S, O> {
        &mut self.dispatcher
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    /// Run until the stop flag is set
    pub fn run(&mut self) -> Result<()> {
        info!("Daemon started");
        let mut waiting_logged = false;

        while !self.stopped() {
            match self.transport.open() {
                Ok(()) => {
                    waiting_logged = false;
                    info!("Device connected");
                    self.read_loop();
                }
                Err(e) => {
                    if !waiting_logged {
                        warn!("Waiting for device: {}", e);
                        waiting_logged = true;
                    } else {
                        debug!("Device still unavailable: {}", e);
                    }
                    thread::sleep(self.options.reconnect_backoff);
                }
            }
        }

        self.dispatcher.release_held();
        self.transport.close();
        info!("Daemon stopped");
        Ok(())
    }

    /// Read and dispatch until the device fails or the stop flag is set
    fn read_loop(&mut self) {
        while !self.stopped() {
            self.poll_profiles(Instant::now());

            match self.transport.read_report(self.options.poll_timeout) {
                Ok(Some(report)) => self.handle_report(&report, Instant::now()),
                Ok(None) => self.dispatcher.tick(Instant::now()),
                Err(e) => {
                    warn!("Device lost: {}", e);
                    self.dispatcher.release_held();
                    self.transport.close();
                    return;
                }
            }
        }
    }

    /// Decode and dispatch one raw report
    pub fn handle_report(&mut self, report: &[u8], now: Instant) {
        match keycode::decode(report) {
            Some(event) => {
                if event != LogicalEvent::Idle {
                    debug!("Event: {:?} (code {})", event, keycode::raw_keycode(report));
                }
                self.dispatcher.handle_event(event, now);
            }
            None => {
                debug!("Unknown keycode {}", keycode::raw_keycode(report));
                self.dispatcher.tick(now);
            }
        }
    }

    /// Check the focused window when the poll interval has passed
    pub fn poll_profiles(&mut self, now: Instant) {
        let Some(watcher) = self.profiles.as_mut() else {
            return;
        };
        if watcher.next_check.is_some_and(|at| now < at) {
            return;
        }
        watcher.next_check = Some(now + self.options.profile_interval);

        let Some(window) = watcher.query.current_window() else {
            return;
        };
        if let Some(switch) = watcher.engine.resolve(&window) {
            self.dispatcher.apply_profile(switch);
        }
    }
}
