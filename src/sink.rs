//! Action execution
//!
//! The dispatcher emits [`Action`]s; a sink performs them. `XdotoolSink`
//! drives the X server through the `xdotool` binary and runs shell commands
//! with `sh -c`. Failures are logged and never reach the dispatcher.

use std::fmt;
use std::process::{Command, Stdio};
use std::thread;
use tracing::{debug, info, warn};

/// A single request to the outside world
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Press and release a key or key combination
    KeyTap(String),
    KeyDown(String),
    KeyUp(String),
    /// Pointer button 1..=5
    MouseDown(u8),
    MouseUp(u8),
    /// Shell command line
    Run(String),
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::KeyTap(key) => write!(f, "key {}", key),
            Action::KeyDown(key) => write!(f, "keydown {}", key),
            Action::KeyUp(key) => write!(f, "keyup {}", key),
            Action::MouseDown(n) => write!(f, "mousedown {}", n),
            Action::MouseUp(n) => write!(f, "mouseup {}", n),
            Action::Run(cmd) => write!(f, "run {}", cmd),
        }
    }
}

/// Performs actions. Fire-and-forget.
pub trait ActionSink: Send {
    fn execute(&mut self, action: &Action);
}

impl<T: ActionSink + ?Sized> ActionSink for Box<T> {
    fn execute(&mut self, action: &Action) {
        (**self).execute(action);
    }
}

/// Executes actions with xdotool and the shell
#[derive(Debug, Default)]
pub struct XdotoolSink;

impl XdotoolSink {
    pub fn new() -> Self {
        Self
    }

    /// Check that xdotool is installed and can reach the display
    pub fn probe() -> bool {
        Command::new("xdotool")
            .args(["sleep", "0.01"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Arguments for the xdotool call behind an action
    fn xdotool_args(action: &Action) -> Option<Vec<String>> {
        let (verb, rest): (&str, Vec<String>) = match action {
            Action::KeyTap(key) => ("key", split_keys(key)),
            Action::KeyDown(key) => ("keydown", split_keys(key)),
            Action::KeyUp(key) => ("keyup", split_keys(key)),
            Action::MouseDown(n) => ("mousedown", vec![n.to_string()]),
            Action::MouseUp(n) => ("mouseup", vec![n.to_string()]),
            Action::Run(_) => return None,
        };
        if rest.is_empty() {
            return None;
        }
        let mut args = vec![verb.to_string()];
        args.extend(rest);
        Some(args)
    }

    fn run_shell(command: &str) {
        match Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .spawn()
        {
            Ok(mut child) => {
                // Reap without blocking the poll loop
                thread::spawn(move || {
                    if let Err(e) = child.wait() {
                        warn!("Failed to wait for command: {}", e);
                    }
                });
            }
            Err(e) => warn!("Failed to run '{}': {}", command, e),
        }
    }
}

/// Key text may hold several space-separated keys, e.g. `ctrl+z ctrl+z`
fn split_keys(key: &str) -> Vec<String> {
    key.split_whitespace().map(str::to_string).collect()
}

impl ActionSink for XdotoolSink {
    fn execute(&mut self, action: &Action) {
        debug!("Executing: {}", action);

        if let Action::Run(command) = action {
            Self::run_shell(command);
            return;
        }

        let Some(args) = Self::xdotool_args(action) else {
            debug!("Nothing to send for {:?}", action);
            return;
        };
        match Command::new("xdotool").args(&args).status() {
            Ok(status) if status.success() => {}
            Ok(status) => warn!("xdotool {} exited with {}", args.join(" "), status),
            Err(e) => warn!("Failed to run xdotool: {}", e),
        }
    }
}

/// Logs actions instead of performing them (dry run)
#[derive(Debug, Default)]
pub struct LogSink;

impl ActionSink for LogSink {
    fn execute(&mut self, action: &Action) {
        info!("[dry-run] {}", action);
    }
}

/// Collects actions in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub actions: Vec<Action>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand back everything recorded so far
    pub fn take(&mut self) -> Vec<Action> {
        std::mem::take(&mut self.actions)
    }
}

impl ActionSink for RecordingSink {
    fn execute(&mut self, action: &Action) {
        self.actions.push(action.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xdotool_args() {
        assert_eq!(
            XdotoolSink::xdotool_args(&Action::KeyTap("shift+b".into())),
            Some(vec!["key".to_string(), "shift+b".to_string()])
        );
        assert_eq!(
            XdotoolSink::xdotool_args(&Action::KeyDown("ctrl+z ctrl+z".into())),
            Some(vec!["keydown".into(), "ctrl+z".into(), "ctrl+z".into()])
        );
        assert_eq!(
            XdotoolSink::xdotool_args(&Action::MouseUp(3)),
            Some(vec!["mouseup".to_string(), "3".to_string()])
        );
        assert_eq!(XdotoolSink::xdotool_args(&Action::KeyTap("  ".into())), None);
        assert_eq!(XdotoolSink::xdotool_args(&Action::Run("ls".into())), None);
    }

    #[test]
    fn test_recording_sink() {
        let mut sink = RecordingSink::new();
        sink.execute(&Action::MouseDown(1));
        sink.execute(&Action::MouseUp(1));
        assert_eq!(sink.take(), vec![Action::MouseDown(1), Action::MouseUp(1)]);
        assert!(sink.actions.is_empty());
    }

    #[test]
    fn test_action_display() {
        assert_eq!(Action::KeyTap("b".into()).to_string(), "key b");
        assert_eq!(Action::Run("krita".into()).to_string(), "run krita");
    }
}
