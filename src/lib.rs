//! keydial - remapping daemon for the Huion KD100 key dial
//!
//! Raw reports from the dial become key, mouse or shell actions, with a
//! leader-key modifier, switchable wheel functions and per-application
//! profiles.

pub mod binding;
pub mod config;
pub mod daemon;
pub mod device;
pub mod dispatch;
pub mod display_backend;
pub mod keycode;
pub mod leader;
pub mod osd;
pub mod pattern;
pub mod profile;
pub mod resolver;
pub mod sink;
pub mod wheel;
