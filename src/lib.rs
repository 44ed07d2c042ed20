#![forbid(unsafe_code)]

//! Edge-snap and auto-hide controller for a compact-mode todo window.
//!
//! The [`controller`] state machine is platform-free; [`x11_utils`] drives a
//! real X11 window and [`daemon`] wires both to a Unix-socket IPC surface.

pub mod animation;
pub mod cli;
pub mod commands;
pub mod config;
pub mod constants;
pub mod controller;
pub mod daemon;
pub mod ipc;
pub mod persistence;
pub mod snapping;
pub mod timers;
pub mod types;
pub mod window;
pub mod x11_utils;
