//! Headless driver for the segment builder: replays scripted UI events
//! and runs estimations on real timers.

pub mod script;

pub use script::{demo_script, load_script, Command, ScriptRunner};
