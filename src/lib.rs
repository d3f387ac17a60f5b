//! murmur library — realtime voice session engine.
//!
//! Streams microphone audio to a live conversational endpoint, plays the
//! synthesized reply gaplessly, survives barge-in, and executes the
//! model's tool calls on the host. The `murmur` binary is a thin CLI over
//! this crate.

pub mod audio;
pub mod config;
pub mod errors;
pub mod session;
pub mod tools;
pub mod transport;
