//! The text protocol spoken with the client.
//!
//! Every inbound websocket text frame is one [`Command`]; every command is
//! answered with exactly one frame built by the [`format`] functions.
//!
//! # Frames
//!
//! * Inbound: `<command>[ <argument>]`
//! * Outbound: `[TAG]` followed by tab-separated fields and newline-separated
//!   records, or `[ERROR] <message>`
//!
//! The client renders frames without a JSON parser, so the layout of each
//! frame is fixed; see the functions in [`format`].

pub mod command;
pub mod format;

pub use command::Command;

/// Inbound frames larger than this are answered with an error.
pub const MAX_FRAME_SIZE: usize = 8192;
