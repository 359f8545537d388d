//! Websocket bridge between Spotify and a single Resonite client.
//!
//! The client sends terse text commands (`next`, `search track daft punk`,
//! `play spotify:album:...`) and receives tab/newline-delimited frames it
//! can render without a JSON parser. Behind the scenes the bridge talks to
//! the Spotify Web API.
//!
//! # Modules
//!
//! * [`server`]: websocket listener, one task per connection
//! * [`dispatch`]: maps each command to its handler and response frame
//! * [`session`]: the process-wide session state
//! * [`device`] and [`guard`]: playback device resolution and retries
//! * [`protocol`]: command parsing and frame formatting
//! * [`spotify`]: the Web API client and its models
//! * [`config`], [`secrets`], [`http`], [`error`], [`signal`]: plumbing
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

#[macro_use]
extern crate log;

pub mod config;
pub mod device;
pub mod dispatch;
pub mod error;
pub mod guard;
pub mod http;
pub mod protocol;
pub mod secrets;
pub mod server;
pub mod session;
pub mod signal;
pub mod spotify;
