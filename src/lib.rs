//! Relays "now playing" state to local WebNowPlaying listeners.
//!
//! Listeners are local applications such as a Rainmeter skin or an OBS
//! plugin. Each one runs a WebSocket server on its own port. The relay
//! keeps a connection to every enabled listener and sends it the state of
//! the active [`capability::Player`]: only the fields that changed, in the
//! protocol revision the listener speaks. Commands coming back, like play
//! or seek, are applied to the player, after which every listener gets a
//! fresh report.
//!
//! The entry point is [`coordinator::Coordinator`].

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

#[macro_use]
extern crate log;

pub mod capability;
pub mod config;
pub mod connection;
pub mod coordinator;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod http;
pub mod negotiate;
pub mod player;
pub mod protocol;
pub mod release;
pub mod report;
pub mod signal;
pub mod util;
