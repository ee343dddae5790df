//! Lockstep netplay participant.
//!
//! A participant joins an authority, downloads the world snapshot and then
//! runs its own copy of the simulation in lockstep: it never runs past the
//! ceiling the authority published, executes commands only on the tick the
//! authority assigned, and compares fingerprints at sync ticks.
//!
//! # Architecture
//!
//! - [`client`]: protocol state machine and lockstep loop over any byte stream
//! - [`sync`]: the local clock, sync checks and snapshot sinks
//! - [`handler`]: tokio driver with command and event channels
//! - [`session`]: participant states and remote participant records
//! - [`error`]: error types

pub mod client;
pub mod config;
pub mod error;
pub mod handler;
pub mod session;
pub mod sync;

pub use client::{ClientEvent, ClientSession, DisconnectReason, LeaveReason};
pub use config::ClientConfig;
pub use error::NetplayError;
pub use handler::{NetplayCommand, SessionHandler, connect};
pub use session::{ClientStatus, RemoteParticipant};
