//! Collaborator surface of the lockstep layer.
//!
//! The sync layer never looks inside the simulation; it only needs the
//! [`Simulation`] operations, a [`CredentialStore`] for joins, and a
//! [`CommandQueue`] that releases commands on their target tick.

pub mod command;
pub mod credentials;
pub mod demo;
pub mod error;
pub mod rng;
pub mod simulation;

pub use command::{Command, CommandQueue};
pub use credentials::{CredentialStore, StaticCredentials};
pub use demo::DemoWorld;
pub use error::SyncError;
pub use simulation::{CommandCheck, Simulation};
