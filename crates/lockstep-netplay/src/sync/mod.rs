//! Participant-side synchronization.
//!
//! - [`lockstep`]: the local clock, bounded by the authority's frames, and
//!   the fingerprint comparison at sync ticks
//! - [`snapshot`]: where a downloading snapshot is accumulated

pub mod lockstep;
pub mod snapshot;

pub use lockstep::{LockstepClock, SyncCheck};
pub use snapshot::{MemorySink, SnapshotSink, SpoolSink, open_sink};
