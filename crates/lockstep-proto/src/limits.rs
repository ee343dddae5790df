//! Buffer and queue limits for the transport layer.
//!
//! Packet sizes are bounded by [`SEND_MTU`]; the values here bound what a
//! single connection may hold in memory on either side of the socket.

use crate::constants::SEND_MTU;

// ============================================================================
// Inbound
// ============================================================================

/// Bytes requested from the stream per read call.
pub const READ_CHUNK: usize = 4 * 1024;

/// Maximum bytes buffered for reassembly before the connection is dropped.
///
/// A well-behaved peer never needs more than one partial packet plus one
/// read chunk of look-ahead.
pub const RX_BUFFER_LIMIT: usize = SEND_MTU + READ_CHUNK;

/// Packets handled per connection in one poll, so one chatty peer cannot
/// stretch a tick.
pub const MAX_PACKETS_PER_POLL: usize = 64;

// ============================================================================
// Outbound
// ============================================================================

/// Maximum packets a connection may have queued but not yet written.
///
/// Snapshot pacing keeps far fewer than this in flight; hitting the limit
/// means the peer stopped reading.
pub const OUTBOUND_QUEUE_LIMIT: usize = 16 * 1024;

/// Initial number of snapshot data packets sent per batch.
pub const SNAPSHOT_INITIAL_BATCH: usize = 4;

/// Upper bound for the adaptive snapshot batch size.
pub const SNAPSHOT_MAX_BATCH: usize = 1024;
