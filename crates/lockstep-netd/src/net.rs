//! Network front end: accepts TCP connections and hands them to the hub.

pub mod inbound;
pub mod tcp;
