//! Client packet dispatch.

pub mod error;
pub(crate) mod handlers;
