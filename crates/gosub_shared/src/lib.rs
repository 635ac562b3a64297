//! Shared functionality
//!
//! This crate supplies the functionality that is shared between the gosub xml crates: the byte
//! stream with its decoders and locations, node identifiers and the worker executor.

pub mod async_executor;
pub mod byte_stream;
pub mod node;
pub mod types;
