//! Streaming zlib wrappers.

pub mod inflate;
