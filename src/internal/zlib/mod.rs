//! Zlib decoding for loose objects and pack entries.

pub mod stream;

pub use stream::inflate::{ReadBoxed, inflate_all, verify_zlib_header};
