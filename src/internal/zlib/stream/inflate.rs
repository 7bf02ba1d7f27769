//! Buffered inflate reader that decodes Git's zlib-compressed objects while
//! optionally tracking the SHA-1 object digest for integrity verification.
//!
//! Every compressed span in a repository (loose objects, pack entry bodies,
//! delta payloads) starts with a 2-byte zlib header; it is verified before
//! any byte is inflated so corruption surfaces as `MalformedObject` rather
//! than a garbled decode.

use std::{io, io::BufRead};

use flate2::{Decompress, FlushDecompress, Status};
use sha1::{Digest, Sha1};

use crate::{
    errors::GitError,
    hash::ObjectHash,
    internal::object::types::ObjectType,
};

/// Second header byte values Git ever writes (compression level nibble).
const ZLIB_LEVEL_BYTES: [u8; 4] = [0x01, 0x5E, 0x9C, 0xDA];

/// Verify the 2-byte zlib stream header: `0x78` then a level byte.
pub fn verify_zlib_header(data: &[u8]) -> Result<(), GitError> {
    match data {
        [0x78, level, ..] if ZLIB_LEVEL_BYTES.contains(level) => Ok(()),
        [first, second, ..] => Err(GitError::InvalidZlibStream(format!(
            "bad zlib header bytes {first:02x} {second:02x}"
        ))),
        _ => Err(GitError::InvalidZlibStream("stream shorter than header".into())),
    }
}

/// `ReadBoxed` unzips a DEFLATE stream from a [`BufRead`] source without
/// reading past the end of the compressed data, so subsequent bytes of the
/// underlying source stay available to the caller.
pub struct ReadBoxed<R> {
    /// The reader from which bytes should be decompressed.
    pub inner: R,
    /// The decompressor doing all the work.
    decompressor: Box<Decompress>,
    /// Digest over `"<type> <len>\0"` plus the inflated bytes, when object
    /// verification is requested.
    digest: Option<Sha1>,
}

impl<R> ReadBoxed<R>
where
    R: BufRead,
{
    /// Inflate without digest tracking (delta payloads, probing).
    pub fn new(inner: R) -> Self {
        ReadBoxed {
            inner,
            decompressor: Box::new(Decompress::new(true)),
            digest: None,
        }
    }

    /// Inflate while accumulating the Git object digest, seeded with the
    /// `"<type> <len>\0"` header.
    pub fn with_digest(inner: R, obj_type: ObjectType, size: usize) -> Self {
        let mut digest = Sha1::new();
        digest.update(obj_type.to_bytes());
        digest.update(b" ");
        digest.update(size.to_string().as_bytes());
        digest.update(b"\0");
        ReadBoxed {
            inner,
            decompressor: Box::new(Decompress::new(true)),
            digest: Some(digest),
        }
    }

    /// Compressed bytes consumed from the inner reader so far.
    pub fn compressed_bytes_read(&self) -> u64 {
        self.decompressor.total_in()
    }

    /// Finish and return the accumulated object id, if tracking was on.
    pub fn into_digest(self) -> Option<ObjectHash> {
        self.digest.map(|digest| {
            let mut bytes = [0u8; 20];
            bytes.copy_from_slice(digest.finalize().as_ref());
            ObjectHash(bytes)
        })
    }
}

impl<R> io::Read for ReadBoxed<R>
where
    R: BufRead,
{
    fn read(&mut self, into: &mut [u8]) -> io::Result<usize> {
        let o = read(&mut self.inner, &mut self.decompressor, into)?;
        if let Some(digest) = self.digest.as_mut() {
            digest.update(&into[..o]);
        }
        Ok(o)
    }
}

/// Read bytes from `rd` and decompress them using `state` into a
/// pre-allocated fitting buffer `dst`, returning the amount of bytes written.
fn read(rd: &mut impl BufRead, state: &mut Decompress, mut dst: &mut [u8]) -> io::Result<usize> {
    let mut total_written = 0;
    loop {
        let (written, consumed, ret, eof);
        {
            let input = rd.fill_buf()?;
            eof = input.is_empty();
            let before_out = state.total_out();
            let before_in = state.total_in();
            let flush = if eof {
                FlushDecompress::Finish
            } else {
                FlushDecompress::None
            };
            ret = state.decompress(input, dst, flush);
            written = (state.total_out() - before_out) as usize;
            total_written += written;
            dst = &mut dst[written..];
            consumed = (state.total_in() - before_in) as usize;
        }
        rd.consume(consumed);

        match ret {
            // The stream has officially ended, nothing more to do here.
            Ok(Status::StreamEnd) => return Ok(total_written),
            // Either input or output is depleted even though the stream is not done yet.
            Ok(Status::Ok | Status::BufError) if eof || dst.is_empty() => return Ok(total_written),
            // Some progress was made, continue until the stream ends.
            Ok(Status::Ok | Status::BufError) if consumed != 0 || written != 0 => continue,
            Ok(Status::Ok | Status::BufError) => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "deflate stream stalled without progress",
                ));
            }
            Err(..) => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "corrupt deflate stream",
                ));
            }
        }
    }
}

/// Inflate an in-memory zlib stream completely, after verifying its header.
///
/// `size_hint` sizes the output buffer up front (object sizes are declared
/// in headers and pack entries, so the hint is normally exact).
pub fn inflate_all(data: &[u8], size_hint: usize) -> Result<Vec<u8>, GitError> {
    verify_zlib_header(data)?;
    let mut reader = ReadBoxed::new(io::Cursor::new(data));
    let mut out = Vec::with_capacity(size_hint);
    io::Read::read_to_end(&mut reader, &mut out)
        .map_err(|err| GitError::InvalidZlibStream(err.to_string()))?;
    Ok(out)
}
