//! Parser for Git pack index (.idx) v2 files: 256-entry fanout, sorted hash
//! table, CRC32 table, 31-bit offsets with a large-offset escape table, and
//! trailing pack/idx checksums. All multi-byte fields are big-endian.
//!
//! Lookup is a binary search bounded by the fanout bucket of the hash's
//! first byte; `fanout[255]` is the total object count.

use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt};
use sha1::{Digest, Sha1};

use crate::{
    errors::GitError,
    hash::{HASH_SIZE, ObjectHash},
};

const IDX_MAGIC: [u8; 4] = [0xFF, 0x74, 0x4F, 0x63];
const IDX_VERSION: u32 = 2;
const LARGE_OFFSET_FLAG: u32 = 0x8000_0000;

/// An in-memory pack index, parsed once per pack and cached.
#[derive(Debug)]
pub struct PackIndex {
    fanout: [u32; 256],
    hashes: Vec<ObjectHash>,
    crc32: Vec<u32>,
    offsets: Vec<u64>,
    /// Entry offsets in ascending order, used to bound the compressed span
    /// of an entry by the start of the next one.
    sorted_offsets: Vec<u64>,
    pack_hash: ObjectHash,
}

impl PackIndex {
    /// Parse a complete `.idx` byte buffer, verifying magic, version, and
    /// the trailing index checksum.
    pub fn parse(data: &[u8]) -> Result<PackIndex, GitError> {
        if data.len() < 8 + 256 * 4 + 2 * HASH_SIZE {
            return Err(GitError::InvalidIdxFile("file too short".into()));
        }

        // The idx trailer hashes everything before it.
        let digest: [u8; HASH_SIZE] =
            Sha1::digest(&data[..data.len() - HASH_SIZE]).into();
        if digest != data[data.len() - HASH_SIZE..] {
            return Err(GitError::InvalidIdxFile("checksum mismatch".into()));
        }

        let mut cursor = Cursor::new(data);
        let mut magic = [0u8; 4];
        std::io::Read::read_exact(&mut cursor, &mut magic)?;
        if magic != IDX_MAGIC {
            return Err(GitError::InvalidIdxFile(format!(
                "bad magic {:02x?}",
                magic
            )));
        }
        let version = cursor.read_u32::<BigEndian>()?;
        if version != IDX_VERSION {
            return Err(GitError::InvalidIdxFile(format!(
                "unsupported version {version}"
            )));
        }

        let mut fanout = [0u32; 256];
        for slot in fanout.iter_mut() {
            *slot = cursor.read_u32::<BigEndian>()?;
        }
        // The fanout is cumulative and must be monotone.
        if fanout.windows(2).any(|pair| pair[0] > pair[1]) {
            return Err(GitError::InvalidIdxFile("non-monotone fanout".into()));
        }
        let count = fanout[255] as usize;

        let mut hashes = Vec::with_capacity(count);
        for _ in 0..count {
            hashes.push(
                ObjectHash::from_stream(&mut cursor)
                    .map_err(|_| GitError::InvalidIdxFile("truncated hash table".into()))?,
            );
        }

        let mut crc32 = Vec::with_capacity(count);
        for _ in 0..count {
            crc32.push(
                cursor
                    .read_u32::<BigEndian>()
                    .map_err(|_| GitError::InvalidIdxFile("truncated crc table".into()))?,
            );
        }

        let mut raw_offsets = Vec::with_capacity(count);
        for _ in 0..count {
            raw_offsets.push(
                cursor
                    .read_u32::<BigEndian>()
                    .map_err(|_| GitError::InvalidIdxFile("truncated offset table".into()))?,
            );
        }

        let large_count = raw_offsets
            .iter()
            .filter(|raw| **raw & LARGE_OFFSET_FLAG != 0)
            .count();
        let mut large_offsets = Vec::with_capacity(large_count);
        for _ in 0..large_count {
            large_offsets.push(
                cursor
                    .read_u64::<BigEndian>()
                    .map_err(|_| GitError::InvalidIdxFile("truncated large offsets".into()))?,
            );
        }

        let offsets = raw_offsets
            .iter()
            .map(|raw| {
                if raw & LARGE_OFFSET_FLAG == 0 {
                    Ok(*raw as u64)
                } else {
                    let index = (raw & !LARGE_OFFSET_FLAG) as usize;
                    large_offsets.get(index).copied().ok_or_else(|| {
                        GitError::InvalidIdxFile(format!(
                            "large offset index {index} out of range"
                        ))
                    })
                }
            })
            .collect::<Result<Vec<u64>, GitError>>()?;

        let pack_hash = ObjectHash::from_stream(&mut cursor)
            .map_err(|_| GitError::InvalidIdxFile("missing pack hash".into()))?;

        let mut sorted_offsets = offsets.clone();
        sorted_offsets.sort_unstable();

        Ok(PackIndex {
            fanout,
            hashes,
            crc32,
            offsets,
            sorted_offsets,
            pack_hash,
        })
    }

    /// Total number of objects in the pack.
    pub fn object_count(&self) -> usize {
        self.fanout[255] as usize
    }

    /// Hash of the companion `.pack` file, from the trailer.
    pub fn pack_hash(&self) -> ObjectHash {
        self.pack_hash
    }

    /// Binary-search the pack offset for `hash` within its fanout bucket.
    pub fn find(&self, hash: &ObjectHash) -> Option<u64> {
        let bucket = hash.0[0] as usize;
        let lo = if bucket == 0 {
            0
        } else {
            self.fanout[bucket - 1] as usize
        };
        let hi = self.fanout[bucket] as usize;
        let slot = self.hashes[lo..hi]
            .binary_search(hash)
            .ok()
            .map(|i| lo + i)?;
        Some(self.offsets[slot])
    }

    /// Recorded CRC32 of the compressed entry bytes for `hash`.
    pub fn crc32_for(&self, hash: &ObjectHash) -> Option<u32> {
        let bucket = hash.0[0] as usize;
        let lo = if bucket == 0 {
            0
        } else {
            self.fanout[bucket - 1] as usize
        };
        let hi = self.fanout[bucket] as usize;
        let slot = self.hashes[lo..hi]
            .binary_search(hash)
            .ok()
            .map(|i| lo + i)?;
        Some(self.crc32[slot])
    }

    /// Recorded CRC32 for the entry starting at `offset`.
    pub fn crc32_at_offset(&self, offset: u64) -> Option<u32> {
        self.offsets
            .iter()
            .position(|candidate| *candidate == offset)
            .map(|slot| self.crc32[slot])
    }

    /// The first entry offset strictly greater than `offset`, bounding the
    /// compressed span of the entry that starts at `offset`.
    pub fn next_offset_after(&self, offset: u64) -> Option<u64> {
        let pos = self.sorted_offsets.partition_point(|o| *o <= offset);
        self.sorted_offsets.get(pos).copied()
    }

    /// Iterate (hash, offset) pairs in hash order.
    pub fn entries(&self) -> impl Iterator<Item = (ObjectHash, u64)> + '_ {
        self.hashes
            .iter()
            .zip(self.offsets.iter())
            .map(|(hash, offset)| (*hash, *offset))
    }
}
