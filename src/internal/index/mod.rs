//! Reader for Git's index (staging area) file, version 2.
//!
//! Layout: `DIRC` magic, version, entry count, then variable-length entries
//! sorted by path. Each entry carries stat data, the staged blob hash, and
//! a flags word (assume-valid bit, stage bits, name length); the whole
//! entry is NUL-padded to a multiple of 8 bytes. Extensions after the
//! entries are skipped; the trailing SHA-1 checksum is verified.

use std::io::{Cursor, Read};

use byteorder::{BigEndian, ReadBytesExt};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

use crate::{
    errors::GitError,
    hash::{HASH_SIZE, ObjectHash},
};

const INDEX_MAGIC: &[u8; 4] = b"DIRC";
const INDEX_VERSION: u32 = 2;

/// Fixed-size prefix of an entry: 10 u32 stat fields, the hash, the flags.
const ENTRY_FIXED_LEN: usize = 40 + HASH_SIZE + 2;

/// Flags decoded from an entry's 16-bit flags word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntryFlags {
    /// The assume-unchanged bit (`git update-index --assume-unchanged`).
    pub assume_valid: bool,
    /// Merge stage (0 = normal, 1..3 = conflict stages).
    pub stage: u8,
}

/// One staged file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub path: String,
    pub mode: u32,
    pub hash: ObjectHash,
    pub flags: IndexEntryFlags,
    pub size: u32,
    pub mtime: DateTime<Utc>,
}

/// Parse a complete index file into its ordered entries.
pub fn parse_index(data: &[u8]) -> Result<Vec<IndexEntry>, GitError> {
    if data.len() < 12 + HASH_SIZE {
        return Err(GitError::InvalidIndexFile("file too short".into()));
    }

    let digest: [u8; HASH_SIZE] = Sha1::digest(&data[..data.len() - HASH_SIZE]).into();
    if digest != data[data.len() - HASH_SIZE..] {
        return Err(GitError::InvalidIndexFile("checksum mismatch".into()));
    }

    let mut cursor = Cursor::new(data);
    let mut magic = [0u8; 4];
    cursor.read_exact(&mut magic)?;
    if &magic != INDEX_MAGIC {
        return Err(GitError::InvalidIndexFile(format!("bad magic {magic:02x?}")));
    }
    let version = cursor.read_u32::<BigEndian>()?;
    if version != INDEX_VERSION {
        return Err(GitError::InvalidIndexFile(format!(
            "unsupported version {version}"
        )));
    }
    let count = cursor.read_u32::<BigEndian>()? as usize;

    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        let entry_start = cursor.position() as usize;

        let _ctime_secs = cursor.read_u32::<BigEndian>()?;
        let _ctime_nanos = cursor.read_u32::<BigEndian>()?;
        let mtime_secs = cursor.read_u32::<BigEndian>()?;
        let _mtime_nanos = cursor.read_u32::<BigEndian>()?;
        let _dev = cursor.read_u32::<BigEndian>()?;
        let _ino = cursor.read_u32::<BigEndian>()?;
        let mode = cursor.read_u32::<BigEndian>()?;
        let _uid = cursor.read_u32::<BigEndian>()?;
        let _gid = cursor.read_u32::<BigEndian>()?;
        let size = cursor.read_u32::<BigEndian>()?;
        let hash = ObjectHash::from_stream(&mut cursor)
            .map_err(|_| GitError::InvalidIndexFile("truncated entry hash".into()))?;
        let flags_word = cursor.read_u16::<BigEndian>()?;

        if flags_word & 0x4000 != 0 {
            return Err(GitError::InvalidIndexFile(
                "extended flags are not valid in a v2 index".into(),
            ));
        }
        let flags = IndexEntryFlags {
            assume_valid: flags_word & 0x8000 != 0,
            stage: ((flags_word >> 12) & 0x3) as u8,
        };

        let name_len = (flags_word & 0x0FFF) as usize;
        let path = if name_len < 0x0FFF {
            let mut name = vec![0u8; name_len];
            cursor.read_exact(&mut name)?;
            String::from_utf8_lossy(&name).into_owned()
        } else {
            // Long names are NUL-terminated instead of length-prefixed.
            let rest = &data[cursor.position() as usize..];
            let end = rest
                .iter()
                .position(|b| *b == 0)
                .ok_or_else(|| GitError::InvalidIndexFile("unterminated long name".into()))?;
            let name = String::from_utf8_lossy(&rest[..end]).into_owned();
            cursor.set_position(cursor.position() + end as u64);
            name
        };

        // NUL padding to an 8-byte boundary, at least one byte.
        let consumed = cursor.position() as usize - entry_start;
        debug_assert!(consumed >= ENTRY_FIXED_LEN);
        let padding = 8 - (consumed % 8);
        cursor.set_position(cursor.position() + padding as u64);
        if cursor.position() as usize > data.len() - HASH_SIZE {
            return Err(GitError::InvalidIndexFile("truncated entry list".into()));
        }

        let mtime = DateTime::<Utc>::from_timestamp(mtime_secs as i64, 0)
            .ok_or_else(|| GitError::InvalidIndexFile("mtime out of range".into()))?;
        entries.push(IndexEntry {
            path,
            mode,
            hash,
            flags,
            size,
            mtime,
        });
    }

    // Anything between the last entry and the checksum is extension data
    // (TREE, REUC, ...) and is deliberately skipped.
    Ok(entries)
}

/// Build index v2 bytes from (path, mode, hash, size, mtime-secs) rows.
/// Used by tests and fixture builders.
pub fn encode_index(rows: &[(&str, u32, ObjectHash, u32, u32)]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend(INDEX_MAGIC);
    out.extend(INDEX_VERSION.to_be_bytes());
    out.extend((rows.len() as u32).to_be_bytes());
    for (path, mode, hash, size, mtime) in rows {
        let start = out.len();
        out.extend(0u32.to_be_bytes()); // ctime secs
        out.extend(0u32.to_be_bytes()); // ctime nanos
        out.extend(mtime.to_be_bytes());
        out.extend(0u32.to_be_bytes()); // mtime nanos
        out.extend(0u32.to_be_bytes()); // dev
        out.extend(0u32.to_be_bytes()); // ino
        out.extend(mode.to_be_bytes());
        out.extend(0u32.to_be_bytes()); // uid
        out.extend(0u32.to_be_bytes()); // gid
        out.extend(size.to_be_bytes());
        out.extend(hash.as_ref());
        out.extend((path.len() as u16 & 0x0FFF).to_be_bytes());
        out.extend(path.as_bytes());
        let consumed = out.len() - start;
        let padding = 8 - (consumed % 8);
        out.extend(std::iter::repeat_n(0u8, padding));
    }
    let digest: [u8; HASH_SIZE] = Sha1::digest(&out).into();
    out.extend(digest);
    out
}
