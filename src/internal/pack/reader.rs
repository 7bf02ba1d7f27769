//! Reader for `.pack` files: verifies the `PACK` v2 header, locates entry
//! spans through the companion index, and decodes entry headers into base
//! bytes or delta references.
//!
//! Entries are stored back-to-back, so the compressed span of an entry is
//! bounded by the next indexed offset (or by the 20-byte trailer for the
//! last entry). Delta chains themselves are resolved by the object
//! accessor, which owns the caches the resolution needs.

use std::{io::Cursor, path::PathBuf, sync::Arc};

use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::{
    errors::GitError,
    fs::FileStreamCache,
    hash::{HASH_SIZE, ObjectHash},
    internal::{
        object::types::ObjectType,
        pack::{
            idx::PackIndex,
            utils::{read_offset_encoding, read_type_and_size},
        },
        zlib::inflate_all,
    },
    utils::read_bytes,
};

const PACK_MAGIC: &[u8; 4] = b"PACK";
const PACK_VERSION: u32 = 2;
const PACK_HEADER_LEN: u64 = 12;

/// A decoded pack entry before delta resolution.
#[derive(Debug)]
pub enum RawEntry {
    /// A plain object: inflated body bytes plus their type.
    Base { obj_type: ObjectType, data: Vec<u8> },
    /// Delta whose base starts at `base_offset` in the same pack.
    OfsDelta { base_offset: u64, delta: Vec<u8> },
    /// Delta whose base is addressed by hash (possibly in another pack or
    /// the loose store).
    RefDelta {
        base_hash: ObjectHash,
        delta: Vec<u8>,
    },
}

/// One open pack: path, parsed index, and pooled file handles.
#[derive(Debug)]
pub struct PackReader {
    pack_path: PathBuf,
    index: Arc<PackIndex>,
    streams: Arc<FileStreamCache>,
    file_len: u64,
    /// Check each entry span against the CRC32 recorded in the index.
    verify_crc: bool,
}

impl PackReader {
    /// Open a pack, verifying its header against the parsed index.
    pub async fn open(
        pack_path: PathBuf,
        index: Arc<PackIndex>,
        streams: Arc<FileStreamCache>,
    ) -> Result<PackReader, GitError> {
        let file_len = tokio::fs::metadata(&pack_path).await?.len();
        if file_len < PACK_HEADER_LEN + HASH_SIZE as u64 {
            return Err(GitError::InvalidPackHeader(format!(
                "{} is too short to be a pack",
                pack_path.display()
            )));
        }

        let mut handle = streams.acquire(&pack_path).await?;
        let file = handle.get_mut();
        file.seek(std::io::SeekFrom::Start(0)).await?;
        let mut header = [0u8; 12];
        file.read_exact(&mut header).await?;

        if &header[0..4] != PACK_MAGIC {
            return Err(GitError::InvalidPackHeader(format!(
                "bad magic in {}",
                pack_path.display()
            )));
        }
        let version = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);
        if version != PACK_VERSION {
            return Err(GitError::InvalidPackHeader(format!(
                "unsupported pack version {version}"
            )));
        }
        let declared = u32::from_be_bytes([header[8], header[9], header[10], header[11]]) as usize;
        if declared != index.object_count() {
            return Err(GitError::InvalidPackHeader(format!(
                "pack declares {declared} objects, idx has {}",
                index.object_count()
            )));
        }

        Ok(PackReader {
            pack_path,
            index,
            streams,
            file_len,
            verify_crc: false,
        })
    }

    /// Enable CRC verification of every entry span against the index.
    pub fn with_crc_verification(mut self) -> PackReader {
        self.verify_crc = true;
        self
    }

    pub fn index(&self) -> &Arc<PackIndex> {
        &self.index
    }

    pub fn path(&self) -> &std::path::Path {
        &self.pack_path
    }

    /// Read the compressed span of the entry starting at `offset`.
    async fn read_entry_span(&self, offset: u64) -> Result<Vec<u8>, GitError> {
        let end = self
            .index
            .next_offset_after(offset)
            .unwrap_or(self.file_len - HASH_SIZE as u64);
        if offset < PACK_HEADER_LEN || end <= offset || end > self.file_len - HASH_SIZE as u64 {
            return Err(GitError::InvalidPackHeader(format!(
                "entry span {offset}..{end} outside pack body"
            )));
        }

        let mut handle = self.streams.acquire(&self.pack_path).await?;
        let file = handle.get_mut();
        file.seek(std::io::SeekFrom::Start(offset)).await?;
        let mut buf = vec![0u8; (end - offset) as usize];
        file.read_exact(&mut buf).await?;

        if self.verify_crc {
            if let Some(expected) = self.index.crc32_at_offset(offset) {
                let mut hasher = crc32fast::Hasher::new();
                hasher.update(&buf);
                let actual = hasher.finalize();
                if actual != expected {
                    return Err(GitError::InvalidIdxFile(format!(
                        "entry at {offset}: crc {actual:08x}, index records {expected:08x}"
                    )));
                }
            }
        }
        Ok(buf)
    }

    /// Decode the entry at `offset` into base bytes or a delta reference.
    pub async fn read_raw_entry(&self, offset: u64) -> Result<RawEntry, GitError> {
        let span = self.read_entry_span(offset).await?;
        let mut cursor = Cursor::new(span.as_slice());
        let (obj_type, size) = read_type_and_size(&mut cursor)?;

        match obj_type {
            ObjectType::Commit | ObjectType::Tree | ObjectType::Blob | ObjectType::Tag => {
                let body = &span[cursor.position() as usize..];
                let data = inflate_all(body, size)?;
                if data.len() != size {
                    return Err(GitError::DeltaObjectError(format!(
                        "entry at {offset} inflated to {} bytes, header declared {size}",
                        data.len()
                    )));
                }
                Ok(RawEntry::Base { obj_type, data })
            }
            ObjectType::OffsetDelta => {
                let negative = read_offset_encoding(&mut cursor)?;
                let base_offset = offset.checked_sub(negative).ok_or_else(|| {
                    GitError::DeltaObjectError(format!(
                        "ofs-delta at {offset} points {negative} bytes before pack start"
                    ))
                })?;
                let body = &span[cursor.position() as usize..];
                let delta = inflate_all(body, size)?;
                Ok(RawEntry::OfsDelta { base_offset, delta })
            }
            ObjectType::RefDelta => {
                let raw = read_bytes(&mut cursor, HASH_SIZE)?;
                let base_hash = ObjectHash::from_bytes(&raw)?;
                let body = &span[cursor.position() as usize..];
                let delta = inflate_all(body, size)?;
                Ok(RawEntry::RefDelta { base_hash, delta })
            }
        }
    }
}
