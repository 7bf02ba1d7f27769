//! SHA-1 object identity for Git repositories.
//!
//! Hashes appear in every data structure and inside tight loops (pack index
//! binary search, tree comparisons), so [`ObjectHash`] is a plain 20-byte
//! value type with no heap indirection. Two textual forms exist: binary
//! (20 bytes) and hex (40 lowercase characters), with the round-trip
//! invariant `parse(format(h)) == h`. The all-zero hash is a valid sentinel
//! for "absent" (reflog creation entries, unborn branches).

use std::{fmt::Display, io, str::FromStr};

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

use crate::{errors::GitError, internal::object::types::ObjectType};

/// Byte length of a SHA-1 object id.
pub const HASH_SIZE: usize = 20;

/// Hex string length of a SHA-1 object id.
pub const HASH_HEX_LEN: usize = 40;

/// Concrete object id value carrying the 20 SHA-1 bytes.
///
/// Supports conversion to/from hex strings, byte slices, and stream reading.
/// Equality and ordering are byte-wise.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Deserialize, Serialize,
)]
pub struct ObjectHash(pub [u8; HASH_SIZE]);

impl Display for ObjectHash {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl AsRef<[u8]> for ObjectHash {
    fn as_ref(&self) -> &[u8] {
        self.0.as_slice()
    }
}

/// Parse 40 hex characters (case-insensitive) into an `ObjectHash`.
impl FromStr for ObjectHash {
    type Err = GitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != HASH_HEX_LEN {
            return Err(GitError::InvalidHashValue(s.to_string()));
        }
        let mut h = [0u8; HASH_SIZE];
        let bytes = hex::decode(s).map_err(|_| GitError::InvalidHashValue(s.to_string()))?;
        h.copy_from_slice(bytes.as_slice());
        Ok(ObjectHash(h))
    }
}

impl ObjectHash {
    /// The all-zero sentinel hash ("absent").
    pub const fn zero() -> ObjectHash {
        ObjectHash([0u8; HASH_SIZE])
    }

    /// True for the all-zero sentinel.
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    /// Compute the SHA-1 of raw data.
    pub fn new(data: &[u8]) -> ObjectHash {
        let digest = Sha1::digest(data);
        let mut bytes = [0u8; HASH_SIZE];
        bytes.copy_from_slice(digest.as_ref());
        ObjectHash(bytes)
    }

    /// Compute the Git object id for a typed body:
    /// `sha1("<type> <len>\0" || data)`.
    pub fn from_type_and_data(object_type: ObjectType, data: &[u8]) -> ObjectHash {
        let mut hasher = Sha1::new();
        hasher.update(object_type.to_bytes());
        hasher.update(b" ");
        hasher.update(data.len().to_string().as_bytes());
        hasher.update(b"\x00");
        hasher.update(data);
        let mut bytes = [0u8; HASH_SIZE];
        bytes.copy_from_slice(hasher.finalize().as_ref());
        ObjectHash(bytes)
    }

    /// Create an `ObjectHash` from a 20-byte slice.
    pub fn from_bytes(bytes: &[u8]) -> Result<ObjectHash, GitError> {
        if bytes.len() != HASH_SIZE {
            return Err(GitError::InvalidHashValue(format!(
                "byte length {} (expected {HASH_SIZE})",
                bytes.len()
            )));
        }
        let mut h = [0u8; HASH_SIZE];
        h.copy_from_slice(bytes);
        Ok(ObjectHash(h))
    }

    /// Read 20 raw hash bytes from a stream.
    pub fn from_stream(data: &mut impl io::Read) -> io::Result<ObjectHash> {
        let mut h = [0u8; HASH_SIZE];
        data.read_exact(&mut h)?;
        Ok(ObjectHash(h))
    }

    /// Return raw bytes of the hash.
    pub fn to_data(self) -> Vec<u8> {
        self.0.to_vec()
    }
}
