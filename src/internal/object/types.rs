//! Object type enumeration shared by the loose-object and pack readers.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::errors::GitError;

/// In Git, each object type is assigned a unique integer value, which is
/// used to identify the type of the object inside pack entry headers.
///
/// * `Commit` (1): author/committer/message plus tree and parent pointers.
/// * `Tree` (2): a directory listing of names, modes, and hashes.
/// * `Blob` (3): raw file content.
/// * `Tag` (4): an annotated tag pointing at another object.
/// * `OffsetDelta` (6): delta whose base is addressed by a negative offset
///   within the same pack.
/// * `RefDelta` (7): delta whose base is addressed by hash.
///
/// Type 5 is reserved by the pack format and never produced.
#[derive(PartialEq, Eq, Hash, Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    Commit = 1,
    Tree,
    Blob,
    Tag,
    OffsetDelta = 6,
    RefDelta,
}

const COMMIT_OBJECT_TYPE: &[u8] = b"commit";
const TREE_OBJECT_TYPE: &[u8] = b"tree";
const BLOB_OBJECT_TYPE: &[u8] = b"blob";
const TAG_OBJECT_TYPE: &[u8] = b"tag";

impl Display for ObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ObjectType::Commit => write!(f, "commit"),
            ObjectType::Tree => write!(f, "tree"),
            ObjectType::Blob => write!(f, "blob"),
            ObjectType::Tag => write!(f, "tag"),
            ObjectType::OffsetDelta => write!(f, "ofs-delta"),
            ObjectType::RefDelta => write!(f, "ref-delta"),
        }
    }
}

impl ObjectType {
    /// The ASCII name used in loose-object headers and the object-id
    /// formula. Delta types have no such name.
    pub fn to_bytes(&self) -> &'static [u8] {
        match self {
            ObjectType::Commit => COMMIT_OBJECT_TYPE,
            ObjectType::Tree => TREE_OBJECT_TYPE,
            ObjectType::Blob => BLOB_OBJECT_TYPE,
            ObjectType::Tag => TAG_OBJECT_TYPE,
            ObjectType::OffsetDelta | ObjectType::RefDelta => {
                unreachable!("delta types never appear in object headers")
            }
        }
    }

    /// Parse a loose-object header type name.
    pub fn from_type_name(s: &str) -> Result<ObjectType, GitError> {
        match s {
            "commit" => Ok(ObjectType::Commit),
            "tree" => Ok(ObjectType::Tree),
            "blob" => Ok(ObjectType::Blob),
            "tag" => Ok(ObjectType::Tag),
            _ => Err(GitError::InvalidObjectType(s.to_string())),
        }
    }

    /// Decode the 3-bit pack header type id.
    pub fn from_pack_type_u8(number: u8) -> Result<ObjectType, GitError> {
        match number {
            1 => Ok(ObjectType::Commit),
            2 => Ok(ObjectType::Tree),
            3 => Ok(ObjectType::Blob),
            4 => Ok(ObjectType::Tag),
            6 => Ok(ObjectType::OffsetDelta),
            7 => Ok(ObjectType::RefDelta),
            _ => Err(GitError::InvalidObjectType(format!(
                "Invalid pack object type number: {number}"
            ))),
        }
    }

    /// Encode into the 3-bit pack header type id.
    pub fn to_pack_type_u8(&self) -> u8 {
        match self {
            ObjectType::Commit => 1,
            ObjectType::Tree => 2,
            ObjectType::Blob => 3,
            ObjectType::Tag => 4,
            ObjectType::OffsetDelta => 6,
            ObjectType::RefDelta => 7,
        }
    }

    /// Base object types carry their own bytes; delta types reference
    /// another entry.
    pub fn is_base(&self) -> bool {
        !matches!(self, ObjectType::OffsetDelta | ObjectType::RefDelta)
    }
}

#[cfg(test)]
mod tests {
    use super::ObjectType;

    /// Verify type-name round trips for the four base types.
    #[test]
    fn test_type_names() {
        for (name, ty) in [
            ("commit", ObjectType::Commit),
            ("tree", ObjectType::Tree),
            ("blob", ObjectType::Blob),
            ("tag", ObjectType::Tag),
        ] {
            assert_eq!(ObjectType::from_type_name(name).unwrap(), ty);
            assert_eq!(ty.to_bytes(), name.as_bytes());
        }
        assert!(ObjectType::from_type_name("invalid_type").is_err());
    }

    /// Pack type ids: 1..4 base, 6/7 delta, 5 reserved.
    #[test]
    fn test_pack_type_codes() {
        assert_eq!(ObjectType::from_pack_type_u8(1).unwrap(), ObjectType::Commit);
        assert_eq!(
            ObjectType::from_pack_type_u8(6).unwrap(),
            ObjectType::OffsetDelta
        );
        assert_eq!(ObjectType::from_pack_type_u8(7).unwrap(), ObjectType::RefDelta);
        assert!(ObjectType::from_pack_type_u8(5).is_err());
        assert!(ObjectType::from_pack_type_u8(0).is_err());

        assert!(ObjectType::Commit.is_base());
        assert!(!ObjectType::RefDelta.is_base());
        assert_eq!(ObjectType::Tag.to_pack_type_u8(), 4);
    }
}
