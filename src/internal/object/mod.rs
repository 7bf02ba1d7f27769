//! Object model definitions for Git blobs, trees, commits, and tags, and
//! the supporting trait that lets the object database create strongly typed
//! values from raw bytes.

pub mod blob;
pub mod commit;
pub mod signature;
pub mod tag;
pub mod tree;
pub mod types;

use std::fmt::Display;

use crate::{errors::GitError, hash::ObjectHash, internal::object::types::ObjectType};

/// **The Object Trait**
///
/// Common interface for the four base Git object types. Decoders take the
/// undeltified, inflated body (after the `<type> <len>\0` header) together
/// with the object id under which the bytes were found.
pub trait ObjectTrait: Send + Sync + Display {
    /// Create a typed object from its body bytes.
    fn from_bytes(data: &[u8], hash: ObjectHash) -> Result<Self, GitError>
    where
        Self: Sized;

    /// Returns the type of the object.
    fn get_type(&self) -> ObjectType;

    /// Re-encode the body bytes exactly as stored.
    fn to_data(&self) -> Result<Vec<u8>, GitError>;

    /// Computes the object hash from serialized data.
    ///
    /// Default implementation serializes the object and computes the hash
    /// from that data.
    fn object_hash(&self) -> Result<ObjectHash, GitError> {
        let data = self.to_data()?;
        Ok(ObjectHash::from_type_and_data(self.get_type(), &data))
    }
}
