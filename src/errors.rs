//! Error types for the git-reader crate.
//!
//! This module defines a unified error enumeration used across object
//! parsing, pack reading, reference resolution, index handling, and the
//! working-directory scanner. It integrates with `thiserror` to provide
//! rich `Display` implementations and error source chaining.
//!
//! Notes:
//! - Each variant carries contextual details via its message payload.
//! - [`GitError::kind`] collapses the granular variants onto the six
//!   user-visible error kinds the public API guarantees.

use thiserror::Error;

/// Coarse classification of a [`GitError`].
///
/// Every operation either returns a complete value, returns "absent" where
/// the API is documented as optional, or fails with exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A loose object, pack entry, reference, or submodule path is absent.
    NotFound,
    /// Structural defect in an object header, zlib header, pack header,
    /// delta stream, index file, tree body, or signature line.
    MalformedObject,
    /// Hex parse failure for a 40-character hash input.
    InvalidHash,
    /// Caller supplied an empty or semantically invalid argument.
    InvalidArgument,
    /// Underlying filesystem error not recoverable by the retry policy.
    Io,
    /// The cancellation token fired.
    Cancelled,
}

#[derive(Error, Debug)]
/// Unified error enumeration for the git-reader library.
pub enum GitError {
    /// Object missing from the loose store and every pack.
    #[error("Can't find specific object: {0}")]
    ObjectNotFound(String),

    /// Reference could not be resolved to a hash.
    #[error("Can't find reference: {0}")]
    RefNotFound(String),

    /// Submodule path has no registered git directory.
    #[error("Can't find submodule repository for path: {0}")]
    SubmoduleNotFound(String),

    /// Invalid or unsupported git object type name.
    #[error("The `{0}` is not a valid git object type.")]
    InvalidObjectType(String),

    /// Malformed loose object header (`<type> <length>\0`).
    #[error("The `{0}` is not a valid loose object header.")]
    InvalidObjectHeader(String),

    /// Malformed or truncated zlib stream, including the 2-byte header.
    #[error("Invalid zlib stream: {0}")]
    InvalidZlibStream(String),

    /// Invalid pack header magic or version.
    #[error("The `{0}` is not a valid pack header.")]
    InvalidPackHeader(String),

    /// Malformed or unsupported pack index (.idx) file.
    #[error("The `{0}` is not a valid idx file.")]
    InvalidIdxFile(String),

    /// Malformed or unsupported git index (staging area) file.
    #[error("The `{0}` is not a valid index file.")]
    InvalidIndexFile(String),

    /// Malformed tree object body.
    #[error("The `{0}` is not a valid git tree item.")]
    InvalidTreeItem(String),

    /// Malformed commit object.
    #[error("Invalid commit: {0}")]
    InvalidCommitObject(String),

    /// Malformed tag object.
    #[error("Not a valid git tag object: {0}")]
    InvalidTagObject(String),

    /// Malformed author/committer/tagger line.
    #[error("The `{0}` is not a valid git signature.")]
    InvalidSignature(String),

    /// Malformed packed-refs, FETCH_HEAD, or reflog line.
    #[error("Invalid reference data: {0}")]
    InvalidRefData(String),

    /// Delta object reconstruction error.
    #[error("Delta object error: {0}")]
    DeltaObjectError(String),

    /// Object materialised from the store does not hash to the requested id.
    #[error("Object `{0}` does not match its recorded hash")]
    HashMismatch(String),

    /// Invalid SHA-1 hash formatting or value.
    #[error("The `{0}` is not a valid hash value.")]
    InvalidHashValue(String),

    /// Invalid function argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// I/O error from the underlying filesystem.
    #[error("IO Error: {0}")]
    IOError(#[from] std::io::Error),

    /// The operation was cancelled through its cancellation token.
    #[error("The operation was cancelled.")]
    Cancelled,
}

impl GitError {
    /// Classify this error onto the coarse user-visible [`ErrorKind`].
    pub fn kind(&self) -> ErrorKind {
        match self {
            GitError::ObjectNotFound(_)
            | GitError::RefNotFound(_)
            | GitError::SubmoduleNotFound(_) => ErrorKind::NotFound,
            GitError::InvalidObjectType(_)
            | GitError::InvalidObjectHeader(_)
            | GitError::InvalidZlibStream(_)
            | GitError::InvalidPackHeader(_)
            | GitError::InvalidIdxFile(_)
            | GitError::InvalidIndexFile(_)
            | GitError::InvalidTreeItem(_)
            | GitError::InvalidCommitObject(_)
            | GitError::InvalidTagObject(_)
            | GitError::InvalidSignature(_)
            | GitError::InvalidRefData(_)
            | GitError::DeltaObjectError(_)
            | GitError::HashMismatch(_) => ErrorKind::MalformedObject,
            GitError::InvalidHashValue(_) => ErrorKind::InvalidHash,
            GitError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            GitError::IOError(_) => ErrorKind::Io,
            GitError::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// True when the error means "the thing does not exist" rather than a
    /// structural or environmental failure.
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

#[cfg(test)]
mod tests {
    use super::{ErrorKind, GitError};

    /// Each granular variant must collapse onto its documented kind.
    #[test]
    fn kinds_cover_taxonomy() {
        assert_eq!(
            GitError::ObjectNotFound("x".into()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            GitError::InvalidZlibStream("bad header".into()).kind(),
            ErrorKind::MalformedObject
        );
        assert_eq!(
            GitError::InvalidHashValue("zz".into()).kind(),
            ErrorKind::InvalidHash
        );
        assert_eq!(GitError::Cancelled.kind(), ErrorKind::Cancelled);
        assert!(GitError::RefNotFound("refs/heads/gone".into()).is_not_found());
        assert!(!GitError::Cancelled.is_not_found());
    }

    /// IO errors convert through `#[from]` and classify as Io.
    #[test]
    fn io_error_conversion() {
        let io = std::io::Error::other("disk fell off");
        let err: GitError = io.into();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
