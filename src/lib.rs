//! git-reader is a read-only library for on-disk Git repositories: it
//! locates, decodes, and presents repository objects (branches, tags,
//! commits, trees, blobs, reflogs, the index, stashes, worktrees, and
//! working-directory status) exactly as Git itself would interpret them,
//! without invoking an external `git` process and without linking a native
//! library.
//!
//! Two API layers are exposed:
//!
//! - [`repository::Repository`]: the primitive facade. Thin, stateless
//!   operations returning plain record types.
//! - [`structured::StructuredRepository`]: a lazily navigated graph with
//!   memoised branch/tag/head views.
//!
//! All externally visible operations are `async` and safe to invoke from
//! any thread; cancellation is available through the token carried in
//! [`repository::OpenOptions`].

pub mod errors;
pub mod fs;
pub mod glob;
pub mod hash;
pub mod internal;
pub mod repository;
pub mod structured;
pub mod sync;
pub mod utils;

pub use errors::{ErrorKind, GitError};
pub use hash::ObjectHash;
pub use internal::object::{
    blob::Blob,
    commit::Commit,
    signature::{Signature, SignatureKind},
    tag::Tag,
    tree::{Tree, TreeItem, TreeItemMode},
    types::ObjectType,
};
pub use repository::{
    OpenOptions, Repository,
    refs::{FetchHead, Head, Reference, TagReference},
    reflog::ReflogEntry,
    stash::Stash,
    status::{FileStatus, StatusOptions, WorkingDirectoryStatus, WorkingFile},
    worktree::{Worktree, WorktreeStatus},
};
pub use structured::{Branch, StructuredRepository};
