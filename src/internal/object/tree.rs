//! The Tree object represents one directory level: an ordered list of
//! (mode, name, hash) entries pointing at blobs, subtrees, symlinks, and
//! submodule commits. The body is a concatenation of
//! `<octal-mode> <name>\0<20 raw hash bytes>` with no separators between
//! entries, ordered bytewise-ascending by name with an implicit `/`
//! appended to directory names when comparing.

use std::fmt::Display;

use bstr::ByteSlice;
use serde::{Deserialize, Serialize};

use crate::{
    errors::GitError,
    hash::{HASH_SIZE, ObjectHash},
    internal::object::{ObjectTrait, types::ObjectType},
};

/// Tagged entry kind decoded from the mode's type nibble.
///
/// * `Tree` (`40000`): a subdirectory.
/// * `Blob` / `BlobExecutable` (`100644` / `100755`): regular files.
/// * `Link` (`120000`): a symbolic link whose blob holds the target path.
/// * `Commit` (`160000`): a submodule (gitlink) pointing at a commit in a
///   nested repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeItemMode {
    Tree,
    Blob,
    BlobExecutable,
    Link,
    Commit,
}

impl TreeItemMode {
    /// Decode the ASCII octal mode as stored in a tree body (no leading
    /// zero). Legacy group-writable blobs (`100664`) decode as `Blob`.
    pub fn from_bytes(mode: &[u8]) -> Result<TreeItemMode, GitError> {
        match mode {
            b"40000" => Ok(TreeItemMode::Tree),
            b"100644" | b"100664" => Ok(TreeItemMode::Blob),
            b"100755" => Ok(TreeItemMode::BlobExecutable),
            b"120000" => Ok(TreeItemMode::Link),
            b"160000" => Ok(TreeItemMode::Commit),
            _ => Err(GitError::InvalidTreeItem(
                String::from_utf8_lossy(mode).into_owned(),
            )),
        }
    }

    /// Canonical octal representation.
    pub fn to_bytes(&self) -> &'static [u8] {
        match self {
            TreeItemMode::Tree => b"40000",
            TreeItemMode::Blob => b"100644",
            TreeItemMode::BlobExecutable => b"100755",
            TreeItemMode::Link => b"120000",
            TreeItemMode::Commit => b"160000",
        }
    }

    pub fn is_tree(&self) -> bool {
        matches!(self, TreeItemMode::Tree)
    }

    pub fn is_submodule(&self) -> bool {
        matches!(self, TreeItemMode::Commit)
    }
}

/// One entry of a tree.
///
/// The name is kept as a `String`; Git itself only guarantees bytes, so
/// non-UTF-8 names decode lossily (the stored raw bytes are preserved for
/// re-encoding).
#[derive(Eq, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeItem {
    pub mode: TreeItemMode,
    pub id: ObjectHash,
    pub name: String,
    raw_name: Vec<u8>,
}

impl TreeItem {
    pub fn new(mode: TreeItemMode, id: ObjectHash, name: impl Into<String>) -> TreeItem {
        let name = name.into();
        let raw_name = name.as_bytes().to_vec();
        TreeItem {
            mode,
            id,
            name,
            raw_name,
        }
    }

    fn from_raw(mode: TreeItemMode, id: ObjectHash, raw_name: Vec<u8>) -> TreeItem {
        TreeItem {
            mode,
            id,
            name: String::from_utf8_lossy(&raw_name).into_owned(),
            raw_name,
        }
    }

    /// The key Git sorts tree entries by: the name bytes, with `/` appended
    /// for directories.
    pub fn sort_key(&self) -> Vec<u8> {
        let mut key = self.raw_name.clone();
        if self.mode.is_tree() {
            key.push(b'/');
        }
        key
    }
}

/// A decoded tree object: the id plus its ordered entries.
#[derive(Eq, Debug, Clone, Serialize, Deserialize)]
pub struct Tree {
    pub id: ObjectHash,
    pub tree_items: Vec<TreeItem>,
}

impl PartialEq for Tree {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Display for Tree {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        for item in &self.tree_items {
            writeln!(
                f,
                "{} {} {}",
                String::from_utf8_lossy(item.mode.to_bytes()),
                item.id,
                item.name
            )?;
        }
        Ok(())
    }
}

impl Tree {
    /// Look up a direct child by name.
    pub fn find(&self, name: &str) -> Option<&TreeItem> {
        self.tree_items.iter().find(|item| item.name == name)
    }

    /// True when entries are in canonical Git order.
    pub fn is_sorted(&self) -> bool {
        self.tree_items
            .windows(2)
            .all(|pair| pair[0].sort_key() <= pair[1].sort_key())
    }
}

impl ObjectTrait for Tree {
    fn from_bytes(data: &[u8], hash: ObjectHash) -> Result<Self, GitError> {
        let mut tree_items = Vec::new();
        let mut rest = data;
        while !rest.is_empty() {
            let space = rest
                .find_byte(b' ')
                .ok_or_else(|| GitError::InvalidTreeItem("missing mode terminator".into()))?;
            let mode = TreeItemMode::from_bytes(&rest[..space])?;
            rest = &rest[space + 1..];

            let nul = rest
                .find_byte(0)
                .ok_or_else(|| GitError::InvalidTreeItem("missing name terminator".into()))?;
            let raw_name = rest[..nul].to_vec();
            rest = &rest[nul + 1..];

            if rest.len() < HASH_SIZE {
                return Err(GitError::InvalidTreeItem("truncated entry hash".into()));
            }
            let id = ObjectHash::from_bytes(&rest[..HASH_SIZE])?;
            rest = &rest[HASH_SIZE..];

            tree_items.push(TreeItem::from_raw(mode, id, raw_name));
        }
        Ok(Tree {
            id: hash,
            tree_items,
        })
    }

    fn get_type(&self) -> ObjectType {
        ObjectType::Tree
    }

    fn to_data(&self) -> Result<Vec<u8>, GitError> {
        let mut data = Vec::new();
        for item in &self.tree_items {
            data.extend(item.mode.to_bytes());
            data.push(b' ');
            data.extend(&item.raw_name);
            data.push(0);
            data.extend(item.id.as_ref());
        }
        Ok(data)
    }
}
