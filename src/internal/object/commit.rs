//! The Commit object records a snapshot of the project: the root tree, the
//! parent commits it was based on, who authored and committed it, and the
//! message. The first parent is the primary parent (the branch the commit
//! was made on); merge commits carry more than one.

use std::fmt::Display;
use std::str::FromStr;

use bstr::ByteSlice;
use serde::{Deserialize, Serialize};

use crate::{
    errors::GitError,
    hash::ObjectHash,
    internal::object::{ObjectTrait, signature::Signature, types::ObjectType},
};

/// A decoded commit object.
///
/// The message is kept verbatim: LF-separated, no trimming. `gpgsig` and
/// other unrecognised headers (including their continuation lines) are
/// skipped during decoding and are not retained.
#[derive(Eq, Debug, Clone, Serialize, Deserialize)]
pub struct Commit {
    pub id: ObjectHash,
    pub tree_id: ObjectHash,
    pub parent_ids: Vec<ObjectHash>,
    pub author: Signature,
    pub committer: Signature,
    pub message: String,
}

impl PartialEq for Commit {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Display for Commit {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        writeln!(f, "tree {}", self.tree_id)?;
        for parent in self.parent_ids.iter() {
            writeln!(f, "parent {parent}")?;
        }
        writeln!(f, "author {}", self.author)?;
        writeln!(f, "committer {}", self.committer)?;
        writeln!(f)?;
        write!(f, "{}", self.message)
    }
}

impl Commit {
    /// The primary parent: first entry of the parent list, if any.
    pub fn primary_parent(&self) -> Option<ObjectHash> {
        self.parent_ids.first().copied()
    }

    /// Message text up to the first blank line.
    pub fn subject(&self) -> &str {
        match self.message.find("\n\n") {
            Some(end) => &self.message[..end],
            None => self.message.trim_end_matches('\n'),
        }
    }

    /// Message text after the first blank line, if present.
    pub fn body(&self) -> Option<&str> {
        self.message.find("\n\n").map(|end| &self.message[end + 2..])
    }
}

impl ObjectTrait for Commit {
    fn from_bytes(data: &[u8], hash: ObjectHash) -> Result<Self, GitError> {
        let mut tree_id = None;
        let mut parent_ids = Vec::new();
        let mut author = None;
        let mut committer = None;

        let mut pos = 0;
        while pos < data.len() {
            let line_end = data[pos..]
                .find_byte(b'\n')
                .map(|i| pos + i)
                .unwrap_or(data.len());
            let line = &data[pos..line_end];
            pos = (line_end + 1).min(data.len() + 1);

            if line.is_empty() {
                // Blank line: the rest is the message.
                break;
            }
            if line[0] == b' ' {
                // Continuation of a multi-line header (gpgsig blocks).
                continue;
            }
            if let Some(rest) = line.strip_prefix(b"tree ") {
                tree_id = Some(parse_header_hash(rest)?);
            } else if let Some(rest) = line.strip_prefix(b"parent ") {
                parent_ids.push(parse_header_hash(rest)?);
            } else if line.starts_with(b"author ") {
                author = Some(Signature::from_data(line.to_vec())?);
            } else if line.starts_with(b"committer ") {
                committer = Some(Signature::from_data(line.to_vec())?);
            }
            // Unknown headers (gpgsig, encoding, mergetag, ...) are skipped.
        }

        let message = if pos <= data.len() {
            String::from_utf8_lossy(&data[pos.min(data.len())..]).into_owned()
        } else {
            String::new()
        };

        Ok(Commit {
            id: hash,
            tree_id: tree_id
                .ok_or_else(|| GitError::InvalidCommitObject("missing tree header".into()))?,
            parent_ids,
            author: author
                .ok_or_else(|| GitError::InvalidCommitObject("missing author header".into()))?,
            committer: committer
                .ok_or_else(|| GitError::InvalidCommitObject("missing committer header".into()))?,
            message,
        })
    }

    fn get_type(&self) -> ObjectType {
        ObjectType::Commit
    }

    fn to_data(&self) -> Result<Vec<u8>, GitError> {
        let mut data = Vec::new();
        data.extend(b"tree ");
        data.extend(self.tree_id.to_string().as_bytes());
        data.push(b'\n');
        for parent in &self.parent_ids {
            data.extend(b"parent ");
            data.extend(parent.to_string().as_bytes());
            data.push(b'\n');
        }
        data.extend(self.author.to_data()?);
        data.push(b'\n');
        data.extend(self.committer.to_data()?);
        data.push(b'\n');
        data.push(b'\n');
        data.extend(self.message.as_bytes());
        Ok(data)
    }
}

fn parse_header_hash(rest: &[u8]) -> Result<ObjectHash, GitError> {
    let text = rest
        .to_str()
        .map_err(|_| GitError::InvalidCommitObject("non UTF-8 hash header".into()))?;
    ObjectHash::from_str(text)
}
