//! The Tag object is an annotated tag: a named, signed-off pointer at
//! another object (almost always a commit) with its own tagger and message.
//! Lightweight tags have no object of their own (the ref file points
//! straight at a commit) and are synthesised by the repository layer with
//! no tagger or message.

use std::fmt::Display;
use std::str::FromStr;

use bstr::ByteSlice;
use serde::{Deserialize, Serialize};

use crate::{
    errors::GitError,
    hash::ObjectHash,
    internal::object::{ObjectTrait, signature::Signature, types::ObjectType},
};

/// A decoded annotated tag, or a synthesised lightweight one.
#[derive(Eq, Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub id: ObjectHash,
    pub object_id: ObjectHash,
    pub object_type: ObjectType,
    pub tag_name: String,
    pub tagger: Option<Signature>,
    pub message: String,
}

impl PartialEq for Tag {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.tag_name == other.tag_name
    }
}

impl Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        writeln!(f, "object {}", self.object_id)?;
        writeln!(f, "type {}", self.object_type)?;
        writeln!(f, "tag {}", self.tag_name)?;
        if let Some(tagger) = &self.tagger {
            writeln!(f, "tagger {tagger}")?;
        }
        writeln!(f)?;
        write!(f, "{}", self.message)
    }
}

impl Tag {
    /// Synthesise a record for a lightweight tag: the ref points straight
    /// at the target, there is no tag object, tagger, or message.
    pub fn lightweight(name: impl Into<String>, target: ObjectHash) -> Tag {
        Tag {
            id: ObjectHash::zero(),
            object_id: target,
            object_type: ObjectType::Commit,
            tag_name: name.into(),
            tagger: None,
            message: String::new(),
        }
    }

    /// True when this record was synthesised rather than read from a tag
    /// object.
    pub fn is_lightweight(&self) -> bool {
        self.id.is_zero()
    }
}

impl ObjectTrait for Tag {
    fn from_bytes(data: &[u8], hash: ObjectHash) -> Result<Self, GitError> {
        let mut object_id = None;
        let mut object_type = None;
        let mut tag_name = None;
        let mut tagger = None;

        let mut pos = 0;
        while pos < data.len() {
            let line_end = data[pos..]
                .find_byte(b'\n')
                .map(|i| pos + i)
                .unwrap_or(data.len());
            let line = &data[pos..line_end];
            pos = line_end + 1;

            if line.is_empty() {
                break;
            }
            if line[0] == b' ' {
                continue;
            }
            if let Some(rest) = line.strip_prefix(b"object ") {
                let text = rest
                    .to_str()
                    .map_err(|_| GitError::InvalidTagObject("non UTF-8 object header".into()))?;
                object_id = Some(ObjectHash::from_str(text)?);
            } else if let Some(rest) = line.strip_prefix(b"type ") {
                let text = rest
                    .to_str()
                    .map_err(|_| GitError::InvalidTagObject("non UTF-8 type header".into()))?;
                object_type = Some(ObjectType::from_type_name(text)?);
            } else if let Some(rest) = line.strip_prefix(b"tag ") {
                tag_name = Some(String::from_utf8_lossy(rest).into_owned());
            } else if line.starts_with(b"tagger ") {
                tagger = Some(Signature::from_data(line.to_vec())?);
            }
        }

        let message = String::from_utf8_lossy(&data[pos.min(data.len())..]).into_owned();

        Ok(Tag {
            id: hash,
            object_id: object_id
                .ok_or_else(|| GitError::InvalidTagObject("missing object header".into()))?,
            object_type: object_type
                .ok_or_else(|| GitError::InvalidTagObject("missing type header".into()))?,
            tag_name: tag_name
                .ok_or_else(|| GitError::InvalidTagObject("missing tag header".into()))?,
            tagger,
            message,
        })
    }

    fn get_type(&self) -> ObjectType {
        ObjectType::Tag
    }

    fn to_data(&self) -> Result<Vec<u8>, GitError> {
        let mut data = Vec::new();
        data.extend(b"object ");
        data.extend(self.object_id.to_string().as_bytes());
        data.push(b'\n');
        data.extend(b"type ");
        data.extend(self.object_type.to_bytes());
        data.push(b'\n');
        data.extend(b"tag ");
        data.extend(self.tag_name.as_bytes());
        data.push(b'\n');
        if let Some(tagger) = &self.tagger {
            data.extend(tagger.to_data()?);
            data.push(b'\n');
        }
        data.push(b'\n');
        data.extend(self.message.as_bytes());
        Ok(data)
    }
}
