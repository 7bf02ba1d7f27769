//! Loose object reading: `objects/<xx>/<38-hex>` files holding one
//! zlib-compressed object with a `"<type> <length>\0"` header.

use std::path::PathBuf;

use bstr::ByteSlice;

use crate::{
    errors::GitError,
    fs,
    hash::ObjectHash,
    internal::{object::types::ObjectType, zlib::inflate_all},
};

/// Reader over a repository's fan-out loose object directory.
#[derive(Debug)]
pub struct LooseReader {
    objects_dir: PathBuf,
}

/// A loose object split into its parts. The declared length is advisory;
/// the body is whatever the zlib stream actually contained.
#[derive(Debug)]
pub struct LooseObject {
    pub obj_type: ObjectType,
    pub declared_len: usize,
    pub data: Vec<u8>,
}

impl LooseReader {
    pub fn new(objects_dir: PathBuf) -> LooseReader {
        LooseReader { objects_dir }
    }

    fn path_for(&self, hash: &ObjectHash) -> PathBuf {
        let hex = hash.to_string();
        self.objects_dir.join(&hex[..2]).join(&hex[2..])
    }

    /// Read and inflate the loose object for `hash`, or `None` when no file
    /// exists at the fan-out path.
    pub async fn read(&self, hash: &ObjectHash) -> Result<Option<LooseObject>, GitError> {
        let path = self.path_for(hash);
        let Some(compressed) = fs::read_optional(&path).await? else {
            return Ok(None);
        };

        let inflated = inflate_all(&compressed, 4096)?;
        let header_end = inflated.find_byte(0).ok_or_else(|| {
            GitError::InvalidObjectHeader(format!("{hash}: no header terminator"))
        })?;
        let header = inflated[..header_end]
            .to_str()
            .map_err(|_| GitError::InvalidObjectHeader(format!("{hash}: non-ASCII header")))?;

        let (type_name, len_text) = header
            .split_once(' ')
            .ok_or_else(|| GitError::InvalidObjectHeader(header.to_string()))?;
        let obj_type = ObjectType::from_type_name(type_name)?;
        let declared_len: usize = len_text
            .parse()
            .map_err(|_| GitError::InvalidObjectHeader(header.to_string()))?;

        Ok(Some(LooseObject {
            obj_type,
            declared_len,
            data: inflated[header_end + 1..].to_vec(),
        }))
    }
}
