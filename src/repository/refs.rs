//! Reference resolution: loose ref files, symbolic chains, `packed-refs`
//! (with peeled tag hashes), and `FETCH_HEAD`.
//!
//! Precedence follows Git: a loose file at `refs/...` always supersedes a
//! `packed-refs` entry with the same path. `packed-refs` and `FETCH_HEAD`
//! are parsed once at repository open and cached for the handle's lifetime.

use std::{collections::HashMap, path::Path, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{errors::GitError, fs, hash::ObjectHash};

/// Symbolic indirections deeper than this are treated as malformed.
const MAX_SYMBOLIC_DEPTH: usize = 10;

/// A named reference resolved to its target hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    /// Short name (`main`, `origin/main`, `v1.2.3`).
    pub name: String,
    /// Full path under the git directory (`refs/heads/main`).
    pub relative_path: String,
    pub target: ObjectHash,
}

/// A tag reference, optionally carrying the peeled commit hash recorded in
/// `packed-refs` so tag-to-commit resolution can skip the tag object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagReference {
    pub name: String,
    pub relative_path: String,
    pub target: ObjectHash,
    pub peeled: Option<ObjectHash>,
}

/// Where `HEAD` points: at a branch, or directly at a commit (detached).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Head {
    Symbolic { reference: Reference },
    Detached { target: ObjectHash },
}

impl Head {
    pub fn target(&self) -> ObjectHash {
        match self {
            Head::Symbolic { reference } => reference.target,
            Head::Detached { target } => *target,
        }
    }

    /// The branch short name, `None` when detached.
    pub fn branch_name(&self) -> Option<&str> {
        match self {
            Head::Symbolic { reference } => Some(reference.name.as_str()),
            Head::Detached { .. } => None,
        }
    }
}

/// A resolved hash plus the chain of ref paths walked to reach it (the
/// first element is the path the lookup started from).
#[derive(Debug, Clone)]
pub struct RefResolution {
    pub hash: ObjectHash,
    pub chain: Vec<String>,
}

/// Parsed `packed-refs`: path → hash, plus path → peeled commit for
/// annotated tags.
#[derive(Debug, Default, Clone)]
pub struct PackedRefs {
    pub refs: HashMap<String, ObjectHash>,
    pub peeled: HashMap<String, ObjectHash>,
}

impl PackedRefs {
    /// Parse `packed-refs` text. A `^<hash>` line supplies the peeled
    /// commit of the preceding annotated tag; `#` lines are headers.
    pub fn parse(text: &str) -> Result<PackedRefs, GitError> {
        let mut packed = PackedRefs::default();
        let mut last_ref: Option<String> = None;
        for line in text.lines() {
            let line = line.trim_end_matches('\r');
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some(peeled_hex) = line.strip_prefix('^') {
                let path = last_ref.clone().ok_or_else(|| {
                    GitError::InvalidRefData("peeled line without a preceding ref".into())
                })?;
                packed
                    .peeled
                    .insert(path, ObjectHash::from_str(peeled_hex.trim())?);
                continue;
            }
            let (hex, path) = line
                .split_once(' ')
                .ok_or_else(|| GitError::InvalidRefData(line.to_string()))?;
            let hash = ObjectHash::from_str(hex)?;
            let path = path.trim().to_string();
            packed.refs.insert(path.clone(), hash);
            last_ref = Some(path);
        }
        Ok(packed)
    }
}

/// One line of `FETCH_HEAD`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchHead {
    pub target: ObjectHash,
    pub not_for_merge: bool,
    /// Branch name extracted from `branch '<name>' of <url>` descriptions.
    pub branch: Option<String>,
    /// Source URL extracted from the description, used to match a remote.
    pub url: Option<String>,
    pub description: String,
}

/// Parse `FETCH_HEAD`: `<hash>\t<flags>\t<description>` per line.
pub fn parse_fetch_head(text: &str) -> Result<Vec<FetchHead>, GitError> {
    let mut entries = Vec::new();
    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }
        let mut fields = line.splitn(3, '\t');
        let hex = fields
            .next()
            .ok_or_else(|| GitError::InvalidRefData(line.to_string()))?;
        let flags = fields.next().unwrap_or("");
        let description = fields.next().unwrap_or("").to_string();

        let branch = description
            .strip_prefix("branch '")
            .and_then(|rest| rest.split_once('\''))
            .map(|(name, _)| name.to_string());
        let url = description
            .rsplit_once(" of ")
            .map(|(_, url)| url.trim().to_string());

        entries.push(FetchHead {
            target: ObjectHash::from_str(hex.trim())?,
            not_for_merge: flags.contains("not-for-merge"),
            branch,
            url,
            description,
        });
    }
    Ok(entries)
}

/// Reads loose refs under one git directory with packed fallback.
pub(crate) struct RefReader<'a> {
    pub base_dir: &'a Path,
    pub packed: &'a PackedRefs,
}

impl RefReader<'_> {
    /// Resolve a relative ref path to a hash, following `ref: ` symbolic
    /// links and recording the chain of paths walked.
    pub async fn read_hash(&self, relative: &str) -> Result<Option<RefResolution>, GitError> {
        let mut chain = Vec::new();
        let mut current = relative.to_string();
        for _ in 0..MAX_SYMBOLIC_DEPTH {
            chain.push(current.clone());
            match fs::read_text_optional(&self.base_dir.join(&current)).await? {
                Some(text) => {
                    let line = text.lines().next().unwrap_or("").trim();
                    if let Some(target) = line.strip_prefix("ref: ") {
                        current = target.trim().to_string();
                        continue;
                    }
                    return Ok(Some(RefResolution {
                        hash: ObjectHash::from_str(line)?,
                        chain,
                    }));
                }
                None => {
                    return Ok(self.packed.refs.get(&current).map(|hash| RefResolution {
                        hash: *hash,
                        chain,
                    }));
                }
            }
        }
        Err(GitError::InvalidRefData(format!(
            "symbolic chain deeper than {MAX_SYMBOLIC_DEPTH} from {relative}"
        )))
    }

    /// Enumerate references under `refs/<prefix>/`: the recursive loose
    /// walk unioned with matching `packed-refs` entries, loose files taking
    /// precedence. Results are sorted by name.
    pub async fn enumerate(&self, prefix: &str) -> Result<Vec<Reference>, GitError> {
        let base = format!("refs/{prefix}");
        let mut names: Vec<String> = Vec::new();

        let root = self.base_dir.join(&base);
        let mut stack = vec![root.clone()];
        while let Some(dir) = stack.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                Err(err) => return Err(err.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    stack.push(path);
                } else if let Ok(rel) = path.strip_prefix(&root) {
                    names.push(rel.to_string_lossy().replace('\\', "/"));
                }
            }
        }

        for path in self.packed.refs.keys() {
            if let Some(name) = path.strip_prefix(&format!("{base}/")) {
                if !names.iter().any(|existing| existing == name) {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();

        let mut references = Vec::with_capacity(names.len());
        for name in names {
            let relative_path = format!("{base}/{name}");
            if let Some(resolution) = self.read_hash(&relative_path).await? {
                references.push(Reference {
                    name,
                    relative_path,
                    target: resolution.hash,
                });
            }
        }
        Ok(references)
    }
}
