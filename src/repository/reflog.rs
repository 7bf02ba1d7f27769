//! Reflog reading: `logs/HEAD` and `logs/refs/...` journal the movements of
//! a reference. Each line is `<old-hash> <new-hash> <signature>\t<message>`;
//! an all-zero old hash marks the creation of the reference.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{
    errors::GitError,
    hash::ObjectHash,
    internal::object::signature::{Signature, SignatureKind},
};

/// One reference movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReflogEntry {
    pub old: ObjectHash,
    pub new: ObjectHash,
    pub committer: Signature,
    pub message: String,
}

impl ReflogEntry {
    /// True when this entry created the reference.
    pub fn is_creation(&self) -> bool {
        self.old.is_zero()
    }
}

/// Parse a whole reflog file, oldest entry first (file order).
pub fn parse_reflog(text: &str) -> Result<Vec<ReflogEntry>, GitError> {
    let mut entries = Vec::new();
    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }
        let (front, message) = match line.split_once('\t') {
            Some((front, message)) => (front, message.to_string()),
            None => (line, String::new()),
        };

        let (old_hex, rest) = front
            .split_once(' ')
            .ok_or_else(|| GitError::InvalidRefData(line.to_string()))?;
        let (new_hex, person) = rest
            .split_once(' ')
            .ok_or_else(|| GitError::InvalidRefData(line.to_string()))?;

        entries.push(ReflogEntry {
            old: ObjectHash::from_str(old_hex)?,
            new: ObjectHash::from_str(new_hex)?,
            committer: Signature::parse_person(SignatureKind::Committer, person)?,
            message,
        });
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::parse_reflog;

    const ZERO: &str = "0000000000000000000000000000000000000000";
    const A: &str = "1111111111111111111111111111111111111111";
    const B: &str = "2222222222222222222222222222222222222222";

    /// Lines parse into old/new/committer/message; zero old marks creation.
    #[test]
    fn parse_entries() {
        let text = format!(
            "{ZERO} {A} Alice <alice@example.com> 1700000000 +0100\tcommit (initial): start\n\
             {A} {B} Alice <alice@example.com> 1700000500 +0100\tcommit: more work\n"
        );
        let entries = parse_reflog(&text).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].is_creation());
        assert_eq!(entries[0].message, "commit (initial): start");
        assert_eq!(entries[1].committer.name, "Alice");
        assert_eq!(entries[1].committer.when.timestamp(), 1700000500);
        assert!(!entries[1].is_creation());
    }

    /// A line missing its hashes is malformed.
    #[test]
    fn malformed_line_rejected() {
        assert!(parse_reflog("justonehash\tmsg\n").is_err());
    }
}
