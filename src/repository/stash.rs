//! Stash enumeration: Git records stashes as the reflog of `refs/stash`,
//! newest entry last in the file. The reader surfaces them newest first,
//! matching `git stash list` order.

use serde::{Deserialize, Serialize};

use crate::{
    errors::GitError,
    hash::ObjectHash,
    internal::object::signature::Signature,
    repository::reflog::parse_reflog,
};

/// One stash: the stash commit, who created it, and the stash message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stash {
    pub target: ObjectHash,
    pub committer: Signature,
    pub message: String,
}

/// Parse the `logs/refs/stash` reflog into stashes, newest first.
pub fn parse_stashes(text: &str) -> Result<Vec<Stash>, GitError> {
    let mut stashes: Vec<Stash> = parse_reflog(text)?
        .into_iter()
        .map(|entry| Stash {
            target: entry.new,
            committer: entry.committer,
            message: entry.message,
        })
        .collect();
    stashes.reverse();
    Ok(stashes)
}

#[cfg(test)]
mod tests {
    use super::parse_stashes;

    const ZERO: &str = "0000000000000000000000000000000000000000";
    const A: &str = "1111111111111111111111111111111111111111";
    const B: &str = "2222222222222222222222222222222222222222";

    /// Stashes come back newest first with their messages.
    #[test]
    fn newest_first() {
        let text = format!(
            "{ZERO} {A} Bob <b@example.com> 1700000000 +0000\tWIP on main: abc first\n\
             {A} {B} Bob <b@example.com> 1700001000 +0000\tWIP on main: def second\n"
        );
        let stashes = parse_stashes(&text).unwrap();
        assert_eq!(stashes.len(), 2);
        assert_eq!(stashes[0].message, "WIP on main: def second");
        assert_eq!(stashes[0].target.to_string(), B);
        assert_eq!(stashes[1].message, "WIP on main: abc first");
    }
}
