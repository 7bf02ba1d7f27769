//! Worktree enumeration: the primary worktree is synthesised from the
//! repository root, additional ones come from `worktrees/<name>/` under the
//! main git directory (`HEAD` for the head, `gitdir` for the checkout
//! path, `locked` marker for the locked state).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{
    errors::GitError,
    fs,
    hash::ObjectHash,
    repository::{Repository, refs::Head, short_ref_name},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorktreeStatus {
    Normal,
    Locked,
    /// The checkout directory recorded in `gitdir` no longer exists.
    Prunable,
}

/// One checkout sharing the repository's object store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Worktree {
    /// `(main)` for the primary worktree, the directory name otherwise.
    pub name: String,
    pub path: PathBuf,
    pub head: ObjectHash,
    /// Checked-out branch, `None` when detached.
    pub branch: Option<String>,
    pub status: WorktreeStatus,
}

impl Repository {
    /// Enumerate all worktrees, the primary one first.
    pub async fn worktrees(&self) -> Result<Vec<Worktree>, GitError> {
        self.ensure_alive()?;

        let head = self.head().await?;
        let primary_path = match &self.work_dir {
            Some(work_dir) => work_dir.clone(),
            // Bare repository: the spec'd fallback is the git path's parent.
            None => self
                .common_dir
                .parent()
                .map(PathBuf::from)
                .unwrap_or_else(|| self.common_dir.clone()),
        };
        let mut worktrees = vec![Worktree {
            name: "(main)".to_string(),
            path: primary_path,
            head: head.as_ref().map(Head::target).unwrap_or_else(ObjectHash::zero),
            branch: head
                .as_ref()
                .and_then(|h| h.branch_name())
                .map(str::to_string),
            status: WorktreeStatus::Normal,
        }];

        let worktrees_dir = self.common_dir.join("worktrees");
        let mut entries = match tokio::fs::read_dir(&worktrees_dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(worktrees),
            Err(err) => return Err(err.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let dir = entry.path();

            let (head, branch) = self.worktree_head(&dir).await?;

            // `gitdir` holds the path of the `.git` link file inside the
            // checkout; the worktree path is its parent.
            let gitdir_text = fs::read_text_optional(&dir.join("gitdir"))
                .await?
                .unwrap_or_default();
            let gitdir_path = PathBuf::from(gitdir_text.trim());
            let path = gitdir_path
                .parent()
                .map(PathBuf::from)
                .unwrap_or(gitdir_path.clone());

            let status = if fs::exists(&dir.join("locked")).await {
                WorktreeStatus::Locked
            } else if !fs::exists(&gitdir_path).await {
                WorktreeStatus::Prunable
            } else {
                WorktreeStatus::Normal
            };

            worktrees.push(Worktree {
                name,
                path,
                head,
                branch,
                status,
            });
        }

        worktrees[1..].sort_by(|a, b| a.name.cmp(&b.name));
        Ok(worktrees)
    }

    /// Resolve a linked worktree's `HEAD`, which may be symbolic into the
    /// shared ref store or a detached hash.
    async fn worktree_head(
        &self,
        dir: &std::path::Path,
    ) -> Result<(ObjectHash, Option<String>), GitError> {
        let Some(text) = fs::read_text_optional(&dir.join("HEAD")).await? else {
            return Ok((ObjectHash::zero(), None));
        };
        let line = text.lines().next().unwrap_or("").trim();
        if let Some(target) = line.strip_prefix("ref: ") {
            let relative = target.trim();
            let hash = self
                .ref_reader()
                .read_hash(relative)
                .await?
                .map(|resolution| resolution.hash)
                .unwrap_or_else(ObjectHash::zero);
            return Ok((hash, Some(short_ref_name(relative).to_string())));
        }
        Ok((line.parse()?, None))
    }
}
