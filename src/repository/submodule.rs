//! Submodule opening: a tree entry with the gitlink mode points at a commit
//! in a nested repository whose git directory lives under
//! `modules/<path>/` of the superproject's git directory.

use crate::{
    errors::GitError,
    fs,
    internal::object::tree::TreeItemMode,
    repository::{OpenOptions, Repository},
};

impl Repository {
    /// Open the nested repository behind the submodule at `path` (the
    /// repository-relative tree path of the gitlink entry, e.g.
    /// `libs/vendor`).
    ///
    /// Fails with `InvalidArgument` when the path does not name a gitlink
    /// entry in HEAD's tree, and with `NotFound` when the submodule has no
    /// registered git directory under `modules/`.
    pub async fn open_submodule(&self, path: &str) -> Result<Repository, GitError> {
        self.ensure_alive()?;
        let path = crate::utils::to_repo_slashes(path);
        if path.is_empty() {
            return Err(GitError::InvalidArgument("empty submodule path".into()));
        }

        // Walk HEAD's tree down to the entry the path names.
        let head = self
            .head()
            .await?
            .ok_or_else(|| GitError::RefNotFound("HEAD".into()))?;
        let commit = self.get_commit(head.target()).await?;
        let mut tree = self.get_tree(commit.tree_id).await?;

        let mut segments = path.split('/').peekable();
        let entry_mode = loop {
            let segment = segments.next().expect("path is non-empty");
            let item = tree.find(segment).ok_or_else(|| {
                GitError::InvalidArgument(format!("no tree entry at {path}"))
            })?;
            if segments.peek().is_none() {
                break item.mode;
            }
            if !item.mode.is_tree() {
                return Err(GitError::InvalidArgument(format!(
                    "{segment} in {path} is not a directory"
                )));
            }
            tree = self.get_tree(item.id).await?;
        };

        if entry_mode != TreeItemMode::Commit {
            return Err(GitError::InvalidArgument(format!(
                "{path} is not a submodule entry"
            )));
        }

        // The registered git directory keeps the tree path's segments.
        let mut module_dir = self.common_dir.join("modules");
        for segment in path.split('/') {
            module_dir.push(segment);
        }
        if !fs::exists(&module_dir.join("config")).await {
            return Err(GitError::SubmoduleNotFound(path));
        }

        let work_dir = self
            .work_dir
            .as_ref()
            .map(|work_dir| work_dir.join(path.split('/').collect::<std::path::PathBuf>()));

        Repository::from_dirs(
            module_dir,
            work_dir,
            OpenOptions {
                cancel: self.cancel.clone(),
                ..OpenOptions::default()
            },
        )
        .await
    }
}
