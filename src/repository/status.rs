//! Working-directory status: classify every index entry against HEAD's
//! flattened tree and the blob hash of the file on disk, then enumerate
//! untracked files through the glob evaluator.
//!
//! Hashing streams each file through the Git blob formula
//! (`"blob <len>\0"` + content) with a bounded fan-out, so large checkouts
//! never hold more than `concurrency` files in flight.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use tokio::io::AsyncReadExt;

use crate::{
    errors::GitError,
    fs::{self, BufferPool},
    glob::{self, FilterState, GlobFilter},
    hash::ObjectHash,
    internal::object::tree::TreeItemMode,
    repository::Repository,
    sync::ConcurrentScope,
};

/// Classification of one working-directory file.
///
/// `Renamed` and `Copied` are declared for completeness but never produced:
/// rename/copy detection is not implemented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileStatus {
    Unmodified,
    Added,
    Modified,
    Deleted,
    Renamed,
    Copied,
    Untracked,
    Ignored,
}

/// One classified file with the hashes that justify the classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingFile {
    pub path: String,
    pub status: FileStatus,
    pub index_hash: Option<ObjectHash>,
    pub working_hash: Option<ObjectHash>,
}

/// Options for the status scan.
#[derive(Clone, Default)]
pub struct StatusOptions {
    /// Also report ignored files (as [`FileStatus::Ignored`]).
    pub include_ignored: bool,
    /// Skip the untracked-file enumeration entirely.
    pub skip_untracked: bool,
    /// Extra filter applied after the `.gitignore` chain.
    pub extra_filter: Option<GlobFilter>,
}

/// The three stable-ordered result arrays of a status scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkingDirectoryStatus {
    pub staged: Vec<WorkingFile>,
    pub unstaged: Vec<WorkingFile>,
    pub untracked: Vec<WorkingFile>,
}

impl Repository {
    /// Compute working-directory status with default options.
    pub async fn status(&self) -> Result<WorkingDirectoryStatus, GitError> {
        self.status_with(StatusOptions::default()).await
    }

    /// Compute working-directory status.
    pub async fn status_with(
        &self,
        options: StatusOptions,
    ) -> Result<WorkingDirectoryStatus, GitError> {
        self.ensure_alive()?;
        let work_dir = self
            .work_dir
            .clone()
            .ok_or_else(|| {
                GitError::InvalidArgument("bare repository has no working directory".into())
            })?;

        let index = self.index_entries().await?;
        let head_map = self.flatten_head_tree().await?;
        let scope = ConcurrentScope::new(self.cancel.clone(), self.concurrency);
        let pool = BufferPool::default();

        let hashed = scope
            .run_all(index.iter().map(|entry| {
                let path = work_dir.join(&entry.path);
                let pool = &pool;
                async move { Ok((entry, hash_file_as_blob(&path, pool).await?)) }
            }))
            .await?;

        let mut result = WorkingDirectoryStatus::default();
        for (entry, working) in hashed {
            let head = head_map.get(entry.path.as_str()).copied();
            classify(entry.path.as_str(), entry.hash, head, working, &mut result);
        }

        // Paths staged for deletion: present in HEAD, gone from the index.
        let index_paths: HashSet<&str> =
            index.iter().map(|entry| entry.path.as_str()).collect();
        for path in head_map.keys() {
            if !index_paths.contains(path.as_str()) {
                result.staged.push(WorkingFile {
                    path: path.clone(),
                    status: FileStatus::Deleted,
                    index_hash: None,
                    working_hash: None,
                });
            }
        }

        if !options.skip_untracked {
            self.collect_untracked(&work_dir, &index_paths, &options, &scope, &mut result)
                .await?;
        }

        result.staged.sort_by(|a, b| a.path.cmp(&b.path));
        result.unstaged.sort_by(|a, b| a.path.cmp(&b.path));
        result.untracked.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(result)
    }

    /// Flatten HEAD's tree into `path → blob hash`. Submodule entries are
    /// excluded; nested repositories are read via `open_submodule`.
    pub(crate) async fn flatten_head_tree(
        &self,
    ) -> Result<HashMap<String, ObjectHash>, GitError> {
        let mut map = HashMap::new();
        let Some(head) = self.head().await? else {
            return Ok(map);
        };
        let commit = self.get_commit(head.target()).await?;

        let mut stack = vec![(String::new(), commit.tree_id)];
        while let Some((prefix, tree_id)) = stack.pop() {
            self.ensure_alive()?;
            let tree = self.get_tree(tree_id).await?;
            for item in tree.tree_items {
                let path = if prefix.is_empty() {
                    item.name.clone()
                } else {
                    format!("{prefix}/{}", item.name)
                };
                match item.mode {
                    TreeItemMode::Tree => stack.push((path, item.id)),
                    TreeItemMode::Commit => {}
                    _ => {
                        map.insert(path, item.id);
                    }
                }
            }
        }
        Ok(map)
    }

    async fn collect_untracked(
        &self,
        work_dir: &Path,
        index_paths: &HashSet<&str>,
        options: &StatusOptions,
        scope: &ConcurrentScope,
        result: &mut WorkingDirectoryStatus,
    ) -> Result<(), GitError> {
        // Hierarchical .gitignore chain: each directory may contribute a
        // filter scoped to paths beneath it.
        let mut filters: Vec<(String, GlobFilter)> = Vec::new();
        if let Some(text) =
            fs::read_text_optional(&work_dir.join(".gitignore")).await?
        {
            filters.push((String::new(), glob::gitignore_filter(&text)));
        }
        if let Some(extra) = &options.extra_filter {
            filters.push((String::new(), extra.clone()));
        }

        let mut candidates: Vec<(String, FileStatus)> = Vec::new();
        let mut stack: Vec<(PathBuf, String)> = vec![(work_dir.to_path_buf(), String::new())];
        while let Some((dir, prefix)) = stack.pop() {
            self.ensure_alive()?;
            let mut entries = tokio::fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name().to_string_lossy().into_owned();
                if name == ".git" {
                    continue;
                }
                let rel = if prefix.is_empty() {
                    name.clone()
                } else {
                    format!("{prefix}/{name}")
                };
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    // A nested .gitignore applies below its directory.
                    if let Some(text) =
                        fs::read_text_optional(&entry.path().join(".gitignore")).await?
                    {
                        filters.push((format!("{rel}/"), glob::gitignore_filter(&text)));
                    }
                    stack.push((entry.path(), rel));
                    continue;
                }
                if index_paths.contains(rel.as_str()) {
                    continue;
                }

                let excluded = evaluate_filters(&filters, &rel);
                if excluded {
                    if options.include_ignored {
                        candidates.push((rel, FileStatus::Ignored));
                    }
                } else {
                    candidates.push((rel, FileStatus::Untracked));
                }
            }
        }

        let pool = BufferPool::default();
        let hashed = scope
            .run_all(candidates.into_iter().map(|(rel, status)| {
                let path = work_dir.join(&rel);
                let pool = &pool;
                async move { Ok((rel, status, hash_file_as_blob(&path, pool).await?)) }
            }))
            .await?;
        for (path, status, working_hash) in hashed {
            result.untracked.push(WorkingFile {
                path,
                status,
                index_hash: None,
                working_hash,
            });
        }
        Ok(())
    }
}

/// Thread the accumulating state through every filter whose base directory
/// contains the path, outermost first.
fn evaluate_filters(filters: &[(String, GlobFilter)], path: &str) -> bool {
    let mut state = FilterState::NotExclude;
    for (base, filter) in filters {
        let Some(relative) = path.strip_prefix(base.as_str()) else {
            continue;
        };
        state = filter(state, relative);
    }
    state.is_excluded()
}

/// Classify one index entry given its HEAD and working-tree hashes.
fn classify(
    path: &str,
    index_hash: ObjectHash,
    head: Option<ObjectHash>,
    working: Option<ObjectHash>,
    result: &mut WorkingDirectoryStatus,
) {
    let staged_change = match head {
        None => Some(FileStatus::Added),
        Some(h) if h != index_hash => Some(FileStatus::Modified),
        Some(_) => None,
    };

    match working {
        Some(working_hash) => {
            let staged_record = staged_change.map(|status| WorkingFile {
                path: path.to_string(),
                status,
                index_hash: Some(index_hash),
                working_hash: Some(working_hash),
            });
            if working_hash == index_hash {
                // Clean relative to the index; report only the staged step.
                result.staged.extend(staged_record);
            } else {
                result.staged.extend(staged_record);
                result.unstaged.push(WorkingFile {
                    path: path.to_string(),
                    status: FileStatus::Modified,
                    index_hash: Some(index_hash),
                    working_hash: Some(working_hash),
                });
            }
        }
        None => {
            if let Some(status) = staged_change {
                result.staged.push(WorkingFile {
                    path: path.to_string(),
                    status,
                    index_hash: Some(index_hash),
                    working_hash: None,
                });
            }
            result.unstaged.push(WorkingFile {
                path: path.to_string(),
                status: FileStatus::Deleted,
                index_hash: Some(index_hash),
                working_hash: None,
            });
        }
    }
}

/// Stream a file through the Git blob hash (`"blob <len>\0"` + content),
/// borrowing a scratch buffer from the pool. Returns `None` when the file
/// does not exist.
async fn hash_file_as_blob(path: &Path, pool: &BufferPool) -> Result<Option<ObjectHash>, GitError> {
    let mut file = match tokio::fs::File::open(path).await {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    let len = file.metadata().await?.len();

    let mut hasher = Sha1::new();
    hasher.update(b"blob ");
    hasher.update(len.to_string().as_bytes());
    hasher.update(b"\0");

    let mut buf = pool.take();
    buf.resize(64 * 1024, 0);
    let result = loop {
        match file.read(&mut buf).await {
            Ok(0) => break Ok(()),
            Ok(read) => hasher.update(&buf[..read]),
            Err(err) => break Err(err),
        }
    };
    pool.put(buf);
    result?;

    let digest: [u8; 20] = hasher.finalize().into();
    Ok(Some(ObjectHash(digest)))
}
