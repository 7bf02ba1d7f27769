//! The primitive repository facade: a thin, stateless API over the object
//! store and reference readers, returning plain record types.
//!
//! A [`Repository`] handle owns the object accessor, the file-stream cache,
//! and the reference data read once at open (`packed-refs`, `FETCH_HEAD`,
//! remote URLs from `config`). Those three reads run concurrently. All
//! value records returned from the facade are by-value snapshots that do
//! not pin the repository.

pub mod config;
pub mod reflog;
pub mod refs;
pub mod stash;
pub mod status;
pub mod submodule;
pub mod worktree;

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use path_absolutize::Absolutize;

use crate::{
    errors::GitError,
    fs::{self, FileStreamCache},
    hash::ObjectHash,
    internal::{
        index::{IndexEntry, parse_index},
        object::{
            ObjectTrait,
            commit::Commit,
            tag::Tag,
            tree::Tree,
            types::ObjectType,
        },
        odb::{ObjectAccessor, RawObject},
    },
    sync::CancellationToken,
};

use refs::{FetchHead, Head, PackedRefs, RefReader, Reference, TagReference};
use reflog::ReflogEntry;
use stash::Stash;

/// Nested annotated tags deeper than this are treated as malformed.
const MAX_TAG_NESTING: usize = 10;

/// Options applied when opening a repository.
#[derive(Clone)]
pub struct OpenOptions {
    /// Cancellation token observed at suspension points by every operation
    /// on the handle.
    pub cancel: CancellationToken,
    /// Recompute and check the object id of every object materialised by
    /// hash (verifier mode).
    pub verify_objects: bool,
    /// Fan-out bound for index hashing and working-directory scans.
    pub concurrency: usize,
}

impl Default for OpenOptions {
    fn default() -> Self {
        OpenOptions {
            cancel: CancellationToken::new(),
            verify_objects: false,
            concurrency: 8,
        }
    }
}

/// A read-only handle onto one on-disk repository.
#[derive(Debug)]
pub struct Repository {
    /// This checkout's git directory (for linked worktrees this is
    /// `worktrees/<name>` under the main git directory).
    pub(crate) git_dir: PathBuf,
    /// Where `objects/`, `refs/`, and `packed-refs` live (equal to
    /// `git_dir` except for linked worktrees).
    pub(crate) common_dir: PathBuf,
    pub(crate) work_dir: Option<PathBuf>,
    pub(crate) streams: Arc<FileStreamCache>,
    pub(crate) odb: ObjectAccessor,
    pub(crate) packed_refs: PackedRefs,
    pub(crate) fetch_heads: Vec<FetchHead>,
    pub(crate) remotes: HashMap<String, String>,
    pub(crate) cancel: CancellationToken,
    pub(crate) concurrency: usize,
}

impl Repository {
    /// Open the repository at `path` with default options.
    ///
    /// `path` may be a working directory containing `.git` (directory or
    /// `gitdir:` redirect file), a bare repository, or a git directory
    /// itself.
    pub async fn open(path: impl AsRef<Path>) -> Result<Repository, GitError> {
        Self::open_with(path, OpenOptions::default()).await
    }

    /// Open with explicit [`OpenOptions`].
    pub async fn open_with(
        path: impl AsRef<Path>,
        options: OpenOptions,
    ) -> Result<Repository, GitError> {
        let (git_dir, work_dir) = discover(path.as_ref()).await?;
        Self::from_dirs(git_dir, work_dir, options).await
    }

    /// Build a handle from an already-located git directory.
    pub(crate) async fn from_dirs(
        git_dir: PathBuf,
        work_dir: Option<PathBuf>,
        options: OpenOptions,
    ) -> Result<Repository, GitError> {
        // Linked worktrees point back at the main git directory.
        let common_dir = match fs::read_text_optional(&git_dir.join("commondir")).await? {
            Some(text) => git_dir
                .join(text.trim())
                .absolutize()
                .map(|p| p.into_owned())
                .unwrap_or_else(|_| git_dir.clone()),
            None => git_dir.clone(),
        };

        let streams = FileStreamCache::new();
        let odb = ObjectAccessor::new(
            common_dir.join("objects"),
            streams.clone(),
            options.cancel.clone(),
            options.verify_objects,
        );

        // packed-refs, FETCH_HEAD, and config are read once, concurrently.
        let (packed_text, fetch_text, config_text) = crate::sync::join3(
            fs::read_text_optional(&common_dir.join("packed-refs")),
            fs::read_text_optional(&git_dir.join("FETCH_HEAD")),
            fs::read_text_optional(&common_dir.join("config")),
        )
        .await?;

        let packed_refs = match packed_text {
            Some(text) => PackedRefs::parse(&text)?,
            None => PackedRefs::default(),
        };
        let fetch_heads = match fetch_text {
            Some(text) => refs::parse_fetch_head(&text)?,
            None => Vec::new(),
        };
        let remotes = config_text
            .map(|text| config::parse_remote_urls(&text))
            .unwrap_or_default();

        Ok(Repository {
            git_dir,
            common_dir,
            work_dir,
            streams,
            odb,
            packed_refs,
            fetch_heads,
            remotes,
            cancel: options.cancel,
            concurrency: options.concurrency.max(1),
        })
    }

    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    pub fn work_dir(&self) -> Option<&Path> {
        self.work_dir.as_deref()
    }

    /// Remote name → URL, from `config`.
    pub fn remote_urls(&self) -> &HashMap<String, String> {
        &self.remotes
    }

    /// Entries of `FETCH_HEAD`, as read at open.
    pub fn fetch_heads(&self) -> &[FetchHead] {
        &self.fetch_heads
    }

    pub(crate) fn ensure_alive(&self) -> Result<(), GitError> {
        if self.cancel.is_cancelled() {
            Err(GitError::Cancelled)
        } else {
            Ok(())
        }
    }

    pub(crate) fn ref_reader(&self) -> RefReader<'_> {
        RefReader {
            base_dir: &self.common_dir,
            packed: &self.packed_refs,
        }
    }

    /// Where `HEAD` points, or `None` for an unborn branch.
    pub async fn head(&self) -> Result<Option<Head>, GitError> {
        self.ensure_alive()?;
        let Some(text) = fs::read_text_optional(&self.git_dir.join("HEAD")).await? else {
            return Ok(None);
        };
        let line = text.lines().next().unwrap_or("").trim();
        if let Some(target) = line.strip_prefix("ref: ") {
            let relative_path = target.trim().to_string();
            let Some(resolution) = self.ref_reader().read_hash(&relative_path).await? else {
                // The branch has no commits yet.
                return Ok(None);
            };
            return Ok(Some(Head::Symbolic {
                reference: Reference {
                    name: short_ref_name(&relative_path).to_string(),
                    relative_path,
                    target: resolution.hash,
                },
            }));
        }
        Ok(Some(Head::Detached {
            target: line.parse()?,
        }))
    }

    /// All local branches, sorted by name.
    pub async fn branches(&self) -> Result<Vec<Reference>, GitError> {
        self.ensure_alive()?;
        self.ref_reader().enumerate("heads").await
    }

    /// One local branch by short name.
    pub async fn branch(&self, name: &str) -> Result<Reference, GitError> {
        self.find_branch(name)
            .await?
            .ok_or_else(|| GitError::RefNotFound(format!("refs/heads/{name}")))
    }

    /// One local branch by short name, absent when it does not exist.
    pub async fn find_branch(&self, name: &str) -> Result<Option<Reference>, GitError> {
        self.ensure_alive()?;
        if name.is_empty() {
            return Err(GitError::InvalidArgument("empty branch name".into()));
        }
        let relative_path = format!("refs/heads/{name}");
        Ok(self
            .ref_reader()
            .read_hash(&relative_path)
            .await?
            .map(|resolution| Reference {
                name: name.to_string(),
                relative_path,
                target: resolution.hash,
            }))
    }

    /// Remote-tracking branches (`refs/remotes/**`) plus named entries of
    /// `FETCH_HEAD` whose URL matches a configured remote, sorted by name.
    pub async fn remote_branches(&self) -> Result<Vec<Reference>, GitError> {
        self.ensure_alive()?;
        let mut references = self.ref_reader().enumerate("remotes").await?;

        for entry in &self.fetch_heads {
            let Some(branch) = &entry.branch else {
                continue;
            };
            let Some(remote) = entry.url.as_ref().and_then(|url| {
                self.remotes
                    .iter()
                    .find(|(_, candidate)| *candidate == url)
                    .map(|(name, _)| name.clone())
            }) else {
                continue;
            };
            let name = format!("{remote}/{branch}");
            if references.iter().any(|existing| existing.name == name) {
                continue;
            }
            references.push(Reference {
                relative_path: format!("refs/remotes/{name}"),
                name,
                target: entry.target,
            });
        }
        references.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(references)
    }

    /// All tags, sorted by name, carrying peeled hashes from `packed-refs`.
    pub async fn tags(&self) -> Result<Vec<TagReference>, GitError> {
        self.ensure_alive()?;
        let references = self.ref_reader().enumerate("tags").await?;
        Ok(references
            .into_iter()
            .map(|reference| {
                let peeled = self.packed_refs.peeled.get(&reference.relative_path).copied();
                TagReference {
                    name: reference.name,
                    relative_path: reference.relative_path,
                    target: reference.target,
                    peeled,
                }
            })
            .collect())
    }

    /// One tag by name, absent when it does not exist.
    pub async fn find_tag(&self, name: &str) -> Result<Option<TagReference>, GitError> {
        self.ensure_alive()?;
        if name.is_empty() {
            return Err(GitError::InvalidArgument("empty tag name".into()));
        }
        let relative_path = format!("refs/tags/{name}");
        Ok(self
            .ref_reader()
            .read_hash(&relative_path)
            .await?
            .map(|resolution| TagReference {
                name: name.to_string(),
                peeled: self.packed_refs.peeled.get(&relative_path).copied(),
                relative_path,
                target: resolution.hash,
            }))
    }

    pub(crate) async fn open_raw(&self, hash: &ObjectHash) -> Result<Option<RawObject>, GitError> {
        self.ensure_alive()?;
        self.odb.open(hash).await
    }

    async fn open_expected(
        &self,
        hash: &ObjectHash,
        expected: ObjectType,
    ) -> Result<Option<RawObject>, GitError> {
        let Some(raw) = self.open_raw(hash).await? else {
            return Ok(None);
        };
        if raw.obj_type != expected {
            return Err(GitError::InvalidArgument(format!(
                "object {hash} is a {}, expected {expected}",
                raw.obj_type
            )));
        }
        Ok(Some(raw))
    }

    /// Decode the commit for `hash`; fails with `NotFound` when absent.
    pub async fn get_commit(&self, hash: ObjectHash) -> Result<Commit, GitError> {
        self.find_commit(hash)
            .await?
            .ok_or_else(|| GitError::ObjectNotFound(hash.to_string()))
    }

    /// Decode the commit for `hash`, absent when not in the store.
    pub async fn find_commit(&self, hash: ObjectHash) -> Result<Option<Commit>, GitError> {
        match self.open_expected(&hash, ObjectType::Commit).await? {
            Some(raw) => Ok(Some(Commit::from_bytes(&raw.data, hash)?)),
            None => Ok(None),
        }
    }

    /// Decode the tree for `hash`; fails with `NotFound` when absent.
    pub async fn get_tree(&self, hash: ObjectHash) -> Result<Tree, GitError> {
        match self.open_expected(&hash, ObjectType::Tree).await? {
            Some(raw) => Tree::from_bytes(&raw.data, hash),
            None => Err(GitError::ObjectNotFound(hash.to_string())),
        }
    }

    /// Raw blob bytes for `hash`; fails with `NotFound` when absent.
    pub async fn read_blob(&self, hash: ObjectHash) -> Result<Vec<u8>, GitError> {
        match self.open_expected(&hash, ObjectType::Blob).await? {
            Some(raw) => Ok(raw.data),
            None => Err(GitError::ObjectNotFound(hash.to_string())),
        }
    }

    /// Materialise the tag record for a tag reference: the annotated tag
    /// object when one exists, a synthesised lightweight record when the
    /// reference points straight at a commit.
    pub async fn get_tag(&self, reference: &TagReference) -> Result<Tag, GitError> {
        let raw = self
            .open_raw(&reference.target)
            .await?
            .ok_or_else(|| GitError::ObjectNotFound(reference.target.to_string()))?;
        match raw.obj_type {
            ObjectType::Tag => Tag::from_bytes(&raw.data, reference.target),
            ObjectType::Commit => Ok(Tag::lightweight(reference.name.clone(), reference.target)),
            other => Err(GitError::InvalidTagObject(format!(
                "tag {} points at a {other}",
                reference.name
            ))),
        }
    }

    /// Resolve a tag reference to its commit. The peeled hash recorded in
    /// `packed-refs` is used when present, skipping the tag object read.
    pub async fn get_tag_commit(&self, reference: &TagReference) -> Result<Commit, GitError> {
        if let Some(peeled) = reference.peeled {
            return self.get_commit(peeled).await;
        }

        let mut target = reference.target;
        for _ in 0..MAX_TAG_NESTING {
            let raw = self
                .open_raw(&target)
                .await?
                .ok_or_else(|| GitError::ObjectNotFound(target.to_string()))?;
            match raw.obj_type {
                ObjectType::Commit => return Commit::from_bytes(&raw.data, target),
                ObjectType::Tag => {
                    target = Tag::from_bytes(&raw.data, target)?.object_id;
                }
                other => {
                    return Err(GitError::InvalidTagObject(format!(
                        "tag {} resolves to a {other}",
                        reference.name
                    )));
                }
            }
        }
        Err(GitError::InvalidTagObject(format!(
            "tag {} nests deeper than {MAX_TAG_NESTING}",
            reference.name
        )))
    }

    /// Read a reflog. `name` is `HEAD`, a full `refs/...` path, or a branch
    /// short name. Entries come back in file order (oldest first).
    pub async fn reflog(&self, name: &str) -> Result<Vec<ReflogEntry>, GitError> {
        self.ensure_alive()?;
        if name.is_empty() {
            return Err(GitError::InvalidArgument("empty reflog name".into()));
        }
        let (base, relative) = if name == "HEAD" {
            (&self.git_dir, name.to_string())
        } else if name.starts_with("refs/") {
            (&self.common_dir, name.to_string())
        } else {
            (&self.common_dir, format!("refs/heads/{name}"))
        };
        match fs::read_text_optional(&base.join("logs").join(&relative)).await? {
            Some(text) => reflog::parse_reflog(&text),
            None => Err(GitError::RefNotFound(format!("logs/{relative}"))),
        }
    }

    /// Stashes recorded in the `refs/stash` reflog, newest first. A
    /// repository without stashes yields an empty list.
    pub async fn stashes(&self) -> Result<Vec<Stash>, GitError> {
        self.ensure_alive()?;
        match fs::read_text_optional(&self.common_dir.join("logs/refs/stash")).await? {
            Some(text) => stash::parse_stashes(&text),
            None => Ok(Vec::new()),
        }
    }

    /// The staging area, in index file order. A repository with no index
    /// file yields an empty list.
    pub async fn index_entries(&self) -> Result<Vec<IndexEntry>, GitError> {
        self.ensure_alive()?;
        match fs::read_optional(&self.git_dir.join("index")).await? {
            Some(bytes) => parse_index(&bytes),
            None => Ok(Vec::new()),
        }
    }
}

impl Drop for Repository {
    fn drop(&mut self) {
        // Closes cached file handles; documented as potentially blocking.
        self.streams.clear();
    }
}

/// Strip the usual ref prefixes down to a display name.
pub(crate) fn short_ref_name(relative_path: &str) -> &str {
    relative_path
        .strip_prefix("refs/heads/")
        .or_else(|| relative_path.strip_prefix("refs/remotes/"))
        .or_else(|| relative_path.strip_prefix("refs/tags/"))
        .unwrap_or(relative_path)
}

/// Locate the git directory and working directory for `path`.
async fn discover(path: &Path) -> Result<(PathBuf, Option<PathBuf>), GitError> {
    let path = path
        .absolutize()
        .map(|p| p.into_owned())
        .map_err(GitError::IOError)?;

    let dot_git = path.join(".git");
    if fs::exists(&dot_git).await {
        let meta = tokio::fs::metadata(&dot_git).await?;
        if meta.is_dir() {
            return Ok((dot_git, Some(path)));
        }
        // A `.git` file redirects to the real git directory (linked
        // worktrees, submodules).
        let text = fs::read_text_optional(&dot_git)
            .await?
            .unwrap_or_default();
        let target = text
            .lines()
            .next()
            .and_then(|line| line.strip_prefix("gitdir:"))
            .map(str::trim)
            .ok_or_else(|| {
                GitError::InvalidArgument(format!("{} is not a gitdir link", dot_git.display()))
            })?;
        let git_dir = path
            .join(target)
            .absolutize()
            .map(|p| p.into_owned())
            .map_err(GitError::IOError)?;
        return Ok((git_dir, Some(path)));
    }

    // `path` may itself be a git directory (bare repository, or `.git`
    // passed directly).
    if fs::exists(&path.join("HEAD")).await && fs::exists(&path.join("objects")).await {
        let work_dir = if path.file_name().is_some_and(|name| name == ".git") {
            path.parent().map(Path::to_path_buf)
        } else {
            None
        };
        return Ok((path, work_dir));
    }

    Err(GitError::InvalidArgument(format!(
        "{} is not a git repository",
        path.display()
    )))
}
