//! The structured facade: a lazily navigated, memoising view over the
//! primitive repository API.
//!
//! Opening resolves the branch, remote-branch, tag, and head views in
//! parallel and freezes them as immutable maps (the same snapshot
//! semantics as the primitive layer). Commits and tags read through the
//! facade are memoised by hash, so re-navigating the graph never re-reads
//! the object store. Unlike primitive records, the facade holds the
//! repository alive: records obtained from it remain usable until the
//! facade itself is dropped.

use std::{collections::HashMap, path::Path, sync::Arc};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::{
    errors::GitError,
    hash::ObjectHash,
    internal::object::{commit::Commit, tag::Tag, tree::Tree},
    repository::{
        OpenOptions, Repository,
        refs::{Head, TagReference},
    },
    sync::join3,
};

/// A branch view: local or remote-tracking, with its head commit hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub name: String,
    pub is_remote: bool,
    pub head: ObjectHash,
}

/// Navigable, memoising repository view.
pub struct StructuredRepository {
    repository: Repository,
    head: Option<Head>,
    branches: HashMap<String, Branch>,
    remote_branches: HashMap<String, Branch>,
    tags: HashMap<String, TagReference>,
    commits: DashMap<ObjectHash, Arc<Commit>>,
    tag_objects: DashMap<String, Arc<Tag>>,
}

impl StructuredRepository {
    /// Open a repository and build the structured views.
    pub async fn open(path: impl AsRef<Path>) -> Result<StructuredRepository, GitError> {
        Self::open_with(path, OpenOptions::default()).await
    }

    /// Open with explicit options.
    pub async fn open_with(
        path: impl AsRef<Path>,
        options: OpenOptions,
    ) -> Result<StructuredRepository, GitError> {
        let repository = Repository::open_with(path, options).await?;

        let head = repository.head().await?;
        let (branches, remote_branches, tags) = join3(
            repository.branches(),
            repository.remote_branches(),
            repository.tags(),
        )
        .await?;

        let branches = branches
            .into_iter()
            .map(|reference| {
                (
                    reference.name.clone(),
                    Branch {
                        name: reference.name,
                        is_remote: false,
                        head: reference.target,
                    },
                )
            })
            .collect();
        let remote_branches = remote_branches
            .into_iter()
            .map(|reference| {
                (
                    reference.name.clone(),
                    Branch {
                        name: reference.name,
                        is_remote: true,
                        head: reference.target,
                    },
                )
            })
            .collect();
        let tags = tags
            .into_iter()
            .map(|tag| (tag.name.clone(), tag))
            .collect();

        Ok(StructuredRepository {
            repository,
            head,
            branches,
            remote_branches,
            tags,
            commits: DashMap::new(),
            tag_objects: DashMap::new(),
        })
    }

    /// The underlying primitive handle.
    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    /// HEAD as captured at open, `None` for an unborn branch.
    pub fn head(&self) -> Option<&Head> {
        self.head.as_ref()
    }

    /// Local branches by name.
    pub fn branches(&self) -> &HashMap<String, Branch> {
        &self.branches
    }

    /// Remote-tracking branches by name.
    pub fn remote_branches(&self) -> &HashMap<String, Branch> {
        &self.remote_branches
    }

    /// Tags by name.
    pub fn tags(&self) -> &HashMap<String, TagReference> {
        &self.tags
    }

    /// Read and memoise the commit for `hash`.
    pub async fn commit(&self, hash: ObjectHash) -> Result<Arc<Commit>, GitError> {
        if let Some(hit) = self.commits.get(&hash) {
            return Ok(hit.clone());
        }
        let commit = Arc::new(self.repository.get_commit(hash).await?);
        self.commits.insert(hash, commit.clone());
        Ok(commit)
    }

    /// The commit HEAD points at, `None` for an unborn branch.
    pub async fn head_commit(&self) -> Result<Option<Arc<Commit>>, GitError> {
        match &self.head {
            Some(head) => Ok(Some(self.commit(head.target()).await?)),
            None => Ok(None),
        }
    }

    /// The decoded head commit of a branch view.
    pub async fn branch_commit(&self, branch: &Branch) -> Result<Arc<Commit>, GitError> {
        self.commit(branch.head).await
    }

    /// Read and memoise the tag record for a tag view (annotated object or
    /// synthesised lightweight record).
    pub async fn tag(&self, reference: &TagReference) -> Result<Arc<Tag>, GitError> {
        if let Some(hit) = self.tag_objects.get(&reference.name) {
            return Ok(hit.clone());
        }
        let tag = Arc::new(self.repository.get_tag(reference).await?);
        self.tag_objects.insert(reference.name.clone(), tag.clone());
        Ok(tag)
    }

    /// Resolve a tag view to its commit. Uses the peeled hash from
    /// `packed-refs` when available, avoiding the tag object read.
    pub async fn tag_commit(&self, reference: &TagReference) -> Result<Arc<Commit>, GitError> {
        if let Some(peeled) = reference.peeled {
            return self.commit(peeled).await;
        }
        let commit = self.repository.get_tag_commit(reference).await?;
        let hash = commit.id;
        let commit = Arc::new(commit);
        self.commits.entry(hash).or_insert_with(|| commit.clone());
        Ok(commit)
    }

    /// Decoded parent commits, primary parent first.
    pub async fn parent_commits(&self, commit: &Commit) -> Result<Vec<Arc<Commit>>, GitError> {
        let mut parents = Vec::with_capacity(commit.parent_ids.len());
        for parent in &commit.parent_ids {
            parents.push(self.commit(*parent).await?);
        }
        Ok(parents)
    }

    /// The root tree of a commit.
    pub async fn commit_tree(&self, commit: &Commit) -> Result<Tree, GitError> {
        self.repository.get_tree(commit.tree_id).await
    }

    /// Branches (local and remote) whose head is exactly `commit`.
    pub fn related_branches(&self, commit: ObjectHash) -> Vec<&Branch> {
        let mut related: Vec<&Branch> = self
            .branches
            .values()
            .chain(self.remote_branches.values())
            .filter(|branch| branch.head == commit)
            .collect();
        related.sort_by(|a, b| (a.is_remote, &a.name).cmp(&(b.is_remote, &b.name)));
        related
    }

    /// Tags whose target (peeled when the tag is annotated) is exactly
    /// `commit`.
    pub async fn related_tags(&self, commit: ObjectHash) -> Result<Vec<&TagReference>, GitError> {
        let mut related = Vec::new();
        for tag in self.tags.values() {
            if tag.target == commit {
                related.push(tag);
                continue;
            }
            let peeled = match tag.peeled {
                Some(peeled) => peeled,
                None => self.tag_commit(tag).await?.id,
            };
            if peeled == commit {
                related.push(tag);
            }
        }
        related.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(related)
    }
}
