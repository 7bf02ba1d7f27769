//! Integration tests that build a synthetic repository byte-for-byte
//! (loose objects, a pack with an ofs-delta chain, packed-refs with peeled
//! tags, an index file, worktrees, and a registered submodule) and drive
//! the full read path through both facades.

use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::{Compression, write::ZlibEncoder};
use git_reader::{
    FileStatus, Head, ObjectHash, ObjectType, OpenOptions, Repository, StructuredRepository,
    WorktreeStatus,
    internal::index::encode_index,
};
use sha1::{Digest, Sha1};

const AUTHOR: &str = "author Alice <alice@example.com> 1700000000 +0100";
const COMMITTER: &str = "committer Bob <bob@example.com> 1700000100 +0100";

fn zlib(data: &[u8]) -> Vec<u8> {
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

fn object_hash(type_name: &str, body: &[u8]) -> ObjectHash {
    let mut raw = format!("{type_name} {}\0", body.len()).into_bytes();
    raw.extend(body);
    ObjectHash::new(&raw)
}

/// A synthetic repository under a temp dir: `root/work/.git`.
struct RepoBuilder {
    _dir: tempfile::TempDir,
    work: PathBuf,
    git: PathBuf,
}

impl RepoBuilder {
    fn new() -> RepoBuilder {
        let dir = tempfile::tempdir().unwrap();
        let work = dir.path().join("work");
        let git = work.join(".git");
        for sub in ["objects", "refs/heads", "refs/tags", "refs/remotes"] {
            std::fs::create_dir_all(git.join(sub)).unwrap();
        }
        std::fs::write(git.join("HEAD"), "ref: refs/heads/main\n").unwrap();
        RepoBuilder {
            _dir: dir,
            work,
            git,
        }
    }

    fn write_loose_at(git: &Path, type_name: &str, body: &[u8]) -> ObjectHash {
        let mut raw = format!("{type_name} {}\0", body.len()).into_bytes();
        raw.extend(body);
        let hash = ObjectHash::new(&raw);
        let hex = hash.to_string();
        let fan = git.join("objects").join(&hex[..2]);
        std::fs::create_dir_all(&fan).unwrap();
        std::fs::write(fan.join(&hex[2..]), zlib(&raw)).unwrap();
        hash
    }

    fn write_loose(&self, type_name: &str, body: &[u8]) -> ObjectHash {
        Self::write_loose_at(&self.git, type_name, body)
    }

    fn blob(&self, content: &[u8]) -> ObjectHash {
        self.write_loose("blob", content)
    }

    /// Entries: (octal mode, name, hash). Sorted into canonical git order.
    fn tree(&self, entries: &[(&str, &str, ObjectHash)]) -> ObjectHash {
        let mut entries: Vec<_> = entries.to_vec();
        entries.sort_by_key(|(mode, name, _)| {
            let mut key = name.as_bytes().to_vec();
            if *mode == "40000" {
                key.push(b'/');
            }
            key
        });
        let mut body = Vec::new();
        for (mode, name, hash) in entries {
            body.extend(mode.as_bytes());
            body.push(b' ');
            body.extend(name.as_bytes());
            body.push(0);
            body.extend(hash.as_ref());
        }
        self.write_loose("tree", &body)
    }

    fn commit(&self, tree: ObjectHash, parents: &[ObjectHash], message: &str) -> ObjectHash {
        self.write_loose("commit", &commit_body(tree, parents, message))
    }

    fn annotated_tag(&self, name: &str, target: ObjectHash, message: &str) -> ObjectHash {
        let body = format!(
            "object {target}\ntype commit\ntag {name}\ntagger Tagger <tag@example.com> 1700000200 +0000\n\n{message}\n"
        );
        self.write_loose("tag", body.as_bytes())
    }

    fn write_ref(&self, relative: &str, hash: ObjectHash) {
        let path = self.git.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, format!("{hash}\n")).unwrap();
    }

    fn write_git_file(&self, relative: &str, text: &str) {
        let path = self.git.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, text).unwrap();
    }

    fn write_work_file(&self, relative: &str, content: &[u8]) {
        let path = self.work.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn write_index(&self, rows: &[(&str, ObjectHash, u32)]) {
        let rows: Vec<_> = rows
            .iter()
            .map(|(path, hash, size)| (*path, 0o100644u32, *hash, *size, 1700000000u32))
            .collect();
        std::fs::write(self.git.join("index"), encode_index(&rows)).unwrap();
    }
}

fn commit_body(tree: ObjectHash, parents: &[ObjectHash], message: &str) -> Vec<u8> {
    let mut body = format!("tree {tree}\n");
    for parent in parents {
        body.push_str(&format!("parent {parent}\n"));
    }
    body.push_str(AUTHOR);
    body.push('\n');
    body.push_str(COMMITTER);
    body.push_str("\n\n");
    body.push_str(message);
    body.push('\n');
    body.into_bytes()
}

fn entry_header(obj_type: ObjectType, mut size: usize) -> Vec<u8> {
    let type_code = match obj_type {
        ObjectType::Commit => 1u8,
        ObjectType::Tree => 2,
        ObjectType::Blob => 3,
        ObjectType::Tag => 4,
        ObjectType::OffsetDelta => 6,
        ObjectType::RefDelta => 7,
    };
    let mut first = (type_code << 4) | (size & 0x0f) as u8;
    size >>= 4;
    let mut out = Vec::new();
    if size > 0 {
        first |= 0x80;
    }
    out.push(first);
    while size > 0 {
        let mut byte = (size & 0x7f) as u8;
        size >>= 7;
        if size > 0 {
            byte |= 0x80;
        }
        out.push(byte);
    }
    out
}

fn varint(mut value: usize) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return out;
        }
        out.push(byte | 0x80);
    }
}

fn ofs_encoding(mut value: u64) -> Vec<u8> {
    let mut bytes = vec![(value & 0x7f) as u8];
    value >>= 7;
    while value > 0 {
        value -= 1;
        bytes.push((value & 0x7f) as u8 | 0x80);
        value >>= 7;
    }
    bytes.reverse();
    bytes
}

/// Naive delta: copy the common prefix of base/target, insert the rest of
/// the target in ≤127-byte chunks.
fn naive_delta(base: &[u8], target: &[u8]) -> Vec<u8> {
    let common = base
        .iter()
        .zip(target.iter())
        .take_while(|(a, b)| a == b)
        .count()
        .min(0xffff);
    let mut delta = varint(base.len());
    delta.extend(varint(target.len()));
    if common > 0 {
        // Copy with two offset bytes (0) omitted, two size bytes present.
        delta.push(0b1011_0000);
        delta.push((common & 0xff) as u8);
        delta.push((common >> 8) as u8);
    }
    for chunk in target[common..].chunks(127) {
        delta.push(chunk.len() as u8);
        delta.extend(chunk);
    }
    delta
}

/// Write a pack + idx holding `objects` in order, where each object is
/// either a full base or a delta against the previous entry.
fn write_pack(git: &Path, objects: &[(ObjectType, Vec<u8>, bool)]) {
    let mut pack = b"PACK".to_vec();
    pack.extend(2u32.to_be_bytes());
    pack.extend((objects.len() as u32).to_be_bytes());

    let mut index_rows: Vec<(ObjectHash, u64, u32)> = Vec::new();
    let mut previous: Option<(u64, Vec<u8>)> = None;
    for (obj_type, body, as_delta) in objects {
        let offset = pack.len() as u64;
        let hash = object_hash(&obj_type.to_string(), body);
        let mut entry = Vec::new();
        if *as_delta {
            let (base_offset, base_body) = previous.as_ref().expect("delta needs a base");
            let delta = naive_delta(base_body, body);
            entry.extend(entry_header(ObjectType::OffsetDelta, delta.len()));
            entry.extend(ofs_encoding(offset - base_offset));
            entry.extend(zlib(&delta));
        } else {
            entry.extend(entry_header(*obj_type, body.len()));
            entry.extend(zlib(body));
        }
        let mut crc = crc32fast::Hasher::new();
        crc.update(&entry);
        pack.extend(&entry);
        index_rows.push((hash, offset, crc.finalize()));
        previous = Some((offset, body.clone()));
    }
    let trailer: [u8; 20] = Sha1::digest(&pack).into();
    pack.extend(trailer);

    index_rows.sort_by(|a, b| a.0.cmp(&b.0));
    let mut idx = vec![0xFF, 0x74, 0x4F, 0x63, 0, 0, 0, 2];
    let mut fanout = [0u32; 256];
    for (hash, _, _) in &index_rows {
        fanout[hash.as_ref()[0] as usize] += 1;
    }
    for i in 1..256 {
        fanout[i] += fanout[i - 1];
    }
    for count in fanout {
        idx.extend(count.to_be_bytes());
    }
    for (hash, _, _) in &index_rows {
        idx.extend(hash.as_ref());
    }
    for (_, _, crc) in &index_rows {
        idx.extend(crc.to_be_bytes());
    }
    for (_, offset, _) in &index_rows {
        idx.extend((*offset as u32).to_be_bytes());
    }
    idx.extend(trailer);
    let idx_digest: [u8; 20] = Sha1::digest(&idx).into();
    idx.extend(idx_digest);

    let pack_dir = git.join("objects/pack");
    std::fs::create_dir_all(&pack_dir).unwrap();
    std::fs::write(pack_dir.join("pack-fixture.pack"), pack).unwrap();
    std::fs::write(pack_dir.join("pack-fixture.idx"), idx).unwrap();
}

fn verifying_options() -> OpenOptions {
    OpenOptions {
        verify_objects: true,
        ..OpenOptions::default()
    }
}

/// Scenario: HEAD resolves symbolically to a branch whose commit decodes
/// with the exact author, committer, and primary parent.
#[tokio::test]
async fn head_resolves_to_decoded_commit() {
    let repo = RepoBuilder::new();
    let blob = repo.blob(b"fn main() {}\n");
    let tree = repo.tree(&[("100644", "main.rs", blob)]);
    let parent = repo.commit(tree, &[], "initial\n");
    let tip = repo.commit(tree, &[parent], "second\n");
    repo.write_ref("refs/heads/main", tip);

    let repository = Repository::open_with(&repo.work, verifying_options())
        .await
        .unwrap();
    let head = repository.head().await.unwrap().unwrap();
    match &head {
        Head::Symbolic { reference } => {
            assert_eq!(reference.name, "main");
            assert_eq!(reference.relative_path, "refs/heads/main");
            assert_eq!(reference.target, tip);
        }
        Head::Detached { .. } => panic!("expected symbolic HEAD"),
    }

    let commit = repository.get_commit(head.target()).await.unwrap();
    assert_eq!(commit.author.name, "Alice");
    assert_eq!(commit.author.email.as_deref(), Some("alice@example.com"));
    assert_eq!(commit.committer.name, "Bob");
    assert_eq!(commit.primary_parent(), Some(parent));
    assert_eq!(commit.subject(), "second");
}

/// Scenario: a packed tag with a peeled line resolves to its commit via
/// the peeled hash, even when the tag object itself is unreadable, and
/// the peeled result equals the one obtained through the tag object.
#[tokio::test]
async fn peeled_tag_resolution() {
    let repo = RepoBuilder::new();
    let blob = repo.blob(b"v1\n");
    let tree = repo.tree(&[("100644", "VERSION", blob)]);
    let commit = repo.commit(tree, &[], "release\n");
    repo.write_ref("refs/heads/main", commit);

    // Annotated tag object present in the store.
    let tag_obj = repo.annotated_tag("1.2.3", commit, "Release 1.2.3");
    // A second packed tag whose object was pruned: only the peeled line
    // can resolve it.
    let ghost_tag_hash = ObjectHash::new(b"pruned tag object");
    repo.write_git_file(
        "packed-refs",
        &format!(
            "# pack-refs with: peeled fully-peeled sorted \n\
             {tag_obj} refs/tags/1.2.3\n\
             ^{commit}\n\
             {ghost_tag_hash} refs/tags/ghost\n\
             ^{commit}\n"
        ),
    );

    let repository = Repository::open(&repo.work).await.unwrap();
    let tags = repository.tags().await.unwrap();
    assert_eq!(tags.len(), 2);

    let tag = repository.find_tag("1.2.3").await.unwrap().unwrap();
    assert_eq!(tag.peeled, Some(commit));

    // Peeled fast path.
    let peeled_commit = repository.get_tag_commit(&tag).await.unwrap();
    assert_eq!(peeled_commit.id, commit);

    // Same result through the tag object itself.
    let annotated = repository.get_tag(&tag).await.unwrap();
    assert_eq!(annotated.tag_name, "1.2.3");
    assert_eq!(annotated.object_id, commit);
    assert!(!annotated.is_lightweight());

    // The ghost tag's object does not exist; only the peeled hash works.
    let ghost = repository.find_tag("ghost").await.unwrap().unwrap();
    let ghost_commit = repository.get_tag_commit(&ghost).await.unwrap();
    assert_eq!(ghost_commit.id, commit);
}

/// Scenario: a commit stored only inside a pack behind an ofs-delta chain
/// of depth 3 materialises with the requested hash (verifier mode on).
#[tokio::test]
async fn packed_delta_chain_commit() {
    let repo = RepoBuilder::new();
    let blob = repo.blob(b"content\n");
    let tree = repo.tree(&[("100644", "file.txt", blob)]);

    // Four commit bodies sharing a long prefix, packed as base + three
    // chained ofs-deltas.
    let bodies: Vec<Vec<u8>> = (0..4)
        .map(|i| commit_body(tree, &[], &format!("packed commit number {i}")))
        .collect();
    let tip_hash = object_hash("commit", &bodies[3]);
    write_pack(
        &repo.git,
        &[
            (ObjectType::Commit, bodies[0].clone(), false),
            (ObjectType::Commit, bodies[1].clone(), true),
            (ObjectType::Commit, bodies[2].clone(), true),
            (ObjectType::Commit, bodies[3].clone(), true),
        ],
    );
    repo.write_ref("refs/heads/main", tip_hash);

    let repository = Repository::open_with(&repo.work, verifying_options())
        .await
        .unwrap();
    let commit = repository.get_commit(tip_hash).await.unwrap();
    assert_eq!(commit.id, tip_hash);
    assert_eq!(commit.subject(), "packed commit number 3");
    assert_eq!(commit.tree_id, tree);

    // Every chain link also resolves by its own hash.
    for body in &bodies {
        let hash = object_hash("commit", body);
        assert!(repository.find_commit(hash).await.unwrap().is_some());
    }
}

/// Scenario: index equals HEAD, one file modified locally: exactly one
/// unstaged Modified entry and no staged entries.
#[tokio::test]
async fn status_unstaged_modification() {
    let repo = RepoBuilder::new();
    let foo = repo.blob(b"original contents\n");
    let tree = repo.tree(&[("100644", "foo.txt", foo)]);
    let commit = repo.commit(tree, &[], "base\n");
    repo.write_ref("refs/heads/main", commit);
    repo.write_index(&[("foo.txt", foo, 18)]);
    repo.write_work_file("foo.txt", b"modified locally\n");

    let repository = Repository::open(&repo.work).await.unwrap();
    let status = repository.status().await.unwrap();

    assert!(status.staged.is_empty());
    assert_eq!(status.unstaged.len(), 1);
    let entry = &status.unstaged[0];
    assert_eq!(entry.path, "foo.txt");
    assert_eq!(entry.status, FileStatus::Modified);
    assert_eq!(entry.index_hash, Some(foo));
    assert_eq!(
        entry.working_hash,
        Some(object_hash("blob", b"modified locally\n"))
    );
    assert!(status.untracked.is_empty());
}

/// Scenario: staging a new file yields one staged Added entry whose index
/// and working-tree hashes both equal the blob hash.
#[tokio::test]
async fn status_staged_addition() {
    let repo = RepoBuilder::new();
    let foo = repo.blob(b"original contents\n");
    let tree = repo.tree(&[("100644", "foo.txt", foo)]);
    let commit = repo.commit(tree, &[], "base\n");
    repo.write_ref("refs/heads/main", commit);

    let bar_hash = repo.blob(b"new file\n");
    repo.write_index(&[("bar.txt", bar_hash, 9), ("foo.txt", foo, 18)]);
    repo.write_work_file("foo.txt", b"original contents\n");
    repo.write_work_file("bar.txt", b"new file\n");

    let repository = Repository::open(&repo.work).await.unwrap();
    let status = repository.status().await.unwrap();

    assert_eq!(status.staged.len(), 1);
    let entry = &status.staged[0];
    assert_eq!(entry.path, "bar.txt");
    assert_eq!(entry.status, FileStatus::Added);
    assert_eq!(entry.index_hash, Some(bar_hash));
    assert_eq!(entry.working_hash, Some(bar_hash));
    assert!(status.unstaged.is_empty());
}

/// Untracked files are filtered through .gitignore; removing a file from
/// the index surfaces a staged deletion.
#[tokio::test]
async fn status_untracked_and_staged_deletion() {
    let repo = RepoBuilder::new();
    let foo = repo.blob(b"kept\n");
    let gone = repo.blob(b"deleted\n");
    let tree = repo.tree(&[("100644", "foo.txt", foo), ("100644", "gone.txt", gone)]);
    let commit = repo.commit(tree, &[], "base\n");
    repo.write_ref("refs/heads/main", commit);

    // gone.txt was removed from the index (staged deletion).
    repo.write_index(&[("foo.txt", foo, 5)]);
    repo.write_work_file("foo.txt", b"kept\n");
    repo.write_work_file("scratch.log", b"noise\n");
    repo.write_work_file("notes.md", b"todo\n");
    repo.write_work_file(".gitignore", b"*.log\n");

    let repository = Repository::open(&repo.work).await.unwrap();
    let status = repository.status().await.unwrap();

    assert_eq!(status.staged.len(), 1);
    assert_eq!(status.staged[0].path, "gone.txt");
    assert_eq!(status.staged[0].status, FileStatus::Deleted);

    let untracked: Vec<&str> = status
        .untracked
        .iter()
        .map(|file| file.path.as_str())
        .collect();
    // scratch.log is ignored; .gitignore itself is untracked.
    assert_eq!(untracked, vec![".gitignore", "notes.md"]);
    assert_eq!(
        status.untracked[1].working_hash,
        Some(object_hash("blob", b"todo\n"))
    );
}

/// Scenario: a gitlink entry opens the registered nested repository whose
/// HEAD resolves to the entry's hash.
#[tokio::test]
async fn submodule_opens_nested_repository() {
    let repo = RepoBuilder::new();

    // Build the submodule's git directory under modules/vendor-lib.
    let module_git = repo.git.join("modules/vendor-lib");
    for sub in ["objects", "refs/heads"] {
        std::fs::create_dir_all(module_git.join(sub)).unwrap();
    }
    let sub_tree = RepoBuilder::write_loose_at(&module_git, "tree", b"");
    let sub_commit_body = commit_body(sub_tree, &[], "submodule tip\n");
    let sub_commit = RepoBuilder::write_loose_at(&module_git, "commit", &sub_commit_body);
    std::fs::write(module_git.join("HEAD"), "ref: refs/heads/main\n").unwrap();
    std::fs::write(
        module_git.join("refs/heads/main"),
        format!("{sub_commit}\n"),
    )
    .unwrap();
    std::fs::write(module_git.join("config"), "[core]\n\tbare = false\n").unwrap();

    // Superproject tree carries the gitlink.
    let readme = repo.blob(b"root\n");
    let tree = repo.tree(&[
        ("100644", "README.md", readme),
        ("160000", "vendor-lib", sub_commit),
    ]);
    let commit = repo.commit(tree, &[], "with submodule\n");
    repo.write_ref("refs/heads/main", commit);

    let repository = Repository::open(&repo.work).await.unwrap();
    let submodule = repository.open_submodule("vendor-lib").await.unwrap();
    let sub_head = submodule.head().await.unwrap().unwrap();
    assert_eq!(sub_head.target(), sub_commit);

    // A blob entry is not a submodule.
    let err = repository.open_submodule("README.md").await.unwrap_err();
    assert_eq!(err.kind(), git_reader::ErrorKind::InvalidArgument);

    // An unregistered path fails as NotFound.
    let tree2 = repo.tree(&[("160000", "ghost-module", sub_commit)]);
    let commit2 = repo.commit(tree2, &[commit], "second\n");
    repo.write_ref("refs/heads/main", commit2);
    let repository = Repository::open(&repo.work).await.unwrap();
    let err = repository.open_submodule("ghost-module").await.unwrap_err();
    assert!(err.is_not_found());
}

/// Reflog, stashes, remote URLs, and FETCH_HEAD-derived remote branches.
#[tokio::test]
async fn metadata_surfaces() {
    let repo = RepoBuilder::new();
    let blob = repo.blob(b"x\n");
    let tree = repo.tree(&[("100644", "x", blob)]);
    let c1 = repo.commit(tree, &[], "one\n");
    let c2 = repo.commit(tree, &[c1], "two\n");
    repo.write_ref("refs/heads/main", c2);

    let zero = ObjectHash::zero();
    repo.write_git_file(
        "logs/HEAD",
        &format!(
            "{zero} {c1} Alice <alice@example.com> 1700000000 +0100\tcommit (initial): one\n\
             {c1} {c2} Alice <alice@example.com> 1700000500 +0100\tcommit: two\n"
        ),
    );
    repo.write_git_file(
        "logs/refs/stash",
        &format!("{zero} {c1} Alice <alice@example.com> 1700000600 +0100\tWIP on main: stash it\n"),
    );
    repo.write_git_file(
        "config",
        "[remote \"origin\"]\n\turl = https://example.com/demo.git\n",
    );
    repo.write_git_file(
        "FETCH_HEAD",
        &format!(
            "{c2}\t\tbranch 'main' of https://example.com/demo.git\n\
             {c1}\tnot-for-merge\tbranch 'dev' of https://example.com/demo.git\n"
        ),
    );

    let repository = Repository::open(&repo.work).await.unwrap();

    let reflog = repository.reflog("HEAD").await.unwrap();
    assert_eq!(reflog.len(), 2);
    assert!(reflog[0].is_creation());
    assert_eq!(reflog[1].new, c2);
    assert_eq!(reflog[1].message, "commit: two");

    let stashes = repository.stashes().await.unwrap();
    assert_eq!(stashes.len(), 1);
    assert_eq!(stashes[0].target, c1);
    assert_eq!(stashes[0].message, "WIP on main: stash it");

    assert_eq!(
        repository.remote_urls()["origin"],
        "https://example.com/demo.git"
    );

    let remote_branches = repository.remote_branches().await.unwrap();
    let names: Vec<&str> = remote_branches.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(names, vec!["origin/dev", "origin/main"]);
}

/// Worktree enumeration: primary `(main)` plus Normal/Locked/Prunable
/// linked worktrees.
#[tokio::test]
async fn worktree_enumeration() {
    let repo = RepoBuilder::new();
    let blob = repo.blob(b"x\n");
    let tree = repo.tree(&[("100644", "x", blob)]);
    let commit = repo.commit(tree, &[], "base\n");
    repo.write_ref("refs/heads/main", commit);
    repo.write_ref("refs/heads/feature", commit);

    // wt-normal: gitdir target exists.
    let wt_normal = repo.work.parent().unwrap().join("wt-normal");
    std::fs::create_dir_all(&wt_normal).unwrap();
    std::fs::write(wt_normal.join(".git"), "gitdir: ignored\n").unwrap();
    repo.write_git_file("worktrees/wt-normal/HEAD", "ref: refs/heads/feature\n");
    repo.write_git_file(
        "worktrees/wt-normal/gitdir",
        &format!("{}\n", wt_normal.join(".git").display()),
    );

    // wt-locked: has a locked marker.
    repo.write_git_file("worktrees/wt-locked/HEAD", &format!("{commit}\n"));
    repo.write_git_file("worktrees/wt-locked/gitdir", "/nonexistent/a/.git\n");
    repo.write_git_file("worktrees/wt-locked/locked", "reason\n");

    // wt-prunable: gitdir target is gone.
    repo.write_git_file("worktrees/wt-prunable/HEAD", &format!("{commit}\n"));
    repo.write_git_file("worktrees/wt-prunable/gitdir", "/nonexistent/b/.git\n");

    let repository = Repository::open(&repo.work).await.unwrap();
    let worktrees = repository.worktrees().await.unwrap();
    assert_eq!(worktrees.len(), 4);

    assert_eq!(worktrees[0].name, "(main)");
    assert_eq!(worktrees[0].path, repo.work);
    assert_eq!(worktrees[0].head, commit);
    assert_eq!(worktrees[0].branch.as_deref(), Some("main"));

    let by_name = |name: &str| worktrees.iter().find(|w| w.name == name).unwrap();
    let normal = by_name("wt-normal");
    assert_eq!(normal.status, WorktreeStatus::Normal);
    assert_eq!(normal.branch.as_deref(), Some("feature"));
    assert_eq!(normal.head, commit);
    assert_eq!(normal.path, wt_normal);

    assert_eq!(by_name("wt-locked").status, WorktreeStatus::Locked);
    let prunable = by_name("wt-prunable");
    assert_eq!(prunable.status, WorktreeStatus::Prunable);
    assert!(prunable.branch.is_none());
}

/// The structured facade memoises commits and answers related-ref queries.
#[tokio::test]
async fn structured_facade_navigation() {
    let repo = RepoBuilder::new();
    let blob = repo.blob(b"x\n");
    let tree = repo.tree(&[("100644", "x", blob)]);
    let c1 = repo.commit(tree, &[], "one\n");
    let c2 = repo.commit(tree, &[c1], "two\n");
    repo.write_ref("refs/heads/main", c2);
    repo.write_ref("refs/heads/release", c2);
    repo.write_ref("refs/heads/old", c1);

    let tag_obj = repo.annotated_tag("v2", c2, "second release");
    repo.write_git_file(
        "packed-refs",
        &format!("{tag_obj} refs/tags/v2\n^{c2}\n{c1} refs/tags/v1-light\n"),
    );

    let structured = StructuredRepository::open(&repo.work).await.unwrap();
    assert_eq!(structured.branches().len(), 3);
    assert_eq!(structured.tags().len(), 2);

    let head_commit = structured.head_commit().await.unwrap().unwrap();
    assert_eq!(head_commit.id, c2);
    assert_eq!(head_commit.subject(), "two");

    // Memoised: the same Arc comes back.
    let again = structured.commit(c2).await.unwrap();
    assert!(std::sync::Arc::ptr_eq(&head_commit, &again));

    let parents = structured.parent_commits(&head_commit).await.unwrap();
    assert_eq!(parents.len(), 1);
    assert_eq!(parents[0].id, c1);

    let related = structured.related_branches(c2);
    let names: Vec<&str> = related.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(names, vec!["main", "release"]);

    let related_tags = structured.related_tags(c2).await.unwrap();
    let names: Vec<&str> = related_tags.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["v2"]);

    let light = &structured.tags()["v1-light"];
    let light_tag = structured.tag(light).await.unwrap();
    assert!(light_tag.is_lightweight());
    assert_eq!(structured.tag_commit(light).await.unwrap().id, c1);
}

/// Loose refs win over packed-refs for the same path.
#[tokio::test]
async fn loose_ref_precedence() {
    let repo = RepoBuilder::new();
    let blob = repo.blob(b"x\n");
    let tree = repo.tree(&[("100644", "x", blob)]);
    let packed_commit = repo.commit(tree, &[], "stale\n");
    let loose_commit = repo.commit(tree, &[packed_commit], "fresh\n");

    repo.write_git_file("packed-refs", &format!("{packed_commit} refs/heads/main\n"));
    repo.write_ref("refs/heads/main", loose_commit);

    let repository = Repository::open(&repo.work).await.unwrap();
    let branch = repository.branch("main").await.unwrap();
    assert_eq!(branch.target, loose_commit);

    let branches = repository.branches().await.unwrap();
    assert_eq!(branches.len(), 1);
    assert_eq!(branches[0].target, loose_commit);
}

/// A detached HEAD reports no branch and the exact hash.
#[tokio::test]
async fn detached_head() {
    let repo = RepoBuilder::new();
    let blob = repo.blob(b"x\n");
    let tree = repo.tree(&[("100644", "x", blob)]);
    let commit = repo.commit(tree, &[], "only\n");
    repo.write_git_file("HEAD", &format!("{commit}\n"));

    let repository = Repository::open(&repo.work).await.unwrap();
    let head = repository.head().await.unwrap().unwrap();
    assert_eq!(head.branch_name(), None);
    assert_eq!(head.target(), commit);
}

/// Absent objects surface as NotFound for direct getters and None for
/// optional lookups.
#[tokio::test]
async fn absent_objects() {
    let repo = RepoBuilder::new();
    let repository = Repository::open(&repo.work).await.unwrap();
    let ghost = ObjectHash::new(b"not stored");

    assert!(repository.find_commit(ghost).await.unwrap().is_none());
    let err = repository.get_commit(ghost).await.unwrap_err();
    assert!(err.is_not_found());
    assert!(repository.head().await.unwrap().is_none()); // unborn main
}
