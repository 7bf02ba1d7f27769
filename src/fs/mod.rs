//! Filesystem plumbing shared by the object store and reference readers:
//! open-for-read with retry, a per-path cache of pooled read handles, and a
//! reusable byte-buffer pool.
//!
//! Git tools frequently rewrite `refs/*`, `packed-refs`, and `HEAD` while a
//! reader is active. On platforms with mandatory sharing (Windows) those
//! rewrites surface as transient "file in use" errors, so opens retry with a
//! randomised back-off before falling back to an unrestricted open.

use std::{
    collections::HashMap,
    io,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, Weak},
    time::Duration,
};

use rand::Rng;
use tokio::{fs::File, io::AsyncReadExt};
use tracing::warn;

use crate::errors::GitError;

/// Maximum open attempts for a contended metadata file.
const MAX_OPEN_ATTEMPTS: u32 = 20;

/// Total back-off budget across all attempts.
const OPEN_RETRY_BUDGET: Duration = Duration::from_secs(5);

/// Idle handles retained per path before extras are closed on release.
const MAX_POOLED_PER_PATH: usize = 4;

fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::PermissionDenied
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
            | io::ErrorKind::Interrupted
    )
}

/// Open a file read-only, retrying transient sharing violations with
/// jittered back-off. `NotFound` is returned immediately.
///
/// After the retry budget is exhausted a final unrestricted attempt is made;
/// on success the caller accepts the risk of reading a metadata file that is
/// concurrently being rewritten.
pub async fn open_for_read(path: &Path) -> Result<File, GitError> {
    let started = std::time::Instant::now();
    let mut last_err = None;
    for _attempt in 0..MAX_OPEN_ATTEMPTS {
        match File::open(path).await {
            Ok(file) => return Ok(file),
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Err(err.into()),
            Err(err) if is_transient(&err) && started.elapsed() < OPEN_RETRY_BUDGET => {
                let jitter = rand::thread_rng().gen_range(20..120);
                tokio::time::sleep(Duration::from_millis(jitter)).await;
                last_err = Some(err);
            }
            Err(err) => return Err(err.into()),
        }
    }
    warn!(
        path = %path.display(),
        "open retries exhausted, falling back to unrestricted shared open"
    );
    match File::open(path).await {
        Ok(file) => Ok(file),
        Err(err) => Err(GitError::IOError(last_err.unwrap_or(err))),
    }
}

/// Read a whole file, returning `None` when it does not exist.
pub async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, GitError> {
    let mut file = match open_for_read(path).await {
        Ok(file) => file,
        Err(GitError::IOError(err)) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err),
    };
    let mut buf = Vec::new();
    file.read_to_end(&mut buf).await?;
    Ok(Some(buf))
}

/// Read a whole file as UTF-8 text, returning `None` when it does not exist.
pub async fn read_text_optional(path: &Path) -> Result<Option<String>, GitError> {
    Ok(read_optional(path)
        .await?
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
}

/// True when the path names an existing file or directory.
pub async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

/// Per-path cache of read-only file handles.
///
/// Pack files and indices are reopened constantly during object resolution;
/// pooling the handles avoids both the open syscall and the retry dance.
/// Handles return to the pool when their [`PooledFile`] guard drops and are
/// closed when the cache is cleared or dropped.
#[derive(Debug)]
pub struct FileStreamCache {
    pools: Mutex<HashMap<PathBuf, Vec<File>>>,
}

impl FileStreamCache {
    pub fn new() -> Arc<FileStreamCache> {
        Arc::new(FileStreamCache {
            pools: Mutex::new(HashMap::new()),
        })
    }

    /// Acquire a handle for `path`, reusing an idle pooled handle if one
    /// exists, otherwise opening with the retry policy.
    pub async fn acquire(self: &Arc<Self>, path: &Path) -> Result<PooledFile, GitError> {
        let pooled = {
            let mut pools = self.pools.lock().unwrap();
            pools.get_mut(path).and_then(|v| v.pop())
        };
        let file = match pooled {
            Some(file) => file,
            None => open_for_read(path).await?,
        };
        Ok(PooledFile {
            file: Some(file),
            path: path.to_path_buf(),
            cache: Arc::downgrade(self),
        })
    }

    fn release(&self, path: PathBuf, file: File) {
        let mut pools = self.pools.lock().unwrap();
        let pool = pools.entry(path).or_default();
        if pool.len() < MAX_POOLED_PER_PATH {
            pool.push(file);
        }
        // Excess handles close on drop.
    }

    /// Close every pooled handle. Called on repository disposal; documented
    /// as potentially blocking.
    pub fn clear(&self) {
        self.pools.lock().unwrap().clear();
    }
}

impl Drop for FileStreamCache {
    fn drop(&mut self) {
        self.clear();
    }
}

/// A cached file handle checked out of a [`FileStreamCache`].
///
/// Seek position is unspecified on acquisition; callers must seek before
/// reading. Returns the handle to the pool on drop.
pub struct PooledFile {
    file: Option<File>,
    path: PathBuf,
    cache: Weak<FileStreamCache>,
}

impl PooledFile {
    pub fn get_mut(&mut self) -> &mut File {
        self.file.as_mut().expect("pooled file present until drop")
    }
}

impl Drop for PooledFile {
    fn drop(&mut self) {
        if let (Some(file), Some(cache)) = (self.file.take(), self.cache.upgrade()) {
            cache.release(std::mem::take(&mut self.path), file);
        }
    }
}

/// Reusable byte buffers for hashing and inflation loops.
///
/// Loosely bounded: at most `max_retained` buffers are kept, each shrunk to
/// at most `max_buffer_bytes` capacity on return.
pub struct BufferPool {
    buffers: Mutex<Vec<Vec<u8>>>,
    max_retained: usize,
    max_buffer_bytes: usize,
}

impl BufferPool {
    pub fn new(max_retained: usize, max_buffer_bytes: usize) -> BufferPool {
        BufferPool {
            buffers: Mutex::new(Vec::new()),
            max_retained,
            max_buffer_bytes,
        }
    }

    /// Take a cleared buffer from the pool, or allocate a fresh one.
    pub fn take(&self) -> Vec<u8> {
        self.buffers.lock().unwrap().pop().unwrap_or_default()
    }

    /// Return a buffer to the pool.
    pub fn put(&self, mut buf: Vec<u8>) {
        buf.clear();
        if buf.capacity() > self.max_buffer_bytes {
            return;
        }
        let mut buffers = self.buffers.lock().unwrap();
        if buffers.len() < self.max_retained {
            buffers.push(buf);
        }
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        BufferPool::new(16, 1 << 20)
    }
}
