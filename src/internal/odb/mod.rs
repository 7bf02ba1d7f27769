//! The object accessor: routes a hash to either the loose store or a pack
//! entry, caches parsed pack indices and open pack readers, and resolves
//! delta chains.
//!
//! Resolution order follows Git: the loose fan-out path wins, then each
//! `objects/pack/pack-*.idx` is consulted. Reconstructed delta bases are
//! memoised in a size-bounded LRU so siblings sharing a base inside one
//! pack do not re-apply the whole chain; oversized results spill to a
//! temporary file instead of occupying the cache.

pub mod loose;

use std::{
    path::PathBuf,
    pin::Pin,
    sync::{Arc, Mutex},
};

use dashmap::DashMap;
use lru_mem::{HeapSize, LruCache};
use tempfile::TempDir;
use tracing::debug;

use crate::{
    errors::GitError,
    fs::FileStreamCache,
    hash::ObjectHash,
    internal::{
        object::types::ObjectType,
        pack::{
            delta::apply_delta,
            idx::PackIndex,
            reader::{PackReader, RawEntry},
        },
    },
    sync::CancellationToken,
};

use loose::LooseReader;

/// Deepest ofs/ref delta chain the accessor will follow.
const MAX_DELTA_DEPTH: usize = 128;

/// Total bytes of reconstructed bases retained in memory.
const DELTA_CACHE_BYTES: usize = 96 << 20;

/// Results above this size spill to a temp file instead of the LRU.
const SPILL_THRESHOLD: usize = 64 << 20;

/// A materialised object: its type plus the full body bytes.
#[derive(Debug, Clone)]
pub struct RawObject {
    pub obj_type: ObjectType,
    pub data: Vec<u8>,
}

impl RawObject {
    /// Recompute the object id of this body.
    pub fn compute_hash(&self) -> ObjectHash {
        ObjectHash::from_type_and_data(self.obj_type, &self.data)
    }
}

#[derive(Debug, Clone)]
struct CachedObject {
    obj_type: ObjectType,
    data: Vec<u8>,
}

impl HeapSize for CachedObject {
    fn heap_size(&self) -> usize {
        self.data.capacity()
    }
}

/// Routes hashes to loose or packed storage and applies delta chains.
#[derive(Debug)]
pub struct ObjectAccessor {
    objects_dir: PathBuf,
    loose: LooseReader,
    streams: Arc<FileStreamCache>,
    indices: DashMap<PathBuf, Arc<PackIndex>>,
    readers: DashMap<PathBuf, Arc<PackReader>>,
    delta_bases: Mutex<LruCache<String, CachedObject>>,
    spilled: DashMap<String, PathBuf>,
    spill_dir: Mutex<Option<TempDir>>,
    cancel: CancellationToken,
    verify_objects: bool,
}

impl ObjectAccessor {
    pub fn new(
        objects_dir: PathBuf,
        streams: Arc<FileStreamCache>,
        cancel: CancellationToken,
        verify_objects: bool,
    ) -> ObjectAccessor {
        ObjectAccessor {
            loose: LooseReader::new(objects_dir.clone()),
            objects_dir,
            streams,
            indices: DashMap::new(),
            readers: DashMap::new(),
            delta_bases: Mutex::new(LruCache::new(DELTA_CACHE_BYTES)),
            spilled: DashMap::new(),
            spill_dir: Mutex::new(None),
            cancel,
            verify_objects,
        }
    }

    fn ensure_alive(&self) -> Result<(), GitError> {
        if self.cancel.is_cancelled() {
            Err(GitError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Open the object for `hash`, or `None` when it exists nowhere in the
    /// store. The repository layer turns `None` into `ObjectNotFound` for
    /// non-optional getters.
    pub async fn open(&self, hash: &ObjectHash) -> Result<Option<RawObject>, GitError> {
        self.open_inner(hash, 0).await
    }

    /// `depth` carries the delta-chain depth across ref-delta hops, so a
    /// cyclic chain of ref-deltas still hits the chain bound.
    fn open_inner<'a>(
        &'a self,
        hash: &'a ObjectHash,
        depth: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Option<RawObject>, GitError>> + Send + 'a>> {
        Box::pin(async move {
            self.ensure_alive()?;

            if let Some(loose) = self.loose.read(hash).await? {
                let object = RawObject {
                    obj_type: loose.obj_type,
                    data: loose.data,
                };
                self.verify(hash, &object)?;
                return Ok(Some(object));
            }

            for idx_path in self.pack_index_paths().await? {
                let index = self.index_for(&idx_path).await?;
                let Some(offset) = index.find(hash) else {
                    continue;
                };
                let reader = self.reader_for(&idx_path, index).await?;
                let (obj_type, data) = self.resolve_at(reader, offset, depth).await?;
                let object = RawObject { obj_type, data };
                self.verify(hash, &object)?;
                return Ok(Some(object));
            }
            Ok(None)
        })
    }

    fn verify(&self, hash: &ObjectHash, object: &RawObject) -> Result<(), GitError> {
        if self.verify_objects && object.compute_hash() != *hash {
            return Err(GitError::HashMismatch(hash.to_string()));
        }
        Ok(())
    }

    async fn pack_index_paths(&self) -> Result<Vec<PathBuf>, GitError> {
        let pack_dir = self.objects_dir.join("pack");
        let mut paths = Vec::new();
        let mut entries = match tokio::fs::read_dir(&pack_dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(paths),
            Err(err) => return Err(err.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with("pack-") && name.ends_with(".idx") {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }

    async fn index_for(&self, idx_path: &PathBuf) -> Result<Arc<PackIndex>, GitError> {
        if let Some(index) = self.indices.get(idx_path) {
            return Ok(index.clone());
        }
        let bytes = tokio::fs::read(idx_path).await?;
        let index = Arc::new(PackIndex::parse(&bytes)?);
        debug!(
            idx = %idx_path.display(),
            objects = index.object_count(),
            "parsed pack index"
        );
        self.indices.insert(idx_path.clone(), index.clone());
        Ok(index)
    }

    async fn reader_for(
        &self,
        idx_path: &PathBuf,
        index: Arc<PackIndex>,
    ) -> Result<Arc<PackReader>, GitError> {
        let pack_path = idx_path.with_extension("pack");
        if let Some(reader) = self.readers.get(&pack_path) {
            return Ok(reader.clone());
        }
        let mut opened =
            PackReader::open(pack_path.clone(), index, self.streams.clone()).await?;
        if self.verify_objects {
            opened = opened.with_crc_verification();
        }
        let reader = Arc::new(opened);
        self.readers.insert(pack_path, reader.clone());
        Ok(reader)
    }

    /// Resolve the pack entry at `offset` into (type, bytes), following
    /// delta chains up to [`MAX_DELTA_DEPTH`].
    fn resolve_at<'a>(
        &'a self,
        pack: Arc<PackReader>,
        offset: u64,
        depth: usize,
    ) -> Pin<Box<dyn Future<Output = Result<(ObjectType, Vec<u8>), GitError>> + Send + 'a>> {
        Box::pin(async move {
            self.ensure_alive()?;
            if depth > MAX_DELTA_DEPTH {
                return Err(GitError::DeltaObjectError(format!(
                    "delta chain deeper than {MAX_DELTA_DEPTH}"
                )));
            }

            let key = format!("{}:{offset}", pack.path().display());
            if let Some(cached) = self.cached(&key).await? {
                return Ok((cached.obj_type, cached.data));
            }

            let resolved = match pack.read_raw_entry(offset).await? {
                RawEntry::Base { obj_type, data } => (obj_type, data),
                RawEntry::OfsDelta { base_offset, delta } => {
                    let (obj_type, base) =
                        self.resolve_at(pack.clone(), base_offset, depth + 1).await?;
                    let data = apply_delta(&mut std::io::Cursor::new(delta), &base)?;
                    (obj_type, data)
                }
                RawEntry::RefDelta { base_hash, delta } => {
                    let base = self
                        .open_inner(&base_hash, depth + 1)
                        .await?
                        .ok_or_else(|| {
                            GitError::ObjectNotFound(format!("delta base {base_hash}"))
                        })?;
                    let data = apply_delta(&mut std::io::Cursor::new(delta), &base.data)?;
                    (base.obj_type, data)
                }
            };

            self.remember(key, resolved.0, &resolved.1).await?;
            Ok(resolved)
        })
    }

    async fn cached(&self, key: &str) -> Result<Option<CachedObject>, GitError> {
        if let Some(hit) = self.delta_bases.lock().unwrap().get(key) {
            return Ok(Some(hit.clone()));
        }
        let spill_path = self.spilled.get(key).map(|entry| entry.value().clone());
        if let Some(path) = spill_path {
            let data = tokio::fs::read(&path).await?;
            // Spilled files store the type code in their first byte.
            let (&code, body) = data.split_first().ok_or_else(|| {
                GitError::DeltaObjectError(format!("empty spill file for {key}"))
            })?;
            return Ok(Some(CachedObject {
                obj_type: ObjectType::from_pack_type_u8(code)?,
                data: body.to_vec(),
            }));
        }
        Ok(None)
    }

    async fn remember(
        &self,
        key: String,
        obj_type: ObjectType,
        data: &[u8],
    ) -> Result<(), GitError> {
        if data.len() > SPILL_THRESHOLD {
            let path = {
                let mut guard = self.spill_dir.lock().unwrap();
                if guard.is_none() {
                    *guard = Some(tempfile::tempdir()?);
                }
                let file_name = key.replace(['/', '\\', ':'], "_");
                guard.as_ref().unwrap().path().join(file_name)
            };
            let mut contents = Vec::with_capacity(data.len() + 1);
            contents.push(obj_type.to_pack_type_u8());
            contents.extend_from_slice(data);
            tokio::fs::write(&path, contents).await?;
            debug!(key = %key, bytes = data.len(), "spilled delta result to temp file");
            self.spilled.insert(key, path);
            return Ok(());
        }

        let entry = CachedObject {
            obj_type,
            data: data.to_vec(),
        };
        // Entries larger than the whole cache are simply not retained.
        let _ = self.delta_bases.lock().unwrap().insert(key, entry);
        Ok(())
    }
}
