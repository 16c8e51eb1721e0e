//! Store lifecycle: header validation, create/open, commit, close, compact.
//! See spec.md §4.7. Grounded in the teacher's `CompactFile`/`BlockStg`
//! open/save pattern, generalized to the two-file (index + phys) layout and
//! the rename-based compaction spec.md describes.

use crate::alloc::{Allocator, SpaceReclaim, IO_USER_START};
use crate::error::StoreError;
use crate::serializer::ScratchPool;
use crate::volume::{FileVolumeFactory, MemVolumeFactory, Volume, VolumeFactory};
use parking_lot::{Mutex, RwLock};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Number of striped per-recid read-write locks. A power of two so the
/// stripe index is a cheap mask of a recid hash.
pub(crate) const NLOCK: usize = 16;

/// Constructor parameters (spec.md §6). Defaults match the source's
/// `(readOnly=false, deleteFilesAfterClose=false, spaceReclaimMode=5,
/// syncOnCommitDisabled=false, sizeLimit=0)`, with `sync_on_commit`
/// inverted to the more idiomatic positive sense and `size_limit` as
/// `Option<u64>` (`None` == unlimited); both inversions are recorded in
/// DESIGN.md.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub read_only: bool,
    pub delete_files_after_close: bool,
    pub space_reclaim_mode: u8,
    pub sync_on_commit: bool,
    pub size_limit: Option<u64>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            read_only: false,
            delete_files_after_close: false,
            space_reclaim_mode: 5,
            sync_on_commit: true,
            size_limit: None,
        }
    }
}

impl StoreOptions {
    pub fn read_only(mut self, v: bool) -> Self {
        self.read_only = v;
        self
    }

    pub fn delete_files_after_close(mut self, v: bool) -> Self {
        self.delete_files_after_close = v;
        self
    }

    pub fn space_reclaim_mode(mut self, v: u8) -> Self {
        assert!(v <= 5, "space_reclaim_mode must be in 0..=5");
        self.space_reclaim_mode = v;
        self
    }

    pub fn sync_on_commit(mut self, v: bool) -> Self {
        self.sync_on_commit = v;
        self
    }

    pub fn size_limit(mut self, v: Option<u64>) -> Self {
        self.size_limit = v;
        self
    }
}

/// The embedded record store: recid-addressed variable-length byte
/// payloads over an `index` file and a `phys` file.
pub struct Store {
    pub(crate) index: Arc<dyn Volume>,
    pub(crate) phys: Arc<dyn Volume>,
    pub(crate) alloc: Mutex<Allocator>,
    pub(crate) locks: [RwLock<()>; NLOCK],
    pub(crate) scratch: ScratchPool,
    pub(crate) options: StoreOptions,
    pub(crate) closed: AtomicBool,
    /// Present when backed by real files, so `compact` can do its
    /// rename dance. `None` for in-memory stores, for which `compact`
    /// is unsupported (spec.md §7).
    pub(crate) base: Option<PathBuf>,
}

impl Store {
    /// Open (creating if necessary) a store at `<base>` / `<base>.p`.
    pub fn open(base: impl AsRef<Path>, options: StoreOptions) -> Self {
        let base = base.as_ref().to_path_buf();
        let factory = FileVolumeFactory::new(&base);
        let mut store = Self::open_with_factory(&factory, options);
        store.base = Some(base);
        store
    }

    /// Open a store backed by volumes built from an arbitrary
    /// [`VolumeFactory`] (spec.md §6's `Volume.Factory` contract).
    pub fn open_with_factory(factory: &dyn VolumeFactory, options: StoreOptions) -> Self {
        let index: Arc<dyn Volume> = Arc::from(factory.create_index_volume());
        let phys: Arc<dyn Volume> = Arc::from(factory.create_phys_volume());
        Self::open_volumes(index, phys, options, None)
    }

    /// Open a store over a fresh pair of in-memory volumes. Useful for
    /// tests: `compact` is unsupported on the result (spec.md §7).
    pub fn open_in_memory(options: StoreOptions) -> Self {
        Self::open_with_factory(&MemVolumeFactory, options)
    }

    fn open_volumes(
        index: Arc<dyn Volume>,
        phys: Arc<dyn Volume>,
        options: StoreOptions,
        base: Option<PathBuf>,
    ) -> Self {
        let is_new = index.is_empty();
        let space_reclaim = SpaceReclaim::from_mode(options.space_reclaim_mode);
        let mut alloc = Allocator {
            index: index.clone(),
            phys: phys.clone(),
            index_size: 0,
            phys_size: 0,
            free_size: 0,
            space_reclaim,
            size_limit: options.size_limit,
        };
        if is_new {
            alloc.init_new();
        } else {
            alloc.open_existing();
        }
        Store {
            index,
            phys,
            alloc: Mutex::new(alloc),
            locks: std::array::from_fn(|_| RwLock::new(())),
            scratch: ScratchPool::default(),
            options,
            closed: AtomicBool::new(false),
            base,
        }
    }

    pub fn is_read_only(&self) -> bool {
        self.options.read_only
    }

    pub fn can_rollback(&self) -> bool {
        false
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(AtomicOrdering::Acquire)
    }

    /// Caching is out of scope for this store; provided so embedders that
    /// expect a `clear_cache` hook (spec.md §6) have one to call.
    pub fn clear_cache(&self) {}

    pub fn get_size_limit(&self) -> Option<u64> {
        self.options.size_limit
    }

    pub fn get_curr_size(&self) -> u64 {
        self.alloc.lock().phys_size
    }

    pub fn get_free_size(&self) -> u64 {
        self.alloc.lock().free_size
    }

    /// Highest recid ever handed out by `put` (not necessarily still live).
    pub fn get_max_recid(&self) -> u64 {
        let a = self.alloc.lock();
        (a.index_size - IO_USER_START) / 8
    }

    /// Every ioRecid currently sitting on the free-recid stack, translated
    /// back to recids, most-recently-freed first. Non-destructive
    /// (spec.md §9: the source's equivalent is an always-empty iterator).
    pub fn free_recids(&self) -> Vec<u64> {
        let a = self.alloc.lock();
        a.free_recids_snapshot()
            .into_iter()
            .map(|io_recid| (io_recid - IO_USER_START) / 8 + 1)
            .collect()
    }

    pub fn calculate_statistics(&self) -> String {
        self.alloc.lock().statistics()
    }

    /// Persist `index_size`/`phys_size`/`free_size` and, unless
    /// `sync_on_commit` is disabled, fsync both files. A no-op on the
    /// header write when the store is read-only (spec.md §7).
    pub fn commit(&self) {
        if self.options.read_only {
            return;
        }
        let a = self.alloc.lock();
        a.write_header();
        if self.options.sync_on_commit {
            self.index.sync();
            self.phys.sync();
        }
        log::debug!(
            "recio: committed, index_size={} phys_size={} free_size={}",
            a.index_size,
            a.phys_size,
            a.free_size
        );
    }

    /// Always fails: this store has no undo log (spec.md §4.7/§7).
    pub fn rollback(&self) -> Result<(), StoreError> {
        Err(StoreError::Unsupported("rollback"))
    }

    /// Acquire the structural lock and every per-recid write lock, so the
    /// caller has exclusive access to both the allocator state and every
    /// live record. Used by `close` and `compact` (spec.md §5).
    fn lock_everything(&self) -> (parking_lot::MutexGuard<'_, Allocator>, Vec<parking_lot::RwLockWriteGuard<'_, ()>>) {
        let a = self.alloc.lock();
        let writers = self.locks.iter().map(|l| l.write()).collect();
        (a, writers)
    }

    /// Write headers, sync, release the backing volumes, and (if
    /// configured) delete the files. Safe to call more than once.
    pub fn close(&self) {
        if self.closed.swap(true, AtomicOrdering::AcqRel) {
            return;
        }
        let (a, _writers) = self.lock_everything();
        if !self.options.read_only {
            a.write_header();
            self.index.sync();
            self.phys.sync();
        }
        self.index.close();
        self.phys.close();
        if self.options.delete_files_after_close {
            self.index.delete_file();
            self.phys.delete_file();
        }
        log::debug!("recio: closed store");
    }

    pub(crate) fn ensure_not_closed(&self) {
        assert!(!self.is_closed(), "operation on closed store");
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        if !self.is_closed() {
            self.close();
        }
    }
}

mod compact_impl {
    use super::*;
    use crate::chain::{read_payload, write_chain};
    use crate::pp::PP;

    impl Store {
        /// Offline compaction: rewrite the store densely, eliminating
        /// fragmentation. Fails on a read-only store or one not backed by
        /// real files (spec.md §4.7/§7).
        pub fn compact(&mut self) -> Result<(), StoreError> {
            self.ensure_not_closed();
            if self.options.read_only {
                return Err(StoreError::ReadOnly);
            }
            let base = self
                .base
                .clone()
                .ok_or(StoreError::Unsupported("compact on in-memory storage"))?;

            let (mut old_alloc, writers) = self.lock_everything();
            log::debug!("recio: compact starting, old index_size={}", old_alloc.index_size);

            let compact_base = {
                let mut p = base.clone().into_os_string();
                p.push(".compact");
                PathBuf::from(p)
            };
            let new_factory = FileVolumeFactory::new(&compact_base);
            let mut new_store = Store::open_with_factory(
                &new_factory,
                StoreOptions {
                    read_only: false,
                    delete_files_after_close: false,
                    ..self.options.clone()
                },
            );

            {
                let mut new_alloc = new_store.alloc.lock();

                // Migrate the free-recid stack verbatim. The target store
                // tolerates starting from an empty stack (spec.md §9).
                loop {
                    let v = old_alloc.ls_pop(crate::alloc::IO_FREE_RECID);
                    if v == 0 {
                        break;
                    }
                    new_alloc.ls_push(crate::alloc::IO_FREE_RECID, v);
                }

                // Copy the index size so every ioRecid the free-recid
                // stack references (live or not) addresses real space.
                new_alloc.index_size = old_alloc.index_size;
                new_alloc.index.ensure_available(new_alloc.index_size);

                let mut io_recid = IO_USER_START;
                while io_recid < old_alloc.index_size {
                    let pp = PP(old_alloc.index.read_u64(io_recid));
                    if let Some(payload) = read_payload(&*old_alloc.phys, pp) {
                        let new_pps = new_alloc.phys_allocate(payload.len() as u64, true);
                        write_chain(&*new_alloc.phys, &new_pps, &payload);
                        new_alloc
                            .index
                            .write_u64(io_recid, new_pps[0].archived().0);
                    }
                    io_recid += 8;
                }
            }

            new_store.commit();
            new_store.close();

            let timestamp = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap()
                .as_secs();
            let backup_index = with_suffix(&base, &format!(".bak.{}", timestamp));
            let backup_phys = with_suffix(&phys_path(&base), &format!(".bak.{}", timestamp));

            self.index.close();
            self.phys.close();

            std::fs::rename(&base, &backup_index).unwrap();
            std::fs::rename(phys_path(&base), &backup_phys).unwrap();
            std::fs::rename(&compact_base, &base).unwrap();
            std::fs::rename(phys_path(&compact_base), phys_path(&base)).unwrap();
            let _ = std::fs::remove_file(&backup_index);
            let _ = std::fs::remove_file(&backup_phys);

            let reopened_index: Arc<dyn Volume> = Arc::from(crate::volume::FileVolume::new(&base));
            let reopened_phys: Arc<dyn Volume> =
                Arc::from(crate::volume::FileVolume::new(phys_path(&base)));
            old_alloc.open_existing_on(&reopened_index, &reopened_phys);
            // Release the structural lock and every per-recid write lock
            // before touching `self.index`/`self.phys` directly below.
            drop(old_alloc);
            drop(writers);

            self.index = reopened_index;
            self.phys = reopened_phys;

            log::debug!("recio: compact finished");
            Ok(())
        }
    }

    fn phys_path(base: &Path) -> PathBuf {
        let mut p = base.as_os_str().to_os_string();
        p.push(".p");
        PathBuf::from(p)
    }

    fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
        let mut p = base.as_os_str().to_os_string();
        p.push(suffix);
        PathBuf::from(p)
    }
}
