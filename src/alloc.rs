//! The allocator: index/phys header bookkeeping plus the state the
//! LongStack, free-space and physical-allocator components ([`crate::longstack`],
//! [`crate::freespace`], [`crate::physalloc`]) mutate under the store's
//! structural lock. Modeled as one struct the way the teacher's `BlockStg`
//! (`block.rs`) combines its logical and physical free lists: these
//! subsystems are mutually recursive (a LongStack push can itself need to
//! take a physical extent, which may pop a different LongStack bucket) so
//! keeping them behind one lock on one struct is simpler than threading
//! borrows between separate owners.

use crate::volume::Volume;
use std::sync::Arc;

/// First 8 bytes of both files.
pub const MAGIC: u64 = 0x7D54_B70D_34A1_FA5A;

/// Header slot holding the allocated index file length.
pub const IO_INDEX_SIZE: u64 = 1 * 8;
/// Header slot holding the allocated phys file length.
pub const IO_PHYS_SIZE: u64 = 2 * 8;
/// Header slot holding the tracked free-phys byte count (statistics only).
pub const IO_FREE_SIZE: u64 = 3 * 8;
/// Header slot holding the LongStack head for freed recids.
pub const IO_FREE_RECID: u64 = 15 * 8;
/// Number of free-phys-extent buckets, 16-byte granularity.
pub const PHYS_FREE_SLOTS_COUNT: u64 = 4096;
/// Base offset of the free-phys bucket LongStack heads.
pub const IO_FREE_PHYS: u64 = 16 * 8;
/// Start of the user-recid region of the index file.
pub const IO_USER_START: u64 = (16 + PHYS_FREE_SLOTS_COUNT + 1) * 8;

/// recid 0 is reserved and never allocated; this implementation does not
/// reserve any further slots beyond it (see DESIGN.md for the Open
/// Question this resolves).
pub const LAST_RESERVED_RECID: u64 = 0;

/// Preferred LongStack page size: an 8-byte header plus 204 six-byte slots.
pub const LONG_STACK_PREF_SIZE: u64 = 8 + 204 * 6;

/// Bucket index (an IO_FREE_PHYS-relative LongStack head slot) for free
/// extents of the given size, 16-byte granularity.
pub fn size2list_iorecid(size: u64) -> u64 {
    debug_assert!(size >= 1);
    IO_FREE_PHYS + ((size - 1) / 16) * 8
}

/// Space-reclaim behavior selected at construction time (spec.md §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpaceReclaim {
    /// Tracking off, reuse off: delete does not record free space.
    Off,
    /// Tracking on, reuse off: free space is recorded but never reused.
    TrackOnly,
    /// Tracking on, reuse on.
    TrackAndReuse,
}

impl SpaceReclaim {
    pub fn from_mode(mode: u8) -> Self {
        match mode {
            0 => SpaceReclaim::Off,
            1 | 2 => SpaceReclaim::TrackOnly,
            3..=5 => SpaceReclaim::TrackAndReuse,
            _ => panic!("space_reclaim_mode must be in 0..=5, got {}", mode),
        }
    }

    fn tracks(self) -> bool {
        !matches!(self, SpaceReclaim::Off)
    }

    fn reuses(self) -> bool {
        matches!(self, SpaceReclaim::TrackAndReuse)
    }
}

/// Structural state shared by the LongStack, free-space and physical
/// allocator components. Always accessed behind the store's structural
/// lock (see [`crate::store::Store`]).
pub struct Allocator {
    pub(crate) index: Arc<dyn Volume>,
    pub(crate) phys: Arc<dyn Volume>,
    pub(crate) index_size: u64,
    pub(crate) phys_size: u64,
    pub(crate) free_size: u64,
    pub(crate) space_reclaim: SpaceReclaim,
    pub(crate) size_limit: Option<u64>,
}

impl Allocator {
    pub(crate) fn tracks_free_space(&self) -> bool {
        self.space_reclaim.tracks()
    }

    pub(crate) fn reuses_free_space(&self) -> bool {
        self.space_reclaim.reuses()
    }

    /// Write a freshly created store's headers: magic, initial sizes, and
    /// zero-filled header region. `recid`s below `LAST_RESERVED_RECID` (none,
    /// by this implementation's convention) are left at 0.
    pub(crate) fn init_new(&mut self) {
        self.index.write_u64(0, MAGIC);
        self.phys.write_u64(0, MAGIC);
        self.index_size = IO_USER_START + LAST_RESERVED_RECID * 8;
        self.phys_size = 16;
        self.free_size = 0;
        self.index.ensure_available(self.index_size);
        self.phys.ensure_available(self.phys_size);
        self.write_header();
        log::debug!(
            "recio: created new store, index_size={} phys_size={}",
            self.index_size,
            self.phys_size
        );
    }

    /// Validate an existing store's headers and load `index_size`,
    /// `phys_size` and `free_size` from their own slots (the teacher's
    /// `freeSize`-aliasing bug described in spec.md §9 does not apply here:
    /// each field is read from its own slot).
    pub(crate) fn open_existing(&mut self) {
        let index_magic = self.index.read_u64(0);
        let phys_magic = self.phys.read_u64(0);
        assert!(
            index_magic == MAGIC && phys_magic == MAGIC,
            "store header magic mismatch: index={:#x} phys={:#x}",
            index_magic,
            phys_magic
        );
        self.index_size = self.index.read_u64(IO_INDEX_SIZE);
        self.phys_size = self.index.read_u64(IO_PHYS_SIZE);
        self.free_size = self.index.read_u64(IO_FREE_SIZE);
        assert!(self.index_size >= IO_USER_START, "corrupt index_size");
        assert!(self.index_size % 8 == 0, "corrupt index_size alignment");
        assert!(self.phys_size >= 16 && self.phys_size % 16 == 0, "corrupt phys_size");
        log::debug!(
            "recio: opened store, index_size={} phys_size={} free_size={}",
            self.index_size,
            self.phys_size,
            self.free_size
        );
    }

    /// Re-point this allocator at a freshly reopened pair of volumes and
    /// reload header state from them. Used by `Store::compact` once the
    /// rename dance has put the compacted files in place.
    pub(crate) fn open_existing_on(&mut self, index: &Arc<dyn Volume>, phys: &Arc<dyn Volume>) {
        self.index = index.clone();
        self.phys = phys.clone();
        self.open_existing();
    }

    /// Persist `index_size`, `phys_size` and `free_size` to their header slots.
    pub(crate) fn write_header(&self) {
        self.index.write_u64(IO_INDEX_SIZE, self.index_size);
        self.index.write_u64(IO_PHYS_SIZE, self.phys_size);
        self.index.write_u64(IO_FREE_SIZE, self.free_size);
    }
}
