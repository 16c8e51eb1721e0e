//! Free-space manager: the free-recid pool and the free-phys-extent pools,
//! both built on [`crate::longstack`]. See spec.md §4.3.

use crate::alloc::{size2list_iorecid, Allocator, IO_FREE_RECID};
use crate::pp::{round_up16, PP};

impl Allocator {
    /// Return a freed extent to the appropriate size bucket. No-op when
    /// space-reclaim tracking is disabled.
    pub(crate) fn free_phys_put(&mut self, pp: PP) {
        if !self.tracks_free_space() {
            return;
        }
        let size = pp.size();
        if size == 0 {
            return;
        }
        self.free_size += round_up16(size);
        let slot = size2list_iorecid(size);
        self.ls_push(slot, pp.offset());
    }

    /// Obtain an extent of at least `size` bytes, reusing free space when
    /// enabled, otherwise extending `phys_size`.
    pub(crate) fn free_phys_take(&mut self, size: u64, ensure_avail: bool) -> u64 {
        if self.reuses_free_space() {
            let slot = size2list_iorecid(size);
            let offset = self.ls_pop(slot);
            if offset != 0 {
                self.free_size -= round_up16(size);
                return offset;
            }
        }

        let buf_size = self.phys.buf_size();
        if buf_size > 0 {
            let start_block = self.phys_size / buf_size;
            let end_block = (self.phys_size + size - 1) / buf_size;
            if end_block > start_block {
                log::trace!(
                    "recio: extent of size {} would straddle a {}-byte volume boundary, padding phys_size {} -> {}",
                    size,
                    buf_size,
                    self.phys_size,
                    end_block * buf_size
                );
                self.phys_size = end_block * buf_size;
            }
        }

        let offset = self.phys_size;
        self.phys_size = round_up16(self.phys_size + size);
        if let Some(limit) = self.size_limit {
            assert!(
                self.phys_size <= limit,
                "phys size {} exceeds configured limit {}",
                self.phys_size,
                limit
            );
        }
        if ensure_avail {
            self.phys.ensure_available(self.phys_size);
        }
        offset
    }

    /// Push a freed ioRecid onto the free-recid stack. No-op when tracking
    /// is disabled (recids then strictly increase, per spec.md §8 property 4).
    pub(crate) fn free_iorecid_put(&mut self, io_recid: u64) {
        if !self.tracks_free_space() {
            return;
        }
        self.ls_push(IO_FREE_RECID, io_recid);
    }

    /// Pop a freed ioRecid, or grow `index_size` by one slot.
    pub(crate) fn free_iorecid_take(&mut self, ensure_avail: bool) -> u64 {
        let v = self.ls_pop(IO_FREE_RECID);
        if v != 0 {
            return v;
        }
        let slot = self.index_size;
        self.index_size += 8;
        if ensure_avail {
            self.index.ensure_available(self.index_size);
        }
        slot
    }

    /// Non-destructive snapshot of every ioRecid currently on the free-recid
    /// stack, head first. Backs `Store::free_recids` (spec.md §9: the
    /// source's `getFreeRecids` is an unimplemented empty iterator).
    pub(crate) fn free_recids_snapshot(&self) -> Vec<u64> {
        self.ls_snapshot(IO_FREE_RECID)
    }

    /// Human-readable summary of allocator state, iterating the 4096
    /// buckets directly by stride (spec.md §9: the source's
    /// `calculateStatistics` confuses an outer loop variable with the
    /// per-bucket stride; this walks buckets by index, not by accumulating
    /// size).
    pub(crate) fn statistics(&self) -> String {
        let mut non_empty_buckets = 0usize;
        let mut free_extents = 0usize;
        for bucket in 0..crate::alloc::PHYS_FREE_SLOTS_COUNT {
            let slot = crate::alloc::IO_FREE_PHYS + bucket * 8;
            let entries = self.ls_snapshot(slot);
            if !entries.is_empty() {
                non_empty_buckets += 1;
                free_extents += entries.len();
            }
        }
        let free_recids = self.free_recids_snapshot().len();
        format!(
            "index_size={} phys_size={} free_size={} free_extents={} non_empty_buckets={} free_recids={}",
            self.index_size, self.phys_size, self.free_size, free_extents, non_empty_buckets, free_recids
        )
    }
}
