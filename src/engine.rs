//! The record engine: put / get / update / compareAndSwap / delete over
//! recids, with per-recid locking (spec.md §4.5). Grounded in the
//! teacher's lock-then-release-early discipline in `pstore.rs`
//! (`AccessPagedData::set_data` reads, then locks the stash only as long
//! as needed before writing to the underlying file).

use crate::alloc::IO_USER_START;
use crate::chain::{linked_chain, read_payload, write_chain};
use crate::pp::PP;
use crate::serializer::{ByteArraySerializer, Serializer};
use crate::store::{Store, NLOCK};
use rustc_hash::FxHasher;
use std::hash::Hasher;

fn lock_index(recid: u64) -> usize {
    let mut h = FxHasher::default();
    h.write_u64(recid);
    (h.finish() as usize) & (NLOCK - 1)
}

fn io_recid(recid: u64) -> u64 {
    assert!(recid >= 1, "recid 0 is reserved");
    IO_USER_START + (recid - 1) * 8
}

impl Store {
    /// Store `value`, returning its freshly allocated recid.
    pub fn put<T>(&self, value: &T, ser: &impl Serializer<T>) -> u64 {
        self.ensure_not_closed();
        let mut buf = self.scratch.take();
        ser.serialize(value, &mut buf);

        let (io, pps) = {
            let mut a = self.alloc.lock();
            let io = a.free_iorecid_take(true);
            let pps = a.phys_allocate(buf.len() as u64, true);
            (io, pps)
        };

        write_chain(&*self.phys, &pps, &buf);
        self.index.write_u64(io, pps[0].archived().0);

        self.scratch.offer(buf);
        let recid = (io - IO_USER_START) / 8 + 1;
        log::trace!(
            "recio: put recid={} bytes={}",
            recid,
            pps.iter().map(|p| p.size()).sum::<u64>()
        );
        recid
    }

    /// Fetch and deserialize the value stored at `recid`, or `None` if
    /// absent (a never-written or deleted recid).
    pub fn get<T>(&self, recid: u64, ser: &impl Serializer<T>) -> Option<T> {
        self.ensure_not_closed();
        let io = io_recid(recid);
        let _guard = self.locks[lock_index(recid)].read();
        let pp = PP(self.index.read_u64(io));
        let payload = read_payload(&*self.phys, pp)?;
        Some(ser.deserialize(&payload))
    }

    /// Raw byte fetch, bypassing the `Serializer` trait.
    pub fn get_raw(&self, recid: u64) -> Option<Vec<u8>> {
        self.get(recid, &ByteArraySerializer)
    }

    /// Overwrite the value stored at `recid`. The old extents are returned
    /// to the free pool when space-reclaim tracking is enabled.
    pub fn update<T>(&self, recid: u64, value: &T, ser: &impl Serializer<T>) {
        self.ensure_not_closed();
        let io = io_recid(recid);
        let mut buf = self.scratch.take();
        ser.serialize(value, &mut buf);

        let _guard = self.locks[lock_index(recid)].write();
        let old_pp = PP(self.index.read_u64(io));

        let pps = {
            let mut a = self.alloc.lock();
            if a.tracks_free_space() {
                self.free_old_chain(&mut a, old_pp);
            }
            a.phys_allocate(buf.len() as u64, true)
        };

        write_chain(&*self.phys, &pps, &buf);
        self.index.write_u64(io, pps[0].archived().0);
        self.scratch.offer(buf);
    }

    pub fn update_raw(&self, recid: u64, value: &[u8]) {
        self.update(recid, &value.to_vec(), &ByteArraySerializer);
    }

    /// Atomically replace the value at `recid` with `new` iff its current
    /// value equals `expected`, comparing via the deserialized domain type.
    /// Returns whether the swap happened. No mutation and no extent is
    /// freed on a failed comparison.
    pub fn compare_and_swap<T: PartialEq>(
        &self,
        recid: u64,
        expected: Option<&T>,
        new: &T,
        ser: &impl Serializer<T>,
    ) -> bool {
        self.ensure_not_closed();
        let io = io_recid(recid);
        let mut buf = self.scratch.take();
        ser.serialize(new, &mut buf);

        let _guard = self.locks[lock_index(recid)].write();
        let old_pp = PP(self.index.read_u64(io));
        let current = read_payload(&*self.phys, old_pp).map(|bytes| ser.deserialize(&bytes));

        let matches = match (current.as_ref(), expected) {
            (None, None) => true,
            (Some(c), Some(e)) => c == e,
            _ => false,
        };
        if !matches {
            self.scratch.offer(buf);
            return false;
        }

        let pps = {
            let mut a = self.alloc.lock();
            if a.tracks_free_space() {
                self.free_old_chain(&mut a, old_pp);
            }
            a.phys_allocate(buf.len() as u64, true)
        };

        write_chain(&*self.phys, &pps, &buf);
        self.index.write_u64(io, pps[0].archived().0);
        self.scratch.offer(buf);
        true
    }

    /// Remove `recid`. Its index slot is zeroed (keeping the archive flag)
    /// and, when tracking is enabled, its ioRecid and physical extents are
    /// returned to the free pools.
    pub fn delete(&self, recid: u64) {
        self.ensure_not_closed();
        let io = io_recid(recid);
        let _guard = self.locks[lock_index(recid)].write();
        let pp = PP(self.index.read_u64(io));
        self.index.write_u64(io, PP::EMPTY.archived().0);

        let mut a = self.alloc.lock();
        if !a.tracks_free_space() {
            return;
        }
        a.free_iorecid_put(io);
        self.free_old_chain(&mut a, pp);
    }

    /// Free `pp` and every extent in its chain, in chain order.
    fn free_old_chain(&self, a: &mut crate::alloc::Allocator, pp: PP) {
        if pp.is_empty() {
            return;
        }
        let chain = linked_chain(&*self.phys, pp);
        a.free_phys_put(pp);
        for entry in chain {
            if entry.is_empty() {
                break;
            }
            a.free_phys_put(entry);
        }
    }
}
