//! LongStack: an intrusive LIFO stack of 48-bit values stored in linked
//! physical pages, addressed by one index-file slot. See spec.md §4.2.
//!
//! Grounded in the teacher's `BlockStg` free-list chaining (`block.rs`,
//! `next_free`/`free_block`), generalized from a single-value-per-slot
//! linked list to a multi-value-per-page stack.

use crate::alloc::{Allocator, LONG_STACK_PREF_SIZE};
use crate::pp::{pack48, unpack48, PP};

impl Allocator {
    /// Pop the top value off the stack rooted at `head_slot`, or 0 if empty.
    pub(crate) fn ls_pop(&mut self, head_slot: u64) -> u64 {
        let word = self.index.read_u64(head_slot);
        let (pos, data_offset) = unpack48(word);
        if data_offset == 0 {
            return 0;
        }
        let ret = self.phys.read_u48(data_offset + pos);
        if pos == 8 {
            // Page is now empty.
            let header = self.phys.read_u64(data_offset);
            let (this_page_size, prev_page_offset) = unpack48(header);
            if prev_page_offset != 0 {
                let prev_size = self.phys.read_u16(prev_page_offset) as u64;
                debug_assert!((prev_size - 8) % 6 == 0, "misaligned LongStack page");
                self.index
                    .write_u64(head_slot, pack48(prev_size - 6, prev_page_offset));
            } else {
                self.index.write_u64(head_slot, 0);
            }
            self.free_phys_put(PP(PP::raw(this_page_size, data_offset)));
        } else {
            self.index.write_u64(head_slot, pack48(pos - 6, data_offset));
        }
        ret
    }

    /// Push `value48` onto the stack rooted at `head_slot`. `value48` must
    /// fit in 48 bits.
    pub(crate) fn ls_push(&mut self, head_slot: u64, value48: u64) {
        debug_assert!(value48 >> 48 == 0, "LongStack value {} too large", value48);
        let word = self.index.read_u64(head_slot);
        let (pos, data_offset) = unpack48(word);

        if data_offset == 0 {
            let new_page = self.new_longstack_page(0);
            self.phys.write_u48(new_page + 8, value48);
            self.index.write_u64(head_slot, pack48(8, new_page));
            return;
        }

        let (page_size, _prev) = unpack48(self.phys.read_u64(data_offset));
        if pos + 6 == page_size {
            let new_page = self.new_longstack_page(data_offset);
            self.phys.write_u48(new_page + 8, value48);
            self.index.write_u64(head_slot, pack48(8, new_page));
        } else {
            let pos = pos + 6;
            self.phys.write_u48(data_offset + pos, value48);
            self.index.write_u64(head_slot, pack48(pos, data_offset));
        }
    }

    /// Allocate and initialize a fresh LongStack page chained to `prev`.
    fn new_longstack_page(&mut self, prev: u64) -> u64 {
        let new_page = self.free_phys_take(LONG_STACK_PREF_SIZE, true);
        self.phys
            .write_u64(new_page, pack48(LONG_STACK_PREF_SIZE, prev));
        new_page
    }

    /// Read-only walk of the LongStack rooted at `head_slot`, head (most
    /// recently pushed) first. Does not mutate the stack. Used by
    /// `get_free_recids` (spec.md §9: the source leaves this unimplemented).
    pub(crate) fn ls_snapshot(&self, head_slot: u64) -> Vec<u64> {
        let mut result = Vec::new();
        let word = self.index.read_u64(head_slot);
        let (mut pos, mut offset) = unpack48(word);
        while offset != 0 {
            let mut p = pos;
            loop {
                result.push(self.phys.read_u48(offset + p));
                if p == 8 {
                    break;
                }
                p -= 6;
            }
            let (_this_size, prev_offset) = unpack48(self.phys.read_u64(offset));
            if prev_offset == 0 {
                break;
            }
            let prev_size = self.phys.read_u16(prev_offset) as u64;
            pos = prev_size - 6;
            offset = prev_offset;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use crate::alloc::{Allocator, SpaceReclaim, IO_FREE_RECID};
    use crate::volume::MemVolume;
    use std::sync::Arc;

    fn test_alloc() -> Allocator {
        let index = Arc::new(MemVolume::new());
        let phys = Arc::new(MemVolume::new());
        phys.ensure_available(16);
        Allocator {
            index,
            phys,
            index_size: crate::alloc::IO_USER_START,
            phys_size: 16,
            free_size: 0,
            space_reclaim: SpaceReclaim::TrackAndReuse,
            size_limit: None,
        }
    }

    use crate::volume::Volume;

    #[test]
    fn push_pop_lifo_single_page() {
        let mut a = test_alloc();
        for v in [1u64, 2, 3, 4, 5] {
            a.ls_push(IO_FREE_RECID, v);
        }
        for v in [5u64, 4, 3, 2, 1] {
            assert_eq!(a.ls_pop(IO_FREE_RECID), v);
        }
        assert_eq!(a.ls_pop(IO_FREE_RECID), 0);
    }

    #[test]
    fn push_pop_spans_multiple_pages() {
        let mut a = test_alloc();
        let n = 204 * 3 + 7; // several LongStack pages worth
        for v in 1..=n {
            a.ls_push(IO_FREE_RECID, v);
        }
        for v in (1..=n).rev() {
            assert_eq!(a.ls_pop(IO_FREE_RECID), v);
        }
        assert_eq!(a.ls_pop(IO_FREE_RECID), 0);
    }

    #[test]
    fn snapshot_is_non_destructive() {
        let mut a = test_alloc();
        for v in [10u64, 20, 30] {
            a.ls_push(IO_FREE_RECID, v);
        }
        assert_eq!(a.ls_snapshot(IO_FREE_RECID), vec![30, 20, 10]);
        assert_eq!(a.ls_snapshot(IO_FREE_RECID), vec![30, 20, 10]);
        assert_eq!(a.ls_pop(IO_FREE_RECID), 30);
    }
}
