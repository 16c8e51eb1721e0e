//! Physical extent allocation: one extent per payload, or a chain of
//! extents when the payload exceeds [`MAX_REC_SIZE`]. See spec.md §4.4.

use crate::alloc::Allocator;
use crate::pp::{PP, MAX_REC_SIZE};

impl Allocator {
    /// Allocate one or more extents able to hold `size` bytes of payload.
    /// Returns the chain head-first; every entry but the last has `linked`
    /// set, and its first 8 bytes are reserved for the next extent's PP.
    pub(crate) fn phys_allocate(&mut self, size: u64, ensure_avail: bool) -> Vec<PP> {
        if size == 0 {
            return vec![PP::EMPTY];
        }
        if size < MAX_REC_SIZE {
            let offset = self.free_phys_take(size, ensure_avail);
            return vec![PP::encode(size as u16, offset, false, true, false)];
        }

        let mut result = Vec::new();
        let mut remaining = size;
        loop {
            let (alloc_size, linked) = if remaining <= MAX_REC_SIZE {
                (remaining, false)
            } else {
                (MAX_REC_SIZE, true)
            };
            let offset = self.free_phys_take(alloc_size, ensure_avail);
            result.push(PP::encode(alloc_size as u16, offset, linked, true, false));
            if !linked {
                break;
            }
            remaining -= alloc_size - 8;
        }
        result
    }
}
