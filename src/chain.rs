//! Reading and writing record extent chains (spec.md §4.5, `getLinkedChain`
//! / `writePpChain`). Shared by the record engine and by compaction, which
//! both need to walk a possibly-multi-extent payload.

use crate::pp::PP;
use crate::volume::Volume;

/// Every PP in the chain rooted at `head` after the head itself, in chain
/// order, by following the 8-byte next-pointer header of each extent.
/// Empty if `head` is not linked.
pub(crate) fn linked_chain(phys: &dyn Volume, head: PP) -> Vec<PP> {
    if !head.linked() {
        return Vec::new();
    }
    let mut result = Vec::new();
    let mut cur = head;
    loop {
        let next = PP(phys.read_u64(cur.offset()));
        result.push(next);
        if !next.linked() {
            break;
        }
        cur = next;
    }
    result
}

/// Read the full payload described by `head` (and its chain, if linked).
/// Returns `None` if `head` is the empty pointer.
pub(crate) fn read_payload(phys: &dyn Volume, head: PP) -> Option<Vec<u8>> {
    if head.is_empty() {
        return None;
    }
    if !head.linked() {
        let mut buf = vec![0u8; head.size() as usize];
        phys.read(head.offset(), &mut buf);
        return Some(buf);
    }
    let mut result = Vec::new();
    let mut cur = head;
    loop {
        let linked = cur.linked();
        let c: u64 = if linked { 8 } else { 0 };
        let payload_len = (cur.size() - c) as usize;
        let start = result.len();
        result.resize(start + payload_len, 0);
        phys.read(cur.offset() + c, &mut result[start..]);
        if !linked {
            break;
        }
        cur = PP(phys.read_u64(cur.offset()));
    }
    Some(result)
}

/// Write `payload` across the extents in `pps` (head first), chaining each
/// non-tail extent's 8-byte header to the next extent's PP.
pub(crate) fn write_chain(phys: &dyn Volume, pps: &[PP], payload: &[u8]) {
    if pps.len() == 1 && !pps[0].linked() {
        phys.write(pps[0].offset(), payload);
        return;
    }
    let mut done = 0usize;
    for (i, pp) in pps.iter().enumerate() {
        let is_last = i + 1 == pps.len();
        let c: u64 = if is_last { 0 } else { 8 };
        let n = (pp.size() - c) as usize;
        phys.write(pp.offset() + c, &payload[done..done + n]);
        done += n;
        if !is_last {
            phys.write_u64(pp.offset(), pps[i + 1].0);
        }
    }
    debug_assert_eq!(done, payload.len());
}
