//! Serializer contract (spec.md §6) and the scratch-buffer pool writes are
//! staged through (spec.md §4.6). Grounded in the teacher's `Record` trait
//! (`bytes.rs`/`sortedfile.rs`), which similarly saves into a caller-owned
//! byte buffer rather than returning one.

use parking_lot::Mutex;

/// Converts between a domain value and its on-disk byte encoding. Must
/// consume exactly `data.len()` bytes on `deserialize` - the engine treats
/// a mismatch as an internal fault (spec.md §7).
pub trait Serializer<T> {
    fn serialize(&self, value: &T, buf: &mut Vec<u8>);
    fn deserialize(&self, data: &[u8]) -> T;
}

/// Pass-through serializer for raw byte payloads, backing `get_raw`/`put_raw`/`update_raw`.
pub struct ByteArraySerializer;

impl Serializer<Vec<u8>> for ByteArraySerializer {
    fn serialize(&self, value: &Vec<u8>, buf: &mut Vec<u8>) {
        buf.extend_from_slice(value);
    }

    fn deserialize(&self, data: &[u8]) -> Vec<u8> {
        data.to_vec()
    }
}

/// Bounded MPMC pool of reusable scratch write buffers (spec.md §4.6).
/// `take`/`offer` never block; `offer` silently discards once the pool is
/// at capacity, matching spec.md's "dropping under contention is
/// acceptable" - the caller always gets a fresh `Vec` on the next `take`.
pub struct ScratchPool {
    buffers: Mutex<Vec<Vec<u8>>>,
    capacity: usize,
}

impl ScratchPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffers: Mutex::new(Vec::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn take(&self) -> Vec<u8> {
        self.buffers.lock().pop().unwrap_or_default()
    }

    pub fn offer(&self, mut buf: Vec<u8>) {
        buf.clear();
        let mut b = self.buffers.lock();
        if b.len() < self.capacity {
            b.push(buf);
        }
    }
}

impl Default for ScratchPool {
    fn default() -> Self {
        Self::new(128)
    }
}
