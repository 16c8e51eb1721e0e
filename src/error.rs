//! Error taxonomy for the handful of store operations that can fail as a
//! matter of course rather than as a programming fault. Everything else
//! (I/O failure, header corruption, a serializer that under/over-reads,
//! out-of-range sizes) panics, matching the teacher's own storage-layer
//! idiom (`stg.rs`, `block.rs`, `compact.rs` all assert/unwrap rather than
//! thread a `Result` through low-level storage code) and spec.md §7's own
//! description of those as "unchecked".

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// `compact` was called on a store opened read-only.
    #[error("store is read-only")]
    ReadOnly,
    /// `rollback` is permanently unsupported: this store has no undo log.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),
}
