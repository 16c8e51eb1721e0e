//! An embedded record store mapping non-negative integer `recid`s to
//! opaque byte payloads.
//!
//! ```
//! use recio::{Store, StoreOptions, ByteArraySerializer};
//!
//! let store = Store::open_in_memory(StoreOptions::default());
//! let recid = store.put(&b"hello".to_vec(), &ByteArraySerializer);
//! assert_eq!(store.get_raw(recid), Some(b"hello".to_vec()));
//! store.commit();
//! ```
//!
//! General design
//!
//! A `recid` indexes a fixed-size slot in the `index` file holding a
//! [`pp::PP`] (physical pointer): a packed size/offset/flags word pointing
//! into the `phys` file, where the record's bytes actually live. Payloads
//! too large for one extent are split into a linked chain (see
//! [`chain`]/[`physalloc`]).
//!
//! Freed recid slots and freed physical extents are recycled through
//! [`longstack`]-backed pools (see [`freespace`]), configurable via
//! [`store::StoreOptions::space_reclaim_mode`]. `put`/`get`/`update`/
//! `compare_and_swap`/`delete` are implemented in [`engine`]; store
//! lifecycle (`open`/`commit`/`close`/`compact`/`rollback`) lives in
//! [`store`].
//!
//! Concurrency: reads and writes to distinct recids proceed without
//! contending on a single lock, via [`store::NLOCK`] striped
//! `parking_lot::RwLock`s; allocator bookkeeping (header fields, the
//! LongStacks, the free pools) is serialized behind one structural
//! `parking_lot::Mutex`, released before any record payload is written to
//! the `phys` file.

/// Packed physical pointers and 48-bit index-word packing.
pub mod pp;

/// Abstract random-access byte storage (`Volume`, `FileVolume`, `MemVolume`).
pub mod volume;

/// Header bookkeeping shared by the LongStack, free-space, and physical
/// allocator components.
pub mod alloc;

/// Intrusive linked-page LIFO stacks backing the free pools.
pub mod longstack;

/// Free-recid and free-phys-extent pools.
pub mod freespace;

/// Physical extent allocation, including multi-extent chains.
pub mod physalloc;

/// Reading and writing record extent chains.
pub mod chain;

/// The `StoreError` type.
pub mod error;

/// The `Serializer` trait, `ByteArraySerializer`, and `ScratchPool`.
pub mod serializer;

/// Store construction, lifecycle, and offline compaction.
pub mod store;

/// `put`/`get`/`update`/`compare_and_swap`/`delete` over recids.
pub mod engine;

pub use error::StoreError;
pub use pp::PP;
pub use serializer::{ByteArraySerializer, Serializer};
pub use store::{Store, StoreOptions};
pub use volume::{FileVolume, FileVolumeFactory, MemVolume, MemVolumeFactory, Volume, VolumeFactory};
