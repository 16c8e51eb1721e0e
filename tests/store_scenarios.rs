//! Concrete scenarios and cross-cutting invariants exercised end to end
//! against the public `Store` API, grounded in the store-level
//! integration tests of the `HeroicKatora-shmfd` shared-memory storage
//! crate in the reference pack (one `tests/` file per storage engine,
//! rather than only inline unit tests).

use recio::{ByteArraySerializer, Store, StoreOptions};
use std::path::PathBuf;

fn temp_base(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("recio-test-{}-{}", std::process::id(), name))
}

fn cleanup(base: &PathBuf) {
    let mut phys = base.clone().into_os_string();
    phys.push(".p");
    let _ = std::fs::remove_file(base);
    let _ = std::fs::remove_file(phys);
}

#[test]
fn s1_small_put_get() {
    let store = Store::open_in_memory(StoreOptions::default());
    let r = store.put(&b"hello".to_vec(), &ByteArraySerializer);
    assert_eq!(r, 1);
    assert_eq!(store.get_raw(r), Some(b"hello".to_vec()));
    assert_eq!(store.get_max_recid(), 1);
}

#[test]
fn s2_linked_chain() {
    let store = Store::open_in_memory(StoreOptions::default());
    let payload = vec![0xABu8; 200_000];
    let r = store.put(&payload, &ByteArraySerializer);
    assert_eq!(store.get_raw(r), Some(payload));
}

#[test]
fn s3_reuse_same_size_offset() {
    let store = Store::open_in_memory(StoreOptions::default().space_reclaim_mode(5));
    let _r100 = store.put(&vec![0u8; 100], &ByteArraySerializer);
    let r200 = store.put(&vec![0u8; 200], &ByteArraySerializer);
    let _r300 = store.put(&vec![0u8; 300], &ByteArraySerializer);

    let before_free = store.get_free_size();
    store.delete(r200);
    assert!(store.get_free_size() > before_free);

    let r_new = store.put(&vec![1u8; 200], &ByteArraySerializer);
    // LIFO reuse of the freed recid slot.
    assert_eq!(r_new, r200);
}

#[test]
fn s4_cas_semantics() {
    let store = Store::open_in_memory(StoreOptions::default());
    let r = store.put(&b"a".to_vec(), &ByteArraySerializer);

    let swapped = store.compare_and_swap(
        r,
        Some(&b"b".to_vec()),
        &b"c".to_vec(),
        &ByteArraySerializer,
    );
    assert!(!swapped);
    assert_eq!(store.get_raw(r), Some(b"a".to_vec()));

    let swapped = store.compare_and_swap(
        r,
        Some(&b"a".to_vec()),
        &b"c".to_vec(),
        &ByteArraySerializer,
    );
    assert!(swapped);
    assert_eq!(store.get_raw(r), Some(b"c".to_vec()));
}

#[test]
fn s5_reopen_after_commit_close() {
    let base = temp_base("s5");
    cleanup(&base);

    let payload = vec![0xABu8; 200_000];
    let (curr_size, index_size, recid) = {
        let store = Store::open(&base, StoreOptions::default());
        let r = store.put(&payload, &ByteArraySerializer);
        store.commit();
        let curr_size = store.get_curr_size();
        let index_size = store.get_max_recid();
        store.close();
        (curr_size, index_size, r)
    };

    {
        let store = Store::open(&base, StoreOptions::default());
        assert_eq!(store.get_raw(recid), Some(payload));
        assert_eq!(store.get_curr_size(), curr_size);
        assert_eq!(store.get_max_recid(), index_size);
    }

    cleanup(&base);
}

#[test]
fn s6_compact_after_reuse() {
    let base = temp_base("s6");
    cleanup(&base);

    let (r100, r300, r_new) = {
        let mut store = Store::open(&base, StoreOptions::default().space_reclaim_mode(5));
        let r100 = store.put(&vec![7u8; 100], &ByteArraySerializer);
        let r200 = store.put(&vec![8u8; 200], &ByteArraySerializer);
        let r300 = store.put(&vec![9u8; 300], &ByteArraySerializer);
        store.delete(r200);
        let r_new = store.put(&vec![1u8; 200], &ByteArraySerializer);
        store.commit();

        let size_before = store.get_curr_size();
        store.compact().expect("compact should succeed on a file-backed, writable store");
        assert!(store.get_curr_size() <= size_before);

        assert_eq!(store.get_raw(r100), Some(vec![7u8; 100]));
        assert_eq!(store.get_raw(r300), Some(vec![9u8; 300]));
        assert_eq!(store.get_raw(r_new), Some(vec![1u8; 200]));

        (r100, r300, r_new)
    };

    // Reopen to confirm the compacted files are durable and well formed.
    let store = Store::open(&base, StoreOptions::default());
    assert_eq!(store.get_raw(r100), Some(vec![7u8; 100]));
    assert_eq!(store.get_raw(r300), Some(vec![9u8; 300]));
    assert_eq!(store.get_raw(r_new), Some(vec![1u8; 200]));

    cleanup(&base);
}

#[test]
fn compact_on_in_memory_store_is_unsupported() {
    let mut store = Store::open_in_memory(StoreOptions::default());
    assert!(store.compact().is_err());
}

#[test]
fn rollback_is_always_unsupported() {
    let store = Store::open_in_memory(StoreOptions::default());
    assert!(store.rollback().is_err());
    assert!(!store.can_rollback());
}

#[test]
fn no_double_free_across_interleaved_mutations() {
    let store = Store::open_in_memory(StoreOptions::default().space_reclaim_mode(5));
    let mut live = Vec::new();
    for i in 0..50u64 {
        let size = 16 + (i as usize % 7) * 37;
        let r = store.put(&vec![i as u8; size], &ByteArraySerializer);
        live.push((r, size));
    }
    // Delete every third recid, then reallocate; every surviving live
    // recid must still read back its untouched payload, proving the
    // allocator never handed out an offset still backing a live record.
    for (i, (r, _)) in live.iter().enumerate() {
        if i % 3 == 0 {
            store.delete(*r);
        }
    }
    for i in 0..20u64 {
        let size = 16 + (i as usize % 7) * 37;
        store.put(&vec![0xFFu8; size], &ByteArraySerializer);
    }
    for (i, (r, size)) in live.iter().enumerate() {
        if i % 3 != 0 {
            assert_eq!(store.get_raw(*r), Some(vec![i as u8; *size]));
        }
    }
}
