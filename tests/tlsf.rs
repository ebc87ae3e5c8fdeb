//! End-to-end scenarios for the TLSF pool (spec §4.8).

use rtalloc::TlsfPool;

#[test]
fn basic_allocate_free_round_trip() {
    let mut pool = TlsfPool::new(1 << 16).unwrap();
    let ptr = pool.alloc(128).unwrap();
    assert!(!ptr.is_null());
    pool.free(ptr).unwrap();
}

#[test]
fn many_small_allocations_across_distinct_size_classes_all_free_cleanly() {
    let mut pool = TlsfPool::new(1 << 20).unwrap();
    let sizes = [16, 24, 40, 96, 200, 513, 1025, 4097, 16385];

    let ptrs: std::vec::Vec<_> = sizes.iter().map(|&s| pool.alloc(s).unwrap()).collect();
    for ptr in ptrs {
        pool.free(ptr).unwrap();
    }
}

/// Regression test for the `MIN_BLOCK_SIZE`/`mapping_search` fix: freeing a
/// degenerate-size (below `1 << SLI`) block must not panic on an
/// out-of-range second-level index, even when its physical neighbor is
/// still allocated and so cannot be coalesced away first.
#[test]
fn freeing_a_degenerate_size_block_with_an_allocated_neighbor_does_not_panic() {
    let mut pool = TlsfPool::new(1 << 16).unwrap();

    let small = pool.alloc(16).unwrap();
    let neighbor = pool.alloc(256).unwrap();

    pool.free(small).unwrap();

    let reused = pool.alloc(16).unwrap();
    assert!(!reused.is_null());

    pool.free(neighbor).unwrap();
    pool.free(reused).unwrap();
}

/// Regression test for the `RemoveFreeBlock` first-level bitmap fix: after
/// repeatedly inserting and fully draining every block in a handful of
/// second-level buckets, the first-level bit for that class must end up
/// clear, not stuck set due to the inverted clear condition in the source.
#[test]
fn first_level_bitmap_clears_once_every_block_in_a_class_is_freed() {
    let mut pool = TlsfPool::new(1 << 18).unwrap();

    // Allocate enough same-size blocks to populate one second-level bucket,
    // then free all of them and allocate something far larger. If the
    // first-level bit were stuck set (the inverted-condition bug), a
    // stale/empty bucket could be selected by `search_suitable_block` and
    // the allocator would hand back a dangling head pointer instead of
    // correctly widening the search.
    let mut ptrs = std::vec::Vec::new();
    for _ in 0..8 {
        ptrs.push(pool.alloc(96).unwrap());
    }
    for ptr in ptrs {
        pool.free(ptr).unwrap();
    }

    let big = pool.alloc(1 << 16).unwrap();
    assert!(!big.is_null());
    pool.free(big).unwrap();
}

#[test]
fn coalesces_freed_neighbors_back_to_full_capacity() {
    let mut pool = TlsfPool::new(1 << 16).unwrap();
    let a = pool.alloc(8192).unwrap();
    let b = pool.alloc(8192).unwrap();
    let c = pool.alloc(8192).unwrap();

    pool.free(a).unwrap();
    pool.free(c).unwrap();
    pool.free(b).unwrap();

    // Merged back into (approximately) the whole pool; a request spanning
    // all three original allocations should succeed.
    let whole = pool.alloc(3 * 8192 - 256).unwrap();
    assert!(!whole.is_null());
}

#[test]
fn exhaustion_reports_out_of_memory_rather_than_panicking() {
    let mut pool = TlsfPool::new(4096).unwrap();
    let err = pool.alloc(1 << 20).unwrap_err();
    assert_eq!(err, rtalloc::AllocError::OutOfMemory);
}
