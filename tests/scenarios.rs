//! End-to-end scenarios for the explicit free-list allocator (spec §8).

use rtalloc::{AllocationPolicy, CoalescingPolicy, ExplicitFreeListAllocator, PlacementPolicy};

fn word() -> usize {
    core::mem::size_of::<usize>()
}

#[test]
fn basic_allocate_free_round_trip() {
    let mut heap = ExplicitFreeListAllocator::new(
        4096,
        PlacementPolicy::FirstFit,
        CoalescingPolicy::Immediate,
        AllocationPolicy::Static,
    )
    .unwrap();

    let capacity = heap.capacity();
    let ptr = heap.allocate(128).unwrap();
    assert!(!ptr.is_null());
    assert!(heap.contains(ptr));
    assert_eq!(heap.allocated_size(), 128);

    heap.free(ptr).unwrap();
    assert_eq!(heap.allocated_size(), 0);
    assert_eq!(heap.freed_size(), capacity - 2 * word());
}

#[test]
fn three_allocation_chain_fully_coalesces_on_free() {
    let mut heap = ExplicitFreeListAllocator::new(
        8192,
        PlacementPolicy::FirstFit,
        CoalescingPolicy::Immediate,
        AllocationPolicy::Static,
    )
    .unwrap();

    let a = heap.allocate(256).unwrap();
    let b = heap.allocate(256).unwrap();
    let c = heap.allocate(256).unwrap();

    heap.free(b).unwrap();
    heap.free(a).unwrap();
    heap.free(c).unwrap();

    assert_eq!(heap.allocated_size(), 0);
    assert_eq!(heap.freed_size(), heap.capacity() - 2 * word());

    // The whole arena should be one span again: an allocation just under
    // capacity should succeed.
    let whole = heap.allocate(heap.capacity() - 4 * word()).unwrap();
    assert!(heap.contains(whole));
}

/// Regression test for the `align_up` fix: a request below `2 * WORD`
/// (here 8 bytes, with `ALIGNMENT = 8`) must still round up to a span large
/// enough to hold free-list links once freed, or reinserting it corrupts
/// its own footer tag.
#[test]
fn small_allocations_round_trip_and_coalesce() {
    let mut heap = ExplicitFreeListAllocator::new(
        4096,
        PlacementPolicy::FirstFit,
        CoalescingPolicy::Immediate,
        AllocationPolicy::Static,
    )
    .unwrap();

    let p1 = heap.allocate(8).unwrap();
    let p2 = heap.allocate(8).unwrap();
    let p3 = heap.allocate(8).unwrap();

    heap.free(p2).unwrap();
    heap.free(p1).unwrap();
    heap.free(p3).unwrap();

    assert_eq!(heap.allocated_size(), 0);
    assert_eq!(heap.freed_size(), heap.capacity() - 2 * word());
}

#[test]
fn best_fit_prefers_the_tightest_span() {
    let mut heap = ExplicitFreeListAllocator::new(
        8192,
        PlacementPolicy::BestFit,
        CoalescingPolicy::Immediate,
        AllocationPolicy::Static,
    )
    .unwrap();

    let big = heap.allocate(512).unwrap();
    let small = heap.allocate(64).unwrap();
    let _anchor = heap.allocate(512).unwrap();

    heap.free(big).unwrap();
    heap.free(small).unwrap();

    let fitted = heap.allocate(64).unwrap();
    assert_eq!(fitted, small, "BestFit should reuse the exact-sized span, not the larger one");
}

#[test]
fn next_fit_does_not_wrap_to_earlier_free_spans() {
    // The roving pointer (`last_fit`) only ever advances to a span that
    // placement just used, and is never reset once that span stops being
    // free. Since the search also never wraps back to the free-list head,
    // a second `NextFit` request past the first allocated span fails even
    // though the arena has abundant free space behind it.
    let mut heap = ExplicitFreeListAllocator::new(
        8192,
        PlacementPolicy::NextFit,
        CoalescingPolicy::Immediate,
        AllocationPolicy::Static,
    )
    .unwrap();

    let first = heap.allocate(64).unwrap();
    assert!(heap.contains(first));

    let second = heap.allocate(64);
    assert!(second.is_err(), "NextFit must not wrap back to find the remaining free space");
}

#[test]
fn dynamic_policy_grows_instead_of_failing() {
    let mut heap = ExplicitFreeListAllocator::new(
        512,
        PlacementPolicy::FirstFit,
        CoalescingPolicy::Immediate,
        AllocationPolicy::Dynamic,
    )
    .unwrap();

    let initial_capacity = heap.capacity();
    let ptr = heap.allocate(4096).unwrap();
    assert!(heap.contains(ptr));
    assert!(heap.capacity() > initial_capacity);
}

#[test]
fn static_policy_reports_out_of_memory_instead_of_growing() {
    let mut heap = ExplicitFreeListAllocator::new(
        512,
        PlacementPolicy::FirstFit,
        CoalescingPolicy::Immediate,
        AllocationPolicy::Static,
    )
    .unwrap();

    let before = heap.capacity();
    let err = heap.allocate(4096).unwrap_err();
    assert_eq!(err, rtalloc::AllocError::OutOfMemory);
    assert_eq!(heap.capacity(), before);
}

#[test]
fn freed_regions_never_overlap_live_allocations() {
    let mut heap = ExplicitFreeListAllocator::new(
        16384,
        PlacementPolicy::FirstFit,
        CoalescingPolicy::Immediate,
        AllocationPolicy::Static,
    )
    .unwrap();

    let mut live = alloc_and_tag(&mut heap, &[64, 128, 32, 256, 16]);
    // Free every other allocation, then write through the survivors to
    // make sure no freed span's metadata clobbered their payload.
    for i in (0..live.len()).step_by(2) {
        let (ptr, _) = live[i];
        heap.free(ptr).unwrap();
        live[i].0 = core::ptr::null_mut();
    }

    for (ptr, pattern) in live.iter().filter(|(p, _)| !p.is_null()) {
        unsafe {
            assert_eq!(**ptr, *pattern);
        }
    }
}

#[test]
fn peak_is_monotonic_non_decreasing_high_water_mark() {
    let mut heap = ExplicitFreeListAllocator::new(
        8192,
        PlacementPolicy::FirstFit,
        CoalescingPolicy::Immediate,
        AllocationPolicy::Static,
    )
    .unwrap();

    let a = heap.allocate(1024).unwrap();
    let peak_after_a = heap.peak();
    let b = heap.allocate(1024).unwrap();
    let peak_after_b = heap.peak();
    heap.free(a).unwrap();
    heap.free(b).unwrap();

    assert!(peak_after_b >= peak_after_a);
    assert_eq!(heap.peak(), peak_after_b, "freeing must never lower the high-water mark");
}

fn alloc_and_tag(heap: &mut ExplicitFreeListAllocator, sizes: &[usize]) -> std::vec::Vec<(*mut u8, u8)> {
    sizes
        .iter()
        .enumerate()
        .map(|(i, &size)| {
            let ptr = heap.allocate(size).unwrap();
            let pattern = (i as u8).wrapping_add(1);
            unsafe { *ptr = pattern };
            (ptr, pattern)
        })
        .collect()
}
