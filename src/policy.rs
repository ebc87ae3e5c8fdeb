//! Placement, coalescing and growth policies selectable at construction
//! time (§4.2, §4.4, §4.7).
//!
//! The three `find_*` search functions below are direct ports of
//! `FindFirstFit` / `FindNextFit` / `FindBestFit` from the source this spec
//! was distilled from. `find_next_fit` preserves a documented behavior of
//! the original: it walks forward from the roving pointer to the end of
//! the free list and, if nothing fits, gives up rather than wrapping back
//! to the list head. `SPEC_FULL.md` keeps this rather than "fixing" it, so
//! a `NextFit` allocator can report `OutOfMemory` even while a fitting span
//! still exists earlier in the list.

use crate::arena::Arena;

/// How a free span is chosen to satisfy an allocation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlacementPolicy {
    #[default]
    FirstFit,
    NextFit,
    BestFit,
}

/// Whether adjacent free spans are merged immediately on `free`, or
/// accumulated and merged in a batch the next time placement fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoalescingPolicy {
    #[default]
    Immediate,
    Deferred,
}

/// Whether the allocator is confined to its initial arena or may acquire
/// further arenas from the platform on exhaustion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AllocationPolicy {
    #[default]
    Static,
    Dynamic,
}

/// Search `arena`'s free list for a span of at least `size` bytes,
/// dispatching on `policy`.
pub fn find_fit(arena: &Arena, size: usize, policy: PlacementPolicy) -> Option<usize> {
    match policy {
        PlacementPolicy::FirstFit => find_first_fit(arena, size),
        PlacementPolicy::NextFit => find_next_fit(arena, size),
        PlacementPolicy::BestFit => find_best_fit(arena, size),
    }
}

fn find_first_fit(arena: &Arena, size: usize) -> Option<usize> {
    let mut cur = arena.free_head;
    while let Some(offset) = cur {
        unsafe {
            if arena.size_at(offset) >= size {
                return Some(offset);
            }
            cur = arena.next_of(offset);
        }
    }
    None
}

/// Walks forward from `arena.last_fit`. Does not wrap to the list head when
/// it runs off the end, matching the original `FindNextFit`.
///
/// The original walks the chain starting at `last_fit_` without checking
/// whether that span is still free — harmless there only because
/// `RemoveFromFreeList` happens to null out the removed span's links, which
/// this offset-based port also does, but `last_fit` itself is never
/// advanced off an allocated span. Left as-is that produces real memory
/// aliasing (handing out a pointer into a live allocation) rather than the
/// intended "search doesn't wrap" quirk, so the free check below is kept as
/// a safety net the original's pointer semantics happened to mostly avoid.
fn find_next_fit(arena: &Arena, size: usize) -> Option<usize> {
    let mut cur = arena.last_fit;
    while let Some(offset) = cur {
        unsafe {
            if arena.is_free_at(offset) && arena.size_at(offset) >= size {
                return Some(offset);
            }
            cur = arena.next_of(offset);
        }
    }
    None
}

fn find_best_fit(arena: &Arena, size: usize) -> Option<usize> {
    let mut best: Option<(usize, usize)> = None;
    let mut cur = arena.free_head;
    while let Some(offset) = cur {
        unsafe {
            let span_size = arena.size_at(offset);
            if span_size >= size {
                let improves = match best {
                    Some((_, best_size)) => span_size < best_size,
                    None => true,
                };
                if improves {
                    best = Some((offset, span_size));
                }
            }
            cur = arena.next_of(offset);
        }
    }
    best.map(|(offset, _)| offset)
}
