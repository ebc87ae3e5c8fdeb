//! Per-arena explicit free list: LIFO intrusive list of free spans threaded
//! through the `prev`/`next` link words each span carries while free.
//!
//! Ported from `ExplicitFreeListAllocator::InsertToFreeList` /
//! `RemoveFromFreeList` in the source this spec was distilled from,
//! including the early-return quirk in `insert`: a span whose offset already
//! equals the current head is assumed to already be linked and is not
//! re-threaded. `SPEC_FULL.md` calls this out as a preserved behavior rather
//! than a bug to fix.

use crate::arena::Arena;

/// Push `offset` onto the head of `arena`'s free list and mark it free.
///
/// # Safety
/// `offset` must be the start of a live span in `arena`, currently
/// allocated or otherwise not already linked into the free list.
pub unsafe fn insert(arena: &mut Arena, offset: usize) {
    unsafe { arena.set_flag(offset, false) };

    if Some(offset) == arena.free_head {
        return;
    }

    unsafe {
        arena.set_prev(offset, None);
        arena.set_next(offset, arena.free_head);

        if let Some(head) = arena.free_head {
            arena.set_prev(head, Some(offset));
        }
    }

    arena.free_head = Some(offset);
}

/// Unlink `offset` from `arena`'s free list. Does not touch the span's
/// allocated flag; callers mark it allocated separately.
///
/// # Safety
/// `offset` must currently be linked into `arena`'s free list.
pub unsafe fn remove(arena: &mut Arena, offset: usize) {
    let (prev, next) = unsafe { (arena.prev_of(offset), arena.next_of(offset)) };

    unsafe {
        arena.set_prev(offset, None);
        arena.set_next(offset, None);

        if let Some(p) = prev {
            arena.set_next(p, next);
        }
        if let Some(n) = next {
            arena.set_prev(n, prev);
        }
    }

    if arena.free_head == Some(offset) {
        arena.free_head = if prev.is_some() { prev } else { next };
    }

    if arena.last_fit == Some(offset) {
        arena.last_fit = arena.free_head;
    }
}
