//! Boundary-tag coalescing (§4.6): merge a freed span with any free
//! neighbor(s) found by walking its boundary tags.
//!
//! Ported from `ExplicitFreeListAllocator::Coalesce`/`FindLeftSpan`/
//! `FindRightSpan`. A neighbor absorbed into the merge is unlinked from the
//! free list here; the surviving merged span is left for the caller to
//! (re-)insert, exactly as the original `Free` does by calling
//! `InsertToFreeList` once after `Coalesce` returns.

use crate::arena::{Arena, WORD};
use crate::freelist;
use crate::tag;

/// Locate the left neighbor of the span at `span_offset` via its footer
/// tag, which sits in the word immediately before the span's header.
fn find_left(arena: &Arena, span_offset: usize) -> Option<(usize, usize)> {
    let left_footer_offset = span_offset.checked_sub(WORD)?;
    let left_footer_word = unsafe { arena.header_word(left_footer_offset) };
    let left_size = tag::size(left_footer_word);
    let left_offset = left_footer_offset.checked_sub(left_size + WORD)?;
    Some((left_offset, left_size))
}

/// Locate the right neighbor of the span at `span_offset` (size
/// `span_size`) via its header tag, which sits two tag words after the end
/// of the current span's payload.
fn find_right(arena: &Arena, span_offset: usize, span_size: usize) -> Option<(usize, usize)> {
    let right_offset = span_offset + span_size + 2 * WORD;
    if right_offset >= arena.len() {
        return None;
    }
    let right_size = unsafe { arena.size_at(right_offset) };
    Some((right_offset, right_size))
}

/// Merge the span at `span_offset` (size `span_size`) with any adjacent
/// free neighbors, marking the result free. Returns the merged span's
/// offset and payload size, which may be unchanged from the input if
/// neither neighbor was free.
///
/// # Safety
/// `span_offset` must name a live span of size `span_size` in `arena`, not
/// currently linked into the free list.
pub unsafe fn coalesce(arena: &mut Arena, span_offset: usize, span_size: usize) -> (usize, usize) {
    let left = find_left(arena, span_offset).filter(|&(o, _)| unsafe { arena.is_free_at(o) });
    let right = find_right(arena, span_offset, span_size).filter(|&(o, _)| unsafe { arena.is_free_at(o) });

    let (merged_offset, merged_size) = match (left, right) {
        (Some((lo, lsize)), Some((ro, rsize))) => {
            unsafe { freelist::remove(arena, ro) };
            (lo, lsize + span_size + rsize + 4 * WORD)
        }
        (Some((lo, lsize)), None) => (lo, lsize + span_size + 2 * WORD),
        (None, Some((ro, rsize))) => {
            unsafe { freelist::remove(arena, ro) };
            (span_offset, span_size + rsize + 2 * WORD)
        }
        (None, None) => (span_offset, span_size),
    };

    unsafe { arena.set_size_and_flag(merged_offset, merged_size, false) };
    (merged_offset, merged_size)
}
