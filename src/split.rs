//! Span splitting (§4.5): carve an oversized free span into the requested
//! allocation and a remainder span, when the remainder is worth keeping.
//!
//! Ported from `ExplicitFreeListAllocator::Split`/`CreateSpan`.

use crate::arena::{Arena, WORD};

/// Minimum payload+tags size a remainder must have to be worth splitting
/// off as its own span: two link words plus one alignment unit of payload,
/// bracketed by its own pair of boundary tags.
pub fn min_span_size() -> usize {
    2 * WORD + crate::ALIGNMENT + 2 * WORD
}

/// If `span_offset` (of total size `span_size`) has more than
/// [`min_span_size`] bytes beyond `requested_size`, split it into a left
/// span of exactly `requested_size` and a right remainder span, returning
/// the right span's offset. Otherwise leaves the span untouched.
///
/// # Safety
/// `span_offset` must name a live span of size `span_size` within `arena`.
pub unsafe fn maybe_split(arena: &mut Arena, span_offset: usize, span_size: usize, requested_size: usize) -> Option<usize> {
    let extra = span_size - requested_size;
    if extra <= min_span_size() {
        return None;
    }

    let right_size = extra - 2 * WORD;
    let right_offset = span_offset + requested_size + 2 * WORD;

    unsafe {
        arena.init_free_span(span_offset, requested_size);
        arena.init_free_span(right_offset, right_size);
    }

    Some(right_offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;

    #[test]
    fn split_produces_exact_sized_left_and_remainder_right() {
        let mut arena = Arena::new(4096).unwrap();
        let whole = arena.free_head.unwrap();
        let whole_size = unsafe { arena.size_at(whole) };

        let right = unsafe { maybe_split(&mut arena, whole, whole_size, 64) }.unwrap();
        unsafe {
            assert_eq!(arena.size_at(whole), 64);
            assert_eq!(right, whole + 64 + 2 * WORD);
            assert_eq!(arena.size_at(right), whole_size - 64 - 2 * WORD);
            assert!(arena.is_free_at(right));
        }
    }

    #[test]
    fn no_split_when_remainder_too_small() {
        let mut arena = Arena::new(4096).unwrap();
        let whole = arena.free_head.unwrap();
        let whole_size = unsafe { arena.size_at(whole) };

        let result = unsafe { maybe_split(&mut arena, whole, whole_size, whole_size - 8) };
        assert!(result.is_none());
    }
}
