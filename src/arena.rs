//! Arena: a contiguous byte region obtained from the host platform allocator.
//!
//! Owns the raw buffer and the handful of unsafe primitives ("view a tag /
//! link at offset o") that every higher-level algorithm (placement, split,
//! coalesce) builds on. Everything above this module works in terms of
//! `usize` offsets into the arena rather than raw addresses, per the raw-
//! memory discipline in `SPEC_FULL.md` §9.

extern crate alloc;

use crate::error::AllocError;
use crate::platform;
use crate::tag;
use alloc::vec::Vec;
use core::mem::size_of;

/// Width in bytes of one boundary tag / link word.
pub const WORD: usize = size_of::<usize>();

/// Sentinel encoding a null link in an offset-based intrusive list.
pub(crate) const NIL: usize = usize::MAX;

#[inline]
pub(crate) fn decode_link(word: usize) -> Option<usize> {
    if word == NIL { None } else { Some(word) }
}

#[inline]
pub(crate) fn encode_link(link: Option<usize>) -> usize {
    link.unwrap_or(NIL)
}

/// A contiguous `[start, end)` byte region tiled by spans, each a
/// `{header tag, prev, next, ...payload..., footer tag}` run.
///
/// Bookkeeping specific to *this* arena's free list — the head pointer, the
/// `NextFit` roving pointer, and the `Deferred`-coalescing pending list —
/// lives here too, since a span never crosses an arena boundary (§3.1).
pub struct Arena {
    base: *mut u8,
    len: usize,
    /// Offset of the first free span, or `None` if the arena is full.
    pub(crate) free_head: Option<usize>,
    /// Roving pointer for `PlacementPolicy::NextFit`.
    pub(crate) last_fit: Option<usize>,
    /// Spans freed under `CoalescingPolicy::Deferred`, not yet coalesced.
    pub(crate) deferred: Vec<usize>,
}

// Single-writer per the spec (§5): no interior synchronization, but the raw
// pointer itself is free to move across threads along with its owner.
unsafe impl Send for Arena {}

impl Arena {
    /// Acquire `len` bytes from the platform and initialize them as one
    /// free span spanning the whole capacity.
    pub fn new(len: usize) -> Result<Self, AllocError> {
        assert!(len > 2 * WORD, "arena must be larger than two tag words");

        let base = unsafe { platform::page_alloc(len) };
        if base.is_null() {
            return Err(AllocError::BackingAllocationFailed);
        }

        let mut arena = Self {
            base,
            len,
            free_head: None,
            last_fit: None,
            deferred: Vec::new(),
        };

        let payload = len - 2 * WORD;
        arena.init_free_span(0, payload);
        arena.free_head = Some(0);
        arena.last_fit = Some(0);
        Ok(arena)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn start_addr(&self) -> usize {
        self.base as usize
    }

    /// True if `addr` lies inside `[start, end)`.
    #[inline]
    pub fn contains(&self, addr: usize) -> bool {
        let start = self.start_addr();
        addr >= start && addr < start + self.len
    }

    /// Offset of the span header that owns payload pointer `ptr`, if `ptr`
    /// lies strictly inside this arena's payload region.
    pub fn offset_of_payload(&self, ptr: *mut u8) -> Option<usize> {
        let addr = ptr as usize;
        if !self.contains(addr) {
            return None;
        }
        let header_addr = addr.checked_sub(WORD)?;
        if !self.contains(header_addr) {
            return None;
        }
        Some(header_addr - self.start_addr())
    }

    /// Payload pointer for the span whose header starts at `offset`.
    #[inline]
    pub fn payload_ptr(&self, offset: usize) -> *mut u8 {
        unsafe { self.base.add(offset + WORD) }
    }

    #[inline]
    fn word_ptr(&self, offset: usize) -> *mut usize {
        unsafe { self.base.add(offset) as *mut usize }
    }

    /// Read the header tag word of the span at `offset`.
    ///
    /// # Safety
    /// `offset` must be the start of a live span header within this arena.
    #[inline]
    pub unsafe fn header_word(&self, offset: usize) -> usize {
        unsafe { self.word_ptr(offset).read() }
    }

    #[inline]
    unsafe fn set_header_word(&mut self, offset: usize, word: usize) {
        unsafe { self.word_ptr(offset).write(word) };
    }

    /// Payload size of the span at `offset`.
    ///
    /// # Safety
    /// `offset` must be the start of a live span header.
    #[inline]
    pub unsafe fn size_at(&self, offset: usize) -> usize {
        tag::size(unsafe { self.header_word(offset) })
    }

    /// Whether the span at `offset` is free.
    ///
    /// # Safety
    /// `offset` must be the start of a live span header.
    #[inline]
    pub unsafe fn is_free_at(&self, offset: usize) -> bool {
        tag::is_free(unsafe { self.header_word(offset) })
    }

    /// Write the header tag AND the matching footer tag, preserving
    /// invariant (2) (header ≡ footer) on every mutation.
    ///
    /// # Safety
    /// `offset + 2*WORD + payload_size` must be within the arena.
    pub unsafe fn set_size_and_flag(&mut self, offset: usize, payload_size: usize, allocated: bool) {
        let word = tag::pack(payload_size, allocated);
        unsafe {
            self.set_header_word(offset, word);
            self.sync_footer(offset, payload_size, word);
        }
    }

    /// Flip the allocated flag of the span at `offset`, keeping its size.
    ///
    /// # Safety
    /// `offset` must be the start of a live span header.
    pub unsafe fn set_flag(&mut self, offset: usize, allocated: bool) {
        let size = unsafe { self.size_at(offset) };
        unsafe { self.set_size_and_flag(offset, size, allocated) };
    }

    /// Write `word` to the footer slot of the span `offset` with payload
    /// `payload_size` (i.e. the last word of the span).
    ///
    /// # Safety
    /// `offset + WORD + payload_size` must be a valid word-aligned offset
    /// within the arena.
    pub unsafe fn sync_footer(&mut self, offset: usize, payload_size: usize, word: usize) {
        let footer_offset = offset + WORD + payload_size;
        unsafe { self.word_ptr(footer_offset).write(word) };
    }

    /// Initialize a fresh free span at `offset` with the given payload size:
    /// header+footer tags, and `prev`/`next` cleared to nil.
    ///
    /// # Safety
    /// `[offset, offset + 2*WORD + payload_size)` must be within the arena
    /// and not aliased by another live span view.
    pub fn init_free_span(&mut self, offset: usize, payload_size: usize) {
        unsafe {
            self.set_size_and_flag(offset, payload_size, false);
            self.set_prev(offset, None);
            self.set_next(offset, None);
        }
    }

    #[inline]
    fn prev_slot(&self, offset: usize) -> usize {
        offset + WORD
    }

    #[inline]
    fn next_slot(&self, offset: usize) -> usize {
        offset + 2 * WORD
    }

    /// Read the free-list `prev` link of the span at `offset`.
    ///
    /// # Safety
    /// `offset` must be a live, currently-free span (the link fields are
    /// only meaningful while free — allocated spans reuse this storage for
    /// user payload).
    pub unsafe fn prev_of(&self, offset: usize) -> Option<usize> {
        decode_link(unsafe { self.word_ptr(self.prev_slot(offset)).read() })
    }

    /// # Safety
    /// See [`Self::prev_of`].
    pub unsafe fn next_of(&self, offset: usize) -> Option<usize> {
        decode_link(unsafe { self.word_ptr(self.next_slot(offset)).read() })
    }

    /// # Safety
    /// See [`Self::prev_of`].
    pub unsafe fn set_prev(&mut self, offset: usize, prev: Option<usize>) {
        let slot = self.prev_slot(offset);
        unsafe { self.word_ptr(slot).write(encode_link(prev)) };
    }

    /// # Safety
    /// See [`Self::prev_of`].
    pub unsafe fn set_next(&mut self, offset: usize, next: Option<usize>) {
        let slot = self.next_slot(offset);
        unsafe { self.word_ptr(slot).write(encode_link(next)) };
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        if !self.base.is_null() {
            unsafe { platform::page_dealloc(self.base, self.len) };
            self.base = core::ptr::null_mut();
        }
    }
}
