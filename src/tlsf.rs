//! TLSF: two-level segregated fit pool — an alternate placement strategy
//! sharing the boundary-tagged block idiom of [`crate::allocator`] but
//! replacing linear free-list search with a constant-time bitmap lookup
//! (§4.8).
//!
//! Ported from `Tlsf::Pool` in the source this spec was distilled from.
//! There, `Alloc`/`Free`/`Split`/`Coalesce*` are stub bodies; this fills
//! them in following the same split/coalesce contracts as
//! `crate::split`/`crate::coalesce`, adapted to the `prev_phys_block`
//! back-pointer scheme so neighbor lookups never need a footer read.
//!
//! One behavioral fix relative to the source: `RemoveFreeBlock` there
//! clears the first-level bitmap bit when the just-emptied second-level
//! word is *non-zero*, which is backwards — it should clear `fl` exactly
//! when the `sl` word has gone to zero. That condition is inverted below.

use crate::error::AllocError;
use crate::platform;
use core::mem::size_of;

/// First-level index width: one bucket per power of two, up to 1 GiB blocks.
pub const FLI: usize = 30;
/// Second-level index width: 32 linear subdivisions per power-of-two class.
pub const SLI: u32 = 5;
const SL_COUNT: usize = 1 << SLI;

const WORD: usize = size_of::<usize>();
/// `prev_phys_block` + `size` words precede the payload; `prev`/`next`
/// free-list links are overlaid on the payload while the block is free.
const HEADER_WORDS: usize = 2;
const NIL: usize = usize::MAX;

const FREE_BIT: usize = 0x1;
const PREV_FREE_BIT: usize = 0x2;
const BLOCK_FLAG_BITS: usize = FREE_BIT | PREV_FREE_BIT;

/// Smallest payload a block can hold. Must be at least `1 << SLI`: sizes
/// below that round to a first-level index `fl < SLI` in `mapping_search`,
/// for which `fl.saturating_sub(SLI)` collapses to 0 and `sl` overflows
/// past `SL_COUNT`, indexing `blocks`/`*_bitmap` out of range. `1 << SLI`
/// also comfortably covers the `2 * WORD` a free block needs for its
/// `prev`/`next` links.
pub const MIN_BLOCK_SIZE: usize = 1usize << SLI;
/// Largest size `MappingSearch` can classify (`1 << FLI`).
pub const MAX_BLOCK_SIZE: usize = 1usize << FLI;

#[inline]
fn decode_link(word: usize) -> Option<usize> {
    if word == NIL { None } else { Some(word) }
}

#[inline]
fn encode_link(link: Option<usize>) -> usize {
    link.unwrap_or(NIL)
}

/// A two-level segregated fit pool over one backing byte region.
pub struct Pool {
    base: *mut u8,
    len: usize,
    fl_bitmap: usize,
    sl_bitmap: [usize; FLI],
    blocks: [[Option<usize>; SL_COUNT]; FLI],
}

unsafe impl Send for Pool {}

impl Pool {
    /// Acquire `len` bytes from the platform and initialize them as one
    /// free block spanning the whole pool.
    pub fn new(len: usize) -> Result<Self, AllocError> {
        assert!(len > HEADER_WORDS * WORD + MIN_BLOCK_SIZE, "pool too small");
        assert!(len < MAX_BLOCK_SIZE, "pool exceeds TLSF's mappable range");

        let base = unsafe { platform::page_alloc(len) };
        if base.is_null() {
            return Err(AllocError::BackingAllocationFailed);
        }

        let mut pool = Self {
            base,
            len,
            fl_bitmap: 0,
            sl_bitmap: [0; FLI],
            blocks: [[None; SL_COUNT]; FLI],
        };

        let payload = len - HEADER_WORDS * WORD;
        pool.init_block(0, payload, None, false);
        pool.insert(0);
        Ok(pool)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn start_addr(&self) -> usize {
        self.base as usize
    }

    #[inline]
    pub fn contains(&self, addr: usize) -> bool {
        let start = self.start_addr();
        addr >= start && addr < start + self.len
    }

    fn offset_of_payload(&self, ptr: *mut u8) -> Option<usize> {
        let addr = ptr as usize;
        if !self.contains(addr) {
            return None;
        }
        let header_addr = addr.checked_sub(HEADER_WORDS * WORD)?;
        if !self.contains(header_addr) {
            return None;
        }
        Some(header_addr - self.start_addr())
    }

    #[inline]
    fn payload_ptr(&self, offset: usize) -> *mut u8 {
        unsafe { self.base.add(offset + HEADER_WORDS * WORD) }
    }

    #[inline]
    fn word_ptr(&self, offset: usize) -> *mut usize {
        unsafe { self.base.add(offset) as *mut usize }
    }

    #[inline]
    fn size_word(&self, offset: usize) -> usize {
        unsafe { self.word_ptr(offset + WORD).read() }
    }

    #[inline]
    fn set_size_word(&mut self, offset: usize, word: usize) {
        unsafe { self.word_ptr(offset + WORD).write(word) };
    }

    #[inline]
    fn size_at(&self, offset: usize) -> usize {
        self.size_word(offset) & !BLOCK_FLAG_BITS
    }

    #[inline]
    fn is_free_at(&self, offset: usize) -> bool {
        self.size_word(offset) & FREE_BIT != 0
    }

    #[inline]
    fn is_prev_free_at(&self, offset: usize) -> bool {
        self.size_word(offset) & PREV_FREE_BIT != 0
    }

    #[inline]
    fn prev_phys_of(&self, offset: usize) -> Option<usize> {
        decode_link(unsafe { self.word_ptr(offset).read() })
    }

    #[inline]
    fn set_prev_phys(&mut self, offset: usize, prev_phys: Option<usize>) {
        unsafe { self.word_ptr(offset).write(encode_link(prev_phys)) };
    }

    #[inline]
    fn next_of(&self, offset: usize) -> Option<usize> {
        decode_link(unsafe { self.word_ptr(offset + HEADER_WORDS * WORD).read() })
    }

    #[inline]
    fn set_next(&mut self, offset: usize, next: Option<usize>) {
        unsafe { self.word_ptr(offset + HEADER_WORDS * WORD).write(encode_link(next)) };
    }

    #[inline]
    fn prev_of(&self, offset: usize) -> Option<usize> {
        decode_link(unsafe { self.word_ptr(offset + HEADER_WORDS * WORD + WORD).read() })
    }

    #[inline]
    fn set_prev(&mut self, offset: usize, prev: Option<usize>) {
        unsafe { self.word_ptr(offset + HEADER_WORDS * WORD + WORD).write(encode_link(prev)) };
    }

    /// Offset of the block physically following `offset` (size `size`), if
    /// it lies within the pool.
    fn next_physical(&self, offset: usize, size: usize) -> Option<usize> {
        let next = offset + HEADER_WORDS * WORD + size;
        if next >= self.len { None } else { Some(next) }
    }

    /// Initialize a block's header at `offset`: `prev_phys_block`, size and
    /// both free-state bits. Leaves the free-list links untouched; callers
    /// set those via [`Self::insert`] or by marking the block allocated.
    fn init_block(&mut self, offset: usize, size: usize, prev_phys: Option<usize>, prev_free: bool) {
        self.set_prev_phys(offset, prev_phys);
        let word = size | FREE_BIT | if prev_free { PREV_FREE_BIT } else { 0 };
        self.set_size_word(offset, word);
    }

    /// Set the `prev_free` bit of whatever block physically follows
    /// `offset`/`size`, reflecting `offset`'s own new free state.
    fn propagate_prev_free(&mut self, offset: usize, size: usize, is_free: bool) {
        if let Some(next) = self.next_physical(offset, size) {
            let mut word = self.size_word(next);
            word = if is_free { word | PREV_FREE_BIT } else { word & !PREV_FREE_BIT };
            self.set_size_word(next, word);
        }
    }

    fn mark_allocated(&mut self, offset: usize, size: usize) {
        let prev_free = self.is_prev_free_at(offset);
        let word = size | if prev_free { PREV_FREE_BIT } else { 0 };
        self.set_size_word(offset, word);
        self.propagate_prev_free(offset, size, false);
    }

    fn mark_free(&mut self, offset: usize, size: usize) {
        let prev_free = self.is_prev_free_at(offset);
        let word = size | FREE_BIT | if prev_free { PREV_FREE_BIT } else { 0 };
        self.set_size_word(offset, word);
        self.propagate_prev_free(offset, size, true);
    }

    /// `size → (fl, sl)`: round `size` up within its second-level class,
    /// then read off the first- and second-level indices.
    ///
    /// Requires `size >= MIN_BLOCK_SIZE` (`1 << SLI`): only then is `fl`
    /// guaranteed `>= SLI`, which keeps `sl` within `[0, SL_COUNT)`. Callers
    /// (`insert`/`remove`/`alloc`) clamp to `MIN_BLOCK_SIZE` before calling.
    fn mapping_search(size: usize) -> (usize, usize) {
        debug_assert!(size >= MIN_BLOCK_SIZE, "size {size} below MIN_BLOCK_SIZE");
        let fls = crate::bits::find_last_bit_set(size).expect("size must be non-zero") as usize;
        let shift = fls.saturating_sub(SLI as usize);
        let round = size + (1usize << shift) - 1;
        let fl = crate::bits::find_last_bit_set(round).expect("round is non-zero") as usize;
        debug_assert!(fl < FLI, "size {size} rounds outside the mappable range");
        let sl = (round >> (fl.saturating_sub(SLI as usize))) ^ (1usize << SLI);
        debug_assert!(sl < SL_COUNT, "size {size} produced out-of-range sl {sl}");
        (fl, sl)
    }

    /// Find the smallest free block at or above `(fl, sl)`, widening the
    /// search to the next non-empty first-level bucket if needed. Returns
    /// the actual `(fl, sl, offset)` the block was found at.
    fn search_suitable_block(&self, fl: usize, sl: usize) -> Option<(usize, usize, usize)> {
        let mut fl = fl;
        let mut sl_bitmap = self.sl_bitmap[fl] & (!0usize << sl);

        if sl_bitmap == 0 {
            let fl_bitmap = self.fl_bitmap & (!0usize << (fl + 1));
            if fl_bitmap == 0 {
                return None;
            }
            fl = crate::bits::find_first_bit_set(fl_bitmap)? as usize;
            sl_bitmap = self.sl_bitmap[fl];
        }

        let sl = crate::bits::find_first_bit_set(sl_bitmap)? as usize;
        let offset = self.blocks[fl][sl]?;
        Some((fl, sl, offset))
    }

    fn insert(&mut self, offset: usize) {
        let size = self.size_at(offset);
        let (fl, sl) = Self::mapping_search(size);
        self.insert_free_block(offset, fl, sl);
    }

    fn remove(&mut self, offset: usize) {
        let size = self.size_at(offset);
        let (fl, sl) = Self::mapping_search(size);
        self.remove_free_block(offset, fl, sl);
    }

    fn insert_free_block(&mut self, offset: usize, fl: usize, sl: usize) {
        let head = self.blocks[fl][sl];
        self.set_next(offset, head);
        self.set_prev(offset, None);
        if let Some(head_offset) = head {
            self.set_prev(head_offset, Some(offset));
        }

        self.blocks[fl][sl] = Some(offset);
        self.fl_bitmap |= 1usize << fl;
        self.sl_bitmap[fl] |= 1usize << sl;
    }

    fn remove_free_block(&mut self, offset: usize, fl: usize, sl: usize) {
        let prev = self.prev_of(offset);
        let next = self.next_of(offset);

        if let Some(next_offset) = next {
            self.set_prev(next_offset, prev);
        }
        if let Some(prev_offset) = prev {
            self.set_next(prev_offset, next);
        }

        if self.blocks[fl][sl] == Some(offset) {
            self.blocks[fl][sl] = next;

            if next.is_none() {
                self.sl_bitmap[fl] &= !(1usize << sl);

                // Fixed: the source clears the first-level bit when this
                // condition is non-zero, which backwards — it must clear
                // fl exactly when the second-level word has gone to zero.
                if self.sl_bitmap[fl] == 0 {
                    self.fl_bitmap &= !(1usize << fl);
                }
            }
        }
    }

    fn can_split(total_size: usize, requested_size: usize) -> bool {
        total_size >= requested_size + HEADER_WORDS * WORD + MIN_BLOCK_SIZE
    }

    /// Split `offset` (currently `total_size` bytes) into a left block of
    /// exactly `requested_size` and a free right remainder, returning the
    /// right block's offset if the remainder was worth keeping.
    fn split(&mut self, offset: usize, total_size: usize, requested_size: usize) -> Option<usize> {
        if !Self::can_split(total_size, requested_size) {
            return None;
        }

        let right_offset = offset + HEADER_WORDS * WORD + requested_size;
        let right_size = total_size - requested_size - HEADER_WORDS * WORD;

        self.init_block(right_offset, right_size, Some(offset), false);
        if let Some(next) = self.next_physical(right_offset, right_size) {
            self.set_prev_phys(next, right_offset);
        }
        self.insert(right_offset);

        Some(right_offset)
    }

    /// Allocate `size` bytes, returning a pointer to the payload region.
    pub fn alloc(&mut self, size: usize) -> Result<*mut u8, AllocError> {
        if size == 0 {
            return Err(AllocError::InvalidSize);
        }

        let aligned = (size + crate::ALIGNMENT - 1) & !(crate::ALIGNMENT - 1);
        if aligned >= MAX_BLOCK_SIZE {
            return Err(AllocError::InvalidSize);
        }
        // Clamp to MIN_BLOCK_SIZE so the block this allocation ends up
        // occupying is always large enough to be re-inserted into the
        // free list (via `mapping_search`) once it's freed.
        let aligned = aligned.max(MIN_BLOCK_SIZE);

        let (fl, sl) = Self::mapping_search(aligned);
        let (fl, sl, offset) = self.search_suitable_block(fl, sl).ok_or(AllocError::OutOfMemory)?;

        let total_size = self.size_at(offset);
        self.remove_free_block(offset, fl, sl);

        let final_size = match self.split(offset, total_size, aligned) {
            Some(_) => aligned,
            None => total_size,
        };
        self.mark_allocated(offset, final_size);

        Ok(self.payload_ptr(offset))
    }

    /// Return the block backing `ptr`, coalescing with free physical
    /// neighbors. The right neighbor is found by walking forward from this
    /// block's end; the left neighbor is found in O(1) via its
    /// `prev_phys_block` pointer, guarded by this block's `prev_free` bit.
    pub fn free(&mut self, ptr: *mut u8) -> Result<(), AllocError> {
        if ptr.is_null() {
            return Err(AllocError::InvalidPointer);
        }

        let offset = self.offset_of_payload(ptr).ok_or(AllocError::InvalidPointer)?;
        if self.is_free_at(offset) {
            return Err(AllocError::InvalidPointer);
        }

        let mut merged_offset = offset;
        let mut merged_size = self.size_at(offset);

        if let Some(next) = self.next_physical(merged_offset, merged_size) {
            if self.is_free_at(next) {
                let next_size = self.size_at(next);
                self.remove(next);
                merged_size += HEADER_WORDS * WORD + next_size;
            }
        }

        if self.is_prev_free_at(offset) {
            if let Some(left) = self.prev_phys_of(offset) {
                let left_size = self.size_at(left);
                self.remove(left);
                merged_size += HEADER_WORDS * WORD + left_size;
                merged_offset = left;
            }
        }

        self.mark_free(merged_offset, merged_size);
        if let Some(next) = self.next_physical(merged_offset, merged_size) {
            self.set_prev_phys(next, Some(merged_offset));
        }

        self.insert(merged_offset);
        Ok(())
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        if !self.base.is_null() {
            unsafe { platform::page_dealloc(self.base, self.len) };
            self.base = core::ptr::null_mut();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_then_free_round_trips() {
        let mut pool = Pool::new(4096).unwrap();
        let ptr = pool.alloc(64).unwrap();
        assert!(pool.contains(ptr as usize));
        pool.free(ptr).unwrap();
    }

    #[test]
    fn split_remainder_is_reusable() {
        let mut pool = Pool::new(4096).unwrap();
        let a = pool.alloc(64).unwrap();
        let b = pool.alloc(64).unwrap();
        assert_ne!(a, b);
        pool.free(a).unwrap();
        pool.free(b).unwrap();
    }

    #[test]
    fn coalesces_freed_neighbors_back_into_one_block() {
        let mut pool = Pool::new(4096).unwrap();
        let a = pool.alloc(256).unwrap();
        let b = pool.alloc(256).unwrap();
        let c = pool.alloc(256).unwrap();
        pool.free(a).unwrap();
        pool.free(c).unwrap();
        pool.free(b).unwrap();

        // Everything should have merged back into one block big enough to
        // satisfy a request close to the whole pool again.
        let big = pool.alloc(3 * 256).unwrap();
        assert!(pool.contains(big as usize));
    }

    #[test]
    fn exhausts_and_reports_out_of_memory() {
        let mut pool = Pool::new(512).unwrap();
        let err = pool.alloc(4096).unwrap_err();
        assert_eq!(err, AllocError::OutOfMemory);
    }

    #[test]
    fn mapping_search_is_monotonic_in_size() {
        let (fl_small, _) = Pool::mapping_search(64);
        let (fl_large, _) = Pool::mapping_search(1 << 20);
        assert!(fl_large > fl_small);
    }
}
