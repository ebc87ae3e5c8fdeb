//! `ExplicitFreeListAllocator`: the top-level façade tying arenas, the
//! placement/coalescing/growth policies, and the boundary-tag primitives
//! together into the allocator's external interface (§6).
//!
//! Ported from `ExplicitFreeListAllocator::Allocate`/`Free` in the source
//! this spec was distilled from, generalized to multiple arenas for
//! `AllocationPolicy::Dynamic` growth (§4.7, §9) and to the deferred
//! coalescing batch described in §9 (the original left `kDeferred` as a
//! no-op; this resolves that Open Question by actually accumulating freed
//! spans and coalescing them on the next placement miss).

extern crate alloc;

use crate::arena::{Arena, WORD};
use crate::coalesce;
use crate::error::AllocError;
use crate::freelist;
use crate::policy::{AllocationPolicy, CoalescingPolicy, PlacementPolicy};
use crate::split;
use alloc::vec::Vec;
use log::{debug, trace, warn};

/// Rounds `size` up to a multiple of `align`, then raises it further if
/// needed so the resulting span can always hold a free-list link pair
/// (`prev`/`next`, `2 * WORD` bytes) once freed — a span smaller than that
/// has nowhere to store its links without overwriting its own footer tag.
#[inline]
fn align_up(size: usize, align: usize) -> usize {
    let aligned = (size + align - 1) & !(align - 1);
    aligned.max(2 * WORD)
}

/// Explicit free-list allocator with boundary tags over one or more arenas.
///
/// Not `Sync`: the spec's concurrency model (§5) is single-writer, so no
/// internal locking is provided. Wrap in the caller's own synchronization
/// if shared across threads.
pub struct ExplicitFreeListAllocator {
    arenas: Vec<Arena>,
    placement_policy: PlacementPolicy,
    coalescing_policy: CoalescingPolicy,
    allocation_policy: AllocationPolicy,
    allocated: usize,
    freed: usize,
    peak: usize,
}

impl ExplicitFreeListAllocator {
    /// Construct an allocator with an initial arena of `capacity` bytes.
    pub fn new(
        capacity: usize,
        placement_policy: PlacementPolicy,
        coalescing_policy: CoalescingPolicy,
        allocation_policy: AllocationPolicy,
    ) -> Result<Self, AllocError> {
        if capacity == 0 {
            return Err(AllocError::InvalidSize);
        }

        let arena = Arena::new(capacity)?;
        debug!("constructed arena: capacity={capacity} placement={placement_policy:?} coalescing={coalescing_policy:?} allocation={allocation_policy:?}");

        Ok(Self {
            freed: arena.len() - 2 * WORD,
            arenas: alloc::vec![arena],
            placement_policy,
            coalescing_policy,
            allocation_policy,
            allocated: 0,
            peak: 0,
        })
    }

    /// Total bytes managed across all arenas.
    pub fn capacity(&self) -> usize {
        self.arenas.iter().map(|a| a.len()).sum()
    }

    /// Bytes currently handed out to callers.
    pub fn allocated_size(&self) -> usize {
        self.allocated
    }

    /// Bytes currently sitting in some arena's free list.
    pub fn freed_size(&self) -> usize {
        self.freed
    }

    /// High-water mark of `allocated_size`.
    pub fn peak(&self) -> usize {
        self.peak
    }

    /// Start address of the first arena, for diagnostic display.
    pub fn native_ptr(&self) -> *mut u8 {
        self.arenas.first().map(|a| a.start_addr() as *mut u8).unwrap_or(core::ptr::null_mut())
    }

    /// True if `ptr` was (or could have been) handed out by this allocator.
    pub fn contains(&self, ptr: *mut u8) -> bool {
        let addr = ptr as usize;
        self.arenas.iter().any(|a| a.contains(addr))
    }

    /// Allocate `size` bytes, returning a pointer to the payload region.
    pub fn allocate(&mut self, size: usize) -> Result<*mut u8, AllocError> {
        if size == 0 {
            return Err(AllocError::InvalidSize);
        }

        let aligned_size = align_up(size, crate::ALIGNMENT);
        if aligned_size > crate::LARGE_BLOCK_THRESHOLD {
            debug!("allocate: large request size={size} aligned={aligned_size}");
        } else {
            trace!("allocate: size={size} aligned={aligned_size}");
        }

        if let Some((arena_idx, offset, span_size)) = self.find_fit(aligned_size) {
            return Ok(self.place(arena_idx, offset, span_size, aligned_size));
        }

        if self.coalescing_policy == CoalescingPolicy::Deferred {
            for arena in self.arenas.iter_mut() {
                drain_deferred(arena);
            }
            if let Some((arena_idx, offset, span_size)) = self.find_fit(aligned_size) {
                return Ok(self.place(arena_idx, offset, span_size, aligned_size));
            }
        }

        if self.allocation_policy == AllocationPolicy::Dynamic {
            let grown_idx = self.grow(aligned_size)?;
            let arena = &self.arenas[grown_idx];
            let offset = arena.free_head.expect("freshly grown arena has a free span");
            let span_size = unsafe { arena.size_at(offset) };
            return Ok(self.place(grown_idx, offset, span_size, aligned_size));
        }

        warn!("allocate: out of memory, requested {size} bytes (aligned {aligned_size})");
        Err(AllocError::OutOfMemory)
    }

    /// Return the span backing `ptr` to the free list, coalescing with
    /// free neighbors per `coalescing_policy`.
    pub fn free(&mut self, ptr: *mut u8) -> Result<(), AllocError> {
        if ptr.is_null() {
            return Err(AllocError::InvalidPointer);
        }

        let arena_idx = self
            .arenas
            .iter()
            .position(|a| a.contains(ptr as usize))
            .ok_or(AllocError::InvalidPointer)?;

        let arena = &mut self.arenas[arena_idx];
        let offset = arena.offset_of_payload(ptr).ok_or(AllocError::InvalidPointer)?;

        let size = unsafe {
            if arena.is_free_at(offset) {
                return Err(AllocError::InvalidPointer);
            }
            arena.size_at(offset)
        };

        self.allocated -= size;
        self.freed += size;
        trace!("free: offset={offset} size={size}");

        match self.coalescing_policy {
            CoalescingPolicy::Immediate => {
                let (merged_offset, _merged_size) = unsafe { coalesce::coalesce(arena, offset, size) };
                unsafe { freelist::insert(arena, merged_offset) };
            }
            CoalescingPolicy::Deferred => {
                unsafe { arena.set_flag(offset, false) };
                arena.deferred.push(offset);
            }
        }

        Ok(())
    }

    fn find_fit(&self, aligned_size: usize) -> Option<(usize, usize, usize)> {
        for (idx, arena) in self.arenas.iter().enumerate() {
            if let Some(offset) = crate::policy::find_fit(arena, aligned_size, self.placement_policy) {
                let size = unsafe { arena.size_at(offset) };
                return Some((idx, offset, size));
            }
        }
        None
    }

    /// Remove the span at `offset` from its free list, splitting off a
    /// remainder when worthwhile, and mark the remainder allocated.
    fn place(&mut self, arena_idx: usize, offset: usize, span_size: usize, aligned_size: usize) -> *mut u8 {
        let arena = &mut self.arenas[arena_idx];

        unsafe {
            freelist::remove(arena, offset);
            if let Some(right) = split::maybe_split(arena, offset, span_size, aligned_size) {
                freelist::insert(arena, right);
                arena.set_flag(offset, true);
                arena.last_fit = Some(offset);

                self.allocated += aligned_size;
                self.freed -= aligned_size;
            } else {
                arena.set_flag(offset, true);
                arena.last_fit = Some(offset);

                self.allocated += span_size;
                self.freed -= span_size;
            }
        }

        self.peak = self.peak.max(self.allocated);

        let arena = &self.arenas[arena_idx];
        arena.payload_ptr(offset)
    }

    /// Acquire a new arena sized to fit at least `aligned_size`, rounded up
    /// to a whole number of pages, and return its index.
    fn grow(&mut self, aligned_size: usize) -> Result<usize, AllocError> {
        let needed = aligned_size + 2 * WORD;
        let arena_len = needed.max(crate::PAGE_SIZE);
        warn!("growing: acquiring new arena of {arena_len} bytes (requested {aligned_size})");

        let arena = Arena::new(arena_len)?;
        self.freed += arena.len() - 2 * WORD;
        self.arenas.push(arena);
        Ok(self.arenas.len() - 1)
    }
}

/// Coalesce every span `arena` has accumulated under `CoalescingPolicy::
/// Deferred` since the last drain, then insert the merged survivors back
/// into the free list. Offsets are processed in ascending order so that a
/// span already absorbed by an earlier merge in this pass is skipped
/// rather than coalesced twice.
fn drain_deferred(arena: &mut Arena) {
    let mut offsets = core::mem::take(&mut arena.deferred);
    if offsets.is_empty() {
        return;
    }
    offsets.sort_unstable();

    let mut covered_end = 0usize;
    for offset in offsets {
        if offset < covered_end {
            continue;
        }
        let size = unsafe { arena.size_at(offset) };
        let (merged_offset, merged_size) = unsafe { coalesce::coalesce(arena, offset, size) };
        unsafe { freelist::insert(arena, merged_offset) };
        covered_end = merged_offset + merged_size + 2 * WORD;
    }
}
