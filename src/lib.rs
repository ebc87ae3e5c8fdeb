#![no_std]

//! rtalloc: an explicit free-list allocator with boundary tags.
//!
//! A user-space dynamic memory manager built on a single contiguous byte
//! region (or several, under `AllocationPolicy::Dynamic`) carved into
//! spans, each bracketed by a header and footer boundary tag packing its
//! size and allocated flag into one machine word. Placement within the
//! free list is pluggable (first/next/best fit), as is whether adjacent
//! free spans are coalesced immediately or batched until the next
//! placement miss.
//!
//! [`tlsf::Pool`] is an alternate placement strategy over the same kind of
//! backing region: a two-level segregated fit index trading the explicit
//! free list's linear search for constant-time bitmap lookups.
//!
//! # Usage
//!
//! ```ignore
//! use rtalloc::{ExplicitFreeListAllocator, PlacementPolicy, CoalescingPolicy, AllocationPolicy};
//!
//! let mut heap = ExplicitFreeListAllocator::new(
//!     1 << 20,
//!     PlacementPolicy::FirstFit,
//!     CoalescingPolicy::Immediate,
//!     AllocationPolicy::Static,
//! )?;
//! let ptr = heap.allocate(128)?;
//! heap.free(ptr)?;
//! # Ok::<(), rtalloc::AllocError>(())
//! ```

extern crate alloc;
#[cfg(any(test, feature = "std"))]
extern crate std;

pub mod allocator;
pub mod arena;
pub mod bits;
pub mod coalesce;
pub mod error;
pub mod freelist;
pub mod platform;
pub mod policy;
pub mod split;
pub mod tag;
pub mod tlsf;

include!(concat!(env!("OUT_DIR"), "/config_gen.rs"));

pub use allocator::ExplicitFreeListAllocator;
pub use error::AllocError;
pub use policy::{AllocationPolicy, CoalescingPolicy, PlacementPolicy};
pub use tlsf::Pool as TlsfPool;
