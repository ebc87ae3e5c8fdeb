//! Error taxonomy for the allocator core.
//!
//! All fallible entry points return `Result<_, AllocError>` rather than a
//! null pointer — the spec's external interface (`allocate(size) -> pointer
//! | error`) is expressed that way, unlike the teacher crate's `GlobalAlloc`
//! impl which is bound by the null-on-failure convention of that trait.

/// Errors produced by [`crate::allocator::ExplicitFreeListAllocator`] and
/// [`crate::tlsf::Pool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AllocError {
    /// `allocate` was called with a zero-byte request.
    #[error("requested allocation size must be greater than zero")]
    InvalidSize,

    /// `free` was called with a null pointer, a pointer outside any owned
    /// arena, or (when checked) a pointer not at a span boundary.
    #[error("pointer is null, foreign, or not at a span boundary")]
    InvalidPointer,

    /// The `Static` allocation policy has no free span large enough to
    /// satisfy the request and cannot grow.
    #[error("no free span large enough and the allocator cannot grow")]
    OutOfMemory,

    /// The `Dynamic` allocation policy tried to grow the arena but the host
    /// platform allocator returned null.
    #[error("the host platform allocator failed to back a new arena")]
    BackingAllocationFailed,
}
