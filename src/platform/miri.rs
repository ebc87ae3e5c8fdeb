//! Miri-compatible platform shim using the system allocator as backing store.
//!
//! Miri can't execute real OS syscalls (mmap/VirtualAlloc), so arenas come
//! from `alloc::alloc` instead. This lets Miri check all the unsafe pointer
//! logic in the allocator internals under its pointer-provenance model.

use core::alloc::Layout;

pub unsafe fn page_alloc(size: usize) -> *mut u8 {
    let layout = Layout::from_size_align(size, crate::PAGE_SIZE).unwrap();
    unsafe { alloc::alloc::alloc_zeroed(layout) }
}

pub unsafe fn page_dealloc(ptr: *mut u8, size: usize) {
    let layout = Layout::from_size_align(size, crate::PAGE_SIZE).unwrap();
    unsafe { alloc::alloc::dealloc(ptr, layout) };
}
