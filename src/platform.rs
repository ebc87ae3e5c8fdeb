//! OS platform abstraction for virtual memory allocation.
//!
//! Provides `page_alloc` and `page_dealloc`, the "get a raw byte buffer of
//! size C, aligned to the machine word" collaborator the core spec assumes
//! (see `SPEC_FULL.md` §1.1). Wraps `VirtualAlloc` on Windows and `mmap` on
//! Unix. Under `cfg(miri)` falls back to the system allocator, since Miri
//! cannot execute real OS syscalls.

cfg_if::cfg_if! {
    if #[cfg(miri)] {
        mod miri;
        use miri as imp;
    } else if #[cfg(windows)] {
        mod windows;
        use windows as imp;
    } else if #[cfg(unix)] {
        mod unix;
        use unix as imp;
    } else {
        compile_error!("rtalloc requires a unix or windows target (or cfg(miri))");
    }
}

/// Allocate `size` bytes of virtual memory, page-aligned.
/// Returns null on failure. Memory is zero-initialized by the OS.
///
/// # Safety
/// Caller must eventually call `page_dealloc` with the returned pointer and
/// the same `size`.
#[inline]
pub unsafe fn page_alloc(size: usize) -> *mut u8 {
    unsafe { imp::page_alloc(size) }
}

/// Free virtual memory previously allocated by `page_alloc`.
///
/// # Safety
/// `ptr` must have been returned by `page_alloc`, and `size` must match the
/// original allocation size.
#[inline]
pub unsafe fn page_dealloc(ptr: *mut u8, size: usize) {
    unsafe { imp::page_dealloc(ptr, size) };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_and_dealloc() {
        unsafe {
            let size = crate::PAGE_SIZE;
            let ptr = page_alloc(size);
            assert!(!ptr.is_null());
            for i in 0..size {
                assert_eq!(*ptr.add(i), 0);
            }
            for i in 0..size {
                *ptr.add(i) = (i & 0xFF) as u8;
            }
            for i in 0..size {
                assert_eq!(*ptr.add(i), (i & 0xFF) as u8);
            }
            page_dealloc(ptr, size);
        }
    }

    #[test]
    fn test_alloc_multiple_pages() {
        unsafe {
            let size = crate::PAGE_SIZE * 8;
            let ptr = page_alloc(size);
            assert!(!ptr.is_null());
            *ptr = 0xAA;
            *ptr.add(size - 1) = 0xBB;
            assert_eq!(*ptr, 0xAA);
            assert_eq!(*ptr.add(size - 1), 0xBB);
            page_dealloc(ptr, size);
        }
    }
}
