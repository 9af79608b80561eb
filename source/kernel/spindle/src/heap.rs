// Copyright 2024 Spindle Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Kernel heap backing `alloc` collections
//! OWNERS: @kernel-mm-team
//! PUBLIC API: KernelHeap, init()
//! DEPENDS_ON: mm::PageAllocator (backing run), linked_list_allocator::Heap
//! INVARIANTS: Backed by one contiguous page run taken once at boot; never returned

use core::{
    alloc::{GlobalAlloc, Layout},
    ptr::{self, NonNull},
};

use linked_list_allocator::Heap;
use spin::Mutex;

#[cfg(any(test, all(target_arch = "riscv64", target_os = "none")))]
use crate::platform::KERNEL_HEAP_PAGES;
use crate::{
    mm::{PageAllocator, PageError, PAGE_SIZE},
    types::PhysAddr,
};

/// First-fit heap behind a spin lock.
pub struct KernelHeap {
    inner: Mutex<Heap>,
}

impl KernelHeap {
    pub const fn empty() -> Self {
        Self { inner: Mutex::new(Heap::empty()) }
    }

    /// Takes `page_count` contiguous pages from `pages` and hands them to the
    /// heap. Panics if the heap already owns memory.
    pub fn init_from(
        &self,
        pages: &mut PageAllocator,
        page_count: usize,
    ) -> Result<PhysAddr, PageError> {
        let mut heap = self.inner.lock();
        assert!(heap.size() == 0, "kernel heap initialised twice");
        let base = pages.alloc(page_count)?;
        // SAFETY: the run is exclusively ours and never freed back.
        unsafe { heap.init(base.as_mut_ptr::<u8>(), page_count * PAGE_SIZE) };
        Ok(base)
    }

    pub fn size(&self) -> usize {
        self.inner.lock().size()
    }

    pub fn used(&self) -> usize {
        self.inner.lock().used()
    }
}

unsafe impl GlobalAlloc for KernelHeap {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        self.inner
            .lock()
            .allocate_first_fit(layout)
            .map_or(ptr::null_mut(), NonNull::as_ptr)
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        if let Some(ptr) = NonNull::new(ptr) {
            unsafe { self.inner.lock().deallocate(ptr, layout) };
        }
    }
}

#[cfg(all(target_arch = "riscv64", target_os = "none"))]
#[global_allocator]
static HEAP: KernelHeap = KernelHeap::empty();

/// Backs the global allocator with `KERNEL_HEAP_PAGES` pages.
#[cfg(all(target_arch = "riscv64", target_os = "none"))]
pub fn init(pages: &mut PageAllocator) {
    match HEAP.init_from(pages, KERNEL_HEAP_PAGES) {
        Ok(base) => log_info!(
            target: "heap",
            "heap: {} pages at {} ({} bytes)",
            KERNEL_HEAP_PAGES,
            base,
            HEAP.size()
        ),
        Err(err) => panic!("kernel heap init: {}", err),
    }
}
