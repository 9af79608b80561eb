// Copyright 2024 Spindle Contributors
// SPDX-License-Identifier: Apache-2.0

//! Host-side fixtures: page-aligned RAM stand-ins for allocator tests.

use std::alloc::{alloc_zeroed, dealloc, Layout};

use crate::mm::{PageAllocator, PAGE_SIZE};

/// Page-aligned heap buffer released on drop.
pub struct TestRegion {
    ptr: *mut u8,
    layout: Layout,
}

impl TestRegion {
    pub fn new(pages: usize) -> Self {
        let layout = Layout::from_size_align(pages * PAGE_SIZE, PAGE_SIZE).expect("layout");
        let ptr = unsafe { alloc_zeroed(layout) };
        assert!(!ptr.is_null(), "test region allocation failed");
        Self { ptr, layout }
    }

    pub fn start(&self) -> usize {
        self.ptr as usize
    }

    pub fn end(&self) -> usize {
        self.start() + self.layout.size()
    }

    pub fn pages(&self) -> usize {
        self.layout.size() / PAGE_SIZE
    }

    /// Allocator managing the whole region.
    pub fn allocator(&self) -> PageAllocator {
        let mut pages = PageAllocator::empty();
        unsafe { pages.try_init(self.start(), self.end()) }.expect("init test region");
        pages
    }
}

impl Drop for TestRegion {
    fn drop(&mut self) {
        unsafe { dealloc(self.ptr, self.layout) };
    }
}
