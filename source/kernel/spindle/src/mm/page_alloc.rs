// Copyright 2024 Spindle Contributors
// SPDX-License-Identifier: Apache-2.0

//! Page frame allocator backed by an intrusive free list.
//!
//! The first machine word of every free page stores the address of the next
//! free page (zero terminates the chain). All raw memory access is confined
//! to `push`, `pop`, `next_of` and `unlink_run`.

use core::fmt;
use core::ptr::NonNull;

use crate::arch::riscv::without_interrupts;
use crate::platform::PAGE_SIZE;
use crate::types::PhysAddr;

/// Link word written into the first bytes of a free page.
#[repr(C)]
struct FreePage {
    next: Option<NonNull<FreePage>>,
}

static_assertions::assert_eq_size!(FreePage, usize);

/// Errors reported by the page allocator.
#[must_use = "allocation failures must be handled"]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageError {
    /// The free list cannot satisfy the request.
    OutOfMemory,
    /// A request for zero pages.
    ZeroCount,
    /// Enough pages are free but no run of `count` adjacent pages exists.
    NoContiguousRun { count: usize },
    /// Region bounds are not page aligned.
    Misaligned { start: usize, end: usize },
    /// Region starts at address zero, which the free list uses as its end
    /// marker.
    NullStart { end: usize },
    /// Region holds less than one page.
    RegionTooSmall { start: usize, end: usize },
}

impl PageError {
    pub fn label(self) -> &'static str {
        match self {
            Self::OutOfMemory => "out of memory",
            Self::ZeroCount => "zero-page request",
            Self::NoContiguousRun { .. } => "no contiguous run",
            Self::Misaligned { .. } => "misaligned region",
            Self::NullStart { .. } => "region starts at address zero",
            Self::RegionTooSmall { .. } => "region smaller than one page",
        }
    }
}

impl fmt::Display for PageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::NoContiguousRun { count } => write!(f, "{} of {} pages", self.label(), count),
            Self::Misaligned { start, end } | Self::RegionTooSmall { start, end } => {
                write!(f, "{} [0x{:x}, 0x{:x})", self.label(), start, end)
            }
            Self::NullStart { end } => write!(f, "{} [0x0, 0x{:x})", self.label(), end),
            _ => f.write_str(self.label()),
        }
    }
}

/// Free list corruption detected by [`PageAllocator::verify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreeListError {
    /// A link points inside a page instead of at its start.
    Misaligned { addr: usize },
    /// A link points outside the managed region.
    OutOfBounds { addr: usize },
    /// The chain is longer than the region, so it must revisit a page.
    Cycle { walked: usize },
    /// The chain length disagrees with the allocator's free counter.
    CountMismatch { expected: usize, found: usize },
}

impl fmt::Display for FreeListError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Misaligned { addr } => write!(f, "misaligned link 0x{:x}", addr),
            Self::OutOfBounds { addr } => write!(f, "out-of-bounds link 0x{:x}", addr),
            Self::Cycle { walked } => write!(f, "cycle after {} links", walked),
            Self::CountMismatch { expected, found } => {
                write!(f, "free count {} but chain holds {}", expected, found)
            }
        }
    }
}

/// Result of a successful free list walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeListReport {
    pub free_pages: usize,
    pub total_pages: usize,
}

/// Fixed pool of `PAGE_SIZE` frames.
///
/// Single hart only: the kernel runs with machine interrupts masked, and
/// push/pop additionally run inside [`without_interrupts`].
pub struct PageAllocator {
    start: usize,
    end: usize,
    head: Option<NonNull<FreePage>>,
    free: usize,
    total: usize,
}

impl PageAllocator {
    /// Allocator managing nothing; every request fails until `init`.
    pub const fn empty() -> Self {
        Self { start: 0, end: 0, head: None, free: 0, total: 0 }
    }

    /// Hands `[start, end)` to the allocator.
    ///
    /// Frames are pushed from the top of the region down, so the lowest
    /// frame is handed out first.
    ///
    /// # Safety
    ///
    /// The region must be RAM owned exclusively by the allocator from now on;
    /// the first word of every page is overwritten.
    pub unsafe fn try_init(&mut self, start: usize, end: usize) -> Result<(), PageError> {
        let (Some(base), Some(_)) = (PhysAddr::page_aligned(start), PhysAddr::page_aligned(end))
        else {
            return Err(PageError::Misaligned { start, end });
        };
        if base.raw() == 0 {
            return Err(PageError::NullStart { end });
        }
        if end <= start || end - start < PAGE_SIZE {
            return Err(PageError::RegionTooSmall { start, end });
        }

        self.start = start;
        self.end = end;
        self.head = None;
        self.free = 0;
        self.total = (end - start) / PAGE_SIZE;

        let mut frame = end;
        while frame > start {
            frame -= PAGE_SIZE;
            unsafe { self.push(frame) };
        }
        log_debug!(
            target: "mm",
            "page allocator: [0x{:x}, 0x{:x}) pages={}",
            start,
            end,
            self.total
        );
        Ok(())
    }

    /// Like [`try_init`](Self::try_init) but treats a bad region as a fatal
    /// boot configuration error.
    ///
    /// # Safety
    ///
    /// Same contract as [`try_init`](Self::try_init).
    pub unsafe fn init(&mut self, start: usize, end: usize) {
        if let Err(err) = unsafe { self.try_init(start, end) } {
            panic!("page allocator init: {}", err);
        }
    }

    /// Allocates `count` physically contiguous pages.
    ///
    /// Single pages are popped off the head in O(1). Runs scan the free list
    /// and fail with [`PageError::NoContiguousRun`] rather than returning
    /// scattered pages. A failed request leaves the free list untouched.
    pub fn alloc(&mut self, count: usize) -> Result<PhysAddr, PageError> {
        let result = without_interrupts(|| match count {
            0 => Err(PageError::ZeroCount),
            1 => self.pop().ok_or(PageError::OutOfMemory),
            _ => self.take_run(count),
        });
        match result {
            Ok(addr) => log_trace!(target: "mm", "alloc pages={} at 0x{:x}", count, addr),
            Err(err) => log_trace!(target: "mm", "alloc pages={} failed: {}", count, err),
        }
        result.map(PhysAddr::new)
    }

    /// Returns one page to the head of the free list.
    ///
    /// # Panics
    ///
    /// Panics when `addr` is misaligned or outside the managed region, and in
    /// debug builds when the page is already free.
    pub fn free(&mut self, addr: PhysAddr) {
        let raw = addr.raw();
        assert!(addr.is_page_aligned(), "page allocator: free of misaligned address {}", addr);
        assert!(
            raw >= self.start && raw < self.end,
            "page allocator: free of {} outside [0x{:x}, 0x{:x})",
            addr,
            self.start,
            self.end
        );
        debug_assert!(!self.is_free(addr), "page allocator: double free of {}", addr);

        // SAFETY: in range, aligned, and no longer owned by the caller.
        without_interrupts(|| unsafe { self.push(raw) });
        log_trace!(target: "mm", "free {}", addr);
    }

    /// Returns a run obtained from `alloc(count)`.
    ///
    /// Pages are pushed top-down so the run's base is reused first.
    pub fn free_run(&mut self, base: PhysAddr, count: usize) {
        for page in (0..count).rev() {
            match base.checked_add_pages(page) {
                Some(addr) => self.free(addr),
                None => panic!("page allocator: run at {} overflows the address space", base),
            }
        }
    }

    /// Walks the free list and checks every link.
    pub fn verify(&self) -> Result<FreeListReport, FreeListError> {
        let mut walked = 0;
        let mut cursor = self.head;
        while let Some(page) = cursor {
            let addr = page.as_ptr() as usize;
            if addr % PAGE_SIZE != 0 {
                return Err(FreeListError::Misaligned { addr });
            }
            if addr < self.start || addr >= self.end {
                return Err(FreeListError::OutOfBounds { addr });
            }
            walked += 1;
            // A terminating singly linked chain never repeats a node, so the
            // length bound also proves every frame is unique.
            if walked > self.total {
                return Err(FreeListError::Cycle { walked });
            }
            cursor = unsafe { Self::next_of(page) };
        }
        if walked != self.free {
            return Err(FreeListError::CountMismatch { expected: self.free, found: walked });
        }
        Ok(FreeListReport { free_pages: walked, total_pages: self.total })
    }

    /// Returns true when `addr` is currently on the free list.
    pub fn is_free(&self, addr: PhysAddr) -> bool {
        let mut cursor = self.head;
        while let Some(page) = cursor {
            if page.as_ptr() as usize == addr.raw() {
                return true;
            }
            cursor = unsafe { Self::next_of(page) };
        }
        false
    }

    pub fn free_pages(&self) -> usize {
        self.free
    }

    pub fn total_pages(&self) -> usize {
        self.total
    }

    /// Managed `[start, end)` range.
    pub fn region(&self) -> (usize, usize) {
        (self.start, self.end)
    }

    fn take_run(&mut self, count: usize) -> Result<usize, PageError> {
        if count > self.free {
            return Err(PageError::OutOfMemory);
        }
        let mut cursor = self.head;
        while let Some(page) = cursor {
            let base = page.as_ptr() as usize;
            if self.run_is_free(base, count) {
                unsafe { self.unlink_run(base, count) };
                return Ok(base);
            }
            cursor = unsafe { Self::next_of(page) };
        }
        Err(PageError::NoContiguousRun { count })
    }

    fn run_is_free(&self, base: usize, count: usize) -> bool {
        let fits = count
            .checked_mul(PAGE_SIZE)
            .and_then(|bytes| base.checked_add(bytes))
            .is_some_and(|limit| limit <= self.end);
        fits && (1..count).all(|page| self.is_free(PhysAddr::new(base + page * PAGE_SIZE)))
    }

    /// Pushes `addr` onto the head of the free list.
    ///
    /// # Safety
    ///
    /// `addr` must be an aligned, in-range page not currently on the list.
    unsafe fn push(&mut self, addr: usize) {
        let page = addr as *mut FreePage;
        unsafe { page.write(FreePage { next: self.head }) };
        self.head = NonNull::new(page);
        self.free += 1;
    }

    fn pop(&mut self) -> Option<usize> {
        let page = self.head?;
        self.head = unsafe { Self::next_of(page) };
        self.free -= 1;
        Some(page.as_ptr() as usize)
    }

    /// Removes every page in `[base, base + count pages)` from the list.
    ///
    /// # Safety
    ///
    /// All pages of the run must be on the free list.
    unsafe fn unlink_run(&mut self, base: usize, count: usize) {
        let limit = base + count * PAGE_SIZE;
        let mut removed = 0;
        let mut link: *mut Option<NonNull<FreePage>> = &mut self.head;
        unsafe {
            while let Some(page) = *link {
                let addr = page.as_ptr() as usize;
                if addr >= base && addr < limit {
                    *link = (*page.as_ptr()).next;
                    removed += 1;
                    if removed == count {
                        break;
                    }
                } else {
                    link = &mut (*page.as_ptr()).next;
                }
            }
        }
        debug_assert_eq!(removed, count, "page allocator: run at 0x{:x} was not fully free", base);
        self.free -= removed;
    }

    /// Reads the link word of a free page.
    ///
    /// # Safety
    ///
    /// `page` must be on the free list.
    #[inline]
    unsafe fn next_of(page: NonNull<FreePage>) -> Option<NonNull<FreePage>> {
        unsafe { (*page.as_ptr()).next }
    }
}

impl Default for PageAllocator {
    fn default() -> Self {
        Self::empty()
    }
}
