// Copyright 2024 Spindle Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Minimal newtypes shared by the allocator, task store and scheduler
//! OWNERS: @kernel-team
//! PUBLIC API: PhysAddr, TaskId
//! DEPENDS_ON: platform::PAGE_SIZE
//! INVARIANTS: TaskId is a slot index into the fixed task table; PhysAddr alignment helpers

use crate::platform::PAGE_SIZE;
use core::fmt;

/// Physical address handed out by the page allocator.
///
/// The kernel runs without translation, so physical addresses are also the
/// addresses the CPU dereferences.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct PhysAddr(usize);

impl PhysAddr {
    #[inline]
    pub const fn new(addr: usize) -> Self {
        Self(addr)
    }

    /// Returns `Some` only when `addr` sits on a page boundary.
    #[inline]
    pub const fn page_aligned(addr: usize) -> Option<Self> {
        if addr % PAGE_SIZE == 0 {
            Some(Self(addr))
        } else {
            None
        }
    }

    #[inline]
    pub const fn raw(self) -> usize {
        self.0
    }

    #[inline]
    pub const fn is_page_aligned(self) -> bool {
        self.0 % PAGE_SIZE == 0
    }

    /// Address `pages` pages above `self`, or `None` on overflow.
    #[inline]
    pub fn checked_add_pages(self, pages: usize) -> Option<Self> {
        pages.checked_mul(PAGE_SIZE).and_then(|bytes| self.0.checked_add(bytes)).map(Self)
    }

    #[inline]
    pub fn as_mut_ptr<T>(self) -> *mut T {
        self.0 as *mut T
    }
}

impl fmt::Display for PhysAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

/// Task identifier.
///
/// **Ownership**: Only `TaskTable` hands out identifiers.
/// **Invariant**: the raw value is the slot index inside the task table.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TaskId(u32);

impl TaskId {
    /// Creates an identifier from a raw value (kernel-internal only).
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn as_raw(self) -> u32 {
        self.0
    }

    /// Returns the identifier as an index into the task table.
    #[inline]
    pub const fn as_index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_raw())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_aligned_rejects_offsets() {
        assert_eq!(PhysAddr::page_aligned(PAGE_SIZE * 3), Some(PhysAddr::new(PAGE_SIZE * 3)));
        assert_eq!(PhysAddr::page_aligned(PAGE_SIZE + 8), None);
    }

    #[test]
    fn checked_add_pages_detects_overflow() {
        let base = PhysAddr::new(PAGE_SIZE);
        assert_eq!(base.checked_add_pages(2), Some(PhysAddr::new(PAGE_SIZE * 3)));
        assert_eq!(PhysAddr::new(usize::MAX - 1).checked_add_pages(1), None);
    }
}
