// Copyright 2024 Spindle Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Physical page frame management
//! OWNERS: @kernel-mm-team
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: Unit + property tests (mm/tests.rs), boot self-test
//! PUBLIC API: PageAllocator (init/alloc/free/free_run/verify), PageError, FreeListError, PAGE_SIZE
//! DEPENDS_ON: platform (page size), arch::riscv::without_interrupts
//! INVARIANTS: A page is either on the free list or owned by exactly one client; free list is acyclic and in-bounds

mod page_alloc;

pub use crate::platform::PAGE_SIZE;
pub use page_alloc::{FreeListError, FreeListReport, PageAllocator, PageError};
