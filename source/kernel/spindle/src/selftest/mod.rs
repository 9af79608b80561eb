// Copyright 2024 Spindle Contributors
// SPDX-License-Identifier: Apache-2.0

//! In-kernel selftest harness executed once during boot, right after the
//! page allocator takes ownership of RAM and before any other client uses it.

use crate::{
    mm::{PageAllocator, PageError, PAGE_SIZE},
    types::PhysAddr,
    uart,
};

pub mod assert;

/// Run sizes exercised by the contiguous allocation check.
const RUNS: [usize; 3] = [2, 7, 4];

/// Borrowed references to kernel subsystems used by selftests.
pub struct Context<'a> {
    pub pages: &'a mut PageAllocator,
}

/// Entrypoint invoked by the kernel after the page allocator is initialised.
pub fn entry(ctx: &mut Context<'_>) {
    uart::write_line("SELFTEST: begin");
    test_free_list(ctx);
    uart::write_line("SELFTEST: free list ok");
    test_runs(ctx);
    uart::write_line("SELFTEST: runs ok");
    test_rejects(ctx);
    uart::write_line("SELFTEST: end");
}

fn test_free_list(ctx: &Context<'_>) {
    use crate::{st_assert, st_expect_eq};

    let (start, end) = ctx.pages.region();
    let report = match ctx.pages.verify() {
        Ok(report) => report,
        Err(err) => crate::selftest::assert::report_failure_fmt(format_args!("verify: {}", err)),
    };
    st_expect_eq!(report.total_pages, (end - start) / PAGE_SIZE);
    st_expect_eq!(report.free_pages, report.total_pages, "fresh allocator must be full");
    st_assert!(report.total_pages >= RUNS.iter().sum::<usize>(), "region too small for selftest");
}

fn test_runs(ctx: &mut Context<'_>) {
    use crate::{st_assert, st_expect_eq};

    let before = ctx.pages.free_pages();
    let mut taken = [PhysAddr::new(0); RUNS.len()];
    for (slot, count) in taken.iter_mut().zip(RUNS) {
        *slot = match ctx.pages.alloc(count) {
            Ok(base) => base,
            Err(err) => crate::selftest::assert::report_failure_fmt(format_args!(
                "alloc({}): {}",
                count,
                err
            )),
        };
        st_expect_eq!(slot.raw() % PAGE_SIZE, 0usize);
    }
    st_expect_eq!(ctx.pages.free_pages(), before - RUNS.iter().sum::<usize>());

    for i in 0..RUNS.len() {
        for j in i + 1..RUNS.len() {
            st_assert!(
                disjoint(taken[i], RUNS[i], taken[j], RUNS[j]),
                "runs {} and {} overlap",
                i,
                j
            );
        }
    }

    for (base, count) in taken.iter().zip(RUNS) {
        ctx.pages.free_run(*base, count);
    }
    st_expect_eq!(ctx.pages.free_pages(), before, "free count restored");

    // The most recently returned page is handed out first.
    let last = taken[RUNS.len() - 1];
    let reused = ctx.pages.alloc(1);
    st_expect_eq!(reused, Ok(last), "LIFO reuse");
    ctx.pages.free(last);
    st_expect_eq!(ctx.pages.free_pages(), before);
}

fn test_rejects(ctx: &mut Context<'_>) {
    use crate::st_expect_err;

    st_expect_err!(ctx.pages.alloc(0), PageError::ZeroCount);
    let too_many = ctx.pages.free_pages() + 1;
    st_expect_err!(ctx.pages.alloc(too_many), PageError::OutOfMemory);
}

fn disjoint(a: PhysAddr, a_pages: usize, b: PhysAddr, b_pages: usize) -> bool {
    let a_end = a.raw() + a_pages * PAGE_SIZE;
    let b_end = b.raw() + b_pages * PAGE_SIZE;
    a_end <= b.raw() || b_end <= a.raw()
}
