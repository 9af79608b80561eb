// Copyright 2024 Spindle Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Early boot routines for the spindle kernel
//! OWNERS: @kernel-boot-team
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: No tests (boot path proven via QEMU console output)
//! PUBLIC API: early_boot_init()
//! DEPENDS_ON: arch::riscv::clear_bss, uart::init
//! INVARIANTS: Single-invocation on hart 0; interrupts masked; runs before any static is read

use crate::uart;

#[cfg(all(target_arch = "riscv64", target_os = "none"))]
extern "C" {
    static mut __bss_start: u8;
    static mut __bss_end: u8;
}

/// Perform the machine initialisation required before the kernel can run.
///
/// # Safety
///
/// This must only be invoked once on the boot hart before any Rust code that
/// relies on zero-initialised statics executes. Callers must ensure the
/// stack is valid and interrupts are masked.
pub unsafe fn early_boot_init() {
    // SAFETY: called once during early boot, before interrupts/tasks.
    unsafe {
        zero_bss();
    }
    uart::init();
    log_info!(target: "boot", "boot: ok");
}

unsafe fn zero_bss() {
    #[cfg(all(target_arch = "riscv64", target_os = "none"))]
    {
        crate::arch::riscv::clear_bss(
            core::ptr::addr_of_mut!(__bss_start),
            core::ptr::addr_of_mut!(__bss_end),
        );
    }
}
