// Copyright 2024 Spindle Contributors
// SPDX-License-Identifier: Apache-2.0

//! QEMU RISC-V `virt` machine constants (16550A UART, machine mode).
//!
//! Memory map, see qemu `hw/riscv/virt.c`, `virt_memmap[]`:
//! - `0x0000_1000` boot ROM
//! - `0x0200_0000` CLINT
//! - `0x0c00_0000` PLIC
//! - `0x1000_0000` UART0
//! - `0x8000_0000` RAM, the boot ROM jumps here in machine mode

include!("../ram_layout.rs");

/// First UART on the `virt` machine.
pub const UART0_BASE: usize = 0x1000_0000;

/// Size of a page frame in bytes.
pub const PAGE_SIZE: usize = 4096;

/// Capacity of the task table.
pub const MAX_TASKS: usize = 10;
/// Pages backing each task stack.
pub const TASK_STACK_PAGES: usize = 1;
/// Pages handed to the kernel heap at boot.
pub const KERNEL_HEAP_PAGES: usize = 16;

static_assertions::const_assert!(PAGE_SIZE.is_power_of_two());
static_assertions::const_assert!(MAX_TASKS > 0 && MAX_TASKS <= u32::MAX as usize);
static_assertions::const_assert!(TASK_STACK_PAGES > 0);
static_assertions::const_assert!(RAM_BASE % PAGE_SIZE == 0 && LENGTH_RAM % PAGE_SIZE == 0);

/// Whether `[start, end)` lies inside the RAM the kernel is linked for.
pub const fn ram_contains(start: usize, end: usize) -> bool {
    start >= RAM_BASE && start <= end && end <= RAM_BASE + LENGTH_RAM
}

#[cfg(all(target_arch = "riscv64", target_os = "none"))]
extern "C" {
    static __heap_start: u8;
    static __heap_end: u8;
}

/// Returns the `[start, end)` range the page allocator manages.
///
/// Both bounds come from `kernel.ld`, which page-aligns them.
#[cfg(all(target_arch = "riscv64", target_os = "none"))]
pub fn page_region() -> (usize, usize) {
    // SAFETY: linker-provided symbols; only their addresses are taken.
    let region = unsafe {
        (
            core::ptr::addr_of!(__heap_start) as usize,
            core::ptr::addr_of!(__heap_end) as usize,
        )
    };
    assert!(
        ram_contains(region.0, region.1),
        "page region [0x{:x}, 0x{:x}) outside RAM",
        region.0,
        region.1
    );
    region
}
