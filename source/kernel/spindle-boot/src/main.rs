// Copyright 2024 Spindle Contributors
// SPDX-License-Identifier: Apache-2.0

//! Boot wrapper for the spindle kernel. Provides a minimal `_start` entry
//! point that parks secondary harts, sets up the boot stack and `gp`, and
//! hands execution to the kernel library via `spindle::kmain()`.
#![cfg_attr(all(target_arch = "riscv64", target_os = "none"), no_std, no_main)]

#[cfg(all(target_arch = "riscv64", target_os = "none"))]
core::arch::global_asm!(
    r#"
    .section .text._start, "ax", @progbits
    .globl _start
    .align 4
_start:
    /* Only hart 0 boots; the others sleep forever. */
    csrr t0, mhartid
    bnez t0, 2f
    la   sp, __stack_top
    /* RISC-V ABI: initialize gp for small-data accesses (Rust may rely on it).
     * Use PC-relative addressing (kernel is linked above 2GiB). */
    .option push
    .option norelax
    la   gp, __global_pointer$
    .option pop
    j    start_rust
2:
    wfi
    j    2b
"#
);

#[cfg(all(target_arch = "riscv64", target_os = "none"))]
#[no_mangle]
pub extern "C" fn start_rust() -> ! {
    // SAFETY: only hart 0 reaches this point, once, with a valid boot stack
    // and interrupts still disabled from reset.
    unsafe { spindle::early_boot_init() };
    spindle::kmain()
}

/// Host builds only type-check the workspace; the kernel needs the target.
#[cfg(not(all(target_arch = "riscv64", target_os = "none")))]
fn main() {
    eprintln!("spindle-boot must be built for riscv64gc-unknown-none-elf");
}
