// Copyright 2024 Spindle Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: spindle kernel library (RISC-V 64, QEMU virt, machine mode)
//! OWNERS: @kernel-team
//! PUBLIC API: early_boot_init(), kmain(), mm::PageAllocator, task::TaskTable, sched::Scheduler
//! DEPENDS_ON: spindle-boot provides `_start` and the linker script
//! INVARIANTS: Single hart after boot; cooperative scheduling only; host builds run all portable logic
//!
//! The page frame allocator owns all RAM above the kernel image. Tasks get
//! their stacks from it and switch cooperatively through
//! [`sched::Scheduler`].

#![cfg_attr(not(test), no_std)]
#![cfg_attr(not(test), forbid(clippy::unwrap_used))]

extern crate alloc;

#[macro_use]
mod diag;

pub mod arch;
mod boot;
pub mod heap;
#[cfg(all(target_arch = "riscv64", target_os = "none"))]
mod kmain;
pub mod mm;
#[cfg(all(target_arch = "riscv64", target_os = "none", not(test)))]
mod panic;
pub mod platform;
pub mod sched;
pub mod selftest;
pub mod task;
#[cfg(test)]
mod testing;
pub mod types;
pub mod uart;

pub use boot::early_boot_init;
pub use diag::log;
#[cfg(all(target_arch = "riscv64", target_os = "none"))]
pub use kmain::kmain;
