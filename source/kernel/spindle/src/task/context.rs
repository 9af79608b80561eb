// Copyright 2024 Spindle Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Saved register file and the context switch seam
//! OWNERS: @kernel-sched-team
//! PUBLIC API: TaskContext, ContextSwitch, HartSwitch (riscv64 none only)
//! DEPENDS_ON: arch::riscv (switch_context, gp/tp readers)
//! INVARIANTS: Field order matches arch/riscv/switch.S; only ContextSwitch::switch mutates a live context

use core::mem::{offset_of, size_of};

use static_assertions::const_assert_eq;

/// Registers captured when a task stops running and restored when it
/// resumes. `x0` is hardwired to zero and not stored.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskContext {
    pub ra: usize,
    pub sp: usize,
    pub gp: usize,
    pub tp: usize,
    pub t0: usize,
    pub t1: usize,
    pub t2: usize,
    pub s0: usize,
    pub s1: usize,
    pub a0: usize,
    pub a1: usize,
    pub a2: usize,
    pub a3: usize,
    pub a4: usize,
    pub a5: usize,
    pub a6: usize,
    pub a7: usize,
    pub s2: usize,
    pub s3: usize,
    pub s4: usize,
    pub s5: usize,
    pub s6: usize,
    pub s7: usize,
    pub s8: usize,
    pub s9: usize,
    pub s10: usize,
    pub s11: usize,
    pub t3: usize,
    pub t4: usize,
    pub t5: usize,
    pub t6: usize,
}

const_assert_eq!(size_of::<TaskContext>(), 31 * size_of::<usize>());
const_assert_eq!(offset_of!(TaskContext, sp), size_of::<usize>());
const_assert_eq!(offset_of!(TaskContext, a0), 9 * size_of::<usize>());
const_assert_eq!(offset_of!(TaskContext, s2), 17 * size_of::<usize>());
const_assert_eq!(offset_of!(TaskContext, t6), 30 * size_of::<usize>());

impl TaskContext {
    pub const fn zeroed() -> Self {
        Self {
            ra: 0,
            sp: 0,
            gp: 0,
            tp: 0,
            t0: 0,
            t1: 0,
            t2: 0,
            s0: 0,
            s1: 0,
            a0: 0,
            a1: 0,
            a2: 0,
            a3: 0,
            a4: 0,
            a5: 0,
            a6: 0,
            a7: 0,
            s2: 0,
            s3: 0,
            s4: 0,
            s5: 0,
            s6: 0,
            s7: 0,
            s8: 0,
            s9: 0,
            s10: 0,
            s11: 0,
            t3: 0,
            t4: 0,
            t5: 0,
            t6: 0,
        }
    }

    /// Context that "resumes" into `trampoline(arg0, arg1)` on a fresh stack.
    ///
    /// `gp` and `tp` are hart-wide on this kernel and copied from the caller.
    pub fn fresh(trampoline: usize, stack_top: usize, arg0: usize, arg1: usize) -> Self {
        Self {
            ra: trampoline,
            sp: stack_top,
            gp: crate::arch::riscv::global_pointer(),
            tp: crate::arch::riscv::thread_pointer(),
            a0: arg0,
            a1: arg1,
            ..Self::zeroed()
        }
    }
}

/// Register-level control transfer between two saved contexts.
///
/// Implementations capture the live register file into `save_into` and load
/// `restore_from`. The call returns only when some later switch restores
/// `save_into`, which makes it appear to return from a different logical
/// point than the one it was called from.
///
/// The switcher is only ever borrowed shared: a suspended task stays parked
/// inside `switch` while other tasks use the same switcher.
pub trait ContextSwitch {
    /// # Safety
    ///
    /// Both pointers must reference valid contexts that no live reference
    /// covers, and `restore_from` must hold a suspension point or a fresh
    /// context built by the task store.
    unsafe fn switch(&self, save_into: *mut TaskContext, restore_from: *const TaskContext);

    /// Gives up the hart for good once no task is left to run.
    fn park(&self) -> ! {
        crate::arch::riscv::halt()
    }
}

/// Switches the executing hart via `arch::riscv::switch_context`.
#[cfg(all(target_arch = "riscv64", target_os = "none"))]
#[derive(Debug, Default, Clone, Copy)]
pub struct HartSwitch;

#[cfg(all(target_arch = "riscv64", target_os = "none"))]
impl ContextSwitch for HartSwitch {
    #[inline(always)]
    unsafe fn switch(&self, save_into: *mut TaskContext, restore_from: *const TaskContext) {
        unsafe { crate::arch::riscv::switch_context(save_into, restore_from) }
    }
}
