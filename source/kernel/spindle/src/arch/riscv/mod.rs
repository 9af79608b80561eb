// Copyright 2024 Spindle Contributors
// SPDX-License-Identifier: Apache-2.0

//! RISC-V specific helpers used across the spindle kernel.
//!
//! The kernel runs in machine mode. Host builds still exercise the high level
//! logic via the lightweight `#[cfg(not(...))]` stubs below.

#[cfg(all(target_arch = "riscv64", target_os = "none"))]
core::arch::global_asm!(include_str!("switch.S"));

#[cfg(all(target_arch = "riscv64", target_os = "none"))]
extern "C" {
    fn __switch_context(
        save_into: *mut crate::task::TaskContext,
        restore_from: *const crate::task::TaskContext,
    );
}

/// Saves the live register file into `save_into` and resumes `restore_from`.
///
/// # Safety
///
/// Both pointers must reference valid, exclusively owned contexts.
/// `restore_from` must hold either a suspension point captured by a previous
/// switch or a fresh context built by the task store.
#[cfg(all(target_arch = "riscv64", target_os = "none"))]
#[inline(always)]
pub unsafe fn switch_context(
    save_into: *mut crate::task::TaskContext,
    restore_from: *const crate::task::TaskContext,
) {
    unsafe { __switch_context(save_into, restore_from) }
}

/// Clears the `.bss` region defined by the linker.
#[inline]
pub fn clear_bss(start: *mut u8, end: *mut u8) {
    #[cfg(target_arch = "riscv64")]
    unsafe {
        let mut ptr = start;
        while ptr < end {
            core::ptr::write_volatile(ptr, 0);
            ptr = ptr.add(1);
        }
    }
    #[cfg(not(target_arch = "riscv64"))]
    {
        let len = end as usize - start as usize;
        let slice = unsafe { core::slice::from_raw_parts_mut(start, len) };
        for byte in slice {
            *byte = 0;
        }
    }
}

/// Returns the hart's global pointer (`gp`).
#[inline]
pub fn global_pointer() -> usize {
    #[cfg(all(target_arch = "riscv64", target_os = "none"))]
    {
        let gp: usize;
        unsafe { core::arch::asm!("mv {0}, gp", out(reg) gp, options(nomem, nostack, preserves_flags)) };
        gp
    }
    #[cfg(not(all(target_arch = "riscv64", target_os = "none")))]
    {
        0
    }
}

/// Returns the hart's thread pointer (`tp`).
#[inline]
pub fn thread_pointer() -> usize {
    #[cfg(all(target_arch = "riscv64", target_os = "none"))]
    {
        let tp: usize;
        unsafe { core::arch::asm!("mv {0}, tp", out(reg) tp, options(nomem, nostack, preserves_flags)) };
        tp
    }
    #[cfg(not(all(target_arch = "riscv64", target_os = "none")))]
    {
        0
    }
}

/// Returns the id of the executing hart.
#[inline]
pub fn hart_id() -> usize {
    #[cfg(all(target_arch = "riscv64", target_os = "none"))]
    {
        riscv::register::mhartid::read()
    }
    #[cfg(not(all(target_arch = "riscv64", target_os = "none")))]
    {
        0
    }
}

/// Runs `f` with machine interrupts masked, restoring the previous MIE bit.
#[inline]
pub fn without_interrupts<R>(f: impl FnOnce() -> R) -> R {
    #[cfg(all(target_arch = "riscv64", target_os = "none"))]
    {
        use riscv::register::mstatus;
        let was_enabled = mstatus::read().mie();
        if was_enabled {
            unsafe { mstatus::clear_mie() };
        }
        let result = f();
        if was_enabled {
            unsafe { mstatus::set_mie() };
        }
        result
    }
    #[cfg(not(all(target_arch = "riscv64", target_os = "none")))]
    {
        f()
    }
}

/// Issues a WFI instruction or spins on the host.
#[inline]
pub fn wait_for_interrupt() {
    #[cfg(target_arch = "riscv64")]
    unsafe {
        core::arch::asm!("wfi", options(nomem, nostack, preserves_flags));
    }
    #[cfg(not(target_arch = "riscv64"))]
    {
        core::hint::spin_loop();
    }
}

/// Parks the hart forever.
pub fn halt() -> ! {
    loop {
        wait_for_interrupt();
    }
}
