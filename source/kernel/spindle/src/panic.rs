// Copyright 2024 Spindle Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Unified panic handler emitting deterministic diagnostics over UART
//! OWNERS: @kernel-team
//! PUBLIC API: panic handler (no_std)
//! DEPENDS_ON: uart::raw_writer(), arch::riscv::halt()
//! INVARIANTS: No allocations; never takes the console lock; hart parks afterwards

use core::{fmt::Write, panic::PanicInfo};

use crate::uart;

/// Emits `PANIC: file:line: message` and parks the hart.
#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    crate::arch::riscv::without_interrupts(|| {
        // The console lock may be held by the panicking code path.
        let mut w = uart::raw_writer();
        let _ = w.write_str("\nPANIC: ");
        if let Some(location) = info.location() {
            let _ = write!(w, "{}:{}: ", location.file(), location.line());
        }
        let _ = writeln!(w, "{}", info.message());

        let ra: usize;
        unsafe { core::arch::asm!("mv {}, ra", out(reg) ra) };
        let _ = writeln!(w, "PANIC ra=0x{:x} hart={}", ra, crate::arch::riscv::hart_id());
    });

    crate::arch::riscv::halt()
}
