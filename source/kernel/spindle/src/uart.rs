// Copyright 2024 Spindle Contributors
// SPDX-License-Identifier: Apache-2.0

//! Minimal NS16550A UART support for boot diagnostics.
//!
//! Register reference: TECHNICAL DATA ON 16550, "PROGRAMMING TABLE".
//! On host builds every MMIO access is discarded so logging stays harmless
//! under `cargo test`.

use bitflags::bitflags;
use core::fmt::{self, Write};
use spin::Mutex;

use crate::platform::UART0_BASE;

/// Transmit holding register (write) / divisor latch LSB when DLAB is set.
const UART_THR: usize = 0x0;
const UART_DLL: usize = 0x0;
/// Interrupt enable register / divisor latch MSB when DLAB is set.
const UART_IER: usize = 0x1;
const UART_DLM: usize = 0x1;
const UART_LCR: usize = 0x3;
const UART_LSR: usize = 0x5;

/// Divisor for 38.4k baud with a 1.8432 MHz crystal.
const BAUD_DIVISOR: u16 = 3;

bitflags! {
    /// Line status register bits.
    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    pub struct LineStatus: u8 {
        const TX_IDLE = 1 << 5;
    }
}

bitflags! {
    /// Line control register bits.
    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    pub struct LineControl: u8 {
        /// 8-bit words, one stop bit, no parity.
        const WORD_LEN_8 = 0b11;
        /// Divisor latch access.
        const DLAB = 1 << 7;
    }
}

/// Global UART writer used for boot logs.
static UART0: Mutex<KernelUart> = Mutex::new(KernelUart::new(UART0_BASE));

/// UART implementation capable of formatted writes.
#[derive(Clone, Copy)]
pub struct KernelUart {
    base: usize,
}

impl KernelUart {
    /// Creates a UART abstraction rooted at `base`.
    pub const fn new(base: usize) -> Self {
        Self { base }
    }

    /// Returns a guard for the boot UART singleton.
    pub fn lock() -> spin::MutexGuard<'static, KernelUart> {
        UART0.lock()
    }

    /// Masks UART interrupts and programs 38.4k 8N1.
    pub fn configure(&self) {
        write_reg(self.base, UART_IER, 0x00);

        let lcr = LineControl::from_bits_retain(read_reg(self.base, UART_LCR));
        write_reg(self.base, UART_LCR, (lcr | LineControl::DLAB).bits());
        write_reg(self.base, UART_DLL, (BAUD_DIVISOR & 0xff) as u8);
        write_reg(self.base, UART_DLM, (BAUD_DIVISOR >> 8) as u8);

        // Clearing DLAB here also restores THR/IER at offsets 0 and 1.
        write_reg(self.base, UART_LCR, LineControl::WORD_LEN_8.bits());
    }

    /// Blocks until the transmitter is idle, then writes one byte.
    pub fn write_byte(&self, byte: u8) {
        transmit(self.base, byte);
    }
}

impl Write for KernelUart {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for &byte in s.as_bytes() {
            if byte == b'\n' {
                self.write_byte(b'\r');
            }
            self.write_byte(byte);
        }
        Ok(())
    }
}

#[inline]
fn read_reg(base: usize, offset: usize) -> u8 {
    #[cfg(all(target_arch = "riscv64", target_os = "none"))]
    unsafe {
        core::ptr::read_volatile((base + offset) as *const u8)
    }
    #[cfg(not(all(target_arch = "riscv64", target_os = "none")))]
    {
        let _ = (base, offset);
        LineStatus::TX_IDLE.bits()
    }
}

#[inline]
fn write_reg(base: usize, offset: usize, value: u8) {
    #[cfg(all(target_arch = "riscv64", target_os = "none"))]
    unsafe {
        core::ptr::write_volatile((base + offset) as *mut u8, value);
    }
    #[cfg(not(all(target_arch = "riscv64", target_os = "none")))]
    {
        let _ = (base, offset, value);
    }
}

#[inline]
fn transmit(base: usize, byte: u8) {
    while !LineStatus::from_bits_retain(read_reg(base, UART_LSR)).contains(LineStatus::TX_IDLE) {
        core::hint::spin_loop();
    }
    write_reg(base, UART_THR, byte);
}

// Raw, lock-free UART emission for panic contexts where the mutex may already be held.
pub struct RawUart;

impl Write for RawUart {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for &byte in s.as_bytes() {
            if byte == b'\n' {
                transmit(UART0_BASE, b'\r');
            }
            transmit(UART0_BASE, byte);
        }
        Ok(())
    }
}

pub fn raw_writer() -> RawUart {
    RawUart
}

/// Programs the boot UART. Called once before the first log line.
pub fn init() {
    KernelUart::lock().configure();
}

/// Writes the provided string via the global UART.
pub fn write_str(message: &str) {
    let mut uart = KernelUart::lock();
    let _ = uart.write_str(message);
}

/// Writes a line terminated by `\n` to the UART.
pub fn write_line(message: &str) {
    let mut uart = KernelUart::lock();
    let _ = uart.write_str(message);
    let _ = uart.write_str("\n");
}

#[doc(hidden)]
pub fn write_fmt(args: fmt::Arguments<'_>) {
    let mut uart = KernelUart::lock();
    let _ = uart.write_fmt(args);
}

/// Formatted console output terminated by `\n`.
#[macro_export]
macro_rules! kprintln {
    () => {{
        $crate::uart::write_str("\n");
    }};
    ($($arg:tt)*) => {{
        $crate::uart::write_fmt(format_args!($($arg)*));
        $crate::uart::write_str("\n");
    }};
}
