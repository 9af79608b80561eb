// Copyright 2024 Spindle Contributors
// SPDX-License-Identifier: Apache-2.0

// Shared by `platform.rs` and the spindle-boot build script, which renders
// these values into the linker script. Plain constants only.

/// Base address of RAM; the kernel image is linked here.
pub const RAM_BASE: usize = 0x8000_0000;
/// RAM length configured for QEMU (`-m 128M`).
pub const LENGTH_RAM: usize = 128 * 1024 * 1024;
