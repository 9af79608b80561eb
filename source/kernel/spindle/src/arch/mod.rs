// Copyright 2024 Spindle Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Architecture specific support code
//! OWNERS: @kernel-arch-team
//! PUBLIC API: arch backends under `arch::<isa>`
//! DEPENDS_ON: per-ISA modules (e.g., riscv)
//! INVARIANTS: Keep per-arch code isolated behind module boundaries

pub mod riscv;
