// Copyright 2024 Spindle Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Diagnostics shared by every subsystem
//! OWNERS: @kernel-team
//! PUBLIC API: log (log_* macros)

#[macro_use]
pub mod log;
