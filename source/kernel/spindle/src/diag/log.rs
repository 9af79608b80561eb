// Copyright 2024 Spindle Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Leveled kernel log lines over the boot UART
//! OWNERS: @kernel-team
//! PUBLIC API: log_* macros, Level, enabled(level,target), emit(level,target,args)
//! INVARIANTS: One line per record, written under a single UART lock

use core::fmt::{Arguments, Write};

/// Subsystems allowed to emit `Trace` records. Everything else is dropped at
/// `Trace` even when tracing is compiled in.
pub const TRACE_TARGETS: &[&str] = &["mm", "sched", "task"];

/// Record severity, most severe first.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum Level {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl Level {
    /// Least severe level this build keeps.
    pub const CEILING: Level = if cfg!(all(debug_assertions, feature = "debug_uart")) {
        Level::Trace
    } else if cfg!(debug_assertions) {
        Level::Debug
    } else {
        Level::Info
    };

    fn tag(self) -> &'static str {
        match self {
            Level::Error => "E",
            Level::Warn => "W",
            Level::Info => "I",
            Level::Debug => "D",
            Level::Trace => "T",
        }
    }
}

/// Whether a record at `level` from `target` reaches the console.
pub fn enabled(level: Level, target: &str) -> bool {
    level <= Level::CEILING && (level != Level::Trace || TRACE_TARGETS.contains(&target))
}

/// Writes `<tag> <target>: <message>` as one console line.
pub fn emit(level: Level, target: &str, args: Arguments<'_>) {
    if !enabled(level, target) {
        return;
    }
    let mut uart = crate::uart::KernelUart::lock();
    let _ = write!(uart, "{} {}: ", level.tag(), target);
    let _ = uart.write_fmt(args);
    let _ = uart.write_char('\n');
}

/// Shared expansion of the `log_*` macros. Without `target:` the calling
/// module path is used.
#[doc(hidden)]
#[macro_export]
macro_rules! __spindle_log {
    ($level:ident, target: $target:expr, $($arg:tt)+) => {
        $crate::log::emit($crate::log::Level::$level, $target, format_args!($($arg)+))
    };
    ($level:ident, $($arg:tt)+) => {
        $crate::log::emit($crate::log::Level::$level, module_path!(), format_args!($($arg)+))
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)+) => { $crate::__spindle_log!(Error, $($arg)+) };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)+) => { $crate::__spindle_log!(Warn, $($arg)+) };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)+) => { $crate::__spindle_log!(Info, $($arg)+) };
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)+) => { $crate::__spindle_log!(Debug, $($arg)+) };
}

#[macro_export]
macro_rules! log_trace {
    ($($arg:tt)+) => { $crate::__spindle_log!(Trace, $($arg)+) };
}
