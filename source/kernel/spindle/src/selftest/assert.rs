// Copyright 2024 Spindle Contributors
// SPDX-License-Identifier: Apache-2.0

//! UART-friendly selftest assertion helpers.
//!
//! Failures are written through the raw writer before panicking so the line
//! reaches the console even if the console mutex is held.

use core::fmt::{Arguments, Write};

use crate::uart;

/// Emits the failure message and panics.
#[cold]
pub fn report_failure(message: &str) -> ! {
    report_failure_fmt(format_args!("{}", message))
}

#[cold]
pub fn report_failure_fmt(args: Arguments<'_>) -> ! {
    let mut w = uart::raw_writer();
    let _ = w.write_fmt(format_args!("SELFTEST: fail: {}\n", args));
    panic!("SELFTEST: fail: {}", args);
}

/// Asserts that the condition evaluates to true.
#[macro_export]
macro_rules! st_assert {
    ($cond:expr $(,)?) => {
        if !$cond {
            $crate::selftest::assert::report_failure(concat!("assertion failed: ", stringify!($cond)));
        }
    };
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            $crate::selftest::assert::report_failure_fmt(format_args!($($arg)+));
        }
    };
}

/// Expects both expressions to be equal using `PartialEq`.
#[macro_export]
macro_rules! st_expect_eq {
    ($left:expr, $right:expr $(,)?) => {{
        let left = &$left;
        let right = &$right;
        if *left != *right {
            $crate::selftest::assert::report_failure_fmt(format_args!(
                "expected {} == {}: left={:?} right={:?}",
                stringify!($left),
                stringify!($right),
                left,
                right
            ));
        }
    }};
    ($left:expr, $right:expr, $($arg:tt)+) => {{
        let left = &$left;
        let right = &$right;
        if *left != *right {
            $crate::selftest::assert::report_failure_fmt(format_args!(
                "{}: left={:?} right={:?}",
                format_args!($($arg)+),
                left,
                right
            ));
        }
    }};
}

/// Ensures that the expression evaluates to `Err` matching the provided pattern.
#[macro_export]
macro_rules! st_expect_err {
    ($expr:expr, $pat:pat $(if $guard:expr)? $(,)?) => {{
        match $expr {
            Err(err) => {
                if !matches!(err, $pat $(if $guard)?) {
                    $crate::selftest::assert::report_failure_fmt(format_args!(
                        "unexpected error variant: got={:?}",
                        err
                    ));
                }
            }
            Ok(value) => {
                $crate::selftest::assert::report_failure_fmt(format_args!(
                    "expected Err({}), got Ok({:?})",
                    stringify!($pat $(if $guard)?),
                    value
                ));
            }
        }
    }};
}
