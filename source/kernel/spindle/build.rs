// Copyright 2024 Spindle Contributors
// SPDX-License-Identifier: Apache-2.0

fn main() {
    println!("cargo:rerun-if-env-changed=SPINDLE_LINKER_SCRIPT");
    if let Ok(script) = std::env::var("SPINDLE_LINKER_SCRIPT") {
        println!("cargo:rustc-link-arg=-T{script}");
    }
}
