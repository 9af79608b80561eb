// Copyright 2024 Spindle Contributors
// SPDX-License-Identifier: Apache-2.0

use std::env;
use std::fs;
use std::path::PathBuf;

#[allow(dead_code)]
mod ram {
    include!("../spindle/ram_layout.rs");
}

/// Fills the RAM bounds of `kernel.ld.in` from the kernel's platform layout.
fn render(template: &str) -> String {
    template
        .replace("@RAM_BASE@", &format!("0x{:x}", ram::RAM_BASE))
        .replace("@LENGTH_RAM@", &format!("0x{:x}", ram::LENGTH_RAM))
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=../spindle/ram_layout.rs");
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").expect("cargo sets CARGO_MANIFEST_DIR"));
    let template_path = manifest_dir.join("kernel.ld.in");
    println!("cargo:rerun-if-changed={}", template_path.display());

    // Host builds of the workspace link a normal executable.
    let target = env::var("TARGET").unwrap_or_default();
    if !(target.starts_with("riscv64") && target.ends_with("-none-elf")) {
        return;
    }

    let template = fs::read_to_string(&template_path).expect("kernel.ld.in must exist");
    let script = render(&template);
    assert!(!script.contains('@'), "kernel.ld.in has an unknown placeholder");

    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("cargo sets OUT_DIR"));
    let linker_script = out_dir.join("kernel.ld");
    fs::write(&linker_script, script).expect("write kernel.ld");
    println!("cargo:rustc-link-arg=-T{}", linker_script.display());
}
