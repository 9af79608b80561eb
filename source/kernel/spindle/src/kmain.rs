// Copyright 2024 Spindle Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Kernel main routine responsible for subsystem bring-up
//! OWNERS: @kernel-team
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: QEMU boot (console output); subsystems are unit tested
//! PUBLIC API: kmain()
//! DEPENDS_ON: mm::PageAllocator, heap, selftest, sched::Scheduler<HartSwitch>
//! INVARIANTS: KernelState is written once and never moves; start() never returns

use alloc::vec::Vec;
use core::{
    mem::MaybeUninit,
    ptr::NonNull,
    sync::atomic::{AtomicUsize, Ordering},
};

use spin::Mutex;

use crate::{
    arch::riscv,
    mm::PageAllocator,
    platform,
    sched::{Scheduler, TaskEntry, Yielder},
    task::HartSwitch,
};

/// Passes every counting task makes before returning.
const ROUNDS: usize = 2;
/// Delay units between worker iterations.
const WORKER_DELAY: usize = 1000;

static COUNTER: AtomicUsize = AtomicUsize::new(0);
static RUN_ORDER: Mutex<Vec<u8>> = Mutex::new(Vec::new());

/// Aggregated kernel state initialised during boot.
struct KernelState {
    pages: PageAllocator,
    scheduler: Scheduler<HartSwitch>,
}

static mut KERNEL_STATE: MaybeUninit<KernelState> = MaybeUninit::uninit();

#[allow(static_mut_refs)]
unsafe fn init_kernel_state() -> &'static mut KernelState {
    let kernel = unsafe {
        KERNEL_STATE.write(KernelState {
            pages: PageAllocator::empty(),
            scheduler: Scheduler::new(HartSwitch),
        })
    };
    let (start, end) = platform::page_region();
    // SAFETY: the linker reserves [__heap_start, __heap_end) for us alone.
    unsafe { kernel.pages.init(start, end) };
    kernel
}

#[cfg(feature = "boot_banner")]
fn banner() {
    log_info!(target: "boot", "           _           _ _");
    log_info!(target: "boot", " ___ _ __ (_)_ __   __| | | ___");
    log_info!(target: "boot", "/ __| '_ \\| | '_ \\ / _` | |/ _ \\");
    log_info!(target: "boot", "\\__ \\ |_) | | | | | (_| | |  __/");
    log_info!(target: "boot", "|___/ .__/|_|_| |_|\\__,_|_|\\___|");
    log_info!(target: "boot", "    |_|  spindle vers. 0.1.0");
}

fn counting_task(name: u8, yielder: Yielder<HartSwitch>) {
    for round in 0..ROUNDS {
        let value = COUNTER.fetch_add(1, Ordering::Relaxed) + 1;
        RUN_ORDER.lock().push(name);
        log_info!(target: "task", "task {} round {}: counter={}", name as char, round, value);
        yielder.yield_now();
    }

    if COUNTER.load(Ordering::Relaxed) == 3 * ROUNDS {
        let order = RUN_ORDER.lock();
        log_info!(
            target: "task",
            "counting done: order={}",
            core::str::from_utf8(&order).unwrap_or("<invalid>")
        );
    }
}

fn task_a(yielder: Yielder<HartSwitch>) {
    counting_task(b'A', yielder);
}

fn task_b(yielder: Yielder<HartSwitch>) {
    counting_task(b'B', yielder);
}

fn task_c(yielder: Yielder<HartSwitch>) {
    counting_task(b'C', yielder);
}

fn worker(index: usize, yielder: Yielder<HartSwitch>) -> ! {
    kprintln!("Task {}: Created!", index);
    loop {
        kprintln!("Task {}: Running...", index);
        yielder.delay(WORKER_DELAY);
        yielder.yield_now();
    }
}

fn worker_0(yielder: Yielder<HartSwitch>) {
    worker(0, yielder)
}

fn worker_1(yielder: Yielder<HartSwitch>) {
    worker(1, yielder)
}

/// Kernel main invoked after boot assembly completed.
pub fn kmain() -> ! {
    #[cfg(feature = "boot_banner")]
    banner();
    log_info!(target: "boot", "kmain on hart {}", riscv::hart_id());

    // SAFETY: single invocation on the boot hart.
    let kernel = unsafe { init_kernel_state() };
    let (start, end) = kernel.pages.region();
    log_info!(
        target: "mm",
        "pages: [0x{:x}, 0x{:x}) {} free",
        start,
        end,
        kernel.pages.free_pages()
    );

    #[cfg(feature = "selftest")]
    crate::selftest::entry(&mut crate::selftest::Context { pages: &mut kernel.pages });

    crate::heap::init(&mut kernel.pages);

    let tasks: [(&str, TaskEntry<HartSwitch>); 5] = [
        ("A", task_a),
        ("B", task_b),
        ("C", task_c),
        ("worker-0", worker_0),
        ("worker-1", worker_1),
    ];
    for (name, entry) in tasks {
        if let Err(err) = kernel.scheduler.spawn(&mut kernel.pages, entry) {
            panic!("spawn {}: {}", name, err);
        }
    }
    log_info!(target: "mm", "pages: {} free after spawn", kernel.pages.free_pages());

    // SAFETY: the scheduler lives in KERNEL_STATE and never moves; no other
    // reference to it survives past this point.
    unsafe { Scheduler::start(NonNull::from(&mut kernel.scheduler)) }
}
