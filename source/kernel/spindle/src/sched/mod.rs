// Copyright 2024 Spindle Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Cooperative round-robin scheduler
//! OWNERS: @kernel-sched-team
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: Unit tests against an emulated register file and a thread-per-task hart
//! PUBLIC API: Scheduler (spawn/launch/start/yield_now/block_current), Yielder, TaskEntry, SchedError, delay()
//! DEPENDS_ON: task::TaskTable, task::ContextSwitch, mm::PageAllocator
//! INVARIANTS: Exactly one Running task after launch; RR by ascending slot with wrap; Blocked never selected
//!
//! ## Send/Sync Safety
//!
//! `Scheduler` is `!Send` and `!Sync`: it owns the contexts of tasks that
//! run on the current hart and hands out raw pointers to itself through
//! [`Yielder`]. It must stay at a fixed address once a task is spawned.
//!
//! ## Aliasing across switches
//!
//! A task suspended inside `ContextSwitch::switch` is still inside one of
//! the run-phase functions below. Those functions therefore take the
//! scheduler as `NonNull<Self>` instead of `&mut self`: bookkeeping goes
//! through a short `&mut RunState` borrow that ends before the switch, and
//! the switcher itself is only ever borrowed shared. No unique borrow of
//! the scheduler is live while another task runs.

use core::{
    fmt,
    marker::PhantomData,
    ptr::{self, NonNull},
};

use crate::{
    arch::riscv::without_interrupts,
    mm::PageAllocator,
    task::{ContextSwitch, TaskContext, TaskError, TaskLaunch, TaskState, TaskTable},
    types::TaskId,
};

/// Busy-wait iterations per unit of [`delay`].
pub const DELAY_SPINS_PER_UNIT: usize = 50_000;

/// Entry function of a task. It receives a handle to its scheduler.
pub type TaskEntry<S> = fn(Yielder<S>);

#[must_use = "scheduler errors must be handled"]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedError {
    /// `launch`/`start` was already called.
    AlreadyStarted,
    /// No task was spawned before `launch`.
    NoRunnableTask,
}

impl fmt::Display for SchedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyStarted => f.write_str("scheduler already started"),
            Self::NoRunnableTask => f.write_str("no runnable task"),
        }
    }
}

/// Single-hart cooperative scheduler owning the task table.
pub struct Scheduler<S: ContextSwitch> {
    run: RunState,
    switch: S,
    _not_send_sync: PhantomData<*mut ()>,
}

/// Pair of contexts for one hand-over: outgoing save slot, incoming image.
type Hop = (*mut TaskContext, *const TaskContext);

/// Everything the scheduler mutates. Borrowed only between switches.
struct RunState {
    tasks: TaskTable,
    current: Option<TaskId>,
    started: bool,
    switches: u64,
}

impl RunState {
    /// Records `next` as the running task and returns the contexts to swap.
    fn hand_off(&mut self, prev: TaskId, next: TaskId) -> Option<Hop> {
        let save = self.tasks.context_ptr(prev)?;
        let restore = self.tasks.context_ptr(next)?;
        self.tasks.set_state(next, TaskState::Running);
        self.current = Some(next);
        self.switches += 1;
        log_trace!(target: "sched", "switch {} -> {}", prev, next);
        Some((save, restore))
    }

    /// Moves `prev` back to `Ready` and picks its round-robin successor.
    /// `None` means `prev` keeps the hart.
    fn rotate(&mut self, prev: TaskId) -> Option<Hop> {
        if self.tasks.state(prev) == Some(TaskState::Running) {
            self.tasks.set_state(prev, TaskState::Ready);
        }
        match self.tasks.next_ready_after(prev) {
            Some(next) if next != prev => self.hand_off(prev, next),
            _ => {
                self.tasks.set_state(prev, TaskState::Running);
                None
            }
        }
    }

    /// Blocks `prev` for good and picks the next ready task, if any.
    fn retire(&mut self, prev: TaskId) -> Option<Hop> {
        self.tasks.set_state(prev, TaskState::Blocked);
        let next = self.tasks.next_ready_after(prev)?;
        self.hand_off(prev, next)
    }
}

impl<S: ContextSwitch> Scheduler<S> {
    pub const fn new(switch: S) -> Self {
        Self {
            run: RunState { tasks: TaskTable::new(), current: None, started: false, switches: 0 },
            switch,
            _not_send_sync: PhantomData,
        }
    }

    /// Creates a ready task that will run `entry` when first scheduled.
    ///
    /// The task keeps a pointer to `self`, so the scheduler must not move
    /// afterwards.
    pub fn spawn(
        &mut self,
        pages: &mut PageAllocator,
        entry: TaskEntry<S>,
    ) -> Result<TaskId, TaskError> {
        let launch = TaskLaunch {
            trampoline: task_trampoline::<S> as usize,
            entry: entry as usize,
            arg: self as *mut Self as usize,
        };
        let id = self.run.tasks.create(pages, launch)?;
        log_info!(target: "sched", "spawn id={} ready={}", id, self.run.tasks.len());
        Ok(id)
    }

    /// Performs the first context switch from a throwaway bootstrap context.
    ///
    /// On hardware this never returns; the bootstrap context is never
    /// resumed. The `Ok` value is observable only when the switcher hands
    /// control back to the bootstrap context (host emulation, or `park`).
    ///
    /// # Safety
    ///
    /// `this` must point to a live scheduler that stays at this address for
    /// as long as any of its tasks may run, and the caller must not hold a
    /// reference to it across the call.
    pub unsafe fn launch(this: NonNull<Self>) -> Result<TaskId, SchedError> {
        let (first, restore) = {
            // SAFETY: caller contract; the borrow ends with this block.
            let run = unsafe { Self::run_state(this) };
            if run.started {
                return Err(SchedError::AlreadyStarted);
            }
            let first = run.tasks.first_ready().ok_or(SchedError::NoRunnableTask)?;
            let restore = run.tasks.context_ptr(first).ok_or(SchedError::NoRunnableTask)?;
            run.started = true;
            run.current = Some(first);
            run.tasks.set_state(first, TaskState::Running);
            run.switches += 1;
            log_info!(target: "sched", "start: first task id={}", first);
            (first, restore)
        };

        let mut bootstrap = TaskContext::zeroed();
        // SAFETY: `restore` points into the task table, which outlives the
        // switch; `bootstrap` is a local nobody else references.
        unsafe { Self::switcher(this).switch(ptr::addr_of_mut!(bootstrap), restore) };
        Ok(first)
    }

    /// Boot entry: hands the hart to the first task. Calling it twice, or
    /// without any task, is fatal.
    ///
    /// # Safety
    ///
    /// Same contract as [`Scheduler::launch`].
    pub unsafe fn start(this: NonNull<Self>) -> ! {
        // SAFETY: forwarded caller contract.
        match unsafe { Self::launch(this) } {
            Ok(first) => panic!("bootstrap context resumed after starting task {}", first),
            Err(err) => panic!("scheduler start: {}", err),
        }
    }

    /// Gives up the hart to the next ready task in slot order.
    ///
    /// With no other ready task this returns immediately without switching.
    /// Before `launch` it is a no-op.
    ///
    /// # Safety
    ///
    /// Same contract as [`Scheduler::launch`]; additionally the caller must
    /// be the running task (or the bootstrap code before `launch`).
    pub unsafe fn yield_now(this: NonNull<Self>) {
        let hop = {
            // SAFETY: caller contract; the borrow ends with this block.
            let run = unsafe { Self::run_state(this) };
            let Some(prev) = run.current else {
                return;
            };
            without_interrupts(|| run.rotate(prev))
        };
        if let Some((save, restore)) = hop {
            // SAFETY: distinct populated slots of the task table; the
            // outgoing task is the caller, so its slot is free to overwrite.
            unsafe { Self::switcher(this).switch(save, restore) };
        }
    }

    /// Marks the running task `Blocked` and switches to the next ready task.
    ///
    /// Returns `false` without switching when nothing else can run.
    ///
    /// # Safety
    ///
    /// Same contract as [`Scheduler::yield_now`].
    pub unsafe fn block_current(this: NonNull<Self>) -> bool {
        let hop = {
            // SAFETY: caller contract; the borrow ends with this block.
            let run = unsafe { Self::run_state(this) };
            let Some(prev) = run.current else {
                return false;
            };
            run.retire(prev)
        };
        match hop {
            Some((save, restore)) => {
                // SAFETY: as in `yield_now`.
                unsafe { Self::switcher(this).switch(save, restore) };
                true
            }
            None => false,
        }
    }

    /// Task currently owning the hart.
    pub fn current(&self) -> Option<TaskId> {
        self.run.current
    }

    pub fn state(&self, id: TaskId) -> Option<TaskState> {
        self.run.tasks.state(id)
    }

    pub fn tasks(&self) -> &TaskTable {
        &self.run.tasks
    }

    pub fn is_started(&self) -> bool {
        self.run.started
    }

    /// Context switches performed so far, including the first one.
    pub fn switch_count(&self) -> u64 {
        self.run.switches
    }

    /// # Safety
    ///
    /// `this` is live and no other reference to its run state exists for
    /// the returned lifetime.
    unsafe fn run_state<'a>(this: NonNull<Self>) -> &'a mut RunState {
        unsafe { &mut *ptr::addr_of_mut!((*this.as_ptr()).run) }
    }

    /// # Safety
    ///
    /// `this` is live for the returned lifetime.
    unsafe fn switcher<'a>(this: NonNull<Self>) -> &'a S {
        unsafe { &*ptr::addr_of!((*this.as_ptr()).switch) }
    }
}

#[allow(dead_code)]
struct NullSwitch;

impl ContextSwitch for NullSwitch {
    unsafe fn switch(&self, _save_into: *mut TaskContext, _restore_from: *const TaskContext) {}
}

static_assertions::assert_not_impl_any!(Scheduler<NullSwitch>: Send, Sync);

/// Handle given to every task for cooperating with its scheduler.
pub struct Yielder<S: ContextSwitch> {
    sched: NonNull<Scheduler<S>>,
}

impl<S: ContextSwitch> Clone for Yielder<S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S: ContextSwitch> Copy for Yielder<S> {}

impl<S: ContextSwitch> Yielder<S> {
    /// Gives the hart to the next ready task; returns when this task is
    /// scheduled again.
    pub fn yield_now(&self) {
        // SAFETY: `sched` is the pointer `spawn` recorded and the scheduler
        // does not move once tasks exist. Only the running task calls this,
        // and `Scheduler::yield_now` drops its run-state borrow before the
        // switch, so the suspended callers of other tasks hold none.
        unsafe { Scheduler::yield_now(self.sched) }
    }

    /// Busy-waits without giving up the hart.
    pub fn delay(&self, count: usize) {
        delay(count);
    }

    /// Identifier of the calling task.
    pub fn current(&self) -> Option<TaskId> {
        // SAFETY: a shared read while this task runs; every run-state borrow
        // taken by the scheduler ended before control reached this task.
        unsafe { self.sched.as_ref() }.current()
    }
}

/// First code a task executes: `ra` of a fresh context points here, with the
/// entry function in `a0` and the owning scheduler in `a1`.
extern "C" fn task_trampoline<S: ContextSwitch>(entry: usize, sched: usize) -> ! {
    // SAFETY: `spawn` stored a `TaskEntry<S>` and a `*mut Scheduler<S>`.
    let entry = unsafe { core::mem::transmute::<usize, TaskEntry<S>>(entry) };
    let Some(sched) = NonNull::new(sched as *mut Scheduler<S>) else {
        panic!("task entered without a scheduler");
    };
    let yielder = Yielder { sched };
    entry(yielder);

    if let Some(id) = yielder.current() {
        log_info!(target: "sched", "task {} returned; parking it", id);
    }
    // SAFETY: this task is the running one; see `Yielder::yield_now`.
    if !unsafe { Scheduler::block_current(sched) } {
        log_warn!(target: "sched", "no runnable task left; parking hart");
    }
    // SAFETY: the scheduler outlives its tasks.
    unsafe { Scheduler::switcher(sched) }.park()
}

/// Spins the hart for `count * DELAY_SPINS_PER_UNIT` iterations.
///
/// This is not a sleep: no other task runs while the caller waits.
pub fn delay(count: usize) {
    for _ in 0..count.saturating_mul(DELAY_SPINS_PER_UNIT) {
        core::hint::spin_loop();
    }
}

#[cfg(test)]
mod tests {
    use core::cell::{Cell, RefCell};
    use std::{
        sync::{Arc, Condvar, Mutex, MutexGuard},
        thread,
    };

    use super::*;
    use crate::testing::TestRegion;

    /// Emulates a hart: `live` is the register file of whatever runs now.
    #[derive(Default)]
    struct EmulatedHart {
        live: Cell<TaskContext>,
        transfers: RefCell<Vec<(usize, usize)>>,
    }

    impl ContextSwitch for EmulatedHart {
        unsafe fn switch(&self, save_into: *mut TaskContext, restore_from: *const TaskContext) {
            self.transfers.borrow_mut().push((save_into as usize, restore_from as usize));
            unsafe {
                *save_into = self.live.get();
                self.live.set(*restore_from);
            }
        }
    }

    fn entry_a(_: Yielder<EmulatedHart>) {}
    fn entry_b(_: Yielder<EmulatedHart>) {}
    fn entry_c(_: Yielder<EmulatedHart>) {}

    /// Scheduler pinned on the heap for the rest of the test process.
    ///
    /// Tasks hold its address, and a parked task thread may still refer to
    /// its switcher, so it is deliberately never freed.
    struct Pinned<S: ContextSwitch> {
        sched: NonNull<Scheduler<S>>,
        pages: PageAllocator,
        ids: Vec<TaskId>,
        _region: TestRegion,
    }

    impl<S: ContextSwitch> Pinned<S> {
        fn new(pages: usize, hart: S, entries: &[TaskEntry<S>]) -> Self {
            let region = TestRegion::new(pages);
            let mut pages = region.allocator();
            let mut sched = NonNull::from(Box::leak(Box::new(Scheduler::new(hart))));
            let ids = entries
                .iter()
                .map(|entry| unsafe { sched.as_mut() }.spawn(&mut pages, *entry).expect("spawn"))
                .collect();
            Self { sched, pages, ids, _region: region }
        }

        fn sched(&self) -> &Scheduler<S> {
            unsafe { self.sched.as_ref() }
        }

        fn hart(&self) -> &S {
            &self.sched().switch
        }

        fn launch(&self) -> Result<TaskId, SchedError> {
            unsafe { Scheduler::launch(self.sched) }
        }

        fn yield_now(&self) {
            unsafe { Scheduler::yield_now(self.sched) }
        }

        fn block_current(&self) -> bool {
            unsafe { Scheduler::block_current(self.sched) }
        }

        fn spawn(&mut self, entry: TaskEntry<S>) -> Result<TaskId, TaskError> {
            unsafe { self.sched.as_mut() }.spawn(&mut self.pages, entry)
        }
    }

    fn emulated(pages: usize, entries: &[TaskEntry<EmulatedHart>]) -> Pinned<EmulatedHart> {
        Pinned::new(pages, EmulatedHart::default(), entries)
    }

    #[test]
    fn launch_enters_first_task_through_trampoline() {
        let pinned = emulated(4, &[entry_a, entry_b]);
        let ids = &pinned.ids;

        assert_eq!(pinned.launch(), Ok(ids[0]));
        let sched = pinned.sched();
        assert_eq!(sched.current(), Some(ids[0]));
        assert_eq!(sched.state(ids[0]), Some(TaskState::Running));
        assert_eq!(sched.state(ids[1]), Some(TaskState::Ready));

        let live = pinned.hart().live.get();
        assert_eq!(live.ra, task_trampoline::<EmulatedHart> as usize);
        assert_eq!(live.a0, entry_a as TaskEntry<EmulatedHart> as usize);
        assert_eq!(live.a1, pinned.sched.as_ptr() as usize);
        assert_eq!(live.sp, sched.tasks().get(ids[0]).expect("a").stack_top());
    }

    #[test]
    fn launch_twice_is_rejected() {
        let pinned = emulated(2, &[entry_a]);
        assert!(pinned.launch().is_ok());
        assert_eq!(pinned.launch(), Err(SchedError::AlreadyStarted));
        assert_eq!(pinned.sched().switch_count(), 1);
    }

    #[test]
    #[should_panic(expected = "scheduler start")]
    fn start_twice_is_fatal() {
        let pinned = emulated(2, &[entry_a]);
        let _ = pinned.launch();
        unsafe { Scheduler::start(pinned.sched) };
    }

    #[test]
    fn launch_without_tasks_fails() {
        let pinned = emulated(1, &[]);
        assert_eq!(pinned.launch(), Err(SchedError::NoRunnableTask));
        assert!(!pinned.sched().is_started());
    }

    #[test]
    fn yield_rotates_in_strict_slot_order() {
        let pinned = emulated(4, &[entry_a, entry_b, entry_c]);
        let ids = &pinned.ids;
        pinned.launch().expect("launch");

        let mut order = Vec::new();
        for _ in 0..2 * ids.len() {
            order.push(pinned.sched().current().expect("running task"));
            pinned.yield_now();
        }

        assert_eq!(order, [ids[0], ids[1], ids[2], ids[0], ids[1], ids[2]]);
        assert_eq!(pinned.sched().current(), Some(ids[0]));
    }

    #[test]
    fn yield_resumes_each_task_where_it_stopped() {
        let pinned = emulated(4, &[entry_a, entry_b, entry_c]);
        pinned.launch().expect("launch");
        let live = &pinned.hart().live;

        // First pass: each task runs from its trampoline and leaves a marker
        // in a callee-saved register before yielding.
        for (marker, id) in [0xA0, 0xB0, 0xC0].into_iter().zip(&pinned.ids) {
            assert_eq!(pinned.sched().current(), Some(*id));
            let mut regs = live.get();
            assert_eq!(regs.ra, task_trampoline::<EmulatedHart> as usize);
            regs.s0 = marker;
            regs.ra = 0x1000 + marker;
            live.set(regs);
            pinned.yield_now();
        }

        // Second pass resumes at the recorded suspension points.
        for (marker, id) in [0xA0, 0xB0, 0xC0].into_iter().zip(&pinned.ids) {
            assert_eq!(pinned.sched().current(), Some(*id));
            assert_eq!(live.get().s0, marker);
            assert_eq!(live.get().ra, 0x1000 + marker);
            pinned.yield_now();
        }
    }

    #[test]
    fn exactly_one_task_running_after_each_yield() {
        let pinned = emulated(4, &[entry_a, entry_b, entry_c]);
        pinned.launch().expect("launch");
        for _ in 0..7 {
            let running = pinned
                .ids
                .iter()
                .filter(|id| pinned.sched().state(**id) == Some(TaskState::Running))
                .count();
            assert_eq!(running, 1);
            pinned.yield_now();
        }
    }

    #[test]
    fn sole_task_yield_does_not_switch() {
        let pinned = emulated(2, &[entry_a]);
        pinned.launch().expect("launch");
        let live = &pinned.hart().live;
        let mut regs = live.get();
        regs.s1 = 0xfeed;
        live.set(regs);

        for _ in 0..3 {
            pinned.yield_now();
        }
        let sched = pinned.sched();
        assert_eq!(sched.switch_count(), 1);
        assert_eq!(live.get(), regs);
        assert_eq!(sched.current(), Some(pinned.ids[0]));
        assert_eq!(sched.state(pinned.ids[0]), Some(TaskState::Running));
    }

    #[test]
    fn switching_a_context_onto_itself_preserves_it() {
        let hart = EmulatedHart::default();
        let mut regs = TaskContext::zeroed();
        regs.sp = 0x8020_0000;
        regs.s5 = 7;
        hart.live.set(regs);
        let mut ctx = regs;
        let slot = ptr::addr_of_mut!(ctx);
        unsafe { hart.switch(slot, slot) };
        assert_eq!(ctx, regs);
        assert_eq!(hart.live.get(), regs);
    }

    #[test]
    fn yield_before_launch_is_noop() {
        let pinned = emulated(2, &[entry_a]);
        pinned.yield_now();
        assert_eq!(pinned.sched().switch_count(), 0);
        assert_eq!(pinned.sched().state(pinned.ids[0]), Some(TaskState::Ready));
        assert!(pinned.hart().transfers.borrow().is_empty());
    }

    #[test]
    fn blocked_task_is_skipped_by_round_robin() {
        let pinned = emulated(4, &[entry_a, entry_b, entry_c]);
        let ids = &pinned.ids;
        pinned.launch().expect("launch");

        // A finishes its entry and gets parked.
        assert!(pinned.block_current());
        assert_eq!(pinned.sched().state(ids[0]), Some(TaskState::Blocked));
        assert_eq!(pinned.sched().current(), Some(ids[1]));

        pinned.yield_now();
        assert_eq!(pinned.sched().current(), Some(ids[2]));
        pinned.yield_now();
        assert_eq!(pinned.sched().current(), Some(ids[1]));
    }

    #[test]
    fn blocking_the_last_runnable_task_reports_nothing_to_run() {
        let pinned = emulated(2, &[entry_a]);
        pinned.launch().expect("launch");
        assert!(!pinned.block_current());
        assert_eq!(pinned.sched().state(pinned.ids[0]), Some(TaskState::Blocked));
        assert_eq!(pinned.sched().switch_count(), 1);
    }

    #[test]
    fn switch_saves_outgoing_and_restores_incoming_context() {
        let pinned = emulated(4, &[entry_a, entry_b]);
        pinned.launch().expect("launch");
        pinned.yield_now();

        let (save, restore) = *pinned.hart().transfers.borrow().last().expect("transfer");
        let tasks = pinned.sched().tasks();
        let ctx_a = tasks.get(pinned.ids[0]).expect("a").context() as *const TaskContext as usize;
        let ctx_b = tasks.get(pinned.ids[1]).expect("b").context() as *const TaskContext as usize;
        assert_eq!((save, restore), (ctx_a, ctx_b));
    }

    #[test]
    fn delay_spins_without_switching() {
        let pinned = emulated(4, &[entry_a, entry_b]);
        pinned.launch().expect("launch");
        delay(1);
        assert_eq!(pinned.sched().current(), Some(pinned.ids[0]));
        assert_eq!(pinned.sched().switch_count(), 1);
    }

    #[test]
    fn spawn_failure_is_reported_to_caller() {
        let mut pinned = emulated(1, &[entry_a]);
        assert_eq!(
            pinned.spawn(entry_b),
            Err(TaskError::Stack(crate::mm::PageError::OutOfMemory))
        );
    }

    /// Who may run right now. Slots are identified by context address; the
    /// first saver is the bootstrap context that `park` returns to.
    #[derive(Default)]
    struct Baton {
        holder: usize,
        home: usize,
        entered: Vec<usize>,
    }

    /// Hart stand-in that runs every task on its own OS thread and passes a
    /// baton so that exactly one of them executes at a time.
    #[derive(Clone, Default)]
    struct ThreadHart {
        baton: Arc<(Mutex<Baton>, Condvar)>,
    }

    impl ThreadHart {
        fn wait_for<'a>(&self, mut baton: MutexGuard<'a, Baton>, slot: usize) -> MutexGuard<'a, Baton> {
            while baton.holder != slot {
                baton = self.baton.1.wait(baton).expect("baton");
            }
            baton
        }
    }

    impl ContextSwitch for ThreadHart {
        unsafe fn switch(&self, save_into: *mut TaskContext, restore_from: *const TaskContext) {
            let (me, next) = (save_into as usize, restore_from as usize);
            let mut baton = self.baton.0.lock().expect("baton");
            if baton.home == 0 {
                baton.home = me;
            }
            baton.holder = next;
            if next != baton.home && !baton.entered.contains(&next) {
                // A fresh context: enter its trampoline the way `ra` would.
                baton.entered.push(next);
                let fresh = unsafe { *restore_from };
                let hart = self.clone();
                thread::spawn(move || {
                    drop(hart.wait_for(hart.baton.0.lock().expect("baton"), next));
                    let trampoline = unsafe {
                        core::mem::transmute::<usize, extern "C" fn(usize, usize) -> !>(fresh.ra)
                    };
                    trampoline(fresh.a0, fresh.a1)
                });
            }
            self.baton.1.notify_all();
            drop(self.wait_for(baton, me));
        }

        fn park(&self) -> ! {
            let mut baton = self.baton.0.lock().expect("baton");
            baton.holder = baton.home;
            self.baton.1.notify_all();
            loop {
                baton = self.baton.1.wait(baton).expect("baton");
            }
        }
    }

    static COUNTER: Mutex<usize> = Mutex::new(0);
    static RUN_ORDER: Mutex<Vec<(char, usize)>> = Mutex::new(Vec::new());

    fn count_twice(name: char, yielder: Yielder<ThreadHart>) {
        for _ in 0..2 {
            let mut counter = COUNTER.lock().expect("counter");
            *counter += 1;
            RUN_ORDER.lock().expect("order").push((name, *counter));
            drop(counter);
            yielder.yield_now();
        }
    }

    fn count_a(yielder: Yielder<ThreadHart>) {
        count_twice('A', yielder);
    }

    fn count_b(yielder: Yielder<ThreadHart>) {
        count_twice('B', yielder);
    }

    fn count_c(yielder: Yielder<ThreadHart>) {
        count_twice('C', yielder);
    }

    #[test]
    fn counting_tasks_interleave_and_park_after_returning() {
        let pinned = Pinned::new(4, ThreadHart::default(), &[count_a, count_b, count_c]);

        // Returns only once the last task has returned and parked the hart.
        assert_eq!(pinned.launch(), Ok(pinned.ids[0]));

        let order = RUN_ORDER.lock().expect("order").clone();
        assert_eq!(
            order,
            [('A', 1), ('B', 2), ('C', 3), ('A', 4), ('B', 5), ('C', 6)]
        );
        assert_eq!(*COUNTER.lock().expect("counter"), 6);
        for id in &pinned.ids {
            assert_eq!(pinned.sched().state(*id), Some(TaskState::Blocked));
        }
    }

    fn return_at_once(_: Yielder<ThreadHart>) {}

    fn yield_then_return(yielder: Yielder<ThreadHart>) {
        assert!(yielder.current().is_some());
        yielder.yield_now();
    }

    #[test]
    fn returning_task_hands_the_hart_to_the_next_one() {
        let pinned = Pinned::new(4, ThreadHart::default(), &[return_at_once, yield_then_return]);
        let ids = &pinned.ids;

        assert_eq!(pinned.launch(), Ok(ids[0]));
        let sched = pinned.sched();
        assert_eq!(sched.state(ids[0]), Some(TaskState::Blocked));
        assert_eq!(sched.state(ids[1]), Some(TaskState::Blocked));
        assert_eq!(sched.current(), Some(ids[1]));
        // launch, A returning to B; B's lone yield keeps the hart.
        assert_eq!(sched.switch_count(), 2);
    }
}
