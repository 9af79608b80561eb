// Copyright 2024 Spindle Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Fixed-capacity task control block store
//! OWNERS: @kernel-sched-team
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: Unit tests (capacity, rollback, fresh context layout)
//! PUBLIC API: TaskTable (create/state/set_state/next_ready_after), Tcb, TaskState, TaskError, TaskLaunch
//! DEPENDS_ON: mm::PageAllocator (stacks), task::context::TaskContext
//! INVARIANTS: Slot index == TaskId; a slot is populated only when its stack allocation succeeded

mod context;

pub use context::{ContextSwitch, TaskContext};
#[cfg(all(target_arch = "riscv64", target_os = "none"))]
pub use context::HartSwitch;

use core::fmt;

use crate::{
    mm::{PageAllocator, PageError, PAGE_SIZE},
    platform::{MAX_TASKS, TASK_STACK_PAGES},
    types::{PhysAddr, TaskId},
};

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Ready,
    Running,
    /// Never selected by the scheduler. Tasks whose entry returned end here.
    Blocked,
}

/// Errors returned when creating a task.
#[must_use = "task creation errors must be handled explicitly"]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskError {
    /// Every slot of the task table is populated.
    StoreExhausted { capacity: usize },
    /// The page allocator could not provide a stack.
    Stack(PageError),
}

impl TaskError {
    pub fn label(self) -> &'static str {
        match self {
            Self::StoreExhausted { .. } => "task store exhausted",
            Self::Stack(_) => "stack allocation failed",
        }
    }
}

impl From<PageError> for TaskError {
    fn from(value: PageError) -> Self {
        Self::Stack(value)
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StoreExhausted { capacity } => write!(f, "{} (capacity {})", self.label(), capacity),
            Self::Stack(err) => write!(f, "{}: {}", self.label(), err),
        }
    }
}

/// Where a fresh task starts: `trampoline(entry, arg)` on its own stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskLaunch {
    pub trampoline: usize,
    pub entry: usize,
    pub arg: usize,
}

/// Task control block.
#[derive(Debug)]
pub struct Tcb {
    id: TaskId,
    state: TaskState,
    context: TaskContext,
    stack_base: PhysAddr,
    stack_pages: usize,
}

impl Tcb {
    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Saved register file (meaningful while the task is not running).
    pub fn context(&self) -> &TaskContext {
        &self.context
    }

    /// Lowest address of the stack region.
    pub fn stack_base(&self) -> PhysAddr {
        self.stack_base
    }

    /// One past the highest stack address; the initial stack pointer.
    pub fn stack_top(&self) -> usize {
        self.stack_base.raw() + self.stack_pages * PAGE_SIZE
    }
}

/// Kernel task table managing task control blocks.
pub struct TaskTable {
    slots: [Option<Tcb>; MAX_TASKS],
    populated: usize,
}

impl TaskTable {
    pub const CAPACITY: usize = MAX_TASKS;

    /// Creates an empty table.
    pub const fn new() -> Self {
        Self { slots: [const { None }; MAX_TASKS], populated: 0 }
    }

    /// Creates a task whose first resumption enters `launch.trampoline`.
    ///
    /// The lowest free slot is chosen before any page is taken, and a failed
    /// stack allocation leaves the slot empty.
    pub fn create(
        &mut self,
        pages: &mut PageAllocator,
        launch: TaskLaunch,
    ) -> Result<TaskId, TaskError> {
        let index = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(TaskError::StoreExhausted { capacity: Self::CAPACITY })?;
        let stack_base = pages.alloc(TASK_STACK_PAGES)?;

        // Stacks start zeroed so no stale bytes from a previous owner leak in.
        unsafe {
            core::ptr::write_bytes(stack_base.as_mut_ptr::<u8>(), 0, TASK_STACK_PAGES * PAGE_SIZE);
        }

        let id = TaskId::from_raw(index as u32);
        let mut tcb = Tcb {
            id,
            state: TaskState::Ready,
            context: TaskContext::zeroed(),
            stack_base,
            stack_pages: TASK_STACK_PAGES,
        };
        tcb.context = TaskContext::fresh(launch.trampoline, tcb.stack_top(), launch.entry, launch.arg);
        log_debug!(
            target: "task",
            "create id={} stack=[{}, 0x{:x})",
            id,
            stack_base,
            tcb.stack_top()
        );
        self.slots[index] = Some(tcb);
        self.populated += 1;
        Ok(id)
    }

    pub fn get(&self, id: TaskId) -> Option<&Tcb> {
        self.slots.get(id.as_index()).and_then(Option::as_ref)
    }

    pub fn state(&self, id: TaskId) -> Option<TaskState> {
        self.get(id).map(Tcb::state)
    }

    /// Updates the state tag of a populated slot; unknown ids are ignored.
    pub fn set_state(&mut self, id: TaskId, state: TaskState) {
        if let Some(tcb) = self.slots.get_mut(id.as_index()).and_then(Option::as_mut) {
            tcb.state = state;
        }
    }

    /// Number of populated slots.
    pub(crate) fn len(&self) -> usize {
        self.populated
    }

    /// Lowest-indexed ready task.
    pub fn first_ready(&self) -> Option<TaskId> {
        self.slots.iter().flatten().find(|tcb| tcb.state == TaskState::Ready).map(Tcb::id)
    }

    /// Round-robin successor of `current`: the next ready slot in ascending
    /// order, wrapping past the end. `current` itself is considered last.
    pub fn next_ready_after(&self, current: TaskId) -> Option<TaskId> {
        let start = current.as_index();
        (1..=Self::CAPACITY)
            .map(|step| (start + step) % Self::CAPACITY)
            .filter_map(|index| self.slots[index].as_ref())
            .find(|tcb| tcb.state == TaskState::Ready)
            .map(Tcb::id)
    }

    /// Raw pointer to the saved context of a populated slot.
    ///
    /// Contexts are handed to the switch primitive as raw pointers so that
    /// no reference outlives the transfer of control.
    pub(crate) fn context_ptr(&mut self, id: TaskId) -> Option<*mut TaskContext> {
        self.slots
            .get_mut(id.as_index())
            .and_then(Option::as_mut)
            .map(|tcb| core::ptr::addr_of_mut!(tcb.context))
    }
}

impl Default for TaskTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestRegion;

    const LAUNCH: TaskLaunch = TaskLaunch { trampoline: 0x8000_0100, entry: 0x8000_0200, arg: 0x55 };

    #[test]
    fn create_builds_fresh_context_on_stack_top() {
        let region = TestRegion::new(4);
        let mut pages = region.allocator();
        let mut table = TaskTable::new();

        let id = table.create(&mut pages, LAUNCH).expect("create");
        let tcb = table.get(id).expect("populated");
        assert_eq!(tcb.state(), TaskState::Ready);
        assert_eq!(tcb.stack_base().raw(), region.start());
        assert_eq!(tcb.stack_top(), region.start() + TASK_STACK_PAGES * PAGE_SIZE);

        let expected = TaskContext {
            ra: LAUNCH.trampoline,
            sp: tcb.stack_top(),
            a0: LAUNCH.entry,
            a1: LAUNCH.arg,
            ..TaskContext::zeroed()
        };
        assert_eq!(*tcb.context(), expected);
        assert_eq!(pages.free_pages(), 4 - TASK_STACK_PAGES);
    }

    #[test]
    fn create_up_to_capacity_then_reports_exhaustion() {
        let region = TestRegion::new(TaskTable::CAPACITY * TASK_STACK_PAGES + 2);
        let mut pages = region.allocator();
        let mut table = TaskTable::new();

        let mut ids = Vec::new();
        for _ in 0..TaskTable::CAPACITY {
            ids.push(table.create(&mut pages, LAUNCH).expect("within capacity"));
        }
        let mut unique = ids.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), TaskTable::CAPACITY);

        let free_before = pages.free_pages();
        assert_eq!(
            table.create(&mut pages, LAUNCH),
            Err(TaskError::StoreExhausted { capacity: TaskTable::CAPACITY })
        );
        assert_eq!(pages.free_pages(), free_before, "no stack taken for a rejected task");
        assert_eq!(table.len(), TaskTable::CAPACITY);
    }

    #[test]
    fn stack_exhaustion_leaves_slot_empty() {
        let region = TestRegion::new(TASK_STACK_PAGES);
        let mut pages = region.allocator();
        let mut table = TaskTable::new();

        let first = table.create(&mut pages, LAUNCH).expect("first");
        assert_eq!(
            table.create(&mut pages, LAUNCH),
            Err(TaskError::Stack(PageError::OutOfMemory))
        );
        assert_eq!(table.len(), 1);
        assert!(table.get(TaskId::from_raw(first.as_raw() + 1)).is_none());
    }

    #[test]
    fn stacks_are_distinct_and_zeroed() {
        let region = TestRegion::new(4);
        unsafe { core::ptr::write_bytes(region.start() as *mut u8, 0xAA, 4 * PAGE_SIZE) };
        let mut pages = region.allocator();

        let mut table = TaskTable::new();
        let a = table.create(&mut pages, LAUNCH).expect("a");
        let b = table.create(&mut pages, LAUNCH).expect("b");
        let (a, b) = (table.get(a).expect("a"), table.get(b).expect("b"));
        assert_ne!(a.stack_base(), b.stack_base());

        let stack = unsafe {
            core::slice::from_raw_parts(a.stack_base().raw() as *const u8, PAGE_SIZE * TASK_STACK_PAGES)
        };
        assert!(stack.iter().all(|&byte| byte == 0));
    }

    #[test]
    fn next_ready_wraps_and_skips_blocked() {
        let region = TestRegion::new(4);
        let mut pages = region.allocator();
        let mut table = TaskTable::new();
        let a = table.create(&mut pages, LAUNCH).expect("a");
        let b = table.create(&mut pages, LAUNCH).expect("b");
        let c = table.create(&mut pages, LAUNCH).expect("c");

        assert_eq!(table.next_ready_after(a), Some(b));
        assert_eq!(table.next_ready_after(c), Some(a));

        table.set_state(b, TaskState::Blocked);
        assert_eq!(table.next_ready_after(a), Some(c));

        table.set_state(a, TaskState::Running);
        table.set_state(c, TaskState::Blocked);
        assert_eq!(table.next_ready_after(a), None);
    }

    #[test]
    fn sole_ready_task_is_its_own_successor() {
        let region = TestRegion::new(2);
        let mut pages = region.allocator();
        let mut table = TaskTable::new();
        let only = table.create(&mut pages, LAUNCH).expect("only");
        assert_eq!(table.next_ready_after(only), Some(only));
        assert_eq!(table.first_ready(), Some(only));
    }
}
