//! Task definition — descriptors, priorities and the per-task context
//!
//! A task is an entry function plus the attributes the scheduler needs to
//! launch it: a diagnostic name, a stack budget and a priority.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tracing::trace;

use crate::timer::{SysTimer, TickRate, Ticks};

/// Maximum tasks the kernel can manage
pub const MAX_TASKS: usize = 16;

/// Smallest stack budget a task may ask for (bytes)
pub const MINIMAL_STACK_SIZE: usize = 64 * 1024;

/// Task entry point — runs once on the task's own thread
pub type TaskFn = Box<dyn FnOnce(TaskContext) + Send + 'static>;

/// Task priority (higher number = more urgent)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskPriority(pub u8);

impl TaskPriority {
    /// Priority of the idle task; nothing application-level runs here
    pub const IDLE: TaskPriority = TaskPriority(0);
    pub const LOW: TaskPriority = TaskPriority(1);
    pub const NORMAL: TaskPriority = TaskPriority(2);
    pub const HIGH: TaskPriority = TaskPriority(3);
    pub const MAX: TaskPriority = TaskPriority(u8::MAX);

    /// `levels` above idle
    pub const fn above_idle(levels: u8) -> Self {
        TaskPriority(Self::IDLE.0.saturating_add(levels))
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Task execution state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Registered, waiting for the scheduler to start
    Ready,
    /// Entry function is executing (possibly blocked inside it)
    Running,
    /// Entry function returned
    Finished,
    /// Entry function panicked
    Failed,
    /// Never launched (start was aborted)
    Inactive,
}

impl TaskState {
    fn to_u8(self) -> u8 {
        match self {
            TaskState::Ready => 0,
            TaskState::Running => 1,
            TaskState::Finished => 2,
            TaskState::Failed => 3,
            TaskState::Inactive => 4,
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => TaskState::Ready,
            1 => TaskState::Running,
            2 => TaskState::Finished,
            3 => TaskState::Failed,
            _ => TaskState::Inactive,
        }
    }
}

/// State cell shared between a running task and the kernel
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new(state: TaskState) -> Self {
        Self(AtomicU8::new(state.to_u8()))
    }

    pub(crate) fn get(&self) -> TaskState {
        TaskState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn set(&self, state: TaskState) {
        self.0.store(state.to_u8(), Ordering::Release);
    }
}

/// Task descriptor
pub struct Task {
    /// Diagnostic name (not used for scheduling)
    pub name: String,
    /// Stack budget in bytes
    pub stack_size: usize,
    /// Priority
    pub priority: TaskPriority,
    /// Entry function
    pub(crate) entry: TaskFn,
}

impl Task {
    /// Create a new task
    pub fn new<F>(name: impl Into<String>, stack_size: usize, priority: TaskPriority, entry: F) -> Self
    where
        F: FnOnce(TaskContext) + Send + 'static,
    {
        Self {
            name: name.into(),
            stack_size,
            priority,
            entry: Box::new(entry),
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("stack_size", &self.stack_size)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

/// Handle given to a task's entry function
///
/// Carries the task's identity and the kernel clock, and provides the
/// task delay.
#[derive(Debug, Clone)]
pub struct TaskContext {
    name: Arc<str>,
    priority: TaskPriority,
    timer: SysTimer,
}

impl TaskContext {
    pub(crate) fn new(name: Arc<str>, priority: TaskPriority, timer: SysTimer) -> Self {
        Self {
            name,
            priority,
            timer,
        }
    }

    /// Context for running a task body outside the kernel
    pub fn detached(name: &str, rate: TickRate) -> Self {
        Self::new(Arc::from(name), TaskPriority::above_idle(1), SysTimer::start(rate))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> TaskPriority {
        self.priority
    }

    pub fn tick_rate(&self) -> TickRate {
        self.timer.rate()
    }

    /// Ticks since the kernel started
    pub fn tick_count(&self) -> u64 {
        self.timer.now_ticks()
    }

    /// Block this task for `ticks`. Other tasks keep running meanwhile.
    pub fn delay(&self, ticks: Ticks) {
        trace!(task = %self.name, ticks = ticks.get(), "delay");
        self.timer.rate().delay(ticks);
    }
}
