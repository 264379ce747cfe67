//! Kernel — top-level task core manager
//!
//! Combines the scheduler and the system timer into a single kernel
//! instance. Tasks are added before `start`; once started the kernel is a
//! `RunningKernel` that can be inspected and joined.

use tracing::{error, info};

use crate::error::{Error, Result};
use crate::scheduler::{LaunchedTask, Scheduler, TaskId};
use crate::task::{Task, TaskContext, TaskPriority, TaskState};
use crate::timer::{SysTimer, TickRate};

/// Kernel before start
#[derive(Debug, Default)]
pub struct Kernel {
    /// Task scheduler
    pub scheduler: Scheduler,
    /// Tick rate for delays and timeouts
    rate: TickRate,
}

impl Kernel {
    /// Create kernel with the given tick rate
    pub fn new(rate: TickRate) -> Self {
        Self {
            scheduler: Scheduler::new(),
            rate,
        }
    }

    pub fn tick_rate(&self) -> TickRate {
        self.rate
    }

    /// Register a task
    pub fn add_task<F>(
        &mut self,
        name: &str,
        stack_size: usize,
        priority: TaskPriority,
        entry: F,
    ) -> Result<TaskId>
    where
        F: FnOnce(TaskContext) + Send + 'static,
    {
        self.scheduler.register(Task::new(name, stack_size, priority, entry))
    }

    /// Start the scheduler.
    ///
    /// If any task cannot be launched, nothing runs and the error is
    /// returned.
    pub fn start(self) -> Result<RunningKernel> {
        let timer = SysTimer::start(self.rate);
        info!(tick_rate_hz = self.rate.hz(), tasks = self.scheduler.task_count(), "starting kernel");
        let tasks = self.scheduler.start(timer)?;
        Ok(RunningKernel { timer, tasks })
    }
}

/// Kernel after start
#[derive(Debug)]
pub struct RunningKernel {
    timer: SysTimer,
    tasks: Vec<LaunchedTask>,
}

impl RunningKernel {
    /// (name, state) per task, in launch order
    pub fn task_states(&self) -> Vec<(String, TaskState)> {
        self.tasks
            .iter()
            .map(|t| (t.name().to_owned(), t.state()))
            .collect()
    }

    /// State of one task by slot index
    pub fn task_state(&self, id: TaskId) -> Option<TaskState> {
        self.tasks.iter().find(|t| t.id() == id).map(LaunchedTask::state)
    }

    /// Ticks since start
    pub fn uptime_ticks(&self) -> u64 {
        self.timer.now_ticks()
    }

    pub fn stats(&self) -> KernelStats {
        KernelStats {
            tasks: self.tasks.len(),
            finished: self
                .tasks
                .iter()
                .filter(|t| matches!(t.state(), TaskState::Finished | TaskState::Failed))
                .count(),
            uptime_ticks: self.uptime_ticks(),
        }
    }

    /// Wait for every task to return.
    ///
    /// Tasks that run forever make this block forever. Reports the first
    /// task that panicked.
    pub fn join(self) -> Result<()> {
        let mut failed = None;
        for task in self.tasks {
            let panicked = task.handle.join().is_err() || task.state.get() == TaskState::Failed;
            if panicked {
                error!(task = %task.name, "task ended in a panic");
                failed.get_or_insert_with(|| task.name.to_string());
            }
        }
        match failed {
            Some(name) => Err(Error::TaskPanicked(name)),
            None => Ok(()),
        }
    }
}

/// Kernel execution statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelStats {
    /// Launched tasks
    pub tasks: usize,
    /// Tasks whose entry has returned or panicked
    pub finished: usize,
    /// Ticks since start
    pub uptime_ticks: u64,
}
