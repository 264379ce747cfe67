//! Scheduler — task table and launch
//!
//! Tasks are registered into a bounded table before start. Starting
//! launches one host thread per task, highest priority first. Every thread
//! parks on a start gate that opens only once the whole table is launched,
//! so either all task bodies run or none do.
//!
//! The host OS time-shares the threads; a task's priority is recorded and
//! decides launch order but is not enforced by the host.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::task::{
    StateCell, Task, TaskContext, TaskFn, TaskPriority, TaskState, MAX_TASKS, MINIMAL_STACK_SIZE,
};
use crate::timer::SysTimer;

/// Slot index of a registered task
pub type TaskId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateState {
    Closed,
    Open,
    Aborted,
}

/// Holds launched threads until every task exists
#[derive(Debug)]
struct StartGate {
    state: Mutex<GateState>,
    changed: Condvar,
}

impl StartGate {
    fn new() -> Self {
        Self {
            state: Mutex::new(GateState::Closed),
            changed: Condvar::new(),
        }
    }

    /// Block until the gate opens (`true`) or is aborted (`false`)
    fn wait(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        while *state == GateState::Closed {
            state = self.changed.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
        *state == GateState::Open
    }

    fn release(&self, to: GateState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = to;
        self.changed.notify_all();
    }
}

/// A task whose thread has been launched
#[derive(Debug)]
pub struct LaunchedTask {
    pub(crate) id: TaskId,
    pub(crate) name: Arc<str>,
    pub(crate) priority: TaskPriority,
    pub(crate) state: Arc<StateCell>,
    pub(crate) handle: JoinHandle<()>,
}

impl LaunchedTask {
    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> TaskPriority {
        self.priority
    }

    pub fn state(&self) -> TaskState {
        self.state.get()
    }
}

/// Task table
#[derive(Debug, Default)]
pub struct Scheduler {
    tasks: Vec<Task>,
}

impl Scheduler {
    /// Create empty scheduler
    pub fn new() -> Self {
        Self {
            tasks: Vec::with_capacity(MAX_TASKS),
        }
    }

    /// Register a task, returns slot index
    pub fn register(&mut self, task: Task) -> Result<TaskId> {
        if self.tasks.len() >= MAX_TASKS {
            return Err(Error::TaskTableFull(MAX_TASKS));
        }
        if task.stack_size < MINIMAL_STACK_SIZE {
            return Err(Error::StackTooSmall {
                name: task.name,
                requested: task.stack_size,
                minimum: MINIMAL_STACK_SIZE,
            });
        }

        let id = self.tasks.len();
        info!(
            task = %task.name,
            id,
            priority = %task.priority,
            stack_size = task.stack_size,
            "task registered"
        );
        self.tasks.push(task);
        Ok(id)
    }

    /// Number of registered tasks
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Slot indices, highest priority first, registration order among equals
    pub fn launch_order(&self) -> Vec<TaskId> {
        let mut order: Vec<TaskId> = (0..self.tasks.len()).collect();
        order.sort_by(|&a, &b| self.tasks[b].priority.cmp(&self.tasks[a].priority));
        order
    }

    /// Launch every registered task.
    ///
    /// Fails without running any task body if a thread cannot be created.
    pub(crate) fn start(self, timer: SysTimer) -> Result<Vec<LaunchedTask>> {
        self.start_with(timer, |builder, body| builder.spawn(body))
    }

    fn start_with<S>(self, timer: SysTimer, mut spawn: S) -> Result<Vec<LaunchedTask>>
    where
        S: FnMut(thread::Builder, Box<dyn FnOnce() + Send + 'static>) -> io::Result<JoinHandle<()>>,
    {
        let order = self.launch_order();
        let mut slots: Vec<Option<Task>> = self.tasks.into_iter().map(Some).collect();
        let gate = Arc::new(StartGate::new());
        let mut launched = Vec::with_capacity(order.len());

        for id in order {
            let Some(task) = slots[id].take() else { continue };
            let name: Arc<str> = Arc::from(task.name.as_str());
            let state = Arc::new(StateCell::new(TaskState::Ready));
            let body = task_body(
                Arc::clone(&gate),
                Arc::clone(&state),
                TaskContext::new(Arc::clone(&name), task.priority, timer),
                task.entry,
            );
            let builder = thread::Builder::new()
                .name(task.name.clone())
                .stack_size(task.stack_size);

            match spawn(builder, body) {
                Ok(handle) => {
                    debug!(task = %name, id, "task launched");
                    launched.push(LaunchedTask {
                        id,
                        name,
                        priority: task.priority,
                        state,
                        handle,
                    });
                }
                Err(source) => {
                    error!(task = %name, error = %source, "failed to launch task, aborting start");
                    gate.release(GateState::Aborted);
                    for other in launched {
                        if other.handle.join().is_err() {
                            warn!(task = %other.name, "aborted task thread did not exit cleanly");
                        }
                    }
                    return Err(Error::Spawn {
                        name: task.name,
                        source,
                    });
                }
            }
        }

        gate.release(GateState::Open);
        info!(tasks = launched.len(), "scheduler started");
        Ok(launched)
    }
}

/// Thread body: wait for the gate, then run the entry and record the outcome
fn task_body(
    gate: Arc<StartGate>,
    state: Arc<StateCell>,
    ctx: TaskContext,
    entry: TaskFn,
) -> Box<dyn FnOnce() + Send + 'static> {
    Box::new(move || {
        if !gate.wait() {
            state.set(TaskState::Inactive);
            return;
        }

        state.set(TaskState::Running);
        let name = ctx.name().to_owned();
        debug!(task = %name, "task running");
        match panic::catch_unwind(AssertUnwindSafe(move || entry(ctx))) {
            Ok(()) => {
                state.set(TaskState::Finished);
                debug!(task = %name, "task returned");
            }
            Err(_) => {
                state.set(TaskState::Failed);
                error!(task = %name, "task panicked");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use crate::timer::TickRate;

    fn dummy_task(_: TaskContext) {}

    fn task(name: &str, priority: TaskPriority) -> Task {
        Task::new(name, MINIMAL_STACK_SIZE, priority, dummy_task)
    }

    #[test]
    fn test_scheduler_empty() {
        let sched = Scheduler::new();
        assert_eq!(sched.task_count(), 0);
        assert!(sched.launch_order().is_empty());
    }

    #[test]
    fn test_register_task() {
        let mut sched = Scheduler::new();
        assert_eq!(sched.register(task("a", TaskPriority::LOW)).unwrap(), 0);
        assert_eq!(sched.register(task("b", TaskPriority::LOW)).unwrap(), 1);
        assert_eq!(sched.task_count(), 2);
    }

    #[test]
    fn test_task_table_full() {
        let mut sched = Scheduler::new();
        for i in 0..MAX_TASKS {
            sched.register(task(&format!("t{i}"), TaskPriority::LOW)).unwrap();
        }
        let err = sched.register(task("extra", TaskPriority::LOW)).unwrap_err();
        assert!(matches!(err, Error::TaskTableFull(MAX_TASKS)));
    }

    #[test]
    fn test_stack_too_small() {
        let mut sched = Scheduler::new();
        let err = sched
            .register(Task::new("tiny", 128, TaskPriority::LOW, dummy_task))
            .unwrap_err();
        assert!(matches!(err, Error::StackTooSmall { requested: 128, .. }));
        assert_eq!(sched.task_count(), 0);
    }

    #[test]
    fn test_launch_order() {
        let mut sched = Scheduler::new();
        sched.register(task("low", TaskPriority::LOW)).unwrap();
        sched.register(task("high", TaskPriority::HIGH)).unwrap();
        sched.register(task("low2", TaskPriority::LOW)).unwrap();
        sched.register(task("normal", TaskPriority::NORMAL)).unwrap();
        assert_eq!(sched.launch_order(), vec![1, 3, 0, 2]);
    }

    #[test]
    fn test_start_runs_every_task() {
        let ran = Arc::new(AtomicUsize::new(0));
        let mut sched = Scheduler::new();
        for i in 0..3 {
            let ran = Arc::clone(&ran);
            sched
                .register(Task::new(format!("t{i}"), MINIMAL_STACK_SIZE, TaskPriority::LOW, move |_| {
                    ran.fetch_add(1, Ordering::SeqCst);
                }))
                .unwrap();
        }

        let launched = sched.start(SysTimer::start(TickRate::default())).unwrap();
        assert_eq!(launched.len(), 3);
        for task in launched {
            task.handle.join().unwrap();
            assert_eq!(task.state.get(), TaskState::Finished);
        }
        assert_eq!(ran.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_context_carries_identity() {
        let mut sched = Scheduler::new();
        sched
            .register(Task::new("named", MINIMAL_STACK_SIZE, TaskPriority::HIGH, |ctx| {
                assert_eq!(ctx.name(), "named");
                assert_eq!(ctx.priority(), TaskPriority::HIGH);
                assert_eq!(thread::current().name(), Some("named"));
            }))
            .unwrap();

        let launched = sched.start(SysTimer::start(TickRate::default())).unwrap();
        for task in launched {
            task.handle.join().unwrap();
            assert_eq!(task.state.get(), TaskState::Finished);
        }
    }

    #[test]
    fn test_panicking_task_marked_failed() {
        let mut sched = Scheduler::new();
        sched
            .register(Task::new("boom", MINIMAL_STACK_SIZE, TaskPriority::LOW, |_| panic!("boom")))
            .unwrap();

        let launched = sched.start(SysTimer::start(TickRate::default())).unwrap();
        for task in launched {
            task.handle.join().unwrap();
            assert_eq!(task.state.get(), TaskState::Failed);
        }
    }

    #[test]
    fn test_spawn_failure_runs_nothing() {
        let ran = Arc::new(AtomicUsize::new(0));
        let mut sched = Scheduler::new();
        for i in 0..3 {
            let ran = Arc::clone(&ran);
            sched
                .register(Task::new(format!("t{i}"), MINIMAL_STACK_SIZE, TaskPriority::LOW, move |_| {
                    ran.fetch_add(1, Ordering::SeqCst);
                }))
                .unwrap();
        }

        let mut spawned = 0;
        let err = sched
            .start_with(SysTimer::start(TickRate::default()), |builder, body| {
                spawned += 1;
                if spawned == 3 {
                    Err(io::Error::new(io::ErrorKind::OutOfMemory, "no memory for task"))
                } else {
                    builder.spawn(body)
                }
            })
            .unwrap_err();

        assert!(matches!(err, Error::Spawn { ref name, .. } if name == "t2"));
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }
}
