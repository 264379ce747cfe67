//! relay-rtos — two-task relay over a single-slot queue
//!
//! A minimal task core: a periodic producer and a consumer exchange
//! integers through a capacity-1 blocking channel.
//! - Task table with priorities and stack budgets, launched all-or-nothing
//! - Tick-based delays and block times
//! - Single-slot channel with FIFO wait lists and finite or infinite timeouts
//! - Pluggable console and random-source collaborators

pub mod error;
pub mod timer;
pub mod channel;
pub mod task;
pub mod scheduler;
pub mod kernel;
pub mod console;
pub mod random;
pub mod config;
pub mod app;

pub use error::{Error, Result};
pub use timer::{Deadline, SysTimer, TickRate, Ticks, Timeout};
pub use channel::Channel;
pub use task::{Task, TaskContext, TaskFn, TaskPriority, TaskState};
pub use scheduler::{Scheduler, TaskId};
pub use kernel::{Kernel, KernelStats, RunningKernel};
pub use console::{Console, MemoryConsole, StdoutConsole};
pub use random::{RandomSource, SeededRandom};
pub use config::Config;
