//! Producer/consumer relay
//!
//! Two tasks of equal priority share one single-slot channel. The producer
//! sends a random value every period; the consumer blocks on the channel
//! and prints whatever arrives.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::channel::Channel;
use crate::config::Config;
use crate::console::Console;
use crate::error::Result;
use crate::kernel::Kernel;
use crate::random::{RandomSource, SeededRandom};
use crate::task::{TaskContext, TaskPriority};
use crate::timer::{Ticks, Timeout};

pub const PRODUCER_NAME: &str = "Producer";
pub const CONSUMER_NAME: &str = "Consumer";

/// Both relay tasks run one level above idle
pub const RELAY_PRIORITY: TaskPriority = TaskPriority::above_idle(1);

/// Periodic source: generate, send, sleep
pub struct Producer<R> {
    channel: Arc<Channel<i32>>,
    console: Arc<dyn Console>,
    period: Ticks,
    rng: R,
}

impl<R: RandomSource> Producer<R> {
    pub fn new(channel: Arc<Channel<i32>>, console: Arc<dyn Console>, period: Ticks, rng: R) -> Self {
        Self {
            channel,
            console,
            period,
            rng,
        }
    }

    /// One Generate → Send → Sleep iteration; returns the value sent
    pub fn cycle(&mut self, ctx: &TaskContext) -> Result<i32> {
        let value = self.rng.next_i32();
        self.channel.send(value, Timeout::Forever)?;
        debug!(task = ctx.name(), value, "sent");
        self.console.print(format_args!("{} (sent): {}", ctx.name(), value));
        ctx.delay(self.period);
        Ok(value)
    }

    pub fn run(mut self, ctx: TaskContext) -> ! {
        loop {
            if let Err(err) = self.cycle(&ctx) {
                warn!(task = ctx.name(), error = %err, "send failed");
            }
        }
    }
}

/// Sink: receive, report
pub struct Consumer {
    channel: Arc<Channel<i32>>,
    console: Arc<dyn Console>,
}

impl Consumer {
    pub fn new(channel: Arc<Channel<i32>>, console: Arc<dyn Console>) -> Self {
        Self { channel, console }
    }

    /// One Receive → Report iteration; returns the value received
    pub fn cycle(&self, ctx: &TaskContext) -> Result<i32> {
        let value = self.channel.receive(Timeout::Forever)?;
        debug!(task = ctx.name(), value, "received");
        self.console.print(format_args!("{} (received): {}", ctx.name(), value));
        Ok(value)
    }

    pub fn run(self, ctx: TaskContext) -> ! {
        loop {
            if let Err(err) = self.cycle(&ctx) {
                warn!(task = ctx.name(), error = %err, "receive failed");
            }
        }
    }
}

/// Build a kernel with the channel and both relay tasks registered.
///
/// The channel is created first; the producer's generator is seeded when
/// its task starts running.
pub fn build(config: &Config, console: Arc<dyn Console>) -> Result<(Kernel, Arc<Channel<i32>>)> {
    config.validate()?;

    let rate = config.tick_rate();
    let channel = Arc::new(Channel::new());
    let period = rate.ms_to_ticks(config.period_ms);
    let mut kernel = Kernel::new(rate);

    {
        let channel = Arc::clone(&channel);
        let console = Arc::clone(&console);
        kernel.add_task(PRODUCER_NAME, config.stack_size, RELAY_PRIORITY, move |ctx| {
            let rng = SeededRandom::from_time();
            debug!(task = ctx.name(), seed = rng.seed(), "generator seeded");
            Producer::new(channel, console, period, rng).run(ctx)
        })?;
    }
    {
        let channel = Arc::clone(&channel);
        kernel.add_task(CONSUMER_NAME, config.stack_size, RELAY_PRIORITY, move |ctx| {
            Consumer::new(channel, console).run(ctx)
        })?;
    }

    info!(period_ms = config.period_ms, period_ticks = period.get(), "relay wired");
    Ok((kernel, channel))
}
