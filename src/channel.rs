//! Single-slot blocking channel
//!
//! Inter-task queue with room for exactly one value. Senders block while
//! the slot is occupied, receivers block while it is empty. Both sides
//! keep a FIFO wait list, so blocked callers are served in the order they
//! started waiting and a newcomer never overtakes a waiter.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use tracing::trace;

use crate::error::{Error, Result};
use crate::timer::{Deadline, Timeout};

/// Number of values the channel can hold
pub const CHANNEL_CAPACITY: usize = 1;

/// FIFO list of blocked callers, identified by ticket
#[derive(Debug, Default)]
struct WaitList {
    queue: VecDeque<u64>,
    next_ticket: u64,
}

impl WaitList {
    fn enqueue(&mut self) -> u64 {
        let ticket = self.next_ticket;
        self.next_ticket = self.next_ticket.wrapping_add(1);
        self.queue.push_back(ticket);
        ticket
    }

    fn is_head(&self, ticket: u64) -> bool {
        self.queue.front() == Some(&ticket)
    }

    fn remove(&mut self, ticket: u64) {
        if let Some(pos) = self.queue.iter().position(|&t| t == ticket) {
            self.queue.remove(pos);
        }
    }

    fn len(&self) -> usize {
        self.queue.len()
    }

    fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[derive(Debug)]
struct SlotState<T> {
    slot: Option<T>,
    senders: WaitList,
    receivers: WaitList,
}

/// Blocking channel with capacity 1
///
/// Shared between tasks by reference (typically `Arc<Channel<T>>`). All
/// slot transitions happen under one lock, so a value is handed to exactly
/// one receiver and an occupied slot is never overwritten.
#[derive(Debug)]
pub struct Channel<T> {
    state: Mutex<SlotState<T>>,
    /// Signalled when the slot empties
    not_full: Condvar,
    /// Signalled when the slot fills
    not_empty: Condvar,
}

impl<T> Channel<T> {
    /// Create an empty channel
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SlotState {
                slot: None,
                senders: WaitList::default(),
                receivers: WaitList::default(),
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
        }
    }

    // No code path panics while holding the lock, so a poisoned state is
    // still consistent.
    fn lock(&self) -> MutexGuard<'_, SlotState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store `value`, waiting up to `timeout` for the slot to empty.
    ///
    /// Wakes the head blocked receiver on success. On `TimedOut` the value
    /// is dropped and the slot is left as it was.
    pub fn send(&self, value: T, timeout: Timeout) -> Result<()> {
        let deadline = Deadline::new(Instant::now(), timeout);
        let mut state = self.lock();

        if state.slot.is_none() && state.senders.is_empty() {
            state.slot = Some(value);
            self.not_empty.notify_all();
            return Ok(());
        }

        let ticket = state.senders.enqueue();
        trace!(ticket, waiting = state.senders.len(), "send blocked");
        loop {
            if state.slot.is_none() && state.senders.is_head(ticket) {
                state.senders.remove(ticket);
                state.slot = Some(value);
                self.not_empty.notify_all();
                // The next sender, if any, now waits for the slot to drain.
                return Ok(());
            }

            let now = Instant::now();
            if deadline.is_expired(now) {
                state.senders.remove(ticket);
                // Our exit may have made another sender the head.
                self.not_full.notify_all();
                trace!(ticket, "send timed out");
                return Err(Error::TimedOut(timeout.budget()));
            }

            match deadline.remaining(now) {
                None => {
                    state = self
                        .not_full
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                Some(remaining) => {
                    state = self
                        .not_full
                        .wait_timeout(state, remaining)
                        .map(|(guard, _)| guard)
                        .unwrap_or_else(|poisoned| poisoned.into_inner().0);
                }
            }
        }
    }

    /// Take the resident value, waiting up to `timeout` for one to arrive.
    ///
    /// Wakes the head blocked sender on success.
    pub fn receive(&self, timeout: Timeout) -> Result<T> {
        let deadline = Deadline::new(Instant::now(), timeout);
        let mut state = self.lock();

        if state.receivers.is_empty() {
            if let Some(value) = state.slot.take() {
                self.not_full.notify_all();
                return Ok(value);
            }
        }

        let ticket = state.receivers.enqueue();
        trace!(ticket, waiting = state.receivers.len(), "receive blocked");
        loop {
            if state.receivers.is_head(ticket) {
                if let Some(value) = state.slot.take() {
                    state.receivers.remove(ticket);
                    self.not_full.notify_all();
                    return Ok(value);
                }
            }

            let now = Instant::now();
            if deadline.is_expired(now) {
                state.receivers.remove(ticket);
                self.not_empty.notify_all();
                trace!(ticket, "receive timed out");
                return Err(Error::TimedOut(timeout.budget()));
            }

            match deadline.remaining(now) {
                None => {
                    state = self
                        .not_empty
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                Some(remaining) => {
                    state = self
                        .not_empty
                        .wait_timeout(state, remaining)
                        .map(|(guard, _)| guard)
                        .unwrap_or_else(|poisoned| poisoned.into_inner().0);
                }
            }
        }
    }

    /// Store `value` only if the slot is free right now
    pub fn try_send(&self, value: T) -> Result<()> {
        self.send(value, Timeout::Immediate)
    }

    /// Take the resident value only if one is there right now
    pub fn try_receive(&self) -> Result<T> {
        self.receive(Timeout::Immediate)
    }

    /// Number of resident values (0 or 1)
    pub fn len(&self) -> usize {
        usize::from(self.lock().slot.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.lock().slot.is_none()
    }

    pub fn is_full(&self) -> bool {
        self.lock().slot.is_some()
    }

    pub fn capacity(&self) -> usize {
        CHANNEL_CAPACITY
    }

    /// Callers currently blocked in `send`
    pub fn waiting_senders(&self) -> usize {
        self.lock().senders.len()
    }

    /// Callers currently blocked in `receive`
    pub fn waiting_receivers(&self) -> usize {
        self.lock().receivers.len()
    }

    /// Drop the resident value, if any, and let the head blocked sender in
    pub fn reset(&self) {
        let mut state = self.lock();
        if state.slot.take().is_some() {
            self.not_full.notify_all();
        }
    }
}

impl<T: Clone> Channel<T> {
    /// Copy of the resident value, left in place
    pub fn peek(&self) -> Option<T> {
        self.lock().slot.clone()
    }
}

impl<T> Default for Channel<T> {
    fn default() -> Self {
        Self::new()
    }
}
