//! Work queue joining the two phases of the staged topology.
//!
//! An unbounded FIFO with task accounting: every pushed entry counts as
//! unfinished until a consumer pops it and calls [`WorkQueue::task_done`].
//! [`WorkQueue::join`] resolves once the count is back to zero.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use tracing::warn;

struct State<T> {
    entries: VecDeque<T>,
    unfinished: usize,
}

pub struct WorkQueue<T> {
    state: Mutex<State<T>>,
    all_done: Notify,
}

impl<T> WorkQueue<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                entries: VecDeque::new(),
                unfinished: 0,
            }),
            all_done: Notify::new(),
        }
    }

    fn state(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, entry: T) {
        let mut state = self.state();
        state.entries.push_back(entry);
        state.unfinished += 1;
    }

    /// Remove the oldest entry, if any. The entry stays unfinished until
    /// [`task_done`](Self::task_done) is called for it.
    pub fn pop(&self) -> Option<T> {
        self.state().entries.pop_front()
    }

    /// Entries waiting to be popped.
    pub fn len(&self) -> usize {
        self.state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries pushed but not yet acknowledged.
    pub fn unfinished(&self) -> usize {
        self.state().unfinished
    }

    /// Acknowledge one popped entry.
    pub fn task_done(&self) {
        let mut state = self.state();
        if state.unfinished == 0 {
            warn!("task_done called more times than entries were pushed");
            return;
        }
        state.unfinished -= 1;
        if state.unfinished == 0 {
            self.all_done.notify_waiters();
        }
    }

    /// Wait until every pushed entry has been acknowledged.
    pub async fn join(&self) {
        loop {
            let notified = self.all_done.notified();
            tokio::pin!(notified);
            // Register before checking so a notify between check and await is not lost.
            notified.as_mut().enable();
            if self.unfinished() == 0 {
                return;
            }
            notified.await;
        }
    }
}

impl<T> Default for WorkQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
