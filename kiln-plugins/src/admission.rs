use kiln_core::ServiceError;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Notify;

struct State {
    counter: u64,
    pending: u64,
    closed: bool,
}

/// Bounded-semaphore admission control shared by `Pool` and `RateLimit`.
/// A single `Notify` stands in for the "one-shot notifier,
/// re-established after every release" primitive: every waiter registers
/// for notification *before* checking whether a permit is free, so a
/// release that lands between the check and the wait is never missed.
pub struct Admission {
    limit: u64,
    hard_limit: Option<u64>,
    timeout: Option<Duration>,
    state: Mutex<State>,
    notify: Notify,
}

impl Admission {
    pub fn new(limit: u64, hard_limit: Option<u64>, timeout: Option<Duration>) -> Self {
        Self {
            limit: limit.max(1),
            hard_limit,
            timeout,
            state: Mutex::new(State {
                counter: 0,
                pending: 0,
                closed: false,
            }),
            notify: Notify::new(),
        }
    }

    /// Blocks until a permit is available, the hard limit refuses
    /// admission, the per-waiter timeout expires, or the admission closes.
    /// Returns a [`Permit`] that releases the slot on drop, so a caller
    /// cancelled at any point — parked waiting, or holding the permit but
    /// never reaching a release point — can never leak it.
    pub async fn acquire(self: Arc<Self>) -> Result<Permit, ServiceError> {
        let deadline = self.timeout.map(|d| Instant::now() + d);

        loop {
            // Register before checking state, so a concurrent release can't
            // resolve the notifier before we start waiting on it.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.state.lock().unwrap();
                if state.closed {
                    return Err(ServiceError::ConnectionClosed);
                }
                if state.counter < self.limit {
                    state.counter += 1;
                    return Ok(Permit {
                        admission: Some(self.clone()),
                    });
                }
                if let Some(hard_limit) = self.hard_limit {
                    if state.pending >= hard_limit {
                        return Err(ServiceError::TooManyRequestsPending);
                    }
                }
                state.pending += 1;
            }
            // Guards the pending count for the rest of this loop iteration:
            // if `acquire`'s own future is dropped while parked below, the
            // guard's drop still runs and decrements it.
            let _pending = PendingGuard(&self);

            let woke = match deadline {
                Some(dl) => {
                    let remaining = dl.saturating_duration_since(Instant::now());
                    tokio::time::timeout(remaining, notified).await.is_ok()
                }
                None => {
                    notified.await;
                    true
                }
            };

            drop(_pending);
            let closed = self.state.lock().unwrap().closed;

            if closed {
                return Err(ServiceError::ConnectionClosed);
            }
            if !woke {
                return Err(ServiceError::TooMuchTimePending);
            }
            // Lost the race for the freed permit; loop and try again.
        }
    }

    fn release_slot(&self) {
        {
            let mut state = self.state.lock().unwrap();
            state.counter = state.counter.saturating_sub(1);
        }
        self.notify.notify_waiters();
    }

    /// Fails every parked waiter with a connection-closed error.
    pub fn close(&self) {
        {
            let mut state = self.state.lock().unwrap();
            state.closed = true;
        }
        self.notify.notify_waiters();
    }
}

/// Decrements the parked-waiter count on drop, however the wait ends —
/// woken, timed out, or the enclosing future dropped mid-wait.
struct PendingGuard<'a>(&'a Admission);

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.0.state.lock().unwrap();
        state.pending = state.pending.saturating_sub(1);
    }
}

/// A held admission slot. Releases on drop, so a caller cancelled between
/// acquiring and explicitly releasing can't leak it; [`Permit::release`]
/// releases it immediately instead of waiting for the value to drop.
pub struct Permit {
    admission: Option<Arc<Admission>>,
}

impl Permit {
    pub fn release(mut self) {
        if let Some(admission) = self.admission.take() {
            admission.release_slot();
        }
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        if let Some(admission) = self.admission.take() {
            admission.release_slot();
        }
    }
}

/// Interior-mutability slot for stashing a [`Permit`] on a session so a
/// hook that only receives `&SessionWrapper` can still release it
/// explicitly. Dropping the slot while it holds a permit releases it, so
/// a call cancelled before reaching the release hook is still safe.
#[derive(Default)]
pub struct PermitSlot(Mutex<Option<Permit>>);

impl PermitSlot {
    pub fn new(permit: Permit) -> Self {
        Self(Mutex::new(Some(permit)))
    }

    /// Releases the held permit immediately, if one is still stashed.
    pub fn release(&self) {
        if let Some(permit) = self.0.lock().unwrap().take() {
            permit.release();
        }
    }

    /// Takes the held permit out, if one is still stashed, leaving the
    /// slot empty.
    pub fn take(&self) -> Option<Permit> {
        self.0.lock().unwrap().take()
    }
}
