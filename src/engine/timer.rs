// src/engine/timer.rs

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};

const ARMED: u8 = 0;
const FIRED: u8 = 1;
const CANCELLED: u8 = 2;

/// Per-attempt countdown that ticks once per second and runs its expiry
/// action exactly once at zero.
///
/// A manual submit must call [`CountdownTimer::cancel`] first and only go
/// ahead when it returns `true`; whichever of the two claims the timer
/// first is the only submission.
pub struct CountdownTimer {
    state: Arc<AtomicU8>,
    remaining: watch::Receiver<u64>,
    handle: JoinHandle<()>,
}

impl CountdownTimer {
    pub fn start<F, Fut>(seconds: u64, on_expire: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let state = Arc::new(AtomicU8::new(ARMED));
        let (tx, remaining) = watch::channel(seconds);

        let task_state = Arc::clone(&state);
        let handle = tokio::spawn(async move {
            let period = Duration::from_secs(1);
            let mut ticker = interval_at(Instant::now() + period, period);
            let mut left = seconds;

            while left > 0 {
                ticker.tick().await;
                if task_state.load(Ordering::Acquire) != ARMED {
                    return;
                }
                left -= 1;
                let _ = tx.send(left);
            }

            if task_state
                .compare_exchange(ARMED, FIRED, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                on_expire().await;
            }
        });

        Self {
            state,
            remaining,
            handle,
        }
    }

    /// Seconds left on the countdown, as last published by the ticker.
    pub fn remaining(&self) -> u64 {
        *self.remaining.borrow()
    }

    /// Stops the countdown. Returns `false` if the expiry action already
    /// claimed the timer, in which case the caller must not submit.
    pub fn cancel(&self) -> bool {
        match self
            .state
            .compare_exchange(ARMED, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {
                self.handle.abort();
                true
            }
            Err(CANCELLED) => true,
            Err(_) => false,
        }
    }
}

impl Drop for CountdownTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
