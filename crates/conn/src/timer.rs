//! One-shot deadlines for the read and write side of a connection.
//!
//! Each [`Deadline`] owns one pinned `Sleep` that is re-armed with
//! `Sleep::reset`, so arming a deadline per operation does not allocate.

use std::pin::Pin;
use std::time::Duration;

use tokio::time::{Instant, Sleep, sleep};

#[derive(Debug)]
pub struct Deadline {
    sleep: Pin<Box<Sleep>>,
    armed: bool,
}

impl Default for Deadline {
    fn default() -> Self {
        Self::new()
    }
}

impl Deadline {
    pub fn new() -> Self {
        Self { sleep: Box::pin(sleep(Duration::ZERO)), armed: false }
    }

    /// Schedules expiry `timeout` from now, replacing any previous deadline.
    pub fn arm(&mut self, timeout: Duration) {
        self.sleep.as_mut().reset(Instant::now() + timeout);
        self.armed = true;
    }

    /// Disarms the deadline. Safe to call when it already fired or was never armed.
    pub fn cancel(&mut self) {
        self.armed = false;
    }

    #[inline]
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Resolves once the armed deadline elapses; pending forever while disarmed.
    ///
    /// The deadline disarms itself when it fires, so the expiry is reported once.
    pub fn expired(&mut self) -> Expired<'_> {
        Expired { deadline: self }
    }
}

/// Future returned by [`Deadline::expired`].
#[derive(Debug)]
pub struct Expired<'a> {
    deadline: &'a mut Deadline,
}

impl Future for Expired<'_> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut std::task::Context<'_>) -> std::task::Poll<Self::Output> {
        let deadline = &mut *self.get_mut().deadline;
        if !deadline.armed {
            return std::task::Poll::Pending;
        }

        match deadline.sleep.as_mut().poll(cx) {
            std::task::Poll::Ready(()) => {
                deadline.armed = false;
                std::task::Poll::Ready(())
            }
            std::task::Poll::Pending => std::task::Poll::Pending,
        }
    }
}
