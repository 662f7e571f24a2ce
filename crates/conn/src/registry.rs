//! Tracking of live connections for bulk shutdown.
//!
//! The registry never owns a connection: it keeps a stop token per connection id.
//! The connection task owns everything else and hands its [`Retirement`] back
//! when it closes, which removes the entry exactly once.

use std::fmt;
use std::pin::pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Identity of a registered connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    #[inline]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[derive(Debug, Default)]
struct Inner {
    connections: DashMap<ConnectionId, CancellationToken>,
    next_id: AtomicU64,
    retired: AtomicU64,
    stopping: AtomicBool,
    idle: Notify,
}

/// Registry of all live connections of a server.
#[derive(Debug, Clone, Default)]
pub struct ConnectionRegistry {
    inner: Arc<Inner>,
}

/// What a connection receives when it is registered.
#[derive(Debug)]
pub struct Registration {
    pub id: ConnectionId,
    pub stop: CancellationToken,
    pub retirement: Retirement,
}

/// Unregisters its connection exactly once, explicitly or on drop.
#[derive(Debug)]
pub struct Retirement {
    inner: Arc<Inner>,
    id: ConnectionId,
    retired: bool,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking a newly accepted connection.
    ///
    /// After [`stop_all`](Self::stop_all) the returned token is already cancelled.
    pub fn register(&self) -> Registration {
        let id = ConnectionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let stop = CancellationToken::new();
        self.inner.connections.insert(id, stop.clone());

        if self.inner.stopping.load(Ordering::SeqCst) {
            stop.cancel();
        }

        debug!(%id, live = self.inner.connections.len(), "connection registered");
        Registration { id, stop, retirement: Retirement { inner: Arc::clone(&self.inner), id, retired: false } }
    }

    /// Stops tracking `id`. Returns false when it was not tracked.
    pub fn unregister(&self, id: ConnectionId) -> bool {
        unregister(&self.inner, id)
    }

    /// Schedules a close on every tracked connection.
    pub fn stop_all(&self) {
        self.inner.stopping.store(true, Ordering::SeqCst);
        info!(live = self.inner.connections.len(), "stopping all connections");
        for entry in self.inner.connections.iter() {
            entry.value().cancel();
        }
    }

    /// Whether [`stop_all`](Self::stop_all) was called.
    pub fn is_stopping(&self) -> bool {
        self.inner.stopping.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.inner.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.connections.is_empty()
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.inner.connections.contains_key(&id)
    }

    /// Total number of connections that retired since the registry was created.
    pub fn retired(&self) -> u64 {
        self.inner.retired.load(Ordering::SeqCst)
    }

    /// Resolves once no connection is tracked.
    pub async fn wait_idle(&self) {
        loop {
            let mut notified = pin!(self.inner.idle.notified());
            notified.as_mut().enable();
            if self.inner.connections.is_empty() {
                return;
            }
            notified.await;
        }
    }
}

fn unregister(inner: &Inner, id: ConnectionId) -> bool {
    if inner.connections.remove(&id).is_none() {
        return false;
    }

    inner.retired.fetch_add(1, Ordering::SeqCst);
    debug!(%id, live = inner.connections.len(), "connection retired");
    if inner.connections.is_empty() {
        inner.idle.notify_waiters();
    }
    true
}

impl Retirement {
    #[inline]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Removes the connection from the registry. Later calls are no-ops.
    pub fn retire(&mut self) -> bool {
        if self.retired {
            return false;
        }
        self.retired = true;
        unregister(&self.inner, self.id)
    }

    #[inline]
    pub fn is_retired(&self) -> bool {
        self.retired
    }
}

impl Drop for Retirement {
    fn drop(&mut self) {
        self.retire();
    }
}
