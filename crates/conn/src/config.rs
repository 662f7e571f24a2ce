//! Per-connection limits and timeouts.

use std::time::Duration;

use crate::buffer::CHUNK_SIZE;

/// Settings shared by every connection of a server.
///
/// ```
/// use std::time::Duration;
/// use micro_conn::config::ConnectionConfig;
///
/// let config = ConnectionConfig::new()
///     .read_timeout(Duration::from_secs(30))
///     .keep_alive(false);
/// assert_eq!(config.get_read_timeout(), Duration::from_secs(30));
/// ```
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    read_timeout: Duration,
    body_timeout: Duration,
    write_timeout: Duration,
    keep_alive_timeout: Duration,
    max_buffered_bytes: usize,
    chunk_size: usize,
    keep_alive: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(120),
            body_timeout: Duration::from_secs(600),
            write_timeout: Duration::from_secs(120),
            keep_alive_timeout: Duration::from_secs(10),
            max_buffered_bytes: 1024 * 1024,
            chunk_size: CHUNK_SIZE,
            keep_alive: true,
        }
    }
}

impl ConnectionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deadline for receiving a request head.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Deadline for each read of a request body.
    pub fn body_timeout(mut self, timeout: Duration) -> Self {
        self.body_timeout = timeout;
        self
    }

    /// Deadline for each response write.
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// How long an idle keep-alive connection waits for its next request.
    pub fn keep_alive_timeout(mut self, timeout: Duration) -> Self {
        self.keep_alive_timeout = timeout;
        self
    }

    /// Upper bound of received-but-unconsumed bytes; exceeding it is a protocol error.
    pub fn max_buffered_bytes(mut self, max: usize) -> Self {
        self.max_buffered_bytes = max;
        self
    }

    /// Capacity of the receive chunks.
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn get_read_timeout(&self) -> Duration {
        self.read_timeout
    }

    pub fn get_body_timeout(&self) -> Duration {
        self.body_timeout
    }

    pub fn get_write_timeout(&self) -> Duration {
        self.write_timeout
    }

    pub fn get_keep_alive_timeout(&self) -> Duration {
        self.keep_alive_timeout
    }

    pub fn get_max_buffered_bytes(&self) -> usize {
        self.max_buffered_bytes
    }

    pub fn get_chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn is_keep_alive(&self) -> bool {
        self.keep_alive
    }
}
