//! Connection pooling for keep-alive reuse.
//!
//! The pool tracks at most one live connection per [`Authority`]. Each pooled
//! entry keeps its read buffer, so response bytes the transport read ahead
//! survive until the next request on the same connection.

use crate::stream::ClientStream;
use crate::target::Authority;
use std::collections::HashMap;
use std::io::BufReader;
use std::sync::Mutex;

/// A pooled connection: the stream together with its read buffer.
pub type PooledStream = BufReader<ClientStream>;

/// Keyed store of reusable connections.
pub struct ConnectionPool {
    inner: Mutex<HashMap<Authority, PooledStream>>,
}

impl core::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.inner.lock() {
            Ok(map) => {
                let keys: Vec<String> = map.keys().map(ToString::to_string).collect();
                f.debug_struct("ConnectionPool").field("entries", &keys).finish()
            }
            Err(_) => f
                .debug_struct("ConnectionPool")
                .field("entries", &"<poisoned>")
                .finish(),
        }
    }
}

impl Default for ConnectionPool {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionPool {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Takes the stored connection for the authority, if any.
    ///
    /// Liveness is not validated here; a dead connection reveals itself to
    /// the caller through a failed send.
    #[must_use]
    pub fn get(&self, authority: &Authority) -> Option<PooledStream> {
        let mut map = self.inner.lock().ok()?;
        map.remove(authority)
    }

    /// Stores a connection for the authority.
    ///
    /// Ownership transfer: any connection already stored under the same key
    /// is closed before the new one takes its place, so superseded sockets
    /// are never orphaned.
    pub fn put(&self, authority: Authority, stream: PooledStream) {
        let Ok(mut map) = self.inner.lock() else {
            // Poisoned lock: drop the stream rather than pool through it.
            stream.into_inner().close();
            return;
        };
        if let Some(previous) = map.insert(authority, stream) {
            previous.into_inner().close();
        }
    }

    /// Closes every stored connection and clears the pool. Engine teardown
    /// only.
    pub fn close_all(&self) {
        let Ok(mut map) = self.inner.lock() else { return };
        for (_, stream) in map.drain() {
            stream.into_inner().close();
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().map(|map| map.len()).unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
