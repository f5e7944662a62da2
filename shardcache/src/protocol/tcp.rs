//! [`Transport`] over pooled TCP connections.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::{AsyncWriteExt, BufStream};
use tokio::net::TcpStream;
use tokio::time::{error::Elapsed, timeout};
use tracing::{debug, trace};

use super::{codec, Item, ProtocolError, Transport};
use crate::config::ClientConfig;
use crate::selector::{ServerAddr, ServerSet};
use crate::BoxFuture;

type Conn = BufStream<TcpStream>;

/// Memcached text protocol over TCP.
///
/// Keeps up to `max_idle_conns` idle connections per server. Connecting and
/// each request/response exchange are separately bounded by `timeout`; a
/// connection that timed out or saw an unexpected reply is closed rather
/// than reused.
pub struct TcpTransport {
    timeout: Duration,
    max_idle_conns: usize,
    idle: Mutex<HashMap<ServerAddr, Vec<Conn>>>,
}

impl TcpTransport {
    /// Creates a transport with the given request timeout and pool size.
    pub fn new(timeout: Duration, max_idle_conns: usize) -> Self {
        Self {
            timeout,
            max_idle_conns,
            idle: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a transport from a client configuration.
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.timeout, config.max_idle_conns)
    }

    /// Number of idle pooled connections to `server`.
    pub fn idle_connections(&self, server: &ServerAddr) -> usize {
        self.idle.lock().get(server).map_or(0, Vec::len)
    }

    async fn checkout(&self, server: &ServerAddr) -> Result<Conn, ProtocolError> {
        let pooled = self.idle.lock().get_mut(server).and_then(Vec::pop);
        if let Some(conn) = pooled {
            return Ok(conn);
        }

        trace!(server = %server, "Opening connection");
        let stream = timeout(self.timeout, TcpStream::connect(server.as_str()))
            .await
            .map_err(|_| ProtocolError::Timeout(self.timeout))??;
        stream.set_nodelay(true)?;
        Ok(BufStream::new(stream))
    }

    fn checkin(&self, server: &ServerAddr, conn: Conn) {
        let mut idle = self.idle.lock();
        let pool = idle.entry(server.clone()).or_default();
        if pool.len() < self.max_idle_conns {
            pool.push(conn);
        }
    }

    /// Returns the connection to the pool when the exchange left it usable.
    fn finish<T>(
        &self,
        server: &ServerAddr,
        conn: Conn,
        outcome: Result<Result<T, ProtocolError>, Elapsed>,
    ) -> Result<T, ProtocolError> {
        match outcome {
            Ok(Ok(value)) => {
                self.checkin(server, conn);
                Ok(value)
            }
            Ok(Err(e)) => {
                if e.is_resumable() {
                    self.checkin(server, conn);
                } else {
                    debug!(server = %server, error = %e, "Discarding connection");
                }
                Err(e)
            }
            Err(_) => {
                debug!(server = %server, timeout_ms = self.timeout.as_millis() as u64, "Request timed out");
                Err(ProtocolError::Timeout(self.timeout))
            }
        }
    }
}

impl Transport for TcpTransport {
    fn get_multi<'a>(
        &'a self,
        server: &'a ServerAddr,
        keys: &'a [String],
    ) -> BoxFuture<'a, Result<HashMap<String, Item>, ProtocolError>> {
        Box::pin(async move {
            let mut conn = self.checkout(server).await?;
            let outcome = timeout(self.timeout, async {
                conn.write_all(&codec::encode_get(keys)).await?;
                conn.flush().await?;
                codec::read_values(&mut conn).await
            })
            .await;
            self.finish(server, conn, outcome)
        })
    }

    fn set<'a>(
        &'a self,
        server: &'a ServerAddr,
        item: &'a Item,
    ) -> BoxFuture<'a, Result<(), ProtocolError>> {
        Box::pin(async move {
            let mut conn = self.checkout(server).await?;
            let outcome = timeout(self.timeout, async {
                conn.write_all(&codec::encode_set(item)).await?;
                conn.flush().await?;
                codec::read_store_reply(&mut conn).await
            })
            .await;
            self.finish(server, conn, outcome)
        })
    }

    fn retain_servers(&self, active: &ServerSet) {
        let mut idle = self.idle.lock();
        let before = idle.len();
        idle.retain(|server, _| active.contains(server));
        let pruned = before - idle.len();
        if pruned > 0 {
            debug!(pruned, "Closed idle connections to departed servers");
        }
    }
}
