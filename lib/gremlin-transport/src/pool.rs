// Copyright 2024 - developers of the `gremlin-rs` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! `Host` / `ConnectionPool`: a pool of [`Connection`]s to one URL with
//! min/max sizing, per-connection acquire-count limits, reuse, and
//! refill-on-failure. One connection is kept alive per endpoint, opened
//! lazily and looked up on every request, the way a connection pool to
//! any single remote endpoint typically works — generalized here to up
//! to `max_conns` connections per Gremlin Server host.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use gremlin_protocol::Protocol;
use log::{info, warn};
use tokio::sync::{Mutex, Notify};

use crate::configuration::Configuration;
use crate::connection::Connection;
use crate::reconnection::ReconnectionPolicy;
use crate::GremlinError;

/// One pooled Connection plus the pool-local bookkeeping `Host` needs
/// beyond what `Connection` tracks about itself.
struct Slot {
    conn: Connection,
    last_used: Instant,
    /// Set once this Connection's `times_acquired` has hit the cap; it is
    /// no longer handed out, but stays open and in the pool until its
    /// last outstanding use drains.
    retiring: bool,
}

/// A pool of Connections to a single Gremlin Server URL.
pub struct Host {
    url: Arc<str>,
    protocol: Arc<Protocol>,
    min_conns: usize,
    max_conns: usize,
    max_times_acquired: usize,
    max_inflight: usize,
    response_timeout: Option<Duration>,
    acquire_timeout: Option<Duration>,
    reconnection: Arc<dyn ReconnectionPolicy>,
    pool: Mutex<Vec<Slot>>,
    notify: Notify,
}

impl Host {
    /// Opens a new Host and eagerly establishes `min_conns` Connections in
    /// parallel.
    pub async fn open(
        url: impl Into<Arc<str>>,
        config: &Configuration,
        protocol: Arc<Protocol>,
        reconnection: Arc<dyn ReconnectionPolicy>,
    ) -> Result<Self, GremlinError> {
        let url = url.into();
        let host = Self {
            url,
            protocol,
            min_conns: config.min_conns,
            max_conns: config.max_conns.max(config.min_conns),
            max_times_acquired: config.max_times_acquired.max(1),
            max_inflight: config.max_inflight,
            response_timeout: config.response_timeout_duration(),
            acquire_timeout: config.response_timeout_duration(),
            reconnection,
            pool: Mutex::new(Vec::new()),
            notify: Notify::new(),
        };

        let opened = join_all((0..host.min_conns).map(|_| host.open_connection())).await;
        let mut slots = Vec::with_capacity(host.min_conns);
        for conn in opened {
            slots.push(Slot {
                conn: conn?,
                last_used: Instant::now(),
                retiring: false,
            });
        }
        *host.pool.lock().await = slots;
        info!(
            "gremlin-transport: host {} opened with {} connections",
            host.url, host.min_conns
        );
        Ok(host)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// The number of Connections currently in the pool, open or retiring.
    /// Mainly useful for diagnostics and tests asserting admission control
    /// stays within `min_conns..=max_conns`.
    pub async fn connection_count(&self) -> usize {
        self.pool.lock().await.len()
    }

    async fn open_connection(&self) -> Result<Connection, GremlinError> {
        Connection::open(
            self.url.clone(),
            self.protocol.clone(),
            self.max_inflight,
            self.response_timeout,
            self.reconnection.clone(),
        )
        .await
    }

    /// Returns a Connection to use for one request: reuse the
    /// least-loaded Connection (ties broken by least recent use), else
    /// grow the pool, else wait for capacity up to `acquire_timeout`,
    /// surfacing [`GremlinError::PoolExhausted`] on expiry.
    pub async fn get_connection(&self) -> Result<Connection, GremlinError> {
        let deadline = self.acquire_timeout.map(|timeout| Instant::now() + timeout);
        loop {
            let mut reserved_growth = false;
            {
                let mut pool = self.pool.lock().await;
                prune_dead(&mut pool);

                let candidate = pool
                    .iter_mut()
                    .filter(|slot| !slot.retiring && !slot.conn.closed())
                    .filter(|slot| slot.conn.times_acquired.load(Ordering::Acquire) < self.max_times_acquired)
                    .min_by_key(|slot| (slot.conn.times_acquired.load(Ordering::Acquire), slot.last_used));

                if let Some(slot) = candidate {
                    let acquired = slot.conn.times_acquired.fetch_add(1, Ordering::AcqRel) + 1;
                    slot.last_used = Instant::now();
                    if acquired >= self.max_times_acquired {
                        slot.retiring = true;
                    }
                    return Ok(slot.conn.clone());
                }

                if pool.len() < self.max_conns {
                    reserved_growth = true;
                }
            }

            if reserved_growth {
                match self.open_connection().await {
                    Ok(conn) => {
                        conn.times_acquired.store(1, Ordering::Release);
                        let mut pool = self.pool.lock().await;
                        pool.push(Slot {
                            conn: conn.clone(),
                            last_used: Instant::now(),
                            retiring: false,
                        });
                        return Ok(conn);
                    }
                    Err(err) => {
                        warn!("gremlin-transport: failed to grow pool for {}: {err}", self.url);
                        // fall through to waiting rather than busy-looping
                        // on a host that is refusing connections.
                    }
                }
            }

            match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(GremlinError::PoolExhausted);
                    }
                    if tokio::time::timeout(deadline - now, self.notify.notified()).await.is_err() {
                        return Err(GremlinError::PoolExhausted);
                    }
                }
                None => self.notify.notified().await,
            }
        }
    }

    /// Releases one use of `conn` back to the pool: decrements
    /// `times_acquired`, and if the Connection is closed or fully drained
    /// after retiring, removes it — refilling up to `min_conns` if the
    /// pool dropped below it.
    pub async fn release(&self, conn: &Connection) {
        let mut pool = self.pool.lock().await;
        let Some(idx) = pool.iter().position(|slot| slot.conn.id() == conn.id()) else {
            return;
        };
        let remaining = conn.times_acquired.fetch_sub(1, Ordering::AcqRel).saturating_sub(1);

        let should_remove = pool[idx].conn.closed() || (pool[idx].retiring && remaining == 0);
        if should_remove {
            let slot = pool.remove(idx);
            let below_min = pool.len() < self.min_conns;
            drop(pool);
            let _ = slot.conn.close().await;
            self.notify.notify_waiters();
            if below_min {
                self.refill().await;
            }
            return;
        }
        drop(pool);
        self.notify.notify_waiters();
    }

    /// Opens one replacement Connection and adds it to the pool, used
    /// after `release` drops the live count below `min_conns`.
    async fn refill(&self) {
        match self.open_connection().await {
            Ok(conn) => {
                self.pool.lock().await.push(Slot {
                    conn,
                    last_used: Instant::now(),
                    retiring: false,
                });
                self.notify.notify_waiters();
            }
            Err(err) => warn!("gremlin-transport: failed to refill pool for {}: {err}", self.url),
        }
    }

    /// Closes every pooled Connection concurrently and waits for all of
    /// them. Idempotent: a second call closes an empty pool and is a
    /// no-op.
    pub async fn close(&self) -> Result<(), GremlinError> {
        let slots = std::mem::take(&mut *self.pool.lock().await);
        let results = join_all(slots.iter().map(|slot| slot.conn.close())).await;
        self.notify.notify_waiters();
        for result in results {
            result?;
        }
        Ok(())
    }
}

fn prune_dead(pool: &mut Vec<Slot>) {
    pool.retain(|slot| !(slot.conn.closed() && slot.conn.times_acquired.load(Ordering::Acquire) == 0));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconnection::NoReconnect;
    use gremlin_protocol::GraphSONV2Serializer;

    fn protocol() -> Arc<Protocol> {
        Arc::new(Protocol::new(Box::new(GraphSONV2Serializer::new()), String::new(), String::new()))
    }

    #[tokio::test]
    async fn open_with_zero_min_conns_starts_empty() {
        let config = Configuration {
            min_conns: 0,
            max_conns: 4,
            ..Configuration::default()
        };
        let host = Host::open("ws://example.invalid/gremlin", &config, protocol(), Arc::new(NoReconnect)).await;
        let host = host.expect("min_conns=0 never dials out");
        assert_eq!(host.connection_count().await, 0);
    }
}
