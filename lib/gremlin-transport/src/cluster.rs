// Copyright 2024 - developers of the `gremlin-rs` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! `Cluster`: round-robin selection across multiple [`Host`]s,
//! configuration, and lazy host establishment.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::future::join_all;
use gremlin_protocol::{GraphSONV2Serializer, Protocol};
use log::info;
use tokio::sync::Mutex;

use crate::configuration::{self, Configuration};
use crate::connection::Connection;
use crate::pool::Host;
use crate::reconnection::{NoReconnect, ReconnectionPolicy};
use crate::{ConfigError, GremlinError};

/// Round-robins over the Hosts backing one cluster config.
///
/// Holds no cyclic references: `Cluster` owns `Host`s, `Host` owns
/// `Connection`s, and nothing points back up the chain.
pub struct Cluster {
    config: Configuration,
    hosts: Mutex<VecDeque<Host>>,
    reconnection: Arc<dyn ReconnectionPolicy>,
    closed: AtomicBool,
}

impl Cluster {
    /// Builds a Cluster from `config` without opening any Hosts yet — call
    /// [`Cluster::open`] (or let the first [`Cluster::get_connection`]
    /// call trigger [`Cluster::establish_hosts`] lazily) to dial out.
    pub fn new(config: Configuration) -> Self {
        Self::with_reconnection(config, Arc::new(NoReconnect))
    }

    pub fn with_reconnection(config: Configuration, reconnection: Arc<dyn ReconnectionPolicy>) -> Self {
        Self {
            config,
            hosts: Mutex::new(VecDeque::new()),
            reconnection,
            closed: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Opens the Cluster: establishes all configured Hosts up front.
    /// Hosts are also established lazily on first use if `open` was
    /// never called.
    pub async fn open(config: Configuration) -> Result<Self, GremlinError> {
        let cluster = Self::new(config);
        cluster.establish_hosts().await?;
        Ok(cluster)
    }

    /// Idempotent: opens one Host per configured URL if the deque is
    /// still empty.
    pub async fn establish_hosts(&self) -> Result<(), GremlinError> {
        let mut hosts = self.hosts.lock().await;
        if !hosts.is_empty() {
            return Ok(());
        }
        let protocol = Arc::new(Protocol::new(
            Box::new(GraphSONV2Serializer::new()),
            self.config.username.clone(),
            self.config.password.clone(),
        ));
        let opened = join_all(
            self.config
                .host_urls()?
                .into_iter()
                .map(|url| Host::open(url, &self.config, protocol.clone(), self.reconnection.clone())),
        )
        .await;
        for host in opened {
            hosts.push_back(host?);
        }
        info!("gremlin-transport: cluster established with {} hosts", hosts.len());
        Ok(())
    }

    /// Round-robins: pops the head Host, asks it for a Connection,
    /// re-appends it to the tail, and returns the Connection.
    pub async fn get_connection(&self) -> Result<Connection, GremlinError> {
        self.establish_hosts().await?;
        let mut hosts = self.hosts.lock().await;
        let Some(host) = hosts.pop_front() else {
            return Err(GremlinError::PoolExhausted);
        };
        let result = host.get_connection().await;
        hosts.push_back(host);
        result
    }

    /// Releases a Connection previously returned by [`Self::get_connection`]
    /// back to the Host that owns it.
    pub async fn release(&self, conn: &Connection) {
        let hosts = self.hosts.lock().await;
        for host in hosts.iter() {
            if host.url() == conn.url() {
                host.release(conn).await;
                return;
            }
        }
    }

    /// Closes every Host concurrently. Idempotent.
    pub async fn close(&self) -> Result<(), GremlinError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let hosts = std::mem::take(&mut *self.hosts.lock().await);
        let results = join_all(hosts.iter().map(|host| host.close())).await;
        for result in results {
            result?;
        }
        Ok(())
    }

    pub fn closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Merges JSON config overrides into a fresh Cluster's config.
    /// Callers should construct the Cluster after merging, since
    /// `Configuration` is immutable once a Cluster is built from it.
    pub fn config_from_json(path: impl AsRef<std::path::Path>) -> Result<Configuration, ConfigError> {
        let mut config = Configuration::default();
        configuration::config_from_json(&mut config, path)?;
        Ok(config)
    }

    pub fn config_from_yaml(path: impl AsRef<std::path::Path>) -> Result<Configuration, ConfigError> {
        let mut config = Configuration::default();
        configuration::config_from_yaml(&mut config, path)?;
        Ok(config)
    }

    pub fn config_from_env(prefix: &str) -> Result<Configuration, ConfigError> {
        let mut config = Configuration::default();
        configuration::config_from_env(&mut config, prefix)?;
        Ok(config)
    }
}
