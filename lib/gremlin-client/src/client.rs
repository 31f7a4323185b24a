// Copyright 2024 - developers of the `gremlin-rs` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! [`Client`] and [`ClientBuilder`]: a plain, field-by-field
//! configuration struct paired with an async constructor, wrapped in a
//! fluent builder since this driver's configuration surface is much
//! wider than a single host/port pair.

use std::sync::Arc;
use std::time::Duration;

use gremlin_transport::{Cluster, Connection, Configuration, GremlinError, NoReconnect, ReconnectionPolicy, ResultSet};
use gremlin_types::{Bytecode, Op, RequestMessage};
use log::debug;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::session::SessionClient;

/// Builds a [`Client`] by overlaying fluent setters onto a
/// [`Configuration`] before handing it to [`ClientBuilder::connect`].
pub struct ClientBuilder {
    config: Configuration,
    aliases: Map<String, Value>,
    reconnection: Arc<dyn ReconnectionPolicy>,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            config: Configuration::default(),
            aliases: Map::new(),
            reconnection: Arc::new(NoReconnect),
        }
    }
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from an already-built [`Configuration`] (e.g. one produced
    /// by [`crate::config_from_yaml`]/[`crate::config_from_json`]/
    /// [`crate::config_from_env`]) rather than accumulating defaults.
    pub fn with_config(config: Configuration) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.hosts = vec![host.into()];
        self
    }

    pub fn hosts(mut self, hosts: Vec<String>) -> Self {
        self.config.hosts = hosts;
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.username = username.into();
        self.config.password = password.into();
        self
    }

    pub fn max_conns(mut self, max_conns: usize) -> Self {
        self.config.max_conns = max_conns;
        self
    }

    pub fn min_conns(mut self, min_conns: usize) -> Self {
        self.config.min_conns = min_conns;
        self
    }

    pub fn max_inflight(mut self, max_inflight: usize) -> Self {
        self.config.max_inflight = max_inflight;
        self
    }

    pub fn max_times_acquired(mut self, max_times_acquired: usize) -> Self {
        self.config.max_times_acquired = max_times_acquired;
        self
    }

    pub fn response_timeout(mut self, timeout: Duration) -> Self {
        self.config.response_timeout = Some(timeout.as_secs_f64());
        self
    }

    pub fn alias(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.aliases.insert(from.into(), Value::String(to.into()));
        self
    }

    pub fn reconnection(mut self, policy: Arc<dyn ReconnectionPolicy>) -> Self {
        self.reconnection = policy;
        self
    }

    /// Opens the underlying [`Cluster`] and returns a ready-to-use
    /// [`Client`].
    pub async fn connect(self) -> Result<Client, GremlinError> {
        let cluster = Cluster::with_reconnection(self.config, self.reconnection);
        cluster.establish_hosts().await?;
        Ok(Client {
            cluster: Arc::new(cluster),
            aliases: self.aliases,
        })
    }
}

/// Thin public façade over the transport core. Accepts raw scripts (with
/// optional bindings) or pre-compiled traversal bytecode, builds the
/// right `RequestMessage`, and returns the streaming [`ResultSet`] the
/// caller iterates.
#[derive(Clone)]
pub struct Client {
    pub(crate) cluster: Arc<Cluster>,
    pub(crate) aliases: Map<String, Value>,
}

impl Client {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Opens a Client straight from a [`Configuration`], with no aliases.
    pub async fn connect(config: Configuration) -> Result<Self, GremlinError> {
        ClientBuilder::with_config(config).connect().await
    }

    /// Submits a raw Gremlin script, optionally with variable bindings.
    pub async fn submit(
        &self,
        script: impl Into<String>,
        bindings: Option<Map<String, Value>>,
    ) -> Result<ResultSet, GremlinError> {
        let request = RequestMessage::eval(Uuid::nil(), script, bindings, self.aliases.clone());
        self.submit_request(request).await
    }

    /// Submits pre-compiled traversal bytecode.
    pub async fn submit_bytecode(&self, bytecode: Bytecode) -> Result<ResultSet, GremlinError> {
        let request = RequestMessage::bytecode(Uuid::nil(), bytecode, self.aliases.clone());
        self.submit_request(request).await
    }

    /// Submits an already-built [`RequestMessage`] as-is. The
    /// `request_id` is reassigned by the `Connection` at write time
    /// regardless of what it was constructed with.
    pub async fn submit_request(&self, request: RequestMessage) -> Result<ResultSet, GremlinError> {
        request.validate()?;
        let conn = self.cluster.get_connection().await?;
        let result_set = conn.write(request).await?;
        self.spawn_release(conn, &result_set);
        Ok(result_set)
    }

    /// A sessioned variant that fixes `processor=session` and a stable
    /// per-handle session id, so the server preserves variable bindings
    /// across requests sharing that session.
    pub fn session(&self) -> SessionClient {
        SessionClient::new(self.clone())
    }

    /// Transports a `keys`/`gather`/`close` side-effect op faithfully; see
    /// [`crate::side_effects`] for the typed helpers most callers want
    /// instead.
    pub async fn submit_side_effect(
        &self,
        op: Op,
        side_effect_key: impl Into<String>,
    ) -> Result<ResultSet, GremlinError> {
        let request = RequestMessage::side_effect(Uuid::nil(), op, side_effect_key.into(), self.aliases.clone());
        self.submit_request(request).await
    }

    /// Closes the underlying Cluster (every Host, every Connection).
    /// Idempotent.
    pub async fn close(&self) -> Result<(), GremlinError> {
        self.cluster.close().await
    }

    /// Spawns the per-request release task: awaits the result set's
    /// terminal state, then returns the Connection's slot to its Host
    /// regardless of whether the caller ever drains the `ResultSet` it was
    /// handed.
    pub(crate) fn spawn_release(&self, conn: Connection, result_set: &ResultSet) {
        let cluster = self.cluster.clone();
        let done = result_set.done_future();
        tokio::spawn(async move {
            done.await;
            debug!("gremlin-client: releasing connection to {}", conn.url());
            cluster.release(&conn).await;
        });
    }
}
