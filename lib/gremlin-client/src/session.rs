// Copyright 2024 - developers of the `gremlin-rs` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The sessioned client variant: fixes `processor="session"` and
//! carries a session id generated fresh unless one is supplied, with a
//! `reset_session` method to roll it over.

use std::sync::Arc;

use gremlin_transport::{Cluster, Configuration, GremlinError, ResultSet};
use gremlin_types::{Bytecode, RequestMessage};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::client::Client;

/// A [`Client`] handle that fixes every request to the server's `session`
/// processor, so variable bindings persist across requests sharing this
/// session id.
pub struct SessionClient {
    client: Client,
    session_id: Uuid,
}

impl SessionClient {
    pub(crate) fn new(client: Client) -> Self {
        Self {
            client,
            session_id: Uuid::new_v4(),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Rolls over to a fresh session id (or a caller-supplied one).
    /// Requests already in flight under the old session are unaffected.
    pub fn reset_session(&mut self, session_id: Option<Uuid>) -> Uuid {
        self.session_id = session_id.unwrap_or_else(Uuid::new_v4);
        self.session_id
    }

    pub async fn submit(
        &self,
        script: impl Into<String>,
        bindings: Option<Map<String, Value>>,
    ) -> Result<ResultSet, GremlinError> {
        let request = RequestMessage::eval(Uuid::nil(), script, bindings, self.client.aliases.clone())
            .with_session(self.session_id);
        self.client.submit_request(request).await
    }

    pub async fn submit_bytecode(&self, bytecode: Bytecode) -> Result<ResultSet, GremlinError> {
        let request =
            RequestMessage::bytecode(Uuid::nil(), bytecode, self.client.aliases.clone()).with_session(self.session_id);
        self.client.submit_request(request).await
    }

    /// There is no server-side "end this session" op in the wire
    /// protocol this driver targets; closing means closing the underlying
    /// transport, same as the non-sessioned `Client`.
    pub async fn close(&self) -> Result<(), GremlinError> {
        self.client.close().await
    }
}
