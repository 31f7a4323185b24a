// Copyright 2024 - developers of the `gremlin-rs` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Typed helpers over [`Client::submit_side_effect`](crate::Client::submit_side_effect)
//! for the `keys`/`gather`/`close` ops that read back traversal
//! side-effect state the core transports but never interprets.

use gremlin_transport::{GremlinError, ResultSet};
use gremlin_types::Op;

use crate::client::Client;

impl Client {
    /// Lists the side-effect keys a traversal produced
    /// (`op=keys`).
    pub async fn side_effect_keys(&self, side_effect_key: impl Into<String>) -> Result<ResultSet, GremlinError> {
        self.submit_side_effect(Op::Keys, side_effect_key).await
    }

    /// Gathers the value of one side-effect key (`op=gather`).
    pub async fn gather_side_effect(&self, side_effect_key: impl Into<String>) -> Result<ResultSet, GremlinError> {
        self.submit_side_effect(Op::Gather, side_effect_key).await
    }

    /// Releases server-side side-effect state for a key (`op=close`).
    pub async fn close_side_effect(&self, side_effect_key: impl Into<String>) -> Result<ResultSet, GremlinError> {
        self.submit_side_effect(Op::Close, side_effect_key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gremlin_transport::{Cluster, Configuration};
    use serde_json::Map;
    use std::sync::Arc;

    #[test]
    fn side_effect_ops_build_the_right_request() {
        use gremlin_types::RequestMessage;
        use uuid::Uuid;

        let keys = RequestMessage::side_effect(Uuid::nil(), Op::Keys, "sack".to_string(), Map::new());
        assert_eq!(keys.op, Op::Keys);
        assert_eq!(keys.args.side_effect_key.as_deref(), Some("sack"));

        // Smoke-test that the helpers are reachable on a Client built
        // without dialing out.
        let _client = Client {
            cluster: Arc::new(Cluster::new(Configuration::default())),
            aliases: Map::new(),
        };
    }
}
