// Copyright 2024 - developers of the `gremlin-rs` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
use std::fmt;
use uuid::Uuid;

/// How the server wants chunks for one request merged back together by the
/// caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum AggregateTo {
    #[default]
    List,
    Set,
    Map,
    BulkSet,
    None,
}

impl AggregateTo {
    /// Parses the GraphSON v1 `meta.aggregateTo` string form.
    pub fn parse(s: &str) -> Self {
        match s {
            "set" => Self::Set,
            "map" => Self::Map,
            "bulkset" => Self::BulkSet,
            "none" => Self::None,
            _ => Self::List,
        }
    }
}

impl fmt::Display for AggregateTo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::List => "list",
            Self::Set => "set",
            Self::Map => "map",
            Self::BulkSet => "bulkset",
            Self::None => "none",
        })
    }
}

/// One decoded server response chunk for a given `request_id`.
///
/// Carries a status code, a status message, and an opaque
/// already-deserialized payload. `data` is whatever the message serializer
/// produced for `result.data` — the GraphSON type system itself is
/// treated as an external collaborator here.
#[derive(Clone, Debug)]
pub struct Message {
    pub request_id: Uuid,
    pub status_code: u16,
    pub status_message: String,
    pub data: serde_json::Value,
    pub meta: serde_json::Map<String, serde_json::Value>,
}

impl Message {
    /// Reads `meta.aggregateTo` (GraphSON v1 shape) or `meta.@value[1]`
    /// (GraphSON v2 typed-pair shape), defaulting to [`AggregateTo::List`]
    /// when neither is present — both shapes show up in the wild depending
    /// on which serializer the server is configured with.
    pub fn aggregate_to(&self) -> AggregateTo {
        if let Some(s) = self.meta.get("aggregateTo").and_then(|v| v.as_str()) {
            return AggregateTo::parse(s);
        }
        if let Some(s) = self
            .meta
            .get("@value")
            .and_then(|v| v.as_array())
            .and_then(|pair| pair.get(1))
            .and_then(|v| v.as_str())
        {
            return AggregateTo::parse(s);
        }
        AggregateTo::default()
    }
}
