// Copyright 2024 - developers of the `gremlin-rs` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The public façade: [`Client`] accepts a raw script, variable bindings,
//! or pre-compiled traversal [`Bytecode`], builds a `RequestMessage`, and
//! hands back a streaming [`ResultSet`].
//!
//! Everything below this crate — `Cluster`, `Host`, `Connection`,
//! `ResultSet` — is re-exported from `gremlin-transport` so a caller only
//! needs this one crate for the common case.

mod client;
mod session;
mod side_effects;

pub use client::{Client, ClientBuilder};
pub use gremlin_transport::{
    config_from_env, config_from_json, config_from_yaml, ClientError, ConfigError, Configuration,
    ConnectError, FixedReconnect, GremlinError, NoReconnect, ReconnectionPolicy, ResultSet,
};
pub use gremlin_types::{AggregateTo, Bytecode, Message, RequestMessage};
pub use session::SessionClient;
