// Copyright 2024 - developers of the `gremlin-rs` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The concurrent transport and dispatch core: everything that owns a
//! socket, a scheduler, or cross-request state lives here.
//!
//! Layers, leaves first: [`net`] is the raw WebSocket duplex,
//! [`resultset`] is the per-request async cursor, [`connection`]
//! multiplexes many requests on one socket via a single receive loop,
//! [`pool`] manages reuse of Connections to one URL, and [`cluster`]
//! round-robins over Hosts. [`configuration`] and [`errors`] are the
//! ambient configuration-loading and error-handling pieces every layer
//! above depends on.

pub mod cluster;
pub mod configuration;
pub mod connection;
pub mod errors;
pub mod net;
pub mod pool;
pub mod reconnection;
pub mod resultset;

pub use cluster::Cluster;
pub use configuration::{config_from_env, config_from_json, config_from_yaml, Configuration};
pub use connection::Connection;
pub use errors::{ClientError, ConfigError, ConnectError, GremlinError, ServerError};
pub use pool::Host;
pub use reconnection::{FixedReconnect, NoReconnect, ReconnectionPolicy};
pub use resultset::ResultSet;
