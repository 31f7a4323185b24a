// Copyright 2024 - developers of the `gremlin-rs` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
use std::fmt;
use std::io;

/// A non-2xx/206 status the server returned for one request, carrying
/// enough to reconstruct what went wrong.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerError {
    pub status_code: u16,
    pub status_message: String,
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status_code, self.status_message)
    }
}

impl std::error::Error for ServerError {}

/// Configuration was malformed or referenced something that does not
/// exist, surfaced at `Cluster::open`/`config_from_*`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigError(pub String);

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "configuration error: {}", self.0)
    }
}

impl std::error::Error for ConfigError {}

/// The caller misused the API (e.g. built an invalid request message).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientError(pub String);

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client error: {}", self.0)
    }
}

impl std::error::Error for ClientError {}

/// The transport failed to connect, or an established connection was
/// torn down — every outstanding request on that Connection receives
/// one of these.
#[derive(Debug)]
pub enum ConnectError {
    Io(io::Error),
    WebSocket(tokio_tungstenite::tungstenite::Error),
    /// The receive loop or an explicit `close()` shut the connection down
    /// while requests were still outstanding.
    Closed,
}

impl fmt::Display for ConnectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "connect error, IO failed: {err}"),
            Self::WebSocket(err) => write!(f, "connect error, websocket failed: {err}"),
            Self::Closed => write!(f, "connection closed"),
        }
    }
}

impl std::error::Error for ConnectError {}

impl From<io::Error> for ConnectError {
    fn from(error: io::Error) -> Self {
        Self::Io(error)
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ConnectError {
    fn from(error: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(error)
    }
}

/// The unified error type surfaced to callers of this crate: one enum
/// covering every failure kind, so a `ResultSet` or a `Cluster` operation
/// can fail in exactly one way the caller has to match on.
#[derive(Debug)]
pub enum GremlinError {
    Config(ConfigError),
    Client(ClientError),
    Connect(ConnectError),
    Protocol(gremlin_protocol::ProtocolError),
    /// Non-success status code below 500 (excluding 206/407).
    Request(ServerError),
    /// Non-success status code at or above 500.
    GremlinServer(ServerError),
    ResponseTimeout,
    PoolExhausted,
}

impl GremlinError {
    /// Classifies a non-2xx/206/407 status code: below 500 is a `Request`
    /// (client-side) error, at/above 500 is a `GremlinServer` (server-side)
    /// error.
    pub fn from_status(status_code: u16, status_message: String) -> Self {
        let err = ServerError {
            status_code,
            status_message,
        };
        if status_code >= 500 {
            Self::GremlinServer(err)
        } else {
            Self::Request(err)
        }
    }

    /// The status code this error carries, if any (useful in tests and
    /// `match` guards on a specific server-side failure code).
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Request(e) | Self::GremlinServer(e) => Some(e.status_code),
            _ => None,
        }
    }
}

impl fmt::Display for GremlinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(err) => write!(f, "{err}"),
            Self::Client(err) => write!(f, "{err}"),
            Self::Connect(err) => write!(f, "{err}"),
            Self::Protocol(err) => write!(f, "protocol error: {err}"),
            Self::Request(err) => write!(f, "request error: {err}"),
            Self::GremlinServer(err) => write!(f, "gremlin server error: {err}"),
            Self::ResponseTimeout => write!(f, "response timed out"),
            Self::PoolExhausted => write!(f, "connection pool exhausted"),
        }
    }
}

impl std::error::Error for GremlinError {}

impl From<ConfigError> for GremlinError {
    fn from(error: ConfigError) -> Self {
        Self::Config(error)
    }
}

impl From<ClientError> for GremlinError {
    fn from(error: ClientError) -> Self {
        Self::Client(error)
    }
}

impl From<ConnectError> for GremlinError {
    fn from(error: ConnectError) -> Self {
        Self::Connect(error)
    }
}

impl From<gremlin_protocol::ProtocolError> for GremlinError {
    fn from(error: gremlin_protocol::ProtocolError) -> Self {
        Self::Protocol(error)
    }
}

impl From<gremlin_types::InvalidRequest> for GremlinError {
    fn from(error: gremlin_types::InvalidRequest) -> Self {
        Self::Client(ClientError(error.to_string()))
    }
}
