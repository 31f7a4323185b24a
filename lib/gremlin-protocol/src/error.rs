// Copyright 2024 - developers of the `gremlin-rs` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
use std::fmt;

/// A server frame could not be turned into a [`crate::ProtocolEvent`].
#[derive(Debug)]
pub enum ProtocolError {
    /// The frame did not follow the `[mime_len][mime][json]` layout.
    Malformed(&'static str),
    /// The JSON body did not parse, or was missing a required field.
    Deserialize(serde_json::Error),
    /// The frame named a `requestId` that is not a well-formed UUID.
    BadRequestId(uuid::Error),
}

impl std::error::Error for ProtocolError {}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed(why) => write!(f, "malformed frame: {why}"),
            Self::Deserialize(err) => write!(f, "bad response body: {err}"),
            Self::BadRequestId(err) => write!(f, "bad requestId: {err}"),
        }
    }
}

impl From<serde_json::Error> for ProtocolError {
    fn from(error: serde_json::Error) -> Self {
        Self::Deserialize(error)
    }
}

impl From<uuid::Error> for ProtocolError {
    fn from(error: uuid::Error) -> Self {
        Self::BadRequestId(error)
    }
}
