// Copyright 2024 - developers of the `gremlin-rs` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Frame encoding and the stateless Gremlin Server subprotocol translator.
//!
//! This crate has no sockets and no scheduler in it: given bytes, it gives
//! back [`ProtocolEvent`]s; given a [`gremlin_types::RequestMessage`], it
//! gives back bytes. `gremlin-transport` is the layer that owns a
//! WebSocket and drives this translator from a receive loop.

pub mod frame;

mod dispatch;
mod error;
mod serializer;

pub use dispatch::{Protocol, ProtocolEvent};
pub use error::ProtocolError;
pub use serializer::{GraphSONV2Serializer, MessageSerializer, RawResponse};
