// Copyright 2024 - developers of the `gremlin-rs` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
use crate::serializer::MessageSerializer;
use crate::ProtocolError;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use gremlin_types::{status, Message};
use uuid::Uuid;

/// What a decoded server frame means for the `request_id` it names.
pub enum ProtocolEvent {
    /// One chunk of a successful response. `final_chunk` tells the caller
    /// whether the end-of-stream sentinel must be enqueued right after it
    /// (status 200/204) or not yet (status 206).
    Chunk {
        message: Message,
        final_chunk: bool,
    },
    /// Status 204: the request succeeded but produced no data. Only the
    /// end-of-stream sentinel is enqueued — unlike a 200/206 `Chunk`, no
    /// `Message` is delivered to the consumer at all.
    End,
    /// The server wants a SASL response (status 407). The connection
    /// should write `sasl_response` back on the *same* `request_id`
    /// without disturbing the result set.
    Authenticate { sasl_response: String },
    /// Any other status code: the request has failed.
    Failed { status_code: u16, status_message: String },
}

/// Stateless translator between serialized frames and `(request_id,
/// Message)` events. Parameterized by a serializer and SASL PLAIN
/// credentials; holds no per-connection or per-request state of its own —
/// the connection is responsible for not re-authenticating twice for the
/// same `request_id`.
pub struct Protocol {
    serializer: Box<dyn MessageSerializer>,
    username: String,
    password: String,
}

impl Protocol {
    pub fn new(serializer: Box<dyn MessageSerializer>, username: String, password: String) -> Self {
        Self {
            serializer,
            username,
            password,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        self.serializer.mime_type()
    }

    /// Encodes `request` into a wire frame (delegates to the serializer).
    pub fn encode(&self, request_id: Uuid, request: &gremlin_types::RequestMessage) -> Vec<u8> {
        self.serializer.serialize(request_id, request)
    }

    /// The `\0username\0password` SASL PLAIN payload, base64-encoded
    /// per the SASL PLAIN mechanism.
    fn sasl_plain(&self) -> String {
        let mut raw = Vec::with_capacity(2 + self.username.len() + self.password.len());
        raw.push(0u8);
        raw.extend_from_slice(self.username.as_bytes());
        raw.push(0u8);
        raw.extend_from_slice(self.password.as_bytes());
        BASE64.encode(raw)
    }

    /// Decodes one server frame and classifies it by status code. Returns
    /// the `request_id` alongside the event so the caller can look up the
    /// right result set.
    pub fn decode(&self, frame: &[u8]) -> Result<(Uuid, ProtocolEvent), ProtocolError> {
        let raw = self.serializer.deserialize(frame)?;
        // `aggregate_to` is latched by the caller from `Message::aggregate_to()`
        // on the first frame for a request_id; this layer only classifies
        // the status code.
        let event = match raw.status_code {
            status::AUTHENTICATE => ProtocolEvent::Authenticate {
                sasl_response: self.sasl_plain(),
            },
            status::NO_CONTENT => ProtocolEvent::End,
            status::SUCCESS | status::PARTIAL_CONTENT => ProtocolEvent::Chunk {
                final_chunk: raw.status_code == status::SUCCESS,
                message: Message {
                    request_id: raw.request_id,
                    status_code: raw.status_code,
                    status_message: raw.status_message,
                    data: raw.data,
                    meta: raw.meta,
                },
            },
            other => ProtocolEvent::Failed {
                status_code: other,
                status_message: raw.status_message,
            },
        };
        Ok((raw.request_id, event))
    }
}
