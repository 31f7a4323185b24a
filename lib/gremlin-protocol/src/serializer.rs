// Copyright 2024 - developers of the `gremlin-rs` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
use crate::{frame, ProtocolError};
use gremlin_types::RequestMessage;
use serde_json::{Map, Value};
use uuid::Uuid;

/// One decoded server frame, before the SASL/status dispatch in
/// [`crate::Protocol`] has looked at it.
pub struct RawResponse {
    pub request_id: Uuid,
    pub status_code: u16,
    pub status_message: String,
    pub data: Value,
    pub meta: Map<String, Value>,
}

/// Turns a [`RequestMessage`] into a wire frame and a wire frame back into
/// a [`RawResponse`].
///
/// Implementors are plain encoders — they must not look at `status.code`
/// beyond extracting it; the SASL dispatch and chunk/end-sentinel decisions
/// belong to [`crate::Protocol`].
pub trait MessageSerializer: Send + Sync {
    /// The MIME type placed in the frame header, e.g.
    /// `"application/vnd.gremlin-v2.0+json"`.
    fn mime_type(&self) -> &'static str;

    /// Produces the full wire frame for `request`.
    fn serialize(&self, request_id: Uuid, request: &RequestMessage) -> Vec<u8>;

    /// Parses one server frame.
    fn deserialize(&self, frame: &[u8]) -> Result<RawResponse, ProtocolError>;
}

/// A `MessageSerializer` for plain `application/json` and the
/// GraphSON v2 `application/vnd.gremlin-v2.0+json` variants, which share a
/// wire shape except for how `result.data` wraps typed values.
pub struct GraphSONV2Serializer;

impl GraphSONV2Serializer {
    pub fn new() -> Self {
        Self
    }

    /// GraphSON v2 wraps typed values as `{"@type": ..., "@value": ...}`.
    /// Plain JSON mode has no wrapper. Either way we want the inner list.
    fn unwrap_value(data: Value) -> Value {
        match data {
            Value::Object(mut obj) if obj.contains_key("@type") && obj.contains_key("@value") => {
                obj.remove("@value").unwrap_or(Value::Null)
            }
            other => other,
        }
    }
}

impl Default for GraphSONV2Serializer {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageSerializer for GraphSONV2Serializer {
    fn mime_type(&self) -> &'static str {
        "application/vnd.gremlin-v2.0+json"
    }

    fn serialize(&self, request_id: Uuid, request: &RequestMessage) -> Vec<u8> {
        debug_assert_eq!(request_id, request.request_id);
        let body = serde_json::to_vec(request).expect("RequestMessage always serializes");
        frame::encode(self.mime_type(), &body)
    }

    fn deserialize(&self, frame_bytes: &[u8]) -> Result<RawResponse, ProtocolError> {
        let (_mime, body) = frame::decode(frame_bytes)?;
        let value: Value = serde_json::from_slice(body)?;

        let request_id = value
            .get("requestId")
            .and_then(Value::as_str)
            .ok_or(ProtocolError::Malformed("missing requestId"))?
            .parse::<Uuid>()?;

        let status = value
            .get("status")
            .ok_or(ProtocolError::Malformed("missing status"))?;
        let status_code = status
            .get("code")
            .and_then(Value::as_u64)
            .ok_or(ProtocolError::Malformed("missing status.code"))? as u16;
        let status_message = status
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();

        let result = value.get("result");
        let data = result
            .and_then(|r| r.get("data"))
            .cloned()
            .map(Self::unwrap_value)
            .unwrap_or(Value::Null);
        let meta = result
            .and_then(|r| r.get("meta"))
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        Ok(RawResponse {
            request_id,
            status_code,
            status_message,
            data,
            meta,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gremlin_types::RequestMessage;
    use serde_json::{json, Map};

    #[test]
    fn serializes_eval_request_with_mime_header() {
        let serializer = GraphSONV2Serializer::new();
        let id = Uuid::nil();
        let req = RequestMessage::eval(id, "x + x", None, Map::new());
        let frame = serializer.serialize(id, &req);
        assert_eq!(frame[0] as usize, serializer.mime_type().len());
    }

    #[test]
    fn deserializes_and_unwraps_typed_data() {
        let serializer = GraphSONV2Serializer::new();
        let body = json!({
            "requestId": Uuid::nil().to_string(),
            "status": {"code": 200, "message": ""},
            "result": {
                "data": {"@type": "g:List", "@value": [1, 2, 3]},
                "meta": {}
            }
        });
        let frame = frame::encode(serializer.mime_type(), &serde_json::to_vec(&body).unwrap());
        let resp = serializer.deserialize(&frame).unwrap();
        assert_eq!(resp.status_code, 200);
        assert_eq!(resp.data, json!([1, 2, 3]));
    }
}
