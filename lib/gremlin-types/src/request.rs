// Copyright 2024 - developers of the `gremlin-rs` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
use crate::{Bytecode, InvalidRequest};
use serde::Serialize;
use serde_json::Map;
use uuid::Uuid;

/// The `op` field of a [`RequestMessage`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Op {
    Eval,
    Bytecode,
    Authentication,
    Keys,
    Gather,
    Close,
}

/// The `processor` field of a [`RequestMessage`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Processor {
    #[serde(rename = "")]
    Standard,
    #[serde(rename = "session")]
    Session,
    #[serde(rename = "traversal")]
    Traversal,
}

/// A raw Gremlin script, or pre-compiled [`Bytecode`] handed in by the
/// (out of scope) traversal builder.
#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum Gremlin {
    Script(String),
    Bytecode(Bytecode),
}

/// The recognized `args` keys of a [`RequestMessage`]. Unset fields are
/// omitted from the serialized frame rather than sent as `null`, matching
/// how the server distinguishes "absent" from "empty".
#[derive(Clone, Debug, Default, Serialize)]
pub struct Args {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gremlin: Option<Gremlin>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bindings: Option<Map<String, serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aliases: Option<Map<String, serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rebindings: Option<Map<String, serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sasl: Option<String>,
    #[serde(rename = "sideEffect", skip_serializing_if = "Option::is_none")]
    pub side_effect: Option<String>,
    #[serde(rename = "sideEffectKey", skip_serializing_if = "Option::is_none")]
    pub side_effect_key: Option<String>,
}

/// A fully built request, immutable after construction.
///
/// Use [`RequestMessage::eval`], [`RequestMessage::bytecode`], or
/// [`RequestMessage::authentication`] rather than constructing this
/// directly — they enforce the op/processor/args invariants below.
#[derive(Clone, Debug, Serialize)]
pub struct RequestMessage {
    #[serde(rename = "requestId")]
    pub request_id: Uuid,
    pub op: Op,
    pub processor: Processor,
    pub args: Args,
}

impl RequestMessage {
    /// Builds the request for a raw script, optionally with variable
    /// bindings.
    pub fn eval(
        request_id: Uuid,
        script: impl Into<String>,
        bindings: Option<Map<String, serde_json::Value>>,
        aliases: Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            request_id,
            op: Op::Eval,
            processor: Processor::Standard,
            args: Args {
                gremlin: Some(Gremlin::Script(script.into())),
                bindings,
                aliases: Some(aliases),
                ..Default::default()
            },
        }
    }

    /// Builds the request for pre-compiled traversal bytecode.
    pub fn bytecode(request_id: Uuid, bytecode: Bytecode, aliases: Map<String, serde_json::Value>) -> Self {
        Self {
            request_id,
            op: Op::Bytecode,
            processor: Processor::Traversal,
            args: Args {
                gremlin: Some(Gremlin::Bytecode(bytecode)),
                aliases: Some(aliases),
                ..Default::default()
            },
        }
    }

    /// Builds the SASL response to a 407 authentication challenge.
    pub fn authentication(request_id: Uuid, sasl: impl Into<String>) -> Self {
        Self {
            request_id,
            op: Op::Authentication,
            processor: Processor::Traversal,
            args: Args {
                sasl: Some(sasl.into()),
                ..Default::default()
            },
        }
    }

    /// Builds a raw side-effect op (`keys`/`gather`/`close`); the driver
    /// only needs to transport these faithfully, not interpret them.
    pub fn side_effect(request_id: Uuid, op: Op, side_effect_key: String, aliases: Map<String, serde_json::Value>) -> Self {
        Self {
            request_id,
            op,
            processor: Processor::Traversal,
            args: Args {
                side_effect_key: Some(side_effect_key),
                aliases: Some(aliases),
                ..Default::default()
            },
        }
    }

    /// Fixes this request to the session processor with the given session
    /// id, so the server preserves variable bindings across requests
    /// sharing that id.
    pub fn with_session(mut self, session: Uuid) -> Self {
        self.processor = Processor::Session;
        self.args.session = Some(session);
        self
    }

    /// Validates the request's invariants: `op == authentication` ⇒
    /// `args.sasl` present; `processor == session` ⇒ `args.session`
    /// present.
    pub fn validate(&self) -> Result<(), InvalidRequest> {
        if self.op == Op::Authentication && self.args.sasl.is_none() {
            return Err(InvalidRequest("op=authentication requires args.sasl"));
        }
        if self.processor == Processor::Session && self.args.session.is_none() {
            return Err(InvalidRequest("processor=session requires args.session"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eval_request_serializes_without_bindings() {
        let id = Uuid::nil();
        let req = RequestMessage::eval(id, "x + x", None, Map::new());
        req.validate().unwrap();
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["op"], "eval");
        assert_eq!(value["processor"], "");
        assert!(value["args"].get("bindings").is_none());
    }

    #[test]
    fn authentication_without_sasl_is_invalid() {
        let req = RequestMessage {
            request_id: Uuid::nil(),
            op: Op::Authentication,
            processor: Processor::Standard,
            args: Args::default(),
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn session_processor_without_session_id_is_invalid() {
        let mut req = RequestMessage::eval(Uuid::nil(), "x", None, Map::new());
        req.processor = Processor::Session;
        assert!(req.validate().is_err());
    }
}
