// Copyright 2024 - developers of the `gremlin-rs` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
use serde::Serialize;

/// Pre-compiled traversal bytecode, as produced by the (out of scope)
/// traversal-language AST builder and GraphSON serializer.
///
/// The driver never inspects the contents: it is handed an already
/// serialized value and forwards it to the server verbatim inside the
/// request's `gremlin` argument.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Bytecode(pub serde_json::Value);

impl From<serde_json::Value> for Bytecode {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}
