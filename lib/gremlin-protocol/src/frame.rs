// Copyright 2024 - developers of the `gremlin-rs` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The bit-exact frame layout:
//! `[1 byte mime_len][mime_len bytes mime_type][JSON body bytes]`.

use crate::ProtocolError;

/// Prepends the one-byte MIME length header to `body`.
///
/// # Panics
///
/// Panics if `mime` is longer than 255 bytes; every MIME type this driver
/// emits (`application/json`, `application/vnd.gremlin-v2.0+json`, ...) is
/// well under that.
pub fn encode(mime: &str, body: &[u8]) -> Vec<u8> {
    assert!(mime.len() <= u8::MAX as usize, "mime type too long to frame");
    let mut frame = Vec::with_capacity(1 + mime.len() + body.len());
    frame.push(mime.len() as u8);
    frame.extend_from_slice(mime.as_bytes());
    frame.extend_from_slice(body);
    frame
}

/// Splits a frame into its MIME type and JSON body.
pub fn decode(frame: &[u8]) -> Result<(&str, &[u8]), ProtocolError> {
    let mime_len = *frame
        .first()
        .ok_or(ProtocolError::Malformed("empty frame"))? as usize;
    let rest = &frame[1..];
    if rest.len() < mime_len {
        return Err(ProtocolError::Malformed("frame shorter than its mime header"));
    }
    let (mime, body) = rest.split_at(mime_len);
    let mime = std::str::from_utf8(mime).map_err(|_| ProtocolError::Malformed("mime type is not utf-8"))?;
    Ok((mime, body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let frame = encode("application/json", b"{}");
        assert_eq!(frame[0], "application/json".len() as u8);
        let (mime, body) = decode(&frame).unwrap();
        assert_eq!(mime, "application/json");
        assert_eq!(body, b"{}");
    }

    #[test]
    fn rejects_truncated_frame() {
        let mut frame = encode("application/json", b"{}");
        frame.truncate(5);
        assert!(decode(&frame).is_err());
    }
}
