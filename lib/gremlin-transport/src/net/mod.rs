// Copyright 2024 - developers of the `gremlin-rs` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The WebSocket duplex the rest of this crate talks to.
//!
//! The stream is split into a [`WsWriter`] and a [`WsReader`] right after
//! connecting: `Connection` hands the reader to its single receive loop
//! and keeps the writer behind its own write lock, so a blocking `read()`
//! never starves a concurrent `write()`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::ConnectError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// One unit handed up from the transport to the `Connection` receive loop.
#[derive(Debug)]
pub enum Frame {
    /// A binary (or UTF-8-normalized text) payload ready for
    /// `gremlin_protocol::Protocol::decode`.
    Data(Vec<u8>),
    /// The peer closed the socket cleanly.
    Close,
}

/// Opens a WebSocket connection to `url` and splits it into independent
/// read/write halves.
pub async fn connect(url: &str) -> Result<(WsWriter, WsReader), ConnectError> {
    let (stream, _response) = tokio_tungstenite::connect_async(url).await?;
    let (sink, source) = stream.split();
    let closed = Arc::new(AtomicBool::new(false));
    Ok((
        WsWriter {
            sink,
            closed: closed.clone(),
        },
        WsReader { source, closed },
    ))
}

/// The write half of an open connection. Sends are atomic binary frames.
pub struct WsWriter {
    sink: SplitSink<WsStream, WsMessage>,
    closed: Arc<AtomicBool>,
}

impl WsWriter {
    pub fn closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub async fn write(&mut self, frame: Vec<u8>) -> Result<(), ConnectError> {
        if self.closed() {
            return Err(ConnectError::Closed);
        }
        self.sink.send(WsMessage::Binary(frame.into())).await?;
        Ok(())
    }

    pub async fn close(&mut self) -> Result<(), ConnectError> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.sink.close().await?;
        }
        Ok(())
    }
}

/// The read half of an open connection, owned by `Connection`'s single
/// background receive loop.
pub struct WsReader {
    source: SplitStream<WsStream>,
    closed: Arc<AtomicBool>,
}

impl WsReader {
    /// Reads the next application frame, transparently handling ping/pong
    /// and folding close frames into [`Frame::Close`]. Text frames are
    /// UTF-8-decoded and whitespace-trimmed before being handed upward —
    /// the only place text/binary framing is normalized.
    pub async fn read(&mut self) -> Result<Frame, ConnectError> {
        loop {
            let Some(message) = self.source.next().await else {
                self.closed.store(true, Ordering::Release);
                return Ok(Frame::Close);
            };
            match message? {
                WsMessage::Binary(data) => return Ok(Frame::Data(data.into())),
                WsMessage::Text(text) => return Ok(Frame::Data(text.trim().as_bytes().to_vec())),
                WsMessage::Close(_) => {
                    self.closed.store(true, Ordering::Release);
                    return Ok(Frame::Close);
                }
                // tokio-tungstenite answers Ping with Pong automatically;
                // Pong and the low-level Frame variant carry no
                // application data.
                WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_) => continue,
            }
        }
    }
}
