// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Response sinks
//!
//! [`response_channel`] models one HTTP response as a bounded channel of
//! frames. The server side ([`ResponseWriter`]) is the pipeline's sink; the
//! client side ([`ResponseBody`]) is what the requester reads. Dropping the
//! body is a client disconnect.

use super::error::SinkClosed;
use super::transform::Chunk;
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

/// Resolves once the remote peer of a sink has gone away
pub type Disconnected = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Outbound transport for transformed chunks
#[async_trait]
pub trait Sink: Send {
    fn set_status(&mut self, status: u16);

    fn set_header(&mut self, name: &str, value: &str);

    /// Whether status and headers have already gone out
    fn headers_sent(&self) -> bool;

    /// Write one chunk; waits while the transport is full
    async fn write(&mut self, chunk: Chunk) -> Result<(), SinkClosed>;

    /// Finish the response. Idempotent.
    async fn end(&mut self) -> Result<(), SinkClosed>;

    /// Future that resolves when the remote peer closes the transport
    fn disconnected(&self) -> Disconnected;
}

/// Status line and headers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub status: u16,
    pub headers: Vec<(String, String)>,
}

impl ResponseHead {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

impl Default for ResponseHead {
    fn default() -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
        }
    }
}

/// One unit on the response transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseFrame {
    Head(ResponseHead),
    Data(Chunk),
    End,
}

/// Create a connected writer/body pair buffering at most `capacity` frames
pub fn response_channel(capacity: usize) -> (ResponseWriter, ResponseBody) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        ResponseWriter {
            tx,
            head: ResponseHead::default(),
            head_sent: false,
            ended: false,
        },
        ResponseBody { rx },
    )
}

/// Server side of a response
///
/// Status and headers are sent lazily, ahead of the first chunk or the end
/// of the response, and cannot change afterwards.
pub struct ResponseWriter {
    tx: mpsc::Sender<ResponseFrame>,
    head: ResponseHead,
    head_sent: bool,
    ended: bool,
}

impl ResponseWriter {
    async fn send_head(&mut self) -> Result<(), SinkClosed> {
        if self.head_sent {
            return Ok(());
        }
        self.head_sent = true;
        self.tx
            .send(ResponseFrame::Head(self.head.clone()))
            .await
            .map_err(|_| SinkClosed)
    }
}

#[async_trait]
impl Sink for ResponseWriter {
    fn set_status(&mut self, status: u16) {
        if self.head_sent {
            log::debug!("Ignoring status {} after headers were sent", status);
            return;
        }
        self.head.status = status;
    }

    fn set_header(&mut self, name: &str, value: &str) {
        if self.head_sent {
            log::debug!("Ignoring header '{}' after headers were sent", name);
            return;
        }
        self.head.headers.retain(|(key, _)| !key.eq_ignore_ascii_case(name));
        self.head.headers.push((name.to_string(), value.to_string()));
    }

    fn headers_sent(&self) -> bool {
        self.head_sent
    }

    async fn write(&mut self, chunk: Chunk) -> Result<(), SinkClosed> {
        if self.ended {
            return Err(SinkClosed);
        }
        self.send_head().await?;
        self.tx
            .send(ResponseFrame::Data(chunk))
            .await
            .map_err(|_| SinkClosed)
    }

    async fn end(&mut self) -> Result<(), SinkClosed> {
        if self.ended {
            return Ok(());
        }
        self.send_head().await?;
        self.ended = true;
        self.tx
            .send(ResponseFrame::End)
            .await
            .map_err(|_| SinkClosed)
    }

    fn disconnected(&self) -> Disconnected {
        let tx = self.tx.clone();
        Box::pin(async move { tx.closed().await })
    }
}

/// A client-side timeout elapsed before the response finished
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("timeout of {}ms exceeded", .after.as_millis())]
pub struct ClientTimeout {
    pub after: Duration,
}

/// Everything a client read from one response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceivedResponse {
    pub head: Option<ResponseHead>,
    pub chunks: Vec<Chunk>,
    /// False when the transport closed without an end frame
    pub ended: bool,
}

impl ReceivedResponse {
    pub fn status(&self) -> Option<u16> {
        self.head.as_ref().map(|head| head.status)
    }

    pub fn body(&self) -> Vec<u8> {
        self.chunks
            .iter()
            .flat_map(|chunk| chunk.as_bytes().iter().copied())
            .collect()
    }

    /// Body split into lines, without the newlines
    pub fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.body())
            .lines()
            .map(str::to_string)
            .collect()
    }
}

/// Client side of a response
pub struct ResponseBody {
    rx: mpsc::Receiver<ResponseFrame>,
}

impl ResponseBody {
    /// Next frame, or `None` once the server side is gone
    pub async fn next_frame(&mut self) -> Option<ResponseFrame> {
        self.rx.recv().await
    }

    /// Read until the end frame or until the transport closes
    pub async fn read_to_end(mut self) -> ReceivedResponse {
        let mut response = ReceivedResponse::default();
        while let Some(frame) = self.next_frame().await {
            match frame {
                ResponseFrame::Head(head) => response.head = Some(head),
                ResponseFrame::Data(chunk) => response.chunks.push(chunk),
                ResponseFrame::End => {
                    response.ended = true;
                    break;
                }
            }
        }
        response
    }

    /// Like [`read_to_end`](Self::read_to_end), but give up after `timeout`.
    ///
    /// Giving up drops the body, which the server observes as a disconnect.
    pub async fn read_with_timeout(self, timeout: Duration) -> Result<ReceivedResponse, ClientTimeout> {
        tokio::time::timeout(timeout, self.read_to_end())
            .await
            .map_err(|_| ClientTimeout { after: timeout })
    }

    /// Hang up without reading further
    pub fn abort(self) {
        log::debug!("Client aborted response");
    }
}
