//! One persistent connection to one authority.
//!
//! A [`Connection`] owns a single byte stream and services a FIFO pipeline:
//! requests are written in submission order and their responses are parsed
//! and delivered strictly in that same order (the HTTP/1.1 persistent
//! connection guarantee). All per-connection state lives in one driver task;
//! callers talk to it through channels, so no locking is involved.
//!
//! A peer disconnect while a request is in flight is never surfaced as an
//! error: the request completes with a synthetic `500 Socket Disconnected`
//! response, and callers branch on status like they would for any failure.

mod machine;
mod transport;

pub use machine::{MachineEvent, RequestContext, ResponseMachine, StreamingMode};
pub use transport::ConnectionStream;

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::base::HttpError;
use crate::message::{Method, Request, Response};
use crate::url::Authority;

/// Events delivered on a per-request response stream.
#[derive(Debug)]
pub enum ResponseEvent {
    /// Response headers arrived.
    Header(Response),
    /// A body fragment (streaming mode only).
    Data(Bytes),
    /// Body finished (streaming mode only; precedes `Complete`).
    End,
    /// The response is complete. In buffered mode it carries the body.
    Complete(Response),
    /// The request failed mid-protocol.
    Error(HttpError),
}

/// The per-request event stream returned by [`Connection::submit`] and
/// [`Agent::request`](crate::agent::Agent::request).
pub struct ResponseStream {
    rx: mpsc::UnboundedReceiver<ResponseEvent>,
}

impl ResponseStream {
    pub(crate) fn channel() -> (mpsc::UnboundedSender<ResponseEvent>, ResponseStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, ResponseStream { rx })
    }

    /// Next event, or `None` once the stream is finished.
    pub async fn next_event(&mut self) -> Option<ResponseEvent> {
        self.rx.recv().await
    }

    /// Drain the stream and return the completed response, discarding
    /// intermediate header/data events.
    pub async fn response(mut self) -> Result<Response, HttpError> {
        while let Some(event) = self.rx.recv().await {
            match event {
                ResponseEvent::Complete(response) => return Ok(response),
                ResponseEvent::Error(e) => return Err(e),
                _ => {}
            }
        }
        Err(HttpError::InvalidResponse(
            "response stream ended without completion".into(),
        ))
    }
}

impl futures::Stream for ResponseStream {
    type Item = ResponseEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

struct Submission {
    wire: Vec<u8>,
    ctx: RequestContext,
    events: mpsc::UnboundedSender<ResponseEvent>,
}

/// Handle to a pipelined connection. Cheap to clone; all clones feed the
/// same driver task.
#[derive(Clone)]
pub struct Connection {
    authority: Authority,
    tx: mpsc::UnboundedSender<Submission>,
}

impl Connection {
    /// Open a connection handle. The transport is dialed lazily when the
    /// first request is submitted. `on_close` runs exactly once, when the
    /// driver ends, so the owning cache can evict this entry.
    pub fn open(authority: Authority, on_close: impl FnOnce() + Send + 'static) -> Connection {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(drive(authority.clone(), rx, Box::new(on_close)));
        Connection { authority, tx }
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    /// The driver is still accepting submissions.
    pub fn is_alive(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Enqueue a request. Returns this request's own event stream; events
    /// arrive in submission order relative to other requests on this
    /// connection.
    pub fn submit(&self, request: &Request, mode: StreamingMode) -> ResponseStream {
        let (events, stream) = ResponseStream::channel();
        let submission = Submission {
            wire: request.to_wire(),
            ctx: RequestContext {
                head: request.method == Method::Head,
                mode,
            },
            events: events.clone(),
        };
        if self.tx.send(submission).is_err() {
            // Driver already gone: same shape as a peer disconnect.
            let _ = events.send(ResponseEvent::Complete(machine::synthetic_disconnect()));
        }
        stream
    }
}

/// Forward machine events to the in-flight submission. Returns `true` when
/// a protocol error occurred and the connection must be torn down.
fn dispatch(current: &mut Option<Submission>, events: Vec<MachineEvent>) -> bool {
    for event in events {
        match event {
            MachineEvent::Header(r) => {
                if let Some(sub) = current.as_ref() {
                    let _ = sub.events.send(ResponseEvent::Header(r));
                }
            }
            MachineEvent::Data(d) => {
                if let Some(sub) = current.as_ref() {
                    let _ = sub.events.send(ResponseEvent::Data(d));
                }
            }
            MachineEvent::Complete(r) => {
                if let Some(sub) = current.take() {
                    if sub.ctx.mode == StreamingMode::Streaming {
                        let _ = sub.events.send(ResponseEvent::End);
                    }
                    let _ = sub.events.send(ResponseEvent::Complete(r));
                }
            }
            MachineEvent::Error(e) => {
                if let Some(sub) = current.take() {
                    let _ = sub.events.send(ResponseEvent::Error(e));
                }
                return true;
            }
        }
    }
    false
}

/// Fail everything still pending with the synthetic disconnect response and
/// shut the inbox, so every submitted request observes a terminal event.
fn shutdown(
    queue: &mut VecDeque<Submission>,
    inbox: &mut mpsc::UnboundedReceiver<Submission>,
) {
    inbox.close();
    for sub in queue.drain(..) {
        let _ = sub
            .events
            .send(ResponseEvent::Complete(machine::synthetic_disconnect()));
    }
    while let Ok(sub) = inbox.try_recv() {
        let _ = sub
            .events
            .send(ResponseEvent::Complete(machine::synthetic_disconnect()));
    }
}

async fn drive(
    authority: Authority,
    mut inbox: mpsc::UnboundedReceiver<Submission>,
    on_close: Box<dyn FnOnce() + Send>,
) {
    // Connect lazily, once the first request arrives.
    let Some(first) = inbox.recv().await else {
        on_close();
        return;
    };

    let mut stream = match ConnectionStream::connect(&authority).await {
        Ok(s) => s,
        Err(e) => {
            tracing::debug!(authority = %authority, error = %e, "connect failed");
            on_close();
            inbox.close();
            let message = e.to_string();
            let _ = first
                .events
                .send(ResponseEvent::Error(HttpError::Connect(message.clone())));
            while let Ok(sub) = inbox.try_recv() {
                let _ = sub
                    .events
                    .send(ResponseEvent::Error(HttpError::Connect(message.clone())));
            }
            return;
        }
    };
    tracing::debug!(authority = %authority, "connected");

    let mut machine = ResponseMachine::new();
    // Requests are written as they arrive; `current` is the one whose
    // response is being parsed, `pending` the rest of the pipeline.
    let mut pending: VecDeque<Submission> = VecDeque::new();
    let mut inbox_open = true;
    let mut buf = [0u8; 8192];

    if let Err(e) = stream.write_all(&first.wire).await {
        tracing::debug!(authority = %authority, error = %e, "write failed");
        let _ = first
            .events
            .send(ResponseEvent::Complete(machine::synthetic_disconnect()));
        shutdown(&mut pending, &mut inbox);
        on_close();
        return;
    }
    let _ = stream.flush().await;
    machine.begin(first.ctx);
    let mut current = Some(first);

    loop {
        // Completed responses may leave pipelined bytes buffered; begin
        // the next expected response and re-parse them.
        if current.is_none() {
            if let Some(next) = pending.pop_front() {
                machine.begin(next.ctx);
                current = Some(next);
                let events = machine.drain();
                if dispatch(&mut current, events) {
                    shutdown(&mut pending, &mut inbox);
                    on_close();
                    return;
                }
                continue;
            }
            if !inbox_open {
                // Nothing in flight and no handle can submit again.
                on_close();
                return;
            }
        }

        tokio::select! {
            maybe = inbox.recv(), if inbox_open => match maybe {
                Some(sub) => {
                    if let Err(e) = stream.write_all(&sub.wire).await {
                        tracing::debug!(authority = %authority, error = %e, "write failed");
                        let _ = sub
                            .events
                            .send(ResponseEvent::Complete(machine::synthetic_disconnect()));
                        if let Some(cur) = current.take() {
                            let _ = cur
                                .events
                                .send(ResponseEvent::Complete(machine::synthetic_disconnect()));
                        }
                        shutdown(&mut pending, &mut inbox);
                        on_close();
                        return;
                    }
                    let _ = stream.flush().await;
                    if current.is_some() {
                        pending.push_back(sub);
                    } else {
                        machine.begin(sub.ctx);
                        current = Some(sub);
                    }
                }
                None => inbox_open = false,
            },
            result = stream.read(&mut buf) => match result {
                Ok(0) | Err(_) => {
                    tracing::debug!(authority = %authority, "transport closed");
                    let events = machine.close();
                    if let Some(sub) = current.take() {
                        for event in events {
                            if let MachineEvent::Complete(r) = event {
                                let _ = sub.events.send(ResponseEvent::Complete(r));
                            }
                        }
                    }
                    shutdown(&mut pending, &mut inbox);
                    on_close();
                    return;
                }
                Ok(n) => {
                    let events = machine.feed(&buf[..n]);
                    if dispatch(&mut current, events) {
                        shutdown(&mut pending, &mut inbox);
                        on_close();
                        return;
                    }
                }
            },
        }
    }
}
