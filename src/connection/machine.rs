use bytes::{Buf, Bytes, BytesMut};

use crate::base::HttpError;
use crate::message::Response;

/// How response body bytes are delivered to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamingMode {
    /// Accumulate the full body; the completed response carries it.
    #[default]
    Buffered,
    /// Forward each body fragment as a data event; the completed response
    /// carries an empty body.
    Streaming,
}

/// Per-request parse context, fixed at submission time.
#[derive(Debug, Clone, Copy)]
pub struct RequestContext {
    /// HEAD responses never carry a body, whatever the headers claim.
    pub head: bool,
    pub mode: StreamingMode,
}

/// Events produced by the parser as bytes are consumed.
#[derive(Debug)]
pub enum MachineEvent {
    /// The response head arrived; body (if any) follows.
    Header(Response),
    /// A body fragment, streaming mode only.
    Data(Bytes),
    /// The response is complete. In buffered mode it carries the body.
    Complete(Response),
    /// Unrecoverable protocol error; the connection must be torn down.
    Error(HttpError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkState {
    /// Body is length-delimited (or no body yet).
    None,
    /// Between chunks, scanning for the next hex size line.
    AwaitingSize,
    /// A size line was consumed; waiting for `size` data bytes plus CRLF.
    AwaitingData(usize),
}

/// Incremental HTTP/1.1 response parser.
///
/// Pure state machine over an input buffer: the transport appends raw bytes
/// with [`feed`](ResponseMachine::feed) and dispatches the returned events.
/// At most one response is in progress at a time; bytes beyond the current
/// response stay buffered until the next [`begin`](ResponseMachine::begin),
/// which is what makes pipelined responses in a single burst come out in
/// submission order.
pub struct ResponseMachine {
    buffer: BytesMut,
    ctx: Option<RequestContext>,
    current: Option<Response>,
    chunk: ChunkState,
    content_length: usize,
    bytes_read: usize,
}

impl Default for ResponseMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseMachine {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(8192),
            ctx: None,
            current: None,
            chunk: ChunkState::None,
            content_length: 0,
            bytes_read: 0,
        }
    }

    /// No response in progress and none expected.
    pub fn is_idle(&self) -> bool {
        self.ctx.is_none()
    }

    /// Start expecting the response for the next pipelined request.
    /// Call [`drain`](ResponseMachine::drain) afterwards: its bytes may
    /// already be buffered.
    pub fn begin(&mut self, ctx: RequestContext) {
        debug_assert!(self.ctx.is_none(), "response already in progress");
        self.ctx = Some(ctx);
        self.current = None;
        self.chunk = ChunkState::None;
        self.content_length = 0;
        self.bytes_read = 0;
    }

    /// Append transport bytes and parse as far as possible.
    pub fn feed(&mut self, data: &[u8]) -> Vec<MachineEvent> {
        self.buffer.extend_from_slice(data);
        self.run()
    }

    /// Parse whatever is already buffered (after `begin`).
    pub fn drain(&mut self) -> Vec<MachineEvent> {
        self.run()
    }

    /// The peer closed the transport. A response in flight becomes a
    /// synthetic `500` completion; an idle close produces nothing.
    pub fn close(&mut self) -> Vec<MachineEvent> {
        let mut events = Vec::new();
        if self.ctx.is_some() {
            tracing::debug!("peer closed mid-response, synthesizing 500");
            events.push(MachineEvent::Complete(synthetic_disconnect()));
            self.reset();
        }
        events
    }

    fn reset(&mut self) {
        self.ctx = None;
        self.current = None;
        self.chunk = ChunkState::None;
        self.content_length = 0;
        self.bytes_read = 0;
    }

    fn run(&mut self) -> Vec<MachineEvent> {
        let mut events = Vec::new();
        loop {
            let Some(ctx) = self.ctx else { break };

            if self.current.is_none() {
                // Scanning for a complete header block.
                let Some(idx) = find(&self.buffer, b"\r\n\r\n") else {
                    break;
                };
                let head = self.buffer.split_to(idx);
                self.buffer.advance(4);
                let head = match std::str::from_utf8(&head) {
                    Ok(s) => s,
                    Err(_) => {
                        events.push(MachineEvent::Error(HttpError::InvalidResponse(
                            "non-utf8 response head".into(),
                        )));
                        self.reset();
                        break;
                    }
                };
                let response = match Response::parse_head(head) {
                    Ok(r) => r,
                    Err(e) => {
                        events.push(MachineEvent::Error(e));
                        self.reset();
                        break;
                    }
                };
                events.push(MachineEvent::Header(response.clone()));

                let chunked = response.is_chunked();
                let length = response.content_length();
                if ctx.head || (!chunked && length.is_none()) {
                    // No body possible: complete immediately.
                    events.push(MachineEvent::Complete(response));
                    self.reset();
                    continue;
                }
                self.content_length = length.unwrap_or(0);
                self.chunk = if chunked {
                    ChunkState::AwaitingSize
                } else {
                    ChunkState::None
                };
                self.current = Some(response);
                continue;
            }

            // Body parsing.
            match self.chunk {
                ChunkState::None => {
                    let remaining = self.content_length - self.bytes_read;
                    let take = remaining.min(self.buffer.len());
                    if take > 0 {
                        let data = self.buffer.split_to(take).freeze();
                        self.bytes_read += take;
                        self.deliver(data, ctx, &mut events);
                    }
                    if self.bytes_read >= self.content_length {
                        self.complete(&mut events);
                        continue;
                    }
                    break;
                }
                ChunkState::AwaitingSize => {
                    let Some(idx) = find(&self.buffer, b"\r\n") else {
                        break;
                    };
                    let line = self.buffer.split_to(idx);
                    self.buffer.advance(2);
                    let size = std::str::from_utf8(&line)
                        .ok()
                        .map(|s| s.split(';').next().unwrap_or(s).trim())
                        .and_then(|s| usize::from_str_radix(s, 16).ok());
                    match size {
                        Some(size) => self.chunk = ChunkState::AwaitingData(size),
                        None => {
                            events.push(MachineEvent::Error(HttpError::InvalidResponse(
                                "bad chunk size line".into(),
                            )));
                            self.reset();
                            break;
                        }
                    }
                }
                ChunkState::AwaitingData(size) => {
                    // Chunk data plus its trailing CRLF must be buffered.
                    if self.buffer.len() < size + 2 {
                        break;
                    }
                    let data = self.buffer.split_to(size).freeze();
                    self.buffer.advance(2);
                    self.chunk = ChunkState::AwaitingSize;
                    if size == 0 {
                        self.complete(&mut events);
                    } else {
                        self.deliver(data, ctx, &mut events);
                    }
                }
            }
        }
        events
    }

    fn deliver(&mut self, data: Bytes, ctx: RequestContext, events: &mut Vec<MachineEvent>) {
        match ctx.mode {
            StreamingMode::Streaming => events.push(MachineEvent::Data(data)),
            StreamingMode::Buffered => {
                if let Some(response) = self.current.as_mut() {
                    response.body.extend_from_slice(&data);
                }
            }
        }
    }

    fn complete(&mut self, events: &mut Vec<MachineEvent>) {
        if let Some(response) = self.current.take() {
            events.push(MachineEvent::Complete(response));
        }
        self.reset();
    }
}

/// The response delivered when the peer disconnects mid-request.
pub fn synthetic_disconnect() -> Response {
    Response::new("500", "Socket Disconnected")
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffered() -> RequestContext {
        RequestContext {
            head: false,
            mode: StreamingMode::Buffered,
        }
    }

    fn streaming() -> RequestContext {
        RequestContext {
            head: false,
            mode: StreamingMode::Streaming,
        }
    }

    fn complete_of(events: &[MachineEvent]) -> Option<&Response> {
        events.iter().find_map(|e| match e {
            MachineEvent::Complete(r) => Some(r),
            _ => None,
        })
    }

    #[test]
    fn content_length_body_buffered() {
        let mut machine = ResponseMachine::new();
        machine.begin(buffered());
        let events = machine.feed(b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello");
        let response = complete_of(&events).expect("complete");
        assert_eq!(response.body, b"hello");
        assert!(machine.is_idle());
    }

    #[test]
    fn head_response_completes_at_header() {
        let mut machine = ResponseMachine::new();
        machine.begin(RequestContext {
            head: true,
            mode: StreamingMode::Buffered,
        });
        let events = machine.feed(b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\n");
        assert!(complete_of(&events).is_some());
        assert!(machine.is_idle());
    }

    #[test]
    fn no_framing_headers_completes_at_header() {
        let mut machine = ResponseMachine::new();
        machine.begin(buffered());
        let events = machine.feed(b"HTTP/1.1 204 No Content\r\n\r\n");
        assert!(complete_of(&events).is_some());
    }

    #[test]
    fn zero_content_length_completes_immediately() {
        let mut machine = ResponseMachine::new();
        machine.begin(buffered());
        let events = machine.feed(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n");
        let response = complete_of(&events).expect("complete");
        assert!(response.body.is_empty());
    }

    #[test]
    fn streaming_emits_data_not_body() {
        let mut machine = ResponseMachine::new();
        machine.begin(streaming());
        let events = machine.feed(b"HTTP/1.1 200 OK\r\nContent-Length: 4\r\n\r\nWiki");
        let data: Vec<u8> = events
            .iter()
            .filter_map(|e| match e {
                MachineEvent::Data(d) => Some(d.to_vec()),
                _ => None,
            })
            .flatten()
            .collect();
        assert_eq!(data, b"Wiki");
        assert!(complete_of(&events).expect("complete").body.is_empty());
    }

    #[test]
    fn close_mid_response_synthesizes_500() {
        let mut machine = ResponseMachine::new();
        machine.begin(buffered());
        machine.feed(b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\nfragment");
        let events = machine.close();
        let response = complete_of(&events).expect("complete");
        assert_eq!(response.status_code, "500");
        assert_eq!(response.status_text, "Socket Disconnected");
    }

    #[test]
    fn close_while_idle_is_silent() {
        let mut machine = ResponseMachine::new();
        assert!(machine.close().is_empty());
    }

    #[test]
    fn bad_chunk_size_is_an_error() {
        let mut machine = ResponseMachine::new();
        machine.begin(buffered());
        let events =
            machine.feed(b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\nnot-hex\r\n");
        assert!(events
            .iter()
            .any(|e| matches!(e, MachineEvent::Error(HttpError::InvalidResponse(_)))));
    }

    #[test]
    fn chunk_extension_is_ignored() {
        let mut machine = ResponseMachine::new();
        machine.begin(buffered());
        let events = machine
            .feed(b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n4;ext=1\r\nWiki\r\n0\r\n\r\n");
        assert_eq!(complete_of(&events).expect("complete").body, b"Wiki");
    }
}
