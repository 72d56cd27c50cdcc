//! The public client.
//!
//! An [`Agent`] validates and prepares requests, keeps one pipelined
//! [`Connection`] per authority, injects and captures cookies, negotiates
//! compression and decodes bodies, then hands the caller a
//! [`ResponseStream`] of events.

mod codec;

pub use codec::{decode_all, negotiate, Codec, StreamingDecoder};

use std::path::PathBuf;
use std::sync::{Arc, Weak};

use bytes::Bytes;
use dashmap::DashMap;
use tokio::io::AsyncWriteExt;

use crate::base::HttpError;
use crate::connection::{Connection, ResponseEvent, ResponseStream, StreamingMode};
use crate::cookies::CookieJar;
use crate::message::{Body, Method, Request};
use crate::url::{Authority, Url};

/// Per-call options.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Skip cookie injection and capture for this request.
    pub no_cookies: bool,
    /// Deliver body fragments as `Data` events instead of buffering them
    /// into the completed response.
    pub streaming: bool,
    /// Write the (decoded) body to this file instead of delivering it.
    pub sink: Option<PathBuf>,
}

/// Configures and builds an [`Agent`].
pub struct AgentBuilder {
    user_agent: Option<String>,
    cookie_jar: Option<Arc<CookieJar>>,
    allowed_schemes: Vec<String>,
    codecs: Vec<Codec>,
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentBuilder {
    pub fn new() -> AgentBuilder {
        AgentBuilder {
            user_agent: None,
            cookie_jar: None,
            allowed_schemes: vec!["http".to_string(), "https".to_string()],
            codecs: vec![Codec::Gzip, Codec::Deflate],
        }
    }

    pub fn user_agent(mut self, value: impl Into<String>) -> Self {
        self.user_agent = Some(value.into());
        self
    }

    pub fn cookie_jar(mut self, jar: Arc<CookieJar>) -> Self {
        self.cookie_jar = Some(jar);
        self
    }

    pub fn allowed_schemes(mut self, schemes: Vec<String>) -> Self {
        self.allowed_schemes = schemes;
        self
    }

    pub fn codecs(mut self, codecs: Vec<Codec>) -> Self {
        self.codecs = codecs;
        self
    }

    pub fn build(self) -> Agent {
        Agent {
            inner: Arc::new(AgentInner {
                user_agent: self.user_agent,
                cookie_jar: self.cookie_jar,
                allowed_schemes: self.allowed_schemes,
                codecs: self.codecs,
                connections: DashMap::new(),
            }),
        }
    }
}

struct AgentInner {
    user_agent: Option<String>,
    cookie_jar: Option<Arc<CookieJar>>,
    allowed_schemes: Vec<String>,
    codecs: Vec<Codec>,
    connections: DashMap<String, Connection>,
}

/// HTTP client with per-authority connection reuse. Cheap to clone.
#[derive(Clone)]
pub struct Agent {
    inner: Arc<AgentInner>,
}

impl Default for Agent {
    fn default() -> Self {
        AgentBuilder::new().build()
    }
}

impl Agent {
    pub fn new() -> Agent {
        Agent::default()
    }

    pub fn builder() -> AgentBuilder {
        AgentBuilder::new()
    }

    pub fn cookie_jar(&self) -> Option<&Arc<CookieJar>> {
        self.inner.cookie_jar.as_ref()
    }

    /// Validate the target and fill in everything the wire needs: cookies,
    /// form encoding, and default headers (only where absent).
    pub fn prepare_request(
        &self,
        request: &mut Request,
        options: &RequestOptions,
    ) -> Result<Authority, HttpError> {
        let authority = request
            .target
            .authority()
            .ok_or_else(|| HttpError::InvalidTarget("target lacks scheme or host".to_string()))?;
        if !self
            .inner
            .allowed_schemes
            .iter()
            .any(|s| s.eq_ignore_ascii_case(&authority.scheme))
        {
            return Err(HttpError::InvalidTarget(format!(
                "scheme not allowed: {}",
                authority.scheme
            )));
        }

        if !options.no_cookies {
            if let Some(jar) = &self.inner.cookie_jar {
                if let Some(value) = jar.header_value(&authority.to_string()) {
                    request.headers.set("Cookie", value);
                }
            }
        }

        if let Body::Form(_) = &request.body {
            request.body = Body::Bytes(request.body.encode());
            if !request.headers.contains("content-type") {
                request
                    .headers
                    .set("Content-Type", "application/x-www-form-urlencoded");
            }
        }

        if !request.headers.contains("host") {
            request.headers.set("Host", authority.host.clone());
        }
        if !request.body.is_empty() && !request.headers.contains("content-length") {
            request
                .headers
                .set("Content-Length", request.body.encode().len().to_string());
        }
        if !request.headers.contains("connection") {
            request.headers.set("Connection", "Keep-Alive");
        }
        if let Some(user_agent) = &self.inner.user_agent {
            if !request.headers.contains("user-agent") {
                request.headers.set("User-Agent", user_agent.clone());
            }
        }
        if !self.inner.codecs.is_empty() && !request.headers.contains("accept-encoding") {
            let tokens: Vec<&str> = self.inner.codecs.iter().map(Codec::token).collect();
            request.headers.set("Accept-Encoding", tokens.join(", "));
        }

        Ok(authority)
    }

    /// Reuse a live connection to this authority, or open a fresh one. The
    /// driver evicts its own entry when the transport closes.
    fn connection(&self, authority: &Authority) -> Connection {
        let key = authority.to_string();
        if let Some(existing) = self.inner.connections.get(&key) {
            if existing.is_alive() {
                return existing.clone();
            }
        }
        let weak: Weak<AgentInner> = Arc::downgrade(&self.inner);
        let evict_key = key.clone();
        let connection = Connection::open(authority.clone(), move || {
            if let Some(inner) = weak.upgrade() {
                inner.connections.remove(&evict_key);
            }
        });
        self.inner.connections.insert(key, connection.clone());
        connection
    }

    /// Prepare and submit a request. Validation failures return
    /// synchronously; everything later arrives on the stream.
    pub fn request(
        &self,
        mut request: Request,
        options: RequestOptions,
    ) -> Result<ResponseStream, HttpError> {
        let authority = self.prepare_request(&mut request, &options)?;
        tracing::debug!(
            method = %request.method,
            target = %request.target.request_target(),
            authority = %authority,
            "request"
        );

        // The wire runs in streaming mode whenever body bytes must be
        // processed before completion (caller streaming or file sink).
        let wire_mode = if options.streaming || options.sink.is_some() {
            StreamingMode::Streaming
        } else {
            StreamingMode::Buffered
        };

        let connection = self.connection(&authority);
        let upstream = connection.submit(&request, wire_mode);

        let (tx, stream) = ResponseStream::channel();
        let jar = if options.no_cookies {
            None
        } else {
            self.inner.cookie_jar.clone()
        };
        let relay = Relay {
            upstream,
            tx,
            authority_key: authority.to_string(),
            jar,
            codecs: self.inner.codecs.clone(),
            head: request.method == Method::Head,
            streaming_wire: wire_mode == StreamingMode::Streaming,
            sink: options.sink,
        };
        tokio::spawn(relay.run());

        Ok(stream)
    }

    pub fn get(&self, url: &str, options: RequestOptions) -> Result<ResponseStream, HttpError> {
        let request = Request::new(Method::Get, Url::parse(url)?);
        self.request(request, options)
    }

    pub fn head(&self, url: &str, options: RequestOptions) -> Result<ResponseStream, HttpError> {
        let request = Request::new(Method::Head, Url::parse(url)?);
        self.request(request, options)
    }

    pub fn post(
        &self,
        url: &str,
        body: Body,
        options: RequestOptions,
    ) -> Result<ResponseStream, HttpError> {
        let mut request = Request::new(Method::Post, Url::parse(url)?);
        request.body = body;
        self.request(request, options)
    }
}

/// Sits between the connection's raw events and the caller: captures
/// cookies at header arrival, decodes the body, and optionally drains it
/// to a file.
struct Relay {
    upstream: ResponseStream,
    tx: tokio::sync::mpsc::UnboundedSender<ResponseEvent>,
    authority_key: String,
    jar: Option<Arc<CookieJar>>,
    codecs: Vec<Codec>,
    head: bool,
    streaming_wire: bool,
    sink: Option<PathBuf>,
}

impl Relay {
    async fn run(mut self) {
        let mut decoder: Option<StreamingDecoder> = None;
        let mut buffered_codec: Option<Codec> = None;
        let mut sink_file: Option<tokio::fs::File> = None;

        while let Some(event) = self.upstream.next_event().await {
            match event {
                ResponseEvent::Header(response) => {
                    if let Some(jar) = &self.jar {
                        if let Some(values) = response.headers.get_all("set-cookie") {
                            for value in values {
                                jar.absorb_header(&self.authority_key, value);
                            }
                        }
                    }
                    if !self.head {
                        match negotiate(&response, &self.codecs) {
                            Ok(Some(codec)) if self.streaming_wire => {
                                decoder = Some(StreamingDecoder::new(codec));
                            }
                            Ok(Some(codec)) => buffered_codec = Some(codec),
                            Ok(None) => {}
                            Err(e) => {
                                let _ = self.tx.send(ResponseEvent::Error(e));
                                return;
                            }
                        }
                    }
                    if let Some(path) = &self.sink {
                        match tokio::fs::File::create(path).await {
                            Ok(file) => sink_file = Some(file),
                            Err(e) => {
                                let _ = self.tx.send(ResponseEvent::Error(HttpError::Io(e)));
                                return;
                            }
                        }
                    }
                    let _ = self.tx.send(ResponseEvent::Header(response));
                }
                ResponseEvent::Data(data) => {
                    let plain = match &mut decoder {
                        Some(decoder) => match decoder.push(&data) {
                            Ok(bytes) => bytes,
                            Err(e) => {
                                let _ = self.tx.send(ResponseEvent::Error(e));
                                return;
                            }
                        },
                        None => data.to_vec(),
                    };
                    if plain.is_empty() {
                        continue;
                    }
                    match &mut sink_file {
                        Some(file) => {
                            if let Err(e) = file.write_all(&plain).await {
                                let _ = self.tx.send(ResponseEvent::Error(HttpError::Io(e)));
                                return;
                            }
                        }
                        None => {
                            let _ = self.tx.send(ResponseEvent::Data(Bytes::from(plain)));
                        }
                    }
                }
                ResponseEvent::End => {
                    if let Some(decoder) = decoder.take() {
                        match decoder.finish() {
                            Ok(tail) if !tail.is_empty() => match &mut sink_file {
                                Some(file) => {
                                    if let Err(e) = file.write_all(&tail).await {
                                        let _ =
                                            self.tx.send(ResponseEvent::Error(HttpError::Io(e)));
                                        return;
                                    }
                                }
                                None => {
                                    let _ = self.tx.send(ResponseEvent::Data(Bytes::from(tail)));
                                }
                            },
                            Ok(_) => {}
                            Err(e) => {
                                let _ = self.tx.send(ResponseEvent::Error(e));
                                return;
                            }
                        }
                    }
                    if let Some(file) = &mut sink_file {
                        if let Err(e) = file.flush().await {
                            let _ = self.tx.send(ResponseEvent::Error(HttpError::Io(e)));
                            return;
                        }
                    }
                    let _ = self.tx.send(ResponseEvent::End);
                }
                ResponseEvent::Complete(mut response) => {
                    if let Some(codec) = buffered_codec.take() {
                        if !response.body.is_empty() {
                            match decode_all(codec, &response.body) {
                                Ok(body) => response.body = body,
                                Err(e) => {
                                    let _ = self.tx.send(ResponseEvent::Error(e));
                                    return;
                                }
                            }
                        }
                    }
                    let _ = self.tx.send(ResponseEvent::Complete(response));
                    return;
                }
                ResponseEvent::Error(e) => {
                    let _ = self.tx.send(ResponseEvent::Error(e));
                    return;
                }
            }
        }
    }
}
