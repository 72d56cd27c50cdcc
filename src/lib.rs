//! # asyncagent
//!
//! An async HTTP/1.1 client engine built directly on stream sockets.
//!
//! `asyncagent` does its own wire work instead of delegating to a prebuilt
//! HTTP client: request serialization, incremental response parsing
//! (content-length and chunked framing), connection reuse with FIFO
//! pipelining, content-encoding negotiation with streaming decompression,
//! and cookie propagation.
//!
//! ## Features
//!
//! - **Pipelined connections**: one persistent connection per authority,
//!   responses delivered strictly in submission order
//! - **Incremental parsing**: a pure state machine over raw bytes, correct
//!   under any input fragmentation
//! - **Streaming bodies**: buffered responses or per-fragment delivery,
//!   with optional sink-to-file draining
//! - **Compression**: gzip and deflate negotiation, decoded on the fly
//! - **Cookies**: authority-keyed jar with JSON file persistence
//! - **Resilient teardown**: a peer disconnect mid-request completes as a
//!   synthetic `500 Socket Disconnected` response, never a panic
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use asyncagent::agent::{Agent, RequestOptions};
//!
//! #[tokio::main]
//! async fn main() {
//!     let agent = Agent::builder().user_agent("asyncagent/0.1").build();
//!     let stream = agent
//!         .get("http://example.com/", RequestOptions::default())
//!         .unwrap();
//!     let response = stream.response().await.unwrap();
//!     println!("Status: {}", response.status_line());
//! }
//! ```
//!
//! ## Modules
//!
//! - [`base`] - Core error definitions
//! - [`url`] - URL parsing, resolution, and percent-encoding
//! - [`message`] - Headers, requests, responses, and wire serialization
//! - [`connection`] - Transports, the response parser, and the pipelined
//!   connection actor
//! - [`agent`] - High-level client: preparation, caching, decompression
//! - [`cookies`] - Cookie jar with file persistence

pub mod agent;
pub mod base;
pub mod connection;
pub mod cookies;
pub mod message;
pub mod url;

pub use agent::{Agent, AgentBuilder, RequestOptions};
pub use base::HttpError;
pub use connection::{Connection, ResponseEvent, ResponseStream, StreamingMode};
pub use cookies::CookieJar;
pub use message::{Body, Headers, Method, Request, Response};
pub use url::{Authority, Url};
