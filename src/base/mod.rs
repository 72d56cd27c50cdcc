//! Core types and error definitions.

mod error;

pub use error::HttpError;
