//! Decision oracle: wire types and the retrying client
//!
//! One request/response call per cycle: a text prompt plus the encoded
//! perception frame go out, free-form text presumed to contain one JSON
//! command comes back. No streaming.

pub mod chat;
pub mod client;

pub use chat::{ChatMessage, ChatRequest, RawResponse, ResponseMessage};
pub use client::{DecisionTransport, HttpTransport, OracleClient};
