//! Thin HTTP layer over the orchestration engine.
//!
//! Routing, `X-User` identity extraction and response envelopes only; all
//! semantics live in `skiff-engine`. The router is generic over an
//! [`Orchestrator`] handler so it can be mounted over the in-memory store
//! in tests and over the cluster store in `skiff-apid`.

mod error;
mod handler;
mod http;

pub use error::ApiError;
pub use handler::Orchestrator;
pub use http::HttpApi;
