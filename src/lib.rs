#![deny(missing_docs)]

//! Core library for the DocuExplore PDF chat service.

/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Document upload and readiness polling.
pub mod documents;
/// URL helpers shared by the REST adapters.
pub mod endpoint;
/// Gemini REST adapter for documents and generation.
pub mod gemini;
/// Conversation and title generation on top of a hosted model.
pub mod generation;
/// Structured logging and tracing setup.
pub mod logging;
/// Session activity counters.
pub mod metrics;
/// Related-article web search.
pub mod search;
/// Per-user session orchestration.
pub mod session;
