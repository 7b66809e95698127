//! Gemini API integration.

pub mod client;
pub mod types;

pub use client::GeminiService;
pub use types::{GeminiError, GenerationConfig};
