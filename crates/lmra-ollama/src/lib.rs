//! Client for a local Ollama model runner.
//!
//! [`ModelService`] is the seam the gateway programs against;
//! [`OllamaClient`] implements it over HTTP.

pub mod client;
pub mod error;
pub mod stream;
pub mod types;

pub use client::{ModelService, OllamaClient, OllamaConfig};
pub use error::OllamaError;
pub use stream::{decode_ndjson, ChunkStream};
pub use types::{ChatChunk, ChatMessage, ChatResponse, GenerateResponse};
