//! Completion and embedding provider abstractions.
//!
//! The core abstraction is the [`LlmBackend`] trait. Extraction stages only
//! ever talk to a [`SharedBackend`], so the same pipeline runs against a
//! hosted model, a local OpenAI-compatible server, or the scripted
//! [`MockBackend`] in tests.
//!
//! ```text
//! ┌──────────────────────────────┐
//! │  LlmBackend trait            │
//! │  - complete() -> Response    │
//! └──────────────────────────────┘
//!            │
//!     ┌──────┴───────┐
//!     ▼              ▼
//! ┌──────────┐   ┌──────────┐
//! │  OpenAI  │   │   Mock   │
//! │  Groq    │   └──────────┘
//! │  Ollama  │
//! └──────────┘
//! ```

pub mod backend;
pub mod embeddings;
pub mod error;
pub mod openai;
pub mod types;

pub use backend::{LlmBackend, MockBackend, MockResponse, SharedBackend, with_retry};
pub use embeddings::{
    BoundedEmbedder, DEFAULT_EMBED_TIMEOUT, Embedder, EmbedderSpec, MockEmbedder, OpenAiEmbedder,
    OpenAiEmbedderConfig, SharedEmbedder, build_embedder, cosine_similarity,
};
pub use error::{LlmError, RateLimitInfo, ResponseValidationError, Result};
pub use openai::{OpenAiBackend, OpenAiConfig, create_shared_backend};
pub use types::{
    CompletionRequest, CompletionResponse, Content, ContentBlock, Message, ResponseFormat, Role,
    StopReason, ToolChoice, ToolDefinition, ToolResultBlock, ToolUseBlock, Usage,
};
