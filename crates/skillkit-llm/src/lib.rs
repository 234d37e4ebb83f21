//! # skillkit-llm
//!
//! Abstraction layer over chat-completion endpoints. Skills talk to an
//! [`LlmProvider`]; production uses [`OpenAiProvider`] pointed at an
//! OpenAI-compatible API (NVIDIA NIM by default), tests use [`MockProvider`].

pub mod mock;
pub mod openai;
pub mod provider;

pub use mock::{MockProvider, MockResponse};
pub use openai::OpenAiProvider;
pub use provider::{LlmProvider, LlmRequest, LlmResponse, StopReason, StreamChunk, Usage};
