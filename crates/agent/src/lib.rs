//! Model providers for research generation.
//!
//! - `gemini` talks to the Gemini `generateContent` API and is the primary
//!   provider.
//! - `openai` talks to any OpenAI-compatible `/chat/completions` gateway
//!   (LiteLLM and similar proxies).
//! - `provider` picks one from `LlmConfig` and falls back to Gemini when the
//!   secondary provider is selected but not configured.
//!
//! Both clients map HTTP failures onto `IntegrationError` so the workflow's
//! retry policy can tell overload from rejection.

pub mod gemini;
pub mod openai;
pub mod provider;

pub use gemini::GeminiClient;
pub use openai::OpenAiCompatibleClient;
pub use provider::build_generator;
