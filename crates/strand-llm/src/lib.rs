pub mod catalog;
pub mod prompt;
pub mod provider;
pub mod sse;

pub use catalog::{ModelSpec, find_model};
pub use prompt::{Persona, ensure_system_prompt};
pub use provider::{LlmClient, ProviderConfig};
pub use sse::StreamEvent;
