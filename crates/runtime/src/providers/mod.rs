//! LLM provider adapters.
//!
//! Each provider implements the backend trait for its specific API.

mod openai;

pub use openai::{
    ChatCompletionsConfig, DEFAULT_API_KEY, DEFAULT_BASE_URL, DEFAULT_MODEL, DEFAULT_TEMPERATURE,
    OpenAiBackend,
};
