pub mod config;
#[cfg(feature = "ollama")]
pub mod ollama;
pub mod provider;
pub mod types;

pub use config::OllamaConfig;
pub use provider::{ModelError, ModelProvider, ModelResult};
pub use types::{
    ChatMessage, ChatRequest, ChatResponse, MessageRole, ModelInfo, ResponseFormat, Usage,
};

#[cfg(feature = "ollama")]
pub use ollama::OllamaProvider;

pub mod prelude {
    pub use crate::config::*;
    pub use crate::provider::*;
    pub use crate::types::*;

    #[cfg(feature = "ollama")]
    pub use crate::ollama::*;
}
