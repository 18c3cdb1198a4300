pub mod agent;
pub mod config;
pub mod error;
pub mod llm;
pub mod memory;
pub mod testing;

pub mod prelude {
    pub use crate::agent::{AgentConfig, Conversation, MemoryAgent, StepOutcome};
    pub use crate::config::AppConfig;
    pub use crate::error::Result;
    pub use crate::llm::types::{Message, Role};
    pub use crate::llm::{ChatModel, Embedder, OpenAiChatModel, OpenAiEmbeddings};
    pub use crate::memory::{FactExtractor, InMemoryStore, Namespace, Store, StoreItem};
}
