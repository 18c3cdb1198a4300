//! 测试基础设施
//!
//! 在不依赖真实 LLM / Embedding 服务的情况下测试 echo-memory 各组件。
//!
//! | 类型 | 用途 |
//! |------|------|
//! | [`MockChatModel`] | 替代真实对话模型，按顺序返回预设回复并记录每次收到的消息 |
//! | [`MockEmbedder`] | 确定性的词袋向量，用于测试 Store 的向量检索 |
//! | [`serve_once`] | 本地一次性 HTTP 服务，用于测试 OpenAI 兼容客户端的请求与解析 |
//!
//! ```rust
//! use echo_memory::agent::{AgentConfig, Conversation, MemoryAgent};
//! use echo_memory::memory::InMemoryStore;
//! use echo_memory::testing::MockChatModel;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let model = Arc::new(MockChatModel::new().with_response("好的，我记住了"));
//! let agent = MemoryAgent::new(AgentConfig::default(), model.clone(), Arc::new(InMemoryStore::new()));
//!
//! let mut conv = Conversation::new("user123");
//! let outcome = conv.send(&agent, "请记住我的名字是Barry").await.unwrap();
//! assert_eq!(outcome.stored.unwrap().fact, "用户的名字是Barry");
//! assert_eq!(model.call_count(), 1);
//! # }
//! ```

mod mock_embedder;
mod mock_http;
mod mock_llm;

pub use mock_embedder::MockEmbedder;
pub use mock_http::serve_once;
pub use mock_llm::MockChatModel;
