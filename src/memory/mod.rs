//! 长期记忆
//!
//! | 模块 | 作用 |
//! |------|------|
//! | [`store`] | 按 `(collection, user_id)` 隔离的记录存储与相似度检索 |
//! | [`extract`] | 从用户消息中提取要记住的事实 |
//!
//! ```rust,no_run
//! use echo_memory::memory::{FactExtractor, InMemoryStore, Namespace, Store};
//!
//! # async fn example() -> echo_memory::error::Result<()> {
//! let store = InMemoryStore::new();
//! let ns = Namespace::memories("user123");
//! if let Some(fact) = FactExtractor::default().extract("remember my name is Barry") {
//!     let key = uuid::Uuid::new_v4().to_string();
//!     store.put(&ns, &key, serde_json::json!({ "data": fact })).await?;
//! }
//! let hits = store.search(&ns, "what is my name").await?;
//! # Ok(())
//! # }
//! ```

pub mod extract;
pub mod store;

pub use extract::{ExtractionRule, FactExtractor, FnRule, Marker, MarkerRule};
pub use store::{InMemoryStore, Namespace, Store, StoreItem};
