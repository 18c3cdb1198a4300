//! 长期记忆 Store
//!
//! 以 `namespace / key / value` 三元组组织数据，namespace 为
//! `(collection, user_id)`（如 `("memories", "user123")`），不同用户的记忆互不可见。
//!
//! 记录只增不改：同一命名空间下重复的 key 会被拒绝，没有删除与过期。
//!
//! ## 检索方式
//!
//! - 注入 [`Embedder`] 时按余弦相似度排序（向量索引）
//! - 未注入时退化为关键词匹配，中文按相邻二字切分
//!
//! 两种方式都返回命名空间内的全部记录（按相关度降序），不设阈值；
//! 可通过 [`InMemoryStore::with_limit`] 限制条数。
//!
//! ```rust,no_run
//! use echo_memory::memory::store::{InMemoryStore, Namespace, Store};
//!
//! # async fn example() -> echo_memory::error::Result<()> {
//! let store = InMemoryStore::new();
//! let ns = Namespace::memories("user123");
//! store.put(&ns, "k1", serde_json::json!({"data": "用户喜欢编程"})).await?;
//! let items = store.search(&ns, "编程").await?;
//! # Ok(())
//! # }
//! ```

use crate::error::{MemoryError, Result};
use crate::llm::Embedder;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;
use tracing::debug;

/// 默认的记忆集合名
pub const MEMORIES_COLLECTION: &str = "memories";

/// 记录中保存事实文本的字段
pub const FACT_FIELD: &str = "data";

// ── Namespace ────────────────────────────────────────────────────────────────

/// 记忆命名空间：`(collection, user_id)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Namespace {
    pub collection: String,
    pub user_id: String,
}

impl Namespace {
    pub fn new(collection: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            user_id: user_id.into(),
        }
    }

    /// `("memories", user_id)`
    pub fn memories(user_id: impl Into<String>) -> Self {
        Self::new(MEMORIES_COLLECTION, user_id)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.user_id)
    }
}

// ── StoreItem ────────────────────────────────────────────────────────────────

/// Store 中的单条记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreItem {
    pub namespace: Namespace,
    /// 条目唯一键
    pub key: String,
    /// 任意 JSON 值，记忆事实为 `{"data": "..."}`
    pub value: Value,
    /// 创建时间（Unix 秒）
    pub created_at: u64,
    /// 检索相关度分数（仅 `search` 返回时非 None）
    pub score: Option<f32>,
}

impl StoreItem {
    fn new(namespace: Namespace, key: String, value: Value) -> Self {
        Self {
            namespace,
            key,
            value,
            created_at: now_secs(),
            score: None,
        }
    }

    /// `value["data"]` 中的事实文本
    pub fn fact(&self) -> Option<&str> {
        self.value.get(FACT_FIELD).and_then(Value::as_str)
    }
}

// ── Store trait ───────────────────────────────────────────────────────────────

/// 长期记忆的统一存储接口
#[async_trait]
pub trait Store: Send + Sync {
    /// 在命名空间下新增一条记录；key 已存在时返回 [`MemoryError::DuplicateKey`]
    async fn put(&self, namespace: &Namespace, key: &str, value: Value) -> Result<()>;

    /// 按 key 精确获取
    async fn get(&self, namespace: &Namespace, key: &str) -> Result<Option<StoreItem>>;

    /// 相似度检索，按相关度降序返回
    async fn search(&self, namespace: &Namespace, query: &str) -> Result<Vec<StoreItem>>;

    /// 命名空间内的全部记录，按写入顺序
    async fn list(&self, namespace: &Namespace) -> Result<Vec<StoreItem>>;

    /// 所有非空命名空间
    async fn list_namespaces(&self) -> Result<Vec<Namespace>>;
}

// ── InMemoryStore ─────────────────────────────────────────────────────────────

struct Entry {
    item: StoreItem,
    vector: Option<Vec<f32>>,
}

/// 进程内存 Store，不持久化
pub struct InMemoryStore {
    data: RwLock<HashMap<Namespace, Vec<Entry>>>,
    embedder: Option<Arc<dyn Embedder>>,
    limit: Option<usize>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// 关键词检索模式
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
            embedder: None,
            limit: None,
        }
    }

    /// 向量检索模式，写入与查询时都会调用 `embedder`
    pub fn with_embedder(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder: Some(embedder),
            ..Self::new()
        }
    }

    /// 限制 `search` 返回条数
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn is_vector_indexed(&self) -> bool {
        self.embedder.is_some()
    }

    async fn embed_checked(&self, embedder: &dyn Embedder, text: &str) -> Result<Vec<f32>> {
        let vector = embedder.embed_one(text).await?;
        let expected = embedder.dimensions();
        if vector.len() != expected {
            return Err(MemoryError::DimensionMismatch {
                expected,
                actual: vector.len(),
            }
            .into());
        }
        Ok(vector)
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn put(&self, namespace: &Namespace, key: &str, value: Value) -> Result<()> {
        // 先算向量再加锁，避免持锁等待网络
        let vector = match &self.embedder {
            Some(embedder) => {
                let text = value_to_searchable_text(&value);
                Some(self.embed_checked(embedder.as_ref(), &text).await?)
            }
            None => None,
        };

        let mut data = self.data.write().await;
        let bucket = data.entry(namespace.clone()).or_default();
        if bucket.iter().any(|e| e.item.key == key) {
            return Err(MemoryError::DuplicateKey {
                namespace: namespace.to_string(),
                key: key.to_string(),
            }
            .into());
        }
        bucket.push(Entry {
            item: StoreItem::new(namespace.clone(), key.to_string(), value),
            vector,
        });
        debug!(namespace = %namespace, key, total = bucket.len(), "Store 写入");
        Ok(())
    }

    async fn get(&self, namespace: &Namespace, key: &str) -> Result<Option<StoreItem>> {
        let data = self.data.read().await;
        Ok(data
            .get(namespace)
            .and_then(|b| b.iter().find(|e| e.item.key == key))
            .map(|e| e.item.clone()))
    }

    async fn search(&self, namespace: &Namespace, query: &str) -> Result<Vec<StoreItem>> {
        // 空命名空间不调用 embedding 接口
        let has_records = self
            .data
            .read()
            .await
            .get(namespace)
            .is_some_and(|bucket| !bucket.is_empty());
        if !has_records {
            return Ok(vec![]);
        }

        let query_vector = match &self.embedder {
            Some(embedder) => Some(self.embed_checked(embedder.as_ref(), query).await?),
            None => None,
        };

        let data = self.data.read().await;
        let Some(bucket) = data.get(namespace) else {
            return Ok(vec![]);
        };

        let mut scored: Vec<(f32, StoreItem)> = match &query_vector {
            Some(qv) => bucket
                .iter()
                .map(|e| {
                    let score = e
                        .vector
                        .as_deref()
                        .map(|v| cosine_similarity(qv, v))
                        .unwrap_or(0.0);
                    (score, e.item.clone())
                })
                .collect(),
            None => {
                let keywords = tokenize(query);
                bucket
                    .iter()
                    .map(|e| (value_relevance_score(&e.item.value, &keywords), e.item.clone()))
                    .collect()
            }
        };
        // 稳定排序：同分按写入顺序
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        debug!(namespace = %namespace, query, hits = scored.len(), "Store 检索");

        let limit = self.limit.unwrap_or(usize::MAX);
        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(s, mut item)| {
                item.score = Some(s);
                item
            })
            .collect())
    }

    async fn list(&self, namespace: &Namespace) -> Result<Vec<StoreItem>> {
        let data = self.data.read().await;
        Ok(data
            .get(namespace)
            .map(|b| b.iter().map(|e| e.item.clone()).collect())
            .unwrap_or_default())
    }

    async fn list_namespaces(&self) -> Result<Vec<Namespace>> {
        let data = self.data.read().await;
        let mut namespaces: Vec<Namespace> = data
            .iter()
            .filter(|(_, b)| !b.is_empty())
            .map(|(ns, _)| ns.clone())
            .collect();
        namespaces.sort();
        Ok(namespaces)
    }
}

// ── 私有工具函数 ──────────────────────────────────────────────────────────────

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{4E00}'..='\u{9FFF}'
        | '\u{3400}'..='\u{4DBF}'
        | '\u{F900}'..='\u{FAFF}'
        | '\u{3040}'..='\u{30FF}'
        | '\u{AC00}'..='\u{D7AF}')
}

/// 拉丁字母按词切分（长度 > 1），连续的中日韩字符按相邻二字切分
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = HashSet::new();
    let segments = text
        .split(|c: char| c.is_whitespace() || "，。！？、；：,.!?;:'\"（）()".contains(c))
        .filter(|s| !s.is_empty());

    for segment in segments {
        let mut latin = String::new();
        let mut cjk: Vec<char> = Vec::new();
        for c in segment.chars() {
            if is_cjk(c) {
                flush_latin(&mut latin, &mut tokens);
                cjk.push(c);
            } else {
                flush_cjk(&mut cjk, &mut tokens);
                latin.push(c);
            }
        }
        flush_latin(&mut latin, &mut tokens);
        flush_cjk(&mut cjk, &mut tokens);
    }
    tokens.into_iter().collect()
}

fn flush_latin(buf: &mut String, tokens: &mut HashSet<String>) {
    if buf.chars().count() > 1 {
        tokens.insert(buf.to_lowercase());
    }
    buf.clear();
}

fn flush_cjk(buf: &mut Vec<char>, tokens: &mut HashSet<String>) {
    match buf.len() {
        0 => {}
        1 => {
            tokens.insert(buf[0].to_string());
        }
        _ => {
            for pair in buf.windows(2) {
                tokens.insert(pair.iter().collect());
            }
        }
    }
    buf.clear();
}

/// 计算 JSON Value 与关键词的匹配度（匹配关键词数 / 总关键词数）
fn value_relevance_score(value: &Value, keywords: &[String]) -> f32 {
    if keywords.is_empty() {
        return 1.0;
    }
    let text = value_to_searchable_text(value).to_lowercase();
    let matched = keywords
        .iter()
        .filter(|kw| text.contains(kw.as_str()))
        .count();
    matched as f32 / keywords.len() as f32
}

fn value_to_searchable_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(arr) => arr
            .iter()
            .map(value_to_searchable_text)
            .collect::<Vec<_>>()
            .join(" "),
        Value::Object(map) => map
            .values()
            .map(value_to_searchable_text)
            .collect::<Vec<_>>()
            .join(" "),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EchoError;
    use crate::testing::MockEmbedder;
    use serde_json::json;

    fn fact(text: &str) -> Value {
        json!({ FACT_FIELD: text })
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let store = InMemoryStore::new();
        let ns = Namespace::memories("user123");
        store.put(&ns, "k1", fact("用户喜欢编程")).await.unwrap();

        let item = store.get(&ns, "k1").await.unwrap().unwrap();
        assert_eq!(item.fact(), Some("用户喜欢编程"));
        assert_eq!(item.namespace, ns);
        assert!(store.get(&ns, "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_records_are_immutable() {
        let store = InMemoryStore::new();
        let ns = Namespace::memories("u");
        store.put(&ns, "k1", fact("a")).await.unwrap();

        let err = store.put(&ns, "k1", fact("b")).await.unwrap_err();
        assert!(matches!(err, EchoError::Memory(MemoryError::DuplicateKey { .. })));
        assert_eq!(store.get(&ns, "k1").await.unwrap().unwrap().fact(), Some("a"));
    }

    #[tokio::test]
    async fn test_namespace_isolation() {
        let store = InMemoryStore::new();
        let alice = Namespace::memories("alice");
        let bob = Namespace::memories("bob");
        store.put(&alice, "k", fact("user's name is Alice")).await.unwrap();

        assert!(store.search(&bob, "name").await.unwrap().is_empty());
        assert_eq!(store.search(&alice, "name").await.unwrap().len(), 1);
        // 同一 key 可在不同命名空间各自存在
        store.put(&bob, "k", fact("user's name is Bob")).await.unwrap();
        assert_eq!(store.list_namespaces().await.unwrap(), vec![alice, bob]);
    }

    #[tokio::test]
    async fn test_keyword_search_ranks_without_threshold() {
        let store = InMemoryStore::new();
        let ns = Namespace::memories("u");
        store.put(&ns, "1", fact("user likes programming")).await.unwrap();
        store.put(&ns, "2", fact("user's name is Barry")).await.unwrap();

        let hits = store.search(&ns, "what is my name").await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].fact(), Some("user's name is Barry"));
        assert!(hits[0].score.unwrap() > hits[1].score.unwrap());
        assert_eq!(hits[1].score, Some(0.0));
    }

    #[tokio::test]
    async fn test_keyword_search_chinese_bigrams() {
        let store = InMemoryStore::new();
        let ns = Namespace::memories("u");
        store.put(&ns, "1", fact("用户喜欢编程")).await.unwrap();
        store.put(&ns, "2", fact("用户的名字是Barry")).await.unwrap();

        let hits = store.search(&ns, "我叫什么名字？").await.unwrap();
        assert_eq!(hits[0].fact(), Some("用户的名字是Barry"));
    }

    #[tokio::test]
    async fn test_search_limit() {
        let store = InMemoryStore::new().with_limit(1);
        let ns = Namespace::memories("u");
        for i in 0..3 {
            store.put(&ns, &i.to_string(), fact(&format!("fact {i}"))).await.unwrap();
        }
        assert_eq!(store.search(&ns, "fact").await.unwrap().len(), 1);
        assert_eq!(store.list(&ns).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_vector_search_orders_by_cosine() {
        let embedder = Arc::new(MockEmbedder::new(64));
        let store = InMemoryStore::with_embedder(embedder.clone());
        assert!(store.is_vector_indexed());
        let ns = Namespace::memories("u");
        store.put(&ns, "1", fact("user likes programming")).await.unwrap();
        store.put(&ns, "2", fact("user's name is Barry")).await.unwrap();

        let hits = store.search(&ns, "name Barry").await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].fact(), Some("user's name is Barry"));
        // 两次写入 + 一次查询
        assert_eq!(embedder.call_count(), 3);
    }

    #[tokio::test]
    async fn test_vector_search_on_empty_namespace_skips_embedding() {
        let embedder = Arc::new(MockEmbedder::new(64));
        let store = InMemoryStore::with_embedder(embedder.clone());
        let hits = store.search(&Namespace::memories("u"), "what is my name").await.unwrap();
        assert!(hits.is_empty());
        assert_eq!(embedder.call_count(), 0);

        store.put(&Namespace::memories("other"), "k", fact("x")).await.unwrap();
        assert!(store.search(&Namespace::memories("u"), "x").await.unwrap().is_empty());
        assert_eq!(embedder.call_count(), 1);
    }

    #[tokio::test]
    async fn test_vector_dimension_mismatch() {
        let embedder = Arc::new(MockEmbedder::new(8).with_reported_dimensions(16));
        let store = InMemoryStore::with_embedder(embedder);
        let err = store
            .put(&Namespace::memories("u"), "k", fact("x"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EchoError::Memory(MemoryError::DimensionMismatch {
                expected: 16,
                actual: 8
            })
        ));
    }

    #[test]
    fn test_tokenize_mixed() {
        let mut tokens = tokenize("请记住我喜欢 Rust, OK a");
        tokens.sort();
        assert!(tokens.contains(&"rust".to_string()));
        assert!(tokens.contains(&"ok".to_string()));
        assert!(tokens.contains(&"喜欢".to_string()));
        assert!(!tokens.contains(&"a".to_string()));
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }
}
