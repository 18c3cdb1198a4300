//! 带长期记忆的对话 Agent
//!
//! 每次 [`MemoryAgent::step`] 是一个单步状态机：
//!
//! ```text
//! Start → ExtractMaybe → Retrieve → Generate → End
//! ```
//!
//! - **ExtractMaybe**：最新用户消息命中触发词时提取事实，以新 UUID 写入 Store
//! - **Retrieve**：以最新用户消息为查询做相似度检索，拼成用户信息块
//! - **Generate**：`[system(用户信息)] + 历史` 交给对话模型
//!
//! 不做重试；任何一步失败都直接返回 `Err`。

use crate::error::{EchoError, Result};
use crate::llm::ChatModel;
use crate::llm::types::{Message, Role};
use crate::memory::extract::FactExtractor;
use crate::memory::store::{FACT_FIELD, Namespace, Store, StoreItem};
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

mod config;
pub mod prompt;
pub mod session;

pub use config::AgentConfig;
pub use session::Conversation;

/// 单步执行的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPhase {
    Start,
    ExtractMaybe,
    Retrieve,
    Generate,
    End,
}

impl fmt::Display for StepPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepPhase::Start => "start",
            StepPhase::ExtractMaybe => "extract_maybe",
            StepPhase::Retrieve => "retrieve",
            StepPhase::Generate => "generate",
            StepPhase::End => "end",
        };
        f.write_str(s)
    }
}

/// 本轮写入的记忆
#[derive(Debug, Clone, PartialEq)]
pub struct StoredFact {
    pub key: String,
    pub fact: String,
}

/// 单步执行结果
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub reply: Message,
    pub stored: Option<StoredFact>,
    /// 本轮检索到的记录（按相关度降序）
    pub retrieved: Vec<StoreItem>,
    /// 实际发给模型的 system 提示词
    pub system_prompt: String,
}

pub struct MemoryAgent {
    config: AgentConfig,
    model: Arc<dyn ChatModel>,
    store: Arc<dyn Store>,
    extractor: FactExtractor,
}

impl MemoryAgent {
    /// 使用默认的中英双语提取规则
    pub fn new(config: AgentConfig, model: Arc<dyn ChatModel>, store: Arc<dyn Store>) -> Self {
        Self {
            config,
            model,
            store,
            extractor: FactExtractor::default(),
        }
    }

    pub fn with_extractor(mut self, extractor: FactExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn namespace(&self, user_id: &str) -> Namespace {
        Namespace::new(self.config.collection.as_str(), user_id)
    }

    /// 处理一轮对话。`history` 必须以本轮的用户消息结尾。
    pub async fn step(&self, user_id: &str, history: &[Message]) -> Result<StepOutcome> {
        self.enter(StepPhase::Start, user_id);
        let latest = match history.last() {
            Some(m) if m.role == Role::User => m.content.as_str(),
            _ => {
                return Err(EchoError::Other(
                    "对话历史必须以用户消息结尾".to_string(),
                ));
            }
        };
        let namespace = self.namespace(user_id);

        self.enter(StepPhase::ExtractMaybe, user_id);
        let stored = self.extract_maybe(&namespace, latest).await?;

        self.enter(StepPhase::Retrieve, user_id);
        let retrieved = self.store.search(&namespace, latest).await?;
        let info = prompt::info_block(&retrieved);
        let system_prompt = prompt::render_system_prompt(&self.config.system_template, &info);
        debug!(namespace = %namespace, hits = retrieved.len(), "检索到用户信息");

        self.enter(StepPhase::Generate, user_id);
        let messages = prompt::augment(system_prompt.clone(), history);
        let reply = self.model.invoke(&messages).await?;

        self.enter(StepPhase::End, user_id);
        Ok(StepOutcome {
            reply,
            stored,
            retrieved,
            system_prompt,
        })
    }

    async fn extract_maybe(&self, namespace: &Namespace, text: &str) -> Result<Option<StoredFact>> {
        let Some(fact) = self.extractor.extract(text) else {
            return Ok(None);
        };
        let key = uuid::Uuid::new_v4().to_string();
        self.store
            .put(namespace, &key, json!({ FACT_FIELD: fact }))
            .await?;
        info!(namespace = %namespace, key = %key, fact = %fact, "写入记忆");
        Ok(Some(StoredFact { key, fact }))
    }

    fn enter(&self, phase: StepPhase, user_id: &str) {
        debug!(agent = %self.config.agent_name, user_id, %phase, "step");
    }
}
