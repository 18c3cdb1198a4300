//! 单用户会话：按顺序累积消息，逐轮交给 [`MemoryAgent`]

use crate::agent::{MemoryAgent, StepOutcome};
use crate::error::Result;
use crate::llm::types::Message;

/// 消息只追加不修改；本轮失败时用户消息仍保留在历史中
#[derive(Debug, Clone)]
pub struct Conversation {
    user_id: String,
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            messages: Vec::new(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// 追加用户消息并执行一步，成功后追加 assistant 回复
    pub async fn send(
        &mut self,
        agent: &MemoryAgent,
        input: impl Into<String>,
    ) -> Result<StepOutcome> {
        self.messages.push(Message::user(input));
        let outcome = agent.step(&self.user_id, &self.messages).await?;
        self.messages.push(outcome.reply.clone());
        Ok(outcome)
    }
}
