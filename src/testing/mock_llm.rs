//! Mock 对话模型，用于在不发起真实 HTTP 请求的情况下测试注入了 [`ChatModel`] 的组件。
//!
//! ```rust
//! use echo_memory::testing::MockChatModel;
//! use echo_memory::llm::ChatModel;
//! use echo_memory::llm::types::Message;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let mock = MockChatModel::new()
//!     .with_response("第一次响应")
//!     .with_response("第二次响应");
//!
//! let r1 = mock.invoke(&[Message::user("hi")]).await.unwrap();
//! assert_eq!(r1.content, "第一次响应");
//! assert_eq!(mock.call_count(), 1);
//! # }
//! ```

use crate::error::{EchoError, LlmError, Result};
use crate::llm::ChatModel;
use crate::llm::types::Message;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

enum MockResponse {
    Content(String),
    Err(EchoError),
}

/// 可脚本化的 Mock 对话模型。
///
/// 按顺序返回预设的响应；队列耗尽后返回 `EmptyResponse` 错误。
pub struct MockChatModel {
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
    /// 每次调用时收到的 messages 列表，按顺序记录
    calls: Arc<Mutex<Vec<Vec<Message>>>>,
}

impl Default for MockChatModel {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChatModel {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// 追加一条成功响应文本
    pub fn with_response(self, text: impl Into<String>) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(MockResponse::Content(text.into()));
        self
    }

    /// 批量追加多条成功响应
    pub fn with_responses(self, texts: impl IntoIterator<Item = impl Into<String>>) -> Self {
        {
            let mut q = self.responses.lock().unwrap();
            for t in texts {
                q.push_back(MockResponse::Content(t.into()));
            }
        }
        self
    }

    pub fn with_error(self, err: EchoError) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(MockResponse::Err(err));
        self
    }

    pub fn with_network_error(self, msg: impl Into<String>) -> Self {
        self.with_error(EchoError::Llm(LlmError::NetworkError(msg.into())))
    }

    /// 追加一条限流错误（429）
    pub fn with_rate_limit_error(self) -> Self {
        self.with_error(EchoError::Llm(LlmError::ApiError {
            status: 429,
            message: "Too Many Requests".to_string(),
        }))
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// 最后一次调用时传入的 messages（若从未调用则返回 `None`）
    pub fn last_messages(&self) -> Option<Vec<Message>> {
        self.calls.lock().unwrap().last().cloned()
    }

    pub fn all_calls(&self) -> Vec<Vec<Message>> {
        self.calls.lock().unwrap().clone()
    }

    /// 剩余未消费的预设响应数量
    pub fn remaining(&self) -> usize {
        self.responses.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatModel for MockChatModel {
    async fn invoke(&self, messages: &[Message]) -> Result<Message> {
        self.calls.lock().unwrap().push(messages.to_vec());

        match self.responses.lock().unwrap().pop_front() {
            Some(MockResponse::Content(text)) => Ok(Message::assistant(text)),
            Some(MockResponse::Err(e)) => Err(e),
            None => Err(EchoError::Llm(LlmError::EmptyResponse)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_sequence_then_exhausted() {
        let mock = MockChatModel::new()
            .with_response("one")
            .with_rate_limit_error();
        assert_eq!(mock.remaining(), 2);

        assert_eq!(mock.invoke(&[Message::user("a")]).await.unwrap().content, "one");
        assert!(matches!(
            mock.invoke(&[Message::user("b")]).await,
            Err(EchoError::Llm(LlmError::ApiError { status: 429, .. }))
        ));
        assert!(matches!(
            mock.invoke(&[Message::user("c")]).await,
            Err(EchoError::Llm(LlmError::EmptyResponse))
        ));
        assert_eq!(mock.call_count(), 3);
        assert_eq!(mock.all_calls()[1], vec![Message::user("b")]);
    }
}
