mod client;
pub mod embedding;
pub mod types;

use crate::config::AppConfig;
use crate::error::{EchoError, LlmError, Result};
use crate::llm::client::post;
use crate::llm::types::{ChatCompletionRequest, ChatCompletionResponse, Message};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::HeaderMap;
use std::sync::Arc;
use tracing::debug;

pub use embedding::{Embedder, OpenAiEmbeddings};

pub fn assemble_req_header(api_key: &str) -> Result<HeaderMap> {
    let mut header_map = HeaderMap::new();

    header_map.insert(
        "Authorization",
        format!("Bearer {}", api_key)
            .parse()
            .map_err(|e| EchoError::Other(format!("Invalid Authorization header: {}", e)))?,
    );
    header_map.insert(
        "Content-Type",
        "application/json"
            .parse()
            .map_err(|e| EchoError::Other(format!("Invalid Content-Type header: {}", e)))?,
    );
    Ok(header_map)
}

/// 对话模型接口：输入完整消息列表，返回一条 assistant 消息
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn invoke(&self, messages: &[Message]) -> Result<Message>;
}

/// 基于 OpenAI 兼容 `/chat/completions` 接口的实现
pub struct OpenAiChatModel {
    client: Arc<Client>,
    url: String,
    api_key: String,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl OpenAiChatModel {
    pub fn new(
        client: Arc<Client>,
        url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            url: url.into(),
            api_key: api_key.into(),
            model: model.into(),
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn from_config(client: Arc<Client>, config: &AppConfig) -> Self {
        Self::new(
            client,
            config.chat_completions_url(),
            config.api_key.clone(),
            config.model_name.clone(),
        )
        .temperature(config.temperature)
        .max_tokens(config.max_tokens)
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn invoke(&self, messages: &[Message]) -> Result<Message> {
        let request_body = ChatCompletionRequest {
            model: self.model.clone(),
            messages: messages.to_vec(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream: Some(false),
        };

        let header_map = assemble_req_header(&self.api_key)?;
        let response: ChatCompletionResponse =
            post(&self.client, &request_body, header_map, &self.url).await?;

        debug!(
            model = %self.model,
            total_tokens = ?response.usage.as_ref().and_then(|u| u.total_tokens),
            "chat completion 返回"
        );

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(Message::assistant)
            .ok_or_else(|| LlmError::EmptyResponse.into())
    }
}
