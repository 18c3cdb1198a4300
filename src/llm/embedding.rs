//! Embedding 接口
//!
//! [`Embedder`] 为 Store 的向量索引提供文本向量；[`OpenAiEmbeddings`] 适配任意
//! 提供 `/embeddings` 接口的服务（OpenAI、DashScope、Ollama 等）。

use crate::config::AppConfig;
use crate::error::{LlmError, Result};
use crate::llm::assemble_req_header;
use crate::llm::client::post;
use crate::llm::types::{EmbeddingRequest, EmbeddingResponse};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use tracing::debug;

#[async_trait]
pub trait Embedder: Send + Sync {
    /// 批量计算向量，返回顺序与输入一致
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(&[text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::EmptyResponse.into())
    }

    /// 向量维度
    fn dimensions(&self) -> usize;
}

pub struct OpenAiEmbeddings {
    client: Arc<Client>,
    url: String,
    api_key: String,
    model: String,
    dims: usize,
}

impl OpenAiEmbeddings {
    pub fn new(
        client: Arc<Client>,
        url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        dims: usize,
    ) -> Self {
        Self {
            client,
            url: url.into(),
            api_key: api_key.into(),
            model: model.into(),
            dims,
        }
    }

    /// 未配置 `EMBEDDING_NAME` 时返回 `None`
    pub fn from_config(client: Arc<Client>, config: &AppConfig) -> Option<Self> {
        let model = config.embedding_model.as_ref()?;
        Some(Self::new(
            client,
            config.embeddings_url(),
            config.api_key.clone(),
            model.clone(),
            config.embedding_dims,
        ))
    }
}

#[async_trait]
impl Embedder for OpenAiEmbeddings {
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let body = EmbeddingRequest {
            model: &self.model,
            input: texts,
            dimensions: Some(self.dims),
        };
        let header_map = assemble_req_header(&self.api_key)?;
        let mut response: EmbeddingResponse =
            post(&self.client, &body, header_map, &self.url).await?;

        if response.data.len() != texts.len() {
            return Err(LlmError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                response.data.len()
            ))
            .into());
        }
        response.data.sort_by_key(|d| d.index);

        debug!(
            model = %self.model,
            count = response.data.len(),
            dims = response.data.first().map(|d| d.embedding.len()).unwrap_or(0),
            "embedding 完成"
        );
        Ok(response.data.into_iter().map(|d| d.embedding).collect())
    }

    fn dimensions(&self) -> usize {
        self.dims
    }
}
