//! 确定性的 Mock Embedder：把分词结果哈希到固定维度的词袋向量。
//! 共享词越多，余弦相似度越高，足以验证向量检索的排序。

use crate::error::Result;
use crate::llm::Embedder;
use crate::memory::store::tokenize;
use async_trait::async_trait;
use std::sync::Mutex;

pub struct MockEmbedder {
    dims: usize,
    reported_dims: usize,
    calls: Mutex<usize>,
}

impl MockEmbedder {
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            reported_dims: dims,
            calls: Mutex::new(0),
        }
    }

    /// 让 `dimensions()` 与实际向量长度不一致，用于测试维度校验
    pub fn with_reported_dimensions(mut self, dims: usize) -> Self {
        self.reported_dims = dims;
        self
    }

    /// 已嵌入的文本条数
    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0; self.dims];
        if self.dims == 0 {
            return v;
        }
        for token in tokenize(text) {
            v[fnv1a(&token) as usize % self.dims] += 1.0;
        }
        v
    }
}

fn fnv1a(s: &str) -> u64 {
    s.bytes().fold(0xcbf29ce484222325, |hash, b| {
        (hash ^ b as u64).wrapping_mul(0x100000001b3)
    })
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        *self.calls.lock().unwrap() += texts.len();
        Ok(texts.iter().map(|t| self.vectorize(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.reported_dims
    }
}
