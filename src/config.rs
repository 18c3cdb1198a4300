//! 运行配置加载
//!
//! 从环境变量读取配置，缺省值与校验规则：
//! ```text
//! OPENAI_API_KEY=sk-...                       # 必填
//! OPENAI_BASE_URL=https://api.openai.com/v1   # 末尾的 `/` 会被去掉
//! MODEL_NAME=gpt-3.5-turbo
//! EMBEDDING_NAME=text-embedding-3-small       # 不设置则退化为关键词检索
//! EMBEDDING_DIMS=1024
//! TEMPERATURE=0.7                             # 0 ~ 2
//! MAX_TOKENS=1000                             # > 0
//! LANGCHAIN_TRACING_V2=false                  # true / 1 / yes
//! MEMORY_USER_ID=user123
//! ```
//! 数值项解析失败或越界时打印警告并回退到默认值，不会中断启动。

use crate::error::{ConfigError, Result};
use dotenv::from_path;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::warn;

pub const ENV_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_BASE_URL: &str = "OPENAI_BASE_URL";
pub const ENV_MODEL_NAME: &str = "MODEL_NAME";
pub const ENV_EMBEDDING_NAME: &str = "EMBEDDING_NAME";
pub const ENV_EMBEDDING_DIMS: &str = "EMBEDDING_DIMS";
pub const ENV_TEMPERATURE: &str = "TEMPERATURE";
pub const ENV_MAX_TOKENS: &str = "MAX_TOKENS";
pub const ENV_TRACING: &str = "LANGCHAIN_TRACING_V2";
pub const ENV_USER_ID: &str = "MEMORY_USER_ID";

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL_NAME: &str = "gpt-3.5-turbo";
pub const DEFAULT_EMBEDDING_DIMS: usize = 1024;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 1000;
pub const DEFAULT_USER_ID: &str = "user123";

/// 按优先级查找的 `.env` 文件，只加载第一个存在的
pub const ENV_FILES: [&str; 3] = [".env.local", ".env.development", ".env"];

/// 聊天与记忆所需的全部配置
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub api_key: String,
    /// OpenAI 兼容接口根路径，如 `https://api.openai.com/v1`
    pub base_url: String,
    pub model_name: String,
    /// Embedding 模型名；`None` 时 Store 使用关键词检索
    pub embedding_model: Option<String>,
    pub embedding_dims: usize,
    pub temperature: f32,
    pub max_tokens: u32,
    pub tracing_enabled: bool,
    /// CLI 默认使用的用户标识
    pub user_id: String,
}

impl AppConfig {
    /// 从进程环境变量读取；`.env` 需先通过 [`load_env_file`] 加载
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 从任意 key/value 来源构建配置，便于测试注入
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = get(ENV_API_KEY)
            .ok_or_else(|| ConfigError::MissingField(ENV_API_KEY.to_string()))?;

        let base_url = get(ENV_BASE_URL)
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let model_name = get(ENV_MODEL_NAME).unwrap_or_else(|| DEFAULT_MODEL_NAME.to_string());
        let embedding_model = get(ENV_EMBEDDING_NAME);

        let embedding_dims = parse_or_default(
            ENV_EMBEDDING_DIMS,
            get(ENV_EMBEDDING_DIMS),
            DEFAULT_EMBEDDING_DIMS,
            |v: &usize| *v > 0,
            "必须大于 0",
        );
        let temperature = parse_or_default(
            ENV_TEMPERATURE,
            get(ENV_TEMPERATURE),
            DEFAULT_TEMPERATURE,
            |v: &f32| (0.0..=2.0).contains(v),
            "必须在 0-2 之间",
        );
        let max_tokens = parse_or_default(
            ENV_MAX_TOKENS,
            get(ENV_MAX_TOKENS),
            DEFAULT_MAX_TOKENS,
            |v: &u32| *v > 0,
            "必须大于 0",
        );

        let tracing_enabled = get(ENV_TRACING).map(|v| parse_bool(&v)).unwrap_or(false);
        let user_id = get(ENV_USER_ID).unwrap_or_else(|| DEFAULT_USER_ID.to_string());

        Ok(Self {
            api_key,
            base_url,
            model_name,
            embedding_model,
            embedding_dims,
            temperature,
            max_tokens,
            tracing_enabled,
            user_id,
        })
    }

    /// 只保留前 10 个字符，用于日志和终端展示
    pub fn masked_api_key(&self) -> String {
        mask_secret(&self.api_key)
    }

    pub fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    pub fn embeddings_url(&self) -> String {
        format!("{}/embeddings", self.base_url)
    }
}

/// 在 `dir` 下按 [`ENV_FILES`] 顺序加载第一个存在的文件，返回其路径；
/// 都不存在时返回 `Ok(None)`。已存在的进程环境变量不会被覆盖。
pub fn load_env_file(dir: &Path) -> Result<Option<PathBuf>> {
    let Some(path) = ENV_FILES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.exists())
    else {
        return Ok(None);
    };
    from_path(&path).map_err(|e| ConfigError::EnvFile {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    Ok(Some(path))
}

/// `true` / `1` / `yes`（不区分大小写）视为开启，其余一律关闭
pub fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes"
    )
}

pub fn mask_secret(secret: &str) -> String {
    if secret.chars().count() <= 10 {
        return "*".repeat(secret.chars().count());
    }
    let head: String = secret.chars().take(10).collect();
    format!("{head}...")
}

fn parse_or_default<T>(
    field: &str,
    raw: Option<String>,
    default: T,
    valid: impl Fn(&T) -> bool,
    rule: &str,
) -> T
where
    T: FromStr + Copy + std::fmt::Display,
{
    let Some(raw) = raw else {
        return default;
    };
    match raw.trim().parse::<T>() {
        Ok(v) if valid(&v) => v,
        Ok(v) => {
            warn!(field, value = %v, default = %default, "{field} {rule}，使用默认值");
            default
        }
        Err(_) => {
            warn!(field, value = %raw, default = %default, "{field} 无法解析，使用默认值");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EchoError;
    use std::collections::HashMap;
    use std::io::Write;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    /// 收集 fmt subscriber 输出，用于断言告警内容
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_applied() {
        let cfg = AppConfig::from_lookup(lookup(&[(ENV_API_KEY, "sk-test-1234567890")])).unwrap();
        assert_eq!(cfg.base_url, DEFAULT_BASE_URL);
        assert_eq!(cfg.model_name, DEFAULT_MODEL_NAME);
        assert_eq!(cfg.embedding_model, None);
        assert_eq!(cfg.embedding_dims, 1024);
        assert_eq!(cfg.temperature, 0.7);
        assert_eq!(cfg.max_tokens, 1000);
        assert!(!cfg.tracing_enabled);
        assert_eq!(cfg.user_id, "user123");
    }

    #[test]
    fn test_missing_api_key_is_config_error() {
        let err = AppConfig::from_lookup(lookup(&[(ENV_MODEL_NAME, "qwen3-max")])).unwrap_err();
        assert!(matches!(
            err,
            EchoError::Config(ConfigError::MissingField(ref f)) if f == ENV_API_KEY
        ));

        let err = AppConfig::from_lookup(lookup(&[(ENV_API_KEY, "   ")])).unwrap_err();
        assert!(matches!(err, EchoError::Config(_)));
    }

    #[test]
    fn test_invalid_numbers_fall_back() {
        let cfg = AppConfig::from_lookup(lookup(&[
            (ENV_API_KEY, "sk-x"),
            (ENV_TEMPERATURE, "hot"),
            (ENV_MAX_TOKENS, "0"),
            (ENV_EMBEDDING_DIMS, "-3"),
        ]))
        .unwrap();
        assert_eq!(cfg.temperature, DEFAULT_TEMPERATURE);
        assert_eq!(cfg.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(cfg.embedding_dims, DEFAULT_EMBEDDING_DIMS);

        let cfg = AppConfig::from_lookup(lookup(&[
            (ENV_API_KEY, "sk-x"),
            (ENV_TEMPERATURE, "2.5"),
        ]))
        .unwrap();
        assert_eq!(cfg.temperature, DEFAULT_TEMPERATURE);
    }

    #[test]
    fn test_explicit_values_and_urls() {
        let cfg = AppConfig::from_lookup(lookup(&[
            (ENV_API_KEY, "sk-x"),
            (ENV_BASE_URL, "https://dashscope.example.com/v1/"),
            (ENV_EMBEDDING_NAME, "text-embedding-v3"),
            (ENV_TEMPERATURE, " 1.5 "),
            (ENV_MAX_TOKENS, "2048"),
            (ENV_TRACING, "YES"),
        ]))
        .unwrap();
        assert_eq!(cfg.base_url, "https://dashscope.example.com/v1");
        assert_eq!(
            cfg.chat_completions_url(),
            "https://dashscope.example.com/v1/chat/completions"
        );
        assert_eq!(cfg.embeddings_url(), "https://dashscope.example.com/v1/embeddings");
        assert_eq!(cfg.embedding_model.as_deref(), Some("text-embedding-v3"));
        assert_eq!(cfg.temperature, 1.5);
        assert_eq!(cfg.max_tokens, 2048);
        assert!(cfg.tracing_enabled);
    }

    #[test]
    fn test_parse_bool() {
        for v in ["true", "TRUE", "1", "yes", " Yes "] {
            assert!(parse_bool(v), "{v}");
        }
        for v in ["false", "0", "no", "on", ""] {
            assert!(!parse_bool(v), "{v}");
        }
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret("sk-abcdefghijklmn"), "sk-abcdefg...");
        assert_eq!(mask_secret("short"), "*****");
    }

    #[test]
    fn test_invalid_number_emits_warning() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        let cfg = tracing::subscriber::with_default(subscriber, || {
            AppConfig::from_lookup(lookup(&[
                (ENV_API_KEY, "sk-x"),
                (ENV_TEMPERATURE, "hot"),
                (ENV_MAX_TOKENS, "0"),
            ]))
        })
        .unwrap();
        assert_eq!(cfg.temperature, DEFAULT_TEMPERATURE);

        let out = logs.text();
        assert!(out.contains("WARN"), "{out}");
        assert!(out.contains("TEMPERATURE 无法解析"), "{out}");
        assert!(out.contains("hot"), "{out}");
        assert!(out.contains("MAX_TOKENS 必须大于 0"), "{out}");
    }

    #[test]
    fn test_valid_numbers_do_not_warn() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            AppConfig::from_lookup(lookup(&[(ENV_API_KEY, "sk-x"), (ENV_TEMPERATURE, "1.0")]))
        })
        .unwrap();
        assert!(logs.text().is_empty());
    }

    #[test]
    fn test_load_env_file_prefers_local() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".env"), "ECHO_MEMORY_TEST_A=plain\n").unwrap();
        std::fs::write(dir.path().join(".env.local"), "ECHO_MEMORY_TEST_B=local\n").unwrap();

        let loaded = load_env_file(dir.path()).unwrap().unwrap();
        assert!(loaded.ends_with(".env.local"));
        assert_eq!(std::env::var("ECHO_MEMORY_TEST_B").unwrap(), "local");
        assert!(std::env::var("ECHO_MEMORY_TEST_A").is_err());
    }

    #[test]
    fn test_load_env_file_none_found() {
        let dir = TempDir::new().unwrap();
        assert!(load_env_file(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_load_env_file_reports_parse_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".env"), "not a valid line\n").unwrap();

        let err = load_env_file(dir.path()).unwrap_err();
        match err {
            EchoError::Config(ConfigError::EnvFile { path, .. }) => {
                assert!(path.ends_with(".env"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
