use std::fmt;

/// echo-memory 的统一错误类型
#[derive(Debug)]
pub enum EchoError {
    /// LLM / Embedding 接口错误
    Llm(LlmError),
    /// 记忆存储错误
    Memory(MemoryError),
    /// 配置错误
    Config(ConfigError),
    /// IO 错误
    Io(std::io::Error),
    /// 其他错误
    Other(String),
}

/// LLM 相关错误
#[derive(Debug)]
pub enum LlmError {
    /// 网络请求失败
    NetworkError(String),
    /// API 返回错误状态码
    ApiError { status: u16, message: String },
    /// 响应格式无效
    InvalidResponse(String),
    /// 没有返回内容
    EmptyResponse,
}

/// 记忆存储错误
#[derive(Debug)]
pub enum MemoryError {
    /// 向量维度与索引不一致
    DimensionMismatch { expected: usize, actual: usize },
    /// 同一命名空间下 key 已存在（记录创建后不可修改）
    DuplicateKey { namespace: String, key: String },
}

/// 配置错误
#[derive(Debug)]
pub enum ConfigError {
    /// 缺少必需的配置项
    MissingField(String),
    /// `.env` 文件无法解析
    EnvFile { path: String, message: String },
}

impl fmt::Display for EchoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EchoError::Llm(e) => write!(f, "LLM Error: {}", e),
            EchoError::Memory(e) => write!(f, "Memory Error: {}", e),
            EchoError::Config(e) => write!(f, "Config Error: {}", e),
            EchoError::Io(e) => write!(f, "IO Error: {}", e),
            EchoError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            LlmError::ApiError { status, message } => {
                write!(f, "API error (status {}): {}", status, message)
            }
            LlmError::InvalidResponse(msg) => write!(f, "Invalid response: {}", msg),
            LlmError::EmptyResponse => write!(f, "Empty response from LLM"),
        }
    }
}

impl fmt::Display for MemoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryError::DimensionMismatch { expected, actual } => write!(
                f,
                "Embedding dimension mismatch: expected {}, got {}",
                expected, actual
            ),
            MemoryError::DuplicateKey { namespace, key } => {
                write!(f, "Key '{}' already exists in namespace '{}'", key, namespace)
            }
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingField(field) => {
                write!(f, "请在 .env 文件或环境变量中设置 {}", field)
            }
            ConfigError::EnvFile { path, message } => {
                write!(f, "Failed to parse env file '{}': {}", path, message)
            }
        }
    }
}

impl std::error::Error for EchoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EchoError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl std::error::Error for LlmError {}
impl std::error::Error for MemoryError {}
impl std::error::Error for ConfigError {}

impl From<std::io::Error> for EchoError {
    fn from(err: std::io::Error) -> Self {
        EchoError::Io(err)
    }
}

impl From<reqwest::Error> for EchoError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            EchoError::Llm(LlmError::NetworkError("Request timeout".to_string()))
        } else if err.is_connect() {
            EchoError::Llm(LlmError::NetworkError(format!(
                "Connection failed: {}",
                err
            )))
        } else {
            EchoError::Llm(LlmError::NetworkError(err.to_string()))
        }
    }
}

impl From<serde_json::Error> for EchoError {
    fn from(err: serde_json::Error) -> Self {
        EchoError::Llm(LlmError::InvalidResponse(err.to_string()))
    }
}

impl From<LlmError> for EchoError {
    fn from(err: LlmError) -> Self {
        EchoError::Llm(err)
    }
}

impl From<MemoryError> for EchoError {
    fn from(err: MemoryError) -> Self {
        EchoError::Memory(err)
    }
}

impl From<ConfigError> for EchoError {
    fn from(err: ConfigError) -> Self {
        EchoError::Config(err)
    }
}

// 便捷的 Result 类型别名
pub type Result<T> = std::result::Result<T, EchoError>;
