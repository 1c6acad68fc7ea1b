//! 错误处理模块
//!
//! 定义片假名翻译库中使用的错误类型。

use thiserror::Error;

/// 翻译错误类型
///
/// 包含翻译过程中可能出现的各种错误情况。
///
/// # 变体说明
///
/// * `Http` - HTTP请求错误
/// * `Io` - 文件读写错误
/// * `Serialization` - JSON序列化错误
/// * `Config` - 配置错误
/// * `Cache` - 缓存存储错误
/// * `RateLimitError` - 速率限制错误
/// * `ApiError` - API响应错误，包含错误代码和消息
/// * `ParseError` - 模型输出解析错误
/// * `Internal` - 内部不变量被破坏
/// * `Custom` - 自定义错误消息
#[derive(Debug, Error)]
pub enum TranslationError {
    /// HTTP请求错误
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// 文件读写错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// JSON序列化错误
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// 配置错误
    #[error("Config error: {0}")]
    Config(String),
    /// 缓存存储错误
    #[error("Cache error: {0}")]
    Cache(String),
    /// 速率限制错误
    #[error("Rate limit error: {0}")]
    RateLimitError(String),
    /// API响应错误
    #[error("API error {code}: {message}")]
    ApiError {
        /// 错误代码
        code: i32,
        /// 错误消息
        message: String,
    },
    /// 解析错误
    #[error("Parse error: {0}")]
    ParseError(String),
    /// 内部错误
    #[error("Internal error: {0}")]
    Internal(String),
    /// 自定义错误消息
    #[error("{0}")]
    Custom(String),
}

impl TranslationError {
    /// 检查错误是否可重试
    ///
    /// 网络错误、限流（429）和服务端错误（5xx）可以重试，其余错误重试也不会成功。
    pub fn is_retryable(&self) -> bool {
        match self {
            TranslationError::Http(_) => true,
            TranslationError::ApiError { code, .. } => *code == 429 || *code >= 500,
            _ => false,
        }
    }
}

impl From<String> for TranslationError {
    fn from(error: String) -> Self {
        TranslationError::Custom(error)
    }
}

impl From<&str> for TranslationError {
    fn from(error: &str) -> Self {
        TranslationError::Custom(error.to_string())
    }
}

/// 翻译结果类型别名
///
/// 简化返回类型，使用 `TranslationError` 作为错误类型。
///
/// # 示例
///
/// ```rust
/// use katakana_translator::{Result, TranslationError};
///
/// fn example_function() -> Result<String> {
///     Err(TranslationError::from("no words"))
/// }
///
/// assert!(example_function().is_err());
/// ```
pub type Result<T> = std::result::Result<T, TranslationError>;
