//! 类型定义模块
//!
//! 定义翻译库中使用的配置类型、映射类型以及聊天接口的请求/响应结构。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 单词到片假名读法的映射
pub type TranslationMap = HashMap<String, String>;

/// 缓存键的默认命名空间前缀
pub const DEFAULT_KEY_PREFIX: &str = "translation_";

/// 翻译配置
///
/// 包含远程模型服务的所有配置选项，如API地址、模型名称、性能参数等。
///
/// # 字段说明
///
/// * `api_url` - OpenAI兼容的 chat completions 地址
/// * `api_key_env` - 保存API密钥的环境变量名
/// * `model` - 使用的模型名称
/// * `temperature` - 采样温度
/// * `request_timeout_secs` - 单次请求超时（秒）
/// * `max_requests_per_second` - 每秒最大请求数
/// * `retry` - 重试策略
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationConfig {
    /// OpenAI兼容的 chat completions 地址
    pub api_url: String,
    /// 保存API密钥的环境变量名
    pub api_key_env: String,
    /// 使用的模型名称
    pub model: String,
    /// 采样温度
    pub temperature: f32,
    /// 单次请求超时（秒）
    pub request_timeout_secs: u64,
    /// 每秒最大请求数
    pub max_requests_per_second: f64,
    /// 重试策略
    pub retry: RetryConfig,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.openai.com/v1/chat/completions".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.1,
            request_timeout_secs: 60,
            max_requests_per_second: 1.0,
            retry: RetryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: usize,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay_ms: 500,
            max_delay_ms: 5000,
            backoff_multiplier: 2.0,
        }
    }
}

/// 缓存配置
///
/// * `path` - JSON缓存文件路径
/// * `key_prefix` - 缓存键的命名空间前缀，避免与同一存储中的其他数据冲突
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub path: String,
    pub key_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: "translation_cache.json".to_string(),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }
}

#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
}

#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: ChatMessage,
}

/// 缓存命中统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
    pub write_failures: u64,
}
