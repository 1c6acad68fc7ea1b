//! 聊天模型客户端模块
//!
//! [`ChatClient`] 是远程翻译器与具体模型服务之间的接缝，
//! [`OpenAiChatClient`] 对接任意 OpenAI 兼容的 chat completions 接口。

use crate::error::{Result, TranslationError};
use crate::translator::{retry_with_backoff, RateLimiter};
use crate::types::{ChatCompletionRequest, ChatCompletionResponse, ChatMessage, TranslationConfig};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

/// 聊天模型接口
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// 发送一轮对话，返回模型的文本回复。`system_prompt` 为空时不发送 system 消息。
    async fn chat(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;
}

/// OpenAI 兼容接口客户端
///
/// 所有请求经过速率限制，网络错误、429 和 5xx 按配置重试。
///
/// # 示例
///
/// ```rust,no_run
/// use katakana_translator::{ChatClient, OpenAiChatClient, TranslationConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = OpenAiChatClient::from_config(&TranslationConfig::default())?;
///     let reply = client.chat("", "Ubuntu をカタカナで").await?;
///     println!("{}", reply);
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct OpenAiChatClient {
    client: Client,
    api_key: String,
    rate_limiter: RateLimiter,
    config: TranslationConfig,
}

impl OpenAiChatClient {
    /// 速率配置不可用时返回 `Config` 错误
    pub fn new(config: TranslationConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .pool_idle_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(5)
            .tcp_keepalive(Duration::from_secs(60))
            .user_agent("katakana-translator/0.1")
            .build()
            .unwrap_or_else(|e| {
                warn!("Failed to create configured HTTP client: {}, using default", e);
                Client::new()
            });

        Ok(Self {
            client,
            api_key: api_key.into(),
            rate_limiter: RateLimiter::new(config.max_requests_per_second)?,
            config,
        })
    }

    /// 从 `config.api_key_env` 指定的环境变量读取API密钥
    pub fn from_config(config: &TranslationConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            TranslationError::Config(format!("{} environment variable not set", config.api_key_env))
        })?;
        Self::new(config.clone(), api_key)
    }

    pub fn build_request(&self, system_prompt: &str, user_prompt: &str) -> ChatCompletionRequest {
        let mut messages = Vec::with_capacity(2);
        if !system_prompt.is_empty() {
            messages.push(ChatMessage::system(system_prompt));
        }
        messages.push(ChatMessage::user(user_prompt));

        ChatCompletionRequest {
            model: self.config.model.clone(),
            messages,
            temperature: self.config.temperature,
        }
    }

    async fn call_api(&self, request: &ChatCompletionRequest) -> Result<String> {
        debug!("Sending chat request to {} ({})", self.config.api_url, request.model);

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(TranslationError::ApiError {
                code: status.as_u16() as i32,
                message: format!("chat completion failed: {}", body),
            });
        }

        let parsed: ChatCompletionResponse = serde_json::from_str(&body)
            .map_err(|e| TranslationError::ParseError(format!("invalid chat completion body: {}", e)))?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| TranslationError::ParseError("chat completion returned no choices".to_string()))
    }
}

#[async_trait]
impl ChatClient for OpenAiChatClient {
    async fn chat(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let request = self.build_request(system_prompt, user_prompt);
        retry_with_backoff(|| self.call_api(&request), &self.config.retry, &self.rate_limiter).await
    }
}
