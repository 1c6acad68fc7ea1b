//! 远程翻译模块
//!
//! 定义流水线依赖的 [`RemoteTranslator`] 接口，以及基于聊天模型的片假名翻译实现。
//! 请求频率控制和重试也在这里，流水线本身从不重试。

use crate::chat::ChatClient;
use crate::error::{Result, TranslationError};
use crate::repair;
use crate::types::{RetryConfig, TranslationMap};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

const KATAKANA_PROMPT: &str = "次の英単語および数字を、英語風のカタカナ読みにしてください。\n\
単語をキー、カタカナ読みを値とする JSON オブジェクトだけを出力してください。コメントや補足は不要です。\n";

/// 两次请求之间允许的最长间隔
const MAX_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// 速率限制器
///
/// 保证相邻两次请求之间至少间隔 `1 / requests_per_second` 秒，
/// 多个并发调用者按到达顺序排队。
#[derive(Clone)]
pub struct RateLimiter {
    /// 信号量，保证同一时刻只有一个调用者计算等待时间
    semaphore: Arc<Semaphore>,
    /// 上一次放行的时间
    last_request: Arc<Mutex<Option<Instant>>>,
    /// 最小请求间隔
    interval: Duration,
}

impl RateLimiter {
    /// 创建新的速率限制器
    ///
    /// `requests_per_second` 不大于0（或为NaN）时不做限制；
    /// 换算出的间隔超过一天视为配置错误。
    ///
    /// # 示例
    ///
    /// ```rust
    /// use katakana_translator::RateLimiter;
    ///
    /// let limiter = RateLimiter::new(1.0).unwrap(); // 每秒1个请求
    /// assert!(RateLimiter::new(1e-20).is_err());
    /// ```
    pub fn new(requests_per_second: f64) -> Result<Self> {
        let interval = if requests_per_second > 0.0 {
            Duration::try_from_secs_f64(1.0 / requests_per_second)
                .ok()
                .filter(|interval| *interval <= MAX_INTERVAL)
                .ok_or_else(|| {
                    TranslationError::Config(format!(
                        "max_requests_per_second {} is too small",
                        requests_per_second
                    ))
                })?
        } else {
            Duration::ZERO
        };

        Ok(Self {
            semaphore: Arc::new(Semaphore::new(1)),
            last_request: Arc::new(Mutex::new(None)),
            interval,
        })
    }

    /// 获取请求许可
    ///
    /// 在发起API请求前调用，必要时等待到下一个可用时间点。
    pub async fn acquire(&self) -> Result<()> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| TranslationError::RateLimitError(format!("Rate limiter error: {}", e)))?;

        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let ready_at = previous + self.interval;
            let now = Instant::now();
            if ready_at > now {
                sleep(ready_at - now).await;
            }
        }
        *last = Some(Instant::now());
        Ok(())
    }
}

/// 带指数退避的重试机制
///
/// 只重试 [`TranslationError::is_retryable`] 为真的错误，
/// 每次尝试前都经过速率限制器。
pub async fn retry_with_backoff<F, Fut, T>(
    mut operation: F,
    config: &RetryConfig,
    rate_limiter: &RateLimiter,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut delay = config.initial_delay_ms;
    let mut attempt = 0;

    loop {
        rate_limiter.acquire().await?;

        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if attempt >= config.max_retries || !e.is_retryable() => return Err(e),
            Err(e) => {
                attempt += 1;
                warn!("Attempt {} failed: {}. Retrying in {}ms...", attempt, e, delay);
                sleep(Duration::from_millis(delay)).await;
                delay = std::cmp::min(
                    (delay as f64 * config.backoff_multiplier) as u64,
                    config.max_delay_ms,
                );
            }
        }
    }
}

/// 远程翻译接口
///
/// 输入一批未命中缓存的单词，返回每个单词的片假名读法。
/// 返回的键必须与输入单词完全一致（区分大小写）。
#[async_trait]
pub trait RemoteTranslator: Send + Sync {
    async fn translate(&self, words: &[String]) -> Result<TranslationMap>;
}

/// 基于聊天模型的片假名翻译器
pub struct KatakanaTranslator<C> {
    client: C,
}

impl<C: ChatClient> KatakanaTranslator<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    /// 固定提示词后接单词列表
    pub fn build_prompt(words: &[String]) -> String {
        let list = serde_json::to_string(words).unwrap_or_else(|_| words.join(", "));
        format!("{}\n\n{}", KATAKANA_PROMPT, list)
    }
}

#[async_trait]
impl<C: ChatClient> RemoteTranslator for KatakanaTranslator<C> {
    async fn translate(&self, words: &[String]) -> Result<TranslationMap> {
        if words.is_empty() {
            return Ok(TranslationMap::new());
        }

        info!("Requesting katakana readings for {} words", words.len());
        let response = self.client.chat("", &Self::build_prompt(words)).await?;
        debug!("Model response: {}", response);

        let mut parsed = repair::parse_object(&response)?;

        let mut readings = TranslationMap::with_capacity(words.len());
        let mut missing = Vec::new();
        for word in words {
            match parsed.remove(word).map(|r| r.trim().to_string()) {
                Some(reading) if !reading.is_empty() => {
                    readings.insert(word.clone(), reading);
                }
                _ => missing.push(word.as_str()),
            }
        }

        if !parsed.is_empty() {
            debug!("Ignoring {} unrequested keys in model response", parsed.len());
        }
        if !missing.is_empty() {
            return Err(TranslationError::ParseError(format!(
                "model response has no reading for: {}",
                missing.join(", ")
            )));
        }

        Ok(readings)
    }
}
