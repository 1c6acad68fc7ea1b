//! # Katakana Translator
//!
//! 把日文文本中夹杂的英数字单词（如 `Ubuntu20.04`、`Apache2`）替换为片假名读法的Rust库。
//!
//! ## 主要特性
//!
//! - **单词提取**: 识别字母单词和带版本号的单词，长单词优先替换
//! - **持久缓存**: 读法按单词缓存到JSON文件，命中的单词不再请求模型
//! - **批量翻译**: 未命中的单词一次性交给聊天模型
//! - **宽松解析**: 容忍模型输出中的代码块、Python字典写法和尾逗号
//! - **速率限制**: 内置速率限制器和指数退避重试
//! - **配置灵活**: 支持TOML配置文件和程序化配置
//!
//! ## 快速开始
//!
//! ```rust,no_run
//! use katakana_translator::{KatakanaLibConfig, TranslationPipeline};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = KatakanaLibConfig::default();
//!     let pipeline = TranslationPipeline::from_config(&config).await?;
//!
//!     let result = pipeline.translate_text("LibreChatのデータベースをダンプする").await?;
//!     println!("Translation: {}", result);
//!
//!     pipeline.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## 配置文件支持
//!
//! ```toml
//! [translation]
//! api_url = "https://api.openai.com/v1/chat/completions"
//! api_key_env = "OPENAI_API_KEY"
//! model = "gpt-4o-mini"
//! max_requests_per_second = 1.0
//!
//! [cache]
//! path = "translation_cache.json"
//! key_prefix = "translation_"
//! ```

pub mod cache;
pub mod chat;
pub mod config;
pub mod error;
pub mod extractor;
pub mod pipeline;
pub mod repair;
pub mod store;
pub mod translator;
pub mod types;

pub use cache::TranslationCache;
pub use chat::{ChatClient, OpenAiChatClient};
pub use config::KatakanaLibConfig;
pub use error::{Result, TranslationError};
pub use extractor::TokenExtractor;
pub use pipeline::TranslationPipeline;
pub use store::{JsonFileStore, KeyValueStore, MemoryStore};
pub use translator::{retry_with_backoff, KatakanaTranslator, RateLimiter, RemoteTranslator};
pub use types::{
    CacheConfig, CacheStats, ChatMessage, RetryConfig, TranslationConfig, TranslationMap,
    DEFAULT_KEY_PREFIX,
};
