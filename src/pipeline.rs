//! 翻译流水线模块
//!
//! 提取单词 → 查询缓存 → 批量远程翻译未命中的单词 → 写回缓存 → 替换原文。
//! 各步骤严格按顺序执行，流水线内部不启动并发任务。

use crate::cache::TranslationCache;
use crate::chat::OpenAiChatClient;
use crate::config::KatakanaLibConfig;
use crate::error::{Result, TranslationError};
use crate::extractor::TokenExtractor;
use crate::store::JsonFileStore;
use crate::translator::{KatakanaTranslator, RemoteTranslator};
use crate::types::{CacheStats, TranslationMap};
use std::collections::BTreeSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

type TranslatorFactory = Box<dyn Fn() -> Result<Arc<dyn RemoteTranslator>> + Send + Sync>;

/// 片假名翻译流水线
///
/// 缓存在构造时创建；远程翻译器在第一次需要时才构造，之后复用同一个实例。
///
/// # 示例
///
/// ```rust,no_run
/// use katakana_translator::{KatakanaLibConfig, TranslationPipeline};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = KatakanaLibConfig::load_from_default_locations();
///     let pipeline = TranslationPipeline::from_config(&config).await?;
///
///     let text = pipeline
///         .scoped(|p| Box::pin(async move { p.translate_text("Ubuntu20.04にはApache2は入っていません。").await }))
///         .await?;
///     println!("{}", text);
///     Ok(())
/// }
/// ```
pub struct TranslationPipeline {
    extractor: TokenExtractor,
    cache: TranslationCache,
    translator: OnceCell<Arc<dyn RemoteTranslator>>,
    factory: TranslatorFactory,
    closed: AtomicBool,
}

impl TranslationPipeline {
    pub fn new(cache: TranslationCache, translator: Arc<dyn RemoteTranslator>) -> Self {
        Self::with_translator_factory(cache, move || Ok(translator.clone()))
    }

    /// 使用延迟构造的远程翻译器
    ///
    /// `factory` 最多成功调用一次；失败时下一次远程翻译会重新尝试。
    pub fn with_translator_factory<F>(cache: TranslationCache, factory: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn RemoteTranslator>> + Send + Sync + 'static,
    {
        Self {
            extractor: TokenExtractor::new(),
            cache,
            translator: OnceCell::new(),
            factory: Box::new(factory),
            closed: AtomicBool::new(false),
        }
    }

    /// 按配置打开JSON缓存文件，模型客户端推迟到第一次远程翻译时创建
    pub async fn from_config(config: &KatakanaLibConfig) -> Result<Self> {
        let store = JsonFileStore::open(&config.cache.path).await?;
        let cache = TranslationCache::with_prefix(Arc::new(store), config.cache.key_prefix.clone());
        let translation = config.translation.clone();

        Ok(Self::with_translator_factory(cache, move || {
            let client = OpenAiChatClient::from_config(&translation)?;
            Ok(Arc::new(KatakanaTranslator::new(client)) as Arc<dyn RemoteTranslator>)
        }))
    }

    /// 远程翻译器，第一次调用时构造
    pub async fn translator(&self) -> Result<&Arc<dyn RemoteTranslator>> {
        self.translator.get_or_try_init(|| async { (self.factory)() }).await
    }

    pub fn cache(&self) -> &TranslationCache {
        &self.cache
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// 提取文本中的单词并返回 `单词 -> 读法` 映射
    ///
    /// 文本中没有单词时直接返回空映射，不访问缓存和模型。
    pub async fn translate_to_mapping(&self, text: &str) -> Result<TranslationMap> {
        let tokens = self.extractor.extract(text);
        self.translate_tokens(&tokens).await
    }

    /// 翻译调用方给出的单词，去重并忽略空白项
    pub async fn translate_words<I, S>(&self, words: I) -> Result<TranslationMap>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tokens: BTreeSet<String> = words
            .into_iter()
            .map(|w| w.as_ref().trim().to_string())
            .filter(|w| !w.is_empty())
            .collect();
        self.translate_tokens(&tokens).await
    }

    /// 把文本中的英数字单词替换为片假名读法
    ///
    /// 长单词先替换，`abc` 不会破坏 `abc123` 的替换。
    pub async fn translate_text(&self, text: &str) -> Result<String> {
        let tokens = self.extractor.extract(text);
        if tokens.is_empty() {
            return Ok(text.to_string());
        }

        let order = TokenExtractor::longest_first(&tokens);
        let mapping = self.translate_tokens(&tokens).await?;

        let mut result = text.to_string();
        for token in &order {
            let reading = mapping.get(token).ok_or_else(|| {
                TranslationError::Internal(format!("no reading for extracted token {:?}", token))
            })?;
            result = result.replace(token.as_str(), reading);
        }

        Ok(result)
    }

    async fn translate_tokens(&self, tokens: &BTreeSet<String>) -> Result<TranslationMap> {
        if tokens.is_empty() {
            return Ok(TranslationMap::new());
        }
        if self.closed.load(Ordering::SeqCst) {
            return Err(TranslationError::Cache("pipeline is closed".to_string()));
        }

        let mut mapping = TranslationMap::with_capacity(tokens.len());
        let mut pending = Vec::new();
        for token in tokens {
            match self.cache.lookup(token).await {
                Some(reading) => {
                    mapping.insert(token.clone(), reading);
                }
                None => pending.push(token.clone()),
            }
        }

        info!(
            "{} tokens: {} cached, {} to translate",
            tokens.len(),
            mapping.len(),
            pending.len()
        );

        if pending.is_empty() {
            return Ok(mapping);
        }

        let remote = self.translator().await?.translate(&pending).await?;

        // 只写回本次新翻译的单词，缓存命中的不重复写入
        for word in &pending {
            let reading = match remote.get(word).map(|r| r.trim()) {
                Some(reading) if !reading.is_empty() => reading,
                _ => continue,
            };
            if let Err(e) = self.cache.store(word, reading).await {
                debug!("Continuing without caching {}: {}", word, e);
            }
            mapping
                .entry(word.clone())
                .or_insert_with(|| reading.to_string());
        }

        Ok(mapping)
    }

    /// 在闭包结束后关闭缓存，无论闭包成功与否
    pub async fn scoped<T, F>(self, f: F) -> Result<T>
    where
        F: for<'a> FnOnce(
            &'a TranslationPipeline,
        ) -> Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>,
    {
        let outcome = f(&self).await;
        let closed = self.close().await;
        let value = outcome?;
        closed?;
        Ok(value)
    }

    /// 关闭底层缓存，可重复调用
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let stats = self.cache.stats();
        debug!(
            "Closing pipeline cache: {} hits, {} misses, {} writes",
            stats.hits, stats.misses, stats.writes
        );
        self.cache.close().await
    }
}
