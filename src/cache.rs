//! 翻译缓存模块
//!
//! 在通用键值存储之上按单词读写片假名读法，键名统一加命名空间前缀。

use crate::error::Result;
use crate::store::KeyValueStore;
use crate::types::{CacheStats, DEFAULT_KEY_PREFIX};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    write_failures: AtomicU64,
}

/// 翻译缓存
///
/// 同一个存储可以被多个缓存实例或并发调用共享，
/// 对同一键的并发写入采用后写覆盖。
#[derive(Clone)]
pub struct TranslationCache {
    store: Arc<dyn KeyValueStore>,
    key_prefix: String,
    counters: Arc<Counters>,
}

impl TranslationCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_prefix(store, DEFAULT_KEY_PREFIX)
    }

    pub fn with_prefix(store: Arc<dyn KeyValueStore>, key_prefix: impl Into<String>) -> Self {
        Self {
            store,
            key_prefix: key_prefix.into(),
            counters: Arc::new(Counters::default()),
        }
    }

    /// 单词对应的存储键，例如 `translation_Ubuntu`
    pub fn key_for(&self, token: &str) -> String {
        format!("{}{}", self.key_prefix, token)
    }

    /// 查询缓存的读法
    ///
    /// 读取失败、值为空或只有空白都视为未命中，不向调用方报错。
    pub async fn lookup(&self, token: &str) -> Option<String> {
        let key = self.key_for(token);
        let value = match self.store.get(&key).await {
            Ok(value) => value,
            Err(e) => {
                debug!("Cache read for {} failed, treating as miss: {}", key, e);
                None
            }
        };

        match value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
            Some(translation) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                Some(translation)
            }
            None => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// 保存单词的读法
    pub async fn store(&self, token: &str, translation: &str) -> Result<()> {
        let key = self.key_for(token);
        match self.store.set(&key, translation).await {
            Ok(()) => {
                self.counters.writes.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(e) => {
                self.counters.write_failures.fetch_add(1, Ordering::Relaxed);
                warn!("Failed to cache translation for {}: {}", token, e);
                Err(e)
            }
        }
    }

    pub async fn close(&self) -> Result<()> {
        self.store.close().await
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            writes: self.counters.writes.load(Ordering::Relaxed),
            write_failures: self.counters.write_failures.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn keys_are_namespaced() {
        let store = Arc::new(MemoryStore::new());
        let cache = TranslationCache::new(store.clone());
        assert_eq!(cache.key_for("Ubuntu"), "translation_Ubuntu");

        cache.store("Ubuntu", "ウブントゥ").await.unwrap();
        assert_eq!(
            store.get("translation_Ubuntu").await.unwrap().as_deref(),
            Some("ウブントゥ")
        );
        assert_eq!(store.get("Ubuntu").await.unwrap(), None);
    }

    #[tokio::test]
    async fn blank_entries_are_misses() {
        let store = Arc::new(MemoryStore::new());
        store.set("translation_empty", "").await.unwrap();
        store.set("translation_space", "  \n").await.unwrap();
        store.set("translation_padded", " パデッド ").await.unwrap();

        let cache = TranslationCache::new(store);
        assert_eq!(cache.lookup("empty").await, None);
        assert_eq!(cache.lookup("space").await, None);
        assert_eq!(cache.lookup("padded").await.as_deref(), Some("パデッド"));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
    }

    #[tokio::test]
    async fn read_errors_are_misses_and_write_errors_surface() {
        let store = Arc::new(MemoryStore::new());
        let cache = TranslationCache::with_prefix(store.clone(), "kana:");
        store.close().await.unwrap();

        assert_eq!(cache.lookup("Apache").await, None);
        assert!(cache.store("Apache", "アパッチ").await.is_err());
        assert_eq!(cache.stats().write_failures, 1);
    }
}
