use async_trait::async_trait;
use katakana_translator::{
    JsonFileStore, KatakanaTranslator, KeyValueStore, MemoryStore, RemoteTranslator, Result,
    TranslationCache, TranslationError, TranslationMap, TranslationPipeline,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio_test::{assert_err, assert_ok};

/// Answers from a fixed dictionary and records every batch it receives.
struct RecordingTranslator {
    readings: HashMap<String, String>,
    batches: Mutex<Vec<Vec<String>>>,
    fail: AtomicBool,
}

impl RecordingTranslator {
    fn new(readings: &[(&str, &str)]) -> Arc<Self> {
        Arc::new(Self {
            readings: readings.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            batches: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        })
    }

    fn batches(&self) -> Vec<Vec<String>> {
        self.batches.lock().unwrap().clone()
    }

    fn fail_from_now_on(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl RemoteTranslator for RecordingTranslator {
    async fn translate(&self, words: &[String]) -> Result<TranslationMap> {
        self.batches.lock().unwrap().push(words.to_vec());
        if self.fail.load(Ordering::SeqCst) {
            return Err(TranslationError::ApiError { code: 503, message: "model offline".to_string() });
        }
        Ok(words
            .iter()
            .filter_map(|w| self.readings.get(w).map(|r| (w.clone(), r.clone())))
            .collect())
    }
}

/// Counts writes and can be told to reject them.
#[derive(Default)]
struct CountingStore {
    inner: MemoryStore,
    sets: AtomicUsize,
    reject_writes: bool,
}

#[async_trait]
impl KeyValueStore for CountingStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        if self.reject_writes {
            return Err(TranslationError::Cache("disk full".to_string()));
        }
        self.inner.set(key, value).await
    }

    async fn close(&self) -> Result<()> {
        self.inner.close().await
    }
}

const SAMPLE: &str = "Ubuntu20.04にはApache2はプレインストールされていません。\n\
Ubuntuは、デスクトップ版とサーバー版の2つのEditionがあります。";

fn sample_readings() -> Vec<(&'static str, &'static str)> {
    vec![
        ("Ubuntu20.04", "ウブントゥニーゼロテンゼロヨン"),
        ("Ubuntu", "ウブントゥ"),
        ("Apache2", "アパッチツー"),
        ("Apache", "アパッチ"),
        ("Edition", "エディション"),
    ]
}

#[tokio::test]
async fn replaces_every_token_occurrence() {
    let translator = RecordingTranslator::new(&sample_readings());
    let pipeline = TranslationPipeline::new(TranslationCache::new(Arc::new(MemoryStore::new())), translator);

    let output = pipeline.translate_text(SAMPLE).await.unwrap();
    assert_eq!(
        output,
        "ウブントゥニーゼロテンゼロヨンにはアパッチツーはプレインストールされていません。\n\
ウブントゥは、デスクトップ版とサーバー版の2つのエディションがあります。"
    );
    assert!(!output.chars().any(|c| c.is_ascii_alphabetic()));
}

#[tokio::test]
async fn longest_token_is_substituted_first() {
    let translator = RecordingTranslator::new(&[
        ("abc123", "ABC-ONE-TWO-THREE"),
        ("abc", "ABC"),
        ("run", "RUN"),
    ]);
    let pipeline = TranslationPipeline::new(TranslationCache::new(Arc::new(MemoryStore::new())), translator);

    let output = pipeline.translate_text("run abc123 abc").await.unwrap();
    assert_eq!(output, "RUN ABC-ONE-TWO-THREE ABC");
}

#[tokio::test]
async fn remote_batch_is_sorted_and_skips_cache_hits() {
    let store = Arc::new(MemoryStore::new());
    store.set("translation_Ubuntu", "ウブントゥ").await.unwrap();

    let translator = RecordingTranslator::new(&sample_readings());
    let pipeline = TranslationPipeline::new(TranslationCache::new(store), translator.clone());

    let mapping = pipeline.translate_to_mapping(SAMPLE).await.unwrap();
    assert_eq!(mapping.len(), 5);
    assert_eq!(mapping["Ubuntu"], "ウブントゥ");
    assert_eq!(
        translator.batches(),
        vec![vec!["Apache", "Apache2", "Edition", "Ubuntu20.04"]]
    );
}

#[tokio::test]
async fn second_call_is_served_from_cache() {
    let translator = RecordingTranslator::new(&sample_readings());
    let pipeline = TranslationPipeline::new(
        TranslationCache::new(Arc::new(MemoryStore::new())),
        translator.clone(),
    );

    let first = pipeline.translate_to_mapping(SAMPLE).await.unwrap();
    translator.fail_from_now_on();
    let second = pipeline.translate_to_mapping(SAMPLE).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(translator.batches().len(), 1);
    assert_eq!(pipeline.cache_stats().hits, 5);
}

#[tokio::test]
async fn new_translation_is_readable_through_the_store() {
    let store = Arc::new(MemoryStore::new());
    let translator = RecordingTranslator::new(&[("Ubuntu", "ウブントゥ")]);
    let pipeline = TranslationPipeline::new(TranslationCache::new(store.clone()), translator);

    assert_eq!(store.get("translation_Ubuntu").await.unwrap(), None);
    pipeline.translate_words(["Ubuntu"]).await.unwrap();
    assert_eq!(store.get("translation_Ubuntu").await.unwrap().as_deref(), Some("ウブントゥ"));
}

#[tokio::test]
async fn blank_cache_entries_are_translated_again() {
    let store = Arc::new(MemoryStore::new());
    store.set("translation_Mongo", "   ").await.unwrap();

    let translator = RecordingTranslator::new(&[("Mongo", "モンゴ")]);
    let pipeline = TranslationPipeline::new(TranslationCache::new(store.clone()), translator.clone());

    let output = pipeline.translate_text("Mongoの意味は何ですか？").await.unwrap();
    assert_eq!(output, "モンゴの意味は何ですか？");
    assert_eq!(translator.batches(), vec![vec!["Mongo"]]);
    assert_eq!(store.get("translation_Mongo").await.unwrap().as_deref(), Some("モンゴ"));
}

#[tokio::test]
async fn only_new_translations_are_written() {
    let store = Arc::new(CountingStore::default());
    store.inner.set("translation_Ubuntu", "ウブントゥ").await.unwrap();

    let translator = RecordingTranslator::new(&[("Ubuntu", "ウブントゥ"), ("Debian", "デビアン")]);
    let pipeline = TranslationPipeline::new(TranslationCache::new(store.clone()), translator);

    let output = pipeline.translate_text("UbuntuとDebian").await.unwrap();
    assert_eq!(output, "ウブントゥとデビアン");
    assert_eq!(store.sets.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn cache_write_failures_do_not_abort() {
    let store = Arc::new(CountingStore { reject_writes: true, ..CountingStore::default() });
    let translator = RecordingTranslator::new(&[("Debian", "デビアン")]);
    let pipeline = TranslationPipeline::new(TranslationCache::new(store.clone()), translator);

    let output = assert_ok!(pipeline.translate_text("Debianです").await);
    assert_eq!(output, "デビアンです");
    assert_eq!(pipeline.cache_stats().write_failures, 1);
}

#[tokio::test]
async fn remote_failure_propagates() {
    let translator = RecordingTranslator::new(&[]);
    translator.fail_from_now_on();
    let pipeline = TranslationPipeline::new(TranslationCache::new(Arc::new(MemoryStore::new())), translator);

    let err = assert_err!(pipeline.translate_text("Ubuntu").await);
    assert!(matches!(err, TranslationError::ApiError { code: 503, .. }));
}

#[tokio::test]
async fn scoped_pipeline_persists_to_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("translation_cache.json");

    let store = JsonFileStore::open(&path).await.unwrap();
    let translator = RecordingTranslator::new(&[("LibreChat", "リブレチャット")]);
    let pipeline = TranslationPipeline::new(TranslationCache::new(Arc::new(store)), translator);

    let output = pipeline
        .scoped(|p| Box::pin(async move { p.translate_text("LibreChatのデータベース").await }))
        .await
        .unwrap();
    assert_eq!(output, "リブレチャットのデータベース");

    let reopened = JsonFileStore::open(&path).await.unwrap();
    assert_eq!(
        reopened.get("translation_LibreChat").await.unwrap().as_deref(),
        Some("リブレチャット")
    );
    reopened.close().await.unwrap();
}

#[tokio::test]
async fn scoped_pipeline_closes_cache_when_translation_fails() {
    let store = Arc::new(MemoryStore::new());
    let translator = RecordingTranslator::new(&[]);
    translator.fail_from_now_on();
    let pipeline = TranslationPipeline::new(TranslationCache::new(store.clone()), translator);

    let err = assert_err!(
        pipeline
            .scoped(|p| Box::pin(async move { p.translate_text("Ubuntuの使い方").await }))
            .await
    );
    assert!(matches!(err, TranslationError::ApiError { code: 503, .. }));
    assert!(store.is_closed());
}

/// Chat client that replies like a model asked for a Python dict.
struct PythonDictChat;

#[async_trait]
impl katakana_translator::ChatClient for PythonDictChat {
    async fn chat(&self, _system_prompt: &str, _user_prompt: &str) -> Result<String> {
        Ok("```python\n{'superuser': 'スーパーユーザー', 'a123': 'エーイチニーサン', 'a': 'エー',}\n```".to_string())
    }
}

#[tokio::test]
async fn chat_backed_translator_end_to_end() {
    let translator: Arc<dyn RemoteTranslator> = Arc::new(KatakanaTranslator::new(PythonDictChat));
    let pipeline = TranslationPipeline::new(TranslationCache::new(Arc::new(MemoryStore::new())), translator);

    let output = pipeline.translate_text("a123, superuser").await.unwrap();
    assert_eq!(output, "エーイチニーサン, スーパーユーザー");
}
