//! 持久化键值存储模块
//!
//! 缓存层只依赖 [`KeyValueStore`] 的 get/set/close 三个操作，
//! 具体存储可以是磁盘上的JSON文件，也可以是内存。

use crate::error::{Result, TranslationError};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// 异步键值存储接口
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// 读取键对应的字符串值，不存在时返回 `None`
    async fn get(&self, key: &str) -> Result<Option<String>>;
    /// 写入键值，单键原子写入
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    /// 刷新并释放资源，可重复调用
    async fn close(&self) -> Result<()>;
}

fn closed_error() -> TranslationError {
    TranslationError::Cache("store is closed".to_string())
}

/// 同一进程内打开同一路径的所有存储共用一把写锁
static PATH_LOCKS: LazyLock<std::sync::Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> =
    LazyLock::new(Default::default);

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

fn path_lock(path: &Path) -> Arc<Mutex<()>> {
    let key = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut locks = PATH_LOCKS.lock().unwrap_or_else(|e| e.into_inner());
    locks.entry(key).or_default().clone()
}

/// 读取磁盘上的JSON对象；文件不存在返回空对象，无法读取或解析时返回 `None`
async fn read_entries(path: &Path) -> Option<Map<String, Value>> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(map)) => Some(map),
            Ok(_) => {
                warn!("Cache file {} is not a JSON object", path.display());
                None
            }
            Err(e) => {
                warn!("Failed to parse cache file {}: {}", path.display(), e);
                None
            }
        },
        Err(e) if e.kind() == ErrorKind::NotFound => Some(Map::new()),
        Err(e) => {
            warn!("Failed to read cache file {}: {}", path.display(), e);
            None
        }
    }
}

struct FileState {
    entries: Map<String, Value>,
    /// 已写入内存但尚未落盘的键
    unsaved: HashSet<String>,
    closed: bool,
}

/// 基于单个JSON对象文件的存储
///
/// 打开时整体加载到内存。每次写入先合并磁盘上的最新内容（其他实例写入的键），
/// 再写入临时文件、fsync 后重命名覆盖；写入失败时磁盘上的旧文件保持不变。
/// 同一键的并发写入以最后一次为准。
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
    state: Mutex<FileState>,
}

impl JsonFileStore {
    /// 打开（或新建）缓存文件
    ///
    /// 文件损坏或无法读取时记录警告并以空缓存启动。
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = read_entries(&path).await.unwrap_or_default();
        if entries.is_empty() {
            debug!("Starting with an empty cache at {}", path.display());
        } else {
            info!("Loaded {} cached entries from {}", entries.len(), path.display());
        }

        Ok(Self {
            write_lock: path_lock(&path),
            path,
            state: Mutex::new(FileState { entries, unsaved: HashSet::new(), closed: false }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 合并磁盘内容后落盘，调用方持有 `state` 锁
    async fn flush(&self, state: &mut FileState) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        if let Some(on_disk) = read_entries(&self.path).await {
            for (key, value) in on_disk {
                if !state.unsaved.contains(&key) {
                    state.entries.insert(key, value);
                }
            }
        }

        self.write_atomically(&state.entries).await?;
        state.unsaved.clear();
        Ok(())
    }

    async fn write_atomically(&self, entries: &Map<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let file_name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "cache".to_string());
        let temp_path = self.path.with_file_name(format!(
            "{}.{}.{}.tmp",
            file_name,
            std::process::id(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));

        let serialized = serde_json::to_vec_pretty(entries)?;
        let written = async {
            let mut file = tokio::fs::File::create(&temp_path).await?;
            file.write_all(&serialized).await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::rename(&temp_path, &self.path).await
        }
        .await;

        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        debug!("Wrote {} cached entries to {}", entries.len(), self.path.display());
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let state = self.state.lock().await;
        if state.closed {
            return Err(closed_error());
        }
        match state.entries.get(key) {
            Some(Value::String(value)) => Ok(Some(value.clone())),
            Some(other) => {
                debug!("Ignoring non-string cache value for {}: {}", key, other);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(closed_error());
        }
        state.entries.insert(key.to_string(), Value::String(value.to_string()));
        state.unsaved.insert(key.to_string());
        self.flush(&mut state).await
    }

    async fn close(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Ok(());
        }
        if !state.unsaved.is_empty() {
            self.flush(&mut state).await?;
        }
        state.closed = true;
        debug!("Closed cache file {}", self.path.display());
        Ok(())
    }
}

impl Drop for JsonFileStore {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if !state.closed && !state.unsaved.is_empty() {
            warn!(
                "Cache file {} dropped with {} unsaved entries; call close() first",
                self.path.display(),
                state.unsaved.len()
            );
        }
    }
}

/// 纯内存存储，进程退出即丢失
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
    closed: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        if self.is_closed() {
            return Err(closed_error());
        }
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        if self.is_closed() {
            return Err(closed_error());
        }
        self.entries.write().await.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
