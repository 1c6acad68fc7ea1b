//! 配置管理模块
//!
//! 提供TOML配置文件的读取、写入和自动发现功能。

use crate::error::{Result, TranslationError};
use crate::types::{CacheConfig, TranslationConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// 翻译库配置结构
///
/// 包含模型服务和缓存的配置选项，支持从TOML文件加载和保存。
///
/// # 示例
///
/// ```rust,no_run
/// use katakana_translator::KatakanaLibConfig;
///
/// // 从默认位置加载配置
/// let config = KatakanaLibConfig::load_from_default_locations();
///
/// // 从指定文件加载配置
/// let config = KatakanaLibConfig::from_file("config.toml").unwrap();
///
/// // 保存配置到文件
/// config.save_to_file("output.toml").unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KatakanaLibConfig {
    /// 模型服务配置
    #[serde(default)]
    pub translation: TranslationConfig,
    /// 缓存配置
    #[serde(default)]
    pub cache: CacheConfig,
}

impl KatakanaLibConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| TranslationError::Config(e.to_string()))
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| TranslationError::Config(e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration from multiple possible locations
    pub fn load_from_default_locations() -> Self {
        let possible_paths = [
            "katakana-config.toml",
            "config.toml",
            ".katakana-config.toml",
        ];

        for path in &possible_paths {
            if Path::new(path).exists() {
                match Self::from_file(path) {
                    Ok(config) => {
                        info!("Loaded configuration from: {}", path);
                        return config;
                    }
                    Err(e) => {
                        warn!("Failed to load config from {}: {}", path, e);
                    }
                }
            }
        }

        info!("No configuration file found, using defaults");
        Self::default()
    }

    /// Generate example configuration file
    pub fn generate_example_config<P: AsRef<Path>>(path: P) -> Result<()> {
        Self::default().save_to_file(path)
    }
}
