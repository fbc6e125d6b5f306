// 配置管理模块

use crate::uploader::{MAX_FILE_SIZE_IN_BYTES, MAX_NUM_UPLOADS, MAX_PARALLEL_UPLOADS};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

/// 默认配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "config/app.toml";

/// 访问令牌环境变量（配置文件未填写时使用）
pub const API_TOKEN_ENV: &str = "UPLOADER_API_TOKEN";

/// 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// 服务器配置
    #[serde(default)]
    pub server: ServerConfig,
    /// 上传配置
    #[serde(default)]
    pub upload: UploadConfig,
    /// 对象存储配置
    #[serde(default)]
    pub storage: StorageConfig,
    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    pub host: String,
    /// 监听端口
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 18890,
        }
    }
}

/// 上传配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// 队列中最多跟踪的文件数
    #[serde(default = "default_max_num_uploads")]
    pub max_num_uploads: usize,
    /// 同时上传的最大文件数
    #[serde(default = "default_max_parallel_uploads")]
    pub max_parallel_uploads: usize,
    /// 单文件大小上限（字节）
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// 桶信息刷新合并窗口（毫秒）
    #[serde(default = "default_refresh_debounce_ms")]
    pub refresh_debounce_ms: u64,
    /// 上传文件夹时是否跳过隐藏文件（以.开头的文件/文件夹）
    #[serde(default)]
    pub skip_hidden_files: bool,
}

fn default_max_num_uploads() -> usize {
    MAX_NUM_UPLOADS
}

fn default_max_parallel_uploads() -> usize {
    MAX_PARALLEL_UPLOADS
}

fn default_max_file_size() -> u64 {
    MAX_FILE_SIZE_IN_BYTES
}

fn default_refresh_debounce_ms() -> u64 {
    3000
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_num_uploads: default_max_num_uploads(),
            max_parallel_uploads: default_max_parallel_uploads(),
            max_file_size: default_max_file_size(),
            refresh_debounce_ms: default_refresh_debounce_ms(),
            skip_hidden_files: false,
        }
    }
}

/// 对象存储配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// API 根地址
    #[serde(default = "default_api_root")]
    pub api_root: String,
    /// 集群 ID，如 us-east-1
    #[serde(default)]
    pub cluster: String,
    /// 目标桶
    #[serde(default)]
    pub bucket: String,
    /// 访问令牌（为空时读取环境变量）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
    /// API 请求超时（秒）
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_api_root() -> String {
    "https://api.linode.com/v4".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            api_root: default_api_root(),
            cluster: String::new(),
            bucket: String::new(),
            api_token: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl StorageConfig {
    /// 访问令牌：配置优先，其次环境变量
    pub fn resolve_token(&self) -> Option<String> {
        self.api_token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| std::env::var(API_TOKEN_ENV).ok().filter(|t| !t.trim().is_empty()))
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// 是否启用日志文件持久化
    #[serde(default = "default_log_enabled")]
    pub enabled: bool,
    /// 日志文件保存目录
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// 日志保留天数（默认 7 天）
    #[serde(default = "default_log_retention_days")]
    pub retention_days: u32,
    /// 日志级别（默认 info）
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_enabled() -> bool {
    true
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_retention_days() -> u32 {
    7
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: default_log_enabled(),
            log_dir: default_log_dir(),
            retention_days: default_log_retention_days(),
            level: default_log_level(),
        }
    }
}

impl AppConfig {
    /// 从文件加载配置
    pub async fn load_from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .context("Failed to read config file")?;

        let config: AppConfig = toml::from_str(&content).context("Failed to parse config file")?;

        if config.upload.max_parallel_uploads == 0 {
            anyhow::bail!("配置错误：max_parallel_uploads 必须大于 0");
        }

        Ok(config)
    }

    /// 保存配置到文件
    pub async fn save_to_file(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        // 确保父目录存在
        if let Some(parent) = std::path::Path::new(path).parent() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create config directory")?;
        }

        fs::write(path, content)
            .await
            .context("Failed to write config file")?;

        tracing::info!("✓ 配置已保存: {}", path);
        Ok(())
    }

    /// 加载配置，失败时使用默认配置
    pub async fn load_or_default(path: &str) -> Self {
        match Self::load_from_file(path).await {
            Ok(config) => {
                tracing::info!("配置文件加载成功: {}", path);
                config
            }
            Err(e) => {
                tracing::warn!("配置文件加载失败，使用默认配置: {:#}", e);
                Self::default()
            }
        }
    }
}
