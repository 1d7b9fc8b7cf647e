// workspace_client/src/config.rs

//! 客户端配置管理。
//!
//! 配置以 JSON 文件保存 (默认 `config/workspace_client.json`)。
//! 文件不存在时生成默认配置并写回磁盘；文件存在但内容无法解析时报错，不会被默认值覆盖。

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::error::ConfigError;

/// 客户端配置。
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct AppConfig {
    /// 转换/导入服务的 WebSocket 地址，例如 `ws://localhost:8088/ws`。
    pub socket_url: String,

    /// 工作区 REST 服务的基础地址。
    pub workspace_base_url: String,

    /// 当前应用 (租户) 标识，随导入请求与 `x-application-id` 请求头发送。
    pub application_id: String,

    /// 会话令牌，作为 `x-auth-token` 请求头以及套接字 URL 的 `token` 查询参数。
    pub auth_token: String,

    /// 日志级别过滤串，语法同 `RUST_LOG`，例如 `"info"` 或 `"info,workspace_client=debug"`。
    pub log_level: String,

    /// 每个对象类别内同时进行的导入请求上限。
    pub import_concurrency: usize,

    /// 导入完成后进度条自动归零的延迟 (毫秒)。
    pub progress_reset_delay_ms: u64,

    pub http_timeout_seconds: u64,

    /// 轮询工作区的间隔 (毫秒)。
    pub workspace_poll_interval_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            socket_url: "ws://localhost:8088/ws".to_string(),
            workspace_base_url: "http://localhost:8088/api".to_string(),
            application_id: "default-application".to_string(),
            auth_token: String::new(),
            log_level: "info".to_string(),
            import_concurrency: 4,
            progress_reset_delay_ms: 1500,
            http_timeout_seconds: 30,
            workspace_poll_interval_ms: 5000,
        }
    }
}

impl AppConfig {
    /// 校验配置值：并发上限必须大于 0，两个地址必须可解析且协议正确。
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.import_concurrency == 0 {
            return Err(ConfigError::Invalid("importConcurrency 必须大于 0".to_string()));
        }
        let socket_url = Url::parse(&self.socket_url)
            .map_err(|e| ConfigError::Invalid(format!("socketUrl '{}' 无法解析: {}", self.socket_url, e)))?;
        if !matches!(socket_url.scheme(), "ws" | "wss") {
            return Err(ConfigError::Invalid(format!(
                "socketUrl 必须使用 ws/wss 协议，实际为: {}",
                socket_url.scheme()
            )));
        }
        let base_url = Url::parse(&self.workspace_base_url).map_err(|e| {
            ConfigError::Invalid(format!("workspaceBaseUrl '{}' 无法解析: {}", self.workspace_base_url, e))
        })?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(format!(
                "workspaceBaseUrl 必须使用 http/https 协议，实际为: {}",
                base_url.scheme()
            )));
        }
        if self.application_id.trim().is_empty() {
            return Err(ConfigError::Invalid("applicationId 不能为空".to_string()));
        }
        if self.workspace_poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("workspacePollIntervalMs 必须大于 0".to_string()));
        }
        Ok(())
    }

    pub fn progress_reset_delay(&self) -> Duration {
        Duration::from_millis(self.progress_reset_delay_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_seconds)
    }

    pub fn workspace_poll_interval(&self) -> Duration {
        Duration::from_millis(self.workspace_poll_interval_ms)
    }
}

/// 默认配置文件路径 (相对当前工作目录)。
pub fn default_config_path() -> PathBuf {
    PathBuf::from(".").join("config").join("workspace_client.json")
}

/// 加载配置。文件不存在时写出并返回默认配置。
pub fn load_app_config(path: &Path) -> Result<AppConfig, ConfigError> {
    if path.exists() {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: AppConfig = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!("[配置模块] 已加载配置文件: {}", path.display());
        Ok(config)
    } else {
        warn!("[配置模块] 配置文件 '{}' 未找到，将使用默认配置创建新文件。", path.display());
        let config = AppConfig::default();
        save_app_config(path, &config)?;
        Ok(config)
    }
}

/// 保存配置，必要时创建父目录。
pub fn save_app_config(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }
    let content = serde_json::to_string_pretty(config).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    info!("[配置模块] 配置已保存至: {}", path.display());
    Ok(())
}
