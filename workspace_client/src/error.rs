// workspace_client/src/error.rs

//! 工作区导入客户端的错误类型。
//!
//! 按层划分：
//! - `RpcError`: 套接字 RPC 调用的结果错误 (传输、协议、取消)。
//! - `ConversionError`: 测量数据转换管线的校验错误，携带点分字段路径。
//! - `WorkspaceError`: 工作区 REST 接口错误。
//! - `ConfigError`: 配置文件读写与校验错误。
//! - `AppError`: 汇总以上错误，供上层统一处理。

use rust_websocket_utils::WsError;
use std::path::PathBuf;
use thiserror::Error;

use crate::rpc::error_codes;

#[derive(Error, Debug)]
pub enum RpcError {
    /// 建连失败、连接意外关闭、写出失败等传输层错误。
    #[error("传输错误: {0}")]
    Transport(#[source] WsError),

    /// 服务端返回的失败帧。`message` 是查表得到的用户提示文本。
    #[error("{message}")]
    Protocol {
        code: Option<String>,
        message: String,
        raw: Option<String>,
    },

    /// 请求被取消 (调用方取消，或连接被主动关闭后请求被丢弃)。
    #[error("请求已取消")]
    Cancelled,

    #[error("响应格式不符合预期: {0}")]
    UnexpectedResponse(String),

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error("读取文件 '{path}' 失败: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RpcError {
    /// 取消不算失败：导入编排器据此把 ID 记入已取消集合而不是被拒绝集合。
    pub fn is_cancellation(&self) -> bool {
        matches!(self, RpcError::Cancelled)
    }

    /// 服务端错误码 (仅协议错误有)。
    pub fn code(&self) -> Option<&str> {
        match self {
            RpcError::Protocol { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

impl From<WsError> for RpcError {
    fn from(error: WsError) -> Self {
        match error {
            WsError::RemoteFailure { code, message } => RpcError::Protocol {
                message: error_codes::user_message(code.as_deref(), message.as_deref()),
                code,
                raw: message,
            },
            other => RpcError::Transport(other),
        }
    }
}

/// 转换管线的校验错误。每个变体都携带出错字段的点分路径，
/// 例如 `measurementData.measurementSet.measurements[0].colorValues.ma9x[1].geometry`。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConversionError {
    #[error("缺少必填字段: {path}")]
    MissingField { path: String },

    #[error("未知的几何条件 '{geometry}' ({path})")]
    UnknownGeometry { path: String, geometry: String },

    #[error("不支持的 45/0 光源与滤光片组合 {illumination:?}/{filter:?} ({path})")]
    UnsupportedIlluminationFilter {
        path: String,
        illumination: Option<String>,
        filter: Option<String>,
    },

    #[error("未知的变换模式 '{mode}' ({path})")]
    UnknownTransformationMode { path: String, mode: String },

    #[error("光谱数据解码失败 ({path}): {reason}")]
    InvalidEncoding { path: String, reason: String },

    #[error("无效的时间戳 {timestamp} ({path})")]
    InvalidTimestamp { path: String, timestamp: i64 },

    #[error("光谱数据为空 ({path})")]
    EmptySpectrum { path: String },
}

impl ConversionError {
    pub fn missing(path: impl Into<String>) -> Self {
        ConversionError::MissingField { path: path.into() }
    }

    /// 出错字段的点分路径。
    pub fn path(&self) -> &str {
        match self {
            ConversionError::MissingField { path }
            | ConversionError::UnknownGeometry { path, .. }
            | ConversionError::UnsupportedIlluminationFilter { path, .. }
            | ConversionError::UnknownTransformationMode { path, .. }
            | ConversionError::InvalidEncoding { path, .. }
            | ConversionError::InvalidTimestamp { path, .. }
            | ConversionError::EmptySpectrum { path } => path,
        }
    }
}

#[derive(Error, Debug)]
pub enum WorkspaceError {
    #[error("HTTP 请求失败: {0}")]
    Http(#[from] reqwest::Error),

    #[error("工作区接口返回错误状态 {status}: {body}")]
    Status { status: u16, body: String },

    #[error("无效的工作区地址: {0}")]
    Url(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("读写配置文件 '{path}' 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("解析配置文件 '{path}' 失败: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("配置无效: {0}")]
    Invalid(String),
}

/// 汇总错误。
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
