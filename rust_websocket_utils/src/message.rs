// rust_websocket_utils/src/message.rs

//! 定义套接字 RPC 通信中使用的帧结构。
//!
//! - 出站帧 `OutboundFrame`: `{ "id": <关联ID>, "command": <命令>, "parameters": {…} }`。
//! - 入站帧 `InboundFrame`: 进度帧 `{ id, progress }`、成功帧 `{ id, success: true, data | <载荷> }`、
//!   失败帧 `{ id, success: false, errorCode?, errorMessage? }`。
//!
//! 关联 ID 由客户端在发送时生成 (UUID v4)，服务端在每个相关的入站帧中原样回传，
//! 客户端据此把入站帧分派给对应的待决请求。

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::WsError;

/// 客户端发往服务端的请求帧。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct OutboundFrame {
    /// 关联 ID (UUID v4 字符串)。
    pub id: String,
    /// 命令名称，例如 `parse-file`。
    pub command: String,
    /// 命令参数，总是一个 JSON 对象。
    pub parameters: Value,
}

impl OutboundFrame {
    /// 创建一个新的出站帧，自动生成关联 ID。
    ///
    /// `parameters` 必须序列化为 JSON 对象或 `null` (`null` 会被替换为空对象)。
    pub fn new<T: Serialize + ?Sized>(command: &str, parameters: &T) -> Result<OutboundFrame, WsError> {
        let parameters = match serde_json::to_value(parameters) {
            Ok(Value::Null) => Value::Object(Map::new()),
            Ok(value @ Value::Object(_)) => value,
            Ok(other) => {
                return Err(WsError::SerializationError(format!(
                    "命令 '{}' 的参数必须是 JSON 对象，实际为: {}",
                    command, other
                )));
            }
            Err(e) => {
                return Err(WsError::SerializationError(format!(
                    "序列化命令 '{}' 的参数失败: {}",
                    command, e
                )));
            }
        };
        Ok(OutboundFrame {
            id: Uuid::new_v4().to_string(),
            command: command.to_string(),
            parameters,
        })
    }

    pub fn to_json(&self) -> Result<String, WsError> {
        serde_json::to_string(self)
            .map_err(|e| WsError::SerializationError(format!("出站帧序列化为JSON失败: {}", e)))
    }

    /// 将参数反序列化为指定类型 (主要供服务端或测试替身使用)。
    pub fn parameters_as<T: for<'de> Deserialize<'de>>(&self) -> Result<T, WsError> {
        serde_json::from_value(self.parameters.clone()).map_err(|e| {
            WsError::DeserializationError(format!("命令 '{}' 的参数反序列化失败: {}", self.command, e))
        })
    }
}

/// 服务端发往客户端的响应帧。
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// 非终止的进度通知，`progress` 取值 0..1。
    Progress { id: String, progress: f64 },
    /// 终止的成功结果。
    Success { id: String, data: Value },
    /// 终止的失败结果。
    Failure {
        id: String,
        error_code: Option<String>,
        error_message: Option<String>,
    },
}

impl InboundFrame {
    pub fn progress(id: impl Into<String>, progress: f64) -> Self {
        InboundFrame::Progress { id: id.into(), progress }
    }

    pub fn success(id: impl Into<String>, data: Value) -> Self {
        InboundFrame::Success { id: id.into(), data }
    }

    pub fn failure(id: impl Into<String>, error_code: Option<&str>, error_message: Option<&str>) -> Self {
        InboundFrame::Failure {
            id: id.into(),
            error_code: error_code.map(str::to_string),
            error_message: error_message.map(str::to_string),
        }
    }

    /// 是否为终止帧 (成功或失败)。
    pub fn is_terminal(&self) -> bool {
        !matches!(self, InboundFrame::Progress { .. })
    }

    /// 从 JSON 文本解析入站帧。
    ///
    /// 成功帧优先取 `data` 字段作为结果；没有 `data` 字段时，除 `id`/`success` 以外的其余字段
    /// 组成的对象即为结果。失败帧兼容旧格式的 `error` 字段作为错误信息。
    pub fn parse(text: &str) -> Result<InboundFrame, WsError> {
        let value: Value = serde_json::from_str(text).map_err(|e| {
            WsError::DeserializationError(format!("入站帧不是合法的JSON: {}, 原始文本: '{}'", e, text))
        })?;
        let Value::Object(mut object) = value else {
            return Err(WsError::DeserializationError(format!("入站帧必须是JSON对象, 原始文本: '{}'", text)));
        };

        let id = match object.remove("id") {
            Some(Value::String(id)) => id,
            _ => {
                return Err(WsError::DeserializationError(format!(
                    "入站帧缺少字符串类型的关联ID字段 'id', 原始文本: '{}'",
                    text
                )));
            }
        };

        match object.remove("success") {
            Some(Value::Bool(true)) => {
                let data = match object.remove("data") {
                    Some(data) => data,
                    None => Value::Object(object),
                };
                Ok(InboundFrame::Success { id, data })
            }
            Some(Value::Bool(false)) => {
                let error_code = take_string(&mut object, "errorCode");
                let error_message = take_string(&mut object, "errorMessage").or_else(|| take_string(&mut object, "error"));
                Ok(InboundFrame::Failure { id, error_code, error_message })
            }
            Some(other) => Err(WsError::DeserializationError(format!(
                "入站帧的 'success' 字段必须是布尔值，实际为: {}",
                other
            ))),
            None => match object.get("progress").and_then(Value::as_f64) {
                Some(progress) => Ok(InboundFrame::Progress { id, progress }),
                None => Err(WsError::DeserializationError(format!(
                    "无法识别的入站帧 (既不是进度帧也不是终止帧), 原始文本: '{}'",
                    text
                ))),
            },
        }
    }

    /// 序列化为线路上的 JSON 文本 (供服务端或测试替身使用)。
    pub fn to_json(&self) -> Result<String, WsError> {
        let mut object = Map::new();
        match self {
            InboundFrame::Progress { id, progress } => {
                object.insert("id".to_string(), Value::String(id.clone()));
                object.insert("progress".to_string(), Value::from(*progress));
            }
            InboundFrame::Success { id, data } => {
                object.insert("id".to_string(), Value::String(id.clone()));
                object.insert("success".to_string(), Value::Bool(true));
                object.insert("data".to_string(), data.clone());
            }
            InboundFrame::Failure { id, error_code, error_message } => {
                object.insert("id".to_string(), Value::String(id.clone()));
                object.insert("success".to_string(), Value::Bool(false));
                if let Some(code) = error_code {
                    object.insert("errorCode".to_string(), Value::String(code.clone()));
                }
                if let Some(message) = error_message {
                    object.insert("errorMessage".to_string(), Value::String(message.clone()));
                }
            }
        }
        serde_json::to_string(&Value::Object(object))
            .map_err(|e| WsError::SerializationError(format!("入站帧序列化为JSON失败: {}", e)))
    }
}

fn take_string(object: &mut Map<String, Value>, key: &str) -> Option<String> {
    match object.remove(key) {
        Some(Value::String(s)) => Some(s),
        _ => None,
    }
}
