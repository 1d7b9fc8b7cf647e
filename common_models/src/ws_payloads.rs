// common_models/src/ws_payloads.rs

//! 套接字 RPC 协议中使用的命令名称与参数载荷。
//!
//! 每个出站帧都是 `{ id, command, parameters }` 的形式，其中 `command` 取自本模块的常量，
//! `parameters` 是对应参数结构体序列化后的 JSON 对象 (字段采用 camelCase)。

use serde::{Deserialize, Serialize};

use crate::enums::WorkspaceObjectType;

/// 解析上传文件。
pub const PARSE_FILE_COMMAND: &str = "parse-file";
/// 将工作区中的单个对象导入永久存储。
pub const IMPORT_FROM_WORKSPACE_COMMAND: &str = "import-from-workspace";
/// 设置 PantoneLIVE 认证凭据。
pub const SET_PANTONE_LIVE_CREDENTIALS_COMMAND: &str = "set-pantone-live-credentials";
/// 列出 PantoneLIVE 色板。
pub const LIST_PANTONE_LIVE_PALETTES_COMMAND: &str = "list-pantone-live-palettes";
/// 选择 PantoneLIVE 色板。
pub const SELECT_PANTONE_LIVE_PALETTE_COMMAND: &str = "select-pantone-live-palette";

/// `parse-file` 命令的参数。文件内容以 Base64 编码传输。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ParseFileParameters {
    /// 原始文件名 (不含目录)，服务端据此判断文件格式。
    pub file_name: String,
    /// Base64 编码的文件内容。
    pub content: String,
}

/// `import-from-workspace` 命令的参数：一次只导入一个对象。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImportObjectParameters {
    pub application_id: String,
    #[serde(rename = "type")]
    pub object_type: WorkspaceObjectType,
    #[serde(rename = "id")]
    pub object_id: String,
}

/// `set-pantone-live-credentials` 命令的参数。
#[derive(Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PantoneLiveCredentials {
    pub username: String,
    pub password: String,
}

// 手写 Debug，避免密码进入日志。
impl std::fmt::Debug for PantoneLiveCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PantoneLiveCredentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// `select-pantone-live-palette` 命令的参数。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SelectPaletteParameters {
    pub palette_id: String,
}

/// `list-pantone-live-palettes` 结果中的单个色板。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PantoneLivePalette {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub color_count: Option<u32>,
}

/// 空参数对象，序列化为 `{}`。
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct EmptyParameters {}
