// workspace_client/src/rpc/error_codes.rs

//! 服务端错误码到用户提示文本的固定映射。

/// 未登记错误码使用的通用提示。
pub const UNKNOWN_ERROR_MESSAGE: &str = "发生未知错误";

const ERROR_MESSAGES: &[(&str, &str)] = &[
    ("INVALID_FILE_FORMAT", "文件格式无效或不受支持"),
    ("FILE_TOO_LARGE", "文件过大"),
    ("OBJECT_NOT_FOUND", "工作区中找不到该对象"),
    ("OBJECT_ALREADY_EXISTS", "该对象已存在于正式库中"),
    ("UNAUTHORIZED", "会话无效或已过期，请重新登录"),
    ("PANTONE_LIVE_AUTH_FAILED", "PantoneLIVE 账号认证失败"),
    ("PANTONE_LIVE_PALETTE_NOT_FOUND", "找不到指定的 PantoneLIVE 色板"),
    ("WORKSPACE_EMPTY", "工作区为空"),
];

/// 查询已登记错误码的提示文本。错误码精确匹配。
pub fn describe(code: &str) -> Option<&'static str> {
    ERROR_MESSAGES.iter().find(|(known, _)| *known == code).map(|(_, text)| *text)
}

/// 组合用户提示文本：已知错误码取表中文本，否则取通用提示；有原始信息时附加在后面。
pub fn user_message(code: Option<&str>, raw_message: Option<&str>) -> String {
    let base = code.and_then(describe).unwrap_or(UNKNOWN_ERROR_MESSAGE);
    match raw_message.map(str::trim).filter(|m| !m.is_empty()) {
        Some(raw) => format!("{}: {}", base, raw),
        None => base.to_string(),
    }
}
