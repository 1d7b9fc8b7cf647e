// workspace_client/src/event.rs

//! 导入过程中向订阅者广播的事件。

use common_models::WorkspaceObjectType;
use serde::{Deserialize, Serialize};

/// 导入事件。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ImportEvent {
    /// 进度更新。单次导入内 `progress` 单调不减。
    #[serde(rename_all = "camelCase")]
    Progress { progress: f64 },

    /// 某一类别结算完毕且至少有一个对象导入成功。
    #[serde(rename_all = "camelCase")]
    GroupImported {
        object_type: WorkspaceObjectType,
        imported_count: usize,
    },

    /// 单个对象导入失败，`reason` 为用户提示文本。
    #[serde(rename_all = "camelCase")]
    ObjectRejected {
        object_type: WorkspaceObjectType,
        object_id: String,
        reason: String,
    },

    /// 导入结束。`cancelled` 为真表示被取消。
    #[serde(rename_all = "camelCase")]
    Finished { cancelled: bool },

    /// 完成后的延迟归零已执行，进度回到 0。
    ProgressReset,
}
