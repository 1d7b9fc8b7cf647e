//! 工作区暂存对象的模型。

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::enums::WorkspaceObjectType;

/// 工作区列表接口返回的单个暂存条目。
///
/// 除 `id` 与 `name` 外的字段随对象类别而不同，统一保留在 `attributes` 中。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceEntry {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(flatten)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

/// 某一时刻工作区的完整视图。
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceSnapshot {
    pub entries: BTreeMap<WorkspaceObjectType, Vec<WorkspaceEntry>>,
    pub is_empty: bool,
}

impl WorkspaceSnapshot {
    /// 由各类别的条目构建快照，并计算 `is_empty`。
    pub fn from_entries(entries: BTreeMap<WorkspaceObjectType, Vec<WorkspaceEntry>>) -> Self {
        let is_empty = entries.values().all(Vec::is_empty);
        Self { entries, is_empty }
    }

    pub fn entries_of(&self, object_type: WorkspaceObjectType) -> &[WorkspaceEntry] {
        self.entries.get(&object_type).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn total_entries(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }
}
