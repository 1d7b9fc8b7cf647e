//! 导入请求与导入状态模型。

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::enums::WorkspaceObjectType;

/// 一次导入请求：对象类别 → 该类别下要导入的对象 ID 集合。
///
/// 同一类别内 ID 唯一且无序。序列化形状为 `{ "standards": ["s1", "s2"], ... }`。
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct ImportRequest {
    groups: BTreeMap<WorkspaceObjectType, BTreeSet<String>>,
}

impl ImportRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// 构建器风格地追加某一类别的 ID。
    pub fn with_ids<I, S>(mut self, object_type: WorkspaceObjectType, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert_ids(object_type, ids);
        self
    }

    pub fn insert_ids<I, S>(&mut self, object_type: WorkspaceObjectType, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups
            .entry(object_type)
            .or_default()
            .extend(ids.into_iter().map(Into::into));
    }

    /// 某一类别的 ID 集合 (可能为空)。
    pub fn ids(&self, object_type: WorkspaceObjectType) -> Option<&BTreeSet<String>> {
        self.groups.get(&object_type)
    }

    /// 按固定处理顺序返回所有非空分组。
    pub fn non_empty_groups(&self) -> Vec<(WorkspaceObjectType, &BTreeSet<String>)> {
        WorkspaceObjectType::PROCESSING_ORDER
            .iter()
            .filter_map(|t| self.groups.get(t).filter(|ids| !ids.is_empty()).map(|ids| (*t, ids)))
            .collect()
    }

    pub fn total_ids(&self) -> usize {
        self.groups.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_ids() == 0
    }
}

/// 导入编排器对外可观察的状态。
///
/// 一个 ID 在其导入结算后恰好出现在三个集合之一，结算前不出现在任何集合中。
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImportState {
    /// 进度，取值 [0, 1]，单次调用内单调不减。
    pub progress: f64,
    pub loading: bool,
    pub imported_object_ids: Vec<String>,
    pub rejected_object_ids: Vec<String>,
    /// 因取消或连接关闭而中止的 ID，既不算导入成功也不算被拒绝。
    pub cancelled_object_ids: Vec<String>,
}

impl ImportState {
    pub fn is_settled(&self, object_id: &str) -> bool {
        self.imported_object_ids.iter().any(|id| id == object_id)
            || self.rejected_object_ids.iter().any(|id| id == object_id)
            || self.cancelled_object_ids.iter().any(|id| id == object_id)
    }
}
