//! 通用枚举模块。
//!
//! 本模块定义了在工作区导入客户端各个组件之间共享的枚举类型，
//! 其中最核心的是 `WorkspaceObjectType`：工作区中暂存对象的类别。
//!
//! 所有枚举都派生 `Serialize`, `Deserialize`, `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`，
//! 以便在线路载荷、REST 路径以及 `HashMap`/`BTreeMap` 键中直接使用。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 工作区中可暂存、可导入的对象类别。
///
/// 变体的声明顺序即导入编排器处理各组的固定顺序
/// (standards → substrates → assortments → recipes → trials → thicknessobjects)，
/// 因此 `Ord` 的派生结果与处理顺序一致，调用方无法改变该顺序。
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum WorkspaceObjectType {
    /// 标准样 (颜色标准)。
    Standards,
    /// 基材。
    Substrates,
    /// 色卡组 / 配色集合。
    Assortments,
    /// 配方。
    Recipes,
    /// 试样。
    Trials,
    /// 厚度对象。
    Thicknessobjects,
}

impl WorkspaceObjectType {
    /// 导入编排器处理对象组时使用的固定顺序。
    pub const PROCESSING_ORDER: [WorkspaceObjectType; 6] = [
        WorkspaceObjectType::Standards,
        WorkspaceObjectType::Substrates,
        WorkspaceObjectType::Assortments,
        WorkspaceObjectType::Recipes,
        WorkspaceObjectType::Trials,
        WorkspaceObjectType::Thicknessobjects,
    ];

    /// 返回该类别在线路协议和 REST 路径中使用的小写名称。
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkspaceObjectType::Standards => "standards",
            WorkspaceObjectType::Substrates => "substrates",
            WorkspaceObjectType::Assortments => "assortments",
            WorkspaceObjectType::Recipes => "recipes",
            WorkspaceObjectType::Trials => "trials",
            WorkspaceObjectType::Thicknessobjects => "thicknessobjects",
        }
    }
}

impl fmt::Display for WorkspaceObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 无法识别的对象类别名称。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownObjectType(pub String);

impl fmt::Display for UnknownObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "未知的工作区对象类别: '{}'", self.0)
    }
}

impl std::error::Error for UnknownObjectType {}

impl FromStr for WorkspaceObjectType {
    type Err = UnknownObjectType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WorkspaceObjectType::PROCESSING_ORDER
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownObjectType(s.to_string()))
    }
}
