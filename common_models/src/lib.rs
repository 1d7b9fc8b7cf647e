//! `common_models` 公共模型库 crate。
//!
//! 本 crate 集中定义了工作区导入客户端各个 Rust 组件 (`rust_websocket_utils` 传输层、
//! `workspace_client` 应用层) 之间共享的数据结构与枚举。
//!
//! 主要包含：
//! - **通用枚举 (`enums`)**: 工作区对象类别 `WorkspaceObjectType` 及其固定处理顺序。
//! - **套接字载荷 (`ws_payloads`)**: RPC 命令名称常量与各命令的参数结构体。
//! - **测量模型 (`measurement`)**: 设备上报的原始测量载荷，以及转换后的规范化测量样本。
//! - **导入模型 (`import`)**: 导入请求与导入编排器的可观察状态。
//! - **工作区模型 (`workspace`)**: 工作区暂存条目与快照。
//!
//! 所有模型都派生 `serde::Serialize`/`serde::Deserialize`、`Debug` 与 `Clone`，
//! JSON 字段统一采用 camelCase，与服务端保持一致。

pub mod enums;
pub mod import;
pub mod measurement;
pub mod workspace;
pub mod ws_payloads;

pub use enums::WorkspaceObjectType;
pub use import::{ImportRequest, ImportState};
pub use workspace::{WorkspaceEntry, WorkspaceSnapshot};
