// workspace_client/src/import/mod.rs

//! 工作区对象的批量导入编排。

pub mod orchestrator;

use async_trait::async_trait;
use common_models::WorkspaceObjectType;

use crate::error::RpcError;

pub use orchestrator::{ImportOrchestrator, OrchestratorOptions};

/// 导入单个工作区对象的能力。`RpcClient` 是生产实现，测试中可替换为替身。
#[async_trait]
pub trait ObjectImporter: Send + Sync {
    async fn import_object(&self, object_type: WorkspaceObjectType, object_id: &str) -> Result<(), RpcError>;
}
