// workspace_client/src/state.rs

//! 客户端共享状态：把配置、会话池、RPC 客户端、导入编排器与工作区服务装配在一起。
//!
//! 对外的四个主要操作 `upload`、`import_workspace_objects`、`get_workspace`、`convert`
//! 都可以直接在 `AppState` 上调用。

use common_models::measurement::{DeviceMeasurementPayload, Measurement};
use common_models::{ImportRequest, ImportState, WorkspaceSnapshot};
use log::info;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::conversion;
use crate::error::{AppError, ConversionError, RpcError, WorkspaceError};
use crate::import::{ImportOrchestrator, OrchestratorOptions};
use crate::rpc::{RpcClient, SessionPool, UploadOutcome};
use crate::workspace::WorkspaceService;

pub struct AppState {
    config: AppConfig,
    sessions: SessionPool,
    rpc: Arc<RpcClient>,
    orchestrator: ImportOrchestrator<RpcClient>,
    workspace: WorkspaceService,
}

impl AppState {
    /// 按配置装配全部服务，并以配置中的令牌打开会话连接。
    pub async fn connect(config: AppConfig) -> Result<Self, AppError> {
        config.validate()?;
        let sessions = SessionPool::new(config.socket_url.clone(), config.application_id.clone());
        let rpc = sessions.open(&config.auth_token).await?;
        let workspace = WorkspaceService::from_config(&config)?;
        let orchestrator = ImportOrchestrator::new(Arc::clone(&rpc), OrchestratorOptions::from_config(&config));
        info!("[应用状态] 服务装配完成 (应用: {})", config.application_id);
        Ok(Self {
            config,
            sessions,
            rpc,
            orchestrator,
            workspace,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn rpc(&self) -> &RpcClient {
        &self.rpc
    }

    pub fn orchestrator(&self) -> &ImportOrchestrator<RpcClient> {
        &self.orchestrator
    }

    pub fn workspace(&self) -> &WorkspaceService {
        &self.workspace
    }

    pub async fn upload(
        &self,
        path: &Path,
        on_progress: impl FnMut(f64) + Send + 'static,
    ) -> Result<UploadOutcome, RpcError> {
        self.rpc.upload(path, on_progress).await
    }

    pub async fn import_workspace_objects(&self, request: &ImportRequest, cancel: CancellationToken) -> ImportState {
        self.orchestrator.import_workspace_objects_with_cancel(request, cancel).await
    }

    pub async fn get_workspace(&self) -> Result<WorkspaceSnapshot, WorkspaceError> {
        self.workspace.get_workspace().await
    }

    pub fn convert(&self, payload: &DeviceMeasurementPayload) -> Result<Measurement, ConversionError> {
        conversion::convert(payload)
    }

    /// 关闭所有会话连接。
    pub async fn shutdown(&self) {
        self.orchestrator.cancel_progress_reset();
        self.sessions.close_all().await;
        info!("[应用状态] 已关闭所有会话。");
    }
}
