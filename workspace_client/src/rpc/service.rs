// workspace_client/src/rpc/service.rs

//! 套接字 RPC 客户端。
//!
//! 提供两种调用形式：
//! - 回调形式 (`parse_file`, `import`, `auth_pantone_live`, `list_pantone_live_palettes`,
//!   `select_palette_request`)：固定命令名的 `SocketTransport::send` 薄封装，结果全部经由回调通知；
//! - 可等待形式 (`call`, `upload`, `import_from_workspace`, `list_palettes`, ...)：
//!   通过 oneshot 通道把回调桥接为 `Result`。请求被丢弃 (连接主动关闭) 时返回 `RpcError::Cancelled`。
//!   等待方的 future 被丢弃时，对应的待决请求随之从传输中撤销。

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use common_models::measurement::{DeviceMeasurementPayload, Measurement};
use common_models::ws_payloads::{
    ImportObjectParameters, PantoneLiveCredentials, PantoneLivePalette, ParseFileParameters, SelectPaletteParameters,
    EmptyParameters, IMPORT_FROM_WORKSPACE_COMMAND, LIST_PANTONE_LIVE_PALETTES_COMMAND, PARSE_FILE_COMMAND,
    SELECT_PANTONE_LIVE_PALETTE_COMMAND, SET_PANTONE_LIVE_CREDENTIALS_COMMAND,
};
use common_models::WorkspaceObjectType;
use log::{debug, info};
use rust_websocket_utils::{RequestHandlers, SocketTransport, WsError};
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::oneshot;

use crate::conversion;
use crate::error::RpcError;
use crate::import::ObjectImporter;

/// 上传结果：服务端原始数据，以及 (若含测量数据) 转换后的规范化测量。
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub data: Value,
    pub measurement: Option<Measurement>,
}

/// 套接字 RPC 客户端。持有一个传输实例与当前应用标识。
#[derive(Debug)]
pub struct RpcClient {
    transport: Arc<SocketTransport>,
    application_id: String,
}

impl RpcClient {
    pub fn new(socket_url: impl Into<String>, application_id: impl Into<String>) -> Self {
        Self::with_transport(Arc::new(SocketTransport::new(socket_url)), application_id)
    }

    pub fn with_transport(transport: Arc<SocketTransport>, application_id: impl Into<String>) -> Self {
        Self {
            transport,
            application_id: application_id.into(),
        }
    }

    pub fn transport(&self) -> &SocketTransport {
        &self.transport
    }

    pub fn application_id(&self) -> &str {
        &self.application_id
    }

    /// 立即建立连接 (通常无需调用，首次请求时会惰性建连)。
    pub async fn open(&self) -> Result<(), RpcError> {
        self.transport.open().await.map_err(RpcError::from)
    }

    /// 主动关闭连接。未完成的请求被丢弃。
    pub async fn close(&self) {
        self.transport.close().await;
    }

    // --- 回调形式 ---

    /// 回调形式均返回已写出请求的关联ID，写出前失败时返回 `None` (失败已经由 `on_error` 通知)。
    pub async fn parse_file(&self, parameters: &ParseFileParameters, handlers: RequestHandlers) -> Option<String> {
        self.transport.send(PARSE_FILE_COMMAND, parameters, handlers).await
    }

    pub async fn import(
        &self,
        object_type: WorkspaceObjectType,
        object_id: &str,
        handlers: RequestHandlers,
    ) -> Option<String> {
        let parameters = ImportObjectParameters {
            application_id: self.application_id.clone(),
            object_type,
            object_id: object_id.to_string(),
        };
        self.transport.send(IMPORT_FROM_WORKSPACE_COMMAND, &parameters, handlers).await
    }

    pub async fn auth_pantone_live(
        &self,
        credentials: &PantoneLiveCredentials,
        handlers: RequestHandlers,
    ) -> Option<String> {
        self.transport.send(SET_PANTONE_LIVE_CREDENTIALS_COMMAND, credentials, handlers).await
    }

    pub async fn list_pantone_live_palettes(&self, handlers: RequestHandlers) -> Option<String> {
        self.transport
            .send(LIST_PANTONE_LIVE_PALETTES_COMMAND, &EmptyParameters {}, handlers)
            .await
    }

    pub async fn select_palette_request(&self, palette_id: &str, handlers: RequestHandlers) -> Option<String> {
        let parameters = SelectPaletteParameters {
            palette_id: palette_id.to_string(),
        };
        self.transport.send(SELECT_PANTONE_LIVE_PALETTE_COMMAND, &parameters, handlers).await
    }

    // --- 可等待形式 ---

    /// 发送任意命令并等待终止结果。
    pub async fn call<P>(
        &self,
        command: &str,
        parameters: &P,
        on_progress: Option<Box<dyn FnMut(f64) + Send + 'static>>,
    ) -> Result<Value, RpcError>
    where
        P: Serialize + Sync + ?Sized,
    {
        let (handlers, receiver) = bridge(on_progress);
        let request_id = self.transport.send(command, parameters, handlers).await;
        await_bridge(&self.transport, command, request_id, receiver).await
    }

    /// 读取文件并以 `parse-file` 上传。结果含 `measurementData` 时运行转换管线。
    pub async fn upload(
        &self,
        path: &Path,
        on_progress: impl FnMut(f64) + Send + 'static,
    ) -> Result<UploadOutcome, RpcError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| RpcError::File {
            path: path.to_path_buf(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        info!("[RPC客户端] 上传文件: {} ({} 字节)", file_name, bytes.len());

        let parameters = ParseFileParameters {
            file_name,
            content: general_purpose::STANDARD.encode(&bytes),
        };
        let data = self.call(PARSE_FILE_COMMAND, &parameters, Some(Box::new(on_progress))).await?;

        let measurement = if data.get("measurementData").is_some() {
            let payload: DeviceMeasurementPayload = serde_json::from_value(data.clone())
                .map_err(|e| RpcError::UnexpectedResponse(format!("测量数据结构无法解析: {}", e)))?;
            Some(conversion::convert(&payload)?)
        } else {
            debug!("[RPC客户端] 上传结果不含测量数据，跳过转换。");
            None
        };
        Ok(UploadOutcome { data, measurement })
    }

    /// 导入单个工作区对象并等待结果。
    pub async fn import_from_workspace(
        &self,
        object_type: WorkspaceObjectType,
        object_id: &str,
    ) -> Result<Value, RpcError> {
        let (handlers, receiver) = bridge(None);
        let request_id = self.import(object_type, object_id, handlers).await;
        await_bridge(&self.transport, IMPORT_FROM_WORKSPACE_COMMAND, request_id, receiver).await
    }

    pub async fn set_pantone_live_credentials(&self, credentials: &PantoneLiveCredentials) -> Result<(), RpcError> {
        self.call(SET_PANTONE_LIVE_CREDENTIALS_COMMAND, credentials, None).await.map(|_| ())
    }

    /// 列出 PantoneLIVE 色板。结果可以是数组，也可以是带 `palettes` 字段的对象。
    pub async fn list_palettes(&self) -> Result<Vec<PantoneLivePalette>, RpcError> {
        let data = self.call(LIST_PANTONE_LIVE_PALETTES_COMMAND, &EmptyParameters {}, None).await?;
        let list = match data {
            Value::Array(_) => data,
            Value::Object(mut object) => object
                .remove("palettes")
                .ok_or_else(|| RpcError::UnexpectedResponse("色板列表缺少 'palettes' 字段".to_string()))?,
            other => return Err(RpcError::UnexpectedResponse(format!("色板列表格式错误: {}", other))),
        };
        serde_json::from_value(list).map_err(|e| RpcError::UnexpectedResponse(format!("色板列表无法解析: {}", e)))
    }

    pub async fn select_palette(&self, palette_id: &str) -> Result<Value, RpcError> {
        let (handlers, receiver) = bridge(None);
        let request_id = self.select_palette_request(palette_id, handlers).await;
        await_bridge(&self.transport, SELECT_PANTONE_LIVE_PALETTE_COMMAND, request_id, receiver).await
    }
}

#[async_trait]
impl ObjectImporter for RpcClient {
    async fn import_object(&self, object_type: WorkspaceObjectType, object_id: &str) -> Result<(), RpcError> {
        self.import_from_workspace(object_type, object_id).await.map(|_| ())
    }
}

type BridgeSender = Arc<StdMutex<Option<oneshot::Sender<Result<Value, WsError>>>>>;

/// 构造把终止回调转发到 oneshot 通道的回调集合。
fn bridge(
    on_progress: Option<Box<dyn FnMut(f64) + Send + 'static>>,
) -> (RequestHandlers, oneshot::Receiver<Result<Value, WsError>>) {
    let (sender, receiver) = oneshot::channel();
    let sender: BridgeSender = Arc::new(StdMutex::new(Some(sender)));
    let result_sender = Arc::clone(&sender);
    let error_sender = sender;

    let mut handlers = RequestHandlers::new()
        .on_result(move |data| complete(&result_sender, Ok(data)))
        .on_error(move |error| complete(&error_sender, Err(error)));
    if let Some(mut on_progress) = on_progress {
        handlers = handlers.on_progress(move |p| on_progress(p));
    }
    (handlers, receiver)
}

fn complete(sender: &BridgeSender, outcome: Result<Value, WsError>) {
    let taken = sender.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).take();
    if let Some(sender) = taken {
        let _ = sender.send(outcome);
    }
}

/// 等待期间持有。等待方在结果到达前被丢弃 (例如导入被取消) 时撤销传输中的待决请求。
struct AbandonOnDrop<'a> {
    transport: &'a SocketTransport,
    request_id: Option<String>,
}

impl Drop for AbandonOnDrop<'_> {
    fn drop(&mut self) {
        if let Some(request_id) = self.request_id.take() {
            self.transport.abandon(&request_id);
        }
    }
}

async fn await_bridge(
    transport: &SocketTransport,
    command: &str,
    request_id: Option<String>,
    receiver: oneshot::Receiver<Result<Value, WsError>>,
) -> Result<Value, RpcError> {
    let mut guard = AbandonOnDrop { transport, request_id };
    let outcome = receiver.await;
    guard.request_id = None;
    match outcome {
        Ok(Ok(data)) => Ok(data),
        Ok(Err(error)) => Err(RpcError::from(error)),
        Err(_) => {
            debug!("[RPC客户端] 请求 '{}' 在完成前被丢弃。", command);
            Err(RpcError::Cancelled)
        }
    }
}
