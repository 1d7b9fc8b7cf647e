//! `workspace_client` 工作区导入客户端库。
//!
//! 组成部分：
//! - `rpc`: 基于 `rust_websocket_utils::SocketTransport` 的 RPC 客户端 (`RpcClient`)、
//!   按令牌管理连接的 `SessionPool`，以及服务端错误码到提示文本的映射。
//! - `conversion`: 把设备上报的测量载荷转换为规范化测量样本的管线。
//! - `import`: 按类别分组、组内并发的导入编排器。
//! - `workspace`: 工作区 REST 接口客户端。
//! - `config` / `error` / `event` / `state`: 配置、错误类型、导入事件与服务装配。

pub mod config;
pub mod conversion;
pub mod error;
pub mod event;
pub mod import;
pub mod rpc;
pub mod state;
pub mod workspace;

pub use config::AppConfig;
pub use error::{AppError, ConfigError, ConversionError, RpcError, WorkspaceError};
pub use event::ImportEvent;
pub use import::{ImportOrchestrator, ObjectImporter, OrchestratorOptions};
pub use rpc::{RpcClient, SessionPool, UploadOutcome};
pub use state::AppState;
pub use workspace::WorkspaceService;
