//! `rust_websocket_utils` 提供基于 WebSocket 的请求/响应通信基础设施。
//!
//! 主要模块包括：
//! - `message`: 出站帧 `OutboundFrame` 与入站帧 `InboundFrame` 的结构与编解码。
//! - `error`: 库中统一使用的错误类型 `WsError`。
//! - `client`: 客户端连接原语，以及按关联ID复用连接的 `SocketTransport`。
//! - `server`: 服务端监听与收发帧的辅助功能，用于本地联调与测试替身。

pub mod client;
pub mod error;
pub mod message;
pub mod server;

pub use client::socket::{ConnectionState, RequestHandlers, SocketTransport};
pub use error::WsError;
pub use message::{InboundFrame, OutboundFrame};
