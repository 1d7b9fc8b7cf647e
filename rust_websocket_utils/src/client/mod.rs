// rust_websocket_utils/src/client/mod.rs

//! WebSocket 客户端模块。
//!
//! - `transport`: 建立连接、发送出站帧、接收入站帧的底层操作。
//! - `socket`: 基于关联ID的请求复用传输 `SocketTransport`，负责惰性建连、
//!   待决请求表维护以及进度/结果/错误回调的分派。

pub mod socket;
pub mod transport;
