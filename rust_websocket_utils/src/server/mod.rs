// rust_websocket_utils/src/server/mod.rs

//! WebSocket 服务端模块。
//!
//! 提供监听、接受连接以及按帧收发的基础设施，供本地联调服务与测试替身使用。

pub mod transport;
