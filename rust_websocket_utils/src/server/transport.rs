// rust_websocket_utils/src/server/transport.rs

//! 服务端 WebSocket 监听、接受连接与收发帧的逻辑。
//!
//! 主要用于本地联调与测试替身：接收客户端的 `OutboundFrame`，以任意顺序回复 `InboundFrame`。

use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info};
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{WebSocketStream, accept_async, tungstenite::protocol::Message};

use crate::error::WsError;
use crate::message::{InboundFrame, OutboundFrame};

/// 经过 WebSocket 握手后的服务端 TCP 流。
pub type WsStream = WebSocketStream<TcpStream>;

/// 负责 WebSocket 服务端的监听和连接接受。
pub struct ServerTransport;

impl ServerTransport {
    /// 绑定 TCP 监听器。地址可以使用端口 0 以获取随机端口。
    pub async fn bind(addr: &str) -> Result<TcpListener, WsError> {
        let listener = TcpListener::bind(addr).await?;
        info!("[服务端] 已绑定监听地址: {}", listener.local_addr()?);
        Ok(listener)
    }

    /// 在已绑定的监听器上接受连接。每个连接在独立任务中完成握手并调用 `on_connect`。
    pub async fn serve<F, Fut>(listener: TcpListener, on_connect: F) -> Result<(), WsError>
    where
        F: Fn(WsStream, SocketAddr) -> Fut + Send + Sync + Clone + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        loop {
            match listener.accept().await {
                Ok((tcp_stream, peer_addr)) => {
                    debug!("[服务端] 从 {} 接受了新的 TCP 连接", peer_addr);
                    let on_connect_callback = on_connect.clone();
                    tokio::spawn(async move {
                        match accept_async(tcp_stream).await {
                            Ok(ws_stream) => {
                                info!("[服务端] 与 {} 的 WebSocket 握手成功", peer_addr);
                                on_connect_callback(ws_stream, peer_addr).await;
                            }
                            Err(e) => error!("[服务端] 与 {} 的 WebSocket 握手失败: {}", peer_addr, e),
                        }
                    });
                }
                Err(e) => {
                    error!("[服务端] 接受 TCP 连接失败: {}。服务器将继续运行。", e);
                }
            }
        }
    }
}

/// 读取下一个客户端请求帧。连接关闭时返回 `None`。
pub async fn receive_request(ws_stream: &mut WsStream) -> Option<Result<OutboundFrame, WsError>> {
    loop {
        match ws_stream.next().await {
            Some(Ok(Message::Text(text))) => {
                debug!("[服务端] 收到请求帧: '{}'", text);
                break Some(serde_json::from_str::<OutboundFrame>(&text).map_err(|e| {
                    WsError::DeserializationError(format!("请求帧反序列化失败: {}, 原始文本: '{}'", e, text))
                }));
            }
            Some(Ok(Message::Close(_))) | None => break None,
            Some(Ok(_)) => {}
            Some(Err(e)) => break Some(Err(WsError::WebSocketProtocolError(e))),
        }
    }
}

/// 向客户端写出一个入站帧。
pub async fn send_reply(ws_stream: &mut WsStream, frame: &InboundFrame) -> Result<(), WsError> {
    let text = frame.to_json()?;
    debug!("[服务端] 发送回复帧: {}", text);
    ws_stream.send(Message::Text(text)).await?;
    Ok(())
}

/// 向客户端写出任意原始文本 (用于构造畸形帧等场景)。
pub async fn send_raw_text(ws_stream: &mut WsStream, text: &str) -> Result<(), WsError> {
    ws_stream.send(Message::Text(text.to_string())).await?;
    Ok(())
}
