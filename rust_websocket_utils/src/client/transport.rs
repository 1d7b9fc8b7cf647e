// rust_websocket_utils/src/client/transport.rs

//! 客户端 WebSocket 传输层底层逻辑。
//!
//! 提供建立连接 (`connect_client`)、发送出站帧 (`ClientConnection::send_frame`)
//! 与接收入站帧 (`receive_frame`) 三个基本操作。请求复用、关联ID分派等上层逻辑见 `socket` 模块。

use futures_util::{
    SinkExt,
    StreamExt,
    stream::{SplitSink, SplitStream},
};
use log::{debug, error, info};
use tokio_tungstenite::{
    WebSocketStream,
    connect_async,
    tungstenite::Error as TungsteniteError,
    tungstenite::protocol::Message,
};
use url::Url;

use crate::error::WsError;
use crate::message::{InboundFrame, OutboundFrame};

/// 一个可能经过 TLS 加密的客户端 WebSocket 流。
pub type ClientWsStream = WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// 一个活动的客户端 WebSocket 连接，由发送端和接收端组成。
pub struct ClientConnection {
    pub ws_sender: SplitSink<ClientWsStream, Message>,
    pub ws_receiver: SplitStream<ClientWsStream>,
}

impl ClientConnection {
    /// 将出站帧序列化为 JSON 文本并发送。
    pub async fn send_frame(&mut self, frame: &OutboundFrame) -> Result<(), WsError> {
        send_frame_via(&mut self.ws_sender, frame).await
    }
}

/// 通过给定的发送端写出一个出站帧。
pub async fn send_frame_via(
    ws_sender: &mut SplitSink<ClientWsStream, Message>,
    frame: &OutboundFrame,
) -> Result<(), WsError> {
    let frame_json = frame.to_json()?;
    debug!("[传输层] 准备发送帧: {}", frame_json);
    ws_sender.send(Message::Text(frame_json)).await?;
    debug!("[传输层] 帧已发送 (命令: {}, ID: {})", frame.command, frame.id);
    Ok(())
}

/// 连接到指定的 WebSocket 服务器。
///
/// URL 解析失败返回 `WsError::InvalidUrl`，握手失败返回 `WsError::WebSocketProtocolError`。
pub async fn connect_client(url_str: &str) -> Result<ClientConnection, WsError> {
    info!("[传输层] 开始连接 WebSocket 服务器: {}", url_str);
    let parsed_url = Url::parse(url_str)
        .map_err(|e| WsError::InvalidUrl(format!("无效的 WebSocket URL '{}': {}", url_str, e)))?;

    match connect_async(parsed_url.as_str()).await {
        Ok((ws_stream, response)) => {
            info!("[传输层] 已连接到 {} (HTTP 状态码: {})", url_str, response.status());
            debug!("[传输层] 连接响应头: {:?}", response.headers());
            let (ws_sender, ws_receiver) = ws_stream.split();
            Ok(ClientConnection { ws_sender, ws_receiver })
        }
        Err(e) => {
            error!("[传输层] 连接到 {} 失败: {}", url_str, e);
            Err(WsError::WebSocketProtocolError(e))
        }
    }
}

/// 从接收端读取并解析下一个入站帧。
///
/// 控制帧 (Ping/Pong/原始 Frame) 被跳过。返回值：
/// - `Some(Ok(frame))`: 成功解析一个入站帧；
/// - `Some(Err(WsError::DeserializationError | WsError::Message))`: 单个帧无法识别，连接仍可继续使用；
/// - `Some(Err(其他))`: 底层连接出错；
/// - `None`: 连接已关闭。
pub async fn receive_frame(ws_receiver: &mut SplitStream<ClientWsStream>) -> Option<Result<InboundFrame, WsError>> {
    loop {
        match ws_receiver.next().await {
            Some(Ok(Message::Text(text))) => {
                debug!("[传输层] 收到文本帧: '{}'", text);
                break Some(InboundFrame::parse(&text));
            }
            Some(Ok(Message::Binary(bin))) => {
                debug!("[传输层] 收到二进制帧，长度: {} 字节", bin.len());
                break Some(Err(WsError::Message("收到了非预期的 WebSocket 二进制帧".to_string())));
            }
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) | Some(Ok(Message::Frame(_))) => {
                // 由底层库自动处理
            }
            Some(Ok(Message::Close(close_frame))) => {
                debug!("[传输层] 收到 Close 控制帧: {:?}", close_frame);
                break None;
            }
            Some(Err(TungsteniteError::ConnectionClosed)) | Some(Err(TungsteniteError::AlreadyClosed)) => {
                debug!("[传输层] 连接已关闭 (ConnectionClosed/AlreadyClosed)。");
                break None;
            }
            Some(Err(e)) => {
                error!("[传输层] 接收帧时发生底层错误: {}", e);
                break Some(Err(WsError::WebSocketProtocolError(e)));
            }
            None => {
                debug!("[传输层] 接收流已结束。");
                break None;
            }
        }
    }
}
