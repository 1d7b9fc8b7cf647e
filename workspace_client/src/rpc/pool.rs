// workspace_client/src/rpc/pool.rs

//! 按会话令牌管理的 RPC 客户端池。
//!
//! 每个令牌对应一个独立的连接，令牌作为 `token` 查询参数附加在套接字 URL 上。
//! 令牌变化不会隐式重建连接：调用方需显式 `close` 旧令牌并 `open` 新令牌。

use dashmap::DashMap;
use log::{info, warn};
use rust_websocket_utils::WsError;
use std::sync::Arc;
use url::Url;

use crate::error::RpcError;
use crate::rpc::service::RpcClient;

#[derive(Debug)]
pub struct SessionPool {
    socket_url: String,
    application_id: String,
    sessions: DashMap<String, Arc<RpcClient>>,
}

impl SessionPool {
    pub fn new(socket_url: impl Into<String>, application_id: impl Into<String>) -> Self {
        Self {
            socket_url: socket_url.into(),
            application_id: application_id.into(),
            sessions: DashMap::new(),
        }
    }

    /// 带令牌查询参数的套接字 URL。
    pub fn session_url(&self, token: &str) -> Result<String, RpcError> {
        let mut url = Url::parse(&self.socket_url).map_err(|e| {
            RpcError::Transport(WsError::InvalidUrl(format!("无效的套接字地址 '{}': {}", self.socket_url, e)))
        })?;
        url.query_pairs_mut().append_pair("token", token);
        Ok(url.into())
    }

    /// 获取或创建令牌对应的客户端，并立即建立连接。
    ///
    /// 新建的客户端建连失败时不会留在池中。
    pub async fn open(&self, token: &str) -> Result<Arc<RpcClient>, RpcError> {
        if let Some(existing) = self.get(token) {
            existing.open().await?;
            return Ok(existing);
        }

        let url = self.session_url(token)?;
        let client = Arc::clone(
            self.sessions
                .entry(token.to_string())
                .or_insert_with(|| Arc::new(RpcClient::new(url, self.application_id.clone())))
                .value(),
        );
        if let Err(e) = client.open().await {
            warn!("[会话池] 会话建连失败，已从池中移除: {}", e);
            self.sessions.remove_if(token, |_, pooled| Arc::ptr_eq(pooled, &client));
            return Err(e);
        }
        info!("[会话池] 会话已就绪 (当前会话数: {})", self.sessions.len());
        Ok(client)
    }

    pub fn get(&self, token: &str) -> Option<Arc<RpcClient>> {
        self.sessions.get(token).map(|entry| Arc::clone(entry.value()))
    }

    /// 关闭并移除令牌对应的会话。返回该会话是否存在。
    pub async fn close(&self, token: &str) -> bool {
        match self.sessions.remove(token) {
            Some((_, client)) => {
                client.close().await;
                true
            }
            None => false,
        }
    }

    pub async fn close_all(&self) {
        let tokens: Vec<String> = self.sessions.iter().map(|entry| entry.key().clone()).collect();
        for token in tokens {
            self.close(&token).await;
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
