// workspace_client/src/workspace/service.rs

//! 工作区 REST 服务客户端。
//!
//! 所有请求都携带应用标识与会话令牌两个请求头。路径形如
//! `{base}/workspace/{type}`、`{base}/workspace/{type}/{id}`；
//! 清空工作区为 `DELETE {base}/workspace/{application_id}`。

use common_models::{WorkspaceEntry, WorkspaceObjectType, WorkspaceSnapshot};
use futures::future::try_join_all;
use log::{debug, error, info, warn};
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::AppConfig;
use crate::error::WorkspaceError;

pub const APPLICATION_ID_HEADER: &str = "x-application-id";
pub const AUTH_TOKEN_HEADER: &str = "x-auth-token";

/// 列表接口既可能直接返回数组，也可能包在 `data` 字段里。
#[derive(Deserialize)]
#[serde(untagged)]
enum EntryList {
    Bare(Vec<WorkspaceEntry>),
    Wrapped { data: Vec<WorkspaceEntry> },
}

impl EntryList {
    fn into_entries(self) -> Vec<WorkspaceEntry> {
        match self {
            EntryList::Bare(entries) | EntryList::Wrapped { data: entries } => entries,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkspaceService {
    http_client: Client,
    base_url: Url,
    application_id: String,
    auth_token: String,
}

impl WorkspaceService {
    pub fn new(
        base_url: &str,
        application_id: impl Into<String>,
        auth_token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, WorkspaceError> {
        let base_url = Url::parse(base_url).map_err(|e| WorkspaceError::Url(format!("'{}': {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(WorkspaceError::Url(format!("'{}' 不能作为基础地址", base_url)));
        }
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            base_url,
            application_id: application_id.into(),
            auth_token: auth_token.into(),
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, WorkspaceError> {
        Self::new(
            &config.workspace_base_url,
            config.application_id.clone(),
            config.auth_token.clone(),
            config.http_timeout(),
        )
    }

    pub fn application_id(&self) -> &str {
        &self.application_id
    }

    /// `{base}/workspace/{segments...}`，各段按路径规则转义。
    fn endpoint(&self, segments: &[&str]) -> Result<Url, WorkspaceError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| WorkspaceError::Url(format!("'{}' 不能作为基础地址", self.base_url)))?
            .pop_if_empty()
            .push("workspace")
            .extend(segments);
        Ok(url)
    }

    fn with_headers(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header(APPLICATION_ID_HEADER, &self.application_id)
            .header(AUTH_TOKEN_HEADER, &self.auth_token)
    }

    /// 非 2xx 状态转为 `WorkspaceError::Status`，响应体原样保留。
    async fn check_status(response: Response) -> Result<Response, WorkspaceError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "无法读取错误响应体".to_string());
        error!("[工作区服务] 请求失败: 状态码={}, 响应={}", status, body);
        Err(WorkspaceError::Status {
            status: status.as_u16(),
            body,
        })
    }

    /// 列出某一类别下暂存的全部条目。
    pub async fn list_objects(&self, object_type: WorkspaceObjectType) -> Result<Vec<WorkspaceEntry>, WorkspaceError> {
        let url = self.endpoint(&[object_type.as_str()])?;
        debug!("[工作区服务] GET {}", url);
        let response = self.with_headers(self.http_client.get(url)).send().await?;
        let list: EntryList = Self::check_status(response).await?.json().await?;
        Ok(list.into_entries())
    }

    /// 获取单个暂存对象的详情。
    pub async fn fetch_object(&self, object_type: WorkspaceObjectType, object_id: &str) -> Result<Value, WorkspaceError> {
        let url = self.endpoint(&[object_type.as_str(), object_id])?;
        debug!("[工作区服务] GET {}", url);
        let response = self.with_headers(self.http_client.get(url)).send().await?;
        Ok(Self::check_status(response).await?.json().await?)
    }

    /// 清空当前应用的整个工作区。
    pub async fn delete_workspace(&self) -> Result<(), WorkspaceError> {
        let url = self.endpoint(&[self.application_id.as_str()])?;
        info!("[工作区服务] 清空工作区: {}", url);
        let response = self.with_headers(self.http_client.delete(url)).send().await?;
        Self::check_status(response).await?;
        Ok(())
    }

    /// 并发列出全部六个类别，组装为工作区快照。任一类别失败则整体失败。
    pub async fn get_workspace(&self) -> Result<WorkspaceSnapshot, WorkspaceError> {
        let lists = try_join_all(WorkspaceObjectType::PROCESSING_ORDER.iter().map(|object_type| async move {
            self.list_objects(*object_type).await.map(|entries| (*object_type, entries))
        }))
        .await?;
        let snapshot = WorkspaceSnapshot::from_entries(lists.into_iter().collect::<BTreeMap<_, _>>());
        debug!(
            "[工作区服务] 工作区快照: {} 个条目, 为空: {}",
            snapshot.total_entries(),
            snapshot.is_empty
        );
        Ok(snapshot)
    }

    /// 后台按固定间隔拉取工作区快照，通过 `watch` 通道发布，直到取消或所有接收方被丢弃。
    ///
    /// 初始值为 `None`；单次拉取失败只记录日志，下一轮继续。
    pub fn poll_workspace(
        &self,
        interval: Duration,
        cancel: CancellationToken,
    ) -> watch::Receiver<Option<WorkspaceSnapshot>> {
        let (tx, rx) = watch::channel(None);
        let service = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("[工作区服务] 轮询已取消。");
                        break;
                    }
                    _ = ticker.tick() => {}
                }
                match service.get_workspace().await {
                    Ok(snapshot) => {
                        if tx.send(Some(snapshot)).is_err() {
                            debug!("[工作区服务] 快照无订阅者，停止轮询。");
                            break;
                        }
                    }
                    Err(e) => warn!("[工作区服务] 轮询工作区失败，稍后重试: {}", e),
                }
            }
        });
        rx
    }
}
