// rust_websocket_utils/src/client/socket.rs

//! 基于关联ID复用单个 WebSocket 连接的请求传输。
//!
//! `SocketTransport` 的行为约定：
//! - 连接按需惰性建立；并发的多个 `send` 共享同一次建连过程。
//! - 每个请求在写出之前登记到待决请求表 (关联ID → 回调)，入站帧按关联ID分派：
//!   进度帧调用 `on_progress` (可多次)，终止帧调用 `on_result` 或 `on_error` (恰好一次) 并移除登记。
//! - 未知关联ID的帧与无法解析的帧只记录日志后丢弃。
//! - 连接意外断开时，所有待决请求以 `WsError::ConnectionClosed` 拒绝。
//! - 主动 `close()` 时，待决请求被直接丢弃，不触发任何回调。之后的 `send` 会重新建连。

use dashmap::DashMap;
use futures_util::{SinkExt, stream::SplitSink, stream::SplitStream};
use log::{debug, error, info, warn};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, Weak};
use tokio::sync::Mutex as TokioMutex;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::Message;

use crate::client::transport::{self, ClientConnection, ClientWsStream};
use crate::error::WsError;
use crate::message::{InboundFrame, OutboundFrame};

pub type ProgressCallback = Box<dyn FnMut(f64) + Send + 'static>;
pub type ResultCallback = Box<dyn FnOnce(Value) + Send + 'static>;
pub type ErrorCallback = Box<dyn FnOnce(WsError) + Send + 'static>;

/// 单个请求的回调集合。三个回调都是可选的。
#[derive(Default)]
pub struct RequestHandlers {
    on_progress: Option<ProgressCallback>,
    on_result: Option<ResultCallback>,
    on_error: Option<ErrorCallback>,
}

impl RequestHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_progress(mut self, callback: impl FnMut(f64) + Send + 'static) -> Self {
        self.on_progress = Some(Box::new(callback));
        self
    }

    pub fn on_result(mut self, callback: impl FnOnce(Value) + Send + 'static) -> Self {
        self.on_result = Some(Box::new(callback));
        self
    }

    pub fn on_error(mut self, callback: impl FnOnce(WsError) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(callback));
        self
    }

    fn progress(&mut self, progress: f64) {
        if let Some(callback) = self.on_progress.as_mut() {
            callback(progress);
        }
    }

    fn resolve(self, data: Value) {
        if let Some(callback) = self.on_result {
            callback(data);
        }
    }

    fn reject(self, error: WsError) {
        match self.on_error {
            Some(callback) => callback(error),
            None => debug!("[套接字传输] 请求失败但未注册错误回调: {}", error),
        }
    }
}

impl fmt::Debug for RequestHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestHandlers")
            .field("on_progress", &self.on_progress.is_some())
            .field("on_result", &self.on_result.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// 连接状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Closed,
    Opening,
    Open,
}

/// 待决请求表中的一项。回调在终止时被取出，保证最多调用一次终止回调。
struct PendingRequest {
    command: String,
    generation: u64,
    handlers: StdMutex<Option<RequestHandlers>>,
}

impl PendingRequest {
    fn take_handlers(&self) -> Option<RequestHandlers> {
        self.handlers.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).take()
    }

    fn progress(&self, progress: f64) {
        let mut guard = self.handlers.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(handlers) = guard.as_mut() {
            handlers.progress(progress);
        }
    }
}

struct TransportInner {
    url: String,
    state: RwLock<ConnectionState>,
    sink: TokioMutex<Option<SplitSink<ClientWsStream, Message>>>,
    pending: DashMap<String, Arc<PendingRequest>>,
    reader_task: StdMutex<Option<JoinHandle<()>>>,
    /// 串行化建连、断连清理与关闭。
    open_lock: TokioMutex<()>,
    expected_close: AtomicBool,
    generation: AtomicU64,
}

/// 在单个 WebSocket 连接上复用多个并发请求的传输。
pub struct SocketTransport {
    inner: Arc<TransportInner>,
}

impl fmt::Debug for SocketTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketTransport")
            .field("url", &self.inner.url)
            .field("pending", &self.inner.pending.len())
            .finish()
    }
}

impl SocketTransport {
    /// 创建传输实例，此时不建立连接。
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(TransportInner {
                url: url.into(),
                state: RwLock::new(ConnectionState::Closed),
                sink: TokioMutex::new(None),
                pending: DashMap::new(),
                reader_task: StdMutex::new(None),
                open_lock: TokioMutex::new(()),
                expected_close: AtomicBool::new(false),
                generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn url(&self) -> &str {
        &self.inner.url
    }

    pub async fn state(&self) -> ConnectionState {
        *self.inner.state.read().await
    }

    /// 当前待决请求数量。
    pub fn pending_count(&self) -> usize {
        self.inner.pending.len()
    }

    /// 确保连接已建立。已连接时立即返回；并发调用者等待同一次建连的结果。
    pub async fn open(&self) -> Result<(), WsError> {
        let inner = &self.inner;
        let _guard = inner.open_lock.lock().await;
        if *inner.state.read().await == ConnectionState::Open {
            return Ok(());
        }

        *inner.state.write().await = ConnectionState::Opening;
        match transport::connect_client(&inner.url).await {
            Ok(ClientConnection { ws_sender, ws_receiver }) => {
                let generation = inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
                inner.expected_close.store(false, Ordering::SeqCst);
                *inner.sink.lock().await = Some(ws_sender);
                *inner.state.write().await = ConnectionState::Open;

                let handle = tokio::spawn(run_reader(Arc::downgrade(inner), ws_receiver, generation));
                let previous = inner
                    .reader_task
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .replace(handle);
                if let Some(previous) = previous {
                    previous.abort();
                }
                info!("[套接字传输] 连接已建立: {} (第 {} 次)", inner.url, generation);
                Ok(())
            }
            Err(e) => {
                *inner.state.write().await = ConnectionState::Closed;
                error!("[套接字传输] 建立连接失败: {}", e);
                Err(e)
            }
        }
    }

    /// 发送一个请求。所有结果 (包括建连失败与写出失败) 都通过 `handlers` 通知。
    ///
    /// 请求在写出前登记，因此即使服务端的回复先于写出完成到达也能被正确分派。
    /// 写出成功时返回请求的关联ID，调用方不再等待结果时可凭它调用 [`SocketTransport::abandon`]。
    /// 若本 future 在写出途中被丢弃，登记随之撤销。
    pub async fn send<P: Serialize + ?Sized>(
        &self,
        command: &str,
        parameters: &P,
        handlers: RequestHandlers,
    ) -> Option<String> {
        let frame = match OutboundFrame::new(command, parameters) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("[套接字传输] 构造请求 '{}' 失败: {}", command, e);
                handlers.reject(e);
                return None;
            }
        };

        if let Err(e) = self.open().await {
            warn!("[套接字传输] 请求 '{}' 因连接不可用而失败: {}", command, e);
            handlers.reject(e);
            return None;
        }

        let inner = &self.inner;
        let generation = inner.generation.load(Ordering::SeqCst);
        inner.pending.insert(
            frame.id.clone(),
            Arc::new(PendingRequest {
                command: command.to_string(),
                generation,
                handlers: StdMutex::new(Some(handlers)),
            }),
        );
        debug!("[套接字传输] 请求已登记: {} (ID: {})", command, frame.id);
        let registration = Registration { pending: &inner.pending, id: Some(frame.id.as_str()) };

        let write_result = {
            let mut sink_guard = inner.sink.lock().await;
            match sink_guard.as_mut() {
                Some(sink) => transport::send_frame_via(sink, &frame).await,
                None => Err(WsError::NotConnected),
            }
        };
        registration.disarm();

        match write_result {
            Ok(()) => Some(frame.id),
            Err(e) => {
                warn!("[套接字传输] 写出请求 '{}' (ID: {}) 失败: {}", command, frame.id, e);
                if let Some((_, pending)) = inner.pending.remove(&frame.id) {
                    if let Some(handlers) = pending.take_handlers() {
                        handlers.reject(e);
                    }
                }
                None
            }
        }
    }

    /// 撤销一个仍在等待的请求：移除登记，不触发任何回调，之后到达的帧按未知关联ID丢弃。
    ///
    /// 返回该请求此前是否仍在待决请求表中。
    pub fn abandon(&self, request_id: &str) -> bool {
        match self.inner.pending.remove(request_id) {
            Some((_, pending)) => {
                debug!("[套接字传输] 请求已撤销: {} (ID: {})", pending.command, request_id);
                true
            }
            None => false,
        }
    }

    /// 主动关闭连接。幂等：未连接时调用无副作用。
    ///
    /// 待决请求被丢弃且不触发回调。
    pub async fn close(&self) {
        let inner = &self.inner;
        let _guard = inner.open_lock.lock().await;
        inner.expected_close.store(true, Ordering::SeqCst);

        if let Some(mut sink) = inner.sink.lock().await.take() {
            if let Err(e) = sink.close().await {
                debug!("[套接字传输] 关闭发送端时出错 (忽略): {}", e);
            }
        }
        let reader = inner
            .reader_task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(reader) = reader {
            reader.abort();
        }

        let abandoned = inner.pending.len();
        inner.pending.clear();
        let mut state = inner.state.write().await;
        if *state != ConnectionState::Closed || abandoned > 0 {
            info!("[套接字传输] 连接已关闭: {} (丢弃待决请求 {} 个)", inner.url, abandoned);
        }
        *state = ConnectionState::Closed;
    }
}

impl Drop for SocketTransport {
    fn drop(&mut self) {
        let reader = self
            .inner
            .reader_task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(reader) = reader {
            reader.abort();
        }
    }
}

/// 写出期间持有的登记守卫。写出完成前被丢弃时移除对应的待决请求。
struct Registration<'a> {
    pending: &'a DashMap<String, Arc<PendingRequest>>,
    id: Option<&'a str>,
}

impl Registration<'_> {
    fn disarm(mut self) {
        self.id = None;
    }
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        if let Some(id) = self.id.take() {
            if self.pending.remove(id).is_some() {
                debug!("[套接字传输] 写出中途被取消，已撤销登记 (ID: {})", id);
            }
        }
    }
}

impl TransportInner {
    fn dispatch(&self, frame: InboundFrame) {
        match frame {
            InboundFrame::Progress { id, progress } => {
                let pending = self.pending.get(&id).map(|entry| Arc::clone(entry.value()));
                match pending {
                    Some(pending) => pending.progress(progress),
                    None => debug!("[套接字传输] 丢弃未知关联ID的进度帧: {}", id),
                }
            }
            InboundFrame::Success { id, data } => match self.pending.remove(&id) {
                Some((_, pending)) => {
                    debug!("[套接字传输] 请求成功: {} (ID: {})", pending.command, id);
                    if let Some(handlers) = pending.take_handlers() {
                        handlers.resolve(data);
                    }
                }
                None => debug!("[套接字传输] 丢弃未知关联ID的成功帧: {}", id),
            },
            InboundFrame::Failure { id, error_code, error_message } => match self.pending.remove(&id) {
                Some((_, pending)) => {
                    debug!(
                        "[套接字传输] 请求失败: {} (ID: {}, 错误码: {:?})",
                        pending.command, id, error_code
                    );
                    if let Some(handlers) = pending.take_handlers() {
                        handlers.reject(WsError::RemoteFailure { code: error_code, message: error_message });
                    }
                }
                None => debug!("[套接字传输] 丢弃未知关联ID的失败帧: {}", id),
            },
        }
    }

    async fn on_disconnected(&self, generation: u64, failure: Option<WsError>) {
        let _guard = self.open_lock.lock().await;
        if self.generation.load(Ordering::SeqCst) != generation {
            return;
        }
        *self.state.write().await = ConnectionState::Closed;
        *self.sink.lock().await = None;
        if let Ok(mut reader) = self.reader_task.lock() {
            reader.take();
        }

        if self.expected_close.load(Ordering::SeqCst) {
            debug!("[套接字传输] 连接按预期关闭: {}", self.url);
            return;
        }

        match failure {
            Some(e) => warn!("[套接字传输] 连接意外中断: {} ({})", self.url, e),
            None => warn!("[套接字传输] 连接被对方关闭: {}", self.url),
        }
        let orphaned: Vec<String> = self
            .pending
            .iter()
            .filter(|entry| entry.value().generation == generation)
            .map(|entry| entry.key().clone())
            .collect();
        for id in orphaned {
            if let Some((_, pending)) = self.pending.remove(&id) {
                if let Some(handlers) = pending.take_handlers() {
                    handlers.reject(WsError::ConnectionClosed);
                }
            }
        }
    }
}

async fn run_reader(inner: Weak<TransportInner>, mut receiver: SplitStream<ClientWsStream>, generation: u64) {
    let failure = loop {
        match transport::receive_frame(&mut receiver).await {
            Some(Ok(frame)) => {
                let Some(inner) = inner.upgrade() else { return };
                inner.dispatch(frame);
            }
            Some(Err(e @ (WsError::DeserializationError(_) | WsError::Message(_)))) => {
                warn!("[套接字传输] 丢弃无法识别的入站帧: {}", e);
            }
            Some(Err(e)) => break Some(e),
            None => break None,
        }
    };
    if let Some(inner) = inner.upgrade() {
        inner.on_disconnected(generation, failure).await;
    }
}
