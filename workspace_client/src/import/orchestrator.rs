// workspace_client/src/import/orchestrator.rs

//! 导入编排器。
//!
//! 一次导入按固定的类别顺序逐组进行：组内对每个 ID 并发发起导入 (并发数有上限)，
//! 等整组全部结算后再把结果划入 已导入 / 被拒绝 / 已取消 三个集合，并推进进度。
//! 单个对象失败不会中止整组或后续组。
//!
//! 进度每组推进 `1 / (非空组数 + 1)`，全部完成后置为 1，并在延迟后自动归零 (可取消)。
//! 被取消的导入不推进进度、不置 1，也不安排归零。

use common_models::{ImportRequest, ImportState, WorkspaceObjectType};
use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{broadcast, watch, Mutex as TokioMutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::error::RpcError;
use crate::event::ImportEvent;
use crate::import::ObjectImporter;

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorOptions {
    /// 组内同时进行的导入数上限，0 按 1 处理。
    pub max_concurrency: usize,
    pub progress_reset_delay: Duration,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            progress_reset_delay: Duration::from_millis(1500),
        }
    }
}

impl OrchestratorOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_concurrency: config.import_concurrency,
            progress_reset_delay: config.progress_reset_delay(),
        }
    }
}

/// 一组导入的结算结果。
#[derive(Default)]
struct GroupOutcome {
    imported: Vec<String>,
    rejected: Vec<(String, RpcError)>,
    cancelled: Vec<String>,
}

pub struct ImportOrchestrator<I: ?Sized> {
    importer: Arc<I>,
    options: OrchestratorOptions,
    state_tx: Arc<watch::Sender<ImportState>>,
    events_tx: broadcast::Sender<ImportEvent>,
    reset_timer: StdMutex<Option<JoinHandle<()>>>,
    /// 同一编排器上的导入串行执行。
    run_lock: TokioMutex<()>,
}

impl<I: ObjectImporter + ?Sized> ImportOrchestrator<I> {
    pub fn new(importer: Arc<I>, options: OrchestratorOptions) -> Self {
        let (state_tx, _) = watch::channel(ImportState::default());
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            importer,
            options,
            state_tx: Arc::new(state_tx),
            events_tx,
            reset_timer: StdMutex::new(None),
            run_lock: TokioMutex::new(()),
        }
    }

    pub fn options(&self) -> &OrchestratorOptions {
        &self.options
    }

    /// 当前状态快照。
    pub fn state(&self) -> ImportState {
        self.state_tx.borrow().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ImportState> {
        self.state_tx.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ImportEvent> {
        self.events_tx.subscribe()
    }

    /// 清空状态并取消待执行的进度归零。
    pub fn reset(&self) {
        self.cancel_progress_reset();
        self.state_tx.send_replace(ImportState::default());
        debug!("[导入编排] 状态已重置。");
    }

    /// 取消待执行的进度归零。返回是否确实取消了一个尚未执行的定时任务。
    pub fn cancel_progress_reset(&self) -> bool {
        let pending = self
            .reset_timer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        match pending {
            Some(handle) if !handle.is_finished() => {
                handle.abort();
                debug!("[导入编排] 已取消待执行的进度归零。");
                true
            }
            _ => false,
        }
    }

    /// 导入请求中的全部对象，返回结束时的状态。
    pub async fn import_workspace_objects(&self, request: &ImportRequest) -> ImportState {
        self.import_workspace_objects_with_cancel(request, CancellationToken::new()).await
    }

    /// 可取消的导入。取消后当前组中尚未结算的 ID 记入已取消集合，后续组不再开始。
    pub async fn import_workspace_objects_with_cancel(
        &self,
        request: &ImportRequest,
        cancel: CancellationToken,
    ) -> ImportState {
        let _run = self.run_lock.lock().await;

        self.cancel_progress_reset();
        self.state_tx.send_replace(ImportState {
            loading: true,
            ..ImportState::default()
        });

        let groups = request.non_empty_groups();
        // 分母中的 +1 为最终置 1 预留一步。
        let step = 1.0 / (groups.len() as f64 + 1.0);
        info!(
            "[导入编排] 开始导入: {} 个类别, 共 {} 个对象",
            groups.len(),
            request.total_ids()
        );

        let mut was_cancelled = false;
        for (object_type, ids) in groups {
            if cancel.is_cancelled() {
                was_cancelled = true;
                break;
            }

            let outcome = self.import_group(object_type, ids, &cancel).await;
            let group_cancelled = !outcome.cancelled.is_empty();
            let imported_count = outcome.imported.len();
            let rejected: Vec<(String, String)> = outcome
                .rejected
                .into_iter()
                .map(|(id, error)| (id, error.to_string()))
                .collect();

            let mut progress = 0.0;
            self.state_tx.send_modify(|state| {
                state.imported_object_ids.extend(outcome.imported);
                state
                    .rejected_object_ids
                    .extend(rejected.iter().map(|(id, _)| id.clone()));
                state.cancelled_object_ids.extend(outcome.cancelled);
                if !group_cancelled {
                    state.progress = round2((state.progress + step).min(1.0));
                }
                progress = state.progress;
            });
            info!(
                "[导入编排] 类别 {} 结算: 成功 {}, 失败 {}, 进度 {:.2}",
                object_type,
                imported_count,
                rejected.len(),
                progress
            );

            if imported_count > 0 {
                self.emit(ImportEvent::GroupImported {
                    object_type,
                    imported_count,
                });
            }
            for (object_id, reason) in rejected {
                warn!("[导入编排] 对象导入失败: {}/{}: {}", object_type, object_id, reason);
                self.emit(ImportEvent::ObjectRejected {
                    object_type,
                    object_id,
                    reason,
                });
            }

            if group_cancelled {
                was_cancelled = true;
                break;
            }
            self.emit(ImportEvent::Progress { progress });
        }

        if was_cancelled {
            self.state_tx.send_modify(|state| state.loading = false);
            info!("[导入编排] 导入已取消。");
            self.emit(ImportEvent::Finished { cancelled: true });
        } else {
            self.state_tx.send_modify(|state| {
                state.progress = 1.0;
                state.loading = false;
            });
            self.emit(ImportEvent::Progress { progress: 1.0 });
            self.emit(ImportEvent::Finished { cancelled: false });
            self.schedule_progress_reset();
            info!("[导入编排] 导入完成。");
        }

        self.state()
    }

    /// 并发导入一组 ID 并等待全部结算。
    async fn import_group(
        &self,
        object_type: WorkspaceObjectType,
        ids: &BTreeSet<String>,
        cancel: &CancellationToken,
    ) -> GroupOutcome {
        let concurrency = self.options.max_concurrency.max(1);
        let results: Vec<(String, Result<(), RpcError>)> = stream::iter(ids.iter().cloned())
            .map(|object_id| {
                let importer = Arc::clone(&self.importer);
                let cancel = cancel.clone();
                async move {
                    if cancel.is_cancelled() {
                        return (object_id, Err(RpcError::Cancelled));
                    }
                    // 导入分支在前：与取消同时就绪的已完成导入按其真实结果结算。
                    let result = tokio::select! {
                        biased;
                        result = importer.import_object(object_type, &object_id) => result,
                        _ = cancel.cancelled() => Err(RpcError::Cancelled),
                    };
                    (object_id, result)
                }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let mut outcome = GroupOutcome::default();
        for (object_id, result) in results {
            match result {
                Ok(()) => outcome.imported.push(object_id),
                Err(error) if error.is_cancellation() => outcome.cancelled.push(object_id),
                Err(error) => outcome.rejected.push((object_id, error)),
            }
        }
        outcome
    }

    fn schedule_progress_reset(&self) {
        let delay = self.options.progress_reset_delay;
        let state_tx = Arc::clone(&self.state_tx);
        let events_tx = self.events_tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            state_tx.send_modify(|state| state.progress = 0.0);
            let _ = events_tx.send(ImportEvent::ProgressReset);
            debug!("[导入编排] 进度已归零。");
        });
        let previous = self
            .reset_timer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    fn emit(&self, event: ImportEvent) {
        // 没有订阅者时发送失败，忽略。
        let _ = self.events_tx.send(event);
    }
}

impl<I: ?Sized> Drop for ImportOrchestrator<I> {
    fn drop(&mut self) {
        if let Ok(mut timer) = self.reset_timer.lock() {
            if let Some(handle) = timer.take() {
                handle.abort();
            }
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 可配置的导入替身：`failing` 中的 ID 返回协议错误，`hanging` 中的 ID 永不结算。
    #[derive(Default)]
    struct FakeImporter {
        failing: HashSet<String>,
        hanging: HashSet<String>,
        delay: Duration,
        /// 设置时，导入在成功返回前先触发该令牌并让出一次执行权。
        cancel_on_finish: Option<CancellationToken>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        calls: StdMutex<Vec<(WorkspaceObjectType, String)>>,
    }

    impl FakeImporter {
        fn failing(ids: &[&str]) -> Self {
            Self {
                failing: ids.iter().map(|s| s.to_string()).collect(),
                ..Self::default()
            }
        }

        fn calls(&self) -> Vec<(WorkspaceObjectType, String)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ObjectImporter for FakeImporter {
        async fn import_object(&self, object_type: WorkspaceObjectType, object_id: &str) -> Result<(), RpcError> {
            self.calls.lock().unwrap().push((object_type, object_id.to_string()));
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            if self.hanging.contains(object_id) {
                std::future::pending::<()>().await;
            }
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            if let Some(token) = &self.cancel_on_finish {
                token.cancel();
                tokio::task::yield_now().await;
            }

            if self.failing.contains(object_id) {
                Err(RpcError::Protocol {
                    code: Some("OBJECT_NOT_FOUND".to_string()),
                    message: format!("工作区中找不到该对象: {}", object_id),
                    raw: Some(object_id.to_string()),
                })
            } else {
                Ok(())
            }
        }
    }

    fn orchestrator(importer: FakeImporter) -> (Arc<FakeImporter>, ImportOrchestrator<FakeImporter>) {
        let importer = Arc::new(importer);
        let orchestrator = ImportOrchestrator::new(Arc::clone(&importer), OrchestratorOptions::default());
        (importer, orchestrator)
    }

    fn drain(events: &mut broadcast::Receiver<ImportEvent>) -> Vec<ImportEvent> {
        let mut drained = Vec::new();
        while let Ok(event) = events.try_recv() {
            drained.push(event);
        }
        drained
    }

    #[tokio::test]
    /// s1 成功、s2 失败、b1 成功：两个成功进入已导入集合，s2 进入被拒绝集合，进度为 1。
    async fn test_partial_failure_is_recorded_per_object() {
        let (_, orchestrator) = orchestrator(FakeImporter::failing(&["s2"]));
        let mut events = orchestrator.subscribe_events();
        let request = ImportRequest::new()
            .with_ids(WorkspaceObjectType::Standards, ["s1", "s2"])
            .with_ids(WorkspaceObjectType::Substrates, ["b1"]);

        let state = orchestrator.import_workspace_objects(&request).await;

        assert_eq!(state.imported_object_ids, vec!["s1", "b1"]);
        assert_eq!(state.rejected_object_ids, vec!["s2"]);
        assert!(state.cancelled_object_ids.is_empty());
        assert_eq!(state.progress, 1.0);
        assert!(!state.loading);

        let events = drain(&mut events);
        assert!(events.contains(&ImportEvent::GroupImported {
            object_type: WorkspaceObjectType::Standards,
            imported_count: 1
        }));
        assert!(events.iter().any(|e| matches!(
            e,
            ImportEvent::ObjectRejected { object_id, reason, .. } if object_id == "s2" && reason.contains("s2")
        )));
        assert_eq!(events.last(), Some(&ImportEvent::Finished { cancelled: false }));
    }

    #[tokio::test]
    /// 空请求直接完成：进度为 1，不发起任何导入。
    async fn test_empty_request_completes_immediately() {
        let (importer, orchestrator) = orchestrator(FakeImporter::default());
        let request = ImportRequest::new().with_ids(WorkspaceObjectType::Recipes, Vec::<String>::new());

        let state = orchestrator.import_workspace_objects(&request).await;

        assert_eq!(state.progress, 1.0);
        assert!(!state.loading);
        assert!(state.imported_object_ids.is_empty());
        assert!(importer.calls().is_empty());
    }

    #[tokio::test]
    /// 三个非空组：进度依次为 0.25、0.5、0.75、1，单调不减。
    async fn test_progress_is_monotonic() {
        let (_, orchestrator) = orchestrator(FakeImporter::failing(&["t1"]));
        let mut events = orchestrator.subscribe_events();
        let request = ImportRequest::new()
            .with_ids(WorkspaceObjectType::Standards, ["s1"])
            .with_ids(WorkspaceObjectType::Trials, ["t1"])
            .with_ids(WorkspaceObjectType::Thicknessobjects, ["k1"]);

        orchestrator.import_workspace_objects(&request).await;

        let progress: Vec<f64> = drain(&mut events)
            .into_iter()
            .filter_map(|e| match e {
                ImportEvent::Progress { progress } => Some(progress),
                _ => None,
            })
            .collect();
        assert_eq!(progress, vec![0.25, 0.5, 0.75, 1.0]);
    }

    #[tokio::test]
    /// 全部失败的组同样推进进度。
    async fn test_all_failed_group_still_advances() {
        let (_, orchestrator) = orchestrator(FakeImporter::failing(&["a1", "a2"]));
        let request = ImportRequest::new().with_ids(WorkspaceObjectType::Assortments, ["a1", "a2"]);
        let mut states = orchestrator.subscribe_state();

        let state = orchestrator.import_workspace_objects(&request).await;
        assert_eq!(state.rejected_object_ids.len(), 2);
        assert_eq!(state.progress, 1.0);
        assert!(states.has_changed().unwrap());
    }

    #[tokio::test]
    /// 组按固定顺序串行：前一组的所有调用都早于后一组。
    async fn test_groups_run_in_fixed_order() {
        let (importer, orchestrator) = orchestrator(FakeImporter::default());
        let request = ImportRequest::new()
            .with_ids(WorkspaceObjectType::Thicknessobjects, ["k1", "k2"])
            .with_ids(WorkspaceObjectType::Standards, ["s1", "s2", "s3"])
            .with_ids(WorkspaceObjectType::Recipes, ["r1"]);

        orchestrator.import_workspace_objects(&request).await;

        let order: Vec<WorkspaceObjectType> = importer.calls().into_iter().map(|(t, _)| t).collect();
        let mut sorted = order.clone();
        sorted.sort();
        assert_eq!(order, sorted, "调用顺序应按类别处理顺序分组");
        assert_eq!(order.len(), 6);
    }

    #[tokio::test(start_paused = true)]
    /// 组内并发数不超过上限。
    async fn test_concurrency_is_bounded() {
        let importer = Arc::new(FakeImporter {
            delay: Duration::from_millis(100),
            ..FakeImporter::default()
        });
        let orchestrator = ImportOrchestrator::new(
            Arc::clone(&importer),
            OrchestratorOptions {
                max_concurrency: 3,
                ..OrchestratorOptions::default()
            },
        );
        let ids: Vec<String> = (0..10).map(|i| format!("s{}", i)).collect();
        let request = ImportRequest::new().with_ids(WorkspaceObjectType::Standards, ids);

        let state = orchestrator.import_workspace_objects(&request).await;

        assert_eq!(state.imported_object_ids.len(), 10);
        assert_eq!(importer.max_in_flight.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    /// 完成后经过延迟进度归零，其余状态保留。
    async fn test_progress_resets_after_delay() {
        let (_, orchestrator) = orchestrator(FakeImporter::default());
        let request = ImportRequest::new().with_ids(WorkspaceObjectType::Standards, ["s1"]);
        let mut states = orchestrator.subscribe_state();

        orchestrator.import_workspace_objects(&request).await;
        let finished_at = tokio::time::Instant::now();
        assert_eq!(orchestrator.state().progress, 1.0);

        tokio::time::timeout(Duration::from_secs(10), async {
            while states.borrow_and_update().progress != 0.0 {
                states.changed().await.expect("状态通道意外关闭");
            }
        })
        .await
        .expect("进度未在预期时间内归零");

        assert!(finished_at.elapsed() >= Duration::from_millis(1500));
        let state = orchestrator.state();
        assert_eq!(state.imported_object_ids, vec!["s1"]);
        assert!(!state.loading);
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_reset_can_be_cancelled() {
        let (_, orchestrator) = orchestrator(FakeImporter::default());
        let request = ImportRequest::new().with_ids(WorkspaceObjectType::Standards, ["s1"]);

        orchestrator.import_workspace_objects(&request).await;
        assert!(orchestrator.cancel_progress_reset());
        assert!(!orchestrator.cancel_progress_reset(), "第二次取消应无效果");

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(orchestrator.state().progress, 1.0);
    }

    #[tokio::test]
    async fn test_reset_clears_state() {
        let (_, orchestrator) = orchestrator(FakeImporter::failing(&["s2"]));
        let request = ImportRequest::new().with_ids(WorkspaceObjectType::Standards, ["s1", "s2"]);
        orchestrator.import_workspace_objects(&request).await;

        orchestrator.reset();

        assert_eq!(orchestrator.state(), ImportState::default());
        assert!(!orchestrator.cancel_progress_reset(), "重置应已取消归零定时任务");
    }

    #[tokio::test]
    /// 每次导入开始时清空上一次的结果集合。
    async fn test_new_run_starts_from_empty_accumulators() {
        let (_, orchestrator) = orchestrator(FakeImporter::default());
        orchestrator
            .import_workspace_objects(&ImportRequest::new().with_ids(WorkspaceObjectType::Standards, ["s1"]))
            .await;
        let state = orchestrator
            .import_workspace_objects(&ImportRequest::new().with_ids(WorkspaceObjectType::Trials, ["t1"]))
            .await;
        assert_eq!(state.imported_object_ids, vec!["t1"]);
    }

    #[tokio::test(start_paused = true)]
    /// 取消：已结算的保持原样，未结算的记为已取消，后续组不开始，不安排归零。
    async fn test_cancellation_records_cancelled_ids() {
        let importer = Arc::new(FakeImporter {
            hanging: ["s2".to_string()].into_iter().collect(),
            ..FakeImporter::default()
        });
        let orchestrator = ImportOrchestrator::new(Arc::clone(&importer), OrchestratorOptions::default());
        let mut events = orchestrator.subscribe_events();
        let request = ImportRequest::new()
            .with_ids(WorkspaceObjectType::Standards, ["s1", "s2"])
            .with_ids(WorkspaceObjectType::Substrates, ["b1"]);

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let state = orchestrator.import_workspace_objects_with_cancel(&request, cancel).await;

        assert_eq!(state.imported_object_ids, vec!["s1"]);
        assert_eq!(state.cancelled_object_ids, vec!["s2"]);
        assert!(state.rejected_object_ids.is_empty(), "取消不应记为被拒绝");
        assert!(!state.loading);
        assert_eq!(state.progress, 0.0);
        assert!(importer.calls().iter().all(|(t, _)| *t == WorkspaceObjectType::Standards), "后续组不应开始");
        assert!(!orchestrator.cancel_progress_reset(), "取消后不应安排归零");
        assert_eq!(drain(&mut events).last(), Some(&ImportEvent::Finished { cancelled: true }));
    }

    #[tokio::test]
    /// 导入完成与取消同时就绪时按真实结果结算；之后的组不开始。
    async fn test_finished_import_wins_over_simultaneous_cancel() {
        let cancel = CancellationToken::new();
        let importer = Arc::new(FakeImporter {
            cancel_on_finish: Some(cancel.clone()),
            ..FakeImporter::default()
        });
        let orchestrator = ImportOrchestrator::new(Arc::clone(&importer), OrchestratorOptions::default());
        let request = ImportRequest::new()
            .with_ids(WorkspaceObjectType::Standards, ["s1"])
            .with_ids(WorkspaceObjectType::Trials, ["t1"]);

        let state = orchestrator.import_workspace_objects_with_cancel(&request, cancel).await;

        assert_eq!(state.imported_object_ids, vec!["s1"]);
        assert!(state.cancelled_object_ids.is_empty(), "已完成的导入不应记为已取消");
        assert!(!state.is_settled("t1"), "后续组不应开始");
        assert_eq!(importer.calls().len(), 1);
        assert!(!state.loading);
    }

    #[tokio::test]
    /// 开始前已取消：没有任何导入，也没有 ID 被记录。
    async fn test_cancelled_before_start() {
        let (importer, orchestrator) = orchestrator(FakeImporter::default());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let request = ImportRequest::new().with_ids(WorkspaceObjectType::Standards, ["s1"]);

        let state = orchestrator.import_workspace_objects_with_cancel(&request, cancel).await;
        assert!(importer.calls().is_empty());
        assert!(!state.is_settled("s1"));
        assert!(!state.loading);
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(1.0 / 3.0), 0.33);
        assert_eq!(round2(2.0 / 3.0), 0.67);
    }
}
