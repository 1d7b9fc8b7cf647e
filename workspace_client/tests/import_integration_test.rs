// workspace_client/tests/import_integration_test.rs

mod common;

use common::{init_test_logger, start_import_service};
use common_models::{ImportRequest, WorkspaceObjectType};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use workspace_client::{ImportEvent, ImportOrchestrator, OrchestratorOptions, RpcClient};

fn options() -> OrchestratorOptions {
    OrchestratorOptions {
        max_concurrency: 3,
        progress_reset_delay: Duration::from_millis(200),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
/// 通过真实的套接字 RPC 导入：失败的 ID 带着错误码提示文本进入被拒绝集合，其余照常导入。
async fn test_import_over_socket_with_partial_failure() {
    init_test_logger();
    let url = start_import_service().await;
    let client = Arc::new(RpcClient::new(url, "app-1"));
    let orchestrator = ImportOrchestrator::new(Arc::clone(&client), options());
    let mut events = orchestrator.subscribe_events();

    let request = ImportRequest::new()
        .with_ids(WorkspaceObjectType::Standards, ["s1", "missing-s2", "s3"])
        .with_ids(WorkspaceObjectType::Substrates, ["b1"])
        .with_ids(WorkspaceObjectType::Recipes, Vec::<String>::new());

    let state = timeout(Duration::from_secs(10), orchestrator.import_workspace_objects(&request))
        .await
        .expect("导入超时");

    let mut imported = state.imported_object_ids.clone();
    imported.sort();
    assert_eq!(imported, vec!["b1", "s1", "s3"]);
    assert_eq!(state.rejected_object_ids, vec!["missing-s2"]);
    assert!(state.cancelled_object_ids.is_empty());
    assert_eq!(state.progress, 1.0);
    assert!(!state.loading);

    let mut rejection = None;
    while let Ok(event) = events.try_recv() {
        if let ImportEvent::ObjectRejected { object_id, reason, .. } = event {
            rejection = Some((object_id, reason));
        }
    }
    let (object_id, reason) = rejection.expect("应有一条失败通知");
    assert_eq!(object_id, "missing-s2");
    assert!(reason.starts_with("工作区中找不到该对象"), "提示文本: {}", reason);

    // 进度在延迟后归零
    let mut states = orchestrator.subscribe_state();
    timeout(Duration::from_secs(5), async {
        while states.borrow_and_update().progress != 0.0 {
            states.changed().await.expect("状态通道意外关闭");
        }
    })
    .await
    .expect("进度未归零");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
/// 导入进行中主动关闭连接：挂起的导入记为已取消而非被拒绝，后续组不开始。
async fn test_closing_connection_cancels_in_flight_imports() {
    init_test_logger();
    let url = start_import_service().await;
    let client = Arc::new(RpcClient::new(url, "app-1"));
    let orchestrator = Arc::new(ImportOrchestrator::new(Arc::clone(&client), options()));

    let request = ImportRequest::new()
        .with_ids(WorkspaceObjectType::Standards, ["hang-s1", "s2"])
        .with_ids(WorkspaceObjectType::Trials, ["t1"]);

    let running = Arc::clone(&orchestrator);
    let run = tokio::spawn(async move { running.import_workspace_objects(&request).await });

    timeout(Duration::from_secs(5), async {
        loop {
            if client.transport().pending_count() > 0 && orchestrator.state().loading {
                tokio::time::sleep(Duration::from_millis(100)).await;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("导入未开始");
    client.close().await;

    let state = timeout(Duration::from_secs(5), run).await.expect("导入未结束").unwrap();
    assert_eq!(state.cancelled_object_ids, vec!["hang-s1"]);
    assert_eq!(state.imported_object_ids, vec!["s2"]);
    assert!(state.rejected_object_ids.is_empty());
    assert!(!state.is_settled("t1"), "后续组不应开始");
    assert!(!state.loading);
    assert!(state.progress < 1.0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
/// 外部取消令牌：与主动关闭连接的效果相同。
async fn test_cancel_token_stops_import() {
    init_test_logger();
    let url = start_import_service().await;
    let client = Arc::new(RpcClient::new(url, "app-1"));
    let orchestrator = ImportOrchestrator::new(Arc::clone(&client), options());
    let mut events = orchestrator.subscribe_events();

    let request = ImportRequest::new().with_ids(WorkspaceObjectType::Assortments, ["hang-a1", "hang-a2"]);
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let state = timeout(
        Duration::from_secs(5),
        orchestrator.import_workspace_objects_with_cancel(&request, cancel),
    )
    .await
    .expect("取消后导入应结束");

    assert_eq!(state.cancelled_object_ids, vec!["hang-a1", "hang-a2"]);
    assert_eq!(state.progress, 0.0);

    let mut finished = None;
    while let Ok(event) = events.try_recv() {
        if let ImportEvent::Finished { cancelled } = event {
            finished = Some(cancelled);
        }
    }
    assert_eq!(finished, Some(true));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
/// 反复取消的导入不在传输中残留待决请求，连接保持可用。
async fn test_cancelled_runs_leave_no_pending_requests() {
    init_test_logger();
    let url = start_import_service().await;
    let client = Arc::new(RpcClient::new(url, "app-1"));
    let orchestrator = ImportOrchestrator::new(Arc::clone(&client), options());

    for round in 0..3 {
        let request = ImportRequest::new().with_ids(
            WorkspaceObjectType::Standards,
            (0..4).map(|i| format!("hang-{}-{}", round, i)),
        );
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let transport_client = Arc::clone(&client);
        tokio::spawn(async move {
            while transport_client.transport().pending_count() == 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let state = timeout(
            Duration::from_secs(5),
            orchestrator.import_workspace_objects_with_cancel(&request, cancel),
        )
        .await
        .expect("取消后导入应结束");
        assert_eq!(state.cancelled_object_ids.len(), 4, "第 {} 轮", round);
        assert_eq!(client.transport().pending_count(), 0, "第 {} 轮取消后不应残留挂起请求", round);
    }

    client
        .import_from_workspace(WorkspaceObjectType::Standards, "s1")
        .await
        .expect("取消后连接仍应可用");
    assert_eq!(client.transport().pending_count(), 0);
}
