use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use fluvio_future::task::spawn;
use fluvio_future::timer::sleep;

use etcd_member_controller::config::ControllerConfig;
use etcd_member_controller::controller::{MemberController, Reconciler, SyncContext, SyncOutcome};
use etcd_member_controller::fixture::{FakeMemberClient, FakePodObserver, ready_pod};
use etcd_member_controller::member::Member;

fn fast_config() -> ControllerConfig {
    ControllerConfig {
        resync_interval: Duration::from_millis(10),
        error_backoff: Duration::from_millis(10),
        sync_timeout: Duration::from_secs(5),
        ..Default::default()
    }
}

/// pods join one per sync, each only after the previous one started
#[fluvio_future::test]
async fn test_grow_cluster_one_member_per_sync() {
    let config = ControllerConfig::default();
    let reconciler = Reconciler::from_config(
        FakePodObserver::new(vec![
            ready_pod("etcd-a", "10.0.0.1"),
            ready_pod("etcd-b", "10.0.0.2"),
            ready_pod("etcd-c", "10.0.0.3"),
        ]),
        FakeMemberClient::new(vec![
            Member::new(1, "etcd-a").with_peer_url("https://10.0.0.1:2380"),
        ]),
        &config,
    );
    let ctx = SyncContext::default();

    let outcome = reconciler.sync(&ctx).await.expect("sync");
    assert!(matches!(outcome, SyncOutcome::Added { ref pod, .. } if pod == "etcd-b"));

    // etcd-b joined but has not started yet, nothing else may join
    let outcome = reconciler.sync(&ctx).await.expect("sync");
    assert_eq!(outcome, SyncOutcome::Idle);

    let client = reconciler.member_client();
    assert_eq!(client.add_calls(), 1);
    client.start_member("https://10.0.0.2:2380", "etcd-b").await;

    let outcome = reconciler.sync(&ctx).await.expect("sync");
    assert!(matches!(outcome, SyncOutcome::Added { ref pod, .. } if pod == "etcd-c"));

    let outcome = reconciler.sync(&ctx).await.expect("sync");
    assert_eq!(outcome, SyncOutcome::Idle);

    client.start_member("https://10.0.0.3:2380", "etcd-c").await;
    let outcome = reconciler.sync(&ctx).await.expect("sync");
    assert_eq!(outcome, SyncOutcome::Idle);

    assert_eq!(client.add_calls(), 2);
    let members = client.members().await;
    assert_eq!(members.len(), 3);
    assert!(members.iter().all(|member| member.is_started()));
}

#[fluvio_future::test]
async fn test_new_pod_becomes_candidate_when_ready() {
    let config = ControllerConfig::default();
    let mut booting = ready_pod("etcd-b", "10.0.0.2");
    booting.main_steps[0].ready = false;

    let reconciler = Reconciler::from_config(
        FakePodObserver::new(vec![booting]),
        FakeMemberClient::new(vec![]),
        &config,
    );
    let ctx = SyncContext::default();

    assert_eq!(reconciler.sync(&ctx).await.expect("sync"), SyncOutcome::Idle);

    reconciler
        .observer()
        .set_pods(vec![ready_pod("etcd-b", "10.0.0.2")])
        .await;
    let outcome = reconciler.sync(&ctx).await.expect("sync");
    assert!(matches!(outcome, SyncOutcome::Added { .. }));
}

#[fluvio_future::test]
async fn test_controller_stops_on_shutdown() {
    let config = fast_config();
    let reconciler = Reconciler::from_config(
        FakePodObserver::new(vec![ready_pod("etcd-b", "10.0.0.2")]),
        FakeMemberClient::new(vec![]),
        &config,
    );
    let shutdown = CancellationToken::new();
    shutdown.cancel();

    let controller = MemberController::new(reconciler, &config, shutdown);
    controller.dispatch_loop().await;
}

#[fluvio_future::test]
async fn test_controller_loop_adds_once() {
    let config = fast_config();
    let observer = Arc::new(FakePodObserver::new(vec![ready_pod("etcd-b", "10.0.0.2")]));
    let members = Arc::new(FakeMemberClient::new(vec![]));
    let reconciler = Reconciler::from_config(observer.clone(), members.clone(), &config);
    let shutdown = CancellationToken::new();
    let controller = MemberController::new(reconciler, &config, shutdown.clone());

    spawn(async move {
        sleep(Duration::from_millis(200)).await;
        shutdown.cancel();
    });

    controller.dispatch_loop().await;

    assert_eq!(members.add_calls(), 1);
    assert!(members.list_calls() > 1);
    assert!(observer.list_calls() > 1);
}

#[fluvio_future::test]
async fn test_controller_keeps_running_after_errors() {
    let config = fast_config();
    let observer = Arc::new(FakePodObserver::new(vec![ready_pod("etcd-b", "10.0.0.2")]));
    let members = Arc::new(FakeMemberClient::new(vec![]));
    members.fail_add("etcdserver: too many learner members in cluster").await;

    let reconciler = Reconciler::from_config(observer.clone(), members.clone(), &config);
    let shutdown = CancellationToken::new();
    let controller = MemberController::new(reconciler, &config, shutdown.clone());

    spawn(async move {
        sleep(Duration::from_millis(200)).await;
        shutdown.cancel();
    });

    controller.dispatch_loop().await;

    // every sync retried the add, none succeeded
    assert!(members.add_calls() > 1);
    assert!(members.added_peer_urls().await.is_empty());
}
