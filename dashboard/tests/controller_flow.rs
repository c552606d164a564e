//! End-to-end controller tests against the nullable ledger.
//!
//! Time is paused, so polling cadences and the one-second countdown tick
//! advance instantly whenever every task is idle.

use std::sync::Arc;
use std::time::Duration;

use staker_chain::{ChainError, StakerContract};
use staker_dashboard::{
    CountdownPhase, DashboardController, DashboardError, DashboardHandle, DashboardMetrics,
    DashboardSettings, DashboardView, ShutdownController, TxStatus,
};
use staker_nullables::{Mining, NullLedger, StakerFixture};
use staker_types::{BlockNumber, EthAddress, StakePreset, TxAction, TxRequest, Wei};
use tokio::sync::watch;
use tokio::task::JoinHandle;

const CALLER: EthAddress = EthAddress::new([0xac; 20]);

struct Harness {
    ledger: NullLedger,
    handle: DashboardHandle,
    metrics: Arc<DashboardMetrics>,
    shutdown: ShutdownController,
    task: JoinHandle<()>,
}

fn start(fixture: StakerFixture) -> Harness {
    start_with(fixture, |_| {})
}

fn start_with(fixture: StakerFixture, configure: impl FnOnce(&mut DashboardSettings)) -> Harness {
    let ledger = NullLedger::with_staker(fixture);
    ledger.set_sender(CALLER);
    let mut settings = DashboardSettings {
        contract: StakerContract::new(fixture.staker, fixture.external),
        caller: Some(CALLER),
        poll_interval: Duration::from_secs(1),
        block_poll: Duration::from_millis(100),
        event_start: BlockNumber::ZERO,
        receipt_poll: Duration::from_millis(100),
        receipt_timeout: Duration::from_secs(10),
        recent_tx_limit: 2,
    };
    configure(&mut settings);
    let metrics = Arc::new(DashboardMetrics::new().unwrap());
    let (controller, handle) =
        DashboardController::new(Arc::new(ledger.clone()), settings, metrics.clone());
    let shutdown = ShutdownController::new();
    let task = tokio::spawn(controller.run(shutdown.clone()));
    Harness {
        ledger,
        handle,
        metrics,
        shutdown,
        task,
    }
}

async fn wait_for(
    rx: &mut watch::Receiver<DashboardView>,
    condition: impl Fn(&DashboardView) -> bool,
) -> DashboardView {
    tokio::time::timeout(Duration::from_secs(120), async {
        loop {
            {
                let view = rx.borrow_and_update();
                if condition(&view) {
                    return view.clone();
                }
            }
            rx.changed().await.unwrap();
        }
    })
    .await
    .expect("view never reached the expected state")
}

#[tokio::test(start_paused = true)]
async fn stake_then_execute_reaches_completion() {
    let h = start(StakerFixture {
        threshold: Wei::ONE_ETHER,
        time_left: 300,
        ..StakerFixture::default()
    });
    let mut views = h.handle.watch();

    let view = wait_for(&mut views, |v| v.snapshot.is_some()).await;
    assert_eq!(view.progress_percent, 0);
    assert!(view.eligibility.can_stake);
    assert!(!view.eligibility.can_execute);
    assert!(!view.eligibility.can_withdraw);
    assert_eq!(view.countdown.phase, CountdownPhase::Running);

    let id = h.handle.submit(TxRequest::stake(StakePreset::One)).await.unwrap();
    let view = wait_for(&mut views, |v| {
        v.progress_percent == 100 && v.history.len() == 1 && v.eligibility.can_execute
    })
    .await;
    assert!(!view.eligibility.can_withdraw);
    assert_eq!(view.history[0].from, CALLER);
    assert_eq!(view.caller_stake_ether.as_deref(), Some("1.0"));
    let view = wait_for(&mut views, |v| {
        v.recent_transactions
            .iter()
            .any(|n| n.id == id && matches!(n.status, TxStatus::Mined { .. }))
    })
    .await;
    assert_eq!(view.recent_transactions.len(), 1);

    h.handle.submit(TxRequest::Execute).await.unwrap();
    let view = wait_for(&mut views, |v| v.completion.complete && v.completion.external_balance == Some(Wei::ONE_ETHER)).await;
    assert_eq!(view.progress_percent, 100);
    assert!(!view.eligibility.can_execute);
    assert!(!view.eligibility.can_stake);
    assert!(!view.eligibility.can_withdraw);
    assert_eq!(view.countdown.headline, "staking has ended");
    assert_eq!(view.countdown.phase, CountdownPhase::Frozen);

    assert_eq!(h.metrics.tx_submitted.with_label_values(&["stake"]).get(), 1);
    assert_eq!(h.metrics.tx_submitted.with_label_values(&["execute"]).get(), 1);
    h.shutdown.shutdown();
    h.task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn stake_after_deadline_is_declined_without_network_call() {
    let h = start(StakerFixture {
        threshold: Wei::from_ether(5),
        time_left: 0,
        ..StakerFixture::default()
    });
    h.ledger.seed_stake(CALLER, Wei::from_ether(2));
    let mut views = h.handle.watch();

    let view = wait_for(&mut views, |v| v.snapshot.is_some()).await;
    assert!(view.eligibility.can_withdraw);
    assert!(!view.eligibility.can_execute);
    assert!(!view.eligibility.can_stake);

    let err = h
        .handle
        .submit(TxRequest::Stake {
            value: Wei::from_ether_str("0.1").unwrap(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, DashboardError::NotEligible { action: TxAction::Stake }));
    assert!(h.ledger.sent_transactions().is_empty());
    assert_eq!(h.metrics.tx_not_eligible.get(), 1);

    h.handle.submit(TxRequest::Withdraw).await.unwrap();
    let view = wait_for(&mut views, |v| {
        v.snapshot.is_some_and(|s| s.caller_stake.is_zero())
    })
    .await;
    assert!(!view.eligibility.can_withdraw);
    h.shutdown.shutdown();
}

#[tokio::test(start_paused = true)]
async fn local_countdown_masks_stake_before_next_read() {
    let h = start(StakerFixture {
        time_left: 3,
        ..StakerFixture::default()
    });
    let mut views = h.handle.watch();
    wait_for(&mut views, |v| v.eligibility.can_stake).await;

    // The ledger keeps answering 3 at the same block, so re-reads are
    // duplicates and the local clock runs out first.
    let view = wait_for(&mut views, |v| !v.eligibility.can_stake).await;
    assert_eq!(view.countdown.remaining_seconds, 0);
    assert_eq!(view.snapshot.map(|s| s.seconds_left), Some(3));

    let err = h.handle.submit(TxRequest::stake(StakePreset::Tenth)).await.unwrap_err();
    assert!(matches!(err, DashboardError::NotEligible { .. }));
    h.shutdown.shutdown();
}

#[tokio::test(start_paused = true)]
async fn fresh_read_resets_countdown() {
    let h = start(StakerFixture {
        time_left: 100,
        ..StakerFixture::default()
    });
    let mut views = h.handle.watch();
    wait_for(&mut views, |v| v.countdown.remaining_seconds == 100).await;
    wait_for(&mut views, |v| v.countdown.remaining_seconds == 98).await;

    h.ledger.set_time_left(500);
    h.ledger.mine_block();
    let view = wait_for(&mut views, |v| v.countdown.remaining_seconds >= 499).await;
    assert_eq!(view.countdown.phase, CountdownPhase::Running);
    h.shutdown.shutdown();
}

#[tokio::test(start_paused = true)]
async fn read_failures_mark_sources_stale_and_keep_values() {
    let h = start(StakerFixture::default());
    let mut views = h.handle.watch();
    let before = wait_for(&mut views, |v| v.snapshot.is_some()).await;

    h.ledger.fail_reads(ChainError::Unreachable("node down".into()));
    let view = wait_for(&mut views, |v| v.sources.iter().any(|s| s.stale)).await;
    assert_eq!(view.snapshot, before.snapshot);
    let failing = view.sources.iter().find(|s| s.stale).unwrap();
    assert!(failing.consecutive_failures >= 1);
    assert!(failing.last_error.as_deref().unwrap_or_default().contains("node down"));

    h.ledger.restore_reads();
    h.ledger.mine_block();
    let view = wait_for(&mut views, |v| v.sources.iter().all(|s| !s.stale)).await;
    assert!(view.snapshot.is_some());
    h.shutdown.shutdown();
}

#[tokio::test(start_paused = true)]
async fn reverted_transaction_is_broadcast_as_failed() {
    let h = start(StakerFixture::default());
    h.ledger.set_mining(Mining::Revert);
    let mut views = h.handle.watch();
    let mut notifications = h.handle.subscribe_transactions();
    wait_for(&mut views, |v| v.eligibility.can_stake).await;

    let id = h.handle.submit(TxRequest::stake(StakePreset::Hundredth)).await.unwrap();
    let pending = notifications.recv().await.unwrap();
    assert_eq!(pending.id, id);
    assert_eq!(pending.status, TxStatus::Pending);
    let failed = notifications.recv().await.unwrap();
    assert!(matches!(failed.status, TxStatus::Failed { .. }));
    assert_eq!(h.metrics.tx_failed.get(), 1);
    h.shutdown.shutdown();
}

#[tokio::test(start_paused = true)]
async fn recent_transactions_are_bounded() {
    let h = start(StakerFixture::default());
    let mut views = h.handle.watch();
    wait_for(&mut views, |v| v.eligibility.can_stake).await;

    let mut view = None;
    for _ in 0..3 {
        wait_for(&mut views, |v| v.eligibility.can_stake).await;
        let id = h.handle.submit(TxRequest::stake(StakePreset::Hundredth)).await.unwrap();
        view = Some(
            wait_for(&mut views, |v| {
                v.recent_transactions
                    .iter()
                    .any(|n| n.id == id && matches!(n.status, TxStatus::Mined { .. }))
            })
            .await,
        );
    }
    let view = view.unwrap();
    assert_eq!(view.recent_transactions.len(), 2);
    assert_eq!(view.recent_transactions[0].id.as_u64(), 2);
    assert_eq!(view.recent_transactions[1].id.as_u64(), 3);
    h.shutdown.shutdown();
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_every_task() {
    let h = start(StakerFixture::default());
    let mut views = h.handle.watch();
    wait_for(&mut views, |v| v.snapshot.is_some()).await;

    h.shutdown.shutdown();
    h.task.await.unwrap();

    let reads = h.ledger.read_count();
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(h.ledger.read_count(), reads);

    let err = h.handle.submit(TxRequest::Execute).await.unwrap_err();
    assert!(matches!(err, DashboardError::Closed));
}

#[tokio::test(start_paused = true)]
async fn completion_disables_stake_once_execute_is_mined() {
    let h = start_with(
        StakerFixture {
            threshold: Wei::ONE_ETHER,
            time_left: 300,
            ..StakerFixture::default()
        },
        |settings| {
            settings.poll_interval = Duration::from_secs(5);
            settings.block_poll = Duration::from_millis(250);
        },
    );
    let mut views = h.handle.watch();
    wait_for(&mut views, |v| v.eligibility.can_stake).await;
    h.handle.submit(TxRequest::stake(StakePreset::One)).await.unwrap();
    wait_for(&mut views, |v| v.eligibility.can_execute).await;

    let execute = h.handle.submit(TxRequest::Execute).await.unwrap();
    let mut view = wait_for(&mut views, |v| {
        v.recent_transactions
            .iter()
            .any(|n| n.id == execute && matches!(n.status, TxStatus::Mined { .. }))
    })
    .await;
    assert!(!view.eligibility.can_stake);

    let err = h.handle.submit(TxRequest::stake(StakePreset::Tenth)).await.unwrap_err();
    assert!(matches!(err, DashboardError::NotEligible { action: TxAction::Stake }));

    tokio::time::timeout(Duration::from_secs(60), async {
        while !view.completion.complete {
            views.changed().await.unwrap();
            view = views.borrow_and_update().clone();
            assert!(
                !view.eligibility.can_stake,
                "stake offered after execute was mined (observed at {:?})",
                view.observed_at
            );
        }
    })
    .await
    .expect("completion was never read");

    assert!(!view.eligibility.can_execute);
    assert_eq!(h.ledger.sent_transactions().len(), 2);
    h.shutdown.shutdown();
}
