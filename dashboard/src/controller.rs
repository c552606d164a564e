//! Dashboard controller: the single merge point.
//!
//! Sources, the countdown tick, user commands and transaction notifications
//! all arrive at one task. It owns every piece of mutable state, recomputes
//! the derived state after each change and publishes a read-only
//! [`DashboardView`] on a `watch` channel.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use staker_chain::{LedgerReader, StakerContract, TxSigner};
use staker_types::{BlockNumber, EthAddress, StakePreset, StakeSnapshot, TxRequest, Wei};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::{Instant, MissedTickBehavior};

use crate::config::DashboardConfig;
use crate::countdown::{CountdownClock, CountdownView, ResetOutcome};
use crate::derived::{self, ActionEligibility};
use crate::history::{HistoryEntry, StakeHistory};
use crate::metrics::DashboardMetrics;
use crate::orchestrator::{OrchestratorSettings, TransactionOrchestrator, TxId, TxNotification, TxStatus};
use crate::queries::StakerQuery;
use crate::shutdown::ShutdownController;
use crate::source::{spawn_source, RefreshTrigger, SourceEvent, SourceHandle, SourceKind, SourceValue};
use crate::DashboardError;

const COMMAND_CAPACITY: usize = 32;
const SOURCE_CAPACITY: usize = 64;
const NOTIFICATION_CAPACITY: usize = 64;

/// Runtime settings of one dashboard.
#[derive(Clone, Debug)]
pub struct DashboardSettings {
    pub contract: StakerContract,
    pub caller: Option<EthAddress>,
    pub poll_interval: Duration,
    pub block_poll: Duration,
    pub event_start: BlockNumber,
    pub receipt_poll: Duration,
    pub receipt_timeout: Duration,
    pub recent_tx_limit: usize,
}

impl DashboardSettings {
    pub fn from_config(config: &DashboardConfig, contract: StakerContract) -> Self {
        Self {
            contract,
            caller: config.account,
            poll_interval: config.poll_interval(),
            block_poll: config.block_poll(),
            event_start: config.event_start(),
            receipt_poll: config.receipt_poll(),
            receipt_timeout: config.receipt_timeout(),
            recent_tx_limit: config.recent_tx_limit,
        }
    }

    /// Everything that can change with a block follows new blocks; only the
    /// goal, fixed at deployment, polls on the interval.
    pub fn trigger_for(&self, kind: SourceKind) -> RefreshTrigger {
        match kind {
            SourceKind::GoalThreshold => RefreshTrigger::Every(self.poll_interval),
            SourceKind::TotalStaked
            | SourceKind::CallerStake
            | SourceKind::SecondsLeft
            | SourceKind::Completion
            | SourceKind::StakeEvents
            | SourceKind::ExternalBalance => RefreshTrigger::NewBlock {
                poll: self.block_poll,
            },
        }
    }
}

/// Requests from the outer surface.
#[derive(Debug)]
pub enum DashboardCommand {
    Submit {
        request: TxRequest,
        reply: oneshot::Sender<Result<TxId, DashboardError>>,
    },
}

// ── Merge point ─────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Observed<T> {
    value: T,
    at: BlockNumber,
}

/// Latest value of every scalar source, each tagged with its block.
#[derive(Clone, Debug, Default)]
pub struct LatestValues {
    total_staked: Option<Observed<Wei>>,
    goal_threshold: Option<Observed<Wei>>,
    caller_stake: Option<Observed<Wei>>,
    seconds_left: Option<Observed<u64>>,
    completion: Option<Observed<bool>>,
    external_balance: Option<Observed<Wei>>,
}

fn replace<T>(slot: &mut Option<Observed<T>>, value: T, at: BlockNumber) -> bool {
    if matches!(slot, Some(current) if at < current.at) {
        return false;
    }
    *slot = Some(Observed { value, at });
    true
}

impl LatestValues {
    /// Store `value` unless a value from a newer block is already held.
    /// Returns `false` for stale or mismatched values.
    pub fn apply(&mut self, kind: SourceKind, value: &SourceValue, at: BlockNumber) -> bool {
        match (kind, value) {
            (SourceKind::TotalStaked, SourceValue::Amount(v)) => replace(&mut self.total_staked, *v, at),
            (SourceKind::GoalThreshold, SourceValue::Amount(v)) => replace(&mut self.goal_threshold, *v, at),
            (SourceKind::CallerStake, SourceValue::Amount(v)) => replace(&mut self.caller_stake, *v, at),
            (SourceKind::ExternalBalance, SourceValue::Amount(v)) => {
                replace(&mut self.external_balance, *v, at)
            }
            (SourceKind::SecondsLeft, SourceValue::Seconds(v)) => replace(&mut self.seconds_left, *v, at),
            (SourceKind::Completion, SourceValue::Flag(v)) => replace(&mut self.completion, *v, at),
            _ => false,
        }
    }

    /// The merged snapshot, once every required source has delivered.
    pub fn snapshot(&self) -> Option<StakeSnapshot> {
        Some(StakeSnapshot {
            total_staked: self.total_staked?.value,
            goal_threshold: self.goal_threshold?.value,
            caller_stake: self.caller_stake?.value,
            seconds_left: self.seconds_left?.value,
            is_complete: self.completion?.value,
        })
    }

    pub fn external_balance(&self) -> Option<Wei> {
        self.external_balance.map(|o| o.value)
    }

    pub fn is_complete(&self) -> bool {
        self.completion.is_some_and(|o| o.value)
    }

    /// Whether the values gating an action (`timeLeft`, `completed`) were
    /// read no earlier than every balance. A balance from a newer block than
    /// the gates means a transaction landed that the gates have not seen.
    pub fn gates_current(&self) -> bool {
        let gates = [self.seconds_left.map(|o| o.at), self.completion.map(|o| o.at)]
            .into_iter()
            .flatten()
            .min();
        let balances = [
            self.total_staked.map(|o| o.at),
            self.caller_stake.map(|o| o.at),
            self.external_balance.map(|o| o.at),
        ]
        .into_iter()
        .flatten()
        .max();
        match (gates, balances) {
            (Some(gates), Some(balances)) => gates >= balances,
            _ => true,
        }
    }

    /// Whether every block-dependent value was read at `block` or later.
    pub fn caught_up_to(&self, block: BlockNumber) -> bool {
        [
            self.total_staked.map(|o| o.at),
            self.caller_stake.map(|o| o.at),
            self.seconds_left.map(|o| o.at),
            self.completion.map(|o| o.at),
        ]
        .into_iter()
        .all(|at| at.is_some_and(|at| at >= block))
    }

    /// Newest block any value was observed at.
    pub fn newest_block(&self) -> Option<BlockNumber> {
        [
            self.total_staked.map(|o| o.at),
            self.goal_threshold.map(|o| o.at),
            self.caller_stake.map(|o| o.at),
            self.seconds_left.map(|o| o.at),
            self.completion.map(|o| o.at),
            self.external_balance.map(|o| o.at),
        ]
        .into_iter()
        .flatten()
        .max()
    }
}

// ── View ────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SourceHealth {
    pub kind: SourceKind,
    pub last_good_block: Option<BlockNumber>,
    pub consecutive_failures: u32,
    pub stale: bool,
    pub last_error: Option<String>,
}

impl SourceHealth {
    pub fn new(kind: SourceKind) -> Self {
        Self {
            kind,
            last_good_block: None,
            consecutive_failures: 0,
            stale: false,
            last_error: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CompletionBanner {
    pub complete: bool,
    pub external_balance: Option<Wei>,
    pub external_balance_ether: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PresetView {
    pub preset: StakePreset,
    pub label: &'static str,
    pub value: Wei,
    pub default: bool,
}

/// Everything the browser renders, recomputed on every change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DashboardView {
    pub staker: EthAddress,
    pub external: EthAddress,
    pub caller: Option<EthAddress>,
    pub observed_at: Option<BlockNumber>,
    pub snapshot: Option<StakeSnapshot>,
    pub total_staked_ether: Option<String>,
    pub goal_ether: Option<String>,
    pub caller_stake_ether: Option<String>,
    pub progress_percent: u8,
    pub eligibility: ActionEligibility,
    pub countdown: CountdownView,
    pub history: Vec<HistoryEntry>,
    pub sources: Vec<SourceHealth>,
    pub recent_transactions: Vec<TxNotification>,
    pub completion: CompletionBanner,
    pub presets: Vec<PresetView>,
}

// ── Handle ──────────────────────────────────────────────────────────────

/// Cloneable access to a running controller.
#[derive(Clone)]
pub struct DashboardHandle {
    view: watch::Receiver<DashboardView>,
    commands: mpsc::Sender<DashboardCommand>,
    notifications: broadcast::Sender<TxNotification>,
}

impl DashboardHandle {
    /// The latest published view.
    pub fn view(&self) -> DashboardView {
        self.view.borrow().clone()
    }

    /// A receiver that wakes on every published view.
    pub fn watch(&self) -> watch::Receiver<DashboardView> {
        self.view.clone()
    }

    pub fn subscribe_transactions(&self) -> broadcast::Receiver<TxNotification> {
        self.notifications.subscribe()
    }

    /// Route a user action through the controller.
    pub async fn submit(&self, request: TxRequest) -> Result<TxId, DashboardError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(DashboardCommand::Submit { request, reply })
            .await
            .map_err(|_| DashboardError::Closed)?;
        rx.await.map_err(|_| DashboardError::Closed)?
    }
}

// ── Controller ──────────────────────────────────────────────────────────

pub struct DashboardController<C> {
    client: Arc<C>,
    settings: DashboardSettings,
    metrics: Arc<DashboardMetrics>,
    view_tx: watch::Sender<DashboardView>,
    commands: mpsc::Receiver<DashboardCommand>,
    notify_tx: broadcast::Sender<TxNotification>,
}

impl<C> DashboardController<C>
where
    C: LedgerReader + TxSigner + 'static,
{
    pub fn new(
        client: Arc<C>,
        settings: DashboardSettings,
        metrics: Arc<DashboardMetrics>,
    ) -> (Self, DashboardHandle) {
        let initial = DashboardState::new(&settings, metrics.clone()).view();
        let (view_tx, view_rx) = watch::channel(initial);
        let (command_tx, commands) = mpsc::channel(COMMAND_CAPACITY);
        let (notify_tx, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        let handle = DashboardHandle {
            view: view_rx,
            commands: command_tx,
            notifications: notify_tx.clone(),
        };
        let controller = Self {
            client,
            settings,
            metrics,
            view_tx,
            commands,
            notify_tx,
        };
        (controller, handle)
    }

    /// Run until shutdown. Every source and in-flight transaction task is
    /// aborted before this returns.
    pub async fn run(self, shutdown: ShutdownController) {
        let Self {
            client,
            settings,
            metrics,
            view_tx,
            mut commands,
            notify_tx,
        } = self;

        let (source_tx, mut source_rx) = mpsc::channel(SOURCE_CAPACITY);
        let sources: Vec<SourceHandle> = SourceKind::ALL
            .into_iter()
            .map(|kind| {
                let query = StakerQuery::new(kind, settings.contract, settings.caller, settings.event_start);
                spawn_source(
                    query,
                    settings.trigger_for(kind),
                    client.clone(),
                    source_tx.clone(),
                    shutdown.subscribe(),
                )
            })
            .collect();
        drop(source_tx);

        let (tx_events, mut tx_rx) = mpsc::unbounded_channel();
        let mut orchestrator = TransactionOrchestrator::new(
            client.clone(),
            settings.contract,
            OrchestratorSettings {
                receipt_poll: settings.receipt_poll,
                receipt_timeout: settings.receipt_timeout,
            },
            tx_events,
        );
        let mut state = DashboardState::new(&settings, metrics);

        let second = Duration::from_secs(1);
        let mut ticker = tokio::time::interval_at(Instant::now() + second, second);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut stop = shutdown.subscribe();

        tracing::info!(
            staker = %settings.contract.address,
            external = %settings.contract.external,
            sources = sources.len(),
            "dashboard controller started"
        );
        view_tx.send_replace(state.view());

        loop {
            tokio::select! {
                biased;
                _ = stop.recv() => break,
                Some(event) = source_rx.recv() => state.on_source_event(event),
                Some(notification) = tx_rx.recv() => {
                    state.on_tx_notification(notification.clone());
                    let _ = notify_tx.send(notification);
                }
                Some(command) = commands.recv() => match command {
                    DashboardCommand::Submit { request, reply } => {
                        let result = state.submit(&mut orchestrator, request);
                        let _ = reply.send(result);
                    }
                },
                _ = ticker.tick() => state.on_tick(),
            }
            view_tx.send_replace(state.view());
        }

        for source in &sources {
            source.cancel();
        }
        orchestrator.shutdown();
        tracing::info!("dashboard controller stopped");
    }
}

/// Mutable state owned by the controller task.
struct DashboardState {
    contract: StakerContract,
    caller: Option<EthAddress>,
    recent_tx_limit: usize,
    metrics: Arc<DashboardMetrics>,
    latest: LatestValues,
    countdown: CountdownClock,
    history: StakeHistory,
    health: BTreeMap<SourceKind, SourceHealth>,
    recent: VecDeque<TxNotification>,
    /// Block of the newest mined transaction.
    last_mined: Option<BlockNumber>,
}

impl DashboardState {
    fn new(settings: &DashboardSettings, metrics: Arc<DashboardMetrics>) -> Self {
        let health = SourceKind::ALL
            .into_iter()
            .map(|kind| (kind, SourceHealth::new(kind)))
            .collect();
        Self {
            contract: settings.contract,
            caller: settings.caller,
            recent_tx_limit: settings.recent_tx_limit,
            metrics,
            latest: LatestValues::default(),
            countdown: CountdownClock::new(),
            history: StakeHistory::new(),
            health,
            recent: VecDeque::new(),
            last_mined: None,
        }
    }

    fn on_source_event(&mut self, event: SourceEvent) {
        match event {
            SourceEvent::Value {
                kind,
                value,
                observed_at,
            } => {
                self.metrics.source_reads.with_label_values(&[kind.as_str()]).inc();
                if let Some(health) = self.health.get_mut(&kind) {
                    health.last_good_block = Some(observed_at);
                    health.consecutive_failures = 0;
                    health.stale = false;
                    health.last_error = None;
                }
                self.apply_value(kind, value, observed_at);
            }
            SourceEvent::Failed { kind, error } => {
                self.metrics.source_failures.with_label_values(&[kind.as_str()]).inc();
                if let Some(health) = self.health.get_mut(&kind) {
                    health.consecutive_failures += 1;
                    health.stale = true;
                    health.last_error = Some(error.to_string());
                }
            }
        }
    }

    fn apply_value(&mut self, kind: SourceKind, value: SourceValue, at: BlockNumber) {
        if let SourceValue::Events(events) = value {
            let added = self.history.extend(events);
            if added > 0 {
                tracing::debug!(added, total = self.history.len(), "new stake events");
            }
            return;
        }
        if !self.latest.apply(kind, &value, at) {
            self.metrics.stale_drops.inc();
            return;
        }
        match value {
            SourceValue::Seconds(seconds) => {
                if self.countdown.apply_authoritative(seconds, at) == ResetOutcome::Stale {
                    self.metrics.stale_drops.inc();
                }
            }
            SourceValue::Flag(complete) if kind == SourceKind::Completion => {
                if complete && !self.countdown.is_complete() {
                    tracing::info!(block = %at, "staking completed");
                }
                self.countdown.set_complete(complete);
            }
            _ => {}
        }
        self.update_gauges();
    }

    fn on_tick(&mut self) {
        self.countdown.tick();
        self.update_gauges();
    }

    fn update_gauges(&self) {
        let snapshot = self.latest.snapshot();
        let progress = snapshot.as_ref().map(derived::progress_percent).unwrap_or(0);
        self.metrics.progress_percent.set(i64::from(progress));
        self.metrics
            .seconds_left
            .set(i64::try_from(self.countdown.remaining()).unwrap_or(i64::MAX));
    }

    /// Eligibility right now: the snapshot's rules, masked by the local
    /// countdown once it has run out. Nothing is enabled while the merged
    /// values straddle blocks or predate the newest mined transaction.
    fn eligibility(&self) -> ActionEligibility {
        if !self.latest.gates_current() {
            return ActionEligibility::NONE;
        }
        if let Some(block) = self.last_mined {
            if !self.latest.caught_up_to(block) {
                return ActionEligibility::NONE;
            }
        }
        let snapshot = self.latest.snapshot();
        let eligibility = derived::eligibility(snapshot.as_ref());
        if self.countdown.locally_expired() {
            eligibility.mask_local_deadline()
        } else {
            eligibility
        }
    }

    fn submit<C: TxSigner + 'static>(
        &mut self,
        orchestrator: &mut TransactionOrchestrator<C>,
        request: TxRequest,
    ) -> Result<TxId, DashboardError> {
        let result = orchestrator.submit(request, &self.eligibility());
        match &result {
            Ok(_) => self
                .metrics
                .tx_submitted
                .with_label_values(&[request.action().as_str()])
                .inc(),
            Err(DashboardError::NotEligible { .. }) => self.metrics.tx_not_eligible.inc(),
            Err(_) => {}
        }
        result
    }

    fn on_tx_notification(&mut self, notification: TxNotification) {
        match &notification.status {
            TxStatus::Mined { receipt } => {
                self.metrics.tx_mined.inc();
                self.last_mined = self.last_mined.max(Some(receipt.block_number));
            }
            TxStatus::Failed { .. } => self.metrics.tx_failed.inc(),
            TxStatus::Pending => {}
        }
        if let Some(existing) = self.recent.iter_mut().find(|n| n.id == notification.id) {
            *existing = notification;
            return;
        }
        self.recent.push_back(notification);
        while self.recent.len() > self.recent_tx_limit {
            self.recent.pop_front();
        }
    }

    fn view(&self) -> DashboardView {
        let snapshot = self.latest.snapshot();
        let derived = derived::compute(snapshot.as_ref(), &self.history);
        let external_balance = self.latest.external_balance();
        DashboardView {
            staker: self.contract.address,
            external: self.contract.external,
            caller: self.caller,
            observed_at: self.latest.newest_block(),
            snapshot,
            total_staked_ether: snapshot.map(|s| s.total_staked.format_ether()),
            goal_ether: snapshot.map(|s| s.goal_threshold.format_ether()),
            caller_stake_ether: snapshot.map(|s| s.caller_stake.format_ether()),
            progress_percent: derived.progress_percent,
            eligibility: self.eligibility(),
            countdown: self.countdown.view(),
            history: derived.formatted_history,
            sources: self.health.values().cloned().collect(),
            recent_transactions: self.recent.iter().cloned().collect(),
            completion: CompletionBanner {
                complete: self.latest.is_complete(),
                external_balance,
                external_balance_ether: external_balance.map(|w| w.format_ether()),
            },
            presets: StakePreset::ALL
                .into_iter()
                .map(|preset| PresetView {
                    preset,
                    label: preset.label(),
                    value: preset.value(),
                    default: preset == StakePreset::default(),
                })
                .collect(),
        }
    }
}
