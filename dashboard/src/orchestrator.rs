//! Transaction orchestration.
//!
//! Requests are checked against the current eligibility, then sent through
//! the signer on a background task that polls for the receipt. Progress is
//! reported as a stream of [`TxNotification`]s; the caller never blocks on
//! the network.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use staker_chain::{StakerContract, TxReceipt, TxSigner};
use staker_types::{TxHash, TxRequest};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::derived::ActionEligibility;
use crate::DashboardError;

/// Local identifier of a submitted request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TxId(u64);

impl TxId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx#{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TxStatus {
    Pending,
    Mined { receipt: TxReceipt },
    Failed {
        reason: String,
        hash: Option<TxHash>,
    },
}

impl TxStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TxStatus::Pending)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TxNotification {
    pub id: TxId,
    pub request: TxRequest,
    pub status: TxStatus,
}

#[derive(Clone, Copy, Debug)]
pub struct OrchestratorSettings {
    pub receipt_poll: Duration,
    pub receipt_timeout: Duration,
}

pub struct TransactionOrchestrator<S> {
    signer: Arc<S>,
    contract: StakerContract,
    settings: OrchestratorSettings,
    notifications: mpsc::UnboundedSender<TxNotification>,
    next_id: u64,
    in_flight: Vec<JoinHandle<()>>,
}

impl<S: TxSigner + 'static> TransactionOrchestrator<S> {
    pub fn new(
        signer: Arc<S>,
        contract: StakerContract,
        settings: OrchestratorSettings,
        notifications: mpsc::UnboundedSender<TxNotification>,
    ) -> Self {
        Self {
            signer,
            contract,
            settings,
            notifications,
            next_id: 1,
            in_flight: Vec::new(),
        }
    }

    /// Validate `request` against `eligibility` and start it.
    ///
    /// Rejected requests make no network call. Accepted ones emit `Pending`
    /// before this returns.
    pub fn submit(
        &mut self,
        request: TxRequest,
        eligibility: &ActionEligibility,
    ) -> Result<TxId, DashboardError> {
        if let TxRequest::Stake { value } = request {
            if value.is_zero() {
                return Err(DashboardError::InvalidRequest("stake value must be non-zero".into()));
            }
        }
        let action = request.action();
        if !eligibility.permits(action) {
            tracing::info!(%action, "declining request, action not eligible");
            return Err(DashboardError::NotEligible { action });
        }

        let id = TxId(self.next_id);
        self.next_id += 1;
        let _ = self.notifications.send(TxNotification {
            id,
            request,
            status: TxStatus::Pending,
        });
        tracing::info!(%id, %action, value = %request.value(), "submitting transaction");

        let signer = self.signer.clone();
        let call = self.contract.write_call(&request);
        let settings = self.settings;
        let notifications = self.notifications.clone();
        let task = tokio::spawn(async move {
            let status = drive(signer.as_ref(), &call, settings).await;
            match &status {
                TxStatus::Mined { receipt } => {
                    tracing::info!(%id, hash = %receipt.tx_hash, block = %receipt.block_number, "transaction mined")
                }
                TxStatus::Failed { reason, .. } => {
                    tracing::warn!(%id, reason = %reason, "transaction failed")
                }
                TxStatus::Pending => {}
            }
            let _ = notifications.send(TxNotification { id, request, status });
        });

        self.in_flight.retain(|task| !task.is_finished());
        self.in_flight.push(task);
        Ok(id)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.iter().filter(|task| !task.is_finished()).count()
    }

    /// Abort every in-flight request.
    pub fn shutdown(&mut self) {
        for task in self.in_flight.drain(..) {
            task.abort();
        }
    }
}

impl<S> Drop for TransactionOrchestrator<S> {
    fn drop(&mut self) {
        for task in &self.in_flight {
            task.abort();
        }
    }
}

async fn drive<S: TxSigner>(signer: &S, call: &staker_chain::WriteCall, settings: OrchestratorSettings) -> TxStatus {
    let hash = match signer.send_transaction(call).await {
        Ok(hash) => hash,
        Err(e) => {
            return TxStatus::Failed {
                reason: e.to_string(),
                hash: None,
            }
        }
    };
    tracing::debug!(%hash, "transaction accepted by signer");

    match tokio::time::timeout(settings.receipt_timeout, wait_for_receipt(signer, &hash, settings.receipt_poll)).await {
        Ok(receipt) if receipt.success => TxStatus::Mined { receipt },
        Ok(_) => TxStatus::Failed {
            reason: "transaction reverted".into(),
            hash: Some(hash),
        },
        Err(_) => TxStatus::Failed {
            reason: format!("no receipt after {}s", settings.receipt_timeout.as_secs()),
            hash: Some(hash),
        },
    }
}

/// Poll until a receipt exists. Query errors are logged and retried.
async fn wait_for_receipt<S: TxSigner>(signer: &S, hash: &TxHash, poll: Duration) -> TxReceipt {
    loop {
        match signer.transaction_receipt(hash).await {
            Ok(Some(receipt)) => return receipt,
            Ok(None) => {}
            Err(e) => tracing::warn!(%hash, error = %e, "receipt query failed"),
        }
        tokio::time::sleep(poll).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use staker_chain::ChainError;
    use staker_nullables::{Mining, NullLedger, StakerFixture};
    use staker_types::{TxAction, Wei};

    const ALL: ActionEligibility = ActionEligibility {
        can_execute: true,
        can_withdraw: true,
        can_stake: true,
    };

    fn settings() -> OrchestratorSettings {
        OrchestratorSettings {
            receipt_poll: Duration::from_millis(100),
            receipt_timeout: Duration::from_secs(5),
        }
    }

    fn setup(
        ledger: &NullLedger,
    ) -> (
        TransactionOrchestrator<NullLedger>,
        mpsc::UnboundedReceiver<TxNotification>,
    ) {
        let fixture = StakerFixture::default();
        let contract = StakerContract::new(fixture.staker, fixture.external);
        let (tx, rx) = mpsc::unbounded_channel();
        (
            TransactionOrchestrator::new(Arc::new(ledger.clone()), contract, settings(), tx),
            rx,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn ineligible_request_makes_no_network_call() {
        let ledger = NullLedger::with_staker(StakerFixture::default());
        let (mut orchestrator, mut rx) = setup(&ledger);
        let err = orchestrator
            .submit(TxRequest::Stake { value: Wei::from_ether_str("0.1").unwrap() }, &ActionEligibility::NONE)
            .unwrap_err();
        assert!(matches!(err, DashboardError::NotEligible { action: TxAction::Stake }));
        assert_eq!(ledger.network_calls(), 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_stake_is_invalid() {
        let ledger = NullLedger::with_staker(StakerFixture::default());
        let (mut orchestrator, _rx) = setup(&ledger);
        let err = orchestrator
            .submit(TxRequest::Stake { value: Wei::ZERO }, &ALL)
            .unwrap_err();
        assert!(matches!(err, DashboardError::InvalidRequest(_)));
        assert_eq!(ledger.network_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn pending_then_mined() {
        let ledger = NullLedger::with_staker(StakerFixture::default());
        let (mut orchestrator, mut rx) = setup(&ledger);
        let request = TxRequest::Stake { value: Wei::ONE_ETHER };
        let id = orchestrator.submit(request, &ALL).unwrap();

        let first = rx.try_recv().unwrap();
        assert_eq!(first.id, id);
        assert_eq!(first.status, TxStatus::Pending);

        let second = rx.recv().await.unwrap();
        assert_eq!(second.id, id);
        assert!(matches!(second.status, TxStatus::Mined { .. }));
        assert_eq!(ledger.sent_transactions().len(), 1);
        assert_eq!(ledger.sent_transactions()[0].value, Wei::ONE_ETHER);
    }

    #[tokio::test(start_paused = true)]
    async fn revert_is_failed() {
        let ledger = NullLedger::with_staker(StakerFixture::default());
        ledger.set_mining(Mining::Revert);
        let (mut orchestrator, mut rx) = setup(&ledger);
        orchestrator.submit(TxRequest::Execute, &ALL).unwrap();
        rx.recv().await.unwrap();
        let done = rx.recv().await.unwrap();
        assert!(matches!(done.status, TxStatus::Failed { ref reason, hash: Some(_) } if reason == "transaction reverted"));
    }

    #[tokio::test(start_paused = true)]
    async fn send_error_is_failed_without_hash() {
        let ledger = NullLedger::with_staker(StakerFixture::default());
        ledger.fail_sends(ChainError::NoAccount);
        let (mut orchestrator, mut rx) = setup(&ledger);
        orchestrator.submit(TxRequest::Withdraw, &ALL).unwrap();
        rx.recv().await.unwrap();
        let done = rx.recv().await.unwrap();
        assert!(matches!(done.status, TxStatus::Failed { hash: None, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_receipt_times_out() {
        let ledger = NullLedger::with_staker(StakerFixture::default());
        ledger.set_mining(Mining::Manual);
        let (mut orchestrator, mut rx) = setup(&ledger);
        orchestrator.submit(TxRequest::Execute, &ALL).unwrap();
        rx.recv().await.unwrap();
        let done = rx.recv().await.unwrap();
        assert!(matches!(done.status, TxStatus::Failed { ref reason, .. } if reason.starts_with("no receipt")));
        assert!(ledger.receipt_queries() > 1);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_requests_are_tracked_independently() {
        let ledger = NullLedger::with_staker(StakerFixture::default());
        ledger.set_mining(Mining::Manual);
        let (mut orchestrator, mut rx) = setup(&ledger);
        let a = orchestrator.submit(TxRequest::Execute, &ALL).unwrap();
        let b = orchestrator.submit(TxRequest::Withdraw, &ALL).unwrap();
        assert_ne!(a, b);
        assert_eq!(rx.recv().await.unwrap().id, a);
        assert_eq!(rx.recv().await.unwrap().id, b);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(orchestrator.in_flight(), 2);
        ledger.mine_pending();
        let mut done = vec![rx.recv().await.unwrap().id, rx.recv().await.unwrap().id];
        done.sort();
        assert_eq!(done, vec![a, b]);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_aborts_in_flight() {
        let ledger = NullLedger::with_staker(StakerFixture::default());
        ledger.set_mining(Mining::Manual);
        let (mut orchestrator, mut rx) = setup(&ledger);
        orchestrator.submit(TxRequest::Execute, &ALL).unwrap();
        rx.recv().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        orchestrator.shutdown();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(orchestrator.in_flight(), 0);
        assert!(rx.try_recv().is_err());
    }
}
