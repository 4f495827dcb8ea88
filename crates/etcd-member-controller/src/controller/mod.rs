mod eligibility;
mod reconciler;
mod runner;

use std::future::Future;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use fluvio_future::timer::sleep;

use crate::ReconcileError;

pub use eligibility::{
    CHECKS, Candidate, CandidateSelector, DEFAULT_MEMBER_CONTAINER, Ineligible, Scope, evaluate,
    select_add_candidate,
};
pub use reconciler::Reconciler;
pub use runner::MemberController;

/// Result of a sync that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// no pod is eligible, the steady state
    Idle,
    Added {
        pod: String,
        peer_url: String,
        member_id: u64,
    },
    /// lost a race against another add of the same peer
    AlreadyMember { pod: String, peer_url: String },
}

/// Cancellation and deadline supplied by the caller of a sync
#[derive(Debug, Clone, Default)]
pub struct SyncContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl SyncContext {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            deadline: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// fails if the sync must not start another call
    pub fn check(&self) -> Result<(), ReconcileError> {
        if self.cancel.is_cancelled() {
            return Err(ReconcileError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(ReconcileError::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// run `call` unless cancelled or past the deadline first
    pub async fn bound<F, T>(&self, call: F) -> Result<T, ReconcileError>
    where
        F: Future<Output = T>,
    {
        use tokio::select;

        self.check()?;

        select! {
            biased;

            _ = self.cancel.cancelled() => Err(ReconcileError::Cancelled),
            _ = expire(self.remaining()) => Err(ReconcileError::DeadlineExceeded),
            output = call => Ok(output),
        }
    }

    /// Wait for `call` until the deadline. Cancellation is ignored so a write
    /// that was issued is not given up on shutdown. Past the deadline the call
    /// is dropped; whatever it did is seen by the next read of the cluster.
    pub async fn within_deadline<F, T>(&self, call: F) -> Result<T, ReconcileError>
    where
        F: Future<Output = T>,
    {
        use tokio::select;

        select! {
            biased;

            output = call => Ok(output),
            _ = expire(self.remaining()) => Err(ReconcileError::DeadlineExceeded),
        }
    }

    fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }
}

async fn expire(remaining: Option<Duration>) {
    match remaining {
        Some(remaining) => {
            sleep(remaining).await;
        }
        None => std::future::pending::<()>().await,
    }
}
