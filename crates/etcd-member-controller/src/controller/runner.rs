use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use fluvio_future::task::spawn;
use fluvio_future::timer::sleep;

use crate::ReconcileError;
use crate::config::ControllerConfig;
use crate::member::MemberClient;
use crate::pod::PodObserver;

use super::{Reconciler, SyncContext, SyncOutcome};

/// Drives the reconciler on a resync cadence, one sync at a time
pub struct MemberController<P, M> {
    reconciler: Reconciler<P, M>,
    resync_interval: Duration,
    error_backoff: Duration,
    sync_timeout: Duration,
    shutdown: CancellationToken,
    counter: u64,
}

impl<P, M> MemberController<P, M>
where
    P: PodObserver + 'static,
    M: MemberClient + 'static,
{
    pub fn new(
        reconciler: Reconciler<P, M>,
        config: &ControllerConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            reconciler,
            resync_interval: config.resync_interval,
            error_backoff: config.error_backoff,
            sync_timeout: config.sync_timeout,
            shutdown,
            counter: 0,
        }
    }

    pub fn start(self) {
        info!("starting member controller");
        spawn(self.dispatch_loop());
    }

    pub fn reconciler(&self) -> &Reconciler<P, M> {
        &self.reconciler
    }

    /// run until shutdown is requested
    #[instrument(skip(self), name = "MemberControllerLoop")]
    pub async fn dispatch_loop(mut self) {
        use tokio::select;

        info!("started");
        while !self.shutdown.is_cancelled() {
            self.counter += 1;
            let wait = match self.sync_once().await {
                Ok(outcome) => {
                    match &outcome {
                        SyncOutcome::Idle => debug!(counter = self.counter, "membership up to date"),
                        SyncOutcome::Added {
                            pod,
                            peer_url,
                            member_id,
                        } => info!(%pod, %peer_url, member_id = %format!("{member_id:x}"), "member added"),
                        SyncOutcome::AlreadyMember { pod, peer_url } => {
                            info!(%pod, %peer_url, "member already present")
                        }
                    }
                    self.resync_interval
                }
                Err(ReconcileError::Cancelled) => break,
                Err(err) => {
                    error!("error with member sync: {:#?}", err);
                    debug!(
                        "sleeping {} seconds try again",
                        self.error_backoff.as_secs_f32()
                    );
                    self.error_backoff
                }
            };

            select! {
                _ = self.shutdown.cancelled() => break,
                _ = sleep(wait) => {}
            }
        }
        info!("stopped");
    }

    /// a single sync bounded by the configured timeout
    pub async fn sync_once(&self) -> Result<SyncOutcome, ReconcileError> {
        let ctx = SyncContext::new(self.shutdown.child_token()).with_timeout(self.sync_timeout);
        self.reconciler.sync(&ctx).await
    }
}
