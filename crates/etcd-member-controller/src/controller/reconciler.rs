use tracing::{debug, info, instrument, warn};

use crate::ReconcileError;
use crate::config::ControllerConfig;
use crate::member::MemberClient;
use crate::pod::{LabelSelector, PodObserver};

use super::{Candidate, CandidateSelector, SyncContext, SyncOutcome};

/// Adds at most one ready pod to the etcd cluster per sync.
///
/// Stateless between syncs: every sync reads members and pods again.
/// Callers must not run syncs for the same cluster concurrently; the
/// cluster rejecting a duplicate peer url is the only other guard.
pub struct Reconciler<P, M> {
    observer: P,
    members: M,
    selector: LabelSelector,
    candidates: CandidateSelector,
}

impl<P, M> Reconciler<P, M>
where
    P: PodObserver,
    M: MemberClient,
{
    pub fn new(
        observer: P,
        members: M,
        selector: LabelSelector,
        candidates: CandidateSelector,
    ) -> Self {
        Self {
            observer,
            members,
            selector,
            candidates,
        }
    }

    pub fn from_config(observer: P, members: M, config: &ControllerConfig) -> Self {
        Self::new(
            observer,
            members,
            config.selector.clone(),
            config.candidate_selector(),
        )
    }

    pub fn observer(&self) -> &P {
        &self.observer
    }

    pub fn member_client(&self) -> &M {
        &self.members
    }

    #[instrument(skip_all, fields(selector = %self.selector))]
    pub async fn sync(&self, ctx: &SyncContext) -> Result<SyncOutcome, ReconcileError> {
        let members = ctx
            .bound(self.members.list_members())
            .await?
            .map_err(ReconcileError::ListMembers)?;
        debug!(count = members.len(), "current members");

        let pods = ctx.bound(self.observer.list(&self.selector)).await??;
        debug!(count = pods.len(), "observed pods");

        let Some(Candidate {
            pod: candidate,
            peer_url,
        }) = self.candidates.next_candidate(&pods, &members)
        else {
            debug!("no pod eligible for membership");
            return Ok(SyncOutcome::Idle);
        };

        // last point to back out, cancellation no longer applies to the add
        ctx.check()?;

        info!(
            pod = %candidate.name,
            node = candidate.node_name.as_deref().unwrap_or_default(),
            %peer_url,
            "adding etcd member"
        );

        match ctx.within_deadline(self.members.add_member(&peer_url)).await? {
            Ok(member) => Ok(SyncOutcome::Added {
                pod: candidate.name.clone(),
                peer_url,
                member_id: member.id,
            }),
            Err(err) if err.is_already_exists() => {
                warn!(pod = %candidate.name, %peer_url, %err, "member was added concurrently");
                Ok(SyncOutcome::AlreadyMember {
                    pod: candidate.name.clone(),
                    peer_url,
                })
            }
            Err(source) => Err(ReconcileError::AddMember {
                pod: candidate.name.clone(),
                peer_url,
                source,
            }),
        }
    }
}
