//!
//! # Candidate selection
//!
//! A pod is promoted only after it finished every init step and its etcd
//! container is serving, and only while no earlier join is still pending.
//! Checks run in a fixed order, the first failing check names the reason a
//! pod was skipped.
//!

use std::fmt;

use tracing::{debug, trace};

use crate::member::{Member, PeerEndpoint};
use crate::pod::{PodObservation, PodPhase, RunState};

/// Default name of the etcd container within a member pod
pub const DEFAULT_MEMBER_CONTAINER: &str = "etcd";

/// Why a pod is not a candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ineligible {
    /// a member was added but has not started yet
    JoinInProgress { member_id: u64 },
    AlreadyMember { member_id: u64 },
    NotRunning(PodPhase),
    InitStepPending(String),
    InitStepFailed { name: String, exit_code: i32 },
    MainStepMissing(String),
    MainStepNotRunning(RunState),
    MainStepNotReady,
    NoPeerAddress,
}

impl fmt::Display for Ineligible {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::JoinInProgress { member_id } => {
                write!(f, "member {member_id:x} has not started yet")
            }
            Self::AlreadyMember { member_id } => write!(f, "already a member ({member_id:x})"),
            Self::NotRunning(phase) => write!(f, "pod phase is {phase}"),
            Self::InitStepPending(name) => write!(f, "init container {name} has not terminated"),
            Self::InitStepFailed { name, exit_code } => {
                write!(f, "init container {name} exited with {exit_code}")
            }
            Self::MainStepMissing(name) => write!(f, "container {name} has no status"),
            Self::MainStepNotRunning(state) => write!(f, "container state is {state}"),
            Self::MainStepNotReady => write!(f, "container is running but not ready"),
            Self::NoPeerAddress => write!(f, "no address assigned to derive a peer url"),
        }
    }
}

/// Inputs shared by every check during one selection
pub struct Scope<'a> {
    pub members: &'a [Member],
    pub main_step: &'a str,
    pub peer: &'a PeerEndpoint,
}

type Check = fn(&PodObservation, &Scope) -> Result<(), Ineligible>;

/// ordered eligibility checks
pub const CHECKS: [(&str, Check); 6] = [
    ("no-join-in-progress", no_join_in_progress),
    ("not-a-member", not_a_member),
    ("phase-running", phase_running),
    ("init-steps-succeeded", init_steps_succeeded),
    ("main-step-serving", main_step_serving),
    ("has-peer-address", has_peer_address),
];

/// At most one join in flight: an added member reports no name until it started
pub fn no_join_in_progress(_pod: &PodObservation, scope: &Scope) -> Result<(), Ineligible> {
    match scope.members.iter().find(|member| !member.is_started()) {
        Some(member) => Err(Ineligible::JoinInProgress {
            member_id: member.id,
        }),
        None => Ok(()),
    }
}

/// Matches by name, and by peer url for members that were added but not started
pub fn not_a_member(pod: &PodObservation, scope: &Scope) -> Result<(), Ineligible> {
    let peer_url = scope.peer.peer_url(pod);
    let existing = scope.members.iter().find(|member| {
        (member.is_started() && member.name == pod.name)
            || peer_url
                .as_deref()
                .is_some_and(|peer_url| member.has_peer_url(peer_url))
    });

    match existing {
        Some(member) => Err(Ineligible::AlreadyMember {
            member_id: member.id,
        }),
        None => Ok(()),
    }
}

pub fn phase_running(pod: &PodObservation, _scope: &Scope) -> Result<(), Ineligible> {
    match pod.phase {
        PodPhase::Running => Ok(()),
        phase => Err(Ineligible::NotRunning(phase)),
    }
}

pub fn init_steps_succeeded(pod: &PodObservation, _scope: &Scope) -> Result<(), Ineligible> {
    for step in &pod.init_steps {
        match step.exit_code {
            Some(0) => {}
            Some(exit_code) => {
                return Err(Ineligible::InitStepFailed {
                    name: step.name.clone(),
                    exit_code,
                });
            }
            None => return Err(Ineligible::InitStepPending(step.name.clone())),
        }
    }
    Ok(())
}

pub fn main_step_serving(pod: &PodObservation, scope: &Scope) -> Result<(), Ineligible> {
    let step = pod
        .main_step(scope.main_step)
        .ok_or_else(|| Ineligible::MainStepMissing(scope.main_step.to_owned()))?;

    match &step.state {
        RunState::Running if step.ready => Ok(()),
        RunState::Running => Err(Ineligible::MainStepNotReady),
        state @ (RunState::Waiting { .. } | RunState::Terminated { .. } | RunState::Unset) => {
            Err(Ineligible::MainStepNotRunning(state.clone()))
        }
    }
}

pub fn has_peer_address(pod: &PodObservation, scope: &Scope) -> Result<(), Ineligible> {
    match scope.peer.peer_url(pod) {
        Some(_) => Ok(()),
        None => Err(Ineligible::NoPeerAddress),
    }
}

/// run every check in order, returning the first failure
pub fn evaluate(pod: &PodObservation, scope: &Scope) -> Result<(), Ineligible> {
    for (name, check) in CHECKS {
        if let Err(reason) = check(pod, scope) {
            trace!(pod = %pod.name, check = name, %reason, "check failed");
            return Err(reason);
        }
    }
    Ok(())
}

/// Pod selected for membership and the peer url it joins with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate<'a> {
    pub pod: &'a PodObservation,
    pub peer_url: String,
}

/// Picks the pod to add next
#[derive(Debug, Clone)]
pub struct CandidateSelector {
    main_step: String,
    peer: PeerEndpoint,
}

impl Default for CandidateSelector {
    fn default() -> Self {
        Self::new(DEFAULT_MEMBER_CONTAINER, PeerEndpoint::default())
    }
}

impl CandidateSelector {
    pub fn new(main_step: impl Into<String>, peer: PeerEndpoint) -> Self {
        Self {
            main_step: main_step.into(),
            peer,
        }
    }

    pub fn peer(&self) -> &PeerEndpoint {
        &self.peer
    }

    /// first eligible pod in listing order, `None` when nothing qualifies
    pub fn select_add_candidate<'a>(
        &self,
        observations: &'a [PodObservation],
        current_members: &[Member],
    ) -> Option<&'a PodObservation> {
        self.next_candidate(observations, current_members)
            .map(|candidate| candidate.pod)
    }

    /// like [`Self::select_add_candidate`], with the derived peer url
    pub fn next_candidate<'a>(
        &self,
        observations: &'a [PodObservation],
        current_members: &[Member],
    ) -> Option<Candidate<'a>> {
        let scope = Scope {
            members: current_members,
            main_step: &self.main_step,
            peer: &self.peer,
        };

        observations.iter().find_map(|pod| match evaluate(pod, &scope) {
            Ok(()) => {
                let peer_url = self.peer.peer_url(pod)?;
                Some(Candidate { pod, peer_url })
            }
            Err(reason) => {
                debug!(pod = %pod.name, %reason, "skipping pod");
                None
            }
        })
    }
}

/// selection with the default container name and peer endpoint
pub fn select_add_candidate<'a>(
    observations: &'a [PodObservation],
    current_members: &[Member],
) -> Option<&'a PodObservation> {
    CandidateSelector::default().select_add_candidate(observations, current_members)
}
