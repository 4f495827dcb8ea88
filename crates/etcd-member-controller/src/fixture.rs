//!
//! # In-memory pod observer and member client
//!
//! Stand-ins for Kubernetes and etcd used by tests.
//!

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::anyhow;
use async_lock::RwLock;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use fluvio_future::timer::sleep;

use crate::member::{Member, MemberClient};
use crate::pod::{
    InitStepResult, LabelSelector, MainStepStatus, PodObservation, PodObserver, PodPhase, RunState,
};
use crate::{MemberClientError, ObserveError};

pub const TEST_NS: &str = "etcd";

/// running pod whose init containers succeeded and whose etcd container is ready
pub fn ready_pod(name: &str, host_ip: &str) -> PodObservation {
    PodObservation::new(name, TEST_NS)
        .with_phase(PodPhase::Running)
        .with_node(format!("node-{name}"))
        .with_host_ip(host_ip)
        .with_init_step(InitStepResult::terminated("etcd-ensure-env", 0))
        .with_init_step(InitStepResult::terminated("etcd-resources-copy", 0))
        .with_main_step(MainStepStatus::new("etcd", true, RunState::Running))
}

#[derive(Default)]
pub struct FakePodObserver {
    pods: RwLock<Vec<PodObservation>>,
    failure: RwLock<Option<String>>,
    delay: RwLock<Option<Duration>>,
    last_selector: RwLock<Option<LabelSelector>>,
    list_calls: AtomicUsize,
}

impl FakePodObserver {
    pub fn new(pods: Vec<PodObservation>) -> Self {
        Self {
            pods: RwLock::new(pods),
            ..Default::default()
        }
    }

    pub async fn set_pods(&self, pods: Vec<PodObservation>) {
        *self.pods.write().await = pods;
    }

    pub async fn fail(&self, message: &str) {
        *self.failure.write().await = Some(message.to_owned());
    }

    pub async fn delay(&self, delay: Duration) {
        *self.delay.write().await = Some(delay);
    }

    pub async fn last_selector(&self) -> Option<LabelSelector> {
        self.last_selector.read().await.clone()
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PodObserver for FakePodObserver {
    async fn list(&self, selector: &LabelSelector) -> Result<Vec<PodObservation>, ObserveError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_selector.write().await = Some(selector.clone());

        let delay = *self.delay.read().await;
        if let Some(delay) = delay {
            sleep(delay).await;
        }

        if let Some(message) = self.failure.read().await.as_ref() {
            return Err(anyhow!("{message}").into());
        }

        Ok(self.pods.read().await.clone())
    }
}

/// Member client behaving like etcd: added members start unnamed and
/// re-adding a known peer url is rejected.
pub struct FakeMemberClient {
    members: RwLock<Vec<Member>>,
    next_id: AtomicU64,
    list_failure: RwLock<Option<String>>,
    add_failure: RwLock<Option<String>>,
    add_delay: RwLock<Option<Duration>>,
    race_add: AtomicBool,
    cancel_on_list: RwLock<Option<CancellationToken>>,
    list_calls: AtomicUsize,
    add_calls: AtomicUsize,
    added: RwLock<Vec<String>>,
}

impl FakeMemberClient {
    pub fn new(members: Vec<Member>) -> Self {
        let next_id = members.iter().map(|member| member.id).max().unwrap_or(0) + 1;
        Self {
            members: RwLock::new(members),
            next_id: AtomicU64::new(next_id),
            list_failure: RwLock::new(None),
            add_failure: RwLock::new(None),
            add_delay: RwLock::new(None),
            race_add: AtomicBool::new(false),
            cancel_on_list: RwLock::new(None),
            list_calls: AtomicUsize::new(0),
            add_calls: AtomicUsize::new(0),
            added: RwLock::new(vec![]),
        }
    }

    pub async fn fail_list(&self, message: &str) {
        *self.list_failure.write().await = Some(message.to_owned());
    }

    pub async fn fail_add(&self, message: &str) {
        *self.add_failure.write().await = Some(message.to_owned());
    }

    /// add requests take `delay` before reaching the cluster
    pub async fn delay_add(&self, delay: Duration) {
        *self.add_delay.write().await = Some(delay);
    }

    /// another actor adds the same peer right before our add lands
    pub fn race_add(&self) {
        self.race_add.store(true, Ordering::SeqCst);
    }

    /// cancel `token` once the member list has been served
    pub async fn cancel_on_list(&self, token: CancellationToken) {
        *self.cancel_on_list.write().await = Some(token);
    }

    pub async fn members(&self) -> Vec<Member> {
        self.members.read().await.clone()
    }

    /// simulate a member starting, which sets its name
    pub async fn start_member(&self, peer_url: &str, name: &str) {
        let mut members = self.members.write().await;
        if let Some(member) = members.iter_mut().find(|member| member.has_peer_url(peer_url)) {
            member.name = name.to_owned();
        }
    }

    pub async fn added_peer_urls(&self) -> Vec<String> {
        self.added.read().await.clone()
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn add_calls(&self) -> usize {
        self.add_calls.load(Ordering::SeqCst)
    }

    async fn insert(&self, peer_url: &str) -> Result<Member, MemberClientError> {
        let mut members = self.members.write().await;
        if members.iter().any(|member| member.has_peer_url(peer_url)) {
            return Err(MemberClientError::AlreadyExists(
                "etcdserver: Peer URLs already exists".to_owned(),
            ));
        }

        let member = Member::new(self.next_id.fetch_add(1, Ordering::SeqCst), "")
            .with_peer_url(peer_url);
        members.push(member.clone());
        Ok(member)
    }
}

#[async_trait]
impl MemberClient for FakeMemberClient {
    async fn list_members(&self) -> Result<Vec<Member>, MemberClientError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = self.list_failure.read().await.as_ref() {
            return Err(MemberClientError::Transport(message.clone()));
        }

        let members = self.members.read().await.clone();

        if let Some(token) = self.cancel_on_list.read().await.as_ref() {
            token.cancel();
        }

        Ok(members)
    }

    async fn add_member(&self, peer_url: &str) -> Result<Member, MemberClientError> {
        self.add_calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.add_delay.read().await;
        if let Some(delay) = delay {
            sleep(delay).await;
        }

        if let Some(message) = self.add_failure.read().await.as_ref() {
            return Err(MemberClientError::Rejected {
                status: 503,
                code: 14,
                message: message.clone(),
            });
        }

        if self.race_add.swap(false, Ordering::SeqCst) {
            self.insert(peer_url).await?;
        }

        let member = self.insert(peer_url).await?;
        self.added.write().await.push(peer_url.to_owned());
        Ok(member)
    }
}
