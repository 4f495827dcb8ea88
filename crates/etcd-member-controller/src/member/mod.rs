//!
//! # etcd membership
//!
//! Members are owned by the etcd cluster; this crate only observes them and
//! asks the cluster to add new ones.
//!

mod etcd;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::MemberClientError;
use crate::pod::PodObservation;

pub use etcd::EtcdMemberClient;

/// Membership operations consumed from the consensus cluster
#[async_trait]
pub trait MemberClient: Send + Sync {
    async fn list_members(&self) -> Result<Vec<Member>, MemberClientError>;

    /// Add a voting member. Adding an address that is already registered
    /// must fail with [`MemberClientError::AlreadyExists`] and change nothing.
    async fn add_member(&self, peer_url: &str) -> Result<Member, MemberClientError>;
}

#[async_trait]
impl<T> MemberClient for Arc<T>
where
    T: MemberClient + ?Sized,
{
    async fn list_members(&self) -> Result<Vec<Member>, MemberClientError> {
        self.as_ref().list_members().await
    }

    async fn add_member(&self, peer_url: &str) -> Result<Member, MemberClientError> {
        self.as_ref().add_member(peer_url).await
    }
}

/// Cluster view of a participant
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Member {
    pub id: u64,
    /// empty until the member has started
    pub name: String,
    pub peer_urls: Vec<String>,
    pub client_urls: Vec<String>,
    pub is_learner: bool,
}

impl Member {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_peer_url(mut self, peer_url: impl Into<String>) -> Self {
        self.peer_urls.push(peer_url.into());
        self
    }

    pub fn is_started(&self) -> bool {
        !self.name.is_empty()
    }

    pub fn has_peer_url(&self, peer_url: &str) -> bool {
        self.peer_urls.iter().any(|url| url == peer_url)
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_started() {
            write!(f, "{}({:x})", self.name, self.id)
        } else {
            write!(f, "unstarted({:x})", self.id)
        }
    }
}

/// Which pod address etcd peers use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PeerAddressSource {
    /// host network pods, as deployed on control plane nodes
    #[default]
    HostIp,
    PodIp,
}

/// Derives the etcd peer url of a pod
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PeerEndpoint {
    pub scheme: String,
    pub port: u16,
    pub address: PeerAddressSource,
}

impl Default for PeerEndpoint {
    fn default() -> Self {
        Self {
            scheme: "https".to_owned(),
            port: 2380,
            address: PeerAddressSource::default(),
        }
    }
}

impl PeerEndpoint {
    /// peer url for the pod, `None` if the platform has not assigned the address yet
    pub fn peer_url(&self, pod: &PodObservation) -> Option<String> {
        let address = match self.address {
            PeerAddressSource::HostIp => pod.host_ip.as_deref(),
            PeerAddressSource::PodIp => pod.pod_ip.as_deref(),
        }?;

        // bracket ipv6 literals
        if address.contains(':') {
            Some(format!("{}://[{}]:{}", self.scheme, address, self.port))
        } else {
            Some(format!("{}://{}:{}", self.scheme, address, self.port))
        }
    }
}
