//!
//! # Pod observations
//!
//! Snapshot of the pods that may become etcd members, as seen by the
//! orchestration platform.
//!

mod k8;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::ConfigError;
use crate::ObserveError;

pub use k8::{K8PodObserver, MemberPodSpec, MemberPodStatus};

/// Read-only view over the pods matching a selector
#[async_trait]
pub trait PodObserver: Send + Sync {
    /// list pods in platform listing order
    async fn list(&self, selector: &LabelSelector) -> Result<Vec<PodObservation>, ObserveError>;
}

#[async_trait]
impl<T> PodObserver for Arc<T>
where
    T: PodObserver + ?Sized,
{
    async fn list(&self, selector: &LabelSelector) -> Result<Vec<PodObservation>, ObserveError> {
        self.as_ref().list(selector).await
    }
}

/// Label equality selector, `key=value`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LabelSelector {
    key: String,
    value: String,
}

impl LabelSelector {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl Default for LabelSelector {
    fn default() -> Self {
        Self::new("app", "etcd")
    }
}

impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

impl FromStr for LabelSelector {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() && !value.trim().is_empty() => {
                Ok(Self::new(key.trim(), value.trim()))
            }
            _ => Err(ConfigError::InvalidSelector(s.to_owned())),
        }
    }
}

impl TryFrom<String> for LabelSelector {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<LabelSelector> for String {
    fn from(selector: LabelSelector) -> Self {
        selector.to_string()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    #[default]
    Unknown,
}

impl From<&str> for PodPhase {
    fn from(phase: &str) -> Self {
        match phase {
            "Pending" => Self::Pending,
            "Running" => Self::Running,
            "Succeeded" => Self::Succeeded,
            "Failed" => Self::Failed,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for PodPhase {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let phase = match self {
            Self::Pending => "Pending",
            Self::Running => "Running",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
            Self::Unknown => "Unknown",
        };
        write!(f, "{phase}")
    }
}

/// Current state of a container.
/// `Unset` means the platform reported nothing, which is never treated as success.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RunState {
    Waiting { reason: Option<String> },
    Running,
    Terminated { exit_code: i32 },
    #[default]
    Unset,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Waiting {
                reason: Some(reason),
            } => write!(f, "Waiting({reason})"),
            Self::Waiting { reason: None } => write!(f, "Waiting"),
            Self::Running => write!(f, "Running"),
            Self::Terminated { exit_code } => write!(f, "Terminated({exit_code})"),
            Self::Unset => write!(f, "Unset"),
        }
    }
}

/// Result of an init container
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitStepResult {
    pub name: String,
    /// exit code once terminated
    pub exit_code: Option<i32>,
}

impl InitStepResult {
    pub fn terminated(name: impl Into<String>, exit_code: i32) -> Self {
        Self {
            name: name.into(),
            exit_code: Some(exit_code),
        }
    }

    pub fn pending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            exit_code: None,
        }
    }
}

/// Status of a main container
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MainStepStatus {
    pub name: String,
    pub ready: bool,
    pub state: RunState,
}

impl MainStepStatus {
    pub fn new(name: impl Into<String>, ready: bool, state: RunState) -> Self {
        Self {
            name: name.into(),
            ready,
            state,
        }
    }
}

/// Immutable snapshot of a pod
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PodObservation {
    pub name: String,
    pub namespace: String,
    pub node_name: Option<String>,
    pub phase: PodPhase,
    pub host_ip: Option<String>,
    pub pod_ip: Option<String>,
    pub init_steps: Vec<InitStepResult>,
    pub main_steps: Vec<MainStepStatus>,
}

impl PodObservation {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            ..Default::default()
        }
    }

    pub fn with_phase(mut self, phase: PodPhase) -> Self {
        self.phase = phase;
        self
    }

    pub fn with_node(mut self, node_name: impl Into<String>) -> Self {
        self.node_name = Some(node_name.into());
        self
    }

    pub fn with_host_ip(mut self, host_ip: impl Into<String>) -> Self {
        self.host_ip = Some(host_ip.into());
        self
    }

    pub fn with_pod_ip(mut self, pod_ip: impl Into<String>) -> Self {
        self.pod_ip = Some(pod_ip.into());
        self
    }

    pub fn with_init_step(mut self, step: InitStepResult) -> Self {
        self.init_steps.push(step);
        self
    }

    pub fn with_main_step(mut self, step: MainStepStatus) -> Self {
        self.main_steps.push(step);
        self
    }

    pub fn main_step(&self, name: &str) -> Option<&MainStepStatus> {
        self.main_steps.iter().find(|step| step.name == name)
    }
}

#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn test_selector_parse() {
        let selector: LabelSelector = "app=etcd".parse().expect("parse");
        assert_eq!(selector, LabelSelector::new("app", "etcd"));
        assert_eq!(selector.to_string(), "app=etcd");

        let selector: LabelSelector = " role = member-candidate ".parse().expect("parse");
        assert_eq!(selector.key(), "role");
        assert_eq!(selector.value(), "member-candidate");

        assert!("app".parse::<LabelSelector>().is_err());
        assert!("=etcd".parse::<LabelSelector>().is_err());
        assert!("app=".parse::<LabelSelector>().is_err());
    }

    #[test]
    fn test_phase_from_platform_string() {
        assert_eq!(PodPhase::from("Running"), PodPhase::Running);
        assert_eq!(PodPhase::from("Pending"), PodPhase::Pending);
        assert_eq!(PodPhase::from(""), PodPhase::Unknown);
        assert_eq!(PodPhase::from("running"), PodPhase::Unknown);
    }

    #[test]
    fn test_main_step_lookup() {
        let pod = PodObservation::new("etcd-a", "etcd")
            .with_main_step(MainStepStatus::new("sidecar", true, RunState::Running))
            .with_main_step(MainStepStatus::new("etcd", false, RunState::Unset));

        let step = pod.main_step("etcd").expect("etcd step");
        assert!(!step.ready);
        assert!(pod.main_step("missing").is_none());
    }
}
