use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use tracing::{debug, instrument, trace};

use k8_client::SharedK8Client;
use k8_client::meta_client::{ListArg, MetadataClient};
use k8_types::{Crd, CrdNames, DefaultHeader, K8Obj, Spec, Status};

use crate::ObserveError;

use super::{
    InitStepResult, LabelSelector, MainStepStatus, PodObservation, PodObserver, PodPhase, RunState,
};

const POD_API: Crd = Crd {
    group: "core",
    version: "v1",
    names: CrdNames {
        kind: "Pod",
        plural: "pods",
        singular: "pod",
    },
};

/// Pod spec, reduced to the fields needed to decide membership
#[derive(Deserialize, Serialize, Debug, Default, Clone, Eq, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct MemberPodSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_name: Option<String>,
}

impl Spec for MemberPodSpec {
    type Status = MemberPodStatus;
    type Header = DefaultHeader;

    fn metadata() -> &'static Crd {
        &POD_API
    }
}

#[derive(Deserialize, Serialize, Debug, Default, Clone, Eq, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct MemberPodStatus {
    pub phase: Option<String>,
    #[serde(rename = "hostIP")]
    pub host_ip: Option<String>,
    #[serde(rename = "podIP")]
    pub pod_ip: Option<String>,
    pub init_container_statuses: Vec<K8ContainerStatus>,
    pub container_statuses: Vec<K8ContainerStatus>,
}

impl Status for MemberPodStatus {}

#[derive(Deserialize, Serialize, Debug, Default, Clone, Eq, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct K8ContainerStatus {
    pub name: String,
    pub ready: bool,
    pub state: Option<K8ContainerState>,
}

/// at most one of the fields is set by the kubelet
#[derive(Deserialize, Serialize, Debug, Default, Clone, Eq, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct K8ContainerState {
    pub waiting: Option<K8StateWaiting>,
    pub running: Option<K8StateRunning>,
    pub terminated: Option<K8StateTerminated>,
}

#[derive(Deserialize, Serialize, Debug, Default, Clone, Eq, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct K8StateWaiting {
    pub reason: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Default, Clone, Eq, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct K8StateRunning {
    pub started_at: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Default, Clone, Eq, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct K8StateTerminated {
    pub exit_code: i32,
    pub reason: Option<String>,
}

impl From<Option<K8ContainerState>> for RunState {
    fn from(state: Option<K8ContainerState>) -> Self {
        let Some(state) = state else {
            return RunState::Unset;
        };

        // terminated wins over running if the kubelet reports both mid-transition
        if let Some(terminated) = state.terminated {
            RunState::Terminated {
                exit_code: terminated.exit_code,
            }
        } else if state.running.is_some() {
            RunState::Running
        } else if let Some(waiting) = state.waiting {
            RunState::Waiting {
                reason: waiting.reason,
            }
        } else {
            RunState::Unset
        }
    }
}

impl From<K8ContainerStatus> for InitStepResult {
    fn from(status: K8ContainerStatus) -> Self {
        let exit_code = status
            .state
            .and_then(|state| state.terminated)
            .map(|terminated| terminated.exit_code);
        Self {
            name: status.name,
            exit_code,
        }
    }
}

impl From<K8ContainerStatus> for MainStepStatus {
    fn from(status: K8ContainerStatus) -> Self {
        Self {
            name: status.name,
            ready: status.ready,
            state: status.state.into(),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.is_empty())
}

impl PodObservation {
    pub fn from_k8(
        name: String,
        namespace: String,
        spec: MemberPodSpec,
        status: MemberPodStatus,
    ) -> Self {
        Self {
            name,
            namespace,
            node_name: non_empty(spec.node_name),
            phase: status
                .phase
                .as_deref()
                .map(PodPhase::from)
                .unwrap_or_default(),
            host_ip: non_empty(status.host_ip),
            pod_ip: non_empty(status.pod_ip),
            init_steps: status
                .init_container_statuses
                .into_iter()
                .map(InitStepResult::from)
                .collect(),
            main_steps: status
                .container_statuses
                .into_iter()
                .map(MainStepStatus::from)
                .collect(),
        }
    }
}

impl From<K8Obj<MemberPodSpec>> for PodObservation {
    fn from(k8_obj: K8Obj<MemberPodSpec>) -> Self {
        Self::from_k8(
            k8_obj.metadata.name,
            k8_obj.metadata.namespace,
            k8_obj.spec,
            k8_obj.status,
        )
    }
}

/// Observes etcd pods through the Kubernetes API
pub struct K8PodObserver {
    client: SharedK8Client,
    namespace: String,
}

impl K8PodObserver {
    pub fn new(client: SharedK8Client, namespace: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

#[async_trait]
impl PodObserver for K8PodObserver {
    #[instrument(skip(self), fields(namespace = %self.namespace))]
    async fn list(&self, selector: &LabelSelector) -> Result<Vec<PodObservation>, ObserveError> {
        let option = ListArg {
            label_selector: Some(selector.to_string()),
            ..Default::default()
        };

        let pods = self
            .client
            .retrieve_items_with_option::<MemberPodSpec, _>(self.namespace.as_str(), Some(option))
            .await?;

        debug!(count = pods.items.len(), "listed pods");
        trace!(?pods, "pod list");

        Ok(pods.items.into_iter().map(PodObservation::from).collect())
    }
}
