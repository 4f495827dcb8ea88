use std::io::{Error as IoError, ErrorKind};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};
use ureq::{Agent, AgentBuilder, ErrorKind as TransportKind, Transport};

use crate::MemberClientError;

use super::{Member, MemberClient};

const MEMBER_LIST_PATH: &str = "/v3/cluster/member/list";
const MEMBER_ADD_PATH: &str = "/v3/cluster/member/add";

/// Member client over the etcd v3 JSON gateway
#[derive(Clone)]
pub struct EtcdMemberClient {
    agent: Agent,
    endpoints: Arc<Vec<String>>,
}

impl EtcdMemberClient {
    pub fn new(endpoints: Vec<String>, timeout: Duration) -> Self {
        let agent = AgentBuilder::new().timeout(timeout).build();
        let endpoints = endpoints
            .into_iter()
            .map(|endpoint| endpoint.trim_end_matches('/').to_owned())
            .filter(|endpoint| !endpoint.is_empty())
            .collect();

        Self {
            agent,
            endpoints: Arc::new(endpoints),
        }
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    async fn call<T>(
        &self,
        path: &'static str,
        body: Value,
        failover: Failover,
    ) -> Result<T, MemberClientError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let agent = self.agent.clone();
        let endpoints = self.endpoints.clone();
        blocking::unblock(move || post(&agent, &endpoints, path, &body, failover)).await
    }
}

/// Transport failures that may move a request on to the next endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Failover {
    /// reads, any endpoint may serve them again
    AnyTransport,
    /// writes, only if the request never reached an endpoint
    ConnectOnly,
}

impl Failover {
    fn allows(self, transport: &Transport) -> bool {
        match self {
            Self::AnyTransport => true,
            Self::ConnectOnly => matches!(
                transport.kind(),
                TransportKind::Dns | TransportKind::ConnectionFailed
            ),
        }
    }
}

/// Tries endpoints in order until one answers. A cluster answer is final,
/// only transport failures allowed by `failover` move on to the next endpoint.
fn post<T>(
    agent: &Agent,
    endpoints: &[String],
    path: &str,
    body: &Value,
    failover: Failover,
) -> Result<T, MemberClientError>
where
    T: DeserializeOwned,
{
    let mut last_transport = None;
    for endpoint in endpoints {
        let url = format!("{endpoint}{path}");
        debug!(%url, "etcd request");
        match agent.post(&url).send_json(body) {
            Ok(response) => return Ok(response.into_json::<T>()?),
            Err(ureq::Error::Status(status, response)) => {
                let error = response.into_json::<GatewayError>().unwrap_or_default();
                return Err(error.classify(status));
            }
            Err(ureq::Error::Transport(transport)) if failover.allows(&transport) => {
                warn!(%url, %transport, "etcd endpoint unreachable");
                last_transport = Some(transport.to_string());
            }
            Err(ureq::Error::Transport(transport)) => {
                warn!(%url, %transport, "etcd request failed after it was sent");
                return Err(MemberClientError::Transport(transport.to_string()));
            }
        }
    }

    match last_transport {
        Some(transport) => Err(MemberClientError::Transport(transport)),
        None => Err(MemberClientError::NoEndpoints),
    }
}

#[async_trait]
impl MemberClient for EtcdMemberClient {
    #[instrument(skip(self))]
    async fn list_members(&self) -> Result<Vec<Member>, MemberClientError> {
        let response: MemberListResponse = self
            .call(MEMBER_LIST_PATH, json!({}), Failover::AnyTransport)
            .await?;
        let members: Vec<Member> = response.members.into_iter().map(Member::from).collect();
        debug!(count = members.len(), "listed etcd members");
        Ok(members)
    }

    #[instrument(skip(self))]
    async fn add_member(&self, peer_url: &str) -> Result<Member, MemberClientError> {
        let body = json!({
            "peerURLs": [peer_url],
            "isLearner": false,
        });
        let response: MemberAddResponse = self
            .call(MEMBER_ADD_PATH, body, Failover::ConnectOnly)
            .await?;
        let member = response.member.map(Member::from).ok_or_else(|| {
            IoError::new(ErrorKind::InvalidData, "member add response without member")
        })?;
        info!(%member, %peer_url, "etcd member added");
        Ok(member)
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct MemberListResponse {
    members: Vec<EtcdMember>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct MemberAddResponse {
    member: Option<EtcdMember>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default, rename_all = "camelCase")]
struct EtcdMember {
    /// uint64 ids are encoded as strings by the gateway
    #[serde(rename = "ID")]
    id: Option<Value>,
    name: String,
    #[serde(rename = "peerURLs")]
    peer_urls: Vec<String>,
    #[serde(rename = "clientURLs")]
    client_urls: Vec<String>,
    is_learner: bool,
}

impl From<EtcdMember> for Member {
    fn from(member: EtcdMember) -> Self {
        let id = match member.id {
            Some(Value::String(id)) => id.parse().unwrap_or_default(),
            Some(Value::Number(id)) => id.as_u64().unwrap_or_default(),
            _ => 0,
        };

        Self {
            id,
            name: member.name,
            peer_urls: member.peer_urls,
            client_urls: member.client_urls,
            is_learner: member.is_learner,
        }
    }
}

/// gateway error body, `{"error": .., "code": .., "message": ..}`
#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct GatewayError {
    code: i32,
    message: String,
    error: String,
}

impl GatewayError {
    fn classify(self, status: u16) -> MemberClientError {
        let message = if self.message.is_empty() {
            self.error
        } else {
            self.message
        };

        // etcdserver: Peer URLs already exists, etcdserver: member ID already exist
        if message.contains("already exist") {
            MemberClientError::AlreadyExists(message)
        } else {
            MemberClientError::Rejected {
                status,
                code: self.code,
                message,
            }
        }
    }
}
