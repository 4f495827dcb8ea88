use std::io::Error as IoError;

use anyhow::Error as AnyError;

/// Errors reported by a pod observer
#[derive(thiserror::Error, Debug)]
pub enum ObserveError {
    /// The orchestration platform could not list pods.
    #[error(transparent)]
    Platform(#[from] AnyError),
}

/// Errors reported by the etcd member client
#[derive(thiserror::Error, Debug)]
pub enum MemberClientError {
    /// The peer URL or member is already registered with the cluster.
    #[error("member already exists: {0}")]
    AlreadyExists(String),
    /// The cluster answered but refused the request.
    #[error("cluster rejected request with status {status} (code {code}): {message}")]
    Rejected {
        status: u16,
        code: i32,
        message: String,
    },
    /// No endpoint could be reached.
    #[error("etcd transport error: {0}")]
    Transport(String),
    #[error("unable to decode etcd response")]
    Decode(#[from] IoError),
    #[error("no etcd endpoints configured")]
    NoEndpoints,
}

impl MemberClientError {
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }
}

/// Errors returned by a single sync
#[derive(thiserror::Error, Debug)]
pub enum ReconcileError {
    #[error("failed to list cluster members")]
    ListMembers(#[source] MemberClientError),
    #[error("failed to observe pods")]
    Observe(#[from] ObserveError),
    #[error("failed to add pod {pod} as member at {peer_url}")]
    AddMember {
        pod: String,
        peer_url: String,
        #[source]
        source: MemberClientError,
    },
    #[error("sync cancelled")]
    Cancelled,
    #[error("sync deadline exceeded")]
    DeadlineExceeded,
}

/// Errors loading controller configuration
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("unable to read config file")]
    Io(#[from] IoError),
    #[error("invalid config file")]
    Parse(#[from] toml::de::Error),
    #[error("invalid label selector '{0}', expected key=value")]
    InvalidSelector(String),
}
