//!
//! # Controller configuration
//!
//! Parameters are resolved in the following sequence:
//!     1) default values
//!     2) config file, if provided
//!     3) cli parameters
//!

use std::fs::read_to_string;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ConfigError;
use crate::controller::{CandidateSelector, DEFAULT_MEMBER_CONTAINER};
use crate::member::PeerEndpoint;
use crate::pod::LabelSelector;

pub const DEFAULT_NAMESPACE: &str = "etcd";
pub const DEFAULT_ETCD_ENDPOINT: &str = "http://127.0.0.1:2379";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ControllerConfig {
    pub namespace: String,
    pub selector: LabelSelector,
    /// name of the etcd container in member pods
    pub member_container: String,
    pub peer: PeerEndpoint,
    pub etcd_endpoints: Vec<String>,
    #[serde(with = "humantime_serde")]
    pub resync_interval: Duration,
    /// wait after a failed sync
    #[serde(with = "humantime_serde")]
    pub error_backoff: Duration,
    #[serde(with = "humantime_serde")]
    pub sync_timeout: Duration,
    /// timeout of a single etcd request
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_owned(),
            selector: LabelSelector::default(),
            member_container: DEFAULT_MEMBER_CONTAINER.to_owned(),
            peer: PeerEndpoint::default(),
            etcd_endpoints: vec![DEFAULT_ETCD_ENDPOINT.to_owned()],
            resync_interval: Duration::from_secs(60),
            error_backoff: Duration::from_secs(10),
            sync_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(5),
        }
    }
}

impl ControllerConfig {
    pub fn from_file<T: AsRef<Path>>(path: T) -> Result<Self, ConfigError> {
        let file_str = read_to_string(path)?;
        Ok(toml::from_str(&file_str)?)
    }

    pub fn candidate_selector(&self) -> CandidateSelector {
        CandidateSelector::new(self.member_container.clone(), self.peer.clone())
    }
}

#[cfg(test)]
mod test {

    use std::io::Write;

    use crate::member::PeerAddressSource;

    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: ControllerConfig = toml::from_str(
            r#"
            namespace = "openshift-etcd"
            selector = "app=etcd"
            resync-interval = "30s"
            "#,
        )
        .expect("parse");

        assert_eq!(config.namespace, "openshift-etcd");
        assert_eq!(config.resync_interval, Duration::from_secs(30));
        assert_eq!(config.member_container, "etcd");
        assert_eq!(config.etcd_endpoints, vec![DEFAULT_ETCD_ENDPOINT]);
        assert_eq!(config.peer, PeerEndpoint::default());
    }

    #[test]
    fn test_full_config_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"
namespace = "kube-system"
selector = "role=member-candidate"
member-container = "etcd-member"
etcd-endpoints = ["https://10.0.0.1:2379", "https://10.0.0.2:2379"]
resync-interval = "2m"
error-backoff = "5s"
sync-timeout = "45s"
request-timeout = "3s"

[peer]
scheme = "http"
port = 12380
address = "pod-ip"
"#
        )
        .expect("written");

        let config = ControllerConfig::from_file(file.path()).expect("loaded");
        assert_eq!(config.selector, LabelSelector::new("role", "member-candidate"));
        assert_eq!(config.member_container, "etcd-member");
        assert_eq!(config.etcd_endpoints.len(), 2);
        assert_eq!(config.resync_interval, Duration::from_secs(120));
        assert_eq!(config.error_backoff, Duration::from_secs(5));
        assert_eq!(config.sync_timeout, Duration::from_secs(45));
        assert_eq!(config.request_timeout, Duration::from_secs(3));
        assert_eq!(config.peer.scheme, "http");
        assert_eq!(config.peer.port, 12380);
        assert_eq!(config.peer.address, PeerAddressSource::PodIp);
    }

    #[test]
    fn test_invalid_config() {
        assert!(toml::from_str::<ControllerConfig>(r#"selector = "app""#).is_err());
        assert!(toml::from_str::<ControllerConfig>(r#"resync-interval = "soon""#).is_err());
        assert!(matches!(
            ControllerConfig::from_file("/nonexistent/controller.toml"),
            Err(ConfigError::Io(_))
        ));
    }
}
