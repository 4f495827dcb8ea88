//!
//! # CLI for the member controller
//!
//! Command line options override the config file, which overrides defaults.
//!

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::debug;

use crate::ConfigError;
use crate::config::ControllerConfig;
use crate::pod::LabelSelector;

/// cli options
#[derive(Debug, Parser)]
#[command(
    name = "etcd-member-controller",
    about = "Adds ready etcd pods to the etcd cluster, one at a time"
)]
pub struct ControllerOpt {
    /// path to a toml config file
    #[arg(long, value_name = "path", env = "ETCD_MEMBER_CONTROLLER_CONFIG")]
    config: Option<PathBuf>,

    /// k8 namespace of the etcd pods
    #[arg(short = 'n', long = "namespace", value_name = "namespace")]
    namespace: Option<String>,

    /// label selector of the etcd pods
    #[arg(long, value_name = "key=value")]
    selector: Option<LabelSelector>,

    /// name of the etcd container in the pods
    #[arg(long, value_name = "name")]
    member_container: Option<String>,

    /// etcd client endpoint, may be repeated
    #[arg(long = "etcd-endpoint", value_name = "url")]
    etcd_endpoints: Vec<String>,

    /// time between syncs, e.g. 30s
    #[arg(long, value_name = "duration", value_parser = humantime::parse_duration)]
    resync_interval: Option<Duration>,

    /// run a single sync and exit
    #[arg(long)]
    once: bool,
}

impl ControllerOpt {
    pub fn once(&self) -> bool {
        self.once
    }

    #[allow(clippy::wrong_self_convention)]
    pub fn as_config(self) -> Result<ControllerConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => {
                debug!(path = %path.display(), "loading config file");
                ControllerConfig::from_file(path)?
            }
            None => ControllerConfig::default(),
        };

        if let Some(namespace) = self.namespace {
            config.namespace = namespace;
        }

        if let Some(selector) = self.selector {
            config.selector = selector;
        }

        if let Some(member_container) = self.member_container {
            config.member_container = member_container;
        }

        if !self.etcd_endpoints.is_empty() {
            config.etcd_endpoints = self.etcd_endpoints;
        }

        if let Some(resync_interval) = self.resync_interval {
            config.resync_interval = resync_interval;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod test {

    use std::io::Write;

    use super::*;

    #[test]
    fn test_defaults() {
        let opt = ControllerOpt::try_parse_from(["etcd-member-controller"]).expect("parse");
        assert!(!opt.once());
        let config = opt.as_config().expect("config");
        assert_eq!(config, ControllerConfig::default());
    }

    #[test]
    fn test_cli_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"
namespace = "from-file"
member-container = "etcd-member"
resync-interval = "5m"
"#
        )
        .expect("written");
        let path = file.path().display().to_string();

        let opt = ControllerOpt::try_parse_from([
            "etcd-member-controller",
            "--config",
            path.as_str(),
            "-n",
            "openshift-etcd",
            "--selector",
            "role=member-candidate",
            "--etcd-endpoint",
            "https://10.0.0.1:2379",
            "--etcd-endpoint",
            "https://10.0.0.2:2379",
            "--resync-interval",
            "15s",
            "--once",
        ])
        .expect("parse");
        assert!(opt.once());

        let config = opt.as_config().expect("config");
        assert_eq!(config.namespace, "openshift-etcd");
        assert_eq!(config.member_container, "etcd-member");
        assert_eq!(config.selector, LabelSelector::new("role", "member-candidate"));
        assert_eq!(
            config.etcd_endpoints,
            vec!["https://10.0.0.1:2379", "https://10.0.0.2:2379"]
        );
        assert_eq!(config.resync_interval, Duration::from_secs(15));
    }

    #[test]
    fn test_invalid_selector_rejected() {
        assert!(
            ControllerOpt::try_parse_from(["etcd-member-controller", "--selector", "etcd"])
                .is_err()
        );
    }
}
