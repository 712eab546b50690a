//! Node Configuration
//!
//! Defaults for the membership and restart protocols plus the command line
//! parsing used by the binary.

use anyhow::Result;
use std::net::SocketAddr;
use std::time::Duration;

/// Delay between a view change and the local name announce it triggers.
pub const ANNOUNCE_DELAY: Duration = Duration::from_millis(2000);

/// Upper bound a restart waits for the previous generation's teardown.
pub const RESTART_WAIT: Duration = Duration::from_millis(5000);

pub const DEFAULT_GROUP: &str = "cluster-switch";
pub const DEFAULT_HTTP_ADDR: &str = "127.0.0.1:7000";

/// How the generation coordinator treats a previous token that never fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartPolicy {
    /// Bounded wait for the previous generation's removal signal.
    pub wait: Duration,
    /// When set, an elapsed wait fails the restart instead of proceeding.
    pub strict: bool,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            wait: RESTART_WAIT,
            strict: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClusterConfig {
    pub node_name: String,
    pub group: String,
    pub http_addr: SocketAddr,
    pub announce_delay: Duration,
    pub restart: RestartPolicy,
    /// Simulated peers joined to the local group hub at startup.
    pub peers: Vec<String>,
    pub verbose: bool,
}

impl ClusterConfig {
    /// Builds a config from `std::env::args()`-style arguments (program name first).
    pub fn from_args(args: &[String]) -> Result<Self> {
        let mut config = Self::default();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--name" => {
                    config.node_name = value(args, i)?.to_string();
                    i += 2;
                }
                "--group" => {
                    config.group = value(args, i)?.to_string();
                    i += 2;
                }
                "--http" => {
                    config.http_addr = value(args, i)?.parse()?;
                    i += 2;
                }
                "--announce-delay-ms" => {
                    config.announce_delay = Duration::from_millis(value(args, i)?.parse()?);
                    i += 2;
                }
                "--restart-wait-ms" => {
                    config.restart.wait = Duration::from_millis(value(args, i)?.parse()?);
                    i += 2;
                }
                "--peer" => {
                    config.peers.push(value(args, i)?.to_string());
                    i += 2;
                }
                "--strict-restart" => {
                    config.restart.strict = true;
                    i += 1;
                }
                "--verbose" => {
                    config.verbose = true;
                    i += 1;
                }
                other => {
                    tracing::warn!("Ignoring unknown argument: {}", other);
                    i += 1;
                }
            }
        }

        if config.node_name.trim().is_empty() {
            anyhow::bail!("--name must not be empty");
        }

        Ok(config)
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            node_name: default_node_name(),
            group: DEFAULT_GROUP.to_string(),
            http_addr: SocketAddr::from(([127, 0, 0, 1], 7000)),
            announce_delay: ANNOUNCE_DELAY,
            restart: RestartPolicy::default(),
            peers: Vec::new(),
            verbose: false,
        }
    }
}

fn value(args: &[String], i: usize) -> Result<&str> {
    args.get(i + 1)
        .map(String::as_str)
        .ok_or_else(|| anyhow::anyhow!("{} requires a value", args[i]))
}

/// Hostname when available, otherwise a generated `node-xxxxxxxx`.
fn default_node_name() -> String {
    match std::env::var("HOSTNAME") {
        Ok(host) if !host.trim().is_empty() => host,
        _ => {
            let id = uuid::Uuid::new_v4().simple().to_string();
            format!("node-{}", &id[..8])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("cluster-switch")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_defaults_match_protocol_constants() {
        let config = ClusterConfig::from_args(&args(&[])).unwrap();

        assert_eq!(config.announce_delay, Duration::from_millis(2000));
        assert_eq!(config.restart.wait, Duration::from_millis(5000));
        assert!(!config.restart.strict);
        assert_eq!(config.group, DEFAULT_GROUP);
        assert_eq!(config.http_addr, DEFAULT_HTTP_ADDR.parse().unwrap());
        assert!(!config.node_name.is_empty());
    }

    #[test]
    fn test_parses_all_flags() {
        let config = ClusterConfig::from_args(&args(&[
            "--name",
            "node-a",
            "--group",
            "materialize",
            "--http",
            "127.0.0.1:7100",
            "--announce-delay-ms",
            "250",
            "--restart-wait-ms",
            "1500",
            "--peer",
            "node-b",
            "--peer",
            "node-c",
            "--strict-restart",
            "--verbose",
        ]))
        .unwrap();

        assert_eq!(config.node_name, "node-a");
        assert_eq!(config.group, "materialize");
        assert_eq!(config.http_addr.port(), 7100);
        assert_eq!(config.announce_delay, Duration::from_millis(250));
        assert_eq!(config.restart.wait, Duration::from_millis(1500));
        assert!(config.restart.strict);
        assert!(config.verbose);
        assert_eq!(config.peers, vec!["node-b", "node-c"]);
    }

    #[test]
    fn test_missing_value_is_an_error() {
        let result = ClusterConfig::from_args(&args(&["--restart-wait-ms"]));

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("requires a value"));
    }

    #[test]
    fn test_bad_number_is_an_error() {
        assert!(ClusterConfig::from_args(&args(&["--announce-delay-ms", "soon"])).is_err());
    }

    #[test]
    fn test_empty_name_rejected() {
        assert!(ClusterConfig::from_args(&args(&["--name", "  "])).is_err());
    }
}
