//! Container CLI shim
//!
//! Thin wrapper around the `docker` command line used by the dashboard to
//! list, start and stop the robot's containers. Commands are spawned with an
//! argument vector; nothing goes through a shell.

use serde_json::Value;
use std::io::ErrorKind;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use crate::config::ContainerConfig;
use crate::error::{RelayError, Result};

/// Handle to the container CLI
#[derive(Debug, Clone)]
pub struct ContainerCli {
    binary: String,
}

impl ContainerCli {
    pub fn new(config: &ContainerConfig) -> Self {
        Self {
            binary: config.binary.clone(),
        }
    }

    /// Containers as reported by `ps`, one JSON object each
    #[instrument(skip(self))]
    pub async fn list(&self, all: bool) -> Result<Vec<Value>> {
        let mut args = vec!["ps"];
        if all {
            args.push("-a");
        }
        args.extend(["--format", "{{json .}}"]);

        let stdout = self.exec(&args).await?;
        let containers = parse_ps_output(&stdout);
        debug!(count = containers.len(), all, "Listed containers");
        Ok(containers)
    }

    #[instrument(skip(self))]
    pub async fn start(&self, id: &str) -> Result<String> {
        validate_container_id(id)?;
        let output = self.exec(&["start", id]).await?;
        info!(container = id, "Container started");
        Ok(output)
    }

    #[instrument(skip(self))]
    pub async fn stop(&self, id: &str) -> Result<String> {
        validate_container_id(id)?;
        let output = self.exec(&["stop", id]).await?;
        info!(container = id, "Container stopped");
        Ok(output)
    }

    /// Run the CLI and return its stdout
    async fn exec(&self, args: &[&str]) -> Result<String> {
        let output = Command::new(&self.binary)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound | ErrorKind::PermissionDenied => {
                    warn!(binary = %self.binary, "Container CLI not available: {}", e);
                    RelayError::ContainerRuntimeUnavailable
                }
                _ => RelayError::Io(e),
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if !output.status.success() {
            return Err(RelayError::ContainerCommand {
                command: format!("{} {}", self.binary, args.join(" ")),
                stderr,
            });
        }
        if !stderr.is_empty() {
            debug!(%stderr, "Container CLI wrote to stderr");
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Parse `ps --format '{{json .}}'` output, skipping lines that fail to parse
pub fn parse_ps_output(stdout: &str) -> Vec<Value> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| match serde_json::from_str::<Value>(line) {
            Ok(container) => Some(container),
            Err(e) => {
                warn!(line, "Skipping unparsable container line: {}", e);
                None
            }
        })
        .collect()
}

/// Accept names and ids made of `[A-Za-z0-9_.-]`, not starting with `-`
pub fn validate_container_id(id: &str) -> Result<()> {
    let valid = !id.is_empty()
        && !id.starts_with('-')
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));

    if valid {
        Ok(())
    } else {
        Err(RelayError::InvalidContainerId(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(binary: &str) -> ContainerCli {
        ContainerCli::new(&ContainerConfig {
            binary: binary.to_string(),
        })
    }

    #[test]
    fn test_parse_ps_output_skips_bad_lines() {
        let stdout = r#"{"ID":"a1b2","Names":"rosbridge","State":"running"}

not json
{"ID":"c3d4","Names":"camera","State":"exited"}
"#;
        let containers = parse_ps_output(stdout);
        assert_eq!(containers.len(), 2);
        assert_eq!(containers[0]["Names"], "rosbridge");
        assert_eq!(containers[1]["ID"], "c3d4");
    }

    #[test]
    fn test_parse_empty_output() {
        assert!(parse_ps_output("").is_empty());
        assert!(parse_ps_output("\n\n").is_empty());
    }

    #[test]
    fn test_validate_container_id() {
        assert!(validate_container_id("a1b2c3d4e5f6").is_ok());
        assert!(validate_container_id("ros_bridge-1.service").is_ok());

        assert!(validate_container_id("").is_err());
        assert!(validate_container_id("-rf").is_err());
        assert!(validate_container_id("abc; rm -rf /").is_err());
        assert!(validate_container_id("abc def").is_err());
        assert!(validate_container_id("$(whoami)").is_err());
    }

    #[tokio::test]
    async fn test_missing_binary_is_unavailable() {
        let result = cli("ros-relay-no-such-container-cli").list(false).await;
        assert!(matches!(result, Err(RelayError::ContainerRuntimeUnavailable)));
    }

    #[tokio::test]
    async fn test_invalid_id_rejected_before_spawn() {
        let result = cli("ros-relay-no-such-container-cli").stop("--all").await;
        assert!(matches!(result, Err(RelayError::InvalidContainerId(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit_is_command_error() {
        let result = cli("false").start("rosbridge").await;
        match result {
            Err(e @ RelayError::ContainerCommand { .. }) => assert!(e.is_server_error()),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
