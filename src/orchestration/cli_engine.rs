//! Container engine driven through the podman or docker CLI

use crate::error::{OsrcError, OsrcResult};
use crate::orchestration::engine::{ContainerContent, ContainerEngine, ContainerSpec, ImageConfig};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

/// Which CLI the engine drives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    Podman,
    Docker,
}

impl EngineKind {
    pub fn binary(&self) -> &'static str {
        match self {
            EngineKind::Podman => "podman",
            EngineKind::Docker => "docker",
        }
    }
}

/// Container engine using a local engine CLI
pub struct CliEngine {
    kind: EngineKind,
}

impl CliEngine {
    pub fn new(kind: EngineKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> EngineKind {
        self.kind
    }

    /// Check if the engine binary is installed
    pub async fn installed(kind: EngineKind) -> bool {
        Command::new(kind.binary())
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn command_name(&self, args: &[&str]) -> String {
        format!("{} {}", self.kind.binary(), args.first().copied().unwrap_or(""))
    }

    /// Execute an engine command and return the output
    async fn exec(&self, args: &[&str]) -> OsrcResult<std::process::Output> {
        debug!("Executing: {} {:?}", self.kind.binary(), args);

        Command::new(self.kind.binary())
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| OsrcError::command_failed(self.command_name(args), e))
    }

    /// Execute an engine command feeding `input` on stdin
    async fn exec_with_input(&self, args: &[&str], input: &[u8]) -> OsrcResult<std::process::Output> {
        debug!("Executing with input: {} {:?}", self.kind.binary(), args);

        let mut child = Command::new(self.kind.binary())
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| OsrcError::command_failed(self.command_name(args), e))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(input)
                .await
                .map_err(|e| OsrcError::io(format!("writing to {}", self.command_name(args)), e))?;
        }

        child
            .wait_with_output()
            .await
            .map_err(|e| OsrcError::command_failed(self.command_name(args), e))
    }

    /// Run a command whose only failure mode of interest is a non-zero exit
    async fn exec_checked(&self, args: &[&str]) -> OsrcResult<String> {
        let output = self.exec(args).await?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(OsrcError::command_exec(self.command_name(args), stderr))
        }
    }

    /// Like `exec_checked`, treating stderr matching `missing` as success
    async fn exec_ignoring(&self, args: &[&str], missing: &[&str]) -> OsrcResult<()> {
        let output = self.exec(args).await?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        let lower = stderr.to_lowercase();
        if missing.iter().any(|m| lower.contains(m)) {
            debug!("Ignoring missing object for {}", self.command_name(args));
            Ok(())
        } else {
            Err(OsrcError::command_exec(self.command_name(args), stderr))
        }
    }
}

/// Flags for `create` derived from a container spec
pub(crate) fn create_args(spec: &ContainerSpec) -> Vec<String> {
    let mut args = vec!["create".to_string()];

    if let Some(user) = &spec.user {
        args.push("--user".to_string());
        args.push(user.clone());
    }

    for (k, v) in &spec.env {
        args.push("-e".to_string());
        args.push(format!("{}={}", k, v));
    }

    for bind in &spec.binds {
        args.push("-v".to_string());
        args.push(bind.clone());
    }

    if let Some(network) = &spec.network {
        args.push("--network".to_string());
        args.push(network.clone());
    }

    for (k, v) in &spec.labels {
        args.push("--label".to_string());
        args.push(format!("{}={}", k, v));
    }

    for option in &spec.security_options {
        args.push("--security-opt".to_string());
        args.push(option.clone());
    }

    if let Some((entrypoint, rest)) = spec.command.split_first() {
        args.push("--entrypoint".to_string());
        args.push(entrypoint.clone());
        args.push(spec.image.clone());
        args.extend(rest.iter().cloned());
    } else {
        args.push(spec.image.clone());
    }

    args
}

#[async_trait]
impl ContainerEngine for CliEngine {
    async fn is_available(&self) -> OsrcResult<bool> {
        if !Self::installed(self.kind).await {
            return Ok(false);
        }
        let output = self.exec(&["info"]).await?;
        Ok(output.status.success())
    }

    async fn image_exists(&self, image: &str) -> OsrcResult<bool> {
        let output = self
            .exec(&["image", "inspect", "--format", "{{.Id}}", image])
            .await?;
        Ok(output.status.success())
    }

    async fn pull(&self, image: &str) -> OsrcResult<()> {
        info!("Pulling image: {}", image);

        let output = self.exec(&["pull", image]).await?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(OsrcError::ImagePull {
                image: image.to_string(),
                reason: stderr.trim().to_string(),
            })
        }
    }

    async fn inspect_image(&self, image: &str) -> OsrcResult<ImageConfig> {
        let json = self
            .exec_checked(&["image", "inspect", "--format", "{{json .Config}}", image])
            .await?;
        Ok(serde_json::from_str(&json)?)
    }

    async fn build_image(&self, context: &Path, tag: &str) -> OsrcResult<()> {
        let context_str = context.display().to_string();
        let output = self.exec(&["build", "-t", tag, &context_str]).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            return Err(OsrcError::ImageBuild {
                tag: tag.to_string(),
                reason: super::build_error_output(&stdout, &stderr),
            });
        }

        debug!("Built image {}", tag);
        Ok(())
    }

    async fn remove_image(&self, image: &str) -> OsrcResult<()> {
        self.exec_ignoring(&["rmi", "-f", image], &["image not known", "no such image"])
            .await
    }

    async fn create(
        &self,
        spec: &ContainerSpec,
        content: &[ContainerContent],
    ) -> OsrcResult<String> {
        let args = create_args(spec);
        let args_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = self.exec(&args_refs).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OsrcError::ContainerCreate(stderr.trim().to_string()));
        }

        let container_id = String::from_utf8_lossy(&output.stdout).trim().to_string();
        debug!(
            "Container created: {}",
            &container_id[..12.min(container_id.len())]
        );

        for item in content {
            let target = format!("{}:{}", container_id, item.destination);
            let output = self
                .exec_with_input(&["cp", "-", &target], &item.archive)
                .await?;
            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                // Best effort, the copy failure is what gets reported
                let _ = self.remove(&container_id).await;
                return Err(OsrcError::command_exec(
                    format!("{} cp", self.kind.binary()),
                    stderr,
                ));
            }
        }

        Ok(container_id)
    }

    async fn start(&self, container_id: &str) -> OsrcResult<()> {
        let output = self.exec(&["start", container_id]).await?;
        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(OsrcError::ContainerStart(stderr.trim().to_string()))
        }
    }

    async fn logs(
        &self,
        container_id: &str,
        on_line: &(dyn Fn(String) + Send + Sync),
    ) -> OsrcResult<()> {
        let mut child = Command::new(self.kind.binary())
            .args(["logs", "-f", container_id])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| OsrcError::command_failed(format!("{} logs", self.kind.binary()), e))?;

        super::stream_child_output(&mut child, on_line).await;

        child
            .wait()
            .await
            .map_err(|e| OsrcError::command_failed(format!("{} logs", self.kind.binary()), e))?;
        Ok(())
    }

    async fn wait(&self, container_id: &str) -> OsrcResult<i64> {
        let stdout = self.exec_checked(&["wait", container_id]).await?;
        // docker prints one status per line, podman may prefix a blank line
        stdout
            .lines()
            .rev()
            .find(|line| !line.trim().is_empty())
            .and_then(|line| line.trim().parse::<i64>().ok())
            .ok_or_else(|| {
                OsrcError::command_exec(
                    format!("{} wait", self.kind.binary()),
                    format!("unexpected output: {}", stdout),
                )
            })
    }

    async fn remove(&self, container_id: &str) -> OsrcResult<()> {
        debug!("Removing container: {}", container_id);
        self.exec_ignoring(&["rm", "-f", container_id], &["no such container"])
            .await
    }

    async fn delete_volume(&self, name: &str) -> OsrcResult<()> {
        debug!("Removing volume: {}", name);
        self.exec_ignoring(&["volume", "rm", "-f", name], &["no such volume"])
            .await
    }

    fn engine_name(&self) -> &'static str {
        match self.kind {
            EngineKind::Podman => "Podman",
            EngineKind::Docker => "Docker",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn engine_kind_binary() {
        assert_eq!(EngineKind::Podman.binary(), "podman");
        assert_eq!(EngineKind::Docker.binary(), "docker");
        assert_eq!(CliEngine::new(EngineKind::Docker).engine_name(), "Docker");
    }

    #[test]
    fn create_args_place_entrypoint_before_image() {
        let mut env = BTreeMap::new();
        env.insert("CNB_PLATFORM_API".to_string(), "0.8".to_string());
        let spec = ContainerSpec {
            image: "builder:1".to_string(),
            command: vec![
                "/cnb/lifecycle/creator".to_string(),
                "-app".to_string(),
                "/workspace".to_string(),
            ],
            user: Some("root".to_string()),
            env,
            binds: vec!["pack-app-x:/workspace".to_string()],
            network: Some("host".to_string()),
            ..Default::default()
        };
        let args = create_args(&spec);
        assert_eq!(
            args,
            vec![
                "create",
                "--user",
                "root",
                "-e",
                "CNB_PLATFORM_API=0.8",
                "-v",
                "pack-app-x:/workspace",
                "--network",
                "host",
                "--entrypoint",
                "/cnb/lifecycle/creator",
                "builder:1",
                "-app",
                "/workspace"
            ]
        );
    }

    #[test]
    fn create_args_without_command() {
        let spec = ContainerSpec {
            image: "busybox".to_string(),
            ..Default::default()
        };
        assert_eq!(create_args(&spec), vec!["create", "busybox"]);
    }
}
