//! A single lifecycle phase and the container it runs in

use crate::buildpack::request::Binding;
use crate::orchestration::ContainerSpec;
use std::collections::BTreeMap;

const LIFECYCLE_DIR: &str = "/cnb/lifecycle";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phase {
    name: String,
    verbose_logging: bool,
    daemon_socket: Option<String>,
    args: Vec<String>,
    bindings: Vec<Binding>,
    env: BTreeMap<String, String>,
    network: Option<String>,
}

impl Phase {
    pub fn new(name: impl Into<String>, verbose_logging: bool) -> Self {
        Self {
            name: name.into(),
            verbose_logging,
            daemon_socket: None,
            args: Vec::new(),
            bindings: Vec::new(),
            env: BTreeMap::new(),
            network: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Run as root with the image daemon socket mounted
    pub fn with_daemon_access(&mut self, socket: &str) {
        self.daemon_socket = Some(socket.to_string());
    }

    /// `-log-level debug`, only when verbose logging was requested
    pub fn with_log_level_arg(&mut self) {
        if self.verbose_logging {
            self.args.push("-log-level".to_string());
            self.args.push("debug".to_string());
        }
    }

    pub fn with_args<I, S>(&mut self, args: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
    }

    pub fn with_binding(&mut self, binding: Binding) {
        self.bindings.push(binding);
    }

    pub fn with_env(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.env.insert(key.into(), value.into());
    }

    pub fn with_network_mode(&mut self, network: impl Into<String>) {
        self.network = Some(network.into());
    }

    /// Container spec running this phase on `builder_image`
    pub fn apply(&self, builder_image: &str) -> ContainerSpec {
        let mut spec = ContainerSpec {
            image: builder_image.to_string(),
            ..Default::default()
        };
        if let Some(socket) = &self.daemon_socket {
            spec.user = Some("root".to_string());
            spec.binds.push(Binding::from(socket, socket).to_string());
            // SELinux hosts refuse socket access from labelled containers
            spec.security_options.push("label=disable".to_string());
        }
        spec.command.push(format!("{}/{}", LIFECYCLE_DIR, self.name));
        spec.command.extend(self.args.iter().cloned());
        spec.labels.insert("author".to_string(), "osrc".to_string());
        spec.binds
            .extend(self.bindings.iter().map(Binding::to_string));
        spec.env = self.env.clone();
        spec.network = self.network.clone();
        spec
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_only_when_verbose() {
        let mut quiet = Phase::new("creator", false);
        quiet.with_log_level_arg();
        assert!(quiet.args().is_empty());

        let mut verbose = Phase::new("creator", true);
        verbose.with_log_level_arg();
        assert_eq!(verbose.args(), ["-log-level", "debug"]);
    }

    #[test]
    fn apply_builds_container_spec() {
        let mut phase = Phase::new("creator", false);
        phase.with_daemon_access("/var/run/docker.sock");
        phase.with_args(["-app", "/workspace"]);
        phase.with_binding(Binding::from("pack-app-x", "/workspace"));
        phase.with_env("CNB_PLATFORM_API", "0.8");
        phase.with_network_mode("host");

        let spec = phase.apply("pack.local/builder/x:latest");
        assert_eq!(spec.image, "pack.local/builder/x:latest");
        assert_eq!(spec.user.as_deref(), Some("root"));
        assert_eq!(
            spec.command,
            vec!["/cnb/lifecycle/creator", "-app", "/workspace"]
        );
        assert_eq!(
            spec.binds,
            vec![
                "/var/run/docker.sock:/var/run/docker.sock",
                "pack-app-x:/workspace"
            ]
        );
        assert_eq!(spec.env.get("CNB_PLATFORM_API").map(String::as_str), Some("0.8"));
        assert_eq!(spec.network.as_deref(), Some("host"));
        assert_eq!(spec.labels.get("author").map(String::as_str), Some("osrc"));
    }

    #[test]
    fn without_daemon_access_runs_as_image_user() {
        let spec = Phase::new("detector", false).apply("builder");
        assert!(spec.user.is_none());
        assert!(spec.binds.is_empty());
        assert!(spec.security_options.is_empty());
    }
}
