//! Server configuration, assembled from CLI flags with environment-variable fallbacks via
//! `clap`'s `env` feature, mirroring how the executor CLI this service replaces took its flags.

use clap::Parser;

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_parallelism() -> u32 {
    3
}

#[derive(Parser, Debug, Clone)]
#[command(name = "jobq-server", about = "Submits and tracks Kueue-managed batch workloads.")]
pub struct ServerConfig {
    /// Address the HTTP server binds to.
    #[arg(long, env = "JOBQ_BIND_ADDR", default_value_t = default_bind_addr())]
    pub bind_addr: String,

    /// Namespace override. Falls back to in-cluster/kubeconfig discovery if unset.
    #[arg(long, env = "JOBQ_NAMESPACE")]
    pub namespace: Option<String>,

    /// Default `spec.parallelism` for plain-Job submissions. The source hard-codes 3; kept
    /// configurable here but reproduced as the default per the spec's guidance.
    #[arg(long, env = "JOBQ_DEFAULT_PARALLELISM", default_value_t = default_parallelism())]
    pub default_parallelism: u32,

    /// Ray version stamped into RayJob manifests. Falls back to `RAY_VERSION` if unset.
    #[arg(long, env = "JOBQ_RAY_VERSION")]
    pub ray_version: Option<String>,

    /// Log level passed through to `env_logger`.
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}

impl ServerConfig {
    /// Auto-detects a Ray version: the explicit flag/env var first, then `RAY_VERSION` from the
    /// process environment, consistent with how `rayClusterSpec.rayVersion` is supposed to be
    /// "auto-detected from the process environment (fail if undetectable)".
    pub fn resolved_ray_version(&self) -> Option<String> {
        self.ray_version
            .clone()
            .or_else(|| std::env::var("RAY_VERSION").ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_args() {
        let config = ServerConfig::parse_from(["jobq-server"]);
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.default_parallelism, 3);
    }

    #[test]
    fn parses_overridden_args() {
        let config = ServerConfig::parse_from([
            "jobq-server",
            "--bind-addr",
            "127.0.0.1:9090",
            "--default-parallelism",
            "5",
        ]);
        assert_eq!(config.bind_addr, "127.0.0.1:9090");
        assert_eq!(config.default_parallelism, 5);
    }
}
