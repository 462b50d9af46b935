// Host configuration, populated once from the environment with documented
// defaults and passed explicitly. Nothing reads the environment ad hoc.

use std::time::Duration;

use gradebox_common::PER_CALL_TIMEOUT_CEILING_MS;

/// Resource ceilings and capability restrictions applied to every sandbox
/// instance. These are mandatory invocation parameters, not tuning knobs:
/// a sandbox is never spawned without them.
#[derive(Debug, Clone)]
pub struct SandboxLimits {
    /// CPU share granted to the container.
    pub cpus: f32,
    /// Memory ceiling in megabytes.
    pub memory_mb: u32,
    /// Process-count ceiling.
    pub pids: u32,
    /// Size of the writable, non-executable scratch tmpfs in megabytes.
    pub scratch_mb: u32,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            cpus: 0.5,
            memory_mb: 128,
            pids: 64,
            scratch_mb: 64,
        }
    }
}

impl SandboxLimits {
    /// Render the limits as `docker run` flags.
    pub fn to_args(&self) -> Vec<String> {
        vec![
            format!("--cpus={}", self.cpus),
            format!("--memory={}m", self.memory_mb),
            format!("--pids-limit={}", self.pids),
            "--cap-drop=ALL".to_string(),
            "--security-opt".to_string(),
            "no-new-privileges".to_string(),
            "--read-only".to_string(),
            "--tmpfs".to_string(),
            format!("/tmp:rw,noexec,nosuid,size={}m", self.scratch_mb),
        ]
    }
}

/// Orchestrator configuration.
///
/// Environment surface (all optional, all defaulted):
/// - `GRADEBOX_RUNTIME_BIN` - isolation-runtime binary, default `docker`
/// - `GRADEBOX_RUNNER_IMAGE` - sandbox image, default `gradebox-js:latest`
/// - `GRADEBOX_RUNNER_TIMEOUT_SECS` - wall-clock timeout, default 8
#[derive(Debug, Clone)]
pub struct HostConfig {
    pub runtime_bin: String,
    pub image: String,
    /// Bounds the total sandbox lifetime, including container startup and
    /// engine overhead. Floored at twice the per-call ceiling so it always
    /// exceeds any single in-sandbox call budget.
    pub wall_timeout: Duration,
    pub limits: SandboxLimits,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            runtime_bin: "docker".to_string(),
            image: "gradebox-js:latest".to_string(),
            wall_timeout: Duration::from_secs(8),
            limits: SandboxLimits::default(),
        }
    }
}

impl HostConfig {
    /// Smallest wall-clock timeout the host will accept.
    pub fn min_wall_timeout() -> Duration {
        Duration::from_millis(2 * PER_CALL_TIMEOUT_CEILING_MS)
    }

    /// Populate from the environment, falling back to defaults for unset or
    /// unparseable values.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let runtime_bin =
            std::env::var("GRADEBOX_RUNTIME_BIN").unwrap_or(defaults.runtime_bin);
        let image = std::env::var("GRADEBOX_RUNNER_IMAGE").unwrap_or(defaults.image);
        let wall_timeout = std::env::var("GRADEBOX_RUNNER_TIMEOUT_SECS")
            .ok()
            .and_then(|raw| raw.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.wall_timeout)
            .max(Self::min_wall_timeout());

        Self {
            runtime_bin,
            image,
            wall_timeout,
            limits: defaults.limits,
        }
    }

    /// Full argument vector for one disposable sandbox invocation:
    /// `run --rm -i --network none <limits> <image>`.
    ///
    /// `--rm` makes the instance single-use, `-i` keeps stdin open for the
    /// request payload, `--network none` removes the network namespace
    /// entirely. The image's read-only root filesystem is what lets it be
    /// shared across concurrent spawns without cross-evaluation state.
    pub fn sandbox_args(&self) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "--rm".to_string(),
            "-i".to_string(),
            "--network".to_string(),
            "none".to_string(),
        ];
        args.extend(self.limits.to_args());
        args.push(self.image.clone());
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HostConfig::default();

        assert_eq!(config.runtime_bin, "docker");
        assert_eq!(config.image, "gradebox-js:latest");
        assert_eq!(config.wall_timeout, Duration::from_secs(8));
    }

    #[test]
    fn test_sandbox_args_shape() {
        let config = HostConfig::default();
        let args = config.sandbox_args();

        assert_eq!(args[0], "run");
        assert!(args.contains(&"--rm".to_string()));
        assert!(args.contains(&"-i".to_string()));
        // Network isolation is non-negotiable
        let net = args.iter().position(|a| a == "--network").unwrap();
        assert_eq!(args[net + 1], "none");
        // Image comes last so every flag applies to the run, not the command
        assert_eq!(args.last().unwrap(), "gradebox-js:latest");
    }

    #[test]
    fn test_limit_flags_present() {
        let args = HostConfig::default().sandbox_args();

        assert!(args.contains(&"--cpus=0.5".to_string()));
        assert!(args.contains(&"--memory=128m".to_string()));
        assert!(args.contains(&"--pids-limit=64".to_string()));
        assert!(args.contains(&"--cap-drop=ALL".to_string()));
        assert!(args.contains(&"--read-only".to_string()));
        assert!(args
            .contains(&"/tmp:rw,noexec,nosuid,size=64m".to_string()));
    }

    #[test]
    fn test_wall_timeout_floor() {
        // Whatever the environment says, the wall clock must exceed the
        // per-call ceiling with room for container startup
        let config = HostConfig::from_env();
        assert!(config.wall_timeout >= HostConfig::min_wall_timeout());
    }
}
