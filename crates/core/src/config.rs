use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::WatchdogError;

/// Environment variable prefix for [`WatchdogCfg::from_env`].
pub const ENV_PREFIX: &str = "GPUDOG_";

/// Tunables outside the operator policy. Defaults target a stock CUDA host
/// with `nvidia-smi` and `torchrun` on `PATH`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchdogCfg {
    // push transport
    pub push_url: String,
    pub push_timeout_secs: u64,

    // device probe
    pub probe_program: String,

    // preemption launcher
    pub launcher_program: String,
    pub launcher_args: Vec<String>,
    pub visibility_var: String,
}

impl Default for WatchdogCfg {
    fn default() -> Self {
        Self {
            push_url: gpudog_push::http::DEFAULT_ENDPOINT.to_owned(),
            push_timeout_secs: 15,
            probe_program: "nvidia-smi".to_owned(),
            launcher_program: "torchrun".to_owned(),
            launcher_args: vec!["--standalone".to_owned()],
            visibility_var: "CUDA_VISIBLE_DEVICES".to_owned(),
        }
    }
}

impl WatchdogCfg {
    /// Overlay `GPUDOG_*` environment variables onto the defaults,
    /// e.g. `GPUDOG_PUSH_URL`, `GPUDOG_LAUNCHER_ARGS="--standalone --max-restarts=0"`.
    pub fn from_env() -> Self {
        let map: HashMap<String, String> = std::env::vars()
            .filter_map(|(k, v)| {
                k.strip_prefix(ENV_PREFIX)
                    .map(|key| (key.to_ascii_lowercase(), v))
            })
            .collect();
        Self::from_map(&map)
    }

    /// Build from a key/value map. Missing or unparseable values keep their defaults.
    pub fn from_map(m: &HashMap<String, String>) -> Self {
        let d = Self::default();
        Self {
            push_url: get_or(m, "push_url", d.push_url),
            push_timeout_secs: get_or(m, "push_timeout_secs", d.push_timeout_secs),
            probe_program: get_or(m, "probe_program", d.probe_program),
            launcher_program: get_or(m, "launcher_program", d.launcher_program),
            launcher_args: m
                .get("launcher_args")
                .map(|v| v.split_whitespace().map(str::to_owned).collect())
                .unwrap_or(d.launcher_args),
            visibility_var: get_or(m, "visibility_var", d.visibility_var),
        }
    }
}

fn get_or<T: std::str::FromStr>(map: &HashMap<String, String>, key: &str, default: T) -> T {
    map.get(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Whether matched devices trigger a dependent workload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Preemption {
    #[default]
    Disabled,
    /// Command template; its first whitespace-delimited token is the program path.
    Enabled(String),
}

impl Preemption {
    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Enabled(_))
    }
}

/// Operator-supplied availability condition plus run-control flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    /// Minimum free memory per device, MB.
    pub threshold_mb: f64,
    /// Devices the operator cares about, in the order given. No duplicates.
    pub allowed_devices: Vec<u32>,
    /// Keep checking (and notifying) after the first match.
    pub continuous: bool,
    pub preemption: Preemption,
}

impl Policy {
    /// Build a policy, dropping repeated device indices while keeping first-seen order.
    pub fn new(
        threshold_mb: f64,
        allowed_devices: impl IntoIterator<Item = u32>,
        continuous: bool,
        preemption: Preemption,
    ) -> Self {
        let mut allowed = Vec::new();
        for idx in allowed_devices {
            if !allowed.contains(&idx) {
                allowed.push(idx);
            }
        }
        Self {
            threshold_mb,
            allowed_devices: allowed,
            continuous,
            preemption,
        }
    }

    pub fn allows(&self, index: u32) -> bool {
        self.allowed_devices.contains(&index)
    }

    /// Startup validation: a preemption command must name a program.
    pub fn validate(&self) -> Result<(), WatchdogError> {
        if matches!(&self.preemption, Preemption::Enabled(cmd) if cmd.trim().is_empty()) {
            return Err(WatchdogError::Config(
                "preemption is enabled but the process command is empty".into(),
            ));
        }
        if !self.threshold_mb.is_finite() {
            return Err(WatchdogError::Config(format!(
                "memory threshold {} is not a finite number",
                self.threshold_mb
            )));
        }
        Ok(())
    }
}

/// Who this watchdog is and where its notifications go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Instance label shown in every notification, e.g. the host name.
    pub label: String,
    pub app_token: String,
    pub uid: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = WatchdogCfg::default();
        assert_eq!(cfg.launcher_program, "torchrun");
        assert_eq!(cfg.launcher_args, vec!["--standalone".to_string()]);
        assert_eq!(cfg.visibility_var, "CUDA_VISIBLE_DEVICES");
        assert_eq!(cfg.probe_program, "nvidia-smi");
        assert!(cfg.push_url.starts_with("https://"));
    }

    #[test]
    fn from_map_overrides_and_falls_back() {
        let mut m = HashMap::new();
        m.insert("push_url".to_string(), "http://localhost:8080/push".to_string());
        m.insert("push_timeout_secs".to_string(), "not-a-number".to_string());
        m.insert("launcher_args".to_string(), "--standalone  --max-restarts=0".to_string());

        let cfg = WatchdogCfg::from_map(&m);
        assert_eq!(cfg.push_url, "http://localhost:8080/push");
        assert_eq!(cfg.push_timeout_secs, 15);
        assert_eq!(cfg.launcher_args, vec!["--standalone", "--max-restarts=0"]);
        assert_eq!(cfg.launcher_program, "torchrun");
    }

    #[test]
    fn policy_dedupes_devices_in_order() {
        let p = Policy::new(5000.0, [3, 1, 3, 0, 1], false, Preemption::Disabled);
        assert_eq!(p.allowed_devices, vec![3, 1, 0]);
        assert!(p.allows(0));
        assert!(!p.allows(2));
    }

    #[test]
    fn enabled_preemption_requires_command() {
        let p = Policy::new(5000.0, [0], false, Preemption::Enabled("   ".into()));
        assert!(matches!(p.validate(), Err(WatchdogError::Config(_))));

        let p = Policy::new(5000.0, [0], false, Preemption::Enabled("train.py".into()));
        assert!(p.validate().is_ok());
        assert!(p.preemption.is_enabled());
    }

    #[test]
    fn nan_threshold_rejected() {
        let p = Policy::new(f64::NAN, [0], false, Preemption::Disabled);
        assert!(p.validate().is_err());
    }
}
