//! Preemption launcher: starts a dependent workload pinned to matched devices.
//!
//! The workload is detached. The watchdog never waits on it, never kills it,
//! and does not track its exit status.

use std::io;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;

use crate::config::WatchdogCfg;
use crate::types::MatchResult;

#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("program {path} does not exist")]
    ExecutableNotFound { path: String },
    #[error("process command is empty")]
    EmptyCommand,
    #[error("no devices to launch on")]
    NoDevices,
    #[error("spawn failed for {program}: {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: io::Error,
    },
}

/// Fully resolved process invocation. No shell is involved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

impl LaunchSpec {
    /// Shell-like rendering for logs only.
    pub fn display_command(&self) -> String {
        let mut parts: Vec<String> = self.env.iter().map(|(k, v)| format!("{k}={v}")).collect();
        parts.push(self.program.clone());
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// Starts processes without waiting on them.
pub trait ProcessSpawner: Send + Sync {
    /// Start `spec` and return its pid if the platform reports one.
    fn spawn(&self, spec: &LaunchSpec) -> io::Result<Option<u32>>;
}

/// Spawns through `tokio::process`, detached from the watchdog.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSpawner;

impl ProcessSpawner for TokioSpawner {
    fn spawn(&self, spec: &LaunchSpec) -> io::Result<Option<u32>> {
        let child = tokio::process::Command::new(&spec.program)
            .args(&spec.args)
            .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .kill_on_drop(false)
            .spawn()?;
        // Dropping the handle leaves the child running; tokio reaps it.
        Ok(child.id())
    }
}

/// Launcher wrapper settings, normally taken from [`WatchdogCfg`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LauncherCfg {
    /// Wrapper program, e.g. `torchrun`.
    pub program: String,
    /// Fixed wrapper args placed before the process-count flag.
    pub args: Vec<String>,
    /// Environment variable that restricts device visibility.
    pub visibility_var: String,
}

impl From<&WatchdogCfg> for LauncherCfg {
    fn from(cfg: &WatchdogCfg) -> Self {
        Self {
            program: cfg.launcher_program.clone(),
            args: cfg.launcher_args.clone(),
            visibility_var: cfg.visibility_var.clone(),
        }
    }
}

/// A process that was handed to the OS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchedProcess {
    pub pid: Option<u32>,
    pub spec: LaunchSpec,
}

pub struct Launcher {
    cfg: LauncherCfg,
    command: String,
    spawner: Arc<dyn ProcessSpawner>,
}

impl Launcher {
    pub fn new(
        cfg: LauncherCfg,
        command: impl Into<String>,
        spawner: Arc<dyn ProcessSpawner>,
    ) -> Self {
        Self {
            cfg,
            command: command.into(),
            spawner,
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Resolve the invocation for `matched` without starting anything.
    ///
    /// Produces `<visibility_var>=<i,j,..> <program> <args..> --nproc_per_node=<n> <command..>`
    /// and checks that the command's first token exists on disk.
    pub fn plan(&self, matched: &MatchResult) -> Result<LaunchSpec, LaunchError> {
        if matched.is_empty() {
            return Err(LaunchError::NoDevices);
        }
        let tokens: Vec<&str> = self.command.split_whitespace().collect();
        let Some(target) = tokens.first() else {
            return Err(LaunchError::EmptyCommand);
        };
        if !Path::new(target).exists() {
            return Err(LaunchError::ExecutableNotFound {
                path: (*target).to_owned(),
            });
        }

        let mut args = self.cfg.args.clone();
        args.push(format!("--nproc_per_node={}", matched.len()));
        args.extend(tokens.iter().map(|t| (*t).to_owned()));

        Ok(LaunchSpec {
            program: self.cfg.program.clone(),
            args,
            env: vec![(self.cfg.visibility_var.clone(), matched.joined())],
        })
    }

    /// Plan and start the workload. Returns as soon as the OS accepted the spawn.
    pub fn launch(&self, matched: &MatchResult) -> Result<LaunchedProcess, LaunchError> {
        let spec = self.plan(matched)?;
        tracing::info!(command = %spec.display_command(), "launching preemption workload");

        let pid = self
            .spawner
            .spawn(&spec)
            .map_err(|source| LaunchError::SpawnFailed {
                program: spec.program.clone(),
                source,
            })?;
        tracing::info!(?pid, devices = %matched, "preemption workload started");
        Ok(LaunchedProcess { pid, spec })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        specs: Mutex<Vec<LaunchSpec>>,
    }

    impl ProcessSpawner for Recorder {
        fn spawn(&self, spec: &LaunchSpec) -> io::Result<Option<u32>> {
            self.specs.lock().unwrap().push(spec.clone());
            Ok(Some(4242))
        }
    }

    fn launcher_cfg() -> LauncherCfg {
        LauncherCfg::from(&WatchdogCfg::default())
    }

    fn script() -> tempfile::NamedTempFile {
        tempfile::Builder::new().suffix(".py").tempfile().unwrap()
    }

    #[test]
    fn plan_builds_torchrun_invocation() {
        let file = script();
        let path = file.path().to_str().unwrap().to_owned();
        let launcher = Launcher::new(
            launcher_cfg(),
            format!("{path} --epochs 3"),
            Arc::new(Recorder::default()),
        );

        let spec = launcher.plan(&MatchResult::new(vec![0, 2])).unwrap();
        assert_eq!(spec.program, "torchrun");
        assert_eq!(
            spec.args,
            vec![
                "--standalone".to_string(),
                "--nproc_per_node=2".to_string(),
                path.clone(),
                "--epochs".to_string(),
                "3".to_string(),
            ]
        );
        assert_eq!(
            spec.env,
            vec![("CUDA_VISIBLE_DEVICES".to_string(), "0,2".to_string())]
        );
        let launcher_prefix = "CUDA_VISIBLE_DEVICES=0,2 torchrun --standalone --nproc_per_node=2";
        assert_eq!(
            spec.display_command(),
            format!("{launcher_prefix} {path} --epochs 3")
        );
    }

    #[test]
    fn missing_executable_is_reported_and_nothing_spawns() {
        let recorder = Arc::new(Recorder::default());
        let launcher = Launcher::new(launcher_cfg(), "/no/such/binary arg", recorder.clone());

        let err = launcher.launch(&MatchResult::new(vec![1])).unwrap_err();
        match err {
            LaunchError::ExecutableNotFound { path } => assert_eq!(path, "/no/such/binary"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(recorder.specs.lock().unwrap().is_empty());
    }

    #[test]
    fn empty_command_rejected() {
        let launcher = Launcher::new(launcher_cfg(), "   ", Arc::new(Recorder::default()));
        assert!(matches!(
            launcher.plan(&MatchResult::new(vec![0])),
            Err(LaunchError::EmptyCommand)
        ));
    }

    #[test]
    fn empty_match_rejected() {
        let file = script();
        let launcher = Launcher::new(
            launcher_cfg(),
            file.path().to_str().unwrap(),
            Arc::new(Recorder::default()),
        );
        assert!(matches!(
            launcher.plan(&MatchResult::default()),
            Err(LaunchError::NoDevices)
        ));
    }

    #[test]
    fn launch_hands_spec_to_spawner() {
        let file = script();
        let recorder = Arc::new(Recorder::default());
        let launcher = Launcher::new(
            launcher_cfg(),
            file.path().to_str().unwrap(),
            recorder.clone(),
        );

        let launched = launcher.launch(&MatchResult::new(vec![3])).unwrap();
        assert_eq!(launched.pid, Some(4242));
        let specs = recorder.specs.lock().unwrap();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0], launched.spec);
    }

    #[tokio::test]
    async fn tokio_spawner_does_not_wait() {
        let spec = LaunchSpec {
            program: "sleep".into(),
            args: vec!["5".into()],
            env: vec![("CUDA_VISIBLE_DEVICES".into(), "0".into())],
        };
        let started = std::time::Instant::now();
        let pid = TokioSpawner.spawn(&spec).unwrap();
        assert!(pid.is_some());
        assert!(started.elapsed() < std::time::Duration::from_secs(2));
    }

    #[tokio::test]
    async fn tokio_spawner_missing_program_errors() {
        let spec = LaunchSpec {
            program: "/nonexistent/launcher".into(),
            args: vec![],
            env: vec![],
        };
        assert!(TokioSpawner.spawn(&spec).is_err());
    }
}
