mod args;
mod prompt;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use gpudog_core::config::{Identity, Policy, Preemption, WatchdogCfg};
use gpudog_core::credentials::{CredentialStore, Credentials};
use gpudog_core::environment::NvidiaSmiProbe;
use gpudog_core::notify::Notifier;
use gpudog_core::preempt::{Launcher, LauncherCfg, TokioSpawner};
use gpudog_core::runtime::{Period, RunOutcome, Watchdog};
use gpudog_push::http::WxPusherTransport;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::args::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let cfg = WatchdogCfg::from_env();

    let period = Period::parse_nonzero(&cli.check_freq)?;

    let preemption = if cli.flag_preempt {
        Preemption::Enabled(cli.process_name.clone().unwrap_or_default())
    } else {
        Preemption::Disabled
    };
    let policy = Policy::new(
        cli.cuda_memory,
        cli.device_list.iter().copied(),
        cli.continuous,
        preemption,
    );
    policy.validate()?;

    let creds = load_credentials(&cli).await?;
    let identity = Identity {
        label: cli.name_server.clone(),
        app_token: creds.app_token,
        uid: creds.uid,
    };

    let transport = WxPusherTransport::new(
        Some(cfg.push_url.clone()),
        Duration::from_secs(cfg.push_timeout_secs),
    );
    tracing::info!(endpoint = transport.endpoint(), "push transport initialized");
    let notifier = Notifier::new(Arc::new(transport), identity);

    let probe = Arc::new(NvidiaSmiProbe::new(cfg.probe_program.clone()));
    let launcher = match &policy.preemption {
        Preemption::Enabled(command) => Some(Launcher::new(
            LauncherCfg::from(&cfg),
            command.clone(),
            Arc::new(TokioSpawner),
        )),
        Preemption::Disabled => None,
    };

    tracing::info!(
        devices = ?policy.allowed_devices,
        threshold_mb = policy.threshold_mb,
        %period,
        continuous = policy.continuous,
        preempt = policy.preemption.is_enabled(),
        label = %cli.name_server,
        "gpudog starting"
    );

    let (mut watchdog, mut status_rx) = Watchdog::new(policy, probe, notifier, launcher);
    watchdog.shutdown().spawn_signal_listener();

    tokio::spawn(async move {
        while status_rx.changed().await.is_ok() {
            let status = status_rx.borrow_and_update().clone();
            tracing::debug!(
                phase = ?status.phase,
                check_count = status.check_count,
                last_match = ?status.last_match,
                "watchdog status"
            );
        }
    });

    match watchdog.run(period).await? {
        RunOutcome::Satisfied { checks, devices } => {
            tracing::info!(checks, %devices, "condition met, exiting");
        }
        RunOutcome::Interrupted { checks } => {
            tracing::info!(checks, "stopped by signal");
        }
    }
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_target(true).with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    }
}

/// Read the credential file, prompting (and saving) when it is missing or a reload is asked for.
async fn load_credentials(cli: &Cli) -> anyhow::Result<Credentials> {
    let store = CredentialStore::new(&cli.user_info);
    if !cli.reload && store.exists() {
        return store
            .load()
            .with_context(|| format!("reading {}", store.path().display()));
    }

    if cli.reload {
        tracing::info!(path = %store.path().display(), "reloading credentials");
    } else {
        tracing::info!(path = %store.path().display(), "no credential file, asking for one");
    }
    let creds = tokio::task::spawn_blocking(prompt::ask_credentials).await??;
    store.save(&creds)?;
    Ok(creds)
}
