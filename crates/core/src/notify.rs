//! Availability report and push notification.

use std::sync::{Arc, LazyLock};

use gpudog_push::{PushError, PushMessage, PushTransport};
use regex::Regex;

use crate::config::Identity;
use crate::types::{MatchResult, SnapshotSet};

/// Builds availability reports and pushes them through a transport.
pub struct Notifier {
    transport: Arc<dyn PushTransport>,
    identity: Identity,
}

impl Notifier {
    pub fn new(transport: Arc<dyn PushTransport>, identity: Identity) -> Self {
        Self {
            transport,
            identity,
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Render the report for one cycle.
    pub fn build_message(
        &self,
        snapshots: &SnapshotSet,
        matched: &MatchResult,
        check: u64,
    ) -> PushMessage {
        let summary = format!(
            "{} check #{check}: devices {matched} available",
            self.identity.label
        );
        let mut content = format!(
            "Instance: {}\n\
             Check #{check}: devices {matched} satisfy the condition\n\
             Taken at: {}\n\
             GPU status:\n\n",
            self.identity.label,
            snapshots.taken_at.format("%Y-%m-%d %H:%M:%S UTC"),
        );
        for device in &snapshots.devices {
            content.push_str(&strip_ansi(&device.display));
            content.push('\n');
        }
        PushMessage::text(
            self.identity.app_token.clone(),
            self.identity.uid.clone(),
            summary,
            content,
        )
    }

    /// Push one report. Exactly one attempt, no retry.
    pub async fn notify(
        &self,
        snapshots: &SnapshotSet,
        matched: &MatchResult,
        check: u64,
    ) -> Result<(), PushError> {
        let message = self.build_message(snapshots, matched, check);
        tracing::debug!(transport = self.transport.name(), check, "sending push");
        self.transport.send(message).await
    }
}

static ANSI_SGR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b\[[0-9;]*m").expect("ANSI SGR pattern is a valid regex")
});

/// Remove ANSI SGR colour sequences (`ESC [ ... m`) from display text.
pub fn strip_ansi(text: &str) -> String {
    ANSI_SGR.replace_all(text, "").into_owned()
}
