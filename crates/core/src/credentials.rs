//! Two-line credential file: push app token, then recipient uid.

use std::path::{Path, PathBuf};

use crate::error::WatchdogError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub app_token: String,
    pub uid: String,
}

#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub fn load(&self) -> Result<Credentials, WatchdogError> {
        let text = std::fs::read_to_string(&self.path)
            .map_err(|e| WatchdogError::io(&self.path, e))?;
        let mut lines = text.lines().map(str::trim);

        let app_token = lines.next().unwrap_or_default();
        let uid = lines.next().unwrap_or_default();
        if app_token.is_empty() || uid.is_empty() {
            return Err(WatchdogError::Credentials {
                path: self.path.clone(),
                details: "expected app token on line 1 and uid on line 2".into(),
            });
        }

        Ok(Credentials {
            app_token: app_token.to_owned(),
            uid: uid.to_owned(),
        })
    }

    /// Overwrite the file with `creds`.
    pub fn save(&self, creds: &Credentials) -> Result<(), WatchdogError> {
        let app_token = creds.app_token.trim();
        let uid = creds.uid.trim();
        if app_token.is_empty() || uid.is_empty() {
            return Err(WatchdogError::Credentials {
                path: self.path.clone(),
                details: "refusing to save an empty app token or uid".into(),
            });
        }
        std::fs::write(&self.path, format!("{app_token}\n{uid}"))
            .map_err(|e| WatchdogError::io(&self.path, e))?;
        tracing::info!(path = %self.path.display(), "credentials saved");
        Ok(())
    }
}
