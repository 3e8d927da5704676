//! Credential store: the login blob persisted between runs.
//!
//! The file holds a single JSON object, `{}` on first run, and is
//! overwritten wholesale on every save.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::Result;

const TOKEN_KEY: &str = "token";

/// Provider credential fields as returned by a successful login.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credentials(Map<String, Value>);

impl Credentials {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Reusable login token, if one has been issued.
    pub fn token(&self) -> Option<&str> {
        self.0
            .get(TOKEN_KEY)
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Carry `prior`'s token over when this blob has none. Once issued, a
    /// token survives logins whose response omits it.
    fn keep_token_from(&mut self, prior: &Credentials) {
        let has_own = self.0.get(TOKEN_KEY).is_some_and(|v| !v.is_null());
        if has_own {
            return;
        }
        if let Some(token) = prior.token() {
            self.0
                .insert(TOKEN_KEY.to_string(), Value::String(token.to_string()));
        }
    }
}

/// File-backed credential store.
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

    /// Read the stored credentials. A missing file is created as `{}`.
    pub fn load(&self) -> Result<Credentials> {
        if !self.path.exists() {
            self.reset()?;
            return Ok(Credentials::default());
        }

        let content = std::fs::read_to_string(&self.path)?;
        let credentials: Credentials = serde_json::from_str(&content)?;
        Ok(credentials)
    }

    /// Persist `fresh`, keeping the previously stored token if `fresh`
    /// lacks one. Returns what was written.
    pub fn save(&self, mut fresh: Credentials) -> Result<Credentials> {
        let prior = self.load()?;
        fresh.keep_token_from(&prior);
        self.write(&fresh)?;
        debug!(path = %self.path.display(), fields = fresh.0.len(), "Credentials saved");
        Ok(fresh)
    }

    /// Overwrite the store with `{}`.
    pub fn reset(&self) -> Result<()> {
        self.write(&Credentials::default())
    }

    fn write(&self, credentials: &Credentials) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string(credentials)?)?;
        Ok(())
    }
}
