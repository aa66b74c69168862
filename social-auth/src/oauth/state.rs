//! Durable storage for pending authorizations.
//!
//! The consent step and the code exchange run as separate process invocations,
//! so the PKCE verifier is kept on disk keyed by the `state` parameter until one
//! exchange succeeds.

use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind as IoErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::authorize::AuthorizationRequest;
use super::pkce::PkceVerifier;
use crate::error::{pending_state_error, Error, PendingStateErrorKind};

/// Data stored between the consent step and the code exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingAuthorization {
    pub state: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub scope: String,
    pub code_verifier: String,
    pub code_challenge: String,
    pub created_at: DateTime<Utc>,
}

impl PendingAuthorization {
    pub fn from_request(
        request: &AuthorizationRequest,
        client_id: &str,
        redirect_uri: &str,
        scope: &str,
    ) -> Self {
        Self {
            state: request.state.clone(),
            client_id: client_id.to_string(),
            redirect_uri: redirect_uri.to_string(),
            scope: scope.to_string(),
            code_verifier: request.pkce.verifier().as_str().to_string(),
            code_challenge: request.pkce.challenge().as_str().to_string(),
            created_at: Utc::now(),
        }
    }

    /// The stored verifier, if it is present and well formed.
    pub fn verifier(&self) -> Option<PkceVerifier> {
        if self.code_verifier.trim().is_empty() {
            return None;
        }
        match PkceVerifier::parse(&self.code_verifier) {
            Ok(verifier) => Some(verifier),
            Err(e) => {
                warn!("Stored code_verifier for state {} is unusable: {}", self.state, e);
                None
            }
        }
    }
}

/// File-backed store for pending authorizations with expiration.
#[derive(Debug, Clone)]
pub struct PendingAuthorizationStore {
    path: PathBuf,
    ttl: Duration,
}

impl PendingAuthorizationStore {
    /// Create a store at `path` with the default TTL of 30 minutes.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_ttl(path, Duration::minutes(30))
    }

    /// Create a store with a custom TTL.
    pub fn with_ttl(path: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            path: path.into(),
            ttl,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist a pending authorization, replacing any entry with the same state.
    pub fn save(&self, pending: &PendingAuthorization) -> Result<(), Error> {
        let mut entries = self.read_all()?;
        self.drop_expired(&mut entries);
        entries.insert(pending.state.clone(), pending.clone());
        self.write_all(&entries)?;
        debug!("Saved pending authorization to {}", self.path.display());
        Ok(())
    }

    /// Look up an unexpired pending authorization by state.
    pub fn load(&self, state: &str) -> Result<Option<PendingAuthorization>, Error> {
        let entries = self.read_all()?;
        Ok(entries
            .get(state)
            .filter(|pending| !self.is_expired(pending))
            .cloned())
    }

    /// The most recently created unexpired pending authorization.
    pub fn latest(&self) -> Result<Option<PendingAuthorization>, Error> {
        let entries = self.read_all()?;
        Ok(entries
            .into_values()
            .filter(|pending| !self.is_expired(pending))
            .max_by_key(|pending| pending.created_at))
    }

    /// Remove the entry for `state`. The verifier is single use.
    pub fn discard(&self, state: &str) -> Result<(), Error> {
        let mut entries = self.read_all()?;
        if entries.remove(state).is_some() {
            self.write_all(&entries)?;
            debug!("Discarded pending authorization for state {}", state);
        }
        Ok(())
    }

    fn is_expired(&self, pending: &PendingAuthorization) -> bool {
        Utc::now() > pending.created_at + self.ttl
    }

    fn drop_expired(&self, entries: &mut BTreeMap<String, PendingAuthorization>) {
        entries.retain(|_, pending| !self.is_expired(pending));
    }

    fn read_all(&self) -> Result<BTreeMap<String, PendingAuthorization>, Error> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(pending_state_error(PendingStateErrorKind::Io, e)),
        };

        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        serde_json::from_str(&contents)
            .map_err(|e| pending_state_error(PendingStateErrorKind::Malformed, e))
    }

    fn write_all(&self, entries: &BTreeMap<String, PendingAuthorization>) -> Result<(), Error> {
        let contents = serde_json::to_string_pretty(entries)
            .map_err(|e| pending_state_error(PendingStateErrorKind::Malformed, e))?;
        open_private(&self.path)
            .and_then(|mut file| file.write_all(contents.as_bytes()))
            .map_err(|e| pending_state_error(PendingStateErrorKind::Io, e))
    }
}

/// Open `path` for writing with owner-only permissions. The file holds live code verifiers.
#[cfg(unix)]
fn open_private(path: &Path) -> std::io::Result<fs::File> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // `mode` only applies on creation; tighten a file left behind by an older run.
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    Ok(file)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> std::io::Result<fs::File> {
    fs::File::create(path)
}
