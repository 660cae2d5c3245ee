//! Current credentials, mirrored to persistent storage
//!
//! The in-memory pair is authoritative. The mirror is read at most once,
//! by [`TokenStore::hydrate`] or by the first read of an empty store,
//! whichever comes first. After that, and after any explicit `set` or
//! `clear`, only memory answers. Every change is written through to the
//! origin-scoped record under the storage key; a mirror write that fails
//! is logged and does not undo the in-memory change.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use courier_domain::{PersistedSession, Result, TokenPair};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::storage::PersistentStore;

/// Holder of the access/refresh token pair
pub struct TokenStore {
    current: RwLock<Option<TokenPair>>,
    mirror: Arc<dyn PersistentStore>,
    key: String,
    consulted: AtomicBool,
}

impl TokenStore {
    /// Empty store mirroring to the record `key` in `mirror`
    pub fn new(mirror: Arc<dyn PersistentStore>, key: impl Into<String>) -> Self {
        Self {
            current: RwLock::new(None),
            mirror,
            key: key.into(),
            consulted: AtomicBool::new(false),
        }
    }

    /// Load the persisted pair into memory.
    ///
    /// Called once before the client accepts requests. Returns whether a
    /// pair was found.
    pub fn hydrate(&self) -> Result<bool> {
        self.consulted.store(true, Ordering::SeqCst);
        let loaded = self.read_mirror()?.and_then(|session| session.token_pair());
        let found = loaded.is_some();
        *self.current.write() = loaded;

        if found {
            info!(key = %self.key, "restored persisted session");
        } else {
            debug!(key = %self.key, "no persisted session");
        }
        Ok(found)
    }

    /// Current pair.
    ///
    /// If memory is empty and the mirror has never been consulted, the
    /// persisted pair is promoted into memory. Later reads never go back to
    /// the mirror.
    pub fn tokens(&self) -> Option<TokenPair> {
        if let Some(pair) = self.current.read().clone() {
            return Some(pair);
        }
        if self.consulted.swap(true, Ordering::SeqCst) {
            return None;
        }

        let persisted = match self.read_mirror() {
            Ok(session) => session.and_then(|s| s.token_pair()),
            Err(err) => {
                warn!(key = %self.key, error = %err, "failed to read token mirror");
                None
            }
        };

        let mut current = self.current.write();
        if current.is_none() {
            if persisted.is_some() {
                debug!(key = %self.key, "promoted persisted tokens into memory");
            }
            *current = persisted;
        }
        current.clone()
    }

    /// Bearer token to attach to requests
    pub fn access_token(&self) -> Option<String> {
        self.tokens().map(|pair| pair.access_token)
    }

    /// Token sent to the refresh endpoint
    pub fn refresh_token(&self) -> Option<String> {
        self.tokens().and_then(|pair| pair.refresh_token)
    }

    /// Whether an access token is held
    pub fn is_authenticated(&self) -> bool {
        self.tokens().is_some()
    }

    /// Replace the whole pair (login)
    pub fn set(&self, pair: TokenPair) {
        self.consulted.store(true, Ordering::SeqCst);
        *self.current.write() = Some(pair.clone());
        self.write_mirror(Some(&pair));
    }

    /// Install a renewed access token, rotating the refresh token if the
    /// server issued a new one.
    pub fn apply_refresh(&self, access_token: &str, rotated_refresh: Option<String>) -> TokenPair {
        let pair = {
            let mut current = self.current.write();
            let refresh_token =
                rotated_refresh.or_else(|| current.as_ref().and_then(|p| p.refresh_token.clone()));
            let pair = TokenPair { access_token: access_token.to_string(), refresh_token };
            *current = Some(pair.clone());
            pair
        };
        self.write_mirror(Some(&pair));
        pair
    }

    /// Forget both tokens, in memory and in the mirror
    pub fn clear(&self) {
        self.consulted.store(true, Ordering::SeqCst);
        *self.current.write() = None;
        self.write_mirror(None);
    }

    fn read_mirror(&self) -> Result<Option<PersistedSession>> {
        let Some(raw) = self.mirror.get(&self.key)? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    fn write_mirror(&self, pair: Option<&TokenPair>) {
        if let Err(err) = self.try_write_mirror(pair) {
            warn!(key = %self.key, error = %err, "failed to mirror tokens");
        }
    }

    fn try_write_mirror(&self, pair: Option<&TokenPair>) -> Result<()> {
        // keep fields other collaborators store in the same record
        let mut session = match self.read_mirror() {
            Ok(existing) => existing.unwrap_or_default(),
            Err(_) => PersistedSession::default(),
        };
        session.set_tokens(pair);

        if pair.is_none() && session.extra.is_empty() {
            return self.mirror.remove(&self.key);
        }
        self.mirror.set(&self.key, &serde_json::to_string(&session)?)
    }
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("key", &self.key)
            .field("authenticated", &self.current.read().is_some())
            .finish()
    }
}
