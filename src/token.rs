//! State token encoding.
//!
//! Tokens are URL-safe strings of three `-`-separated segments:
//!
//! ```text
//! page scope:    <pageId>-<stateId>-<hash>     e.g. 14-0-E3E5BA9F9AC0DEA35BBE14189510600E
//! app scope:     A-<stateId>-<hash>
//! user session:  U-<stateId>-<hash>
//! ```
//!
//! The hash is 32 upper-case hex digits. For page tokens it binds the
//! state to its page's random seed; for scoped tokens it is derived from
//! the state's scope key.

use std::fmt;
use std::str::FromStr;

use sha2::{Digest, Sha256};

use crate::id::PageId;
use crate::model::{State, StateId};
use crate::scope::StateScopeType;

const SEPARATOR: char = '-';
const HASH_LEN: usize = 32;

/// A decoded state token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateToken {
    /// A state stored in a page of the user's page cache.
    Page {
        /// Owning page
        page_id: PageId,
        /// State within the page
        state_id: StateId,
        /// Integrity hash
        hash: String,
    },
    /// A state stored in a long-living scope.
    Scoped {
        /// Scope holding the state
        scope: StateScopeType,
        /// State within the scope
        state_id: StateId,
        /// Integrity hash
        hash: String,
    },
}

impl StateToken {
    /// Returns the state id.
    pub fn state_id(&self) -> StateId {
        match self {
            StateToken::Page { state_id, .. } | StateToken::Scoped { state_id, .. } => *state_id,
        }
    }

    /// Returns the integrity hash.
    pub fn hash(&self) -> &str {
        match self {
            StateToken::Page { hash, .. } | StateToken::Scoped { hash, .. } => hash,
        }
    }

    /// Returns the page id of page-scope tokens.
    pub fn page_id(&self) -> Option<PageId> {
        match self {
            StateToken::Page { page_id, .. } => Some(*page_id),
            StateToken::Scoped { .. } => None,
        }
    }
}

impl fmt::Display for StateToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateToken::Page {
                page_id,
                state_id,
                hash,
            } => write!(f, "{page_id}{SEPARATOR}{state_id}{SEPARATOR}{hash}"),
            StateToken::Scoped {
                scope,
                state_id,
                hash,
            } => {
                // Page scope never produces scoped tokens.
                let prefix = scope.token_prefix().unwrap_or("P");
                write!(f, "{prefix}{SEPARATOR}{state_id}{SEPARATOR}{hash}")
            }
        }
    }
}

/// Error returned for tokens that cannot be decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed state token")]
pub struct MalformedToken;

impl FromStr for StateToken {
    type Err = MalformedToken;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(SEPARATOR);
        let (Some(head), Some(state), Some(hash), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(MalformedToken);
        };

        if hash.len() != HASH_LEN || !hash.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(MalformedToken);
        }
        if state.is_empty() || !state.bytes().all(|b| b.is_ascii_digit()) {
            return Err(MalformedToken);
        }
        let state_id = state.parse::<StateId>().map_err(|_| MalformedToken)?;
        let hash = hash.to_ascii_uppercase();

        if let Some(scope) = StateScopeType::from_token_prefix(head) {
            return Ok(StateToken::Scoped {
                scope,
                state_id,
                hash,
            });
        }

        let page_id = head.parse::<PageId>().map_err(|_| MalformedToken)?;
        Ok(StateToken::Page {
            page_id,
            state_id,
            hash,
        })
    }
}

/// Integrity hash of a page-scope state.
pub(crate) fn page_state_hash(seed: &str, page_id: PageId, state_id: StateId, state: &State) -> String {
    let mut hasher = Sha256::new();
    hasher.update(seed.as_bytes());
    hasher.update(b"|");
    hasher.update(page_id.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(state_id.to_be_bytes());
    hasher.update(b"|");
    hasher.update(state.scope_key().as_bytes());
    truncate(hasher.finalize().as_slice())
}

/// Integrity hash of a scoped state, derived from its scope key.
pub(crate) fn scope_key_hash(scope_key: &str) -> String {
    truncate(Sha256::digest(scope_key.as_bytes()).as_slice())
}

fn truncate(digest: &[u8]) -> String {
    hex::encode_upper(&digest[..HASH_LEN / 2])
}
