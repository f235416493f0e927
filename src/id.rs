//! Page identifiers.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use rand::Rng;
use uuid::Uuid;

/// Identity of a composed page.
///
/// Page ids are UUIDs. Sequential ids keep their high half at zero and are
/// rendered in state tokens as a short decimal number; any other id is
/// rendered as 32 hex digits. Neither form contains the `-` token separator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(Uuid);

impl PageId {
    /// Wraps a UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Creates the sequential id `n`.
    pub fn sequential(n: u64) -> Self {
        Self(Uuid::from_u64_pair(0, n))
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_u64_pair() {
            (0, low) => write!(f, "{}", low),
            _ => write!(f, "{}", self.0.simple()),
        }
    }
}

/// Error returned when a token segment is not a page id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed page id")]
pub struct MalformedPageId;

impl FromStr for PageId {
    type Err = MalformedPageId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(MalformedPageId);
        }
        if s.len() <= 20 && s.bytes().all(|b| b.is_ascii_digit()) {
            return s
                .parse::<u64>()
                .map(PageId::sequential)
                .map_err(|_| MalformedPageId);
        }
        if s.len() == 32 && s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Uuid::parse_str(s).map(PageId).map_err(|_| MalformedPageId);
        }
        Err(MalformedPageId)
    }
}

/// Source of fresh page ids.
///
/// One generator is shared by all requests of a session, so implementations
/// must tolerate concurrent calls.
pub trait PageIdGenerator: Send + Sync {
    /// Returns an id never returned before by this generator.
    fn next_page_id(&self) -> PageId;
}

/// Generates increasing sequential page ids, wrapping after `u64::MAX`.
///
/// The sequence starts at a small random offset so that ids are not
/// trivially predictable across sessions.
///
/// # Examples
///
/// ```
/// use state_guard::{PageIdGenerator, SequentialPageIdGenerator};
///
/// let generator = SequentialPageIdGenerator::new();
/// let a = generator.next_page_id();
/// let b = generator.next_page_id();
/// assert_ne!(a, b);
/// ```
#[derive(Debug)]
pub struct SequentialPageIdGenerator {
    last: AtomicU64,
}

impl SequentialPageIdGenerator {
    /// Creates a generator starting at a random offset below 20.
    pub fn new() -> Self {
        Self::starting_at(rand::thread_rng().gen_range(0..20))
    }

    /// Creates a generator whose first id is `start + 1`.
    pub fn starting_at(start: u64) -> Self {
        Self {
            last: AtomicU64::new(start),
        }
    }
}

impl Default for SequentialPageIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl PageIdGenerator for SequentialPageIdGenerator {
    fn next_page_id(&self) -> PageId {
        PageId::sequential(self.last.fetch_add(1, Ordering::Relaxed).wrapping_add(1))
    }
}

/// Generates random (version 4) page ids.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomPageIdGenerator;

impl PageIdGenerator for RandomPageIdGenerator {
    fn next_page_id(&self) -> PageId {
        PageId(Uuid::new_v4())
    }
}
