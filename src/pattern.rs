//! Compiled URL and parameter patterns.
//!
//! Every rule in the configuration (start pages, parameters without
//! validation, long-living pages, protected URLs, editable rules) is written
//! as a string pattern. Patterns are compiled once, at configuration time,
//! into a [`PatternMatcher`] and matched against whole candidates.
//!
//! Two syntaxes are supported:
//! - plain patterns are regular expressions, matched against the entire
//!   candidate (`/admin/.*` matches `/admin/users` but not `/x/admin/users`)
//! - patterns prefixed with `glob:` use `*` (one path segment), `**` (any
//!   number of segments) and `?` (one character)

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use regex::Regex;

use crate::error::Error;

const GLOB_PREFIX: &str = "glob:";

/// The syntax a pattern was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternSyntax {
    /// Regular expression, anchored at both ends
    Regex,
    /// Path glob
    Glob,
}

/// A pattern compiled for repeated whole-string matching.
///
/// # Examples
///
/// ```
/// use state_guard::PatternMatcher;
///
/// let m = PatternMatcher::compile("/public/.*").unwrap();
/// assert!(m.matches("/public/index.html"));
/// assert!(!m.matches("/private/public/index.html"));
///
/// let g = PatternMatcher::compile("glob:/static/**/*.css").unwrap();
/// assert!(g.matches("/static/theme/main.css"));
/// ```
#[derive(Clone)]
pub struct PatternMatcher {
    pattern: String,
    syntax: PatternSyntax,
    regex: Regex,
}

impl PatternMatcher {
    /// Compiles `pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] if the pattern is not a valid
    /// regular expression (or the glob translates to an invalid one).
    pub fn compile(pattern: &str) -> Result<Self, Error> {
        let (syntax, source) = match pattern.strip_prefix(GLOB_PREFIX) {
            Some(glob) => (PatternSyntax::Glob, glob_to_regex(glob)),
            None => (PatternSyntax::Regex, pattern.to_string()),
        };

        let regex = Regex::new(&format!("^(?:{})$", source)).map_err(|source| {
            Error::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            }
        })?;

        Ok(Self {
            pattern: pattern.to_string(),
            syntax,
            regex,
        })
    }

    /// Returns `true` if the whole `candidate` matches.
    pub fn matches(&self, candidate: &str) -> bool {
        self.regex.is_match(candidate)
    }

    /// Returns the pattern as it was configured.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Returns the syntax the pattern was written in.
    pub fn syntax(&self) -> PatternSyntax {
        self.syntax
    }
}

impl PartialEq for PatternMatcher {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
    }
}

impl Eq for PatternMatcher {}

impl fmt::Debug for PatternMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PatternMatcher").field(&self.pattern).finish()
    }
}

impl fmt::Display for PatternMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pattern)
    }
}

/// Translates a path glob into an unanchored regex body.
fn glob_to_regex(glob: &str) -> String {
    let mut out = String::with_capacity(glob.len() * 2);
    let mut chars = glob.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                // "**/" also matches zero segments
                if chars.peek() == Some(&'/') {
                    chars.next();
                    out.push_str("(?:.*/)?");
                } else {
                    out.push_str(".*");
                }
            }
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            other => out.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }

    out
}

/// Compiles patterns and shares identical matchers.
///
/// The same pattern string appears in many places of a typical
/// configuration; the factory compiles it once and hands out the shared
/// matcher afterwards.
#[derive(Debug, Default)]
pub struct PatternMatcherFactory {
    cache: Mutex<HashMap<String, Arc<PatternMatcher>>>,
}

impl PatternMatcherFactory {
    /// Creates an empty factory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the matcher for `pattern`, compiling it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] if the pattern does not compile.
    pub fn matcher(&self, pattern: &str) -> Result<Arc<PatternMatcher>, Error> {
        let mut cache = self.cache.lock();
        if let Some(existing) = cache.get(pattern) {
            return Ok(Arc::clone(existing));
        }

        let matcher = Arc::new(PatternMatcher::compile(pattern)?);
        cache.insert(pattern.to_string(), Arc::clone(&matcher));
        Ok(matcher)
    }

    /// Returns the number of distinct compiled patterns.
    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    /// Returns `true` if nothing has been compiled yet.
    pub fn is_empty(&self) -> bool {
        self.cache.lock().is_empty()
    }
}
