//! Server-side state composition and validation against parameter
//! tampering and CSRF.
//!
//! While a response is rendered, every link and form it contains is
//! recorded as a *state*: the action, the method and each parameter with the
//! values offered to the client. States are grouped per rendered *page* and
//! kept in the user session; the client only receives an opaque token per
//! state. When the next request arrives it is validated against the state
//! its token names: anything the client was not offered is rejected.
//!
//! # Core Types
//!
//! - [`StateGuard`]: the engine, shared by all requests
//! - [`Config`]: immutable configuration, built with [`ConfigBuilder`] or
//!   loaded from TOML [`Settings`]
//! - [`RequestContext`]: one incoming request and its session
//! - [`DataComposer`]: records states while a response is rendered
//! - [`LinkUrlProcessor`] / [`FormUrlProcessor`]: add states to URLs
//! - [`ValidatorHelper`]: checks a request, producing a [`ValidationOutcome`]
//!
//! Confidential values are replaced by their index in the recorded value
//! list, so the client never sees them; validation restores the real values.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use state_guard::{
//!     Config, ErrorCode, LinkUrlProcessor, MemorySession, RequestContext, SessionStore,
//!     StateGuard, ViolationKind,
//! };
//!
//! let guard = StateGuard::new(Config::default());
//! let session: Arc<dyn SessionStore> = Arc::new(MemorySession::new());
//!
//! let render = RequestContext::builder(Arc::clone(&session)).target("/index.do").build();
//! let mut composer = guard.composer(&render);
//! composer.start_page().unwrap();
//! let link = LinkUrlProcessor
//!     .process_url(&mut composer, "/account.do?id=4711")
//!     .unwrap();
//! composer.end_page().unwrap();
//!
//! // The client changes the substituted value
//! let (path, query) = link.split_once('?').unwrap();
//! let tampered = query.replace("id=0", "id=1");
//! let request = RequestContext::builder(session)
//!     .target(path)
//!     .query(&tampered)
//!     .build();
//!
//! let outcome = guard.validate(&request).unwrap();
//! assert!(!outcome.is_valid());
//! let error = outcome.first_error().unwrap();
//! assert_eq!(error.kind(), ViolationKind::ParameterTampering);
//! assert_eq!(error.code(), ErrorCode::InvalidConfidentialParameter);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod composer;
mod config;
mod context;
mod error;
mod guard;
mod id;
mod logging;
mod model;
mod pattern;
mod request;
mod scope;
mod session;
mod token;
mod validation;
mod validator;
mod web;

pub use composer::{is_optional_type, DataComposer, Phase, OPTIONAL_TYPES};
pub use config::{
    ActionMatching, Config, ConfigBuilder, Settings, StartPage, DEFAULT_MODIFY_STATE_PARAMETER,
    DEFAULT_STATE_PARAMETER,
};
pub use context::{RequestContext, RequestContextBuilder};
pub use error::{Error, ErrorCode, ValidatorError, ViolationKind};
pub use guard::StateGuard;
pub use id::{MalformedPageId, PageId, PageIdGenerator, RandomPageIdGenerator, SequentialPageIdGenerator};
pub use logging::ValidationLog;
pub use model::{Page, Parameter, State, StateId};
pub use pattern::{PatternMatcher, PatternMatcherFactory, PatternSyntax};
pub use request::{Method, UnknownMethod};
pub use scope::{
    AppStateScope, ScopedStateCache, StateScope, StateScopeManager, StateScopeType,
    UserSessionStateScope,
};
pub use session::{MemorySession, PageStore, SessionStore, SessionStoreExt, SessionValue, StateCache};
pub use token::{MalformedToken, StateToken};
pub use validation::{
    default_rules, DefaultEditableDataValidationProvider, EditableDataValidationProvider,
    EditableValidationResult, RuleDefinition, ValidationRepository, ValidationRule,
};
pub use validator::{Legality, ValidationOutcome, ValidatorHelper};
pub use web::{FormAction, FormUrlProcessor, LinkUrlProcessor, UrlData};
