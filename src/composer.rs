//! Composition of states while a response is rendered.
//!
//! A [`DataComposer`] is created for one request and walks through a small
//! state machine:
//!
//! ```text
//! Idle --start_page--> PageStarted --begin_request--> RequestOpen
//!                          ^                               |
//!                          +---------- end_request --------+
//! PageStarted --end_page--> PageEnded --start_page--> PageStarted
//! ```
//!
//! Exactly one state is open at a time; parameters are appended to it in
//! rendering order. Misuse of the sequence returns [`Error::IllegalState`].

use std::sync::Arc;

use crate::config::Config;
use crate::context::{parse_query, strip_context_path, RequestContext};
use crate::error::Error;
use crate::model::{Page, Parameter, State, StateId};
use crate::request::Method;
use crate::scope::{StateScopeManager, StateScopeType};
use crate::session::PageStore;
use crate::token::{page_state_hash, StateToken};

/// Component types that may be absent from a submitted form.
pub const OPTIONAL_TYPES: [&str; 6] = [
    "checkbox",
    "radio",
    "select-multiple",
    "submit",
    "button",
    "image",
];

/// Phase of a [`DataComposer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No page started yet
    Idle,
    /// A page is open and no state is being composed
    PageStarted,
    /// A state is being composed
    RequestOpen,
    /// The page was ended
    PageEnded,
}

impl Phase {
    fn describe(self) -> &'static str {
        match self {
            Phase::Idle => "no page is started",
            Phase::PageStarted => "a page is started",
            Phase::RequestOpen => "a request is open",
            Phase::PageEnded => "the page is ended",
        }
    }
}

/// Builds the page and states of one rendered response.
///
/// Obtained from [`StateGuard::composer`](crate::StateGuard::composer).
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use state_guard::{Config, MemorySession, Method, RequestContext, StateGuard};
///
/// let guard = StateGuard::new(Config::default());
/// let ctx = RequestContext::builder(Arc::new(MemorySession::new()))
///     .target("/list.do")
///     .build();
///
/// let mut composer = guard.composer(&ctx);
/// composer.start_page().unwrap();
/// composer.begin_request(Some(Method::Get), "/detail.do").unwrap();
/// let rendered = composer.compose("id", "4711", false).unwrap();
/// let token = composer.end_request().unwrap();
/// composer.end_page().unwrap();
///
/// assert_eq!(rendered, "0");
/// assert_eq!(token.split('-').count(), 3);
/// ```
pub struct DataComposer<'a> {
    config: &'a Config,
    pages: &'a PageStore,
    scopes: &'a StateScopeManager,
    ctx: &'a RequestContext,
    phase: Phase,
    page: Option<Page>,
    page_scope: StateScopeType,
    scope_stack: Vec<StateScopeType>,
    open: Option<State>,
    keep_from: Option<StateId>,
}

impl<'a> DataComposer<'a> {
    pub(crate) fn new(
        config: &'a Config,
        pages: &'a PageStore,
        scopes: &'a StateScopeManager,
        ctx: &'a RequestContext,
    ) -> Self {
        Self {
            config,
            pages,
            scopes,
            ctx,
            phase: Phase::Idle,
            page: None,
            page_scope: StateScopeType::Page,
            scope_stack: Vec::new(),
            open: None,
            keep_from: None,
        }
    }

    /// Returns the current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Returns the scope new states are stored in.
    pub fn active_scope(&self) -> StateScopeType {
        self.scope_stack.last().copied().unwrap_or(self.page_scope)
    }

    /// Returns the page being composed.
    pub fn page(&self) -> Option<&Page> {
        self.page.as_ref()
    }

    pub(crate) fn config(&self) -> &'a Config {
        self.config
    }

    pub(crate) fn context(&self) -> &'a RequestContext {
        self.ctx
    }

    /// Starts the page of the current response.
    ///
    /// When the request carries a state token and a cached page was already
    /// produced by that token (a refresh), the new render replaces that
    /// page's states under its existing id. Ajax requests add their states
    /// to the page their token belongs to when configured. Otherwise a new
    /// page id is allocated.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IllegalState`] if a page is already open.
    pub fn start_page(&mut self) -> Result<(), Error> {
        if matches!(self.phase, Phase::PageStarted | Phase::RequestOpen) {
            return Err(illegal("start a page", self.phase));
        }

        let session = self.ctx.session();
        let log = self.ctx.log();
        let parent = self
            .ctx
            .first_parameter(self.config.state_parameter_name())
            .filter(|token| !token.is_empty());

        // A continuation keeps the states from its cut onwards when published
        let mut continued = None;
        if let Some(token) = parent {
            if self.config.reuse_existing_page_in_ajax_request() && self.ctx.is_ajax() {
                if let Some(page_id) = token.parse::<StateToken>().ok().and_then(|t| t.page_id()) {
                    if let Some(existing) = self.pages.get_page(session, page_id)? {
                        log.debug(format_args!("continuing page {} for ajax request", page_id));
                        continued = Some((existing.continuation(), 0));
                    }
                }
            }
            if continued.is_none() {
                if let Some(existing) = self.pages.find_by_parent(session, token)? {
                    log.debug(format_args!("refresh detected, reusing page {}", existing.id()));
                    continued = Some((existing.continuation(), existing.next_state_id()));
                }
            }
        }

        let (page, keep_from) = match continued {
            Some((page, keep_from)) => (page, Some(keep_from)),
            None => {
                let mut fresh = Page::new(self.pages.next_page_id(session)?);
                fresh.set_parent_state_id(parent.map(str::to_string));
                (fresh, None)
            }
        };

        self.page_scope = self
            .config
            .is_long_living_page(self.ctx.relative_target())
            .unwrap_or(StateScopeType::Page);
        self.page = Some(page);
        self.keep_from = keep_from;
        self.scope_stack.clear();
        self.phase = Phase::PageStarted;
        Ok(())
    }

    /// Stores the states composed until the matching [`end_scope`](Self::end_scope)
    /// in `scope`. Scopes nest.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IllegalState`] unless a page is started and no
    /// request is open.
    pub fn start_scope(&mut self, scope: StateScopeType) -> Result<(), Error> {
        if self.phase != Phase::PageStarted {
            return Err(illegal("start a scope", self.phase));
        }
        self.scope_stack.push(scope);
        Ok(())
    }

    /// Ends the innermost scope.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IllegalState`] without a matching
    /// [`start_scope`](Self::start_scope) or while a request is open.
    pub fn end_scope(&mut self) -> Result<(), Error> {
        if self.phase != Phase::PageStarted {
            return Err(illegal("end a scope", self.phase));
        }
        if self.scope_stack.pop().is_none() {
            return Err(Error::IllegalState {
                operation: "end a scope",
                phase: "no scope is started",
            });
        }
        Ok(())
    }

    /// Opens a state for a request to `action`; `method` of `None` accepts
    /// any method.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IllegalState`] unless a page is started and no
    /// other request is open.
    pub fn begin_request(&mut self, method: Option<Method>, action: &str) -> Result<(), Error> {
        if self.phase != Phase::PageStarted {
            return Err(illegal("begin a request", self.phase));
        }
        self.open = Some(State::new(action, method));
        self.phase = Phase::RequestOpen;
        Ok(())
    }

    /// Adds a parameter value to the open state, returning the value to
    /// render.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IllegalState`] if no request is open.
    pub fn compose(&mut self, name: &str, value: &str, editable: bool) -> Result<String, Error> {
        self.compose_typed(name, value, editable, None)
    }

    /// Like [`compose`](Self::compose), recording the component type used to
    /// select editable rules.
    ///
    /// Confidential parameters render their substitution index. Editable
    /// parameters, start parameters, exempt parameters and the internal
    /// control parameters render their real value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IllegalState`] if no request is open.
    pub fn compose_typed(
        &mut self,
        name: &str,
        value: &str,
        editable: bool,
        data_type: Option<&str>,
    ) -> Result<String, Error> {
        if self.phase != Phase::RequestOpen {
            return Err(illegal("compose a parameter", self.phase));
        }
        let config = self.config;
        let context_path = self.ctx.context_path();
        let Some(state) = self.open.as_mut() else {
            return Err(illegal("compose a parameter", self.phase));
        };
        // exemptions are keyed by the same context-relative path the validator sees
        let action = strip_context_path(state.action(), context_path);

        let confidential = config.confidentiality()
            && !editable
            && name != config.state_parameter_name()
            && name != config.modify_state_parameter_name()
            && !config.is_start_parameter(name)
            && !config.is_parameter_without_validation(action, name);
        let optional = data_type.map_or(false, is_optional_type);
        let required = !optional && (!editable || config.editable_fields_required_by_default());

        let parameter = state.parameter_entry(name, || {
            let parameter = Parameter::new(name, editable, confidential).with_required(required);
            match data_type {
                Some(data_type) => parameter.with_data_type(data_type),
                None => parameter,
            }
        });
        let index = parameter.add_value(value);

        if parameter.is_confidential() {
            Ok(index.to_string())
        } else {
            Ok(value.to_string())
        }
    }

    /// Adds a form field to the open state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IllegalState`] if no request is open.
    pub fn compose_form_field(
        &mut self,
        name: &str,
        value: &str,
        editable: bool,
        data_type: &str,
    ) -> Result<String, Error> {
        self.compose_typed(name, value, editable, Some(data_type))
    }

    /// Adds every parameter of a query string to the open state and returns
    /// the query string to render, with values substituted and encoded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IllegalState`] if no request is open.
    pub fn compose_query(&mut self, query: &str) -> Result<String, Error> {
        let mut rendered = Vec::new();
        for (name, value) in parse_query(query) {
            let value = self.compose(&name, &value, false)?;
            rendered.push(format!(
                "{}={}",
                urlencoding::encode(&name),
                urlencoding::encode(&value)
            ));
        }
        Ok(rendered.join("&"))
    }

    /// Closes the open state and returns its token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IllegalState`] if no request is open, and session
    /// errors from long-living scopes.
    pub fn end_request(&mut self) -> Result<String, Error> {
        if self.phase != Phase::RequestOpen {
            return Err(illegal("end a request", self.phase));
        }
        let scope = self.active_scope();
        let (Some(mut state), Some(page)) = (self.open.take(), self.page.as_mut()) else {
            return Err(illegal("end a request", self.phase));
        };
        self.phase = Phase::PageStarted;

        let token = match self.scopes.scope(scope) {
            Some(long_living) => long_living.add_state(self.ctx, state)?,
            None => {
                let state_id = page.allocate_state_id();
                let hash = page_state_hash(page.seed(), page.id(), state_id, &state);
                state.seal(state_id, hash.clone());
                page.add_state(state);
                StateToken::Page {
                    page_id: page.id(),
                    state_id,
                    hash,
                }
            }
        };
        Ok(token.to_string())
    }

    /// Ends the page, publishing it to the session if it holds states.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IllegalState`] unless a page is started, no request
    /// is open and every scope was ended.
    pub fn end_page(&mut self) -> Result<Option<Arc<Page>>, Error> {
        if self.phase != Phase::PageStarted {
            return Err(illegal("end a page", self.phase));
        }
        if !self.scope_stack.is_empty() {
            return Err(Error::IllegalState {
                operation: "end a page",
                phase: "a scope is still started",
            });
        }
        self.phase = Phase::PageEnded;

        let Some(page) = self.page.take() else {
            return Ok(None);
        };
        if page.states_count() == 0 {
            return Ok(None);
        }

        let page_id = page.id();
        let states = page.states_count();
        let published = match self.keep_from.take() {
            Some(keep_from) => self.pages.merge_page(self.ctx.session(), page, keep_from)?,
            None => self.pages.add_page(self.ctx.session(), page)?,
        };
        self.ctx
            .log()
            .debug(format_args!("published page {} with {} states", page_id, states));
        Ok(Some(published))
    }
}

fn illegal(operation: &'static str, phase: Phase) -> Error {
    Error::IllegalState {
        operation,
        phase: phase.describe(),
    }
}

/// Returns `true` for component types that may be absent from a submission.
pub fn is_optional_type(data_type: &str) -> bool {
    OPTIONAL_TYPES
        .iter()
        .any(|t| t.eq_ignore_ascii_case(data_type))
}
