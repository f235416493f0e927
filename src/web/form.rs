use crate::composer::DataComposer;
use crate::error::Error;
use crate::request::Method;

use super::UrlData;

/// The action of a processed form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormAction {
    url: String,
    state_open: bool,
}

impl FormAction {
    /// Returns the action URL to render.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns `true` if a state was begun for the form. The caller composes
    /// the fields, ends the request and renders the token as a hidden
    /// field.
    pub fn is_state_open(&self) -> bool {
        self.state_open
    }
}

/// Begins states for form actions.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use state_guard::{Config, FormUrlProcessor, MemorySession, Method, RequestContext, StateGuard};
///
/// let guard = StateGuard::new(Config::default());
/// let ctx = RequestContext::builder(Arc::new(MemorySession::new()))
///     .target("/edit.do")
///     .build();
/// let mut composer = guard.composer(&ctx);
/// composer.start_page().unwrap();
///
/// let action = FormUrlProcessor
///     .process_action(&mut composer, "/save.do?mode=full", Method::Post)
///     .unwrap();
/// assert_eq!(action.url(), "/save.do?mode=0");
/// assert!(action.is_state_open());
///
/// composer.compose_form_field("name", "", true, "text").unwrap();
/// let token = composer.end_request().unwrap();
/// assert!(!token.is_empty());
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct FormUrlProcessor;

impl FormUrlProcessor {
    /// Processes the action URL of a form submitted with `method`.
    ///
    /// When the action needs a state, a request is begun and the action's
    /// own query parameters are composed into it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IllegalState`] if a state must be begun and the
    /// composer has no started page or already has an open request.
    pub fn process_action(
        &self,
        composer: &mut DataComposer<'_>,
        action: &str,
        method: Method,
    ) -> Result<FormAction, Error> {
        let config = composer.config();
        let mut data = UrlData::parse(action, composer.context());
        if !data.is_state_necessary(config, method) {
            return Ok(FormAction {
                url: action.to_string(),
                state_open: false,
            });
        }
        data.remove_param(config.state_parameter_name());

        composer.begin_request(Some(method), data.path())?;
        let query = composer.compose_query(&data.query())?;
        Ok(FormAction {
            url: data.render(&query, None),
            state_open: true,
        })
    }
}
