use crate::composer::DataComposer;
use crate::error::Error;
use crate::request::Method;

use super::UrlData;

/// Adds state tokens to links and redirects.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use state_guard::{Config, LinkUrlProcessor, MemorySession, RequestContext, StateGuard};
///
/// let guard = StateGuard::new(Config::default());
/// let ctx = RequestContext::builder(Arc::new(MemorySession::new()))
///     .target("/index.do")
///     .build();
/// let mut composer = guard.composer(&ctx);
/// composer.start_page().unwrap();
///
/// let url = LinkUrlProcessor.process_url(&mut composer, "/detail.do?id=4711").unwrap();
/// assert!(url.starts_with("/detail.do?id=0&_STATE_ID_="));
///
/// let external = LinkUrlProcessor.process_url(&mut composer, "https://example.org/").unwrap();
/// assert_eq!(external, "https://example.org/");
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct LinkUrlProcessor;

impl LinkUrlProcessor {
    /// Returns `url` as it must be rendered.
    ///
    /// URLs that need a state get a GET state recording their query
    /// parameters; the rendered URL carries the substituted values and the
    /// state parameter. Other URLs are returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IllegalState`] if a state must be composed and the
    /// composer has no started page or already has an open request.
    pub fn process_url(&self, composer: &mut DataComposer<'_>, url: &str) -> Result<String, Error> {
        let config = composer.config();
        let state_param = config.state_parameter_name();

        let mut data = UrlData::parse(url, composer.context());
        if !data.is_state_necessary(config, Method::Get) {
            return Ok(url.to_string());
        }
        data.remove_param(state_param);
        if data.params().is_empty() && config.avoid_validation_in_urls_without_params() {
            return Ok(url.to_string());
        }

        composer.begin_request(Some(Method::Get), data.path())?;
        let query = composer.compose_query(&data.query())?;
        let token = composer.end_request()?;
        Ok(data.render(&query, Some((state_param, &token))))
    }
}
