use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::logging::ValidationLog;
use crate::request::Method;
use crate::session::SessionStore;

/// Everything the engine needs to know about the current HTTP request.
///
/// The context is passed explicitly to every composing and validating
/// operation; nothing is looked up from thread-local or global state.
/// Build one per request with [`RequestContext::builder`].
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use state_guard::{MemorySession, Method, RequestContext};
///
/// let ctx = RequestContext::builder(Arc::new(MemorySession::new()))
///     .request_id("req-1")
///     .method(Method::Post)
///     .context_path("/shop")
///     .target("/shop/cart%20items.do;jsessionid=ABC")
///     .param("qty", "2")
///     .build();
///
/// assert_eq!(ctx.target(), "/shop/cart items.do");
/// assert_eq!(ctx.relative_target(), "/cart items.do");
/// assert_eq!(ctx.parameter("qty"), Some(&["2".to_string()][..]));
/// ```
#[derive(Clone)]
pub struct RequestContext {
    request_id: String,
    method: Method,
    target: String,
    context_path: String,
    params: BTreeMap<String, Vec<String>>,
    ajax: bool,
    session: Arc<dyn SessionStore>,
}

impl RequestContext {
    /// Starts building a context for a request belonging to `session`.
    pub fn builder(session: Arc<dyn SessionStore>) -> RequestContextBuilder {
        RequestContextBuilder {
            request_id: None,
            method: Method::Get,
            target: String::from("/"),
            context_path: String::new(),
            params: BTreeMap::new(),
            ajax: false,
            session,
        }
    }

    /// Returns the request ID used to correlate log events.
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Returns the HTTP method.
    pub fn method(&self) -> Method {
        self.method
    }

    /// Returns the decoded request path, without session id path parameters.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Returns the application context path (`""` for the root context).
    pub fn context_path(&self) -> &str {
        &self.context_path
    }

    /// Returns the target relative to the context path.
    pub fn relative_target(&self) -> &str {
        strip_context_path(&self.target, &self.context_path)
    }

    /// Returns all values of the parameter called `name`.
    pub fn parameter(&self, name: &str) -> Option<&[String]> {
        self.params.get(name).map(Vec::as_slice)
    }

    /// Returns the first value of the parameter called `name`.
    pub fn first_parameter(&self, name: &str) -> Option<&str> {
        self.params
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Returns the request parameters, ordered by name.
    pub fn parameters(&self) -> &BTreeMap<String, Vec<String>> {
        &self.params
    }

    /// Returns `true` if the request was issued by client-side script.
    pub fn is_ajax(&self) -> bool {
        self.ajax
    }

    /// Returns the session the request belongs to.
    pub fn session(&self) -> &dyn SessionStore {
        self.session.as_ref()
    }

    /// Returns a logger bound to this request.
    pub fn log(&self) -> ValidationLog<'_> {
        ValidationLog::new(&self.request_id)
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Parameter values may be secrets.
        let names: Vec<&String> = self.params.keys().collect();
        f.debug_struct("RequestContext")
            .field("request_id", &self.request_id)
            .field("method", &self.method)
            .field("target", &self.target)
            .field("context_path", &self.context_path)
            .field("params", &names)
            .field("ajax", &self.ajax)
            .finish_non_exhaustive()
    }
}

/// Builder for [`RequestContext`].
pub struct RequestContextBuilder {
    request_id: Option<String>,
    method: Method,
    target: String,
    context_path: String,
    params: BTreeMap<String, Vec<String>>,
    ajax: bool,
    session: Arc<dyn SessionStore>,
}

impl RequestContextBuilder {
    /// Sets the request ID. A random one is generated when unset.
    pub fn request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    /// Sets the HTTP method (default `GET`).
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Sets the raw request path; it is percent-decoded and stripped of
    /// `;jsessionid=` path parameters.
    pub fn target(mut self, raw: &str) -> Self {
        self.target = decode_target(raw);
        self
    }

    /// Sets the application context path.
    pub fn context_path(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        self.context_path = path.trim_end_matches('/').to_string();
        self
    }

    /// Adds one value of a decoded request parameter.
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.entry(name.into()).or_default().push(value.into());
        self
    }

    /// Adds the parameters of an `application/x-www-form-urlencoded` string.
    pub fn query(mut self, query: &str) -> Self {
        for (name, value) in parse_query(query) {
            self.params.entry(name).or_default().push(value);
        }
        self
    }

    /// Marks the request as issued by client-side script.
    pub fn ajax(mut self, ajax: bool) -> Self {
        self.ajax = ajax;
        self
    }

    /// Builds the context.
    pub fn build(self) -> RequestContext {
        RequestContext {
            request_id: self
                .request_id
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            method: self.method,
            target: self.target,
            context_path: self.context_path,
            params: self.params,
            ajax: self.ajax,
            session: self.session,
        }
    }
}

/// Returns `path` without the leading `context_path`.
pub(crate) fn strip_context_path<'a>(path: &'a str, context_path: &str) -> &'a str {
    if context_path.is_empty() {
        return path;
    }
    match path.strip_prefix(context_path) {
        Some(rest) if rest.is_empty() => "/",
        Some(rest) if rest.starts_with('/') => rest,
        _ => path,
    }
}

fn decode_target(raw: &str) -> String {
    let without_session = match raw.find(";jsessionid=") {
        Some(start) => {
            let end = raw[start + 1..]
                .find(|c| c == ';' || c == '?' || c == '#')
                .map(|i| start + 1 + i)
                .unwrap_or(raw.len());
            format!("{}{}", &raw[..start], &raw[end..])
        }
        None => raw.to_string(),
    };
    decode_component(&without_session)
}

/// Percent-decodes one URL component, keeping the raw text if the result
/// is not UTF-8.
pub(crate) fn decode_component(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

/// Splits a query string into decoded `(name, value)` pairs, in order.
pub(crate) fn parse_query(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
            (
                decode_component(&name.replace('+', " ")),
                decode_component(&value.replace('+', " ")),
            )
        })
        .collect()
}
