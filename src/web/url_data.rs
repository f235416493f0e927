use crate::config::Config;
use crate::context::{decode_component, parse_query, strip_context_path, RequestContext};
use crate::request::Method;

/// A URL found in a rendered response, split into the parts the engine
/// cares about.
///
/// Relative paths are resolved against the current request target so the
/// recorded action is the path the client will actually request.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use state_guard::{MemorySession, RequestContext, UrlData};
///
/// let ctx = RequestContext::builder(Arc::new(MemorySession::new()))
///     .context_path("/shop")
///     .target("/shop/cart/view.do")
///     .build();
///
/// let url = UrlData::parse("item.do?id=7#top", &ctx);
/// assert_eq!(url.path(), "/shop/cart/item.do");
/// assert_eq!(url.relative_path(), "/cart/item.do");
/// assert_eq!(url.params(), &[("id".to_string(), "7".to_string())]);
/// assert_eq!(url.anchor(), Some("top"));
/// assert!(!url.is_external());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlData {
    base: String,
    external: bool,
    path: String,
    relative_path: String,
    params: Vec<(String, String)>,
    anchor: Option<String>,
}

impl UrlData {
    /// Parses `url` as rendered in the response to `ctx`.
    pub fn parse(url: &str, ctx: &RequestContext) -> Self {
        let (rest, anchor) = match url.split_once('#') {
            Some((rest, anchor)) => (rest, Some(anchor.to_string())),
            None => (url, None),
        };
        let (base, query) = rest.split_once('?').unwrap_or((rest, ""));

        if is_external(base) {
            return Self {
                base: base.to_string(),
                external: true,
                path: base.to_string(),
                relative_path: base.to_string(),
                params: parse_query(query),
                anchor,
            };
        }

        let path = resolve(ctx.target(), &decode_component(base));
        let relative_path = strip_context_path(&path, ctx.context_path()).to_string();
        Self {
            base: base.to_string(),
            external: false,
            path,
            relative_path,
            params: parse_query(query),
            anchor,
        }
    }

    /// Returns `true` for URLs with a scheme or host; those leave the
    /// application and are never given a state.
    pub fn is_external(&self) -> bool {
        self.external
    }

    /// Returns the absolute decoded path, context path included.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the path relative to the context path.
    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }

    /// Returns the decoded query parameters in order.
    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    /// Returns the fragment, without `#`.
    pub fn anchor(&self) -> Option<&str> {
        self.anchor.as_deref()
    }

    /// Drops every occurrence of parameter `name`.
    pub(crate) fn remove_param(&mut self, name: &str) {
        self.params.retain(|(n, _)| n != name);
    }

    /// Returns the parameters as a raw query string.
    pub(crate) fn query(&self) -> String {
        self.params
            .iter()
            .map(|(name, value)| format!("{}={}", urlencoding::encode(name), urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Returns `true` if requests to this URL with `method` must carry a
    /// state token.
    pub fn is_state_necessary(&self, config: &Config, method: Method) -> bool {
        let path = self.relative_path();
        !self.external
            && !config.is_start_page(path, method)
            && !config.has_extension_to_exclude(path)
            && config.is_protected_url(path)
    }

    /// Renders the URL as written, with `query` and an optional state
    /// parameter appended.
    pub(crate) fn render(&self, query: &str, state: Option<(&str, &str)>) -> String {
        let mut url = self.base.clone();
        let mut separator = '?';
        if !query.is_empty() {
            url.push(separator);
            url.push_str(query);
            separator = '&';
        }
        if let Some((name, token)) = state {
            url.push(separator);
            url.push_str(&urlencoding::encode(name));
            url.push('=');
            url.push_str(&urlencoding::encode(token));
        }
        if let Some(anchor) = &self.anchor {
            url.push('#');
            url.push_str(anchor);
        }
        url
    }
}

fn is_external(base: &str) -> bool {
    if base.starts_with("//") {
        return true;
    }
    match base.find(':') {
        Some(colon) => {
            let scheme = &base[..colon];
            !scheme.is_empty()
                && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}

/// Resolves `path` against the directory of `current`, folding `.` and
/// `..` segments.
fn resolve(current: &str, path: &str) -> String {
    let joined = if path.starts_with('/') {
        path.to_string()
    } else if path.is_empty() {
        current.to_string()
    } else {
        let dir = current.rfind('/').map_or("", |i| &current[..i]);
        format!("{}/{}", dir, path)
    };

    let mut segments: Vec<&str> = Vec::new();
    for segment in joined.split('/').skip(1) {
        match segment {
            "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    let trailing = matches!(joined.rsplit('/').next(), Some("." | ".."));
    let mut resolved = format!("/{}", segments.join("/"));
    if trailing && !resolved.ends_with('/') {
        resolved.push('/');
    }
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::session::MemorySession;

    fn ctx(context_path: &str, target: &str) -> RequestContext {
        RequestContext::builder(Arc::new(MemorySession::new()))
            .context_path(context_path)
            .target(target)
            .build()
    }

    #[test]
    fn absolute_urls_keep_their_path() {
        let url = UrlData::parse("/app/list.do?a=1&b=x%20y", &ctx("/app", "/app/index.do"));
        assert_eq!(url.path(), "/app/list.do");
        assert_eq!(url.relative_path(), "/list.do");
        assert_eq!(
            url.params(),
            &[
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "x y".to_string())
            ]
        );
        assert_eq!(url.anchor(), None);
    }

    #[test]
    fn relative_urls_resolve_against_the_target() {
        let c = ctx("", "/a/b/page.do");
        assert_eq!(UrlData::parse("next.do", &c).path(), "/a/b/next.do");
        assert_eq!(UrlData::parse("../up.do", &c).path(), "/a/up.do");
        assert_eq!(UrlData::parse("./same.do", &c).path(), "/a/b/same.do");
        assert_eq!(UrlData::parse("..", &c).path(), "/a/");
        assert_eq!(UrlData::parse("?x=1", &c).path(), "/a/b/page.do");
    }

    #[test]
    fn external_urls_are_detected() {
        let c = ctx("", "/index.do");
        assert!(UrlData::parse("https://example.com/a", &c).is_external());
        assert!(UrlData::parse("//cdn.example.com/lib.js", &c).is_external());
        assert!(UrlData::parse("mailto:someone@example.com", &c).is_external());
        assert!(!UrlData::parse("/a.do", &c).is_external());
        assert!(!UrlData::parse("a.do", &c).is_external());
    }

    #[test]
    fn render_appends_query_state_and_anchor() {
        let url = UrlData::parse("list.do#end", &ctx("", "/index.do"));
        assert_eq!(url.render("", None), "list.do#end");
        assert_eq!(url.render("p=0", Some(("_STATE_ID_", "3-0-ab"))), "list.do?p=0&_STATE_ID_=3-0-ab#end");
        assert_eq!(url.render("", Some(("_STATE_ID_", "3-0-ab"))), "list.do?_STATE_ID_=3-0-ab#end");
    }

    #[test]
    fn state_necessity_follows_config() {
        let config = Config::builder()
            .start_page("/", Some(Method::Get))
            .excluded_extension(".css")
            .build()
            .unwrap();
        let c = ctx("", "/index.do");

        assert!(UrlData::parse("/list.do", &c).is_state_necessary(&config, Method::Get));
        assert!(!UrlData::parse("/", &c).is_state_necessary(&config, Method::Get));
        assert!(UrlData::parse("/", &c).is_state_necessary(&config, Method::Post));
        assert!(!UrlData::parse("/site.css", &c).is_state_necessary(&config, Method::Get));
        assert!(!UrlData::parse("http://x.org/a", &c).is_state_necessary(&config, Method::Get));
    }

    #[test]
    fn remove_param_drops_every_occurrence() {
        let mut url = UrlData::parse("/a.do?_STATE_ID_=1&x=2&_STATE_ID_=3", &ctx("", "/"));
        url.remove_param("_STATE_ID_");
        assert_eq!(url.query(), "x=2");
    }
}
