use crate::config::ActionMatching;
use crate::context::strip_context_path;

/// Canonical form of an action path for comparison.
///
/// Query string and fragment are dropped and a trailing `/` is ignored.
/// The context path and the last segment's extension are removed when
/// `matching` asks for it.
pub(crate) fn normalize_action(path: &str, context_path: &str, matching: ActionMatching) -> String {
    let mut path = path
        .split(|c| c == '?' || c == '#')
        .next()
        .unwrap_or(path);
    if matching.strip_context_path {
        path = strip_context_path(path, context_path);
    }
    if path.len() > 1 {
        path = path.trim_end_matches('/');
        if path.is_empty() {
            path = "/";
        }
    }
    if matching.ignore_extension {
        let segment_start = path.rfind('/').map_or(0, |i| i + 1);
        if let Some(dot) = path[segment_start..].rfind('.') {
            if dot > 0 {
                path = &path[..segment_start + dot];
            }
        }
    }
    path.to_string()
}
