//! Route path syntax. Routes are registered with `:name` parameters and
//! `*name` wildcards; the router and the document each get their own form.

use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::Regex;

static PARAM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([:*])([A-Za-z0-9_]+)").expect("path parameter pattern is valid")
});

static ROUTER_PARAM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{(\*?)[^}]+\}").expect("router parameter pattern is valid")
});

/// `/users/:id/*rest` → `/users/{id}/{*rest}`
pub fn router_path(path: &str) -> Cow<'_, str> {
    PARAM.replace_all(path, |caps: &regex::Captures<'_>| match &caps[1] {
        "*" => format!("{{*{}}}", &caps[2]),
        _ => format!("{{{}}}", &caps[2]),
    })
}

/// `/users/:id/*rest` → `/users/{id}/{rest}`
pub fn document_path(path: &str) -> Cow<'_, str> {
    PARAM.replace_all(path, "{$2}")
}

/// A router path with its parameter names erased: `/users/{id}` →
/// `/users/{}`. Two different paths with the same key cannot share a router.
pub(crate) fn match_key(router_path: &str) -> Cow<'_, str> {
    ROUTER_PARAM.replace_all(router_path, "{$1}")
}

/// Joins a mount or group prefix with a route path.
pub fn join(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    match (prefix.is_empty(), path) {
        (true, "") => "/".to_owned(),
        (true, _) => path.to_owned(),
        (false, "" | "/") => prefix.to_owned(),
        (false, _) if path.starts_with('/') => format!("{prefix}{path}"),
        (false, _) => format!("{prefix}/{path}"),
    }
}
