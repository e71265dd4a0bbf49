//! Route index: URI patterns mapped to handler files.
//!
//! Produced by an external route extractor as `.grounded/routes.jsonl`, one
//! route per line:
//!
//! ```json
//! {"method":"POST","uri":"/login","handlerPath":"app/Http/Controllers/Auth/LoginController.php","action":"login","name":"login"}
//! ```
//!
//! Malformed lines are skipped.

use std::path::Path;

use grk_db::JsonlStream;
use serde::{Deserialize, Serialize};

use crate::errors::GrkError;

/// One route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteEntry {
    /// HTTP method (upper case), or `None` for any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// URI pattern; `{param}`, `:param` and `*` segments match anything.
    pub uri: String,
    /// Project-relative path of the handler file.
    pub handler_path: String,
    /// Handler method or function name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// Route name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl RouteEntry {
    /// Whether a concrete URI (or another pattern) matches this route.
    pub fn matches_uri(&self, uri: &str) -> bool {
        let pattern = segments(&self.uri);
        let candidate = segments(uri);
        pattern.len() == candidate.len()
            && pattern
                .iter()
                .zip(&candidate)
                .all(|(p, c)| is_wildcard(p) || is_wildcard(c) || p.eq_ignore_ascii_case(c))
    }

    fn method_allows(&self, method: Option<&str>) -> bool {
        match (self.method.as_deref(), method) {
            (Some(own), Some(asked)) => own.eq_ignore_ascii_case(asked),
            _ => true,
        }
    }
}

fn segments(uri: &str) -> Vec<&str> {
    let path = uri.split(['?', '#']).next().unwrap_or(uri);
    path.split('/').filter(|s| !s.is_empty()).collect()
}

fn is_wildcard(segment: &str) -> bool {
    segment == "*" || segment.starts_with(':') || (segment.starts_with('{') && segment.ends_with('}'))
}

/// A route mention extracted from a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteMention {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    pub uri: String,
}

/// All routes of a project.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteIndex {
    entries: Vec<RouteEntry>,
}

impl RouteIndex {
    pub fn new(entries: Vec<RouteEntry>) -> Self {
        Self { entries }
    }

    /// Load the route index, or an empty one when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, GrkError> {
        if !path.exists() {
            tracing::debug!("No route index at {}", path.display());
            return Ok(Self::default());
        }
        let stream = JsonlStream::<RouteEntry>::open(path).map_err(|e| GrkError::RouteIndexLoad {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let entries: Vec<RouteEntry> = stream.collect();
        tracing::debug!("Loaded {} routes from {}", entries.len(), path.display());
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    /// Routes matching a URI mention (method-filtered when given).
    pub fn resolve(&self, mention: &RouteMention) -> Vec<&RouteEntry> {
        self.entries
            .iter()
            .filter(|r| r.method_allows(mention.method.as_deref()) && r.matches_uri(&mention.uri))
            .collect()
    }

    /// Routes whose name or action equals one of `terms` (case-insensitive).
    pub fn by_name_or_action(&self, terms: &[String]) -> Vec<&RouteEntry> {
        self.entries
            .iter()
            .filter(|r| {
                terms.iter().any(|t| {
                    r.name.as_deref().is_some_and(|n| n.eq_ignore_ascii_case(t))
                        || r.action.as_deref().is_some_and(|a| a.eq_ignore_ascii_case(t))
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn route(method: &str, uri: &str, handler: &str, name: Option<&str>) -> RouteEntry {
        RouteEntry {
            method: Some(method.to_string()),
            uri: uri.to_string(),
            handler_path: handler.to_string(),
            action: None,
            name: name.map(str::to_string),
        }
    }

    #[test]
    fn test_uri_matching() {
        let r = route("GET", "/users/{id}/orders", "app/OrdersController.php", None);
        assert!(r.matches_uri("/users/42/orders"));
        assert!(r.matches_uri("users/:id/orders"));
        assert!(r.matches_uri("/users/42/orders?page=2"));
        assert!(!r.matches_uri("/users/42"));
        assert!(!r.matches_uri("/teams/42/orders"));
    }

    #[test]
    fn test_resolve_filters_by_method() {
        let index = RouteIndex::new(vec![
            route("GET", "/login", "app/Auth/LoginController.php", Some("login.form")),
            route("POST", "/login", "app/Auth/LoginController.php", Some("login")),
            route("GET", "/cart", "app/Shop/CartController.php", Some("cart")),
        ]);
        let any = RouteMention {
            method: None,
            uri: "/login".to_string(),
        };
        assert_eq!(index.resolve(&any).len(), 2);

        let post = RouteMention {
            method: Some("post".to_string()),
            uri: "/login".to_string(),
        };
        let found = index.resolve(&post);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name.as_deref(), Some("login"));

        assert_eq!(index.by_name_or_action(&["CART".to_string()]).len(), 1);
    }

    #[test]
    fn test_load_skips_malformed_lines() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("routes.jsonl");
        fs::write(
            &path,
            "{\"method\":\"GET\",\"uri\":\"/\",\"handlerPath\":\"routes/web.php\"}\nnot json\n\n{\"uri\":\"/health\",\"handlerPath\":\"app/Health.php\"}\n",
        )
        .unwrap();
        let index = RouteIndex::load(&path).unwrap();
        assert_eq!(index.len(), 2);
        assert!(index.entries()[1].method.is_none());

        assert!(RouteIndex::load(&temp.path().join("missing.jsonl"))
            .unwrap()
            .is_empty());
    }
}
