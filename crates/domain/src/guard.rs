//! Navigation guard
//!
//! Decides whether a navigation may proceed or must be redirected to the
//! login view, based only on whether an access credential is held and on
//! the target route's `requires_auth` flag.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Metadata declared on a route.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteMeta {
    /// Whether the route may only be shown to an authenticated session.
    #[serde(default)]
    pub requires_auth: bool,
}

impl RouteMeta {
    /// Metadata for a route that needs an authenticated session.
    #[must_use]
    pub const fn protected() -> Self {
        Self {
            requires_auth: true,
        }
    }

    /// Metadata for a route anyone may visit.
    #[must_use]
    pub const fn public() -> Self {
        Self {
            requires_auth: false,
        }
    }
}

/// Outcome of a guard check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Navigation continues to the requested path.
    Proceed,
    /// Navigation is redirected to the login view.
    RedirectToLogin {
        /// Path of the login view.
        login_path: String,
        /// The path originally requested.
        return_to: String,
    },
}

/// Authentication check applied before navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteGuard {
    login_path: String,
}

impl RouteGuard {
    /// Creates a guard redirecting to `login_path`.
    #[must_use]
    pub fn new(login_path: impl Into<String>) -> Self {
        Self {
            login_path: login_path.into(),
        }
    }

    /// Returns the login path.
    #[must_use]
    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    /// Decides whether navigation to `path` may proceed.
    #[must_use]
    pub fn check(&self, path: &str, route: RouteMeta, has_access: bool) -> GuardDecision {
        if !route.requires_auth || has_access || path == self.login_path {
            return GuardDecision::Proceed;
        }
        GuardDecision::RedirectToLogin {
            login_path: self.login_path.clone(),
            return_to: path.to_string(),
        }
    }
}

impl Default for RouteGuard {
    fn default() -> Self {
        Self::new("/login")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum RoutePattern {
    Exact(String),
    Prefix(String),
}

impl RoutePattern {
    fn parse(pattern: &str) -> DomainResult<Self> {
        if !pattern.starts_with('/') {
            return Err(DomainError::InvalidRoutePattern(pattern.to_string()));
        }
        match pattern.strip_suffix("/*") {
            Some(prefix) if !prefix.contains('*') => Ok(Self::Prefix(prefix.to_string())),
            Some(_) => Err(DomainError::InvalidRoutePattern(pattern.to_string())),
            None if pattern.contains('*') => {
                Err(DomainError::InvalidRoutePattern(pattern.to_string()))
            }
            None => Ok(Self::Exact(pattern.to_string())),
        }
    }

    /// Match specificity; `None` when the pattern does not match.
    fn specificity(&self, path: &str) -> Option<usize> {
        match self {
            Self::Exact(exact) => (exact == path).then_some(usize::MAX),
            Self::Prefix(prefix) => {
                let rest = path.strip_prefix(prefix.as_str())?;
                (rest.is_empty() || rest.starts_with('/') || prefix.is_empty())
                    .then_some(prefix.len())
            }
        }
    }
}

/// Table mapping path patterns to route metadata.
///
/// Patterns are either exact (`/customer/list`) or a trailing wildcard
/// (`/customer/*`, matching `/customer` and everything below it). Exact
/// matches win over wildcards; among wildcards the longest prefix wins.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<(RoutePattern, RouteMeta)>,
}

impl RouteTable {
    /// Creates an empty table.
    #[must_use]
    pub const fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Registers a route pattern.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::InvalidRoutePattern`] if the pattern is not
    /// rooted or uses a wildcard anywhere but the final segment.
    pub fn insert(&mut self, pattern: &str, meta: RouteMeta) -> DomainResult<()> {
        self.routes.push((RoutePattern::parse(pattern)?, meta));
        Ok(())
    }

    /// Registers a route pattern, builder style.
    ///
    /// # Errors
    ///
    /// See [`RouteTable::insert`].
    pub fn with(mut self, pattern: &str, meta: RouteMeta) -> DomainResult<Self> {
        self.insert(pattern, meta)?;
        Ok(self)
    }

    /// Finds the metadata of the most specific matching route.
    #[must_use]
    pub fn resolve(&self, path: &str) -> Option<RouteMeta> {
        self.routes
            .iter()
            .filter_map(|(pattern, meta)| pattern.specificity(path).map(|s| (s, *meta)))
            .max_by_key(|(specificity, _)| *specificity)
            .map(|(_, meta)| meta)
    }

    /// Returns the number of registered routes.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns true if no routes are registered.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn admin_routes() -> RouteTable {
        RouteTable::new()
            .with("/", RouteMeta::public())
            .unwrap()
            .with("/login", RouteMeta::public())
            .unwrap()
            .with("/customer/*", RouteMeta::protected())
            .unwrap()
            .with("/customer/noti", RouteMeta::public())
            .unwrap()
    }

    #[test]
    fn test_guard_redirects_unauthenticated_on_protected_route() {
        let guard = RouteGuard::default();
        assert_eq!(
            guard.check("/customer/list", RouteMeta::protected(), false),
            GuardDecision::RedirectToLogin {
                login_path: "/login".to_string(),
                return_to: "/customer/list".to_string(),
            }
        );
    }

    #[test]
    fn test_guard_proceeds_when_allowed() {
        let guard = RouteGuard::new("/signin");
        assert_eq!(
            guard.check("/customer/list", RouteMeta::protected(), true),
            GuardDecision::Proceed
        );
        assert_eq!(
            guard.check("/", RouteMeta::public(), false),
            GuardDecision::Proceed
        );
        assert_eq!(
            guard.check("/signin", RouteMeta::protected(), false),
            GuardDecision::Proceed
        );
    }

    #[test]
    fn test_table_prefers_exact_then_longest_prefix() {
        let table = admin_routes();
        assert_eq!(table.resolve("/customer/list"), Some(RouteMeta::protected()));
        assert_eq!(table.resolve("/customer"), Some(RouteMeta::protected()));
        assert_eq!(table.resolve("/customer/noti"), Some(RouteMeta::public()));
        assert_eq!(table.resolve("/customers"), None);
        assert_eq!(table.resolve("/"), Some(RouteMeta::public()));
        assert_eq!(table.len(), 4);
    }

    #[test]
    fn test_invalid_patterns_rejected() {
        let mut table = RouteTable::new();
        assert!(table.insert("customer", RouteMeta::public()).is_err());
        assert!(table.insert("/a/*/b", RouteMeta::public()).is_err());
        assert!(table.insert("/a*", RouteMeta::public()).is_err());
        assert!(table.is_empty());
    }
}
