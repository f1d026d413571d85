//! Mount-point matching.
//!
//! # Responsibilities
//! - Decide whether a request path falls under a mount point
//! - Strip the mount point to get the path relative to the route
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - Matches respect segment boundaries: `/test` owns `/test` and
//!   `/test/...`, never `/testing`
//! - The root mount `/` owns everything
//! - No regex to guarantee O(n) matching

use crate::config::route::RoutePath;

/// Matches request paths below one mount point.
#[derive(Debug, Clone)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    /// Create a matcher for a normalized mount path.
    pub fn new(mount: &RoutePath) -> Self {
        let prefix = if mount.is_root() {
            String::new()
        } else {
            mount.as_str().to_string()
        };
        Self { prefix }
    }

    /// Length of the mount point, used to rank overlapping mounts.
    pub fn specificity(&self) -> usize {
        self.prefix.len()
    }

    /// The part of `path` below the mount point, always starting with `/`.
    pub fn strip<'a>(&self, path: &'a str) -> Option<&'a str> {
        let rest = path.strip_prefix(self.prefix.as_str())?;
        if rest.is_empty() {
            Some("/")
        } else if rest.starts_with('/') {
            Some(rest)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::route::normalize_route_path;

    fn matcher(mount: &str) -> PathPrefixMatcher {
        PathPrefixMatcher::new(&normalize_route_path(mount).unwrap())
    }

    #[test]
    fn test_path_matcher() {
        let matcher = matcher("/api");

        assert_eq!(matcher.strip("/api"), Some("/"));
        assert_eq!(matcher.strip("/api/"), Some("/"));
        assert_eq!(matcher.strip("/api/v1/items"), Some("/v1/items"));
        assert_eq!(matcher.strip("/images"), None);
        assert_eq!(matcher.strip("/apis"), None);
        assert_eq!(matcher.strip("/API"), None);
    }

    #[test]
    fn test_root_matcher_owns_everything() {
        let matcher = matcher("/");

        assert_eq!(matcher.strip("/"), Some("/"));
        assert_eq!(matcher.strip("/anything/at/all"), Some("/anything/at/all"));
        assert_eq!(matcher.specificity(), 0);
    }
}
