//! Pattern evaluation against request headers

use http::HeaderMap;
use http::header::HOST;

use crate::model::{Pattern, PatternKind};

impl Pattern {
    /// Check whether a request falls into the pool guarded by this pattern.
    ///
    /// A `header` pattern matches when some header's value equals the pattern
    /// value, whatever the header's name. Only the first value of a repeated
    /// header is compared. The `Host` header is routing input for service
    /// resolution and is not considered here.
    pub fn matches(&self, headers: &HeaderMap) -> bool {
        match &self.kind {
            PatternKind::Header => headers
                .keys()
                .filter(|name| **name != HOST)
                .filter_map(|name| headers.get(name))
                .any(|value| value.as_bytes() == self.value.as_bytes()),
            PatternKind::Unsupported(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_matches_value_under_any_name() {
        let pattern = Pattern::header("debug-token");

        assert!(pattern.matches(&headers(&[("x-debug", "debug-token")])));
        assert!(pattern.matches(&headers(&[("cookie", "debug-token")])));
        assert!(!pattern.matches(&headers(&[("debug-token", "yes")])));
        assert!(!pattern.matches(&headers(&[("x-debug", "debug-token-2")])));
        assert!(!pattern.matches(&HeaderMap::new()));
    }

    #[test]
    fn test_repeated_header_compares_first_value_only() {
        let repeated = headers(&[("x-group", "alpha"), ("x-group", "beta")]);

        assert!(Pattern::header("alpha").matches(&repeated));
        assert!(!Pattern::header("beta").matches(&repeated));
    }

    #[test]
    fn test_host_header_is_ignored() {
        let pattern = Pattern::header("a.com");
        assert!(!pattern.matches(&headers(&[("host", "a.com")])));
    }

    #[test]
    fn test_unsupported_kind_never_matches() {
        let pattern = Pattern {
            kind: PatternKind::Unsupported("ip".to_string()),
            value: "debug-token".to_string(),
        };
        assert!(!pattern.matches(&headers(&[("x-debug", "debug-token")])));
    }
}
