use std::fmt;

use http::Uri;

/// A parsed request target.
///
/// The path is kept as its `/`-separated segments so resource dispatch can
/// match a prefix and rewrite the target to the remaining tail. An absolute
/// target (`http://host/path`) also records its host for the `Host` header
/// cross-check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Target {
    segments: Vec<String>,
    host: Option<String>,
}

impl Target {
    /// Parses a request-line target. `None` when the bytes do not form a URI.
    pub fn parse(raw: &str) -> Option<Self> {
        let uri: Uri = raw.parse().ok()?;
        let segments = uri.path().split('/').map(str::to_string).collect();
        let host = uri.host().map(str::to_string);
        Some(Self { segments, host })
    }

    /// The path split on `/`. `/foo/bar` yields `["", "foo", "bar"]`.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn set_segments(&mut self, segments: Vec<String>) {
        self.segments = segments;
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_form_splits_into_segments() {
        let target = Target::parse("/hello.txt").unwrap();
        assert_eq!(target.segments(), ["", "hello.txt"]);
        assert_eq!(target.host(), None);
        assert_eq!(target.to_string(), "/hello.txt");
    }

    #[test]
    fn absolute_form_records_host() {
        let target = Target::parse("http://www.example.com/foo/bar").unwrap();
        assert_eq!(target.host(), Some("www.example.com"));
        assert_eq!(target.segments(), ["", "foo", "bar"]);
    }

    #[test]
    fn rewrite_to_tail() {
        let mut target = Target::parse("/foo/bar").unwrap();
        target.set_segments(vec!["bar".to_string()]);
        assert_eq!(target.segments(), ["bar"]);
        assert_eq!(target.to_string(), "bar");
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(Target::parse("http://exa mple/").is_none());
    }
}
