use std::collections::HashMap;

use regex::Regex;

/// A declared route path compiled into an anchored regular expression.
///
/// Each `:name` segment becomes a named capture matching exactly one non-empty
/// path segment; any other segment is matched literally. A single trailing
/// slash on the request path is tolerated.
///
/// ```rust
/// # use opale::utils::RoutePattern;
/// let pattern = RoutePattern::new("/users/:id").unwrap();
/// let captures = pattern.captures("/users/42").unwrap();
/// assert_eq!(captures["id"], "42");
/// assert!(pattern.captures("/users/42/friends").is_none());
/// ```
#[derive(Debug, Clone)]
pub struct RoutePattern {
    regex: Regex,
    names: Vec<String>,
}

#[derive(Debug)]
enum PathSegment {
    Static(String),
    Variable(String),
}

impl PathSegment {
    const VARIABLE_PREFIX: char = ':';

    fn new(segment: &str) -> Result<PathSegment, String> {
        if let Some(name) = segment.strip_prefix(Self::VARIABLE_PREFIX) {
            if name.is_empty() {
                return Err("No name was provided for a variable segment".to_string());
            }

            if !is_identifier(name) {
                return Err(format!("`{}` is not a valid variable name", name));
            }

            Ok(PathSegment::Variable(name.to_string()))
        } else if segment.contains(Self::VARIABLE_PREFIX) {
            Err(format!("`{}` has a `:` that does not start the segment", segment))
        } else {
            Ok(PathSegment::Static(segment.to_string()))
        }
    }

    fn push_regex(&self, out: &mut String) {
        match self {
            PathSegment::Static(s) => out.push_str(&regex::escape(s)),
            PathSegment::Variable(name) => {
                out.push_str("(?P<");
                out.push_str(name);
                out.push_str(">[^/]+)");
            }
        }
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_') && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl RoutePattern {
    /// Compile `path_str`, failing with a description of the first invalid
    /// segment
    pub fn new(path_str: &str) -> Result<RoutePattern, String> {
        if !path_str.starts_with('/') {
            return Err("A route path should start with /".to_string());
        }

        let trimmed = path_str.trim_start_matches('/');
        let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);

        let mut source = String::from("^");
        let mut names: Vec<String> = Vec::new();

        if !trimmed.is_empty() {
            for raw in trimmed.split('/') {
                if raw.is_empty() {
                    return Err("A route path should not contain empty segments".to_string());
                }

                let segment = PathSegment::new(raw)?;
                if let PathSegment::Variable(name) = &segment {
                    if names.contains(name) {
                        return Err(format!("Variable `{}` is declared more than once", name));
                    }
                    names.push(name.clone());
                }

                source.push('/');
                segment.push_regex(&mut source);
            }
        }

        source.push_str("/?$");

        let regex = Regex::new(&source).map_err(|e| e.to_string())?;

        Ok(RoutePattern { regex, names })
    }

    /// Whether `path` matches the pattern
    #[inline]
    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// Match `path` against the pattern, returning the named segments
    pub fn captures(&self, path: &str) -> Option<HashMap<String, String>> {
        let caps = self.regex.captures(path)?;
        Some(
            self.names
                .iter()
                .filter_map(|name| caps.name(name).map(|m| (name.clone(), m.as_str().to_string())))
                .collect(),
        )
    }

    /// Names of the variable segments, in declaration order
    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// Extract the query parameters of `url` into a flat map.
///
/// `url` can be a full request target (`/path?a=1`) or a bare query string.
/// Values are form-url-decoded; on repeated keys the last value wins.
///
/// ```rust
/// # use opale::utils::parse_query;
/// let query = parse_query("/search?a=1&a=2&b=3");
/// assert_eq!(query["a"], "2");
/// assert_eq!(query["b"], "3");
/// assert!(parse_query("/search").is_empty());
/// ```
pub fn parse_query(url: &str) -> HashMap<String, String> {
    let query = match url.find('?') {
        Some(idx) => &url[idx + 1..],
        None if url.starts_with('/') => return HashMap::new(),
        None => url,
    };

    parse_query_string(query.split('#').next().unwrap_or_default())
}

/// Decode a bare query string (the part after `?`), last value wins
pub fn parse_query_string(query: &str) -> HashMap<String, String> {
    url::form_urlencoded::parse(query.as_bytes()).into_owned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_segment_is_captured() {
        let pattern = RoutePattern::new("/users/:id").unwrap();
        let captures = pattern.captures("/users/42").unwrap();
        assert_eq!(captures.get("id").map(String::as_str), Some("42"));
        assert_eq!(pattern.names(), &["id".to_string()]);
    }

    #[test]
    fn several_segments() {
        let pattern = RoutePattern::new("/orgs/:org/repos/:repo_name").unwrap();
        let captures = pattern.captures("/orgs/rust-lang/repos/regex").unwrap();
        assert_eq!(captures["org"], "rust-lang");
        assert_eq!(captures["repo_name"], "regex");
    }

    #[test]
    fn match_is_anchored() {
        let pattern = RoutePattern::new("/users/:id").unwrap();
        assert!(!pattern.is_match("/api/users/42"));
        assert!(!pattern.is_match("/users/42/extra"));
        assert!(!pattern.is_match("/users/"));
        assert!(pattern.is_match("/users/42/"));
    }

    #[test]
    fn static_segments_are_literal() {
        let pattern = RoutePattern::new("/files/a.b+c").unwrap();
        assert!(pattern.is_match("/files/a.b+c"));
        assert!(!pattern.is_match("/files/aXb+c"));
        assert!(!pattern.is_match("/Files/a.b+c"));
    }

    #[test]
    fn root() {
        let pattern = RoutePattern::new("/").unwrap();
        assert!(pattern.is_match("/"));
        assert!(!pattern.is_match("/x"));
    }

    #[test]
    fn malformed_patterns_are_rejected() {
        assert!(RoutePattern::new("users").is_err());
        assert!(RoutePattern::new("/users/:").is_err());
        assert!(RoutePattern::new("/users/a:b").is_err());
        assert!(RoutePattern::new("/users/:1d").is_err());
        assert!(RoutePattern::new("/users/:id/:id").is_err());
        assert!(RoutePattern::new("/users//:id").is_err());
    }

    #[test]
    fn query_last_value_wins() {
        let query = parse_query("/things?a=1&a=2&b=3");
        assert_eq!(query.len(), 2);
        assert_eq!(query["a"], "2");
        assert_eq!(query["b"], "3");
    }

    #[test]
    fn query_is_decoded() {
        let query = parse_query("q=hello+world&path=%2Ftmp&flag");
        assert_eq!(query["q"], "hello world");
        assert_eq!(query["path"], "/tmp");
        assert_eq!(query["flag"], "");
    }

    #[test]
    fn absent_query_is_empty() {
        assert!(parse_query("/things").is_empty());
        assert!(parse_query("/things?").is_empty());
        assert!(parse_query("").is_empty());
    }
}
