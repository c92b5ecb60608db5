use std::collections::HashMap;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum PatternError {
    #[error("pattern must start with '/': {0}")]
    NotAbsolute(String),
    #[error("empty parameter name in pattern: {0}")]
    EmptyParam(String),
    #[error("'*' is only allowed as the last segment: {0}")]
    MisplacedSplat(String),
}

#[derive(Debug, Clone, PartialEq)]
enum PathSegment {
    Static(String),
    Param(String),
}

/// A parsed path pattern.
///
/// Supports:
/// - Static segments: "/go/offers"
/// - Dynamic parameters: "/go/{slug}"
/// - Trailing splat: "/static/*"
///
/// Leading and trailing slashes are not significant on either side of a match.
#[derive(Debug, Clone, PartialEq)]
pub struct PathPattern {
    segments: Vec<PathSegment>,
    has_trailing_splat: bool,
}

impl PathPattern {
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        let trimmed = pattern.trim();
        if !trimmed.starts_with('/') {
            return Err(PatternError::NotAbsolute(pattern.to_string()));
        }

        let mut normalized = trimmed.trim_matches('/');
        let mut has_trailing_splat = false;
        if normalized == "*" {
            has_trailing_splat = true;
            normalized = "";
        } else if let Some(stripped) = normalized.strip_suffix("/*") {
            has_trailing_splat = true;
            normalized = stripped;
        }

        let mut segments = Vec::new();
        for s in normalized.split('/').filter(|s| !s.is_empty()) {
            if s == "*" {
                return Err(PatternError::MisplacedSplat(pattern.to_string()));
            }
            match s.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                Some("") => return Err(PatternError::EmptyParam(pattern.to_string())),
                Some(name) => segments.push(PathSegment::Param(name.to_string())),
                None => segments.push(PathSegment::Static(s.to_string())),
            }
        }

        Ok(PathPattern {
            segments,
            has_trailing_splat,
        })
    }

    /// Names of the dynamic parameters, in pattern order.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            PathSegment::Param(name) => Some(name.as_str()),
            PathSegment::Static(_) => None,
        })
    }

    /// Returns the captured parameters if `request_path` matches.
    pub fn matches<'a>(&self, request_path: &'a str) -> Option<HashMap<String, &'a str>> {
        let request_segments: Vec<&'a str> = request_path
            .trim()
            .trim_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();

        if request_segments.len() < self.segments.len()
            || (!self.has_trailing_splat && request_segments.len() != self.segments.len())
        {
            return None;
        }

        let mut params = HashMap::new();
        for (seg, req_segment) in self.segments.iter().zip(request_segments) {
            match seg {
                PathSegment::Static(s) if s != req_segment => return None,
                PathSegment::Static(_) => {}
                PathSegment::Param(name) => {
                    params.insert(name.clone(), req_segment);
                }
            }
        }

        Some(params)
    }
}

#[derive(Debug, PartialEq)]
pub struct PatternMatch<'a, A> {
    pub params: HashMap<String, &'a str>,
    pub action: &'a A,
}

/// Ordered list of patterns; the first match wins.
#[derive(Debug)]
pub struct PatternSet<A> {
    patterns: Vec<(PathPattern, A)>,
}

impl<A> PatternSet<A> {
    pub fn new(patterns: Vec<(PathPattern, A)>) -> Self {
        Self { patterns }
    }

    pub fn resolve<'a>(&'a self, path: &'a str) -> Option<PatternMatch<'a, A>> {
        self.patterns.iter().find_map(|(pattern, action)| {
            pattern
                .matches(path)
                .map(|params| PatternMatch { params, action })
        })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_path() {
        let pattern = PathPattern::parse("/links/").unwrap();
        assert!(pattern.matches("/links").is_some(), "exact path");
        assert!(pattern.matches("/links/").is_some(), "trailing slash");
        assert!(pattern.matches("/links/2").is_none(), "extra segment");
        assert!(pattern.matches("/").is_none(), "missing segment");
    }

    #[test]
    fn test_slug_param() {
        let pattern = PathPattern::parse("/{slug}").unwrap();
        let params = pattern.matches("/spring-sale").unwrap();
        assert_eq!(params.get("slug").copied(), Some("spring-sale"));

        assert!(pattern.matches("/").is_none());
        assert!(pattern.matches("/a/b").is_none());
        assert_eq!(pattern.param_names().collect::<Vec<_>>(), vec!["slug"]);
    }

    #[test]
    fn test_prefixed_slug_param() {
        let pattern = PathPattern::parse("/go/{slug}").unwrap();
        let params = pattern.matches("/go/abc").unwrap();
        assert_eq!(params.get("slug").copied(), Some("abc"));
        assert!(pattern.matches("/other/abc").is_none());
    }

    #[test]
    fn test_trailing_splat() {
        let pattern = PathPattern::parse("/static/*").unwrap();
        assert!(pattern.matches("/static").is_some());
        assert!(pattern.matches("/static/css/app.css").is_some());
        assert!(pattern.matches("/other").is_none());

        let everything = PathPattern::parse("/*").unwrap();
        assert!(everything.matches("/").is_some());
        assert!(everything.matches("/anything/at/all").is_some());
    }

    #[test]
    fn test_invalid_patterns() {
        assert_eq!(
            PathPattern::parse("go/{slug}"),
            Err(PatternError::NotAbsolute("go/{slug}".into()))
        );
        assert_eq!(
            PathPattern::parse("/go/{}"),
            Err(PatternError::EmptyParam("/go/{}".into()))
        );
        assert_eq!(
            PathPattern::parse("/*/x"),
            Err(PatternError::MisplacedSplat("/*/x".into()))
        );
    }

    #[test]
    fn test_pattern_set_first_match_wins() {
        let set = PatternSet::new(vec![
            (PathPattern::parse("/go/{slug}").unwrap(), "prefixed"),
            (PathPattern::parse("/{slug}").unwrap(), "bare"),
        ]);

        let m = set.resolve("/go/abc").unwrap();
        assert_eq!(m.action, &"prefixed");

        let m = set.resolve("/abc").unwrap();
        assert_eq!(m.action, &"bare");
        assert_eq!(m.params.get("slug").copied(), Some("abc"));

        assert!(set.resolve("/a/b/c").is_none());
    }
}
