//! Ant-style path matching.
//!
//! Patterns are matched segment by segment:
//!
//! - `?` matches one character
//! - `*` matches zero or more characters within a segment
//! - `**` matches zero or more segments
//! - `{name}` matches a segment part and captures it as `name`
//! - `{name:[a-z]+}` captures with a custom regular expression
//!
//! ```
//! use sluice_core::{AntPathMatcher, PathMatcher};
//!
//! let matcher = AntPathMatcher::new();
//! assert!(matcher.matches("/books/{id}", "/books/42"));
//! assert!(matcher.matches("/static/**", "/static/css/site.css"));
//! assert_eq!(
//!     matcher.extract_path_within_pattern("/static/**", "/static/css/site.css"),
//!     "css/site.css"
//! );
//! ```

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use regex::Regex;
use tracing::warn;

const SEPARATOR: char = '/';
const DOUBLE_WILDCARD: &str = "**";
const CATCH_ALL: &str = "/**";

/// Strategy for matching lookup paths against registered patterns.
pub trait PathMatcher: Send + Sync {
    /// Returns `true` if `path` contains pattern syntax.
    fn is_pattern(&self, path: &str) -> bool;

    /// Returns `true` if `path` matches `pattern`.
    fn matches(&self, pattern: &str, path: &str) -> bool;

    /// Returns the part of `path` matched by the pattern's wildcard segments.
    fn extract_path_within_pattern(&self, pattern: &str, path: &str) -> String;

    /// Returns the URI template variables of `path`, or `None` if it does not match.
    fn extract_uri_template_variables(
        &self,
        pattern: &str,
        path: &str,
    ) -> Option<HashMap<String, String>>;

    /// Returns a comparator ordering patterns from most to least specific for `path`.
    fn pattern_comparator<'a>(&'a self, path: &'a str) -> Box<dyn Fn(&str, &str) -> Ordering + 'a>;
}

/// A compiled pattern segment.
#[derive(Debug)]
struct SegmentMatcher {
    regex: Option<Regex>,
    literal: String,
    variables: Vec<String>,
}

impl SegmentMatcher {
    fn compile(segment: &str) -> Self {
        let mut expr = String::from("^");
        let mut variables = Vec::new();
        let mut literal = String::new();
        let mut dynamic = false;
        let mut chars = segment.char_indices().peekable();

        while let Some((i, c)) = chars.next() {
            match c {
                '?' => {
                    dynamic = true;
                    expr.push_str(&regex::escape(&literal));
                    literal.clear();
                    expr.push('.');
                }
                '*' => {
                    dynamic = true;
                    expr.push_str(&regex::escape(&literal));
                    literal.clear();
                    expr.push_str(".*");
                }
                '{' => {
                    let Some(end) = matching_brace(segment, i) else {
                        literal.push(c);
                        continue;
                    };
                    dynamic = true;
                    expr.push_str(&regex::escape(&literal));
                    literal.clear();

                    let body = &segment[i + 1..end];
                    let (name, pattern) = match body.split_once(':') {
                        Some((name, pattern)) => (name.trim(), pattern),
                        None => (body.trim(), "(?s).*"),
                    };
                    expr.push_str(&format!("(?P<v{}>{})", variables.len(), pattern));
                    variables.push(name.to_string());
                    while chars.peek().is_some_and(|(j, _)| *j <= end) {
                        chars.next();
                    }
                }
                _ => literal.push(c),
            }
        }

        if !dynamic {
            return Self {
                regex: None,
                literal,
                variables,
            };
        }

        expr.push_str(&regex::escape(&literal));
        expr.push('$');
        match Regex::new(&expr) {
            Ok(regex) => Self {
                regex: Some(regex),
                literal: String::new(),
                variables,
            },
            Err(e) => {
                warn!(segment, error = %e, "Invalid pattern segment, matching it literally");
                Self {
                    regex: None,
                    literal: segment.to_string(),
                    variables: Vec::new(),
                }
            }
        }
    }

    fn matches(&self, candidate: &str, variables: Option<&mut HashMap<String, String>>) -> bool {
        let Some(regex) = &self.regex else {
            return self.literal == candidate;
        };
        let Some(captures) = regex.captures(candidate) else {
            return false;
        };
        if let Some(out) = variables {
            for (i, name) in self.variables.iter().enumerate() {
                if let Some(m) = captures.name(&format!("v{i}")) {
                    out.insert(name.clone(), m.as_str().to_string());
                }
            }
        }
        true
    }
}

fn matching_brace(segment: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in segment[open..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + i);
                }
            }
            _ => {}
        }
    }
    None
}

fn tokenize(path: &str) -> Vec<&str> {
    path.split(SEPARATOR).filter(|s| !s.is_empty()).collect()
}

/// The default [`PathMatcher`].
///
/// Compiled segments are cached, so repeated matching against the same
/// patterns does not recompile regular expressions.
#[derive(Debug, Default)]
pub struct AntPathMatcher {
    cache: RwLock<HashMap<String, Arc<SegmentMatcher>>>,
}

impl AntPathMatcher {
    /// Creates a new matcher.
    pub fn new() -> Self {
        Self::default()
    }

    fn segment(&self, pattern: &str) -> Arc<SegmentMatcher> {
        if let Some(matcher) = self.cache.read().get(pattern) {
            return matcher.clone();
        }
        let compiled = Arc::new(SegmentMatcher::compile(pattern));
        self.cache
            .write()
            .entry(pattern.to_string())
            .or_insert(compiled)
            .clone()
    }

    fn match_segment(
        &self,
        pattern: &str,
        candidate: &str,
        variables: &mut Option<&mut HashMap<String, String>>,
    ) -> bool {
        self.segment(pattern)
            .matches(candidate, variables.as_deref_mut())
    }

    fn do_match(
        &self,
        pattern: &str,
        path: &str,
        mut variables: Option<&mut HashMap<String, String>>,
    ) -> bool {
        if path.starts_with(SEPARATOR) != pattern.starts_with(SEPARATOR) {
            return false;
        }

        let patt_dirs = tokenize(pattern);
        let path_dirs = tokenize(path);

        let mut patt_start: isize = 0;
        let mut patt_end: isize = patt_dirs.len() as isize - 1;
        let mut path_start: isize = 0;
        let mut path_end: isize = path_dirs.len() as isize - 1;

        // Match all segments up to the first `**`.
        while patt_start <= patt_end && path_start <= path_end {
            let patt_dir = patt_dirs[patt_start as usize];
            if patt_dir == DOUBLE_WILDCARD {
                break;
            }
            if !self.match_segment(patt_dir, path_dirs[path_start as usize], &mut variables) {
                return false;
            }
            patt_start += 1;
            path_start += 1;
        }

        if path_start > path_end {
            // Path is exhausted; only `*` or `**` may remain in the pattern.
            if patt_start > patt_end {
                return pattern.ends_with(SEPARATOR) == path.ends_with(SEPARATOR);
            }
            if patt_start == patt_end
                && patt_dirs[patt_start as usize] == "*"
                && path.ends_with(SEPARATOR)
            {
                return true;
            }
            return (patt_start..=patt_end).all(|i| patt_dirs[i as usize] == DOUBLE_WILDCARD);
        } else if patt_start > patt_end {
            return false;
        }

        // Match segments after the last `**`.
        while patt_start <= patt_end && path_start <= path_end {
            let patt_dir = patt_dirs[patt_end as usize];
            if patt_dir == DOUBLE_WILDCARD {
                break;
            }
            if !self.match_segment(patt_dir, path_dirs[path_end as usize], &mut variables) {
                return false;
            }
            patt_end -= 1;
            path_end -= 1;
        }

        if path_start > path_end {
            return (patt_start..=patt_end).all(|i| patt_dirs[i as usize] == DOUBLE_WILDCARD);
        }

        // Match the segments between pairs of `**`.
        while patt_start != patt_end && path_start <= path_end {
            let next_double = ((patt_start + 1)..=patt_end)
                .find(|&i| patt_dirs[i as usize] == DOUBLE_WILDCARD)
                .unwrap_or(patt_end);
            if next_double == patt_start + 1 {
                patt_start += 1;
                continue;
            }

            let patt_len = next_double - patt_start - 1;
            let path_len = path_end - path_start + 1;
            let mut found = None;
            'outer: for i in 0..=(path_len - patt_len) {
                for j in 0..patt_len {
                    let sub_patt = patt_dirs[(patt_start + j + 1) as usize];
                    let sub_path = path_dirs[(path_start + i + j) as usize];
                    if !self.match_segment(sub_patt, sub_path, &mut variables) {
                        continue 'outer;
                    }
                }
                found = Some(path_start + i);
                break;
            }

            let Some(found) = found else {
                return false;
            };
            patt_start = next_double;
            path_start = found + patt_len;
        }

        (patt_start..=patt_end).all(|i| patt_dirs[i as usize] == DOUBLE_WILDCARD)
    }
}

impl PathMatcher for AntPathMatcher {
    fn is_pattern(&self, path: &str) -> bool {
        path.contains('*') || path.contains('?') || (path.contains('{') && path.contains('}'))
    }

    fn matches(&self, pattern: &str, path: &str) -> bool {
        self.do_match(pattern, path, None)
    }

    fn extract_path_within_pattern(&self, pattern: &str, path: &str) -> String {
        let pattern_parts = tokenize(pattern);
        let path_parts = tokenize(path);
        let mut result = String::new();
        let mut path_started = false;

        let mut segment = 0;
        while segment < pattern_parts.len() {
            let part = pattern_parts[segment];
            if part.contains('*') || part.contains('?') {
                while segment < path_parts.len() {
                    if path_started || (segment == 0 && !pattern.starts_with(SEPARATOR)) {
                        result.push(SEPARATOR);
                    }
                    result.push_str(path_parts[segment]);
                    path_started = true;
                    segment += 1;
                }
            }
            segment += 1;
        }
        result
    }

    fn extract_uri_template_variables(
        &self,
        pattern: &str,
        path: &str,
    ) -> Option<HashMap<String, String>> {
        let mut variables = HashMap::new();
        self.do_match(pattern, path, Some(&mut variables))
            .then_some(variables)
    }

    fn pattern_comparator<'a>(&'a self, path: &'a str) -> Box<dyn Fn(&str, &str) -> Ordering + 'a> {
        Box::new(move |a, b| PatternInfo::new(a, path).cmp(&PatternInfo::new(b, path)))
    }
}

/// Specificity summary of a pattern, ordered most specific first.
#[derive(Debug, PartialEq, Eq)]
struct PatternInfo {
    catch_all: bool,
    exact: bool,
    prefix: bool,
    double_wildcards: usize,
    total_count: usize,
    length: usize,
    single_wildcards: usize,
    uri_vars: usize,
}

impl Ord for PatternInfo {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.catch_all, other.catch_all) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Greater,
            (false, true) => return Ordering::Less,
            (false, false) => {}
        }
        match (self.exact, other.exact) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            (false, false) => {}
        }
        // A `/**` prefix pattern only loses outright to patterns without `**`.
        match (self.prefix, other.prefix) {
            (true, true) => return other.length.cmp(&self.length),
            (true, false) if other.double_wildcards == 0 => return Ordering::Greater,
            (false, true) if self.double_wildcards == 0 => return Ordering::Less,
            _ => {}
        }
        self.total_count
            .cmp(&other.total_count)
            .then_with(|| other.length.cmp(&self.length))
            .then_with(|| self.single_wildcards.cmp(&other.single_wildcards))
            .then_with(|| self.uri_vars.cmp(&other.uri_vars))
    }
}

impl PartialOrd for PatternInfo {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PatternInfo {
    fn new(pattern: &str, path: &str) -> Self {
        let bytes = pattern.as_bytes();
        let (mut uri_vars, mut single_wildcards, mut double_wildcards) = (0, 0, 0);
        let mut pos = 0;
        while pos < bytes.len() {
            match bytes[pos] {
                b'{' => {
                    uri_vars += 1;
                    pos += 1;
                }
                b'*' if bytes.get(pos + 1) == Some(&b'*') => {
                    double_wildcards += 1;
                    pos += 2;
                }
                b'*' => {
                    if pos > 0 && &bytes[pos - 1..] != b".*" {
                        single_wildcards += 1;
                    }
                    pos += 1;
                }
                _ => pos += 1,
            }
        }

        let catch_all = pattern == CATCH_ALL;
        let prefix = !catch_all && pattern.ends_with(CATCH_ALL);
        let length = variable_free_length(pattern);

        Self {
            catch_all,
            exact: pattern == path,
            prefix,
            double_wildcards,
            total_count: uri_vars + single_wildcards + 2 * double_wildcards,
            length,
            single_wildcards,
            uri_vars,
        }
    }
}

/// Pattern length with every `{...}` variable counted as one character.
fn variable_free_length(pattern: &str) -> usize {
    let mut length = 0;
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        if c == '{' {
            for inner in chars.by_ref() {
                if inner == '}' {
                    break;
                }
            }
        }
        length += 1;
    }
    length
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(matcher: &AntPathMatcher, path: &str, patterns: &[&str]) -> Vec<String> {
        let cmp = matcher.pattern_comparator(path);
        let mut patterns: Vec<String> = patterns.iter().map(ToString::to_string).collect();
        patterns.sort_by(|a, b| cmp(a, b));
        patterns
    }

    #[test]
    fn test_literal_and_wildcards() {
        let m = AntPathMatcher::new();
        assert!(m.matches("/books", "/books"));
        assert!(!m.matches("/books", "/books/"));
        assert!(m.matches("/books/", "/books/"));
        assert!(m.matches("/b?oks", "/books"));
        assert!(m.matches("/books/*", "/books/42"));
        assert!(m.matches("/books/*", "/books/"));
        assert!(!m.matches("/books/*", "/books/42/reviews"));
        assert!(m.matches("/books/**", "/books"));
        assert!(m.matches("/books/**/reviews", "/books/42/x/reviews"));
        assert!(m.matches("/**/*.css", "/static/site.css"));
        assert!(!m.matches("books", "/books"));
    }

    #[test]
    fn test_double_wildcards_in_the_middle() {
        let m = AntPathMatcher::new();
        assert!(m.matches("/a/**/b/**/c", "/a/x/b/y/z/c"));
        assert!(m.matches("/a/**/**/c", "/a/c"));
        assert!(!m.matches("/a/**/b/**/c", "/a/x/y/c"));
    }

    #[test]
    fn test_template_variables() {
        let m = AntPathMatcher::new();
        let vars = m
            .extract_uri_template_variables("/books/{id}/pages/{page:\\d+}", "/books/rust/pages/12")
            .unwrap();
        assert_eq!(vars["id"], "rust");
        assert_eq!(vars["page"], "12");

        assert!(m.extract_uri_template_variables("/books/{id:\\d+}", "/books/rust").is_none());

        let vars = m
            .extract_uri_template_variables("/files/{name}.{ext}", "/files/report.pdf")
            .unwrap();
        assert_eq!(vars["name"], "report");
        assert_eq!(vars["ext"], "pdf");

        let vars = m
            .extract_uri_template_variables("/isbn/{code:\\d{3}}", "/isbn/978")
            .unwrap();
        assert_eq!(vars["code"], "978");
    }

    #[test]
    fn test_path_within_pattern() {
        let m = AntPathMatcher::new();
        assert_eq!(m.extract_path_within_pattern("/docs/*", "/docs/guide"), "guide");
        assert_eq!(
            m.extract_path_within_pattern("/docs/**", "/docs/guide/intro.html"),
            "guide/intro.html"
        );
        assert_eq!(m.extract_path_within_pattern("/docs/guide", "/docs/guide"), "");
        assert_eq!(
            m.extract_path_within_pattern("/*.html", "/docs/guide.html"),
            "docs/guide.html"
        );
    }

    #[test]
    fn test_comparator_prefers_specific_patterns() {
        let m = AntPathMatcher::new();
        assert_eq!(
            sorted(
                &m,
                "/books/42",
                &["/**", "/books/**", "/books/*", "/books/{id}", "/books/42"]
            ),
            vec!["/books/42", "/books/{id}", "/books/*", "/books/**", "/**"]
        );
    }

    #[test]
    fn test_comparator_longer_literal_wins() {
        let m = AntPathMatcher::new();
        assert_eq!(
            sorted(&m, "/a/b/c", &["/a/{x}/c", "/a/b/{y}", "/a/**"]),
            vec!["/a/{x}/c", "/a/b/{y}", "/a/**"]
        );
        assert_eq!(
            sorted(&m, "/x/y/z", &["/x/**", "/x/y/**"]),
            vec!["/x/y/**", "/x/**"]
        );
    }

    #[test]
    fn test_comparator_prefix_against_inner_double_wildcard() {
        let m = AntPathMatcher::new();
        assert_eq!(
            sorted(&m, "/books/42", &["/**/{id}", "/books/**"]),
            vec!["/books/**", "/**/{id}"]
        );
        assert_eq!(
            sorted(&m, "/books/42", &["/books/**", "/books/{id}"]),
            vec!["/books/{id}", "/books/**"]
        );
    }

    #[test]
    fn test_is_pattern() {
        let m = AntPathMatcher::new();
        assert!(m.is_pattern("/books/*"));
        assert!(m.is_pattern("/books/{id}"));
        assert!(!m.is_pattern("/books"));
    }
}
