//! Path template compilation and matching.

use std::collections::HashMap;

use regex::Regex;

use crate::error::{Result, RouterError};

/// A segment in a path template.
#[derive(Debug, Clone)]
pub enum PathSegment {
    /// A literal string segment.
    Literal(String),
    /// A parameter segment (e.g., `{id}`).
    Param(String),
}

/// A compiled path template for matching request paths.
///
/// A `{name}` segment captures one or more non-`/` characters under the
/// name `name`; the whole template is anchored, so `/users/{id}` matches
/// `/users/42` but not `/users/42/edit`.
#[derive(Debug, Clone)]
pub struct PathPattern {
    /// The original template string.
    template: String,
    /// Parsed segments, used for reverse URL generation.
    segments: Vec<PathSegment>,
    /// Compiled anchored regex.
    regex: Regex,
    /// Parameter names in order of appearance.
    param_names: Vec<String>,
}

impl PathPattern {
    /// Compiles a path template.
    ///
    /// # Example
    ///
    /// ```
    /// use lattice_router::PathPattern;
    ///
    /// let pattern = PathPattern::new("/posts/{id}/comments/{comment_id}").unwrap();
    /// let params = pattern.match_path("/posts/123/comments/456").unwrap();
    /// assert_eq!(params.get("id").map(String::as_str), Some("123"));
    /// assert_eq!(params.get("comment_id").map(String::as_str), Some("456"));
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::InvalidPattern`] when the template compiles
    /// to an invalid expression (e.g. the same parameter name twice).
    pub fn new(template: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut param_names = Vec::new();
        let mut regex_parts = Vec::new();

        for part in template.split('/') {
            if let Some(name) = param_segment(part) {
                segments.push(PathSegment::Param(name.to_string()));
                param_names.push(name.to_string());
                regex_parts.push(format!("(?P<{name}>[^/]+)"));
            } else {
                // Empty segments are kept so that leading and trailing
                // slashes survive reverse URL generation.
                segments.push(PathSegment::Literal(part.to_string()));
                regex_parts.push(regex::escape(part));
            }
        }

        let regex_str = format!("^{}$", regex_parts.join("/"));
        let regex = Regex::new(&regex_str)
            .map_err(|e| RouterError::InvalidPattern(format!("{template}: {e}")))?;

        Ok(Self {
            template: template.to_string(),
            segments,
            regex,
            param_names,
        })
    }

    /// Attempts to match a request path against this template.
    ///
    /// Returns the captured parameters if the path matches.
    #[must_use]
    pub fn match_path(&self, path: &str) -> Option<HashMap<String, String>> {
        let caps = self.regex.captures(path)?;

        let mut params = HashMap::new();
        for name in &self.param_names {
            if let Some(value) = caps.name(name) {
                params.insert(name.clone(), value.as_str().to_string());
            }
        }

        Some(params)
    }

    /// Returns the original template string.
    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Returns the parameter names in order of appearance.
    #[must_use]
    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }

    /// Generates a path from parameter values.
    ///
    /// The result always re-matches this pattern. Returns `None` when a
    /// parameter has no supplied value.
    #[must_use]
    pub fn reverse(&self, params: &HashMap<String, String>) -> Option<String> {
        let mut parts = Vec::with_capacity(self.segments.len());

        for segment in &self.segments {
            match segment {
                PathSegment::Literal(s) => parts.push(s.clone()),
                PathSegment::Param(name) => parts.push(params.get(name)?.clone()),
            }
        }

        Some(parts.join("/"))
    }
}

/// Returns the parameter name when a segment has the form `{word}`.
fn param_segment(part: &str) -> Option<&str> {
    let name = part.strip_prefix('{')?.strip_suffix('}')?;
    if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Some(name)
    } else {
        None
    }
}
