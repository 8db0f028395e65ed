use std::fmt;

use regex::Regex;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PatternError {
    #[error("pattern {0:?} must start with '/'")]
    NotAbsolute(String),

    #[error("pattern {0:?} has an unbalanced '[' or ']'")]
    Unbalanced(String),

    #[error("pattern {0:?} has an empty parameter name")]
    EmptyParam(String),

    #[error("pattern {pattern:?} failed to compile: {source}")]
    Compile {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// A route pattern such as `/cases/[id]/treatment`.
///
/// Each `[name]` stands for exactly one non-empty path segment; everything
/// else is literal. Matching is anchored on both ends, so `/cases/[id]`
/// accepts `/cases/42` but neither `/cases` nor `/cases/42/treatment`.
#[derive(Clone)]
pub struct PathPattern {
    source: String,
    /// `source` with parameter names erased; two patterns that differ only
    /// in parameter names share the same shape.
    shape: String,
    regex: Regex,
}

impl PathPattern {
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        if !pattern.starts_with('/') {
            return Err(PatternError::NotAbsolute(pattern.to_string()));
        }

        let mut expr = String::with_capacity(pattern.len() + 8);
        let mut shape = String::with_capacity(pattern.len());
        expr.push('^');

        let mut rest = pattern;
        while let Some(open) = rest.find(['[', ']']) {
            let (literal, tail) = rest.split_at(open);
            expr.push_str(&regex::escape(literal));
            shape.push_str(literal);

            if tail.starts_with(']') {
                return Err(PatternError::Unbalanced(pattern.to_string()));
            }

            let close = tail
                .find(']')
                .ok_or_else(|| PatternError::Unbalanced(pattern.to_string()))?;
            let name = &tail[1..close];
            if name.contains('[') || name.contains('/') {
                return Err(PatternError::Unbalanced(pattern.to_string()));
            }
            if name.trim().is_empty() {
                return Err(PatternError::EmptyParam(pattern.to_string()));
            }

            expr.push_str("[^/]+");
            shape.push_str("[]");
            rest = &tail[close + 1..];
        }
        expr.push_str(&regex::escape(rest));
        shape.push_str(rest);
        expr.push('$');

        let regex = Regex::new(&expr).map_err(|source| PatternError::Compile {
            pattern: pattern.to_string(),
            source,
        })?;

        Ok(Self {
            source: pattern.to_string(),
            shape,
            regex,
        })
    }

    pub fn matches(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn has_params(&self) -> bool {
        self.shape.contains("[]")
    }
}

impl PartialEq for PathPattern {
    fn eq(&self, other: &Self) -> bool {
        self.shape == other.shape
    }
}

impl Eq for PathPattern {}

impl fmt::Debug for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PathPattern").field(&self.source).finish()
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
