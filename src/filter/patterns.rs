use std::cell::OnceCell;

use regex::Regex;
use thiserror::Error;

/// Pattern that every title matches; the set starts out holding only this.
pub const DEFAULT_PATTERN: &str = ".*";

/// Errors that can occur while compiling a filter pattern.
#[derive(Debug, Error)]
pub enum PatternError {
    /// The pattern is not a valid regular expression.
    #[error("Invalid filter pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

/// One-line form of a regex error.
///
/// Syntax errors render as several lines (pattern echo, caret, message); only
/// the final message line is kept.
fn error_summary(err: &regex::Error) -> String {
    let text = err.to_string();
    let last = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .last()
        .unwrap_or_default();
    last.strip_prefix("error: ").unwrap_or(last).to_string()
}

/// A single title filter.
///
/// The source string is kept as given; compilation happens on first use and
/// the outcome (regex or error) is cached for the rest of the run.
#[derive(Debug)]
pub struct Pattern {
    source: String,
    compiled: OnceCell<Result<Regex, regex::Error>>,
}

impl Pattern {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            compiled: OnceCell::new(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Compiles the pattern, or returns the cached result of an earlier attempt.
    ///
    /// A failed compilation is reported with a single `warn!` the first time
    /// it happens; later calls return the same error silently.
    pub fn compile(&self) -> Result<&Regex, PatternError> {
        let compiled = self.compiled.get_or_init(|| {
            let result = Regex::new(&self.source);
            if let Err(e) = &result {
                tracing::warn!(
                    pattern = %self.source,
                    error = %error_summary(e),
                    "Invalid filter pattern, skipping it"
                );
            }
            result
        });

        compiled.as_ref().map_err(|e| PatternError::InvalidPattern {
            pattern: self.source.clone(),
            reason: error_summary(e),
        })
    }
}

/// Ordered collection of title filters.
///
/// Never empty: a fresh set holds [`DEFAULT_PATTERN`], so a run without any
/// configured pattern keeps every item.
#[derive(Debug)]
pub struct PatternSet {
    patterns: Vec<Pattern>,
}

impl Default for PatternSet {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternSet {
    pub fn new() -> Self {
        Self {
            patterns: vec![Pattern::new(DEFAULT_PATTERN)],
        }
    }

    /// Builds a set from resolved configuration: the first pattern replaces the
    /// default, the rest are appended in order. An empty slice keeps the default.
    pub fn from_patterns<S: AsRef<str>>(patterns: &[S]) -> Self {
        let mut set = Self::new();
        let mut iter = patterns.iter();
        if let Some(first) = iter.next() {
            set.replace_default(first.as_ref());
        }
        for pattern in iter {
            set.append(pattern.as_ref());
        }
        set
    }

    /// Adds a pattern at the end. Validity is only checked when matching.
    pub fn append(&mut self, pattern: impl Into<String>) {
        self.patterns.push(Pattern::new(pattern));
    }

    /// Overwrites the first (default) pattern.
    pub fn replace_default(&mut self, pattern: impl Into<String>) {
        self.patterns[0] = Pattern::new(pattern);
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pattern> {
        self.patterns.iter()
    }

    /// Returns true if at least one pattern matches anywhere in `text`.
    ///
    /// Patterns are tried in insertion order and evaluation stops at the first
    /// match. A pattern that fails to compile counts as a non-match and the
    /// next pattern is tried.
    pub fn matches_any(&self, text: &str) -> bool {
        self.patterns.iter().any(|pattern| match pattern.compile() {
            Ok(regex) => regex.is_match(text),
            Err(_) => false,
        })
    }

    /// Patterns that failed to compile so far.
    pub fn invalid_patterns(&self) -> Vec<&str> {
        self.patterns
            .iter()
            .filter(|p| matches!(p.compiled.get(), Some(Err(_))))
            .map(Pattern::as_str)
            .collect()
    }
}
