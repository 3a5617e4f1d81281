//! Name patterns and restriction rules
//!
//! Patterns match dotted unit names:
//! - Exact match: "pkg.secret"
//! - Wildcard suffix: "pkg.internal.*" (any depth below `pkg.internal`)
//! - Wildcard prefix: "*.secret"
//! - Full wildcard: "*"
//!
//! `*` may appear anywhere and spans dots. Patterns are anchored at both ends.

use regex::Regex;

use crate::error::{DotloadError, Result};
use crate::name::CodeUnitName;

/// A compiled name pattern
#[derive(Debug, Clone)]
pub enum NamePattern {
    /// Matches every name
    Any,
    /// Matches exactly one name
    Exact(CodeUnitName),
    /// Wildcard pattern compiled to an anchored regex
    Wildcard { source: String, regex: Regex },
}

impl NamePattern {
    /// Compile a pattern string
    pub fn compile(pattern: &str) -> Result<Self> {
        if pattern == "*" {
            return Ok(NamePattern::Any);
        }

        if !pattern.contains('*') {
            return CodeUnitName::parse(pattern).map(NamePattern::Exact);
        }

        if let Some(c) = pattern
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '*')))
        {
            return Err(DotloadError::InvalidName {
                name: pattern.to_string(),
                reason: format!("unexpected character '{}' in pattern", c),
            });
        }

        let body = regex::escape(pattern).replace("\\*", ".*");
        let regex = Regex::new(&format!("^{}$", body)).map_err(|e| DotloadError::InvalidName {
            name: pattern.to_string(),
            reason: e.to_string(),
        })?;

        Ok(NamePattern::Wildcard {
            source: pattern.to_string(),
            regex,
        })
    }

    /// Match a pattern against a unit name
    pub fn matches(&self, name: &str) -> bool {
        match self {
            NamePattern::Any => true,
            NamePattern::Exact(exact) => exact.as_str() == name,
            NamePattern::Wildcard { regex, .. } => regex.is_match(name),
        }
    }

    /// True for patterns without wildcards
    pub fn is_exact(&self) -> bool {
        matches!(self, NamePattern::Exact(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            NamePattern::Any => "*",
            NamePattern::Exact(exact) => exact.as_str(),
            NamePattern::Wildcard { source, .. } => source,
        }
    }
}

/// A restriction rule: a pattern of denied names plus optional exemptions
/// keyed by the originator of the request.
#[derive(Debug, Clone)]
pub struct RestrictionRule {
    pattern: NamePattern,
    allow_from: Vec<NamePattern>,
    reason: Option<String>,
}

impl RestrictionRule {
    pub fn new(pattern: NamePattern) -> Self {
        Self {
            pattern,
            allow_from: Vec::new(),
            reason: None,
        }
    }

    /// Exempt originators matching `pattern` from this rule
    pub fn allow_from(mut self, pattern: NamePattern) -> Self {
        self.allow_from.push(pattern);
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn pattern(&self) -> &NamePattern {
        &self.pattern
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    /// Whether this rule covers `name` at all
    pub fn applies_to(&self, name: &str) -> bool {
        self.pattern.matches(name)
    }

    /// Whether a request from `originator` is exempt.
    ///
    /// Top-level requests (no originator) are never exempt.
    pub fn permits(&self, originator: Option<&CodeUnitName>) -> bool {
        match originator {
            Some(origin) => self.allow_from.iter().any(|p| p.matches(origin.as_str())),
            None => false,
        }
    }
}
