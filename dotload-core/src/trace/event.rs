//! Resolution event types

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::name::CodeUnitName;

/// What happened to one resolution attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    /// A resolver passed; the chain moves on
    NotMine,
    /// A resolver claimed the name and returned a loader handle
    Claimed,
    /// Served from the unit cache without consulting the chain
    CacheHit,
    /// The claimed load completed
    Loaded,
    /// The restriction policy denied the load
    Denied {
        #[serde(skip_serializing_if = "Option::is_none")]
        originator: Option<String>,
        rule: String,
    },
    /// The load or the chain failed
    Failed { code: String, message: String },
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::NotMine => "not_mine",
            Outcome::Claimed => "claimed",
            Outcome::CacheHit => "cache_hit",
            Outcome::Loaded => "loaded",
            Outcome::Denied { .. } => "denied",
            Outcome::Failed { .. } => "failed",
        }
    }

    /// Whether this outcome ends the request unsuccessfully
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Denied { .. } | Outcome::Failed { .. })
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single entry in the resolution log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionEvent {
    /// Unique identifier for this event
    pub event_id: String,

    /// Position in the log, assigned on record
    pub sequence: u64,

    pub timestamp: DateTime<Utc>,

    /// The dotted name being resolved
    pub requested_name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_hint: Option<Vec<String>>,

    /// Originator of the request; absent at top level
    pub current_context: Option<String>,

    /// Resolver the outcome belongs to, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolver: Option<String>,

    pub outcome: Outcome,
}

impl ResolutionEvent {
    pub fn new(
        requested_name: &CodeUnitName,
        search_hint: Option<&[PathBuf]>,
        current_context: Option<&CodeUnitName>,
        outcome: Outcome,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            sequence: 0, // set by EventLog::record
            timestamp: Utc::now(),
            requested_name: requested_name.to_string(),
            search_hint: search_hint.map(|paths| {
                paths
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect()
            }),
            current_context: current_context.map(|c| c.to_string()),
            resolver: None,
            outcome,
        }
    }

    pub fn with_resolver(mut self, resolver: impl Into<String>) -> Self {
        self.resolver = Some(resolver.into());
        self
    }
}
