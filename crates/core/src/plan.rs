//! Learning-plan domain types.
//!
//! These are the value objects that flow through one planning run: calendar
//! events in, scored resources per topic, and the final plan out. Everything
//! here is run-scoped — created from tool results, handed to the composer,
//! and discarded when the run ends.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One calendar entry relevant to learning. Immutable once fetched.
///
/// The `start < end` invariant is enforced at the fetch boundary: entries
/// that violate it are dropped with a warning and never enter a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningEvent {
    /// Identifier, unique within a day
    pub id: String,

    /// Event title — doubles as the search topic
    pub title: String,

    /// Free-text notes from the event body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    /// Link back to the calendar entry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,

    /// Scheduled start
    pub start: DateTime<Utc>,

    /// Scheduled end
    pub end: DateTime<Utc>,
}

impl LearningEvent {
    /// Whether the event satisfies the `start < end` invariant.
    pub fn is_well_formed(&self) -> bool {
        self.start < self.end
    }
}

/// One discovered repository/example relevant to a topic.
///
/// Created per search call, discarded after the run; never persisted. The
/// score is *not* stored here — it is always recomputed from these raw
/// attributes so ranking stays reproducible.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateResource {
    /// Repository full name (e.g., "rust-lang/rustlings")
    pub id: String,

    /// Display title
    pub title: String,

    /// Public URL
    pub url: String,

    /// Textual description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Star count
    #[serde(default)]
    pub stars: u64,

    /// Fork count
    #[serde(default)]
    pub forks: u64,

    /// Whether the repository carries a wiki (a hands-on signal)
    #[serde(default)]
    pub has_wiki: bool,

    /// Primary language
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    /// Last update time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A candidate paired with its recomputed hands-on score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredResource {
    pub resource: CandidateResource,
    pub score: f64,
}

/// The structured payload of one `search_resources` result: which topic was
/// searched and the ranked top-K found for it. The loop accumulates these and
/// pairs them with events at composition time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchReport {
    pub topic: String,
    pub resources: Vec<ScoredResource>,
}

/// One line of the final plan: an event and its ranked resources (already
/// limited to top-K; may be empty).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanEntry {
    pub event: LearningEvent,
    pub resources: Vec<ScoredResource>,
}

/// The final output of a run: the ordered entries plus the rendered message.
/// Built once at loop termination and handed to the notification collaborator
/// exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningPlan {
    pub entries: Vec<PlanEntry>,
    pub message: String,
}
