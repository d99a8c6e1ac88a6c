//! Hands-on resource scoring.
//!
//! A pure function from a candidate's raw attributes to a comparable quality
//! score: no I/O, no hidden state, same input → same score. The explicit
//! `now` parameter keeps the freshness term deterministic under test.
//!
//! Three normalized terms, weighted so that hands-on signal outranks raw
//! popularity and popularity outranks freshness:
//! - popularity: log-saturating in stars + forks, so a 100k-star repository
//!   does not score 1000× a 100-star one
//! - hands-on: fixed bonus when the description/title signals tutorial or
//!   example material, or the repository carries a wiki
//! - freshness: exponential decay in days since the last update

use chrono::{DateTime, Utc};
use studyclaw_core::plan::{CandidateResource, ScoredResource};

/// Description/title keywords that signal practical, example-rich material.
pub const HANDS_ON_KEYWORDS: &[&str] = &[
    "tutorial",
    "example",
    "hands-on",
    "how-to",
    "practical",
    "guide",
    "workshop",
    "demo",
    "exercise",
    "cookbook",
];

/// Popularity saturates at this star+fork count.
const POPULARITY_SATURATION: f64 = 100_000.0;

/// Term weights, sourced from configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringWeights {
    pub hands_on: f64,
    pub popularity: f64,
    pub freshness: f64,
    pub freshness_half_life_days: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            hands_on: 3.0,
            popularity: 2.0,
            freshness: 0.5,
            freshness_half_life_days: 90.0,
        }
    }
}

impl From<&studyclaw_config::ScoringConfig> for ScoringWeights {
    fn from(cfg: &studyclaw_config::ScoringConfig) -> Self {
        Self {
            hands_on: cfg.hands_on_weight,
            popularity: cfg.popularity_weight,
            freshness: cfg.freshness_weight,
            freshness_half_life_days: cfg.freshness_half_life_days,
        }
    }
}

/// Score one candidate. Non-negative, no fixed upper bound; missing fields
/// contribute zero so a sparse candidate ranks low but is never rejected.
pub fn score(resource: &CandidateResource, weights: &ScoringWeights, now: DateTime<Utc>) -> f64 {
    weights.hands_on * hands_on_term(resource)
        + weights.popularity * popularity_term(resource.stars, resource.forks)
        + weights.freshness * freshness_term(resource.updated_at, now, weights.freshness_half_life_days)
}

/// Monotonically increasing, saturating in stars + forks, normalized to [0, 1].
fn popularity_term(stars: u64, forks: u64) -> f64 {
    let combined = stars.saturating_add(forks) as f64;
    ((1.0 + combined).ln() / (1.0 + POPULARITY_SATURATION).ln()).min(1.0)
}

/// 1.0 when the candidate signals practical material, else 0.0.
fn hands_on_term(resource: &CandidateResource) -> f64 {
    if resource.has_wiki {
        return 1.0;
    }
    let haystack = format!(
        "{} {}",
        resource.title.to_lowercase(),
        resource.description.as_deref().unwrap_or("").to_lowercase()
    );
    if HANDS_ON_KEYWORDS.iter().any(|kw| haystack.contains(kw)) {
        1.0
    } else {
        0.0
    }
}

/// Decays from 1.0 toward 0.0 as the last update recedes; 0.0 when unknown.
fn freshness_term(updated_at: Option<DateTime<Utc>>, now: DateTime<Utc>, half_life_days: f64) -> f64 {
    let Some(updated) = updated_at else {
        return 0.0;
    };
    let days = (now - updated).num_seconds().max(0) as f64 / 86_400.0;
    (-(days * std::f64::consts::LN_2 / half_life_days)).exp()
}

/// Score, sort, and truncate to the top K.
///
/// The ordering is a strict total order — score descending, then star count
/// descending, then identifier ascending — so repeated ranking of the same
/// candidate set always yields the same sequence.
pub fn rank(
    candidates: Vec<CandidateResource>,
    weights: &ScoringWeights,
    now: DateTime<Utc>,
    k: usize,
) -> Vec<ScoredResource> {
    let mut scored: Vec<ScoredResource> = candidates
        .into_iter()
        .map(|resource| {
            let score = score(&resource, weights, now);
            ScoredResource { resource, score }
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| b.resource.stars.cmp(&a.resource.stars))
            .then_with(|| a.resource.id.cmp(&b.resource.id))
    });
    scored.truncate(k);
    scored
}
