//! Plan composition — rendering the accumulated run results into one SMS.
//!
//! Deterministic: the same (event, resources) pairs always render the same
//! message. Never fails — an empty run renders a "no events" message, and a
//! message that would blow the channel budget is truncated on a character
//! boundary with an explicit marker.

use studyclaw_core::plan::{LearningPlan, PlanEntry};

/// Marker appended when the rendered plan is cut to fit the channel budget.
const TRUNCATION_MARKER: char = '…';

/// Renders the final learning plan message.
#[derive(Debug, Clone)]
pub struct PlanComposer {
    /// Character budget for the whole message.
    max_len: usize,
    /// How many resources to cite per event.
    resources_per_event: usize,
}

impl Default for PlanComposer {
    fn default() -> Self {
        Self {
            max_len: 480,
            resources_per_event: 2,
        }
    }
}

impl PlanComposer {
    pub fn new(max_len: usize, resources_per_event: usize) -> Self {
        Self {
            max_len: max_len.max(2),
            resources_per_event: resources_per_event.max(1),
        }
    }

    /// Build the final plan from the ordered (event, ranked resources)
    /// pairs. Called exactly once per run, at loop termination.
    pub fn compose(&self, entries: Vec<PlanEntry>) -> LearningPlan {
        let message = self.render(&entries);
        LearningPlan { entries, message }
    }

    fn render(&self, entries: &[PlanEntry]) -> String {
        if entries.is_empty() {
            return "No learning events on today's calendar.".into();
        }

        let mut message = String::from("Today's learning plan:");
        for entry in entries {
            message.push('\n');
            message.push_str(&entry.event.title);
            if entry.resources.is_empty() {
                message.push_str(" — no hands-on resources found");
                continue;
            }
            message.push_str(": ");
            let cited: Vec<String> = entry
                .resources
                .iter()
                .take(self.resources_per_event)
                .map(|r| format!("{} {}", r.resource.title, r.resource.url))
                .collect();
            message.push_str(&cited.join("; "));
        }

        self.truncate(message)
    }

    /// Cut to the budget on a char boundary, ending with the marker.
    fn truncate(&self, message: String) -> String {
        if message.chars().count() <= self.max_len {
            return message;
        }
        let mut truncated: String = message.chars().take(self.max_len - 1).collect();
        truncated.push(TRUNCATION_MARKER);
        truncated
    }
}
