use crate::models::PriorityLevel;

/// Whether an incident at this priority needs a human decision before
/// any action is executed. True for High and Critical.
pub fn requires_human_review(priority: PriorityLevel) -> bool {
    matches!(priority, PriorityLevel::High | PriorityLevel::Critical)
}
