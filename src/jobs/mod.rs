pub mod fields;
pub mod labels;
pub mod link;
pub mod milestones;
pub mod update_fields;

/// Outcome of an idempotent create-or-update run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
}

impl SeedSummary {
    pub fn succeeded(&self) -> usize {
        self.created + self.updated
    }
}
