/// Run-wide decision for title collisions in the concurrent dashboard
/// pipeline. Captured once per run, applied uniformly to every duplicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateStrategy {
    Override,
    Skip,
    Cancel,
}

impl DuplicateStrategy {
    /// Parses one interactive choice, accepting the short key or full word.
    pub fn parse_choice(input: &str) -> Option<DuplicateStrategy> {
        match input.trim().to_lowercase().as_str() {
            "o" | "override" => Some(DuplicateStrategy::Override),
            "s" | "skip" => Some(DuplicateStrategy::Skip),
            "c" | "cancel" => Some(DuplicateStrategy::Cancel),
            _ => None,
        }
    }
}

/// Per-item decision used by the sequential migrators, which ask for every
/// duplicate instead of once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemAction {
    Skip,
    Update,
    Cancel,
}

impl ItemAction {
    pub fn parse_choice(input: &str) -> Option<ItemAction> {
        match input.trim().to_lowercase().as_str() {
            "s" | "skip" => Some(ItemAction::Skip),
            "u" | "update" => Some(ItemAction::Update),
            "c" | "cancel" => Some(ItemAction::Cancel),
            _ => None,
        }
    }
}
