//! Outcomes of optional pipeline stages.
//!
//! An optional stage either applies or is skipped with a reason; neither
//! aborts the request. Aborting failures travel as `Err(Error)` instead.

/// Result of one optional stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    /// The stage ran; `changed` counts the records it touched.
    Applied { stage: &'static str, changed: usize },
    /// The stage did not run.
    Skipped { stage: &'static str, reason: String },
}

impl StageOutcome {
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Applied { stage, .. } | Self::Skipped { stage, .. } => stage,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

/// Summary of a proxy merge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Proxy entries appended from secondaries.
    pub appended: usize,
    /// One entry per secondary, in caller order.
    pub sources: Vec<StageOutcome>,
}

impl MergeReport {
    pub fn skipped(&self) -> usize {
        self.sources.iter().filter(|s| !s.is_applied()).count()
    }
}

/// Summary of a cover application, one outcome per sub-step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoverReport {
    pub steps: Vec<StageOutcome>,
}

impl CoverReport {
    /// Outcome for a named sub-step.
    pub fn step(&self, stage: &str) -> Option<&StageOutcome> {
        self.steps.iter().find(|s| s.stage() == stage)
    }
}
