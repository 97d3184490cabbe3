/// What the orchestrator does when a CTE that passed the static check has no
/// reference anywhere below its declaring scope.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MissingUsagePolicy {
    /// Fail the whole pass with `Error::CteNotFound`.
    #[default]
    Abort,
    /// Leave the CTE in place and record it as skipped.
    Skip,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InlineSettings {
    pub enable_cte_inlining: bool,
    pub check_plannability: bool,
    pub verify_reference_counts: bool,
    pub missing_usage: MissingUsagePolicy,
}

impl Default for InlineSettings {
    fn default() -> Self {
        Self::all_enabled()
    }
}

impl InlineSettings {
    pub fn all_enabled() -> Self {
        Self {
            enable_cte_inlining: true,
            check_plannability: true,
            verify_reference_counts: true,
            missing_usage: MissingUsagePolicy::Abort,
        }
    }

    pub fn all_disabled() -> Self {
        Self {
            enable_cte_inlining: false,
            check_plannability: false,
            verify_reference_counts: false,
            missing_usage: MissingUsagePolicy::Abort,
        }
    }

    pub fn with_missing_usage(mut self, policy: MissingUsagePolicy) -> Self {
        self.missing_usage = policy;
        self
    }
}
