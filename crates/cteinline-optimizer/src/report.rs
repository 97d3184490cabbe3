use std::fmt;

use crate::cte_inline::IneligibleReason;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Ineligible(IneligibleReason),
    /// A scope between the declaration and the use site modifies data or
    /// locks rows.
    LockingUseSite,
    NotPlannable(String),
    UsageNotFound,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Ineligible(reason) => write!(f, "{reason}"),
            SkipReason::LockingUseSite => {
                write!(f, "used by a data-modifying or row-locking scope")
            }
            SkipReason::NotPlannable(reason) => {
                write!(f, "if inlined, the planner would error with: {reason}")
            }
            SkipReason::UsageNotFound => write!(f, "no use site below the declaring scope"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedCte {
    pub name: String,
    pub reason: SkipReason,
}

/// Outcome of one inlining pass, in processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InlineReport {
    pub inlined: Vec<String>,
    pub skipped: Vec<SkippedCte>,
}

impl InlineReport {
    pub(crate) fn record_inlined(&mut self, name: &str) {
        self.inlined.push(name.to_string());
    }

    pub(crate) fn record_skip(&mut self, name: &str, reason: SkipReason) {
        self.skipped.push(SkippedCte {
            name: name.to_string(),
            reason,
        });
    }

    pub fn is_inlined(&self, name: &str) -> bool {
        self.inlined.iter().any(|inlined| inlined == name)
    }

    pub fn skip_reason(&self, name: &str) -> Option<&SkipReason> {
        self.skipped
            .iter()
            .find(|skipped| skipped.name == name)
            .map(|skipped| &skipped.reason)
    }

    pub fn is_empty(&self) -> bool {
        self.inlined.is_empty() && self.skipped.is_empty()
    }
}
