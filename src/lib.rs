//! cteinline - folds single-use common table expressions into their use site.
//!
//! Given a bound query tree, the engine decides for every CTE whether its one
//! reference can be replaced by a copy of the CTE's defining query, and
//! performs that rewrite in place. CTEs that cannot be inlined safely are left
//! untouched for a later materializing step.
//!
//! # Architecture
//!
//! ```text
//! Query → reference-count check → per scope: eligibility → usage chain
//!       → plannability oracle → inline → recurse into nested scopes
//! ```
//!
//! The [`CteInliner`] bundles a [`PlannabilityOracle`] with
//! [`InlineSettings`] and can be shared between threads.
//!
//! # Example
//!
//! ```rust,ignore
//! use cteinline::{CteInliner, Query};
//!
//! let mut query: Query = build_query();
//! let report = CteInliner::new().run(&mut query)?;
//! for name in &report.inlined {
//!     println!("inlined {name}");
//! }
//! ```

use std::sync::Arc;

pub use cteinline_common::{Error, Result};
pub use cteinline_ir::{CommonTableExpr, Query, RangeTblEntry, RteKind};
pub use cteinline_optimizer::{
    AlwaysPlannable, IneligibleReason, InlineReport, InlineSettings, MissingUsagePolicy,
    Plannability, PlannabilityOracle, PushdownOracle, SkipReason, SkippedCte, SupportSettings,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Runs the CTE inlining pass with a fixed oracle and settings.
///
/// Cloning is cheap; the oracle is shared.
#[derive(Clone)]
pub struct CteInliner {
    oracle: Arc<dyn PlannabilityOracle>,
    settings: InlineSettings,
}

impl CteInliner {
    /// Creates an inliner using the reference [`PushdownOracle`] and
    /// [`InlineSettings::all_enabled`].
    pub fn new() -> Self {
        Self {
            oracle: Arc::new(PushdownOracle::new()),
            settings: InlineSettings::all_enabled(),
        }
    }

    pub fn with_oracle(mut self, oracle: impl PlannabilityOracle + 'static) -> Self {
        self.oracle = Arc::new(oracle);
        self
    }

    pub fn with_settings(mut self, settings: InlineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &InlineSettings {
        &self.settings
    }

    /// Inlines every eligible CTE in `query`, in place.
    ///
    /// Returns an error only when the tree violates a structural invariant, in
    /// which case the tree may be partially rewritten and must be discarded.
    pub fn run(&self, query: &mut Query) -> Result<InlineReport> {
        cteinline_optimizer::recursively_inline_ctes(query, self.oracle.as_ref(), &self.settings)
    }

    /// Decodes a JSON query tree, inlines it and encodes the result.
    pub fn run_json(&self, input: &str) -> Result<String> {
        let mut query: Query =
            serde_json::from_str(input).map_err(|e| Error::invalid_query(e.to_string()))?;
        let report = self.run(&mut query)?;
        debug!(
            inlined = report.inlined.len(),
            skipped = report.skipped.len(),
            "inlined JSON query tree"
        );
        let output = InlineOutput::new(query, &report);
        serde_json::to_string(&output).map_err(|e| Error::internal(e.to_string()))
    }
}

impl Default for CteInliner {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CteInliner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CteInliner")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// Serialized form of a rewritten tree and its report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineOutput {
    pub query: Query,
    pub inlined: Vec<String>,
    pub skipped: Vec<SkippedOutput>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedOutput {
    pub name: String,
    pub reason: String,
}

impl InlineOutput {
    fn new(query: Query, report: &InlineReport) -> Self {
        Self {
            query,
            inlined: report.inlined.clone(),
            skipped: report
                .skipped
                .iter()
                .map(|skipped| SkippedOutput {
                    name: skipped.name.clone(),
                    reason: skipped.reason.to_string(),
                })
                .collect(),
        }
    }
}

/// Inlines CTEs in `query` with the default oracle and settings.
pub fn inline_ctes(query: &mut Query) -> Result<InlineReport> {
    CteInliner::new().run(query)
}
