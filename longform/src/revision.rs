//! Draft/review revision loop.
//!
//! The review stage returns a [`ReviewVerdict`]. A blocking verdict sends
//! the run back to the draft stage with a [`RevisionDirective`] until the
//! draft has succeeded `1 + max_auto_revisions` times. That budget is
//! separate from each node's transient retry budget.

use crate::core::{RevisionDirective, StageResult};
use crate::errors::StageError;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// The part of a review artifact the engine inspects.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewVerdict {
    /// Blocking issues.
    #[serde(default)]
    pub must_fix: Vec<String>,
    /// Non-blocking issues, blocking in strict mode.
    #[serde(default)]
    pub warnings: Vec<String>,
    /// Remaining review fields, preserved as-is.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Why a verdict blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockingLevel {
    /// `mustFix` is non-empty.
    MustFix,
    /// Strict mode and `warnings` is non-empty.
    Warnings,
}

impl ReviewVerdict {
    /// Decodes the verdict from a review artifact. A malformed verdict is a
    /// transient executor failure.
    pub fn from_result(result: &StageResult) -> Result<Self, StageError> {
        if !result.as_value().is_object() {
            return Err(StageError::Validation(
                "review verdict must be a JSON object".into(),
            ));
        }
        result.decode()
    }

    /// Returns the blocking level, if any.
    #[must_use]
    pub fn blocking_level(&self, fail_on_warnings: bool) -> Option<BlockingLevel> {
        if !self.must_fix.is_empty() {
            Some(BlockingLevel::MustFix)
        } else if fail_on_warnings && !self.warnings.is_empty() {
            Some(BlockingLevel::Warnings)
        } else {
            None
        }
    }

    /// Returns true if the verdict blocks advancement.
    #[must_use]
    pub fn is_blocking(&self, fail_on_warnings: bool) -> bool {
        self.blocking_level(fail_on_warnings).is_some()
    }

    /// Human readable reason, if the verdict blocks.
    #[must_use]
    pub fn blocking_reason(&self, fail_on_warnings: bool) -> Option<String> {
        match self.blocking_level(fail_on_warnings)? {
            BlockingLevel::MustFix => Some(format!("Review blocked: {}", self.must_fix.join("; "))),
            BlockingLevel::Warnings => {
                Some(format!("Review warnings: {}", self.warnings.join("; ")))
            }
        }
    }
}

/// What the engine should do after a review.
#[derive(Debug, Clone, PartialEq)]
pub enum ReviewDecision {
    /// Clean verdict; continue to the next stage.
    Advance,
    /// Blocking verdict with budget left; run the draft stage again.
    Revise {
        /// Directive for the next draft run.
        directive: RevisionDirective,
        /// Blocking reason.
        reason: String,
    },
    /// Blocking verdict and the draft budget is spent.
    Exhausted {
        /// Blocking reason.
        reason: String,
    },
}

/// Counters for one run's revision loop.
#[derive(Debug, Clone)]
pub struct RevisionController {
    budget: u32,
    fail_on_warnings: bool,
    draft_runs: u32,
    review_rounds: u32,
}

impl RevisionController {
    /// Creates a controller allowing `budget` successful draft executions.
    #[must_use]
    pub fn new(budget: u32, fail_on_warnings: bool) -> Self {
        Self {
            budget: budget.max(1),
            fail_on_warnings,
            draft_runs: 0,
            review_rounds: 0,
        }
    }

    /// Records a successful draft execution.
    pub fn record_draft_success(&mut self) {
        self.draft_runs += 1;
    }

    /// Successful draft executions so far.
    #[must_use]
    pub fn draft_runs(&self) -> u32 {
        self.draft_runs
    }

    /// Review verdicts assessed so far.
    #[must_use]
    pub fn review_rounds(&self) -> u32 {
        self.review_rounds
    }

    /// Total draft executions allowed.
    #[must_use]
    pub fn budget(&self) -> u32 {
        self.budget
    }

    /// Whether warnings block.
    #[must_use]
    pub fn fail_on_warnings(&self) -> bool {
        self.fail_on_warnings
    }

    /// Decides the next step for a decoded verdict.
    ///
    /// `review` is the raw review artifact and `previous_draft` the draft it
    /// judged; both travel in the directive.
    pub fn assess(
        &mut self,
        verdict: &ReviewVerdict,
        review: &StageResult,
        previous_draft: &StageResult,
    ) -> ReviewDecision {
        self.review_rounds += 1;

        let Some(reason) = verdict.blocking_reason(self.fail_on_warnings) else {
            debug!(round = self.review_rounds, "Review verdict is clean");
            return ReviewDecision::Advance;
        };

        if self.draft_runs >= self.budget {
            info!(
                draft_runs = self.draft_runs,
                budget = self.budget,
                "Revision budget exhausted"
            );
            return ReviewDecision::Exhausted { reason };
        }

        let directive = RevisionDirective {
            attempt: self.draft_runs + 1,
            max_attempts: self.budget,
            previous_draft: previous_draft.clone(),
            feedback: review.clone(),
        };
        info!(
            attempt = directive.attempt,
            max_attempts = directive.max_attempts,
            "Routing back to draft for revision"
        );
        ReviewDecision::Revise { directive, reason }
    }
}
