//! Stage identifiers and the canonical stage order.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the ten stages of the longform workflow.
///
/// Variants are declared in execution order, so `Ord` follows the
/// canonical sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    /// Project card: title candidates, targets, definition of done.
    Init,
    /// Miracle blueprint: the central trick and its mechanism chain.
    Blueprint,
    /// Cast and props.
    Cast,
    /// Clue matrix, red herrings and timeline.
    Clues,
    /// Chapter structure plan.
    Structure,
    /// Scene cards.
    Scenes,
    /// Full longform draft.
    Draft,
    /// Review of the draft; gates the revision loop.
    Review,
    /// Polished final draft.
    Polish,
    /// Quality gate evaluation.
    Evaluate,
}

/// The canonical execution order.
pub const STAGE_SEQUENCE: [StageId; 10] = [
    StageId::Init,
    StageId::Blueprint,
    StageId::Cast,
    StageId::Clues,
    StageId::Structure,
    StageId::Scenes,
    StageId::Draft,
    StageId::Review,
    StageId::Polish,
    StageId::Evaluate,
];

impl StageId {
    /// Returns the snake_case name used in events, cache files and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Blueprint => "blueprint",
            Self::Cast => "cast",
            Self::Clues => "clues",
            Self::Structure => "structure",
            Self::Scenes => "scenes",
            Self::Draft => "draft",
            Self::Review => "review",
            Self::Polish => "polish",
            Self::Evaluate => "evaluate",
        }
    }

    /// Returns the human readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Init => "Stage0 · Project Init",
            Self::Blueprint => "Stage1 · Miracle Blueprint",
            Self::Cast => "Stage2A · Cast & Props",
            Self::Clues => "Stage2B · Clue Matrix",
            Self::Structure => "Stage3 · Structure Plan",
            Self::Scenes => "Stage4 · Scene Cards",
            Self::Draft => "Stage5 · Longform Draft",
            Self::Review => "Stage6 · Review",
            Self::Polish => "Stage7 · Polish",
            Self::Evaluate => "Quality Gate Evaluation",
        }
    }

    /// Position in the canonical sequence.
    #[must_use]
    pub fn position(self) -> usize {
        STAGE_SEQUENCE
            .iter()
            .position(|s| *s == self)
            .unwrap_or(STAGE_SEQUENCE.len())
    }

    /// The stage immediately before this one, if any.
    #[must_use]
    pub fn predecessor(self) -> Option<Self> {
        self.position()
            .checked_sub(1)
            .and_then(|i| STAGE_SEQUENCE.get(i).copied())
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown stage name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown stage id: {0}")]
pub struct UnknownStageError(pub String);

impl FromStr for StageId {
    type Err = UnknownStageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        STAGE_SEQUENCE
            .iter()
            .copied()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| UnknownStageError(s.to_string()))
    }
}
