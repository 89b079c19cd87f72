//! Stage - where a round currently is inside the pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Pipeline stage of one round.
///
/// Transitions (linear):
/// - received -> generating -> publishing -> hosting -> notifying -> done
///
/// A failure at `generating` or `publishing` leaves the stage where it was;
/// the queue's `RoundState` tells whether the round will be retried or is dead.
/// `hosting` and `notifying` never fail the round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Received,
    Generating,
    Publishing,
    Hosting,
    Notifying,
    Done,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Received => "received",
            Stage::Generating => "generating",
            Stage::Publishing => "publishing",
            Stage::Hosting => "hosting",
            Stage::Notifying => "notifying",
            Stage::Done => "done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_are_ordered_along_the_pipeline() {
        assert!(Stage::Received < Stage::Generating);
        assert!(Stage::Generating < Stage::Publishing);
        assert!(Stage::Publishing < Stage::Hosting);
        assert!(Stage::Hosting < Stage::Notifying);
        assert!(Stage::Notifying < Stage::Done);
    }

    #[test]
    fn stage_serializes_as_snake_case() {
        let s = serde_json::to_string(&Stage::Notifying).unwrap();
        assert_eq!(s, "\"notifying\"");
        assert_eq!(Stage::Generating.to_string(), "generating");
    }
}
