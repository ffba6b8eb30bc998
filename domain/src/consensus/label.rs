//! Decision labels and the thresholds that produce them

use serde::{Deserialize, Serialize};

/// Weighted confidence at or above which a proposal is approved.
pub const APPROVE_THRESHOLD: f64 = 0.80;

/// Weighted confidence at or above which a proposal needs revision rather
/// than rejection.
pub const REVISE_THRESHOLD: f64 = 0.60;

/// Outcome of a council decision.
///
/// Ordered by severity: `Approve < Revise < Reject`.
///
/// # Example
///
/// ```
/// use council_domain::consensus::DecisionLabel;
///
/// assert_eq!(DecisionLabel::from_confidence(0.80), DecisionLabel::Approve);
/// assert_eq!(DecisionLabel::from_confidence(0.79), DecisionLabel::Revise);
/// assert_eq!(DecisionLabel::from_confidence(0.59), DecisionLabel::Reject);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionLabel {
    Approve,
    Revise,
    Reject,
}

/// Float summation noise tolerated at a threshold; far below any
/// confidence a reviewer can express.
const THRESHOLD_TOLERANCE: f64 = 1e-9;

impl DecisionLabel {
    /// Base label for a weighted confidence, before the veto.
    ///
    /// The confidence is compared as computed; it is never rounded first.
    pub fn from_confidence(confidence: f64) -> Self {
        let confidence = confidence + THRESHOLD_TOLERANCE;
        if confidence >= APPROVE_THRESHOLD {
            DecisionLabel::Approve
        } else if confidence >= REVISE_THRESHOLD {
            DecisionLabel::Revise
        } else {
            DecisionLabel::Reject
        }
    }

    /// Move the label down to at least `floor` in severity. Never moves up.
    pub fn at_least(self, floor: DecisionLabel) -> Self {
        self.max(floor)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionLabel::Approve => "approve",
            DecisionLabel::Revise => "revise",
            DecisionLabel::Reject => "reject",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            DecisionLabel::Approve => "✅",
            DecisionLabel::Revise => "✏️",
            DecisionLabel::Reject => "❌",
        }
    }
}

impl std::fmt::Display for DecisionLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How the weight of a dropped persona is handled during aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropPolicy {
    /// Rescale the remaining weights so they sum to 1.0
    #[default]
    Renormalize,
    /// Keep the original weights; the dropped persona contributes 0.0
    ZeroConfidence,
}

impl DropPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropPolicy::Renormalize => "renormalize",
            DropPolicy::ZeroConfidence => "zero_confidence",
        }
    }
}

impl std::str::FromStr for DropPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "renormalize" => Ok(DropPolicy::Renormalize),
            "zero_confidence" | "zero" => Ok(DropPolicy::ZeroConfidence),
            _ => Err(format!(
                "Unknown drop policy: {}. Valid: renormalize, zero_confidence",
                s
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thresholds_are_inclusive_below() {
        assert_eq!(DecisionLabel::from_confidence(1.0), DecisionLabel::Approve);
        assert_eq!(DecisionLabel::from_confidence(0.8), DecisionLabel::Approve);
        assert_eq!(DecisionLabel::from_confidence(0.6), DecisionLabel::Revise);
        assert_eq!(DecisionLabel::from_confidence(0.0), DecisionLabel::Reject);
        assert_eq!(DecisionLabel::from_confidence(0.7999996), DecisionLabel::Revise);
        // 0.1 + 0.7 sums to 0.7999999999999999
        assert_eq!(DecisionLabel::from_confidence(0.1 + 0.7), DecisionLabel::Approve);
    }

    #[test]
    fn test_at_least_only_moves_down() {
        assert_eq!(
            DecisionLabel::Approve.at_least(DecisionLabel::Revise),
            DecisionLabel::Revise
        );
        assert_eq!(
            DecisionLabel::Reject.at_least(DecisionLabel::Revise),
            DecisionLabel::Reject
        );
        assert_eq!(
            DecisionLabel::Revise.at_least(DecisionLabel::Revise),
            DecisionLabel::Revise
        );
    }

    #[test]
    fn test_drop_policy_from_str() {
        assert_eq!(
            "zero-confidence".parse::<DropPolicy>().ok(),
            Some(DropPolicy::ZeroConfidence)
        );
        assert_eq!(
            "Renormalize".parse::<DropPolicy>().ok(),
            Some(DropPolicy::Renormalize)
        );
        assert!("average".parse::<DropPolicy>().is_err());
    }
}
