use serde::{Deserialize, Serialize};

/// Costs and rewards of point-spending actions.
///
/// `vote_cost` and `vote_points_award` are tuned independently even though
/// both default to 10.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EconomyPolicy {
    /// Points debited from the voter.
    #[serde(default = "default_vote_cost")]
    pub vote_cost: i64,
    /// Points credited to the participant's total per vote.
    #[serde(default = "default_vote_points_award")]
    pub vote_points_award: i64,
    /// Points debited when forming (or switching) an alliance.
    #[serde(default = "default_alliance_cost")]
    pub alliance_cost: i64,
}

impl EconomyPolicy {
    pub const DEFAULT_VOTE_COST: i64 = 10;
    pub const DEFAULT_VOTE_POINTS_AWARD: i64 = 10;
    pub const DEFAULT_ALLIANCE_COST: i64 = 50;
}

impl Default for EconomyPolicy {
    fn default() -> Self {
        Self {
            vote_cost: Self::DEFAULT_VOTE_COST,
            vote_points_award: Self::DEFAULT_VOTE_POINTS_AWARD,
            alliance_cost: Self::DEFAULT_ALLIANCE_COST,
        }
    }
}

fn default_vote_cost() -> i64 {
    EconomyPolicy::DEFAULT_VOTE_COST
}

fn default_vote_points_award() -> i64 {
    EconomyPolicy::DEFAULT_VOTE_POINTS_AWARD
}

fn default_alliance_cost() -> i64 {
    EconomyPolicy::DEFAULT_ALLIANCE_COST
}
