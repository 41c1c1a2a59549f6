use crate::denial::{require_balance, Decision, Denial};
use chrono::{DateTime, Utc};
use fanledger_types::{calendar_day, EconomyPolicy, VoteDelta, VoteId, VoteRecord, VoteSnapshot};

/// Decide a daily vote.
///
/// The duplicate check runs first: repeating today's vote is a duplicate even
/// when the first vote spent the last points.
pub fn check_vote(
    policy: &EconomyPolicy,
    snapshot: &VoteSnapshot,
    now: DateTime<Utc>,
) -> Decision<VoteDelta> {
    let day = calendar_day(now);
    if snapshot.already_voted {
        return Err(Denial::DuplicateAction {
            account_id: snapshot.account.id,
            participant_id: snapshot.participant.id,
            day,
        });
    }
    require_balance(snapshot.account.balance, policy.vote_cost)?;

    Ok(VoteDelta {
        vote: VoteRecord {
            vote_id: VoteId::generate(),
            account_id: snapshot.account.id,
            participant_id: snapshot.participant.id,
            day,
            cast_at: now,
        },
        cost: policy.vote_cost,
        points_awarded: policy.vote_points_award,
    })
}
