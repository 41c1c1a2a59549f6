//! Ledger invariants under random action sequences.

use chrono::{DateTime, Duration, TimeZone, Utc};
use fanledger_service::{LedgerError, TransactionCoordinator};
use fanledger_storage::memory::InMemoryLedgerStore;
use fanledger_storage::{
    AccountStore, ActionLogStore, LedgerStore, ObjectiveStore, ParticipantStore, QueryWindow,
};
use fanledger_types::{
    calendar_day, AccountId, EconomyPolicy, NewObjective, NewParticipant, ObjectiveId,
    ParticipantId,
};
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;

const ACCOUNTS: usize = 3;
const PARTICIPANTS: usize = 3;
const OBJECTIVES: usize = 2;
const DAYS: i64 = 3;

#[derive(Debug, Clone)]
enum Action {
    Credit { account: usize, amount: i64 },
    Vote { account: usize, participant: usize, day: i64 },
    Ally { account: usize, participant: usize },
    Donate { account: usize, objective: usize, amount: i64 },
}

fn action_strategy() -> impl Strategy<Value = Action> {
    prop_oneof![
        (0..ACCOUNTS, 1i64..120).prop_map(|(account, amount)| Action::Credit { account, amount }),
        (0..ACCOUNTS, 0..PARTICIPANTS, 0..DAYS).prop_map(|(account, participant, day)| {
            Action::Vote {
                account,
                participant,
                day,
            }
        }),
        (0..ACCOUNTS, 0..PARTICIPANTS)
            .prop_map(|(account, participant)| Action::Ally { account, participant }),
        (0..ACCOUNTS, 0..OBJECTIVES, -5i64..80).prop_map(|(account, objective, amount)| {
            Action::Donate {
                account,
                objective,
                amount,
            }
        }),
    ]
}

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap()
}

struct World {
    store: Arc<dyn LedgerStore>,
    coordinator: TransactionCoordinator,
    accounts: Vec<AccountId>,
    participants: Vec<ParticipantId>,
    objectives: Vec<ObjectiveId>,
    credited: i64,
}

async fn world() -> World {
    let store: Arc<dyn LedgerStore> = Arc::new(InMemoryLedgerStore::new());
    let mut accounts = Vec::new();
    for i in 0..ACCOUNTS {
        accounts.push(store.open_account(&format!("fan{i}"), start()).await.unwrap().id);
    }
    let mut participants = Vec::new();
    for i in 0..PARTICIPANTS {
        let p = store
            .create_participant(NewParticipant::named(format!("p{i}")))
            .await
            .unwrap();
        participants.push(p.id);
    }
    let mut objectives = Vec::new();
    for i in 0..OBJECTIVES {
        let o = store
            .create_objective(
                NewObjective {
                    participant_id: participants[i],
                    title: format!("goal {i}"),
                    description: None,
                    threshold: 60 + 40 * i as i64,
                },
                start(),
            )
            .await
            .unwrap();
        objectives.push(o.id);
    }

    World {
        coordinator: TransactionCoordinator::new(store.clone(), EconomyPolicy::default()),
        store,
        accounts,
        participants,
        objectives,
        credited: 0,
    }
}

async fn run(world: &mut World, actions: &[Action]) {
    for (step, action) in actions.iter().enumerate() {
        let now = start() + Duration::minutes(step as i64);
        let result = match *action {
            Action::Credit { account, amount } => {
                world
                    .store
                    .credit_account(world.accounts[account], amount)
                    .await
                    .unwrap();
                world.credited += amount;
                Ok(())
            }
            Action::Vote {
                account,
                participant,
                day,
            } => world
                .coordinator
                .vote(
                    world.accounts[account],
                    world.participants[participant],
                    now + Duration::days(day),
                )
                .await
                .map(|_| ()),
            Action::Ally {
                account,
                participant,
            } => world
                .coordinator
                .ally(world.accounts[account], world.participants[participant], now)
                .await
                .map(|_| ()),
            Action::Donate {
                account,
                objective,
                amount,
            } => world
                .coordinator
                .donate(world.accounts[account], world.objectives[objective], amount, now)
                .await
                .map(|_| ()),
        };

        // Sequential execution never loses a race.
        match result {
            Ok(())
            | Err(LedgerError::InsufficientBalance { .. })
            | Err(LedgerError::DuplicateAction(_))
            | Err(LedgerError::InvalidAmount(_))
            | Err(LedgerError::ObjectiveClosed(_)) => {}
            Err(other) => panic!("unexpected error at step {step}: {other}"),
        }
    }
}

async fn check_invariants(world: &World) {
    let policy = EconomyPolicy::default();
    let mut balances = 0;
    let mut alliances_formed = 0;

    for &account in &world.accounts {
        let balance = world.store.get_account(account).await.unwrap().unwrap().balance;
        assert!(balance >= 0, "account {account} went negative: {balance}");
        balances += balance;

        let history = world
            .store
            .list_alliances(account, QueryWindow::default())
            .await
            .unwrap();
        assert!(history.iter().filter(|a| a.is_open()).count() <= 1);
        alliances_formed += history.len() as i64;

        for day in 0..DAYS {
            let day = calendar_day(start() + Duration::days(day));
            let votes = world.store.votes_on_day(account, day).await.unwrap();
            let distinct: HashSet<_> = votes.iter().map(|v| v.participant_id).collect();
            assert_eq!(distinct.len(), votes.len());
        }
    }

    for objective in world.store.list_objectives(false).await.unwrap() {
        assert_eq!(objective.active, objective.accumulated < objective.threshold);
    }

    let votes_cast: i64 = world.store.vote_counts().await.unwrap().values().sum();
    let donated: i64 = world.store.donation_totals().await.unwrap().values().sum();
    let spent = votes_cast * policy.vote_cost + alliances_formed * policy.alliance_cost + donated;
    assert_eq!(balances + spent, world.credited, "points were created or lost");

    let points: i64 = world
        .store
        .list_participants()
        .await
        .unwrap()
        .iter()
        .map(|p| p.points_total)
        .sum();
    assert_eq!(points, votes_cast * policy.vote_points_award);

    let report = fanledger_service::queries::reconcile(world.store.as_ref(), &policy)
        .await
        .unwrap();
    assert!(report.is_clean(), "{report:?}");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn random_sequences_preserve_ledger_invariants(
        actions in prop::collection::vec(action_strategy(), 1..60)
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            let mut world = world().await;
            run(&mut world, &actions).await;
            check_invariants(&world).await;
        });
    }
}
