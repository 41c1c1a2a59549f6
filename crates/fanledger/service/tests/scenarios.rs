//! End-to-end ledger scenarios against the in-memory store.

use chrono::{DateTime, Duration, TimeZone, Utc};
use fanledger_service::{FanLedger, LedgerError, TransactionCoordinator};
use fanledger_storage::memory::InMemoryLedgerStore;
use fanledger_storage::{
    AccountStore, ActionLogStore, LedgerStore, ParticipantStore, QueryWindow,
};
use fanledger_types::{AccountId, EconomyPolicy, NewObjective, NewParticipant, ParticipantId};
use std::sync::Arc;

fn noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap()
}

struct Fixture {
    ledger: FanLedger,
    store: Arc<dyn LedgerStore>,
}

impl Fixture {
    fn new() -> Self {
        let store: Arc<dyn LedgerStore> = Arc::new(InMemoryLedgerStore::new());
        let ledger =
            FanLedger::with_storage(store.clone(), EconomyPolicy::default()).with_clock(noon);
        Self { ledger, store }
    }

    fn coordinator(&self) -> &TransactionCoordinator {
        self.ledger.coordinator()
    }

    async fn account(&self, nickname: &str, balance: i64) -> AccountId {
        let account = self.ledger.open_account(nickname).await.unwrap();
        if balance > 0 {
            self.ledger.credit_points(account.id, balance).await.unwrap();
        }
        account.id
    }

    async fn participant(&self, name: &str) -> ParticipantId {
        self.ledger
            .add_participant(NewParticipant::named(name))
            .await
            .unwrap()
            .id
    }

    async fn balance(&self, account: AccountId) -> i64 {
        self.store.get_account(account).await.unwrap().unwrap().balance
    }
}

#[tokio::test]
async fn vote_spends_exact_balance_then_duplicate_leaves_it_unchanged() {
    let fx = Fixture::new();
    let account = fx.account("ana", 10).await;
    let p = fx.participant("Lola").await;

    let receipt = fx.coordinator().vote(account, p, noon()).await.unwrap();
    assert_eq!(receipt.balance_after, 0);
    assert_eq!(receipt.participant_votes, 1);
    assert_eq!(receipt.participant_points, 10);

    let err = fx.coordinator().vote(account, p, noon()).await.unwrap_err();
    assert!(matches!(err, LedgerError::DuplicateAction(_)));
    assert_eq!(fx.balance(account).await, 0);

    // A different participant the same day runs into the empty balance.
    let other = fx.participant("Pepe").await;
    let err = fx.coordinator().vote(account, other, noon()).await.unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientBalance { .. }));
}

#[tokio::test]
async fn vote_next_day_is_allowed() {
    let fx = Fixture::new();
    let account = fx.account("ana", 50).await;
    let p = fx.participant("Lola").await;

    fx.coordinator().vote(account, p, noon()).await.unwrap();
    let receipt = fx
        .coordinator()
        .vote(account, p, noon() + Duration::days(1))
        .await
        .unwrap();
    assert_eq!(receipt.participant_votes, 2);
    assert_eq!(receipt.balance_after, 30);
}

#[tokio::test]
async fn alliance_without_points_creates_nothing() {
    let fx = Fixture::new();
    let account = fx.account("ana", 5).await;
    let p = fx.participant("Lola").await;

    let outcome = fx.ledger.submit_alliance(account, p).await;
    assert!(!outcome.is_ok());
    assert_eq!(outcome.code.as_deref(), Some("insufficient_balance"));

    assert!(fx.store.open_alliance(account).await.unwrap().is_none());
    let history = fx
        .store
        .list_alliances(account, QueryWindow::default())
        .await
        .unwrap();
    assert!(history.is_empty());
    assert_eq!(fx.balance(account).await, 5);
}

#[tokio::test]
async fn switching_alliance_leaves_one_open() {
    let fx = Fixture::new();
    let account = fx.account("ana", 100).await;
    let p1 = fx.participant("Lola").await;
    let p2 = fx.participant("Pepe").await;

    fx.coordinator().ally(account, p1, noon()).await.unwrap();
    fx.coordinator()
        .ally(account, p2, noon() + Duration::hours(1))
        .await
        .unwrap();

    let history = fx
        .store
        .list_alliances(account, QueryWindow::default())
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
    let open: Vec<_> = history.iter().filter(|a| a.is_open()).collect();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].participant_id, p2);

    let closed = history.iter().find(|a| a.participant_id == p1).unwrap();
    assert_eq!(closed.ended_at, Some(noon() + Duration::hours(1)));

    assert_eq!(fx.store.open_alliance_count(p1).await.unwrap(), 0);
    assert_eq!(fx.store.open_alliance_count(p2).await.unwrap(), 1);
    assert_eq!(fx.balance(account).await, 0);
}

#[tokio::test]
async fn objective_closes_after_threshold_is_crossed() {
    let fx = Fixture::new();
    let first = fx.account("ana", 60).await;
    let second = fx.account("bea", 60).await;
    let third = fx.account("cris", 60).await;
    let p = fx.participant("Lola").await;
    let objective = fx
        .ledger
        .add_objective(NewObjective {
            participant_id: p,
            title: "New outfit".into(),
            description: None,
            threshold: 100,
        })
        .await
        .unwrap();

    let r1 = fx
        .coordinator()
        .donate(first, objective.id, 60, noon())
        .await
        .unwrap();
    assert!(r1.objective_active);

    let r2 = fx
        .coordinator()
        .donate(second, objective.id, 60, noon())
        .await
        .unwrap();
    assert_eq!(r2.objective_accumulated, 120);
    assert!(!r2.objective_active);

    let err = fx
        .coordinator()
        .donate(third, objective.id, 60, noon())
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::ObjectiveClosed(id) if id == objective.id));
    assert_eq!(fx.balance(third).await, 60);

    let report = fx.ledger.reconcile().await.unwrap();
    assert!(report.is_clean(), "{report:?}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_votes_commit_exactly_once() {
    let fx = Fixture::new();
    let account = fx.account("ana", 100).await;
    let p = fx.participant("Lola").await;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let coordinator = fx.coordinator().clone();
            tokio::spawn(async move { coordinator.vote(account, p, noon()).await })
        })
        .collect();

    let mut committed = 0;
    for handle in futures::future::join_all(handles).await {
        match handle.unwrap() {
            Ok(_) => committed += 1,
            Err(LedgerError::DuplicateAction(_)) | Err(LedgerError::Conflict(_)) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(committed, 1);
    assert_eq!(fx.balance(account).await, 90);
    let participant = fx.store.list_participants().await.unwrap();
    assert_eq!(participant[0].votes_received, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_spending_never_overdraws() {
    let fx = Fixture::new();
    let account = fx.account("ana", 100).await;
    let participants: Vec<ParticipantId> = {
        let mut ids = Vec::new();
        for i in 0..6 {
            ids.push(fx.participant(&format!("p{i}")).await);
        }
        ids
    };

    let mut handles = Vec::new();
    for p in participants.iter().copied() {
        let coordinator = fx.coordinator().clone();
        handles.push(tokio::spawn(async move {
            coordinator.ally(account, p, noon()).await.map(|_| ())
        }));
    }

    let results = futures::future::join_all(handles).await;
    let committed = results
        .into_iter()
        .filter(|r| matches!(r, Ok(Ok(()))))
        .count();

    assert_eq!(committed, 2);
    assert_eq!(fx.balance(account).await, 0);
    let open: Vec<_> = fx
        .store
        .list_alliances(account, QueryWindow::default())
        .await
        .unwrap()
        .into_iter()
        .filter(|a| a.is_open())
        .collect();
    assert_eq!(open.len(), 1);
}

#[tokio::test]
async fn donation_past_the_counter_range_is_refused_and_ledger_keeps_working() {
    let fx = Fixture::new();
    let whale = fx.account("ana", i64::MAX - 1).await;
    let fan = fx.account("bea", 10).await;
    let p = fx.participant("Lola").await;
    let objective = fx
        .ledger
        .add_objective(NewObjective {
            participant_id: p,
            title: "Tour bus".into(),
            description: None,
            threshold: i64::MAX,
        })
        .await
        .unwrap();

    let outcome = fx
        .ledger
        .submit_donation(whale, objective.id, i64::MAX - 1)
        .await;
    assert!(outcome.is_ok(), "{outcome:?}");

    let outcome = fx.ledger.submit_donation(fan, objective.id, 5).await;
    assert_eq!(outcome.code.as_deref(), Some("invalid_amount"));
    assert_eq!(fx.balance(fan).await, 10);

    let outcome = fx.ledger.submit_vote(fan, p).await;
    assert!(outcome.is_ok(), "{outcome:?}");
    let home = fx.ledger.home_view(Some(fan)).await.unwrap();
    assert_eq!(home.participants[0].participant.votes_received, 1);

    let report = fx.ledger.reconcile().await.unwrap();
    assert!(report.is_clean(), "{report:?}");
}
