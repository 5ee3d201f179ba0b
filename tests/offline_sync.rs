//! Cross-component scenarios: remote-first writes, outbox queueing and
//! replay, degraded reads, balance consistency, and store migration.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate};
use rust_decimal::Decimal;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use finsync::ApiClient;
use finsync::models::{
    AccountBrief, AccountId, BankAccount, Category, CategoryId, Direction, Transaction,
    TransactionId, UserId,
};
use finsync::outbox::{ActionKind, MemoryOutbox, Outbox};
use finsync::service::{
    BalanceService, BankAccountsService, CategoriesService, TransactionsService, migrate_all,
};
use finsync::storage::{
    AccountStore, CategoryStore, MemoryStore, SqliteStore, TransactionStore,
};

/// A base URL nothing listens on; requests fail at the transport layer.
const DEAD_URL: &str = "http://127.0.0.1:1";

type AccountsSvc = BankAccountsService<MemoryStore, MemoryOutbox<AccountId, BankAccount>>;
type TransactionsSvc = TransactionsService<
    MemoryStore,
    MemoryOutbox<TransactionId, Transaction>,
    MemoryStore,
    MemoryOutbox<AccountId, BankAccount>,
>;

struct Harness {
    store: Arc<MemoryStore>,
    tx_outbox: Arc<MemoryOutbox<TransactionId, Transaction>>,
    acc_outbox: Arc<MemoryOutbox<AccountId, BankAccount>>,
    accounts: Arc<AccountsSvc>,
    transactions: TransactionsSvc,
}

fn harness_with(
    base_url: &str,
    store: Arc<MemoryStore>,
    tx_outbox: Arc<MemoryOutbox<TransactionId, Transaction>>,
    acc_outbox: Arc<MemoryOutbox<AccountId, BankAccount>>,
) -> Harness {
    let client = ApiClient::builder()
        .token("test-token")
        .base_url(base_url)
        .build()
        .unwrap();
    let accounts = Arc::new(BankAccountsService::new(
        client.clone(),
        Arc::clone(&store),
        Arc::clone(&acc_outbox),
    ));
    let transactions = TransactionsService::new(
        client,
        Arc::clone(&store),
        Arc::clone(&tx_outbox),
        Arc::clone(&accounts),
    );
    Harness {
        store,
        tx_outbox,
        acc_outbox,
        accounts,
        transactions,
    }
}

fn harness(base_url: &str) -> Harness {
    harness_with(
        base_url,
        Arc::new(MemoryStore::new()),
        Arc::new(MemoryOutbox::new()),
        Arc::new(MemoryOutbox::new()),
    )
}

fn main_account(balance: &str) -> BankAccount {
    let at = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
    BankAccount {
        id: AccountId::new(1),
        user_id: UserId::new(10),
        name: "Main".to_owned(),
        balance: balance.parse().unwrap(),
        currency: "RUB".to_owned(),
        created_at: at,
        updated_at: at,
    }
}

fn taxi() -> Category {
    Category {
        id: CategoryId::new(2),
        name: "Taxi".to_owned(),
        emoji: "🚕".to_owned(),
        direction: Direction::Outcome,
    }
}

fn draft(id: i64, amount: &str, account_balance: &str) -> Transaction {
    let at = DateTime::from_timestamp(1_750_000_000, 0).unwrap();
    Transaction {
        id: TransactionId::new(id),
        account: AccountBrief {
            id: AccountId::new(1),
            name: "Main".to_owned(),
            balance: account_balance.parse().unwrap(),
            currency: "RUB".to_owned(),
        },
        category: taxi(),
        amount: amount.parse().unwrap(),
        transaction_date: at,
        comment: "airport".to_owned(),
        created_at: at,
        updated_at: at,
    }
}

fn transaction_json(id: i64, amount: &str) -> serde_json::Value {
    json!({
        "id": id,
        "account": {"id": 1, "name": "Main", "balance": "100", "currency": "RUB"},
        "category": {"id": 2, "name": "Taxi", "emoji": "🚕", "direction": "outcome"},
        "amount": amount,
        "transactionDate": "2025-06-15T15:06:40.000Z",
        "comment": "airport",
        "createdAt": "2025-06-15T15:06:40.000Z",
        "updatedAt": "2025-06-15T15:06:40.000Z"
    })
}

fn account_json(balance: &str) -> serde_json::Value {
    json!({
        "id": 1,
        "userId": 10,
        "name": "Main",
        "balance": balance,
        "currency": "RUB",
        "createdAt": "2023-11-14T22:13:20.000Z",
        "updatedAt": "2025-06-15T15:06:40.000Z"
    })
}

/// Responds to `PUT /accounts/{id}` the way the server does: echoes the
/// requested fields back inside the full account body.
struct EchoAccountUpdate;

impl Respond for EchoAccountUpdate {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
        ResponseTemplate::new(200).set_body_json(json!({
            "id": 1,
            "userId": 10,
            "name": body["name"],
            "balance": body["balance"],
            "currency": body["currency"],
            "createdAt": "2023-11-14T22:13:20.000Z",
            "updatedAt": "2025-06-15T15:06:40.000Z"
        }))
    }
}

#[tokio::test]
async fn create_success_mirrors_and_settles_balance() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/transactions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(transaction_json(7, "40.00")))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/accounts/1"))
        .respond_with(EchoAccountUpdate)
        .mount(&server)
        .await;

    let h = harness(&server.uri());
    assert!(h.store.create_account(&main_account("100")).await.unwrap());

    let created = h.transactions.create(&draft(7, "40.00", "100")).await.unwrap();
    assert_eq!(created.id, TransactionId::new(7));

    let stored = h.store.transactions().await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, TransactionId::new(7));

    let account = h.accounts.get(AccountId::new(1)).await.unwrap();
    assert_eq!(account.balance, Decimal::from(60));

    assert!(h.tx_outbox.get_all().await.unwrap().is_empty());
    assert!(h.acc_outbox.get_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn create_offline_queues_and_leaves_store_untouched() {
    let h = harness(DEAD_URL);
    assert!(h.store.create_account(&main_account("100")).await.unwrap());

    let err = h.transactions.create(&draft(7, "40.00", "100")).await.unwrap_err();
    assert!(err.is_offline());

    // The local store only ever mirrors server-confirmed state.
    assert!(h.store.transactions().await.unwrap().is_empty());
    let account = h.accounts.get(AccountId::new(1)).await.unwrap();
    assert_eq!(account.balance, Decimal::from(100));

    let pending = h.tx_outbox.get_all().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, TransactionId::new(7));
    assert_eq!(pending[0].kind, ActionKind::Create);
    assert_eq!(
        pending[0].payload.as_ref().unwrap().amount,
        Decimal::from(40)
    );

    // The would-be balance rides along in the account outbox.
    let compensating = h.acc_outbox.get_all().await.unwrap();
    assert_eq!(compensating.len(), 1);
    assert_eq!(compensating[0].id, AccountId::new(1));
    assert_eq!(compensating[0].kind, ActionKind::Update);
    assert_eq!(
        compensating[0].payload.as_ref().unwrap().balance,
        Decimal::from(60)
    );
}

#[tokio::test]
async fn successive_offline_creates_accumulate_compensating_balance() {
    let h = harness(DEAD_URL);
    assert!(h.store.create_account(&main_account("100")).await.unwrap());

    h.transactions
        .create(&draft(7, "40.00", "100"))
        .await
        .unwrap_err();
    h.transactions
        .create(&draft(8, "10.00", "100"))
        .await
        .unwrap_err();

    // Both transaction drafts stay queued under their own ids.
    assert_eq!(h.tx_outbox.get_all().await.unwrap().len(), 2);

    // The single compensating entry carries the sum of both deltas:
    // 100 - 40 - 10, not 100 - 10.
    let compensating = h.acc_outbox.get_all().await.unwrap();
    assert_eq!(compensating.len(), 1);
    assert_eq!(
        compensating[0].payload.as_ref().unwrap().balance,
        Decimal::from(50)
    );
}

#[tokio::test]
async fn retried_create_clears_stale_draft_entry() {
    let store = Arc::new(MemoryStore::new());
    let tx_outbox = Arc::new(MemoryOutbox::new());
    let acc_outbox = Arc::new(MemoryOutbox::new());

    let offline = harness_with(
        DEAD_URL,
        Arc::clone(&store),
        Arc::clone(&tx_outbox),
        Arc::clone(&acc_outbox),
    );
    assert!(offline.store.create_account(&main_account("100")).await.unwrap());
    offline
        .transactions
        .create(&draft(7, "40.00", "100"))
        .await
        .unwrap_err();
    assert_eq!(tx_outbox.get_all().await.unwrap().len(), 1);

    // The server assigns id 99, not the draft's placeholder 7.
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/transactions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(transaction_json(99, "40.00")))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/accounts/1"))
        .respond_with(EchoAccountUpdate)
        .mount(&server)
        .await;

    let online = harness_with(&server.uri(), store, tx_outbox, acc_outbox);
    let created = online
        .transactions
        .create(&draft(7, "40.00", "100"))
        .await
        .unwrap();
    assert_eq!(created.id, TransactionId::new(99));

    // No stale entry survives under the placeholder id.
    assert!(online.tx_outbox.get_all().await.unwrap().is_empty());
    let stored = online.store.transactions().await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, TransactionId::new(99));
}

#[tokio::test]
async fn refresh_prunes_accounts_deleted_server_side() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/accounts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([account_json("100")])))
        .mount(&server)
        .await;

    let h = harness(&server.uri());
    assert!(h.store.create_account(&main_account("100")).await.unwrap());
    let mut removed_remotely = main_account("55");
    removed_remotely.id = AccountId::new(2);
    removed_remotely.name = "Closed".to_owned();
    assert!(h.store.create_account(&removed_remotely).await.unwrap());

    let fetched = h.accounts.get_all(true).await.unwrap();
    assert_eq!(fetched.len(), 1);

    let stored = h.store.accounts().await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, AccountId::new(1));
}

#[tokio::test]
async fn flush_replays_queued_actions_in_order() {
    let store = Arc::new(MemoryStore::new());
    let tx_outbox = Arc::new(MemoryOutbox::new());
    let acc_outbox = Arc::new(MemoryOutbox::new());

    let offline = harness_with(
        DEAD_URL,
        Arc::clone(&store),
        Arc::clone(&tx_outbox),
        Arc::clone(&acc_outbox),
    );
    assert!(offline.store.create_account(&main_account("100")).await.unwrap());
    offline
        .transactions
        .create(&draft(7, "40.00", "100"))
        .await
        .unwrap_err();

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/transactions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(transaction_json(7, "40.00")))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/accounts/1"))
        .respond_with(EchoAccountUpdate)
        .mount(&server)
        .await;

    let online = harness_with(&server.uri(), store, tx_outbox, acc_outbox);
    assert_eq!(online.transactions.flush_pending().await.unwrap(), 1);
    assert_eq!(online.accounts.flush_pending().await.unwrap(), 1);

    assert!(online.tx_outbox.get_all().await.unwrap().is_empty());
    assert!(online.acc_outbox.get_all().await.unwrap().is_empty());
    assert_eq!(online.store.transactions().await.unwrap().len(), 1);
    let account = online.accounts.get(AccountId::new(1)).await.unwrap();
    assert_eq!(account.balance, Decimal::from(60));
}

#[tokio::test]
async fn flush_stops_while_still_offline() {
    let h = harness(DEAD_URL);
    assert!(h.store.create_account(&main_account("100")).await.unwrap());
    h.transactions
        .create(&draft(7, "40.00", "100"))
        .await
        .unwrap_err();

    assert_eq!(h.transactions.flush_pending().await.unwrap(), 0);
    assert_eq!(h.tx_outbox.get_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn reads_degrade_to_cache_when_offline() {
    let h = harness(DEAD_URL);
    assert!(h.store.create_account(&main_account("100")).await.unwrap());

    // A forced refresh still serves the cached copy.
    let accounts = h.accounts.get_all(true).await.unwrap();
    assert_eq!(accounts, vec![main_account("100")]);

    // With nothing cached there is nothing to degrade to.
    let empty = harness(DEAD_URL);
    let err = empty.accounts.get_all(false).await.unwrap_err();
    assert!(err.is_offline());
}

#[tokio::test]
async fn period_read_fetches_mirrors_and_sorts() {
    let server = MockServer::start().await;
    let later = transaction_json(8, "15.00");
    let mut earlier = transaction_json(7, "40.00");
    earlier["transactionDate"] = json!("2025-06-10T09:00:00.000Z");
    Mock::given(method("GET"))
        .and(path("/transactions/account/1/period"))
        .and(query_param("startDate", "2025-06-01"))
        .and(query_param("endDate", "2025-06-30"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([later, earlier])))
        .mount(&server)
        .await;

    let h = harness(&server.uri());
    let start = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
    let end = NaiveDate::from_ymd_opt(2025, 6, 30).unwrap();
    let fetched = h
        .transactions
        .get_for_period(AccountId::new(1), start, end, false)
        .await
        .unwrap();

    assert_eq!(fetched.len(), 2);
    assert_eq!(fetched[0].id, TransactionId::new(7));
    assert_eq!(fetched[1].id, TransactionId::new(8));
    assert_eq!(h.store.transactions().await.unwrap().len(), 2);

    // A later offline read serves the mirrored window.
    let offline = harness_with(
        DEAD_URL,
        Arc::clone(&h.store),
        Arc::new(MemoryOutbox::new()),
        Arc::new(MemoryOutbox::new()),
    );
    let cached = offline
        .transactions
        .get_for_period(AccountId::new(1), start, end, false)
        .await
        .unwrap();
    assert_eq!(cached.len(), 2);
}

#[tokio::test]
async fn refresh_upsert_is_idempotent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/accounts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([account_json("100")])))
        .mount(&server)
        .await;

    let h = harness(&server.uri());
    h.accounts.get_all(true).await.unwrap();
    h.accounts.get_all(true).await.unwrap();

    let stored = h.store.accounts().await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].balance, Decimal::from(100));
}

#[tokio::test]
async fn balance_apply_then_reverse_is_exact() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/accounts/1"))
        .respond_with(EchoAccountUpdate)
        .mount(&server)
        .await;

    let h = harness(&server.uri());
    assert!(h.store.create_account(&main_account("100.05")).await.unwrap());
    let balance = BalanceService::new(Arc::clone(&h.accounts));

    let tx = draft(7, "40.10", "100.05");
    balance.apply_effect(&tx).await.unwrap();
    let shifted = h.accounts.get(AccountId::new(1)).await.unwrap();
    assert_eq!(shifted.balance, "59.95".parse::<Decimal>().unwrap());

    balance.reverse_effect(&tx).await.unwrap();
    let restored = h.accounts.get(AccountId::new(1)).await.unwrap();
    assert_eq!(restored.balance, "100.05".parse::<Decimal>().unwrap());
}

#[tokio::test]
async fn account_update_rolls_back_and_queues_when_offline() {
    let h = harness(DEAD_URL);
    assert!(h.store.create_account(&main_account("100")).await.unwrap());

    let mut renamed = main_account("100");
    renamed.name = "Salary card".to_owned();
    let err = h.accounts.update(&renamed).await.unwrap_err();
    assert!(err.is_offline());

    let stored = h.accounts.get(AccountId::new(1)).await.unwrap();
    assert_eq!(stored.name, "Main");

    let pending = h.acc_outbox.get_all().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].payload.as_ref().unwrap().name, "Salary card");
}

#[tokio::test]
async fn categories_refresh_replaces_wholesale() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/categories"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 2, "name": "Taxi", "emoji": "🚕", "direction": "outcome"},
            {"id": 3, "name": "Salary", "emoji": "💰", "direction": "income"}
        ])))
        .mount(&server)
        .await;

    let client = ApiClient::builder()
        .token("test-token")
        .base_url(server.uri())
        .build()
        .unwrap();
    let store = Arc::new(MemoryStore::new());
    let stale = Category {
        id: CategoryId::new(99),
        name: "Old".to_owned(),
        emoji: "🗑".to_owned(),
        direction: Direction::Income,
    };
    assert!(store.create_category(&stale).await.unwrap());

    let service = CategoriesService::new(client, Arc::clone(&store));
    let fetched = service.get_all(true).await.unwrap();
    assert_eq!(fetched.len(), 2);
    assert_eq!(store.categories().await.unwrap(), fetched);

    let income = service.by_direction(Direction::Income).await.unwrap();
    assert_eq!(income.len(), 1);
    assert_eq!(income[0].id, CategoryId::new(3));

    let all = service.by_direction(Direction::All).await.unwrap();
    assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn migration_copies_every_collection() {
    let from = MemoryStore::new();
    assert!(from.create_transaction(&draft(7, "40.00", "100")).await.unwrap());
    assert!(from.create_transaction(&draft(8, "15.00", "100")).await.unwrap());
    assert!(from.create_account(&main_account("100")).await.unwrap());
    from.replace_categories(&[taxi()]).await.unwrap();

    let to = SqliteStore::in_memory().unwrap();
    let report = migrate_all(&from, &to).await;

    assert!(report.is_complete());
    assert_eq!(report.transactions, Some(2));
    assert_eq!(report.accounts, Some(1));
    assert_eq!(report.categories, Some(1));

    assert_eq!(to.transactions().await.unwrap().len(), 2);
    assert_eq!(to.accounts().await.unwrap().len(), 1);
    assert_eq!(to.categories().await.unwrap(), vec![taxi()]);
}

#[tokio::test]
async fn migration_skips_entities_already_present() {
    let from = MemoryStore::new();
    assert!(from.create_account(&main_account("100")).await.unwrap());

    let to = MemoryStore::new();
    let mut diverged = main_account("250");
    diverged.name = "Target copy".to_owned();
    assert!(to.create_account(&diverged).await.unwrap());

    let report = migrate_all(&from, &to).await;
    assert!(report.is_complete());
    assert_eq!(report.accounts, Some(0));
    assert_eq!(to.accounts().await.unwrap(), vec![diverged]);
}

#[tokio::test]
async fn server_rejection_propagates_without_queueing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/transactions"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({"error": "bad category"})))
        .mount(&server)
        .await;

    let h = harness(&server.uri());
    assert!(h.store.create_account(&main_account("100")).await.unwrap());

    let err = h.transactions.create(&draft(7, "40.00", "100")).await.unwrap_err();
    assert!(matches!(err, finsync::SyncError::Http { status: 422, .. }));
    assert!(h.tx_outbox.get_all().await.unwrap().is_empty());
    assert!(h.acc_outbox.get_all().await.unwrap().is_empty());
}
