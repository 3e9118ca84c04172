//! End-to-end requests through the dispatcher on a SQLite file database

use banco_business::{ErrorKind, ManualClock, UserRegistration, UserService};
use banco_core::{Actor, UserRole};
use banco_persistence::{SqliteStore, StoreConfig};
use banco_rpc::{context, Dispatcher, RpcRequest, RpcResponse};
use chrono::{Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use std::str::FromStr;
use std::sync::Arc;
use tempfile::TempDir;

struct Harness {
    _dir: TempDir,
    store: SqliteStore,
    dispatcher: Dispatcher,
    clock: Arc<ManualClock>,
    teller: i64,
}

async fn harness() -> Harness {
    let dir = TempDir::new().unwrap();
    let url = format!("sqlite:{}", dir.path().join("data").join("banco.db").display());
    context::ensure_parent_dir(&url).unwrap();

    let (store, ctx) = context::open(&StoreConfig::new(&url)).await.unwrap();
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 7, 1, 9, 0, 0).unwrap(),
    ));
    let ctx = ctx.with_clock(clock.clone());

    let teller = UserService::new(&ctx)
        .register(
            Actor::System,
            UserRegistration {
                full_name: "Ana Torres".to_string(),
                identification: "T-100".to_string(),
                email: "ana@banco.co".to_string(),
                phone: "3001112233".to_string(),
                birth_date: None,
                address: "Calle 10 # 4-21".to_string(),
                role: UserRole::TellerEmployee,
                password: "secret1".to_string(),
                company_id: None,
            },
        )
        .await
        .unwrap();

    Harness {
        _dir: dir,
        store,
        dispatcher: Dispatcher::new(ctx),
        clock,
        teller: teller.id,
    }
}

impl Harness {
    async fn call(&self, caller: Option<i64>, method: &str, params: Value) -> RpcResponse {
        let mut request = RpcRequest::new(method, params);
        request.caller = caller;
        self.dispatcher.handle(request).await
    }

    async fn ok(&self, caller: Option<i64>, method: &str, params: Value) -> Value {
        let response = self.call(caller, method, params).await;
        assert!(response.ok, "{} failed: {:?}", method, response.error);
        response.result.unwrap()
    }

    async fn err(&self, caller: Option<i64>, method: &str, params: Value) -> ErrorKind {
        let response = self.call(caller, method, params).await;
        assert!(!response.ok, "{} unexpectedly succeeded", method);
        response.error.unwrap().kind
    }

    /// Register a user through the teller and return its id
    async fn user(&self, identification: &str, role: &str) -> i64 {
        let user = self
            .ok(
                Some(self.teller),
                "users.register",
                json!({
                    "full_name": format!("User {}", identification),
                    "identification": identification,
                    "email": format!("{}@banco.co", identification.to_lowercase()),
                    "phone": "3005556677",
                    "address": "Avenida 68 # 100-20",
                    "role": role,
                    "password": "password1",
                }),
            )
            .await;
        user["id"].as_i64().unwrap()
    }

    async fn funded_account(&self, owner: &str, amount: &str) -> String {
        let account = self
            .ok(
                Some(self.teller),
                "accounts.open",
                json!({"owner_id": owner, "account_type": "corporate"}),
            )
            .await;
        let number = account["number"].as_str().unwrap().to_string();
        self.ok(
            Some(self.teller),
            "accounts.adjust_balance",
            json!({"account_number": number, "delta": amount}),
        )
        .await;
        number
    }

    async fn balance(&self, number: &str) -> Decimal {
        let account = self
            .ok(None, "accounts.get", json!({"account_number": number}))
            .await;
        Decimal::from_str(account["balance"].as_str().unwrap()).unwrap()
    }
}

#[tokio::test]
async fn test_login_and_bad_credentials() {
    let h = harness().await;

    let user = h
        .ok(
            None,
            "auth.login",
            json!({"identification": "T-100", "password": "secret1"}),
        )
        .await;
    assert_eq!(user["role"], "teller_employee");
    assert!(user.get("password_hash").is_none());

    let kind = h
        .err(
            None,
            "auth.login",
            json!({"identification": "T-100", "password": "wrong-one"}),
        )
        .await;
    assert_eq!(kind, ErrorKind::InvalidState);

    let kind = h
        .err(
            None,
            "auth.login",
            json!({"identification": "NOPE-1", "password": "secret1"}),
        )
        .await;
    assert_eq!(kind, ErrorKind::NotFound);

    h.store.close().await;
}

#[tokio::test]
async fn test_corporate_transfer_held_then_approved() {
    let h = harness().await;
    h.user("NIT-9001", "client_company").await;
    h.user("NIT-9002", "client_company").await;
    let employee = h.user("E-400", "company_employee").await;
    let supervisor = h.user("S-300", "company_supervisor").await;

    let source = h.funded_account("NIT-9001", "8000000.00").await;
    let destination = h.funded_account("NIT-9002", "100").await;

    let transfer = h
        .ok(
            Some(employee),
            "transfers.create",
            json!({
                "source_account": source,
                "destination_account": destination,
                "amount": "6000000.00",
                "is_corporate": true,
                "memo": "Payroll July",
            }),
        )
        .await;
    assert_eq!(transfer["status"], "pending_approval");
    let id = transfer["id"].as_i64().unwrap();

    // Held transfers do not move money
    assert_eq!(h.balance(&source).await, dec!(8000000));
    let pending = h.ok(None, "transfers.pending", Value::Null).await;
    assert_eq!(pending.as_array().unwrap().len(), 1);

    // Only a supervisor may decide
    let kind = h
        .err(Some(employee), "transfers.approve", json!({"transfer_id": id}))
        .await;
    assert_eq!(kind, ErrorKind::InvalidState);

    h.clock.advance(Duration::minutes(30));
    let approved = h
        .ok(Some(supervisor), "transfers.approve", json!({"transfer_id": id}))
        .await;
    assert_eq!(approved["status"], "executed");
    assert_eq!(approved["approver_id"].as_i64(), Some(supervisor));

    assert_eq!(h.balance(&source).await, dec!(2000000));
    assert_eq!(h.balance(&destination).await, dec!(6000100));

    let trail = h
        .ok(None, "audit.list", json!({"product_id": format!("transfer:{}", id)}))
        .await;
    let operations: Vec<&str> = trail
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["operation_type"].as_str().unwrap())
        .collect();
    assert_eq!(operations, vec!["transfer_held", "transfer_approved"]);

    h.store.close().await;
}

#[tokio::test]
async fn test_sweep_expires_stale_transfers() {
    let h = harness().await;
    h.user("NIT-9001", "client_company").await;
    h.user("NIT-9002", "client_company").await;
    let employee = h.user("E-400", "company_employee").await;
    let supervisor = h.user("S-300", "company_supervisor").await;

    let source = h.funded_account("NIT-9001", "9000000").await;
    let destination = h.funded_account("NIT-9002", "1").await;

    let transfer = h
        .ok(
            Some(employee),
            "transfers.create",
            json!({
                "source_account": source,
                "destination_account": destination,
                "amount": "7000000",
                "is_corporate": true,
            }),
        )
        .await;
    let id = transfer["id"].as_i64().unwrap();

    h.clock.advance(Duration::minutes(61));
    let swept = h.ok(None, "transfers.sweep_expired", Value::Null).await;
    assert_eq!(swept["expired"], 1);
    let swept = h.ok(None, "transfers.sweep_expired", Value::Null).await;
    assert_eq!(swept["expired"], 0);

    let stored = h
        .ok(None, "transfers.get", json!({"transfer_id": id}))
        .await;
    assert_eq!(stored["status"], "expired");

    let kind = h
        .err(Some(supervisor), "transfers.approve", json!({"transfer_id": id}))
        .await;
    assert_eq!(kind, ErrorKind::InvalidState);
    assert_eq!(h.balance(&source).await, dec!(9000000));

    h.store.close().await;
}

#[tokio::test]
async fn test_request_errors() {
    let h = harness().await;
    let client = h.user("CC-1001", "client_person").await;

    // No caller on a mutating method
    let kind = h
        .err(
            None,
            "accounts.open",
            json!({"owner_id": "CC-1001", "account_type": "savings"}),
        )
        .await;
    assert_eq!(kind, ErrorKind::Validation);

    // Client may not open accounts
    let kind = h
        .err(
            Some(client),
            "accounts.open",
            json!({"owner_id": "CC-1001", "account_type": "savings"}),
        )
        .await;
    assert_eq!(kind, ErrorKind::InvalidState);

    // Unknown caller
    let kind = h.err(Some(424242), "accounts.list", Value::Null).await;
    assert_eq!(kind, ErrorKind::NotFound);

    let kind = h
        .err(None, "audit.list", json!({"product_id": "1"}))
        .await;
    assert_eq!(kind, ErrorKind::Validation);

    let kind = h.err(Some(h.teller), "accounts.close_all", Value::Null).await;
    assert_eq!(kind, ErrorKind::Validation);

    // Amount with three decimals
    let kind = h
        .err(
            Some(h.teller),
            "accounts.adjust_balance",
            json!({"account_number": "0000000001", "delta": "1.005"}),
        )
        .await;
    assert_eq!(kind, ErrorKind::Validation);

    let kind = h
        .err(
            Some(client),
            "loans.reject",
            json!({"loan_id": 1, "reason": "no"}),
        )
        .await;
    assert_eq!(kind, ErrorKind::Validation);

    h.store.close().await;
}

#[tokio::test]
async fn test_malformed_line_gets_generated_id() {
    let h = harness().await;

    let response = h.dispatcher.handle_line("{not json").await;
    assert!(!response.ok);
    assert!(!response.id.is_empty());
    assert_eq!(response.error.unwrap().kind, ErrorKind::Validation);

    let response = h
        .dispatcher
        .handle_line(r#"{"id":"req-7","method":"users.list"}"#)
        .await;
    assert!(response.ok);
    assert_eq!(response.id, "req-7");
    assert_eq!(response.result.unwrap().as_array().unwrap().len(), 1);

    h.store.close().await;
}

#[tokio::test]
async fn test_overdraft_is_insufficient_funds() {
    let h = harness().await;
    h.user("CC-1001", "client_person").await;
    let number = h.funded_account("CC-1001", "50").await;

    let kind = h
        .err(
            Some(h.teller),
            "accounts.adjust_balance",
            json!({"account_number": number, "delta": "-50.01"}),
        )
        .await;
    assert_eq!(kind, ErrorKind::InsufficientFunds);
    assert_eq!(h.balance(&number).await, dec!(50));

    let result = h
        .ok(
            Some(h.teller),
            "accounts.adjust_balance",
            json!({"account_number": number, "delta": "-50"}),
        )
        .await;
    assert_eq!(
        Decimal::from_str(result["balance"].as_str().unwrap()).unwrap(),
        Decimal::ZERO
    );

    h.store.close().await;
}

#[tokio::test]
async fn test_product_catalog_listing() {
    let h = harness().await;

    let all = h.ok(None, "products.list", Value::Null).await;
    let codes: Vec<&str> = all
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["code"].as_str().unwrap())
        .collect();
    assert_eq!(codes, vec!["CTA-AHO", "CTA-CTE", "PRE-PER", "PRE-HIP", "PRE-EMP"]);

    let loans = h
        .ok(Some(h.teller), "products.list", json!({"category": "loans"}))
        .await;
    let loans = loans.as_array().unwrap();
    assert_eq!(loans.len(), 3);
    assert!(loans.iter().all(|p| p["requires_approval"] == true));

    let kind = h
        .err(None, "products.list", json!({"category": "insurance"}))
        .await;
    assert_eq!(kind, ErrorKind::Validation);

    h.store.close().await;
}
