use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::json;

use tillbook_api::app::build_app;
use tillbook_api::app::services::{AppServices, Stores};
use tillbook_auth::{Hs256JwtValidator, JwtClaims, Role};
use tillbook_core::UserId;
use tillbook_documents::{FlatRateTaxCalculator, TaxCalculator};
use tillbook_infra::AppConfig;
use tillbook_infra::tax::DisabledTaxCalculator;

const JWT_SECRET: &str = "test-secret";

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        Self::spawn_with(AppConfig::default()).await
    }

    async fn spawn_with(config: AppConfig) -> Self {
        Self::spawn_wired(config, Arc::new(FlatRateTaxCalculator::new("VAT", 1000))).await
    }

    /// In-memory wiring (same router as prod), bound to an ephemeral port.
    async fn spawn_wired(config: AppConfig, tax: Arc<dyn TaxCalculator>) -> Self {
        let services = AppServices::new(Stores::in_memory(), tax, &config);
        services.ensure_walk_in(Utc::now()).await.unwrap();
        let jwt = Arc::new(Hs256JwtValidator::new(JWT_SECRET.as_bytes().to_vec()));
        let app = build_app(Arc::new(services), jwt);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Redirects are asserted, not followed.
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap();

        Self {
            base_url: format!("http://{addr}"),
            client,
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(user_id: UserId, roles: &[&'static str]) -> String {
    let now = Utc::now();
    let claims = JwtClaims {
        sub: user_id,
        roles: roles.iter().map(|r| Role::new(*r)).collect(),
        issued_at: now - ChronoDuration::seconds(5),
        expires_at: now + ChronoDuration::minutes(10),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("failed to encode jwt")
}

fn admin() -> String {
    mint_jwt(UserId::new(), &["admin"])
}

fn location(res: &reqwest::Response) -> String {
    res.headers()[reqwest::header::LOCATION].to_str().unwrap().to_string()
}

/// Create a customer through the form endpoint; returns its id.
async fn create_customer(srv: &TestServer, token: &str, name: &str) -> String {
    let res = srv
        .client
        .post(srv.url("/customers"))
        .bearer_auth(token)
        .form(&[("name", name), ("email", "hello@example.com"), ("type", "business")])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    location(&res).trim_start_matches("/customers/").to_string()
}

async fn walk_in_id(srv: &TestServer, token: &str) -> String {
    let res = srv
        .client
        .get(srv.url("/customers?search=WALKIN"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();
    let page: serde_json::Value = res.json().await.unwrap();
    assert_eq!(page["total"], 1);
    page["items"][0]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_is_public_and_everything_else_needs_a_token() {
    let srv = TestServer::spawn().await;

    let res = srv.client.get(srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = srv.client.get(srv.url("/whoami")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = srv
        .client
        .get(srv.url("/customers"))
        .bearer_auth("not-a-jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn whoami_reflects_the_token() {
    let srv = TestServer::spawn().await;
    let user_id = UserId::new();
    let res = srv
        .client
        .get(srv.url("/whoami"))
        .bearer_auth(mint_jwt(user_id, &["clerk"]))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["user_id"].as_str().unwrap(), user_id.to_string());
    assert!(body["roles"].as_array().unwrap().iter().any(|r| r == "clerk"));
    assert!(body["permissions"].as_array().unwrap().iter().any(|p| p == "customers.write"));
}

#[tokio::test]
async fn customer_create_view_list_and_export() {
    let srv = TestServer::spawn().await;
    let token = admin();

    let id = create_customer(&srv, &token, "Acme, Inc").await;
    create_customer(&srv, &token, "Globex").await;

    let res = srv
        .client
        .get(srv.url(&format!("/customers/{id}")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    let year = Utc::now().format("%Y").to_string();
    assert_eq!(body["customer"]["number"], format!("CUST{year}00001"));
    assert_eq!(body["form"]["type"], "business");

    // Newest first; the walk-in customer is listed too.
    let res = srv
        .client
        .get(srv.url("/customers?per_page=10"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let page: serde_json::Value = res.json().await.unwrap();
    assert_eq!(page["total"], 3);
    assert_eq!(page["per_page"], 10);
    assert_eq!(page["items"][0]["name"], "Globex");

    let res = srv
        .client
        .get(srv.url("/customers?search=acme&type=business"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let page: serde_json::Value = res.json().await.unwrap();
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["id"], id.as_str());

    let res = srv
        .client
        .get(srv.url("/customers/export?search=acme"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let disposition = res.headers()[reqwest::header::CONTENT_DISPOSITION].to_str().unwrap().to_string();
    assert!(disposition.contains("customers_"));
    assert!(disposition.ends_with(".csv\""));
    let csv = res.text().await.unwrap();
    let mut lines = csv.lines();
    assert_eq!(
        lines.next(),
        Some("Customer Number,Name,Email,Phone,Address,Type,Status,Created At,Updated At")
    );
    assert!(lines.next().unwrap().starts_with(&format!("CUST{year}00001,\"Acme, Inc\",hello@example.com")));
    assert_eq!(lines.next(), None);
}

#[tokio::test]
async fn invalid_customer_form_is_echoed_with_field_errors() {
    let srv = TestServer::spawn().await;
    let res = srv
        .client
        .post(srv.url("/customers"))
        .bearer_auth(admin())
        .form(&[("name", ""), ("email", "not-an-email")])
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");
    assert!(body["fields"]["name"].is_string());
    assert!(body["fields"]["email"].is_string());
    assert_eq!(body["input"]["email"], "not-an-email");
}

#[tokio::test]
async fn missing_customer_redirects_to_the_list() {
    let srv = TestServer::spawn().await;
    let res = srv
        .client
        .get(srv.url(&format!("/customers/{}", uuid_like())))
        .bearer_auth(admin())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/customers");
}

fn uuid_like() -> String {
    // Any well-formed id that was never stored.
    UserId::new().to_string()
}

#[tokio::test]
async fn walk_in_customer_cannot_be_edited_or_deleted() {
    let srv = TestServer::spawn().await;
    let token = admin();
    let id = walk_in_id(&srv, &token).await;

    let res = srv
        .client
        .post(srv.url(&format!("/customers/{id}")))
        .bearer_auth(&token)
        .form(&[("name", "Renamed")])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = srv
        .client
        .post(srv.url(&format!("/customers/{id}/delete")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn customer_delete_redirects_to_the_list() {
    let srv = TestServer::spawn().await;
    let token = admin();
    let id = create_customer(&srv, &token, "Initech").await;

    let res = srv
        .client
        .post(srv.url(&format!("/customers/{id}/delete")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/customers");

    let res = srv
        .client
        .get(srv.url(&format!("/customers/{id}")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn customer_edits_are_rate_limited_per_user() {
    let mut config = AppConfig::default();
    config.rate_limit.customer_edits = 2;
    config.rate_limit.window_secs = 60;
    let srv = TestServer::spawn_with(config).await;

    let token = admin();
    let id = create_customer(&srv, &token, "Umbrella").await;

    for name in ["Umbrella Corp", "Umbrella Ltd"] {
        let res = srv
            .client
            .post(srv.url(&format!("/customers/{id}")))
            .bearer_auth(&token)
            .form(&[("name", name)])
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&res), format!("/customers/{id}"));
    }

    let res = srv
        .client
        .post(srv.url(&format!("/customers/{id}")))
        .bearer_auth(&token)
        .form(&[("name", "Umbrella plc")])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: i64 = res.headers()[reqwest::header::RETRY_AFTER].to_str().unwrap().parse().unwrap();
    assert!((1..=60).contains(&retry_after));

    // Another user has their own window.
    let res = srv
        .client
        .post(srv.url(&format!("/customers/{id}")))
        .bearer_auth(admin())
        .form(&[("name", "Umbrella plc")])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn authorization_failures_redirect_forms_and_forbid_json() {
    let srv = TestServer::spawn().await;
    let auditor = mint_jwt(UserId::new(), &["auditor"]);

    let res = srv
        .client
        .post(srv.url("/customers"))
        .bearer_auth(&auditor)
        .form(&[("name", "Nope")])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/");

    let clerk = mint_jwt(UserId::new(), &["clerk"]);
    let res = srv
        .client
        .get(srv.url("/payables/dashboard"))
        .bearer_auth(&clerk)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn quotation_lifecycle_through_conversion() {
    let srv = TestServer::spawn().await;
    let token = admin();
    let customer_id = create_customer(&srv, &token, "Acme").await;

    let res = srv
        .client
        .post(srv.url("/quotations"))
        .bearer_auth(&token)
        .json(&json!({
            "customer_id": customer_id,
            "lines": [
                { "description": "Widget", "quantity": 2, "unit_price": 10000 },
                { "description": "Cable", "quantity": 1, "unit_price": 5000 }
            ],
            "discount": 1000
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let q: serde_json::Value = res.json().await.unwrap();
    let qid = q["id"].as_str().unwrap().to_string();
    assert_eq!(q["totals"]["subtotal"], 25000);
    assert_eq!(q["totals"]["tax"], 2500);
    assert_eq!(q["totals"]["total"], 26500);
    assert!(q["tax_warning"].is_null());
    assert!(q["number"].as_str().unwrap().starts_with("QT"));

    let res = srv
        .client
        .put(srv.url(&format!("/quotations/{qid}")))
        .bearer_auth(&token)
        .json(&json!({
            "customer_id": customer_id,
            "lines": [{ "description": "Widget", "quantity": 3, "unit_price": 10000 }]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let outcome: serde_json::Value = res.json().await.unwrap();
    assert_eq!(outcome["success"], true);
    assert!(outcome["message"].is_string());

    let res = srv
        .client
        .post(srv.url(&format!("/quotations/{qid}/status")))
        .bearer_auth(&token)
        .json(&json!({ "status": "sent" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = srv
        .client
        .post(srv.url(&format!("/quotations/{qid}/convert")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let converted: serde_json::Value = res.json().await.unwrap();
    assert_eq!(converted["quotation"]["status"], "converted");
    assert_eq!(converted["invoice"]["totals"]["total"], 33000);
    let invoice_id = converted["invoice"]["id"].as_str().unwrap().to_string();
    assert_eq!(
        converted["invoice"]["number"],
        format!("INV{}0001", Utc::now().format("%Y%m"))
    );

    // Converted quotations are frozen.
    let res = srv
        .client
        .put(srv.url(&format!("/quotations/{qid}")))
        .bearer_auth(&token)
        .json(&json!({
            "customer_id": customer_id,
            "lines": [{ "description": "Widget", "quantity": 1, "unit_price": 10000 }]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let outcome: serde_json::Value = res.json().await.unwrap();
    assert_eq!(outcome["success"], false);
    assert!(outcome["error"].is_string());

    let res = srv
        .client
        .post(srv.url(&format!("/invoices/{invoice_id}/pay")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = srv
        .client
        .get(srv.url(&format!("/invoices/{invoice_id}")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let invoice: serde_json::Value = res.json().await.unwrap();
    assert_eq!(invoice["status"], "paid");
    assert_eq!(invoice["overdue"], false);
}

#[tokio::test]
async fn quotations_are_saved_with_a_warning_when_tax_is_unavailable() {
    let srv = TestServer::spawn_wired(AppConfig::default(), Arc::new(DisabledTaxCalculator)).await;
    let token = admin();
    let customer_id = create_customer(&srv, &token, "Acme").await;

    let res = srv
        .client
        .post(srv.url("/quotations"))
        .bearer_auth(&token)
        .json(&json!({
            "customer_id": customer_id,
            "lines": [{ "description": "Widget", "quantity": 2, "unit_price": 10000 }]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let q: serde_json::Value = res.json().await.unwrap();
    assert!(q["tax_warning"].is_string());
    assert_eq!(q["totals"]["tax"], 0);
    assert_eq!(q["totals"]["total"], 20000);
    let qid = q["id"].as_str().unwrap().to_string();

    let res = srv
        .client
        .get(srv.url(&format!("/quotations/{qid}")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = srv
        .client
        .put(srv.url(&format!("/quotations/{qid}")))
        .bearer_auth(&token)
        .json(&json!({
            "customer_id": customer_id,
            "lines": [{ "description": "Widget", "quantity": 3, "unit_price": 10000 }]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let outcome: serde_json::Value = res.json().await.unwrap();
    assert_eq!(outcome["success"], true);
    assert!(outcome["tax_warning"].is_string());
}

#[tokio::test]
async fn customers_with_quotations_cannot_be_deleted() {
    let srv = TestServer::spawn().await;
    let token = admin();
    let customer_id = create_customer(&srv, &token, "Acme").await;

    let res = srv
        .client
        .post(srv.url("/quotations"))
        .bearer_auth(&token)
        .json(&json!({
            "customer_id": customer_id,
            "lines": [{ "description": "Widget", "quantity": 1, "unit_price": 10000 }]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = srv
        .client
        .post(srv.url(&format!("/customers/{customer_id}/delete")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn payables_record_pay_and_summarize() {
    let srv = TestServer::spawn().await;
    let token = admin();
    let overdue_date = (Utc::now().date_naive() - ChronoDuration::days(10)).to_string();

    let res = srv
        .client
        .post(srv.url("/payables"))
        .bearer_auth(&token)
        .json(&json!({
            "supplier_name": "Bolt Supply",
            "supplier_invoice_no": "BS-1001",
            "purchase_order_ref": "PO-77",
            "amount": "500.00",
            "due_date": overdue_date
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let payable: serde_json::Value = res.json().await.unwrap();
    let id = payable["id"].as_str().unwrap().to_string();

    // Same supplier invoice twice is a conflict.
    let res = srv
        .client
        .post(srv.url("/payables"))
        .bearer_auth(&token)
        .json(&json!({
            "supplier_name": "Bolt Supply",
            "supplier_invoice_no": "BS-1001",
            "amount": "10.00",
            "due_date": overdue_date
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = srv
        .client
        .post(srv.url(&format!("/payables/{id}/payments")))
        .bearer_auth(&token)
        .json(&json!({ "amount": "200.00" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let paid: serde_json::Value = res.json().await.unwrap();
    assert_eq!(paid["status"], "partial");

    let res = srv
        .client
        .post(srv.url(&format!("/payables/{id}/payments")))
        .bearer_auth(&token)
        .json(&json!({ "amount": "900.00" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let res = srv
        .client
        .get(srv.url("/payables/dashboard"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let summary: serde_json::Value = res.json().await.unwrap();
    assert_eq!(summary["total_outstanding"], 30000);
    assert_eq!(summary["overdue_count"], 1);
    assert_eq!(summary["overdue_amount"], 30000);
}
