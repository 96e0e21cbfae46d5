use chrono::{Duration as ChronoDuration, Utc};
use campus_api::app::{AppServices, build_app};
use campus_auth::{SessionClaims, SystemRole};
use campus_core::{EntityId, TenantId, UserId};
use campus_infra::{AuditSettings, ConnectionManager};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{Value, json};
use std::sync::Arc;

const SECRET: &str = "test-secret";

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, in-memory stores, ephemeral port.
        Self::spawn_with(AppServices::in_memory(AuditSettings::default())).await
    }

    async fn spawn_with(services: AppServices) -> Self {
        let app = build_app(SECRET, services);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            client: reqwest::Client::new(),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, token: &str, path: &str) -> reqwest::Response {
        self.client.get(self.url(path)).bearer_auth(token).send().await.unwrap()
    }

    async fn post(&self, token: &str, path: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    async fn patch(&self, token: &str, path: &str, body: Value) -> reqwest::Response {
        self.client
            .patch(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    async fn delete(&self, token: &str, path: &str) -> reqwest::Response {
        self.client.delete(self.url(path)).bearer_auth(token).send().await.unwrap()
    }

    /// POST and return the created record's id.
    async fn create(&self, token: &str, path: &str, body: Value) -> String {
        let res = self.post(token, path, body).await;
        assert_eq!(res.status(), StatusCode::CREATED, "POST {path}");
        let body: Value = res.json().await.unwrap();
        body["id"].as_str().unwrap().to_string()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn claims(tenant_id: TenantId, role: SystemRole) -> SessionClaims {
    let now = Utc::now();
    SessionClaims {
        sub: UserId::new(),
        tenant_id,
        name: format!("{role} user"),
        role,
        custom_role_id: None,
        allowed_modules: None,
        issued_at: now,
        expires_at: now + ChronoDuration::minutes(10),
    }
}

fn mint_jwt(claims: &SessionClaims) -> String {
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .expect("failed to encode jwt")
}

fn token(tenant_id: TenantId, role: SystemRole) -> String {
    mint_jwt(&claims(tenant_id, role))
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let srv = TestServer::spawn().await;

    let res = srv.client.get(srv.url("/whoami")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // Malformed bodies still fail the guard first.
    let res = srv
        .client
        .post(srv.url("/fees"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = srv.get("garbage", "/teachers").await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = srv.client.get(srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn tenant_context_is_derived_from_token() {
    let srv = TestServer::spawn().await;
    let tenant_id = TenantId::new();

    let res = srv.get(&token(tenant_id, SystemRole::Teacher), "/whoami").await;
    assert_eq!(res.status(), StatusCode::OK);

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["tenant_id"].as_str().unwrap(), tenant_id.to_string());
    assert_eq!(body["role"], "teacher");

    let fees = body["permissions"]
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["module"] == "fees")
        .unwrap();
    assert_eq!(fees["can_add"], true);
    assert_eq!(fees["can_delete"], false);
}

#[tokio::test]
async fn custom_role_overrides_default_grants() {
    let srv = TestServer::spawn().await;
    let tenant_id = TenantId::new();
    let admin = token(tenant_id, SystemRole::Admin);

    let role_id = srv
        .create(
            &admin,
            "/roles",
            json!({
                "name": "ReadOnlyTeacher",
                "permissions": [{ "module": "fees", "can_view": true }],
            }),
        )
        .await;

    let fee = json!({ "name": "Tuition", "amount_minor": 50_000, "currency": "USD" });

    let mut restricted = claims(tenant_id, SystemRole::Teacher);
    restricted.custom_role_id = Some(role_id.parse::<EntityId>().unwrap());
    let restricted = mint_jwt(&restricted);

    let res = srv.post(&restricted, "/fees", fee.clone()).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(srv.get(&restricted, "/fees").await.status(), StatusCode::OK);

    let plain = token(tenant_id, SystemRole::Teacher);
    assert_eq!(srv.post(&plain, "/fees", fee).await.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn allowed_modules_restrict_even_admins() {
    let srv = TestServer::spawn().await;

    let mut c = claims(TenantId::new(), SystemRole::Admin);
    c.allowed_modules = Some(vec![campus_auth::Module::Students]);
    let token = mint_jwt(&c);

    assert_eq!(srv.get(&token, "/students").await.status(), StatusCode::OK);
    assert_eq!(srv.get(&token, "/fees").await.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn role_deletion_is_reserved_to_admins() {
    let srv = TestServer::spawn().await;
    let tenant_id = TenantId::new();
    let admin = token(tenant_id, SystemRole::Admin);

    let role_id = srv
        .create(
            &admin,
            "/roles",
            json!({
                "name": "RoleManager",
                "permissions": [{
                    "module": "roles",
                    "can_view": true, "can_add": true, "can_edit": true, "can_delete": true,
                }],
            }),
        )
        .await;

    // A teacher whose custom role grants roles:delete still cannot delete.
    let mut manager = claims(tenant_id, SystemRole::Teacher);
    manager.custom_role_id = Some(role_id.parse::<EntityId>().unwrap());
    let manager = mint_jwt(&manager);

    assert_eq!(srv.get(&manager, "/roles").await.status(), StatusCode::OK);
    let res = srv.delete(&manager, &format!("/roles/{role_id}")).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = srv.delete(&admin, &format!("/roles/{role_id}")).await;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn department_delete_is_blocked_by_active_subjects() {
    let srv = TestServer::spawn().await;
    let admin = token(TenantId::new(), SystemRole::Admin);

    let dept = srv.create(&admin, "/departments", json!({ "name": "Science" })).await;
    let mut subjects = Vec::new();
    for name in ["Physics", "Chemistry"] {
        subjects.push(
            srv.create(&admin, "/subjects", json!({ "name": name, "department_id": dept }))
                .await,
        );
    }

    let res = srv.delete(&admin, &format!("/departments/{dept}")).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "cascade_blocked");
    assert_eq!(body["count"], 2);
    assert!(body["message"].as_str().unwrap().contains('2'));

    // Still there.
    let res = srv.get(&admin, &format!("/departments/{dept}")).await;
    assert_eq!(res.status(), StatusCode::OK);

    // Detach one subject and retire the other; the delete then goes through.
    let res = srv
        .patch(&admin, &format!("/subjects/{}", subjects[0]), json!({ "department_id": null }))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert!(body["department_id"].is_null());

    let res = srv.delete(&admin, &format!("/departments/{dept}")).await;
    assert_eq!(res.json::<Value>().await.unwrap()["count"], 1);

    let res = srv.delete(&admin, &format!("/subjects/{}", subjects[1])).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await.unwrap()["active"], false);

    let res = srv.delete(&admin, &format!("/departments/{dept}")).await;
    assert_eq!(res.status(), StatusCode::OK);
    let res = srv.get(&admin, &format!("/departments/{dept}")).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    // Nothing left to clear on a second pass.
    let res = srv.post(&admin, &format!("/departments/{dept}/cascade"), json!({})).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert!(body["cascade"]["failed"].as_array().unwrap().is_empty());

    let res = srv.post(&admin, &format!("/subjects/{}/reactivate", subjects[1]), json!({})).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["active"], true);
    assert!(body["department_id"].is_null());
}

#[tokio::test]
async fn cascade_rerun_requires_a_deactivated_parent() {
    let srv = TestServer::spawn().await;
    let admin = token(TenantId::new(), SystemRole::Admin);

    let teacher = srv.create(&admin, "/teachers", json!({ "name": "Mr. Boateng" })).await;
    let res = srv.post(&admin, &format!("/teachers/{teacher}/cascade"), json!({})).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);

    assert_eq!(srv.delete(&admin, &format!("/teachers/{teacher}")).await.status(), StatusCode::OK);
    let res = srv.post(&admin, &format!("/teachers/{teacher}/cascade"), json!({})).await;
    assert_eq!(res.status(), StatusCode::OK);

    let viewer = token(TenantId::new(), SystemRole::Student);
    let res = srv.post(&viewer, &format!("/teachers/{teacher}/cascade"), json!({})).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn health_reports_an_unreachable_database() {
    // Nothing listens on port 1; the pool fails once its acquire timeout elapses.
    let db = Arc::new(ConnectionManager::new("postgres://campus@127.0.0.1:1/campus"));
    let srv = TestServer::spawn_with(AppServices::postgres(db, AuditSettings::default())).await;

    let res = srv.client.get(srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "database_unavailable");
}

#[tokio::test]
async fn records_of_another_tenant_are_not_found() {
    let srv = TestServer::spawn().await;
    let ours = token(TenantId::new(), SystemRole::Admin);
    let theirs = token(TenantId::new(), SystemRole::Admin);

    let teacher = srv.create(&ours, "/teachers", json!({ "name": "Mr. Mensah" })).await;

    let res = srv.get(&theirs, &format!("/teachers/{teacher}")).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = srv.delete(&theirs, &format!("/teachers/{teacher}")).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let list: Value = srv.get(&theirs, "/teachers").await.json().await.unwrap();
    assert!(list.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn teacher_deactivation_cascades_and_is_audited() {
    let srv = TestServer::spawn().await;
    let admin = token(TenantId::new(), SystemRole::Admin);

    let teacher = srv.create(&admin, "/teachers", json!({ "name": "Mrs. Okafor" })).await;
    let subject = srv
        .create(&admin, "/subjects", json!({ "name": "Biology", "teacher_id": teacher }))
        .await;

    let res = srv.delete(&admin, &format!("/teachers/{teacher}")).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["cascade"]["counts"]["subject"]["updated"], 1);

    let subject: Value = srv.get(&admin, &format!("/subjects/{subject}")).await.json().await.unwrap();
    assert!(subject["teacher_id"].is_null());
    assert_eq!(subject["teacher_name"], "");

    // Second deactivation conflicts.
    let res = srv.delete(&admin, &format!("/teachers/{teacher}")).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);

    // Audit writes are fire-and-forget; poll briefly.
    let mut entries = Vec::new();
    for _ in 0..50 {
        let res = srv.get(&admin, "/audit-logs?action=delete&entity_type=teacher").await;
        assert_eq!(res.status(), StatusCode::OK);
        entries = res.json::<Vec<Value>>().await.unwrap();
        if !entries.is_empty() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["entity_id"], teacher.as_str());
    assert_eq!(entries[0]["actor_role"], "admin");

    // Teachers cannot read the audit trail.
    let teacher_token = token(TenantId::new(), SystemRole::Teacher);
    let res = srv.get(&teacher_token, "/audit-logs").await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}
