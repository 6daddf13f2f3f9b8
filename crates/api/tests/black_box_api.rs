use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{Value, json};

use aura_api::config::{AppConfig, BootstrapAdmin};
use aura_auth::{JwtClaims, Role};
use aura_core::{AggregateId, TenantId, UserId};

const JWT_SECRET: &str = "test-secret";
const ROOT_EMAIL: &str = "root@aura.test";
const ROOT_PASSWORD: &str = "root-password-1";

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        aura_observability::init();
        // Same router as prod, bound to an ephemeral port.
        let config = AppConfig {
            jwt_secret: Some(JWT_SECRET.to_string()),
            scheduler_tick_seconds: 3600,
            bootstrap_admin: BootstrapAdmin {
                email: ROOT_EMAIL.to_string(),
                password: Some(ROOT_PASSWORD.to_string()),
            },
            ..AppConfig::default()
        };
        let (app, _services) = aura_api::app::build_app(&config).await.expect("build app");
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            client: reqwest::Client::new(),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, token: &str, path: &str) -> (StatusCode, Value) {
        let res = self.client.get(self.url(path)).bearer_auth(token).send().await.unwrap();
        let status = res.status();
        (status, res.json().await.unwrap_or(Value::Null))
    }

    async fn post(&self, token: &str, path: &str, body: Value) -> (StatusCode, Value) {
        let res = self
            .client
            .post(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = res.status();
        (status, res.json().await.unwrap_or(Value::Null))
    }

    async fn login(&self, tenant_slug: Option<&str>, email: &str, password: &str) -> (StatusCode, Value) {
        let res = self
            .client
            .post(self.url("/auth/login"))
            .json(&json!({ "tenant_slug": tenant_slug, "email": email, "password": password }))
            .send()
            .await
            .unwrap();
        let status = res.status();
        (status, res.json().await.unwrap_or(Value::Null))
    }

    async fn token(&self, tenant_slug: Option<&str>, email: &str, password: &str) -> String {
        let (status, body) = self.login(tenant_slug, email, password).await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        body["token"].as_str().unwrap().to_string()
    }

    async fn root_token(&self) -> String {
        self.token(None, ROOT_EMAIL, ROOT_PASSWORD).await
    }

    /// Provision a tenant and return a token for its first administrator.
    async fn tenant_with_admin(&self, slug: &str) -> (TenantId, String) {
        let root = self.root_token().await;
        let (status, body) = self
            .post(
                &root,
                "/system/tenants",
                json!({
                    "name": format!("{slug} Inc"),
                    "slug": slug,
                    "contact_email": format!("hr@{slug}.test"),
                    "admin": {
                        "email": format!("admin@{slug}.test"),
                        "display_name": "Admin",
                        "password": "admin-password-1"
                    }
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "provision failed: {body}");
        let tenant_id: TenantId = body["tenant_id"].as_str().unwrap().parse().unwrap();
        let token = self
            .token(Some(slug), &format!("admin@{slug}.test"), "admin-password-1")
            .await;
        (tenant_id, token)
    }

    /// Create a login in the admin's tenant and return its user id.
    async fn add_user(&self, admin: &str, email: &str, roles: &[&str], employee_id: Option<&str>) -> UserId {
        let (status, body) = self
            .post(
                admin,
                "/admin/users",
                json!({
                    "email": email,
                    "display_name": email,
                    "password": "user-password-1",
                    "roles": roles,
                    "employee_id": employee_id
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "user create failed: {body}");
        body["user_id"].as_str().unwrap().parse().unwrap()
    }

    async fn delete(&self, token: &str, path: &str) -> StatusCode {
        self.client.delete(self.url(path)).bearer_auth(token).send().await.unwrap().status()
    }

    async fn hire(&self, token: &str, code: &str, salary: i64) -> String {
        let (status, body) = self
            .post(
                token,
                "/employees",
                json!({
                    "employee_code": code,
                    "first_name": "Ada",
                    "last_name": code,
                    "email": format!("{}@staff.test", code.to_lowercase()),
                    "department": "Engineering",
                    "designation": "Engineer",
                    "hire_date": "2025-01-06",
                    "base_salary": salary
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "hire failed: {body}");
        body["employee_id"].as_str().unwrap().to_string()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(sub: UserId, tenant_id: TenantId, roles: Vec<Role>, employee_id: Option<AggregateId>) -> String {
    let now = Utc::now();
    let claims = JwtClaims {
        sub,
        tenant_id,
        roles,
        employee_id,
        issued_at: now,
        expires_at: now + ChronoDuration::minutes(10),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("failed to encode jwt")
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let srv = TestServer::spawn().await;

    let res = srv.client.get(srv.url("/whoami")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = srv.client.get(srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let (status, _) = srv.get("not-a-jwt", "/whoami").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn tenant_context_is_derived_from_token() {
    let srv = TestServer::spawn().await;
    let (tenant_id, admin) = srv.tenant_with_admin("context").await;
    let employee_id = srv.hire(&admin, "C-1", 100_000).await;
    let user_id = srv.add_user(&admin, "c1@context.test", &["employee"], Some(&employee_id)).await;

    // Roles and employee link come from the stored login, not the claims.
    let token = mint_jwt(user_id, tenant_id, vec![Role::TENANT_ADMIN], None);
    let (status, body) = srv.get(&token, "/whoami").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tenant_id"].as_str().unwrap(), tenant_id.to_string());
    assert_eq!(body["employee_id"].as_str().unwrap(), employee_id);
    assert_eq!(body["roles"], json!(["employee"]));
    assert!(body["permissions"].as_array().unwrap().iter().any(|p| p == "ess.leave"));

    // A well-signed token for a login that does not exist is rejected.
    let forged = mint_jwt(UserId::new(), tenant_id, vec![Role::TENANT_ADMIN], None);
    let (status, _) = srv.get(&forged, "/whoami").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_rejects_bad_credentials_and_issues_usable_tokens() {
    let srv = TestServer::spawn().await;

    let (status, body) = srv.login(None, ROOT_EMAIL, "wrong-password").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_credentials");

    let (status, _) = srv.login(Some("no-such-tenant"), ROOT_EMAIL, ROOT_PASSWORD).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let root = srv.root_token().await;
    let (status, body) = srv.get(&root, "/whoami").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tenant_id"].as_str().unwrap(), TenantId::system().to_string());
}

#[tokio::test]
async fn password_change_requires_the_current_password() {
    let srv = TestServer::spawn().await;
    let (_, admin) = srv.tenant_with_admin("rotate").await;

    let (status, _) = srv
        .post(
            &admin,
            "/me/password",
            json!({ "current_password": "not-my-password", "new_password": "brand-new-pass-1" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = srv
        .post(
            &admin,
            "/me/password",
            json!({ "current_password": "admin-password-1", "new_password": "short" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let (status, _) = srv
        .post(
            &admin,
            "/me/password",
            json!({ "current_password": "admin-password-1", "new_password": "brand-new-pass-1" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = srv.login(Some("rotate"), "admin@rotate.test", "admin-password-1").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = srv.login(Some("rotate"), "admin@rotate.test", "brand-new-pass-1").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn provisioning_creates_tenant_settings_and_admin() {
    let srv = TestServer::spawn().await;
    let (tenant_id, admin) = srv.tenant_with_admin("acme").await;

    let (status, body) = srv.get(&admin, "/settings").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["settings"]["company_name"], "acme Inc");
    assert_eq!(body["settings"]["annual_leave_days"], 20);

    let (status, body) = srv.get(&admin, "/admin/users").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert!(body["items"][0].get("password_hash").is_none());

    // Slugs are unique after normalisation.
    let root = srv.root_token().await;
    let (status, _) = srv
        .post(
            &root,
            "/system/tenants",
            json!({
                "name": "Other",
                "slug": "ACME",
                "contact_email": "x@other.test",
                "admin": { "email": "a@other.test", "display_name": "A", "password": "password-123" }
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Tenant admins cannot reach the platform registry.
    let (status, _) = srv.get(&admin, "/system/tenants").await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = srv.get(&root, &format!("/system/tenants/{tenant_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tenant"]["slug"], "acme");
}

#[tokio::test]
async fn suspended_tenant_cannot_log_in() {
    let srv = TestServer::spawn().await;
    let (tenant_id, _admin) = srv.tenant_with_admin("sleepy").await;
    let root = srv.root_token().await;

    let (status, _) = srv
        .post(&root, &format!("/system/tenants/{tenant_id}/suspend"), json!({ "reason": "unpaid" }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = srv.login(Some("sleepy"), "admin@sleepy.test", "admin-password-1").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "tenant_suspended");

    let (status, _) = srv
        .post(&root, &format!("/system/tenants/{tenant_id}/reactivate"), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = srv.login(Some("sleepy"), "admin@sleepy.test", "admin-password-1").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn employee_leave_lifecycle_through_self_service() {
    let srv = TestServer::spawn().await;
    let (_tenant_id, admin) = srv.tenant_with_admin("globex").await;
    let employee_id = srv.hire(&admin, "E-001", 300_000).await;

    let (status, _) = srv
        .post(
            &admin,
            "/admin/users",
            json!({
                "email": "ada@globex.test",
                "display_name": "Ada",
                "password": "ada-password-1",
                "roles": ["employee"],
                "employee_id": employee_id
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let ess = srv.token(Some("globex"), "ada@globex.test", "ada-password-1").await;

    // Self-service submits for itself; the employee id comes from the token.
    let (status, leave) = srv
        .post(
            &ess,
            "/leave",
            json!({ "leave_type": "annual", "start": "2031-03-03", "end": "2031-03-07", "reason": "trip" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{leave}");
    assert_eq!(leave["days"], 5);
    assert_eq!(leave["employee_id"].as_str().unwrap(), employee_id);
    let request_id = leave["request_id"].as_str().unwrap().to_string();

    // Overlapping request is a conflict.
    let (status, _) = srv
        .post(
            &ess,
            "/leave",
            json!({ "leave_type": "sick", "start": "2031-03-05", "end": "2031-03-05" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Employees cannot approve.
    let (status, _) = srv
        .post(&ess, &format!("/leave/{request_id}/approve"), json!({}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, approved) = srv
        .post(&admin, &format!("/leave/{request_id}/approve"), json!({ "note": "enjoy" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(approved["status"], "approved");

    let (status, body) = srv.get(&ess, "/leave/balance?year=2031").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["balance"]["used"], 5);
    assert_eq!(body["balance"]["remaining"], 15);

    let (status, body) = srv.get(&ess, "/notifications").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["unread"].as_u64().unwrap() >= 1);

    let (status, me) = srv.get(&ess, "/me").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["employee"]["employee_code"], "E-001");
    assert_eq!(me["leave"].as_array().unwrap().len(), 1);

    // Allowance is enforced.
    let (status, body) = srv
        .post(
            &ess,
            "/leave",
            json!({ "leave_type": "annual", "start": "2031-06-02", "end": "2031-07-04" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{body}");
}

#[tokio::test]
async fn self_service_is_confined_to_own_records() {
    let srv = TestServer::spawn().await;
    let (tenant_id, admin) = srv.tenant_with_admin("initech").await;
    let own = srv.hire(&admin, "E-100", 200_000).await;
    let other = srv.hire(&admin, "E-101", 200_000).await;

    let user_id = srv.add_user(&admin, "own@initech.test", &["employee"], Some(&own)).await;
    let ess = mint_jwt(user_id, tenant_id, vec![Role::EMPLOYEE], Some(own.parse().unwrap()));

    let (status, _) = srv.get(&ess, &format!("/employees/{own}")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = srv.get(&ess, &format!("/employees/{other}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = srv.get(&ess, "/employees").await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = srv
        .post(&ess, "/payroll/generate", json!({ "period": "2031-01" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = srv
        .post(
            &ess,
            "/leave",
            json!({ "employee_id": other, "leave_type": "sick", "start": "2031-02-03", "end": "2031-02-03" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, record) = srv.post(&ess, "/attendance/check-in", json!({})).await;
    assert_eq!(status, StatusCode::OK, "{record}");
    assert_eq!(record["employee_id"].as_str().unwrap(), own);
    let (status, _) = srv.post(&ess, "/attendance/check-in", json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn tenant_isolation_blocks_cross_tenant_reads_and_writes() {
    let srv = TestServer::spawn().await;
    let (_t1, admin1) = srv.tenant_with_admin("alpha").await;
    let (t2, admin2) = srv.tenant_with_admin("beta").await;
    let employee_id = srv.hire(&admin1, "A-1", 100_000).await;

    let (status, _) = srv.get(&admin2, &format!("/employees/{employee_id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = srv.get(&admin2, "/employees").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 0);

    let (status, _) = srv
        .post(&admin2, &format!("/employees/{employee_id}/terminate"), json!({ "termination_date": "2031-01-31" }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Only system admins may target another tenant by header.
    let res = srv
        .client
        .get(srv.url("/employees"))
        .bearer_auth(&admin1)
        .header("x-aura-tenant", t2.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let root = srv.root_token().await;
    let res = srv
        .client
        .get(srv.url("/employees"))
        .bearer_auth(&root)
        .header("x-aura-tenant", t2.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn payroll_run_deducts_unpaid_leave() {
    let srv = TestServer::spawn().await;
    let (_tenant_id, admin) = srv.tenant_with_admin("payco").await;
    let employee_id = srv.hire(&admin, "P-1", 220_000).await;

    // Two weekdays of unpaid leave in March 2031 (Mon 3rd, Tue 4th).
    let (status, leave) = srv
        .post(
            &admin,
            "/leave",
            json!({ "employee_id": employee_id, "leave_type": "unpaid", "start": "2031-03-03", "end": "2031-03-04" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{leave}");
    let request_id = leave["request_id"].as_str().unwrap();
    let (status, _) = srv.post(&admin, &format!("/leave/{request_id}/approve"), json!({})).await;
    assert_eq!(status, StatusCode::OK);

    let (status, run) = srv
        .post(
            &admin,
            "/payroll/generate",
            json!({ "period": "2031-03", "allowances": [{ "label": "Transport", "amount": 10_000 }] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{run}");
    let slip = &run["generated"][0];
    // 220000 * 2 / 22 = 20000
    assert_eq!(slip["breakdown"]["unpaid_leave_deduction"], 20_000);
    assert_eq!(slip["breakdown"]["net"], 210_000);
    let payslip_id = slip["payslip_id"].as_str().unwrap().to_string();

    // A second run for the same period skips the existing payslip.
    let (status, rerun) = srv.post(&admin, "/payroll/generate", json!({ "period": "2031-03" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rerun["generated"].as_array().unwrap().len(), 0);
    assert_eq!(rerun["skipped"].as_array().unwrap().len(), 1);

    let (status, _) = srv.post(&admin, &format!("/payroll/{payslip_id}/pay"), json!({})).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, approved) = srv.post(&admin, &format!("/payroll/{payslip_id}/approve"), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(approved["status"], "approved");

    let (status, paid) = srv
        .post(&admin, &format!("/payroll/{payslip_id}/pay"), json!({ "reference": "TX-1" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(paid["status"], "paid");
}

#[tokio::test]
async fn reports_download_as_attachments() {
    let srv = TestServer::spawn().await;
    let (_tenant_id, admin) = srv.tenant_with_admin("reporter").await;
    srv.hire(&admin, "R-1", 150_000).await;

    let res = srv
        .client
        .get(srv.url("/reports/employees?format=csv"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers()["content-type"].to_str().unwrap().starts_with("text/csv"));
    assert!(
        res.headers()["content-disposition"]
            .to_str()
            .unwrap()
            .starts_with("attachment;")
    );
    let body = res.text().await.unwrap();
    assert!(body.contains("R-1"));

    let res = srv
        .client
        .get(srv.url("/reports/payroll?format=pdf"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.bytes().await.unwrap().starts_with(b"%PDF"));

    let (status, _) = srv.get(&admin, "/reports/salaries").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn scheduled_report_runs_on_demand() {
    let srv = TestServer::spawn().await;
    let (_tenant_id, admin) = srv.tenant_with_admin("sched").await;

    let (status, created) = srv
        .post(
            &admin,
            "/reports/schedules",
            json!({
                "name": "Monthly headcount",
                "cron": "0 0 8 1 * *",
                "kind": "employees",
                "format": "xlsx",
                "recipients": ["hr@sched.test"]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    assert!(created["next_run"].is_string());
    let schedule_id = created["schedule"]["id"].as_str().unwrap().to_string();

    let (status, run) = srv
        .post(&admin, &format!("/reports/schedules/{schedule_id}/run"), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK, "{run}");
    assert!(run["last_error"].is_null());

    let (status, list) = srv.get(&admin, "/reports/schedules").await;
    assert_eq!(status, StatusCode::OK);
    assert!(list["items"][0]["last_run"].is_string());

    let (status, _) = srv
        .post(
            &admin,
            "/reports/schedules",
            json!({ "name": "Bad", "cron": "every day", "kind": "leave", "format": "csv", "recipients": ["a@b.test"] }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn issued_tokens_follow_suspensions_and_role_changes() {
    let srv = TestServer::spawn().await;
    let (tenant_id, admin) = srv.tenant_with_admin("revoked").await;
    let root = srv.root_token().await;

    let (status, _) = srv
        .post(&root, &format!("/system/tenants/{tenant_id}/suspend"), json!({ "reason": "unpaid" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    let res = srv
        .client
        .post(srv.url("/employees"))
        .bearer_auth(&admin)
        .json(&json!({
            "employee_code": "P-1",
            "first_name": "Pat",
            "last_name": "Doe",
            "email": "pat@revoked.test",
            "department": "Ops",
            "designation": "Clerk",
            "hire_date": "2025-01-06",
            "base_salary": 100_000
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "tenant_suspended");

    let (status, _) = srv
        .post(&root, &format!("/system/tenants/{tenant_id}/reactivate"), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = srv.get(&admin, "/employees").await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["count"], 0);

    // A second administrator loses access as soon as the role is revoked.
    let deputy_id = srv
        .add_user(&admin, "deputy@revoked.test", &["tenant_admin", "employee"], None)
        .await;
    let deputy = srv.token(Some("revoked"), "deputy@revoked.test", "user-password-1").await;
    let (status, _) = srv.get(&deputy, "/employees").await;
    assert_eq!(status, StatusCode::OK);
    let status = srv
        .delete(&admin, &format!("/admin/users/{deputy_id}/roles/tenant_admin"))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = srv.get(&deputy, "/employees").await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = srv
        .post(&admin, &format!("/admin/users/{deputy_id}/suspend"), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = srv.get(&deputy, "/whoami").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "user_suspended");
}

#[tokio::test]
async fn termination_suspends_the_linked_login() {
    let srv = TestServer::spawn().await;
    let (_tenant_id, admin) = srv.tenant_with_admin("leavers").await;
    let employee_id = srv.hire(&admin, "L-1", 100_000).await;
    let user_id = srv
        .add_user(&admin, "l1@leavers.test", &["employee"], Some(&employee_id))
        .await;
    let ess = srv.token(Some("leavers"), "l1@leavers.test", "user-password-1").await;
    let (status, _) = srv.get(&ess, "/me").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = srv
        .post(
            &admin,
            &format!("/employees/{employee_id}/terminate"),
            json!({ "termination_date": "2031-01-31", "reason": "moved on" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "terminated");

    let (status, body) = srv.get(&admin, &format!("/admin/users/{user_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "suspended");

    let (status, _) = srv.get(&ess, "/me").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, body) = srv.login(Some("leavers"), "l1@leavers.test", "user-password-1").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "user_suspended");
}

#[tokio::test]
async fn subscription_seats_cap_active_headcount() {
    let srv = TestServer::spawn().await;
    let (tenant_id, admin) = srv.tenant_with_admin("tiny").await;
    let root = srv.root_token().await;

    let res = srv
        .client
        .put(srv.url(&format!("/system/tenants/{tenant_id}/subscription")))
        .bearer_auth(&root)
        .json(&json!({ "plan": "basic", "seats": 2 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    srv.hire(&admin, "T-1", 100_000).await;
    srv.hire(&admin, "T-2", 100_000).await;
    let (status, body) = srv
        .post(
            &admin,
            "/employees",
            json!({
                "employee_code": "T-3",
                "first_name": "Over",
                "last_name": "Limit",
                "email": "t3@staff.test",
                "department": "Ops",
                "designation": "Clerk",
                "hire_date": "2025-01-06",
                "base_salary": 100_000
            }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{body}");

    let res = srv
        .client
        .put(srv.url(&format!("/system/tenants/{tenant_id}/subscription")))
        .bearer_auth(&root)
        .json(&json!({ "plan": "trial", "seats": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = srv.get(&root, &format!("/system/tenants/{tenant_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tenant"]["subscription"]["seats"], 2);
    assert_eq!(body["active_employees"], 2);
}

#[tokio::test]
async fn ticket_lifecycle_over_http() {
    let srv = TestServer::spawn().await;
    let (_tenant_id, admin) = srv.tenant_with_admin("helpdesk").await;
    let first = srv.hire(&admin, "H-1", 100_000).await;
    let second = srv.hire(&admin, "H-2", 100_000).await;
    srv.add_user(&admin, "h1@helpdesk.test", &["employee"], Some(&first)).await;
    srv.add_user(&admin, "h2@helpdesk.test", &["employee"], Some(&second)).await;
    let opener = srv.token(Some("helpdesk"), "h1@helpdesk.test", "user-password-1").await;
    let outsider = srv.token(Some("helpdesk"), "h2@helpdesk.test", "user-password-1").await;

    let (status, ticket) = srv
        .post(
            &opener,
            "/tickets",
            json!({ "subject": "Payslip missing", "description": "March is not there", "priority": "high" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{ticket}");
    assert_eq!(ticket["status"], "open");
    let id = ticket["ticket_id"].as_str().unwrap().to_string();

    // Only the opener and managers see it.
    let (status, _) = srv.get(&outsider, &format!("/tickets/{id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, body) = srv.get(&outsider, "/tickets").await;
    assert_eq!(body["count"], 0);
    let (status, _) = srv
        .post(&outsider, &format!("/tickets/{id}/comments"), json!({ "body": "me too" }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, body) = srv.get(&admin, "/tickets").await;
    assert_eq!(body["count"], 1);

    let (status, _) = srv
        .post(&opener, &format!("/tickets/{id}/comments"), json!({ "body": "any news?" }))
        .await;
    assert_eq!(status, StatusCode::OK);

    // Status transitions belong to managers.
    let (status, _) = srv.post(&opener, &format!("/tickets/{id}/start"), json!({})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, body) = srv.post(&admin, &format!("/tickets/{id}/start"), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "in_progress");
    let (status, body) = srv
        .post(&admin, &format!("/tickets/{id}/resolve"), json!({ "resolution": "re-issued" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "resolved");
    assert_eq!(body["resolution"], "re-issued");

    let (status, body) = srv
        .post(&opener, &format!("/tickets/{id}/reopen"), json!({ "reason": "still missing" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "open");

    let (status, _) = srv.post(&admin, &format!("/tickets/{id}/close"), json!({})).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    srv.post(&admin, &format!("/tickets/{id}/resolve"), json!({})).await;
    let (status, body) = srv.post(&admin, &format!("/tickets/{id}/close"), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "closed");
    assert_eq!(body["comments"].as_array().unwrap().len(), 1);

    let (status, _) = srv
        .post(&opener, &format!("/tickets/{id}/comments"), json!({ "body": "thanks" }))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}
