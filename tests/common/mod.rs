//! Shared fixtures for integration tests.
//!
//! Each test gets its own temp-file SQLite database with the schema
//! applied, a fully wired [`AppState`], and helpers to seed rows and
//! mint bearer tokens.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use sea_orm::{ActiveModelTrait, ActiveValue::Set};
use tower::ServiceExt;
use uuid::Uuid;

use stockroom_api::auth::{AuthService, AuthUser};
use stockroom_api::config::{AppConfig, EmptyRequestPolicy};
use stockroom_api::db::{self, DbPool};
use stockroom_api::entities::user;
use stockroom_api::models::Role;
use stockroom_api::poller::PollPolicy;
use stockroom_api::services::cart::MemoryCartStore;
use stockroom_api::services::{
    AnalysisService, DashboardService, GuestService, ItemService, RequestService, UserService,
};
use stockroom_api::{build_router, AppState};

pub struct TestApp {
    pub state: Arc<AppState>,
    pub router: Router,
    // Holds the SQLite file alive for the duration of the test.
    _db_file: tempfile::NamedTempFile,
}

pub fn test_config(database_url: String) -> AppConfig {
    AppConfig::new(
        database_url,
        "integration-test-secret-0123456789abcdef".to_string(),
        "127.0.0.1".to_string(),
        0,
        "test".to_string(),
    )
}

pub async fn spawn_app() -> TestApp {
    let db_file = tempfile::NamedTempFile::new().expect("create sqlite file");
    let url = format!("sqlite://{}?mode=rwc", db_file.path().display());
    spawn_app_with(test_config(url), db_file).await
}

/// Like [`spawn_app`] but with the empty-line-item policy overridden.
pub async fn spawn_app_with_empty_policy(policy: EmptyRequestPolicy) -> TestApp {
    let db_file = tempfile::NamedTempFile::new().expect("create sqlite file");
    let url = format!("sqlite://{}?mode=rwc", db_file.path().display());
    let mut config = test_config(url);
    config.empty_request_policy = policy;
    spawn_app_with(config, db_file).await
}

/// Like [`spawn_app`] but pointed at a stub analysis backend.
pub async fn spawn_app_with_analysis(base_url: String) -> TestApp {
    let db_file = tempfile::NamedTempFile::new().expect("create sqlite file");
    let url = format!("sqlite://{}?mode=rwc", db_file.path().display());
    let mut config = test_config(url);
    config.analysis_base_url = base_url;
    spawn_app_with(config, db_file).await
}

pub async fn spawn_app_with(config: AppConfig, db_file: tempfile::NamedTempFile) -> TestApp {
    let db_pool: Arc<DbPool> = Arc::new(
        db::establish_connection(&config)
            .await
            .expect("connect to sqlite"),
    );
    db::run_migrations(&db_pool).await.expect("create schema");

    let auth = Arc::new(AuthService::new(&config));
    let analysis = Arc::new(AnalysisService::new(
        reqwest::Client::new(),
        config.analysis_base_url.clone(),
        PollPolicy {
            max_attempts: config.analysis_max_poll_attempts,
            interval: std::time::Duration::from_millis(20),
        },
        config.max_upload_bytes,
        None,
    ));

    let state = Arc::new(AppState {
        auth,
        db: Arc::clone(&db_pool),
        items: ItemService::new(Arc::clone(&db_pool), None),
        requests: RequestService::new(Arc::clone(&db_pool), None, config.empty_request_policy),
        users: UserService::new(Arc::clone(&db_pool)),
        guests: GuestService::new(Arc::clone(&db_pool), None),
        dashboard: DashboardService::new(Arc::clone(&db_pool)),
        analysis,
        cart: MemoryCartStore::new(),
        config,
    });

    TestApp {
        router: build_router(Arc::clone(&state)),
        state,
        _db_file: db_file,
    }
}

impl TestApp {
    /// Mint a bearer token for a fresh principal and mirror it into the
    /// users table, since request creation resolves the rank from storage.
    pub async fn token_for(&self, role: Role) -> (Uuid, String) {
        let user_id = Uuid::new_v4();
        let row = user::ActiveModel {
            id: Set(user_id),
            email: Set(format!("{}@example.com", user_id.simple())),
            name: Set(Some(format!("Test {}", role))),
            role: Set(role.to_string()),
            created_at: Set(chrono::Utc::now()),
            updated_at: Set(None),
        };
        row.insert(&*self.state.db).await.expect("seed user");
        (user_id, self.sign_token(user_id, role))
    }

    /// Mint a bearer token whose subject has no users row.
    pub fn bare_token(&self, role: Role) -> (Uuid, String) {
        let user_id = Uuid::new_v4();
        (user_id, self.sign_token(user_id, role))
    }

    fn sign_token(&self, user_id: Uuid, role: Role) -> String {
        let user = AuthUser {
            user_id,
            email: Some(format!("{}@example.com", user_id.simple())),
            name: Some(format!("Test {}", role)),
            role,
        };
        self.state
            .auth
            .issue_token(&user, 3600)
            .expect("sign token")
    }

    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> Response<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Create an item through the API using an admin token.
    pub async fn seed_item(&self, name: &str, level: Role, available: i32) -> Uuid {
        let (_, admin) = self.token_for(Role::Admin).await;
        let response = self
            .request(
                "POST",
                "/api/v1/items",
                Some(&admin),
                Some(serde_json::json!({
                    "name": name,
                    "description": null,
                    "category": "Test",
                    "location": "Shelf A",
                    "level": level,
                    "available": available,
                    "in_use": 0,
                    "damaged": 0,
                    "total": available,
                })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED, "seed_item failed");
        let body = read_json(response).await;
        body["id"].as_str().unwrap().parse().unwrap()
    }
}

pub async fn read_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
