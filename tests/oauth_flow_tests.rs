use async_trait::async_trait;
use auth_portal::{
    AppState, OAuth2Client, OAuthState,
    config::{AppConfig, OAuthProviderConfig},
    create_router,
    models::User,
    repository::{Repository, RepositoryState},
};
use axum::{Json, Router, routing::get, routing::post};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use uuid::Uuid;

// --- In-Memory Repository ---

/// Keyed user store mirroring the Postgres upsert semantics, so the full
/// login flow can run without a database.
#[derive(Default)]
struct InMemoryRepo {
    users: Mutex<HashMap<Uuid, User>>,
}

impl InMemoryRepo {
    fn user_count(&self) -> usize {
        self.users.lock().unwrap().len()
    }
}

#[async_trait]
impl Repository for InMemoryRepo {
    async fn get_user(&self, id: Uuid) -> Option<User> {
        self.users.lock().unwrap().get(&id).cloned()
    }

    async fn upsert_oauth_user(
        &self,
        provider: &str,
        subject: &str,
        email: &str,
        display_name: Option<String>,
    ) -> Option<User> {
        let mut users = self.users.lock().unwrap();

        if let Some(existing) = users
            .values_mut()
            .find(|u| u.provider == provider && u.subject == subject)
        {
            existing.email = email.to_string();
            if display_name.is_some() {
                existing.display_name = display_name;
            }
            existing.last_login = Utc::now();
            return Some(existing.clone());
        }

        let user = User {
            id: Uuid::new_v4(),
            provider: provider.to_string(),
            subject: subject.to_string(),
            email: email.to_string(),
            display_name,
            created_at: Utc::now(),
            last_login: Utc::now(),
        };
        users.insert(user.id, user.clone());
        Some(user)
    }
}

// --- Stub Identity Provider ---

/// A minimal in-process provider: a token endpoint that accepts any code and
/// a user-info endpoint reporting a fixed identity.
async fn spawn_stub_provider() -> String {
    let router = Router::new()
        .route(
            "/token",
            post(|| async {
                Json(serde_json::json!({
                    "access_token": "stub-access-token",
                    "token_type": "bearer",
                    "expires_in": 3600
                }))
            }),
        )
        .route(
            "/userinfo",
            get(|| async {
                Json(serde_json::json!({
                    "id": "prov-123",
                    "email": "dev@example.com",
                    "name": "Dev User"
                }))
            }),
        );

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind stub provider port");
    let address = format!("http://127.0.0.1:{}", listener.local_addr().unwrap().port());

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    address
}

// --- App Setup ---

fn stub_provider_config(provider_base: &str) -> OAuthProviderConfig {
    OAuthProviderConfig {
        name: "google".to_string(),
        client_id: "test-client-id".to_string(),
        client_secret: "test-client-secret".to_string(),
        auth_url: format!("{}/authorize", provider_base),
        token_url: format!("{}/token", provider_base),
        userinfo_url: format!("{}/userinfo", provider_base),
        scopes: "openid email profile".to_string(),
    }
}

async fn spawn_app(repo: Arc<InMemoryRepo>, provider_base: &str) -> String {
    let mut config = AppConfig::default();
    config.providers = vec![stub_provider_config(provider_base)];

    let oauth = Arc::new(OAuth2Client::new(&config)) as OAuthState;
    let state = AppState {
        repo: repo as RepositoryState,
        oauth,
        config,
    };

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind app port");
    let address = format!("http://127.0.0.1:{}", listener.local_addr().unwrap().port());

    let router = create_router(state);
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    address
}

/// A client that never follows redirects, so each hop of the flow can be
/// inspected.
fn no_redirect_client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

/// Runs the authorize + callback legs and returns the issued access token.
async fn login(client: &reqwest::Client, app: &str) -> String {
    // Leg 1: the portal sends the browser to the provider.
    let resp = client
        .get(format!("{}/views/oauth/google", app))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_redirection());

    let location = resp.headers()["location"].to_str().unwrap().to_string();
    let url = reqwest::Url::parse(&location).unwrap();
    let state = url
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.to_string())
        .expect("authorize redirect carries no state");

    // Leg 2: the provider sends the browser back with a code. The stub
    // accepts any code, so one is invented here.
    let resp = client
        .get(format!(
            "{}/views/oauth/callback?code=fake-code&state={}",
            app, state
        ))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_redirection());

    let location = resp.headers()["location"].to_str().unwrap();
    location
        .strip_prefix("/views/login-success?token=")
        .unwrap_or_else(|| panic!("callback landed on {} instead of the success page", location))
        .to_string()
}

// --- Tests ---

#[tokio::test]
async fn test_login_page_lists_provider() {
    let provider = spawn_stub_provider().await;
    let app = spawn_app(Arc::new(InMemoryRepo::default()), &provider).await;

    let resp = reqwest::get(format!("{}/views/login", app)).await.unwrap();
    assert_eq!(resp.status(), 200);

    let body = resp.text().await.unwrap();
    assert!(body.contains("/views/oauth/google"));
}

#[tokio::test]
async fn test_authorize_redirects_to_provider_with_state() {
    let provider = spawn_stub_provider().await;
    let app = spawn_app(Arc::new(InMemoryRepo::default()), &provider).await;
    let client = no_redirect_client();

    let resp = client
        .get(format!("{}/views/oauth/google", app))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_redirection());
    // Stateless flow: no cookie is planted to track the attempt.
    assert!(resp.headers().get("set-cookie").is_none());

    let location = resp.headers()["location"].to_str().unwrap();
    let url = reqwest::Url::parse(location).unwrap();
    assert!(location.starts_with(&format!("{}/authorize", provider)));

    let params: HashMap<String, String> = url
        .query_pairs()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    assert_eq!(params.get("client_id").map(String::as_str), Some("test-client-id"));
    assert_eq!(params.get("response_type").map(String::as_str), Some("code"));
    assert!(params.get("state").is_some_and(|s| !s.is_empty()));
    assert!(params.get("redirect_uri").is_some_and(|r| r.ends_with("/views/oauth/callback")));
}

#[tokio::test]
async fn test_unknown_provider_bounces_to_login() {
    let provider = spawn_stub_provider().await;
    let app = spawn_app(Arc::new(InMemoryRepo::default()), &provider).await;
    let client = no_redirect_client();

    let resp = client
        .get(format!("{}/views/oauth/someidp", app))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_redirection());
    assert_eq!(
        resp.headers()["location"].to_str().unwrap(),
        "/views/login?error=unknown_provider"
    );
}

#[tokio::test]
async fn test_callback_rejects_forged_state() {
    let provider = spawn_stub_provider().await;
    let repo = Arc::new(InMemoryRepo::default());
    let app = spawn_app(repo.clone(), &provider).await;
    let client = no_redirect_client();

    let resp = client
        .get(format!(
            "{}/views/oauth/callback?code=fake-code&state=forged-state-value",
            app
        ))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_redirection());
    assert_eq!(
        resp.headers()["location"].to_str().unwrap(),
        "/views/login?error=invalid_state"
    );
    // The forged attempt must not create an account.
    assert_eq!(repo.user_count(), 0);
}

#[tokio::test]
async fn test_callback_surfaces_provider_denial() {
    let provider = spawn_stub_provider().await;
    let app = spawn_app(Arc::new(InMemoryRepo::default()), &provider).await;
    let client = no_redirect_client();

    let resp = client
        .get(format!("{}/views/oauth/callback?error=access_denied", app))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_redirection());
    assert_eq!(
        resp.headers()["location"].to_str().unwrap(),
        "/views/login?error=access_denied"
    );
}

#[tokio::test]
async fn test_callback_requires_code() {
    let provider = spawn_stub_provider().await;
    let app = spawn_app(Arc::new(InMemoryRepo::default()), &provider).await;
    let client = no_redirect_client();

    // Get a genuine state first, then call back without a code.
    let resp = client
        .get(format!("{}/views/oauth/google", app))
        .send()
        .await
        .unwrap();
    let location = resp.headers()["location"].to_str().unwrap();
    let url = reqwest::Url::parse(location).unwrap();
    let state = url
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.to_string())
        .unwrap();

    let resp = client
        .get(format!("{}/views/oauth/callback?state={}", app, state))
        .send()
        .await
        .unwrap();
    assert_eq!(
        resp.headers()["location"].to_str().unwrap(),
        "/views/login?error=missing_code"
    );
}

#[tokio::test]
async fn test_full_login_flow_issues_working_token() {
    let provider = spawn_stub_provider().await;
    let repo = Arc::new(InMemoryRepo::default());
    let app = spawn_app(repo.clone(), &provider).await;
    let client = no_redirect_client();

    let token = login(&client, &app).await;
    assert_eq!(repo.user_count(), 1);

    // The issued token authenticates API requests.
    let resp = client
        .get(format!("{}/me", app))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let profile: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(profile["email"], "dev@example.com");
    assert_eq!(profile["display_name"], "Dev User");
    assert_eq!(profile["provider"], "google");
}

#[tokio::test]
async fn test_repeat_login_reuses_account() {
    let provider = spawn_stub_provider().await;
    let repo = Arc::new(InMemoryRepo::default());
    let app = spawn_app(repo.clone(), &provider).await;
    let client = no_redirect_client();

    let first = login(&client, &app).await;
    let second = login(&client, &app).await;
    assert_eq!(repo.user_count(), 1, "same provider subject must map to one account");

    // Both tokens resolve to the same user id.
    let me = |token: String| {
        let client = client.clone();
        let app = app.clone();
        async move {
            let resp = client
                .get(format!("{}/me", app))
                .bearer_auth(token)
                .send()
                .await
                .unwrap();
            resp.json::<serde_json::Value>().await.unwrap()["id"].clone()
        }
    };
    assert_eq!(me(first).await, me(second).await);
}
