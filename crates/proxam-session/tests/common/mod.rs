//! Test utilities: in-process identity services and storage fixtures.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Router;
use axum::extract::Json;
use axum::routing::post;
use serde_json::{Value, json};

use proxam_session::claims::{Claims, Role};
use proxam_session::config::SessionConfig;
use proxam_session::gateway::AuthGateway;
use proxam_session::storage::{MemoryTokenStore, StorageError, TokenStore};
use proxam_session::store::SessionStore;
use proxam_session::token;

/// A stand-in for the platform's identity service: one fixed account per
/// role, answering with the real wire shape.
pub fn identity_app() -> Router {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/signup", post(signup))
}

async fn login(Json(body): Json<Value>) -> Json<Value> {
    let email = body["email"].as_str().unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();
    let user_type = body["userType"].as_str().unwrap_or_default();

    let granted = match (email, password, user_type) {
        ("admin@corp.test", "hunter22", "admin") => Some(json!({
            "id": "usr_admin_1",
            "email": email,
            "name": "Ada Admin",
            "role": "admin",
            "organizationId": "org_corp",
        })),
        ("emma@corp.test", "hunter22", "admin") => Some(json!({
            "id": "usr_exam_1",
            "email": email,
            "name": "Emma Examiner",
            "role": "examiner",
            "organizationId": "org_corp",
        })),
        ("kai@corp.test", "hunter22", "candidate") => Some(json!({
            "id": "usr_cand_1",
            "email": email,
            "name": "Kai Candidate",
            "role": "candidate",
        })),
        _ => None,
    };

    match granted {
        Some(user) => {
            let token = token_for(&user);
            Json(json!({ "success": true, "token": token, "user": user }))
        }
        None => Json(json!({ "success": false, "error": "Invalid email or password" })),
    }
}

async fn signup(Json(body): Json<Value>) -> Json<Value> {
    let email = body["email"].as_str().unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();

    if email == "existing@example.com" {
        return Json(json!({
            "success": false,
            "error": "An account with this email already exists",
        }));
    }
    if password.chars().count() < 6 {
        return Json(json!({
            "success": false,
            "error": "Password must be at least 6 characters",
        }));
    }

    let user = json!({
        "id": "usr_new_1",
        "email": email,
        "name": body["name"].as_str().unwrap_or_default(),
        "role": body["role"].as_str().unwrap_or("candidate"),
    });
    Json(json!({ "success": true, "token": token_for(&user), "user": user }))
}

fn token_for(user: &Value) -> String {
    let claims = Claims {
        sub: user["id"].as_str().unwrap().to_string(),
        email: user["email"].as_str().unwrap().to_string(),
        name: user["name"].as_str().unwrap().to_string(),
        role: user["role"].as_str().unwrap().parse().unwrap(),
        organization_id: user["organizationId"].as_str().map(str::to_string),
        exp: chrono::Utc::now().timestamp() + 86_400,
    };
    token::encode(&claims).unwrap()
}

/// An identity service that grants every login after a delay, for
/// ordering tests.
pub fn slow_identity_app(delay: Duration) -> Router {
    Router::new().route(
        "/auth/login",
        post(move |Json(body): Json<Value>| async move {
            tokio::time::sleep(delay).await;
            let user = json!({
                "id": "usr_slow_1",
                "email": body["email"].as_str().unwrap_or_default(),
                "name": "Slow Login",
                "role": "candidate",
            });
            Json(json!({ "success": true, "token": token_for(&user), "user": user }))
        }),
    )
}

/// Serve an app on an ephemeral port and return its base URL.
pub async fn spawn_app(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Reserve a port and release it, so connections to it are refused
/// immediately and the client sees a transport failure.
pub fn unreachable_server() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}", port)
}

pub fn config_for(server_url: &str) -> SessionConfig {
    SessionConfig {
        server_url: server_url.to_string(),
        ..SessionConfig::default()
    }
}

/// A session store with in-memory persistence, plus a handle to that
/// storage for seeding and inspection.
pub fn store_for(server_url: &str) -> (Arc<SessionStore>, Arc<MemoryTokenStore>) {
    let storage = Arc::new(MemoryTokenStore::new());
    let gateway = AuthGateway::from_config(&config_for(server_url)).unwrap();
    (
        Arc::new(SessionStore::new(gateway, storage.clone())),
        storage,
    )
}

/// Encode a token directly, bypassing the gateway.
pub fn make_token(role: Role, exp: i64) -> String {
    token::encode(&Claims {
        sub: "usr_seeded".to_string(),
        email: "seeded@corp.test".to_string(),
        name: "Seeded User".to_string(),
        role,
        organization_id: None,
        exp,
    })
    .unwrap()
}

/// Token storage that counts reads, for reconciliation idempotence tests.
pub struct CountingStore {
    loads: AtomicUsize,
    inner: MemoryTokenStore,
}

impl CountingStore {
    pub fn new() -> Self {
        Self {
            loads: AtomicUsize::new(0),
            inner: MemoryTokenStore::new(),
        }
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn seed(&self, token: &str) {
        self.inner.save(token).unwrap();
    }
}

impl TokenStore for CountingStore {
    fn load(&self) -> Result<Option<String>, StorageError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.inner.load()
    }

    fn save(&self, token: &str) -> Result<(), StorageError> {
        self.inner.save(token)
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.inner.clear()
    }
}
