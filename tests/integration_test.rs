use handoff::config::{AdminConfig, AppConfig, CorsConfig, DatabaseConfig, RateLimitConfig, ServerConfig, ShareConfig};
use handoff::identity::Directory;
use handoff::kv::Kv;
use handoff::state::AppState;
use handoff::token_coordinator::TokenCoordinator;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// Spawn the full router on a random port against a fresh temp-file
/// database, mirroring the teacher's `spawn_server` test harness.
async fn spawn_server(admin_users: Vec<String>) -> (SocketAddr, tokio::task::JoinHandle<()>) {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    let db_path = tmp.path().to_path_buf();
    std::mem::forget(tmp);

    let config = AppConfig {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        database: DatabaseConfig {
            path: db_path,
            pool_size: 4,
        },
        cors: CorsConfig {
            allowed_origins: vec!["*".to_string()],
        },
        admin: AdminConfig { admin_users },
        shares: ShareConfig {
            max_payload_bytes: 8_388_608,
            max_ttl_secs: 3600,
            default_ttl_secs: 600,
            base_url: Some(String::new()),
        },
        rate_limit: RateLimitConfig {
            per_second: 1000,
            burst_size: 1000,
        },
    };

    let pool = handoff::storage::sqlite::create_pool(&config.database).unwrap();
    handoff::storage::sqlite::init_pool(&pool).await.unwrap();

    let kv = Kv::new(pool.clone());
    let directory = Directory::new(kv.clone());
    let tokens = TokenCoordinator::new(pool.clone());
    let state = AppState {
        directory,
        kv,
        tokens,
        config: Arc::new(config),
    };

    let app = handoff::build_router(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    (addr, handle)
}

fn client() -> reqwest::Client {
    reqwest::Client::new()
}

async fn register_user(base: &str, username: &str, public_key: &str) -> String {
    let resp = client()
        .post(format!("{base}/v1/users/{username}"))
        .json(&json!({ "publicKey": public_key }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    body["authSecret"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn single_use_share_lifecycle() {
    let (addr, _handle) = spawn_server(vec![]).await;
    let base = format!("http://{addr}");

    register_user(&base, "bob", "PUBK-bob").await;

    let resp = client()
        .post(format!("{base}/v1/shares"))
        .json(&json!({ "recipient": "bob", "cipher": "Y2lwaA", "ttlSec": 120 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    let token = body["token"].as_str().unwrap().to_string();
    assert!(body["shareUrl"].as_str().unwrap().ends_with(&token));

    let resp = client()
        .get(format!("{base}/v1/shares/{token}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["cipher"], "Y2lwaA");

    let resp = client()
        .post(format!("{base}/v1/shares/{token}/consume"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);

    let resp = client()
        .post(format!("{base}/v1/shares/{token}/consume"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 410);

    let resp = client()
        .get(format!("{base}/v1/shares/{token}"))
        .send()
        .await
        .unwrap();
    assert!(resp.status() == 404 || resp.status() == 410);
}

#[tokio::test]
async fn concurrent_consume_exactly_one_wins() {
    let (addr, _handle) = spawn_server(vec![]).await;
    let base = format!("http://{addr}");

    register_user(&base, "bob", "PUBK-bob").await;

    let resp = client()
        .post(format!("{base}/v1/shares"))
        .json(&json!({ "recipient": "bob", "cipher": "Y2lwaA" }))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    let token = body["token"].as_str().unwrap().to_string();

    let base1 = base.clone();
    let token1 = token.clone();
    let base2 = base.clone();
    let token2 = token.clone();

    let (r1, r2) = tokio::join!(
        tokio::spawn(async move {
            client()
                .post(format!("{base1}/v1/shares/{token1}/consume"))
                .send()
                .await
                .unwrap()
                .status()
        }),
        tokio::spawn(async move {
            client()
                .post(format!("{base2}/v1/shares/{token2}/consume"))
                .send()
                .await
                .unwrap()
                .status()
        }),
    );

    let statuses = [r1.unwrap().as_u16(), r2.unwrap().as_u16()];
    let successes = statuses.iter().filter(|&&s| s == 204).count();
    let gones = statuses.iter().filter(|&&s| s == 410).count();
    assert_eq!(successes, 1);
    assert_eq!(gones, 1);
}

#[tokio::test]
async fn authenticated_key_rotation() {
    let (addr, _handle) = spawn_server(vec![]).await;
    let base = format!("http://{addr}");

    let secret = register_user(&base, "alice", "PUBK1").await;

    let resp = client()
        .post(format!("{base}/v1/users/alice"))
        .json(&json!({ "publicKey": "PUBK2", "authSecret": "wrong" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let resp = client()
        .post(format!("{base}/v1/users/alice"))
        .json(&json!({ "publicKey": "PUBK2", "authSecret": secret }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client()
        .get(format!("{base}/v1/users/alice"))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["publicKey"], "PUBK2");
}

#[tokio::test]
async fn revoke_fans_out_to_inbox() {
    let (addr, _handle) = spawn_server(vec!["alice".to_string()]).await;
    let base = format!("http://{addr}");

    let alice_secret = register_user(&base, "alice", "PUBK-alice").await;
    register_user(&base, "bob", "PUBK-bob").await;

    let resp = client()
        .post(format!("{base}/v1/inbox"))
        .json(&json!({
            "recipient": "bob",
            "cipher": "Y2lwaA",
            "meta": { "sender": "alice" },
            "ttlSec": 300
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    let session_id = body["sessionId"].as_str().unwrap().to_string();

    let resp = client()
        .post(format!("{base}/v1/sessions/{session_id}/revoke"))
        .json(&json!({ "username": "alice", "authSecret": alice_secret }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client()
        .get(format!("{base}/v1/inbox/poll?recipient=bob"))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    let kinds: Vec<&str> = items
        .iter()
        .map(|i| i["meta"]["type"].as_str().unwrap())
        .collect();
    assert!(kinds.contains(&"share"));
    assert!(kinds.contains(&"revoke"));
}

#[tokio::test]
async fn restore_rejected_near_expiry() {
    let (addr, _handle) = spawn_server(vec!["alice".to_string()]).await;
    let base = format!("http://{addr}");

    let alice_secret = register_user(&base, "alice", "PUBK-alice").await;
    register_user(&base, "bob", "PUBK-bob").await;

    let resp = client()
        .post(format!("{base}/v1/inbox"))
        .json(&json!({
            "recipient": "bob",
            "cipher": "Y2lwaA",
            "meta": { "sender": "alice" },
            "ttlSec": 60
        }))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    let session_id = body["sessionId"].as_str().unwrap().to_string();

    let resp = client()
        .post(format!("{base}/v1/sessions/{session_id}/restore"))
        .json(&json!({ "username": "alice", "authSecret": alice_secret }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 410);
}

#[tokio::test]
async fn access_request_targeting() {
    let (addr, _handle) = spawn_server(vec!["alice".to_string(), "dave".to_string()]).await;
    let base = format!("http://{addr}");

    let carol_secret = register_user(&base, "carol", "PUBK-carol").await;
    let alice_secret = register_user(&base, "alice", "PUBK-alice").await;
    let dave_secret = register_user(&base, "dave", "PUBK-dave").await;

    let resp = client()
        .post(format!("{base}/v1/requests"))
        .json(&json!({
            "username": "carol",
            "authSecret": carol_secret,
            "origin": "https://example.com",
            "targetAdmin": "alice"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    let resp = client()
        .get(format!(
            "{base}/v1/requests/poll?username=alice&authSecret={alice_secret}"
        ))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["items"].as_array().unwrap().len(), 1);

    let resp = client()
        .get(format!(
            "{base}/v1/requests/poll?username=dave&authSecret={dave_secret}"
        ))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["items"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn inbox_ack_is_idempotent() {
    let (addr, _handle) = spawn_server(vec![]).await;
    let base = format!("http://{addr}");
    register_user(&base, "bob", "PUBK-bob").await;

    let resp = client()
        .post(format!("{base}/v1/inbox"))
        .json(&json!({ "recipient": "bob", "cipher": "Y2lwaA" }))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    let id = body["id"].as_str().unwrap().to_string();

    let resp = client()
        .post(format!("{base}/v1/inbox/ack"))
        .json(&json!({ "recipient": "bob", "ids": [id.clone()] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["deleted"], 1);

    let resp = client()
        .post(format!("{base}/v1/inbox/ack"))
        .json(&json!({ "recipient": "bob", "ids": [id] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["deleted"], 0);
}

#[tokio::test]
async fn accepted_endpoint_is_idempotent() {
    let (addr, _handle) = spawn_server(vec!["alice".to_string()]).await;
    let base = format!("http://{addr}");
    register_user(&base, "alice", "PUBK-alice").await;
    register_user(&base, "bob", "PUBK-bob").await;

    let resp = client()
        .post(format!("{base}/v1/inbox"))
        .json(&json!({
            "recipient": "bob",
            "cipher": "Y2lwaA",
            "meta": { "sender": "alice" }
        }))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    let session_id = body["sessionId"].as_str().unwrap().to_string();

    for _ in 0..2 {
        let resp = client()
            .post(format!("{base}/v1/sessions/{session_id}/accepted"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
    }
}

#[tokio::test]
async fn unknown_route_is_404_json() {
    let (addr, _handle) = spawn_server(vec![]).await;
    let base = format!("http://{addr}");

    let resp = client().get(format!("{base}/v1/nope")).send().await.unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert!(body.get("error").is_some());
}

#[tokio::test]
async fn preflight_echoes_wildcard_origin_with_credentials() {
    let (addr, _handle) = spawn_server(vec![]).await;
    let base = format!("http://{addr}");

    let resp = client()
        .request(reqwest::Method::OPTIONS, format!("{base}/v1/shares"))
        .header("Origin", "https://extension.example")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);
    assert_eq!(
        resp.headers().get("access-control-allow-origin").unwrap(),
        "https://extension.example"
    );
    assert_eq!(
        resp.headers()
            .get("access-control-allow-credentials")
            .unwrap(),
        "true"
    );
}
