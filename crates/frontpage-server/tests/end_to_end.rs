//! Resolve an author, read their repository, mirror a post, then delete it.

use std::{path::PathBuf, sync::Arc, time::Duration};

use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use axum::{
  body::Body,
  http::{Request, StatusCode, header},
};
use frontpage_atproto::{IdentityResolver, RepoClient, ResolverConfig};
use frontpage_core::ident::Identifier;
use frontpage_server::{AppState, ServerConfig, router};
use frontpage_store_sqlite::SqliteStore;
use rand_core::OsRng;
use reqwest::Url;
use serde_json::{Value, json};
use tower::ServiceExt as _;
use wiremock::{
  Mock, MockServer, ResponseTemplate,
  matchers::{method, path, query_param},
};

const SECRET: &str = "relay-secret";

async fn call(state: &AppState<SqliteStore>, req: Request<Body>) -> (StatusCode, Value) {
  let resp = router(state.clone()).oneshot(req).await.unwrap();
  let status = resp.status();
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  (status, serde_json::from_slice(&bytes).unwrap())
}

fn hook(events: Value) -> Request<Body> {
  Request::builder()
    .method("POST")
    .uri("/api/receive_hook")
    .header(header::AUTHORIZATION, format!("Bearer {SECRET}"))
    .header(header::CONTENT_TYPE, "application/json")
    .body(Body::from(events.to_string()))
    .unwrap()
}

fn get(uri: &str) -> Request<Body> { Request::builder().uri(uri).body(Body::empty()).unwrap() }

#[tokio::test]
async fn alice_posts_and_deletes() {
  // ── Identity ─────────────────────────────────────────────────────────────
  let network = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/xrpc/com.atproto.identity.resolveHandle"))
    .and(query_param("handle", "alice.example"))
    .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "did": "did:plc:abc123" })))
    .mount(&network)
    .await;
  Mock::given(method("GET"))
    .and(path("/did:plc:abc123"))
    .respond_with(ResponseTemplate::new(200).set_body_json(json!({
      "id": "did:plc:abc123",
      "alsoKnownAs": ["at://alice.example"],
      "service": [{
        "id": "#atproto_pds",
        "type": "AtprotoPersonalDataServer",
        "serviceEndpoint": "https://pds.example"
      }]
    })))
    .mount(&network)
    .await;

  let resolver = IdentityResolver::new(ResolverConfig {
    plc_directory: network.uri(),
    handle_resolver: Some(network.uri()),
    timeout: Duration::from_secs(2),
    ..Default::default()
  })
  .unwrap();
  let alice = resolver
    .resolve_pds(&Identifier::parse("alice.example").unwrap())
    .await
    .unwrap();
  assert_eq!(alice.did().as_str(), "did:plc:abc123");
  assert_eq!(alice.pds.as_str(), "https://pds.example/");

  // ── Repository ───────────────────────────────────────────────────────────
  // The mock stands in for pds.example.
  let pds = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/xrpc/com.atproto.repo.describeRepo"))
    .and(query_param("repo", "did:plc:abc123"))
    .respond_with(ResponseTemplate::new(200).set_body_json(json!({
      "handle": "alice.example",
      "did": "did:plc:abc123",
      "collections": ["fyi.frontpage.post"]
    })))
    .mount(&pds)
    .await;

  let description = RepoClient::new(Duration::from_secs(2))
    .unwrap()
    .describe_repository(&Url::parse(&pds.uri()).unwrap(), alice.did())
    .await
    .unwrap();
  assert_eq!(description.collections, vec!["fyi.frontpage.post"]);

  // ── Mirror ───────────────────────────────────────────────────────────────
  let salt = SaltString::generate(&mut OsRng);
  let hash = Argon2::default().hash_password(SECRET.as_bytes(), &salt).unwrap().to_string();
  let config = ServerConfig {
    host:                    "127.0.0.1".into(),
    port:                    0,
    store_path:              PathBuf::from(":memory:"),
    hook_secret_hash:        hash,
    plc_directory:           network.uri(),
    handle_resolver:         Some(network.uri()),
    identity_cache_ttl_secs: 60,
    identity_cache_capacity: 100,
    http_timeout_secs:       2,
    notification_webhook:    None,
    front_page_limit:        50,
  };
  let store = SqliteStore::open_in_memory().await.unwrap();
  let state = AppState::new(Arc::new(store), config).unwrap();

  let (status, report) = call(&state, hook(json!([{
    "offset": 100,
    "type": "create",
    "collection": description.collections[0],
    "authorDid": "did:plc:abc123",
    "rkey": "3k2x",
    "cid": "bafyreib2rxk3rh6kzwq",
    "record": { "title": "Hello, Frontpage", "url": "https://example.com", "createdAt": "2024-05-01T12:00:00Z" }
  }])))
  .await;
  assert_eq!(status, StatusCode::OK, "{report}");
  assert_eq!(report["outcomes"][0]["effect"], "created");

  let (_, front) = call(&state, get("/api/front-page")).await;
  assert_eq!(front.as_array().unwrap().len(), 1);
  assert_eq!(front[0]["post"]["rkey"], "3k2x");
  assert_eq!(front[0]["post"]["status"], "live");

  let (status, report) = call(&state, hook(json!([{
    "offset": 101,
    "type": "delete",
    "collection": "fyi.frontpage.post",
    "authorDid": "did:plc:abc123",
    "rkey": "3k2x"
  }])))
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(report["outcomes"][0]["effect"], "soft_deleted");

  let (_, front) = call(&state, get("/api/front-page")).await;
  assert!(front.as_array().unwrap().is_empty());

  let (status, post) = call(&state, get("/api/posts/did:plc:abc123/3k2x")).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(post["post"]["status"], "deleted");
  assert_eq!(post["post"]["title"], "Hello, Frontpage");
}
