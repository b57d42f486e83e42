//! Local stand-in for the GitHub installation token endpoint
#![allow(dead_code)]

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use chrono::{Duration, SecondsFormat, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const TEST_KEY_PATH: &str =
    concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/test_app_key.pem");
pub const TEST_KEY: &str = include_str!("../fixtures/test_app_key.pem");
const TEST_PUBLIC_KEY: &str = include_str!("../fixtures/test_app_key.pub.pem");

pub const APP_ID: &str = "123456";
pub const INSTALLATION_ID: &str = "98765";

#[derive(Clone, Default)]
pub struct FakeGitHub {
    pub calls: Arc<AtomicUsize>,
}

impl FakeGitHub {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Deserialize)]
struct Claims {
    iss: String,
    iat: i64,
    exp: i64,
}

fn verify_app_jwt(headers: &HeaderMap) -> Option<Claims> {
    let jwt = headers
        .get("authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")?;
    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_issuer(&[APP_ID]);
    let key = DecodingKey::from_rsa_pem(TEST_PUBLIC_KEY.as_bytes()).ok()?;
    decode::<Claims>(jwt, &key, &validation).ok().map(|d| d.claims)
}

async fn access_tokens(
    State(state): State<FakeGitHub>,
    Path(installation_id): Path<String>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    let n = state.calls.fetch_add(1, Ordering::SeqCst) + 1;

    let Some(claims) = verify_app_jwt(&headers) else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"message": "A JSON web token could not be decoded"})),
        );
    };
    assert_eq!(claims.iss, APP_ID);
    assert!(claims.exp - claims.iat <= 11 * 60);

    if installation_id != INSTALLATION_ID {
        return (StatusCode::NOT_FOUND, Json(json!({"message": "Not Found"})));
    }

    let expires_at = (Utc::now() + Duration::hours(1)).to_rfc3339_opts(SecondsFormat::Secs, true);
    (
        StatusCode::CREATED,
        Json(json!({
            "token": format!("ghs_fake{n}"),
            "expires_at": expires_at,
            "permissions": {"contents": "read", "metadata": "read"},
            "repository_selection": "selected",
            "repositories": [{"id": 1, "full_name": "lornu-ai/lornu.ai"}]
        })),
    )
}

async fn slow_access_tokens(State(state): State<FakeGitHub>) -> StatusCode {
    state.calls.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
    StatusCode::CREATED
}

pub async fn spawn_fake_github(state: FakeGitHub) -> String {
    let app = Router::new()
        .route(
            "/app/installations/:installation_id/access_tokens",
            post(access_tokens),
        )
        .route(
            "/slow/app/installations/:installation_id/access_tokens",
            post(slow_access_tokens),
        )
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}
