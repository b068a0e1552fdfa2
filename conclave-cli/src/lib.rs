//! Reference entitlement authority for Conclave.
//!
//! Serves the record API that `HttpEntitlementStore` talks to, plus an
//! administrative decision endpoint. Records are kept in memory.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use conclave_license::{EntitlementRecord, EntitlementStatus, EntitlementStore, UserId};
use conclave_remote::MemoryEntitlementStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Shared state of the authority service.
#[derive(Clone, Default)]
pub struct AuthorityState {
    store: Arc<MemoryEntitlementStore>,
    api_token: Option<Arc<str>>,
}

impl AuthorityState {
    /// State over `store`, open to anyone.
    #[must_use]
    pub fn new(store: Arc<MemoryEntitlementStore>) -> Self {
        Self {
            store,
            api_token: None,
        }
    }

    /// Requires `Authorization: Bearer <token>` on the record routes.
    #[must_use]
    pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into().into());
        self
    }

    /// The backing store.
    #[must_use]
    pub fn store(&self) -> &Arc<MemoryEntitlementStore> {
        &self.store
    }

    fn authorize(&self, headers: &HeaderMap) -> Result<(), ApiError> {
        let Some(expected) = &self.api_token else {
            return Ok(());
        };
        let presented = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        if presented == Some(&**expected) {
            Ok(())
        } else {
            Err(ApiError::Unauthorized)
        }
    }
}

/// Body of the decision endpoint.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct DecisionRequest {
    pub status: EntitlementStatus,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug)]
enum ApiError {
    Unauthorized,
    BadUser(String),
    NotFound,
    Store(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "missing or wrong token".to_string()),
            Self::BadUser(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::NotFound => (StatusCode::NOT_FOUND, "no such record".to_string()),
            Self::Store(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

fn parse_user(raw: &str) -> Result<UserId, ApiError> {
    UserId::parse(raw).map_err(|e| ApiError::BadUser(e.to_string()))
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn get_record_handler(
    State(state): State<AuthorityState>,
    headers: HeaderMap,
    Path((app, user)): Path<(String, String)>,
) -> Result<Json<EntitlementRecord>, ApiError> {
    state.authorize(&headers)?;
    let user = parse_user(&user)?;
    state
        .store
        .get(&app, &user)
        .await
        .map_err(|e| ApiError::Store(e.to_string()))?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

async fn put_record_handler(
    State(state): State<AuthorityState>,
    headers: HeaderMap,
    Path((app, user)): Path<(String, String)>,
    Json(record): Json<EntitlementRecord>,
) -> Result<StatusCode, ApiError> {
    state.authorize(&headers)?;
    let user = parse_user(&user)?;
    state
        .store
        .put(&app, &user, &record)
        .await
        .map_err(|e| ApiError::Store(e.to_string()))?;
    info!("Record {}/{} written", app, user);
    Ok(StatusCode::NO_CONTENT)
}

async fn decision_handler(
    State(state): State<AuthorityState>,
    headers: HeaderMap,
    Path((app, user)): Path<(String, String)>,
    Json(decision): Json<DecisionRequest>,
) -> Result<Json<EntitlementRecord>, ApiError> {
    state.authorize(&headers)?;
    let user = parse_user(&user)?;
    state.store.decide(&app, &user, decision.status).await;
    info!("Decided {}/{}: {}", app, user, decision.status);

    let record = state
        .store
        .get(&app, &user)
        .await
        .map_err(|e| ApiError::Store(e.to_string()))?;
    record.map(Json).ok_or_else(|| {
        warn!("Record {}/{} vanished after decision", app, user);
        ApiError::NotFound
    })
}

/// Build the HTTP API router with the given authority state.
pub fn build_router(state: AuthorityState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/v1/apps/{app}/users/{user}",
            get(get_record_handler).put(put_record_handler),
        )
        .route("/v1/apps/{app}/users/{user}/decision", post(decision_handler))
        .with_state(state)
}
