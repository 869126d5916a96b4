//! Routes of the gateway.
//!
//! Request bodies are decoded by hand so that any malformed input is answered
//! with a `400`. Decryption failures are all answered with the same `403`.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::Service;
use crate::{abe_policy::NamedPolicy, core::epoch_to_hex};

/// Request to encrypt data under a registered policy.
#[derive(Debug, Deserialize)]
pub struct EncryptRequest {
    pub data: String,
    /// Identifier of the policy in the registry.
    pub policy: String,
}

/// Request to decrypt a base64 ciphertext with a base64 key.
#[derive(Debug, Deserialize)]
pub struct DecryptRequest {
    pub data: String,
    pub key: String,
}

/// Response of the administration setup route.
#[derive(Debug, Serialize)]
pub struct SetupResponse {
    pub epoch: String,
}

#[derive(Debug)]
enum ApiError {
    BadRequest(&'static str),
    Unauthorized,
    Forbidden,
    Internal(&'static str),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message).into_response(),
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized").into_response(),
            Self::Forbidden => (StatusCode::FORBIDDEN, "Decryption failed").into_response(),
            Self::Internal(message) => {
                (StatusCode::INTERNAL_SERVER_ERROR, message).into_response()
            }
        }
    }
}

/// Creates the router with all routes.
pub fn router(service: Arc<Service>) -> Router {
    let mut router = Router::new()
        .route("/generate-key/{role}", get(generate_key))
        .route("/encrypt", post(encrypt))
        .route("/decrypt", post(decrypt))
        .route("/policies", get(policies))
        .route("/public-parameters", get(public_parameters));
    if service.admin_token().is_some() {
        router = router.route("/admin/setup", post(setup));
    }
    let cors_allow_all = service.cors_allow_all();
    let router = router
        .fallback(|| async { (StatusCode::NOT_FOUND, "Not found") })
        .with_state(service)
        .layer(TraceLayer::new_for_http());
    if cors_allow_all {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}

/// Runs CPU bound work on the blocking pool.
async fn run_blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await.map_err(|e| {
        tracing::warn!(error = %e, "blocking task failed");
        ApiError::Internal("Internal error")
    })?
}

/// GET /generate-key/{role}
async fn generate_key(
    State(service): State<Arc<Service>>,
    Path(role): Path<String>,
) -> Result<String, ApiError> {
    run_blocking(move || {
        service.generate_key(&role).map_err(|e| {
            tracing::warn!(%role, error = e.kind_name(), "key generation failed");
            ApiError::Internal("Failed to generate key")
        })
    })
    .await
}

/// POST /encrypt
async fn encrypt(State(service): State<Arc<Service>>, body: Bytes) -> Result<String, ApiError> {
    let request: EncryptRequest =
        serde_json::from_slice(&body).map_err(|_| ApiError::BadRequest("Invalid request"))?;
    let policy = service
        .policy(&request.policy)
        .ok_or(ApiError::BadRequest("Invalid policy value"))?
        .clone();
    run_blocking(move || {
        let ciphertext = service
            .encrypt(&policy, request.data.as_bytes())
            .map_err(|e| {
                tracing::warn!(
                    policy = %request.policy,
                    error = e.kind_name(),
                    "encryption failed"
                );
                ApiError::Internal("Encryption failed")
            })?;
        tracing::debug!(policy = %request.policy, "data encrypted");
        Ok(ciphertext)
    })
    .await
}

/// POST /decrypt
async fn decrypt(State(service): State<Arc<Service>>, body: Bytes) -> Result<Vec<u8>, ApiError> {
    let request: DecryptRequest =
        serde_json::from_slice(&body).map_err(|_| ApiError::BadRequest("Invalid request"))?;
    let ciphertext = STANDARD
        .decode(&request.data)
        .map_err(|_| ApiError::BadRequest("Invalid ciphertext"))?;
    let key = STANDARD
        .decode(&request.key)
        .map_err(|_| ApiError::BadRequest("Invalid key"))?;
    match service.decrypt(&key, &ciphertext) {
        Ok(plaintext) => Ok(plaintext.to_vec()),
        Err(e) => {
            tracing::debug!(error = e.kind_name(), "decryption refused");
            Err(ApiError::Forbidden)
        }
    }
}

/// GET /policies
async fn policies(State(service): State<Arc<Service>>) -> Json<Vec<NamedPolicy>> {
    Json(
        service
            .registry()
            .iter()
            .map(|(id, ap)| NamedPolicy::new(id, &ap.to_string()))
            .collect(),
    )
}

/// GET /public-parameters
async fn public_parameters(State(service): State<Arc<Service>>) -> Result<String, ApiError> {
    service.public_parameters().map_err(|e| {
        tracing::warn!(error = e.kind_name(), "public parameters export failed");
        ApiError::Internal("Failed to export the public parameters")
    })
}

/// POST /admin/setup
async fn setup(
    State(service): State<Arc<Service>>,
    headers: HeaderMap,
) -> Result<Json<SetupResponse>, ApiError> {
    let expected = service.admin_token().ok_or(ApiError::Unauthorized)?;
    let provided = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)?;
    if !bool::from(provided.as_bytes().ct_eq(expected.as_bytes())) {
        tracing::warn!("rejected setup request");
        return Err(ApiError::Unauthorized);
    }
    let epoch = run_blocking(move || {
        service.rotate().map_err(|e| {
            tracing::warn!(error = e.kind_name(), "setup failed");
            ApiError::Internal("Setup failed")
        })
    })
    .await?;
    Ok(Json(SetupResponse {
        epoch: epoch_to_hex(&epoch),
    }))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::Request,
    };
    use serde_json::json;
    use tower::ServiceExt;

    use super::*;
    use crate::service::ServiceConfig;

    const ADMIN_TOKEN: &str = "0123456789abcdef";

    fn app(admin_token: Option<&str>) -> Router {
        let config = ServiceConfig {
            admin_token: admin_token.map(ToString::to_string),
            ..ServiceConfig::default()
        };
        router(Arc::new(
            Service::new(&config).expect("default configuration is valid"),
        ))
    }

    async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = app
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read body");
        (status, body.to_vec())
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("valid request")
    }

    fn post_request(uri: &str, body: impl Into<Body>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body.into())
            .expect("valid request")
    }

    async fn key(app: &Router, role: &str) -> String {
        let (status, body) = call(app, get_request(&format!("/generate-key/{role}"))).await;
        assert_eq!(status, StatusCode::OK);
        String::from_utf8(body).expect("base64 is UTF8")
    }

    async fn encrypt(app: &Router, data: &str, policy: &str) -> String {
        let request = json!({ "data": data, "policy": policy }).to_string();
        let (status, body) = call(app, post_request("/encrypt", request)).await;
        assert_eq!(status, StatusCode::OK);
        String::from_utf8(body).expect("base64 is UTF8")
    }

    async fn decrypt(app: &Router, data: &str, key: &str) -> (StatusCode, Vec<u8>) {
        let request = json!({ "data": data, "key": key }).to_string();
        call(app, post_request("/decrypt", request)).await
    }

    #[tokio::test]
    async fn test_teacher_admin_scenario() {
        let app = app(None);
        let teacher = key(&app, "teacher").await;
        let admin = key(&app, "admin").await;

        let ciphertext = encrypt(&app, "class council minutes", "2").await;
        assert_eq!(
            decrypt(&app, &ciphertext, &teacher).await,
            (StatusCode::OK, b"class council minutes".to_vec())
        );
        assert_eq!(
            decrypt(&app, &ciphertext, &admin).await.0,
            StatusCode::FORBIDDEN
        );

        let ciphertext = encrypt(&app, "school calendar", "1").await;
        assert_eq!(
            decrypt(&app, &ciphertext, &admin).await,
            (StatusCode::OK, b"school calendar".to_vec())
        );
    }

    #[tokio::test]
    async fn test_empty_data() {
        let app = app(None);
        let student = key(&app, "student").await;
        let ciphertext = encrypt(&app, "", "2").await;
        assert_eq!(
            decrypt(&app, &ciphertext, &student).await,
            (StatusCode::OK, Vec::new())
        );
    }

    #[tokio::test]
    async fn test_malformed_requests() {
        let app = app(None);

        let (status, _) = call(&app, post_request("/encrypt", "{\"data\": ")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let request = json!({ "data": "x", "policy": "3" }).to_string();
        let (status, _) = call(&app, post_request("/encrypt", request)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // Free-text policies are not accepted.
        let request = json!({ "data": "x", "policy": "role:admin" }).to_string();
        let (status, _) = call(&app, post_request("/encrypt", request)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let teacher = key(&app, "teacher").await;
        assert_eq!(
            decrypt(&app, "not base64!", &teacher).await.0,
            StatusCode::BAD_REQUEST
        );
        let ciphertext = encrypt(&app, "x", "1").await;
        assert_eq!(
            decrypt(&app, &ciphertext, "not base64!").await.0,
            StatusCode::BAD_REQUEST
        );

        // Valid base64 that does not decode is a refused decryption.
        let garbage = STANDARD.encode(b"garbage");
        assert_eq!(
            decrypt(&app, &garbage, &teacher).await.0,
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            decrypt(&app, &ciphertext, &garbage).await.0,
            StatusCode::FORBIDDEN
        );

        // A truncated key is refused like any other invalid key.
        let teacher_bytes = STANDARD.decode(&teacher).expect("valid base64");
        for length in [0, 16, teacher_bytes.len() / 2, teacher_bytes.len() - 1] {
            let truncated = STANDARD.encode(&teacher_bytes[..length]);
            assert_eq!(
                decrypt(&app, &ciphertext, &truncated).await.0,
                StatusCode::FORBIDDEN
            );
        }
    }

    #[tokio::test]
    async fn test_unknown_role() {
        let app = app(None);
        let (status, _) = call(&app, get_request("/generate-key/janitor")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_policies_and_public_parameters() {
        let app = app(None);
        let (status, body) = call(&app, get_request("/policies")).await;
        assert_eq!(status, StatusCode::OK);
        let policies: Vec<NamedPolicy> = serde_json::from_slice(&body).expect("valid JSON");
        assert_eq!(
            policies,
            vec![
                NamedPolicy::new("1", "role:admin or role:teacher or role:student"),
                NamedPolicy::new("2", "role:teacher or role:student"),
            ]
        );

        let (status, body) = call(&app, get_request("/public-parameters")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(STANDARD.decode(body).is_ok());
    }

    #[tokio::test]
    async fn test_admin_setup() {
        // not served without a token
        let (status, _) = call(&app(None), post_request("/admin/setup", "")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let app = app(Some(ADMIN_TOKEN));
        let teacher = key(&app, "teacher").await;
        let ciphertext = encrypt(&app, "before rotation", "2").await;

        let (status, _) = call(&app, post_request("/admin/setup", "")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let request = Request::builder()
            .method("POST")
            .uri("/admin/setup")
            .header(header::AUTHORIZATION, "Bearer wrong-token")
            .body(Body::empty())
            .expect("valid request");
        assert_eq!(call(&app, request).await.0, StatusCode::UNAUTHORIZED);

        let request = Request::builder()
            .method("POST")
            .uri("/admin/setup")
            .header(header::AUTHORIZATION, format!("Bearer {ADMIN_TOKEN}"))
            .body(Body::empty())
            .expect("valid request");
        let (status, body) = call(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        let response: serde_json::Value = serde_json::from_slice(&body).expect("valid JSON");
        assert_eq!(response["epoch"].as_str().map(str::len), Some(32));

        // Keys and ciphertexts of the previous epoch are refused.
        assert_eq!(
            decrypt(&app, &ciphertext, &teacher).await.0,
            StatusCode::FORBIDDEN
        );
        let new_teacher = key(&app, "teacher").await;
        assert_eq!(
            decrypt(&app, &ciphertext, &new_teacher).await.0,
            StatusCode::FORBIDDEN
        );
        let ciphertext = encrypt(&app, "after rotation", "2").await;
        assert_eq!(
            decrypt(&app, &ciphertext, &new_teacher).await,
            (StatusCode::OK, b"after rotation".to_vec())
        );
    }

    #[tokio::test]
    async fn test_cors() {
        let request = Request::builder()
            .uri("/policies")
            .header(header::ORIGIN, "https://school.example")
            .body(Body::empty())
            .expect("valid request");
        let response = app(None).oneshot(request).await.expect("router is infallible");
        assert_eq!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .and_then(|v| v.to_str().ok()),
            Some("*")
        );

        let config = ServiceConfig {
            cors_allow_all: false,
            ..ServiceConfig::default()
        };
        let app = router(Arc::new(Service::new(&config).expect("valid configuration")));
        let request = Request::builder()
            .uri("/policies")
            .header(header::ORIGIN, "https://school.example")
            .body(Body::empty())
            .expect("valid request");
        let response = app.oneshot(request).await.expect("router is infallible");
        assert!(response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none());
    }
}
