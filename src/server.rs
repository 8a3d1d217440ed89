//! HTTP surface and result materialization
//!
//! Three routes: POST /autolink (resolve, optionally stream the file),
//! POST /login (best-effort session establishment), GET /health. Each
//! request that touches the browser opens its own page and closes it on
//! every exit path; the browser process itself is shared and persists.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chromiumoxide::cdp::browser_protocol::network::CookieParam;
use chromiumoxide::page::Page;
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::auth::{attempt_login, is_authenticated};
use crate::config::Config;
use crate::manager::BrowserManager;
use crate::payload::find_first_url;
use crate::upstream::{AutolinkResult, call_internal_api};
use crate::utils::constants::{CHROME_USER_AGENT, NAVIGATION_TIMEOUT};

#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<BrowserManager>,
    pub config: Arc<Config>,
    pub http: reqwest::Client,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/autolink", post(autolink))
        .route("/login", post(login))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Top-level error responder. Anything unclassified becomes a 500 with the
/// message; a single request failure never takes the process down.
pub struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!("Request failed: {:#}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": self.0.to_string()})),
        )
            .into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

async fn health() -> Json<Value> {
    Json(json!({"ok": true}))
}

async fn autolink(
    State(state): State<AppState>,
    payload: Option<Json<Value>>,
) -> Result<Response, AppError> {
    // Validated by hand rather than through a typed extractor so that a
    // missing or type-invalid `url` is always a 400, whatever else the
    // body contains.
    let request = payload.map(|Json(v)| v).unwrap_or(Value::Null);
    let download = request
        .get("download")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let target_url = request
        .get("url")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .map(str::to_string);
    let Some(target_url) = target_url else {
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Missing url"})),
        )
            .into_response());
    };

    let handle = state.manager.acquire().await?;
    let page = handle.new_page("about:blank").await?;

    let result = resolve_autolink(&state, &page, &target_url).await;
    close_page(page).await;

    Ok(materialize(&state, result, download).await)
}

/// Navigate, authenticate if needed, and run the in-page API call.
///
/// All failures collapse into the status-0 form of `AutolinkResult` so the
/// materializer owns the response mapping.
async fn resolve_autolink(state: &AppState, page: &Page, target_url: &str) -> AutolinkResult {
    // Best-effort login when credentials are configured. A failure here is
    // logged and the call proceeds unauthenticated.
    if let Some(credentials) = state.config.credentials.as_ref()
        && !is_authenticated(page).await
    {
        let outcome = attempt_login(page, Some(credentials)).await;
        if outcome.ok() {
            info!("Auto-login succeeded");
        } else {
            warn!("Auto-login did not succeed: {:?}", outcome.reason());
        }
    }

    // Load the upstream site first so the page holds its cookies and
    // anti-bot tokens, and so the API call below is same-origin.
    let navigation = tokio::time::timeout(NAVIGATION_TIMEOUT, async {
        page.goto(state.config.upstream_origin.as_str()).await?;
        page.wait_for_navigation().await?;
        Ok::<_, chromiumoxide::error::CdpError>(())
    })
    .await;

    match navigation {
        Err(_) => {
            return AutolinkResult::browser_failure("navigation to upstream site timed out");
        }
        Ok(Err(e)) => {
            return AutolinkResult::browser_failure(format!(
                "navigation to upstream site failed: {e}"
            ));
        }
        Ok(Ok(())) => {}
    }

    match call_internal_api(page, &state.config.autolink_api_url(), target_url).await {
        Ok(result) => result,
        Err(e) => AutolinkResult::browser_failure(e.to_string()),
    }
}

/// Map an `AutolinkResult` to the client response.
async fn materialize(state: &AppState, result: AutolinkResult, download: bool) -> Response {
    if result.status == 0 {
        let detail = result
            .error
            .unwrap_or_else(|| "call did not reach the network layer".to_string());
        return (
            StatusCode::BAD_GATEWAY,
            Json(json!({"error": "Browser-side call failed", "detail": detail})),
        )
            .into_response();
    }

    if result.status != 200 {
        let status = StatusCode::from_u16(result.status).unwrap_or(StatusCode::BAD_GATEWAY);
        return (
            status,
            Json(json!({"error": "Upstream non-200", "data": result.body})),
        )
            .into_response();
    }

    let payload = result.body.unwrap_or(Value::Null);

    if !download {
        return Json(json!({"ok": true, "payload": payload})).into_response();
    }

    let Some(file_url) = find_first_url(&payload).map(str::to_string) else {
        return Json(json!({
            "ok": true,
            "payload": payload,
            "notice": "no direct file URL found",
        }))
        .into_response();
    };

    stream_file(state, &file_url).await
}

/// Fetch the resolved file and relay it to the caller.
///
/// Content-Type and Content-Disposition are forwarded; the body is piped
/// unmodified, so backpressure follows the caller's connection. A
/// mid-stream error terminates the response without corrupting framing.
async fn stream_file(state: &AppState, file_url: &str) -> Response {
    info!("Streaming resolved file from {}", file_url);

    let upstream = match state
        .http
        .get(file_url)
        .header(header::USER_AGENT, CHROME_USER_AGENT)
        .send()
        .await
    {
        Ok(resp) => resp,
        Err(e) => {
            return (
                StatusCode::BAD_GATEWAY,
                Json(json!({"error": "File fetch failed", "detail": e.to_string()})),
            )
                .into_response();
        }
    };

    if !upstream.status().is_success() {
        return (
            StatusCode::BAD_GATEWAY,
            Json(json!({
                "error": "File fetch failed",
                "status": upstream.status().as_u16(),
            })),
        )
            .into_response();
    }

    let mut builder = Response::builder().status(StatusCode::OK);
    if let Some(content_type) = upstream.headers().get(header::CONTENT_TYPE) {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }
    if let Some(disposition) = upstream.headers().get(header::CONTENT_DISPOSITION) {
        builder = builder.header(header::CONTENT_DISPOSITION, disposition);
    }

    match builder.body(Body::from_stream(upstream.bytes_stream())) {
        Ok(response) => response,
        Err(e) => (
            StatusCode::BAD_GATEWAY,
            Json(json!({"error": "File relay failed", "detail": e.to_string()})),
        )
            .into_response(),
    }
}

#[derive(Debug, Default, Deserialize)]
struct LoginRequest {
    /// CDP-shaped cookies to seed into the page before probing.
    #[serde(default)]
    cookies: Vec<CookieParam>,
}

async fn login(
    State(state): State<AppState>,
    payload: Option<Json<LoginRequest>>,
) -> Result<Response, AppError> {
    let request = payload.map(|Json(r)| r).unwrap_or_default();

    let handle = state.manager.acquire().await?;
    let page = handle.new_page("about:blank").await?;

    let result = run_login(&state, &page, request.cookies).await;
    close_page(page).await;

    result
}

async fn run_login(
    state: &AppState,
    page: &Page,
    cookies: Vec<CookieParam>,
) -> Result<Response, AppError> {
    if !cookies.is_empty() {
        info!("Seeding {} cookie(s) before probe", cookies.len());
        page.set_cookies(cookies)
            .await
            .map_err(|e| anyhow::anyhow!("failed to seed cookies: {e}"))?;
    }

    if is_authenticated(page).await {
        return Ok(Json(json!({"ok": true, "message": "already logged in"})).into_response());
    }

    let outcome = attempt_login(page, state.config.credentials.as_ref()).await;
    Ok(Json(json!({"ok": outcome.ok(), "reason": outcome.reason()})).into_response())
}

/// Pages are request-scoped; close on every exit path so tabs never pile
/// up in the long-lived browser.
async fn close_page(page: Page) {
    if let Err(e) = page.close().await {
        debug!("Failed to close page: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::http::Request;
    use tower::util::ServiceExt;

    fn test_state() -> AppState {
        let config = Config::default();
        AppState {
            manager: Arc::new(BrowserManager::new(config.clone())),
            config: Arc::new(config),
            http: reqwest::Client::new(),
        }
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    /// Local file host standing in for the resolved-file origin. Serves a
    /// fixed mp4 body when `ok`, a 500 otherwise.
    async fn spawn_file_server(ok: bool) -> String {
        let app = Router::new().route(
            "/clip.mp4",
            get(move || async move {
                if ok {
                    (
                        [
                            (header::CONTENT_TYPE, "video/mp4"),
                            (
                                header::CONTENT_DISPOSITION,
                                "attachment; filename=\"clip.mp4\"",
                            ),
                        ],
                        "mp4-payload-bytes",
                    )
                        .into_response()
                } else {
                    (StatusCode::INTERNAL_SERVER_ERROR, "upstream broke").into_response()
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve");
        });

        format!("http://{addr}/clip.mp4")
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let app = router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"ok": true}));
    }

    #[tokio::test]
    async fn missing_url_is_rejected_with_400() {
        for body in [json!({}), json!({"download": true}), json!({"url": ""})] {
            let app = router(test_state());
            let response = app
                .oneshot(
                    Request::builder()
                        .method("POST")
                        .uri("/autolink")
                        .header(header::CONTENT_TYPE, "application/json")
                        .body(Body::from(body.to_string()))
                        .expect("request"),
                )
                .await
                .expect("response");

            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }
    }

    #[tokio::test]
    async fn status_zero_materializes_as_bad_gateway() {
        let state = test_state();
        let result = AutolinkResult::browser_failure("net::ERR_CONNECTION_RESET");

        let response = materialize(&state, result, false).await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let body = body_json(response).await;
        assert_eq!(body["error"], "Browser-side call failed");
        assert_eq!(body["detail"], "net::ERR_CONNECTION_RESET");
    }

    #[tokio::test]
    async fn upstream_status_is_relayed_with_body_as_context() {
        let state = test_state();
        let result = AutolinkResult {
            status: 403,
            body: Some(json!({"error": "forbidden"})),
            error: None,
        };

        let response = materialize(&state, result, false).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let body = body_json(response).await;
        assert_eq!(body["error"], "Upstream non-200");
        assert_eq!(body["data"], json!({"error": "forbidden"}));
    }

    #[tokio::test]
    async fn successful_payload_is_returned_as_is() {
        let state = test_state();
        let result = AutolinkResult {
            status: 200,
            body: Some(json!({"link": "https://files.example/x.mp4"})),
            error: None,
        };

        let response = materialize(&state, result, false).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(
            body,
            json!({"ok": true, "payload": {"link": "https://files.example/x.mp4"}})
        );
    }

    #[tokio::test]
    async fn type_invalid_url_is_rejected_with_400() {
        for body in [
            json!({"url": 5}),
            json!({"url": null}),
            json!({"url": ["https://example.com/x"]}),
            json!({"url": 5, "download": true}),
        ] {
            let app = router(test_state());
            let response = app
                .oneshot(
                    Request::builder()
                        .method("POST")
                        .uri("/autolink")
                        .header(header::CONTENT_TYPE, "application/json")
                        .body(Body::from(body.to_string()))
                        .expect("request"),
                )
                .await
                .expect("response");

            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }
    }

    #[tokio::test]
    async fn missing_body_is_rejected_with_400() {
        let app = router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/autolink")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn download_relay_forwards_headers_and_bytes() {
        let state = test_state();
        let file_url = spawn_file_server(true).await;

        let response = stream_file(&state, &file_url).await;
        assert_eq!(response.status(), StatusCode::OK);

        let headers = response.headers().clone();
        assert_eq!(
            headers.get(header::CONTENT_TYPE).map(|v| v.as_bytes()),
            Some(b"video/mp4".as_slice())
        );
        assert_eq!(
            headers.get(header::CONTENT_DISPOSITION).map(|v| v.as_bytes()),
            Some(b"attachment; filename=\"clip.mp4\"".as_slice())
        );

        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("relayed body");
        assert_eq!(&bytes[..], b"mp4-payload-bytes");
    }

    #[tokio::test]
    async fn download_with_file_url_streams_the_file() {
        let state = test_state();
        let file_url = spawn_file_server(true).await;
        let result = AutolinkResult {
            status: 200,
            body: Some(json!({"meta": {"title": "clip"}, "link": file_url})),
            error: None,
        };

        let response = materialize(&state, result, true).await;
        assert_eq!(response.status(), StatusCode::OK);

        let headers = response.headers().clone();
        assert_eq!(
            headers.get(header::CONTENT_TYPE).map(|v| v.as_bytes()),
            Some(b"video/mp4".as_slice())
        );

        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("relayed body");
        assert_eq!(&bytes[..], b"mp4-payload-bytes");
    }

    #[tokio::test]
    async fn non_success_file_fetch_returns_bad_gateway() {
        let state = test_state();
        let file_url = spawn_file_server(false).await;

        let response = stream_file(&state, &file_url).await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let body = body_json(response).await;
        assert_eq!(body["error"], "File fetch failed");
        assert_eq!(body["status"], 500);
    }

    #[tokio::test]
    async fn unreachable_file_url_returns_bad_gateway() {
        let state = test_state();
        // Bind then drop to get a port with nothing listening.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local addr");
        drop(listener);

        let response = stream_file(&state, &format!("http://{addr}/clip.mp4")).await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let body = body_json(response).await;
        assert_eq!(body["error"], "File fetch failed");
        assert!(body["detail"].is_string());
    }

    #[tokio::test]
    async fn download_without_file_url_returns_payload_with_notice() {
        let state = test_state();
        let result = AutolinkResult {
            status: 200,
            body: Some(json!({"message": "resolved", "path": "/no/url/here"})),
            error: None,
        };

        let response = materialize(&state, result, true).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["notice"], "no direct file URL found");
        assert_eq!(body["payload"]["message"], "resolved");
    }
}
