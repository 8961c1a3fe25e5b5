use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use dispatch::Dispatcher;
use shared::{
    domain::SessionId,
    error::{ApiError, ErrorCode},
    protocol::{ClientRequest, ClientResponse, RequestParams},
};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod app_state;
mod config;
mod demo;

use app_state::AppState;
use config::load_settings;

const SESSION_COOKIE: &str = "UNIFYSESSIONID";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = load_settings()?;
    let config = settings.to_dispatch_config();
    let registry = demo::registry(&config).context("failed to register controllers")?;
    let dispatcher = Dispatcher::new(Arc::new(registry), config);

    let addr: SocketAddr = settings
        .server_bind
        .parse()
        .with_context(|| format!("invalid bind address '{}'", settings.server_bind))?;
    let app = build_router(AppState::new(dispatcher, settings));

    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: AppState) -> Router {
    let max_body_bytes = state.settings.max_body_bytes;
    Router::new()
        .route("/healthz", get(healthz))
        .route("/logout", post(logout))
        .fallback(dispatch_request)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(token) = session_token(&headers) {
        state.sessions.end(&SessionId::from(token.as_str()));
    }
    let mut response = StatusCode::NO_CONTENT.into_response();
    if let Ok(cookie) = HeaderValue::from_str(&format!("{SESSION_COOKIE}=; Path=/; Max-Age=0")) {
        response.headers_mut().insert(header::SET_COOKIE, cookie);
    }
    response
}

/// Runs every other path through the dispatch pipeline on a blocking worker.
async fn dispatch_request(
    State(state): State<AppState>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = client_request(&uri, &headers, &body);
    let token = session_token(&headers);
    let (session, created) = state.sessions.get_or_create(token.as_deref());

    let dispatcher = Arc::clone(&state.dispatcher);
    let worker_session = Arc::clone(&session);
    let outcome =
        tokio::task::spawn_blocking(move || dispatcher.process(&worker_session, &request)).await;

    let mut response = match outcome {
        Ok(Ok(response)) => into_http_response(response),
        Ok(Err(err)) => {
            error!(path = %uri.path(), error = %err, "request failed");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, ApiError::from(&err))
        }
        Err(err) => {
            error!(path = %uri.path(), error = %err, "dispatch worker failed");
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::new(ErrorCode::Internal, "dispatch worker failed"),
            )
        }
    };

    if created {
        let cookie = format!("{SESSION_COOKIE}={}; Path=/; HttpOnly; SameSite=Lax", session.id());
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().insert(header::SET_COOKIE, value);
            }
            Err(err) => warn!(error = %err, "session cookie is not a valid header"),
        }
    }
    response
}

/// Flattens query string and form body parameters into one namespace, query
/// first.
fn client_request(uri: &Uri, headers: &HeaderMap, body: &[u8]) -> ClientRequest {
    let mut params = RequestParams::new();
    if let Some(query) = uri.query() {
        for (name, value) in url::form_urlencoded::parse(query.as_bytes()) {
            params.add(name, value);
        }
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if content_type.starts_with(FORM_CONTENT_TYPE) {
        for (name, value) in url::form_urlencoded::parse(body) {
            params.add(name, value);
        }
    }

    let mut request = ClientRequest::new(uri.path(), params);
    request.charset = charset_of(content_type);
    request
}

fn charset_of(content_type: &str) -> Option<String> {
    content_type
        .split(';')
        .filter_map(|part| part.trim().split_once('='))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("charset"))
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
        .filter(|charset| !charset.is_empty())
}

fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, token)| token.to_string())
        .filter(|token| !token.is_empty())
}

fn into_http_response(response: ClientResponse) -> Response {
    let content_type = match (response.content_type(), response.charset()) {
        (Some(content_type), Some(charset)) => Some(format!("{content_type}; charset={charset}")),
        (Some(content_type), None) => Some(content_type.to_string()),
        _ => None,
    };
    let extra: Vec<(String, String)> = response
        .headers()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect();

    let mut http = (StatusCode::OK, response.into_body()).into_response();
    let http_headers = http.headers_mut();
    if let Some(content_type) = content_type.and_then(|v| HeaderValue::from_str(&v).ok()) {
        http_headers.insert(header::CONTENT_TYPE, content_type);
    }
    for (name, value) in extra {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            (Ok(name), Ok(value)) => {
                http_headers.append(name, value);
            }
            _ => warn!(header = %name, "skipping response header that is not valid HTTP"),
        }
    }
    http
}

fn api_error(status: StatusCode, error: ApiError) -> Response {
    (status, Json(error)).into_response()
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
