//! HTTP entry point (§4.J): a single catch-all fallback route. There is no
//! per-path `Router::route` table the way a conventional REST service has
//! one — every method and every path is handed to the request lifecycle,
//! which resolves its own routing through the hub and responder dispatch.

use axum::body::{boxed, Bytes, Full};
use axum::extract::Extension;
use axum::handler::Handler;
use axum::http::{header, HeaderMap, Method, Uri};
use axum::response::Response as AxumResponse;
use axum::Router;
use indexmap::IndexMap;
use percent_encoding::percent_decode_str;
use rand::Rng;
use tracing::Instrument;

use crate::config::settings;
use crate::context::AppContext;
use crate::error::AppError;
use crate::hub::vhost::VhostKey;
use crate::lifecycle::{self, Incoming};
use crate::request::Request as HubRequest;
use crate::session;

pub fn routes() -> Router {
    Router::new().fallback(dispatch.into_service())
}

async fn dispatch(
    Extension(ctx): Extension<AppContext>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body_bytes: Bytes,
) -> Result<AxumResponse, AppError> {
    let hostname = host_of(&headers);
    let request_id = new_request_id();

    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %method,
        uri = %uri,
        vhost = %hostname,
        rtag = tracing::field::Empty,
    );

    let response = resolve(ctx, method, uri, headers, body_bytes, hostname)
        .instrument(span)
        .await?;

    let mut axum_response = to_axum_response(response).await?;
    if let Ok(value) = axum::http::HeaderValue::from_str(&request_id) {
        axum_response.headers_mut().insert("x-request-id", value);
    }
    Ok(axum_response)
}

async fn resolve(
    ctx: AppContext,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body_bytes: Bytes,
    hostname: String,
) -> Result<crate::response::Response, AppError> {
    let scheme = scheme_of(&headers);

    let doc_root = ctx
        .doc_root_for(&hostname)
        .ok_or_else(|| AppError::Logical("no vhost document root is configured".into()))?;
    let vhost = ctx.vhosts().get_or_init(VhostKey {
        server_hostname: hostname.clone(),
        port: settings().application.port,
        doc_root,
    })?;

    let mut request = HubRequest::new(method.to_string(), scheme, hostname, uri.path().to_owned());
    request.qs = parse_qs(uri.query().unwrap_or(""));
    request.cookies = parse_cookies(&headers);
    request.headers = headers_to_map(&headers);

    let is_json_body = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.starts_with("application/json"))
        .unwrap_or(false);
    if is_json_body && !body_bytes.is_empty() {
        request.body_json = serde_json::from_slice(&body_bytes).ok();
    }
    request.raw_body = body_bytes.to_vec();

    let session_cookie = request.cookies.get("session").cloned();
    let identity = session::identify(session_cookie.as_deref(), |user| {
        session::groups_for_user(&vhost.config, user)
    });
    request.username = identity.as_ref().map(|identity| identity.username.clone());
    request.groups = identity.map(|identity| identity.groups).unwrap_or_default();

    let if_modified_since = headers
        .get(header::IF_MODIFIED_SINCE)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| chrono::DateTime::parse_from_rfc2822(s).ok())
        .map(|dt| dt.timestamp().max(0) as u64);

    lifecycle::handle(vhost, ctx.cache().clone(), request, Incoming { if_modified_since }).await
}

/// A short hex id for log correlation across the lifecycle's phases,
/// independent of any client-supplied header.
fn new_request_id() -> String {
    let mut bytes = [0u8; 8];
    rand::thread_rng().fill(&mut bytes);
    hex::encode(bytes)
}

async fn to_axum_response(response: crate::response::Response) -> Result<AxumResponse, AppError> {
    let body = match &response.send_file {
        Some(path) => tokio::fs::read(path).await?,
        None => response.body.as_bytes().to_vec(),
    };

    let mut builder = axum::http::Response::builder().status(
        axum::http::StatusCode::from_u16(response.status)
            .unwrap_or(axum::http::StatusCode::OK),
    );
    for (name, value) in &response.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    for (name, value) in &response.cookies {
        builder = builder.header(
            header::SET_COOKIE,
            format!("{name}={value}; Path=/; HttpOnly"),
        );
    }
    if let Some(etag) = &response.etag {
        builder = builder.header(header::ETAG, etag.as_str());
    }

    builder
        .body(boxed(Full::from(Bytes::from(body))))
        .map_err(|e| AppError::Programatic(e.into()))
}

/// Selects the vhost's hostname from the `Host` header, ignoring a trailing
/// `:port` (the listening port comes from `application.port`, not the
/// client-supplied `Host`).
fn host_of(headers: &HeaderMap) -> String {
    headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(|h| h.split(':').next().unwrap_or(h).to_owned())
        .unwrap_or_else(|| "localhost".to_owned())
}

/// The request's scheme, trusting `X-Forwarded-Proto` from the forwarding
/// proxy this service is meant to sit behind (§A.3 CORS note).
fn scheme_of(headers: &HeaderMap) -> String {
    match headers.get("x-forwarded-proto").and_then(|v| v.to_str().ok()) {
        Some("https") => "https".to_owned(),
        _ => "http".to_owned(),
    }
}

fn parse_qs(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (decode(k), decode(v)),
            None => (decode(pair), String::new()),
        })
        .collect()
}

fn decode(raw: &str) -> String {
    percent_decode_str(&raw.replace('+', " ")).decode_utf8_lossy().into_owned()
}

fn parse_cookies(headers: &HeaderMap) -> IndexMap<String, String> {
    let mut cookies = IndexMap::new();
    for value in headers.get_all(header::COOKIE) {
        let Ok(text) = value.to_str() else { continue };
        for pair in text.split(';') {
            if let Some((k, v)) = pair.trim().split_once('=') {
                cookies.insert(k.to_owned(), v.to_owned());
            }
        }
    }
    cookies
}

fn headers_to_map(headers: &HeaderMap) -> IndexMap<String, String> {
    let mut map = IndexMap::new();
    for (name, value) in headers {
        if let Ok(text) = value.to_str() {
            map.insert(name.as_str().to_owned(), text.to_owned());
        }
    }
    map
}
