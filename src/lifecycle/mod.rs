//! The request lifecycle (§4.J): the ordered phases that bind a raw HTTP
//! request to a resolved resource, an authorized session, a responder, and
//! finally a sent response.

use std::sync::Arc;
use std::time::SystemTime;

use crate::cache::{Lookup, ResponseCache};
use crate::error::AppError;
use crate::hub::vhost::VhostState;
use crate::request::Request;
use crate::response::Response;

/// Headers consumed while header-parsing, beyond what already arrived on
/// `Request` from the transport (§6 "Request headers consumed").
pub struct Incoming {
    pub if_modified_since: Option<u64>,
}

/// Runs the full lifecycle for one request against a vhost, including the
/// cache short-circuit. `internal_redirect` restarts from map-to-storage
/// without re-running new-request-cycle (§4.J step 6).
pub async fn handle(
    vhost: Arc<VhostState>,
    cache: Arc<ResponseCache>,
    mut request: Request,
    incoming: Incoming,
) -> Result<Response, AppError> {
    request.hub = Some(Arc::new(clone_hub_view(&vhost)));

    for _ in 0..8 {
        match run_once(&vhost, &cache, &mut request, &incoming).await? {
            Outcome::Response(response) => return Ok(response),
            Outcome::Restart(uri) => {
                request = request.subrequest(&uri);
            }
        }
    }

    Err(AppError::Logical("too many internal redirects".into()))
}

enum Outcome {
    Response(Response),
    Restart(String),
}

async fn run_once(
    vhost: &Arc<VhostState>,
    cache: &Arc<ResponseCache>,
    request: &mut Request,
    incoming: &Incoming,
) -> Result<Outcome, AppError> {
    // 2. map-to-storage — forbid the reserved /sys tree outright.
    tracing::debug!(phase = "map-to-storage", path = %request.page.addr.to_canonical());
    if request.page.addr.to_canonical().starts_with("/sys") {
        return Err(AppError::Forbidden("/sys is not reachable from a request".into()));
    }

    // 3. header-parse already happened in `Request` construction; fixup is
    // the permission/session check, applied here.
    tracing::debug!(phase = "fixup");
    let addr = request.page.addr.to_canonical();
    let allowed = vhost.permissions.lock().unwrap().check(
        &addr,
        request.username.as_deref(),
        &request.groups,
        "r",
    );
    if !allowed {
        tracing::info!(path = %addr, user = ?request.username, "access denied");
        return Err(AppError::AccessDenied(addr));
    }

    let rtag = request.rtag(&["x-content-format"]);
    tracing::Span::current().record("rtag", &tracing::field::display(&rtag));

    let cfg_mtime = vhost.config.aggregate_mtime().map(to_secs);
    if request.method == "GET" {
        match cache.lookup(&rtag, incoming.if_modified_since, cfg_mtime) {
            Lookup::NotModified(_) => {
                tracing::info!(%rtag, "cache not modified");
                return Ok(Outcome::Response(Response::not_modified()));
            }
            Lookup::Hit(meta) => {
                tracing::info!(%rtag, "cache hit");
                let mut response = Response::default();
                response.headers = meta.headers;
                response.etag = Some(meta.etag.clone());
                match meta.send_file {
                    Some(path) => response.send_file = Some(path),
                    None => {
                        let bytes = tokio::fs::read(cache.body_path_for(&meta.etag))
                            .await
                            .unwrap_or_default();
                        response.body = crate::response::Body::Binary(bytes);
                    }
                }
                return Ok(Outcome::Response(response));
            }
            Lookup::Miss => {
                tracing::debug!(%rtag, "cache miss");
            }
        }
    }

    let guard = cache.lock_rtag(&rtag).await;
    let _permit = guard.lock().await;

    // 5. respond — resolve and dispatch.
    tracing::debug!(phase = "respond");
    let node = vhost
        .hub
        .resolve(&request.page.addr)?
        .ok_or_else(|| AppError::DoesNotExist(request.page.addr.to_canonical()))?;

    let responder = vhost
        .responders
        .dispatch(&node, request)
        .ok_or_else(|| AppError::Logical("no responder claimed this resource".into()))?;

    let responder_needs_write = responder.permission_mode().contains('w') || responder.permission_mode().contains('x');
    if request.method != "GET" && responder_needs_write {
        let allowed_write = vhost.permissions.lock().unwrap().check(
            &request.page.addr.to_canonical(),
            request.username.as_deref(),
            &request.groups,
            "w",
        );
        if !allowed_write {
            return Err(AppError::AccessDenied(request.page.addr.to_canonical()));
        }
    }

    let mut response = responder.compile(&node, request)?;

    if let Some(redirect_uri) = response.internal_redirect.take() {
        return Ok(Outcome::Restart(redirect_uri));
    }

    response.fs_access_log = vhost.hub.access_log();
    response.fs_change_log = vhost.hub.change_log();
    vhost.hub.reset_logs();

    // 6. send — cache policy, headers.
    tracing::debug!(phase = "send");
    if request.method == "GET" && response.can_cache {
        let deps: Vec<(String, SystemTime)> = response
            .fs_access_log
            .iter()
            .map(|entry| (entry.path.clone(), entry.mtime))
            .collect();
        cache.store(
            &rtag,
            &request.uri,
            &qs_string(request),
            &response,
            &deps,
            vhost.config.aggregate_mtime(),
        )?;
    }

    if !response.headers.contains_key("Cache-Control") {
        response.set_header("Cache-Control", "must-revalidate");
    }

    Ok(Outcome::Response(response))
}

fn qs_string(request: &Request) -> String {
    request
        .qs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

fn to_secs(t: SystemTime) -> u64 {
    t.duration_since(std::time::UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

/// A cheap handle to the vhost's hub for embedding in `Request`. The hub
/// itself holds no interior state worth duplicating beyond its root and
/// mount table; the access/change logs live on the vhost's own instance.
fn clone_hub_view(vhost: &VhostState) -> crate::hub::Hub {
    crate::hub::Hub::new(vhost.hub.root.clone(), vhost.hub.mounts.clone())
}
