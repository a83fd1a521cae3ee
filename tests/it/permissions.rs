//! Permission rules (§4.F): the first clause whose scope matches the current
//! principal decides a pattern's outcome; `ALL`/`NONE` always terminate
//! evaluation outright.

use axum::response::IntoResponse;
use hyper::header;

use hubd::lifecycle::{handle, Incoming};
use hubd::request::Request;
use hubd::response::Body;
use hubd::AppError;

use crate::support::{fresh_cache, vhost_with};

const SITE_HF: &str = "permissions:\n  ^/admin/: root=ALL ; *=NONE\n";

#[tokio::test]
async fn anonymous_request_is_denied_with_a_www_authenticate_challenge() {
    let (_dir, vhost) = vhost_with(Some(SITE_HF), &[("admin/secret.txt", "top secret")]);
    let cache = fresh_cache();

    let request = Request::new("GET".into(), "http".into(), "example.com".into(), "/admin/secret.txt".into());
    let err = handle(vhost, cache, request, Incoming { if_modified_since: None })
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::AccessDenied(_)));

    let response = err.into_response();
    assert_eq!(response.status(), hyper::StatusCode::UNAUTHORIZED);
    assert_eq!(response.headers().get(header::WWW_AUTHENTICATE).unwrap(), "Web");
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        mime::APPLICATION_JSON.as_ref()
    );

    let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"]["type"], "AccessDenied");
}

#[tokio::test]
async fn the_named_user_is_granted_access() {
    let (_dir, vhost) = vhost_with(Some(SITE_HF), &[("admin/secret.txt", "top secret")]);
    let cache = fresh_cache();

    let mut request = Request::new("GET".into(), "http".into(), "example.com".into(), "/admin/secret.txt".into());
    request.username = Some("root".into());

    let response = handle(vhost, cache, request, Incoming { if_modified_since: None })
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    match response.body {
        Body::Text(t) => assert_eq!(t, "top secret"),
        other => panic!("expected the file's content, got {other:?}"),
    }
}

#[tokio::test]
async fn a_catch_all_clause_grants_default_read_when_no_named_clause_matches() {
    let (_dir, vhost) = vhost_with(
        Some("permissions:\n  ^/shared/: u:editors=ALL ; *=r\n"),
        &[("shared/doc.txt", "visible to everyone")],
    );
    let cache = fresh_cache();

    let request = Request::new("GET".into(), "http".into(), "example.com".into(), "/shared/doc.txt".into());
    let response = handle(vhost, cache, request, Incoming { if_modified_since: None })
        .await
        .unwrap();

    assert_eq!(response.status, 200);
}
