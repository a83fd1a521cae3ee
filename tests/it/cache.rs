//! Response cache scenarios: a fresh GET populates the cache, a repeat GET
//! is served from it, and `If-Modified-Since` short-circuits to a 304.

use hubd::lifecycle::{handle, Incoming};
use hubd::request::Request;
use hubd::response::Body;

use crate::support::{fresh_cache, vhost_with};

fn get(path: &str) -> Request {
    Request::new("GET".into(), "http".into(), "example.com".into(), path.into())
}

#[tokio::test]
async fn cache_hit_reproduces_the_original_body() {
    let (_dir, vhost) = vhost_with(None, &[("index.html", "hello")]);
    let cache = fresh_cache();

    let first = handle(vhost.clone(), cache.clone(), get("/index.html"), Incoming { if_modified_since: None })
        .await
        .unwrap();
    assert_eq!(first.status, 200);
    match first.body {
        Body::Text(t) => assert_eq!(t, "hello"),
        _ => panic!("expected a text body on the compiling request"),
    }

    let second = handle(vhost, cache, get("/index.html"), Incoming { if_modified_since: None })
        .await
        .unwrap();
    assert_eq!(second.status, 200);
    match second.body {
        Body::Binary(b) => assert_eq!(b, b"hello"),
        other => panic!("expected the cached body to round-trip, got {other:?}"),
    }
}

#[tokio::test]
async fn if_modified_since_in_the_future_short_circuits_to_304() {
    let (_dir, vhost) = vhost_with(None, &[("index.html", "hello")]);
    let cache = fresh_cache();

    handle(vhost.clone(), cache.clone(), get("/index.html"), Incoming { if_modified_since: None })
        .await
        .unwrap();

    let far_future = 4_000_000_000u64;
    let response = handle(vhost, cache, get("/index.html"), Incoming { if_modified_since: Some(far_future) })
        .await
        .unwrap();

    assert_eq!(response.status, 304);
    assert!(response.body.is_empty());
}

#[tokio::test]
async fn touching_a_dependency_invalidates_the_cached_response() {
    let (dir, vhost) = vhost_with(None, &[("index.html", "v1")]);
    let cache = fresh_cache();

    let first = handle(vhost.clone(), cache.clone(), get("/index.html"), Incoming { if_modified_since: None })
        .await
        .unwrap();
    match first.body {
        Body::Text(t) => assert_eq!(t, "v1"),
        _ => panic!(),
    }

    // mtime resolution on most filesystems is 1s; sleep past it so the
    // rewritten file's mtime is observably newer than what was cached.
    std::thread::sleep(std::time::Duration::from_millis(1100));
    std::fs::write(dir.path().join("index.html"), "v2").unwrap();

    let second = handle(vhost, cache, get("/index.html"), Incoming { if_modified_since: None })
        .await
        .unwrap();
    match second.body {
        Body::Text(t) => assert_eq!(t, "v2"),
        other => panic!("expected a fresh compile after invalidation, got {other:?}"),
    }
}
