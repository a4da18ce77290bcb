//! Integration tests for compiled output files.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};

use common::{body_string, build_test_app, header, STRONG_NAME};

// ---------------------------------------------------------------------------
// Test: output files are served with CORS and no-cache headers
// ---------------------------------------------------------------------------

#[tokio::test]
async fn nocache_js_is_served() {
    let app = build_test_app(&["hello"]).await;
    app.compile_all().await;

    let response = app.get("/hello/hello.nocache.js").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "content-type"), Some("application/javascript"));
    assert_eq!(header(&response, "access-control-allow-origin"), Some("*"));
    assert_eq!(
        header(&response, "cache-control"),
        Some("no-cache, no-store, must-revalidate")
    );
    assert_eq!(header(&response, "pragma"), Some("no-cache"));
    assert_eq!(header(&response, "expires"), Some("0"));
    assert!(header(&response, "x-sourcemap").is_none());
    assert_eq!(body_string(response).await, "compile 1");
}

// ---------------------------------------------------------------------------
// Test: cache.js files carry X-SourceMap and may be cached
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cache_js_has_source_map_header() {
    let app = build_test_app(&["hello"]).await;
    app.compile_all().await;

    let response = app.get(&format!("/hello/{STRONG_NAME}.cache.js")).await;

    assert_eq!(response.status(), StatusCode::OK);
    let expected = format!("/sourcemaps/hello/{STRONG_NAME}_sourceMap0.json");
    assert_eq!(header(&response, "x-sourcemap"), Some(expected.as_str()));
    assert!(header(&response, "cache-control").is_none());
    assert!(header(&response, "pragma").is_none());
    assert_eq!(body_string(response).await, "cached();");
}

// ---------------------------------------------------------------------------
// Test: a gzip-only file without Accept-Encoding: gzip is a 501
// ---------------------------------------------------------------------------

#[tokio::test]
async fn gzip_only_without_accept_encoding_is_501() {
    let app = build_test_app(&["hello"]).await;
    app.compile_all().await;

    let response = app.get("/hello/deferred.js").await;
    assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);

    let response = app
        .send(
            Request::get("/hello/deferred.js")
                .header("accept-encoding", "deflate")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
}

// ---------------------------------------------------------------------------
// Test: a gzip-only file is sent compressed when the client accepts gzip
// ---------------------------------------------------------------------------

#[tokio::test]
async fn gzip_only_with_accept_encoding_is_served() {
    let app = build_test_app(&["hello"]).await;
    app.compile_all().await;

    let response = app
        .send(
            Request::get("/hello/deferred.js")
                .header("accept-encoding", "gzip, deflate")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "content-encoding"), Some("gzip"));
    assert_eq!(header(&response, "content-type"), Some("application/javascript"));
}

// ---------------------------------------------------------------------------
// Test: missing files and unknown modules are 404
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_output_is_not_found() {
    let app = build_test_app(&["hello"]).await;

    // Nothing compiled yet.
    assert_eq!(
        app.get("/hello/hello.nocache.js").await.status(),
        StatusCode::NOT_FOUND
    );

    app.compile_all().await;
    assert_eq!(app.get("/hello/missing.js").await.status(), StatusCode::NOT_FOUND);
    assert_eq!(app.get("/other/other.nocache.js").await.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Test: paths outside the grammar are ignored with an empty 404
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unsafe_paths_are_ignored() {
    let app = build_test_app(&["hello"]).await;
    app.compile_all().await;

    for path in ["/hello/../work/hello/compile.log", "/hello", "/hello/a%20b.js"] {
        let response = app.get(path).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{path}");
        assert_eq!(body_string(response).await, "", "{path}");
    }
}

// ---------------------------------------------------------------------------
// Test: non-GET requests are ignored
// ---------------------------------------------------------------------------

#[tokio::test]
async fn post_is_ignored() {
    let app = build_test_app(&["hello"]).await;

    let response = app
        .send(
            Request::post("/recompile/hello")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_string(response).await, "");
    assert_eq!(app.compiler.compiles(), 0);
}
