//! Integration tests for image materialization over HTTP.
//!
//! Run with: cargo test -p kaline-integration-tests --test image_materializer

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use kaline_commerce::ImageMaterializer;
use kaline_core::{ImageRef, PLACEHOLDER_IMAGE};
use kaline_integration_tests::{PNG_BYTES, StubServer, image_config, image_router};

async fn setup() -> (StubServer, Arc<AtomicUsize>, ImageMaterializer) {
    let hits = Arc::new(AtomicUsize::new(0));
    let server = StubServer::start(image_router(hits.clone())).await;
    let images = ImageMaterializer::new(&image_config()).expect("Failed to build materializer");
    (server, hits, images)
}

fn png_data_uri() -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(PNG_BYTES))
}

#[tokio::test]
async fn test_png_is_embedded_with_declared_type() {
    let (server, _, images) = setup().await;

    let image = images.materialize_str(server.url("/photo.png").as_str()).await;
    assert!(image.is_embedded());
    assert_eq!(image.as_str(), png_data_uri());
}

#[tokio::test]
async fn test_untyped_body_is_sniffed() {
    let (server, _, images) = setup().await;

    let image = images.materialize_str(server.url("/raw").as_str()).await;
    assert_eq!(image.as_str(), png_data_uri());
}

#[tokio::test]
async fn test_failures_yield_placeholder() {
    let (server, _, images) = setup().await;

    for path in ["/missing.png", "/page", "/huge.png", "/slow.png"] {
        let image = images.materialize_str(server.url(path).as_str()).await;
        assert!(image.is_placeholder(), "{path} should fall back");
        assert_eq!(image.as_str(), PLACEHOLDER_IMAGE);
    }
}

#[tokio::test]
async fn test_repeat_fetch_is_served_from_cache() {
    let (server, hits, images) = setup().await;
    let url = server.url("/photo.png");

    let first = images.materialize_str(url.as_str()).await;
    let second = images.materialize(&ImageRef::new(url.as_str())).await;
    assert_eq!(first, second);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_materialized_image_is_fixed_point() {
    let (server, hits, images) = setup().await;

    let embedded = images.materialize_str(server.url("/photo.png").as_str()).await;
    let again = images.materialize(&embedded).await;
    assert_eq!(again, embedded);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}
